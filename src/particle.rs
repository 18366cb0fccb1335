//! Particle identity and propagation state.

use crate::{
    constants::{
        AMU_REST_ENERGY, ELECTRON_REST_ENERGY, ELEMENTARY_CHARGE, NEUTRON_REST_ENERGY,
        PROTON_REST_ENERGY,
    },
    error::{PropagationError, PropagationResult},
    fpr,
    geometry::{Dim3, In3D, Point3, Vec3},
};
use std::{fmt, str::FromStr};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Chemical symbols indexed by charge number, with index zero used for the neutron.
const ELEMENT_SYMBOLS: [&str; 27] = [
    "n", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S",
    "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe",
];

/// Kind of particle being propagated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum Species {
    /// A nucleus with the given mass number A and charge number Z.
    /// Protons and neutrons are nuclei with A = 1.
    Nucleus { mass_number: u32, charge_number: u32 },
    Photon,
    Electron,
    Positron,
    ElectronNeutrino,
    ElectronAntineutrino,
    MuonNeutrino,
    MuonAntineutrino,
}

impl Species {
    /// Creates a nucleus species, validating the nucleon numbers.
    pub fn nucleus(mass_number: u32, charge_number: u32) -> PropagationResult<Self> {
        if mass_number == 0 {
            return Err(PropagationError::invalid(
                "Nucleus mass number must be larger than zero",
            ));
        }
        if charge_number > mass_number {
            return Err(PropagationError::invalid(format!(
                "Nucleus charge number ({}) cannot exceed mass number ({})",
                charge_number, mass_number
            )));
        }
        Ok(Self::Nucleus {
            mass_number,
            charge_number,
        })
    }

    pub fn proton() -> Self {
        Self::Nucleus {
            mass_number: 1,
            charge_number: 1,
        }
    }

    pub fn neutron() -> Self {
        Self::Nucleus {
            mass_number: 1,
            charge_number: 0,
        }
    }

    /// Whether the species is a nucleus (including single nucleons).
    pub fn is_nucleus(&self) -> bool {
        matches!(self, Self::Nucleus { .. })
    }

    /// Whether the species is a single proton or neutron.
    pub fn is_nucleon(&self) -> bool {
        matches!(self, Self::Nucleus { mass_number: 1, .. })
    }

    pub fn is_neutrino(&self) -> bool {
        matches!(
            self,
            Self::ElectronNeutrino
                | Self::ElectronAntineutrino
                | Self::MuonNeutrino
                | Self::MuonAntineutrino
        )
    }

    /// Returns the mass number, which is zero for non-nuclei.
    pub fn mass_number(&self) -> u32 {
        match self {
            Self::Nucleus { mass_number, .. } => *mass_number,
            _ => 0,
        }
    }

    /// Returns the charge in units of the elementary charge.
    pub fn charge_number(&self) -> i32 {
        match self {
            Self::Nucleus { charge_number, .. } => *charge_number as i32,
            Self::Electron => -1,
            Self::Positron => 1,
            _ => 0,
        }
    }

    /// Returns the electric charge [C].
    pub fn charge(&self) -> fpr {
        fpr::from(self.charge_number()) * ELEMENTARY_CHARGE
    }

    /// Whether the species is affected by magnetic fields.
    pub fn is_charged(&self) -> bool {
        self.charge_number() != 0
    }

    /// Returns the rest energy [J].
    ///
    /// Heavier nuclei use the atomic mass unit times the mass number, which
    /// ignores binding energies.
    pub fn rest_energy(&self) -> fpr {
        match self {
            Self::Nucleus {
                mass_number: 1,
                charge_number: 1,
            } => PROTON_REST_ENERGY,
            Self::Nucleus {
                mass_number: 1,
                charge_number: 0,
            } => NEUTRON_REST_ENERGY,
            Self::Nucleus { mass_number, .. } => fpr::from(*mass_number) * AMU_REST_ENERGY,
            Self::Electron | Self::Positron => ELECTRON_REST_ENERGY,
            _ => 0.0,
        }
    }

    /// Returns a numeric code following the PDG Monte Carlo numbering scheme,
    /// with nuclei encoded as 10LZZZAAAI.
    pub fn code(&self) -> i64 {
        match self {
            Self::Nucleus {
                mass_number: 1,
                charge_number: 1,
            } => 2212,
            Self::Nucleus {
                mass_number: 1,
                charge_number: 0,
            } => 2112,
            Self::Nucleus {
                mass_number,
                charge_number,
            } => 1_000_000_000 + i64::from(*charge_number) * 10_000 + i64::from(*mass_number) * 10,
            Self::Photon => 22,
            Self::Electron => 11,
            Self::Positron => -11,
            Self::ElectronNeutrino => 12,
            Self::ElectronAntineutrino => -12,
            Self::MuonNeutrino => 14,
            Self::MuonAntineutrino => -14,
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nucleus {
                mass_number,
                charge_number,
            } => match ELEMENT_SYMBOLS.get(*charge_number as usize) {
                Some(symbol) => write!(f, "{}-{}", symbol, mass_number),
                None => write!(f, "Z{}-{}", charge_number, mass_number),
            },
            Self::Photon => write!(f, "photon"),
            Self::Electron => write!(f, "electron"),
            Self::Positron => write!(f, "positron"),
            Self::ElectronNeutrino => write!(f, "nu_e"),
            Self::ElectronAntineutrino => write!(f, "nu_e_bar"),
            Self::MuonNeutrino => write!(f, "nu_mu"),
            Self::MuonAntineutrino => write!(f, "nu_mu_bar"),
        }
    }
}

impl FromStr for Species {
    type Err = PropagationError;

    /// Parses names like `p`, `proton`, `n`, `photon`, `He-4`, `Fe-56` or `56,26`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "p" | "proton" => return Ok(Self::proton()),
            "n" | "neutron" => return Ok(Self::neutron()),
            "photon" | "gamma" => return Ok(Self::Photon),
            "electron" | "e-" => return Ok(Self::Electron),
            "positron" | "e+" => return Ok(Self::Positron),
            "nu_e" => return Ok(Self::ElectronNeutrino),
            "nu_e_bar" => return Ok(Self::ElectronAntineutrino),
            "nu_mu" => return Ok(Self::MuonNeutrino),
            "nu_mu_bar" => return Ok(Self::MuonAntineutrino),
            _ => {}
        }
        let parse_number = |string: &str| {
            string.trim().parse::<u32>().map_err(|err| {
                PropagationError::invalid(format!("Could not parse species {}: {}", s, err))
            })
        };
        if let Some((mass_number, charge_number)) = s.split_once(',') {
            return Self::nucleus(parse_number(mass_number)?, parse_number(charge_number)?);
        }
        if let Some((symbol, mass_number)) = s.split_once('-') {
            let charge_number = ELEMENT_SYMBOLS
                .iter()
                .skip(1)
                .position(|&candidate| candidate == symbol)
                .map(|idx| idx as u32 + 1)
                .ok_or_else(|| {
                    PropagationError::invalid(format!("Unknown element symbol {}", symbol))
                })?;
            return Self::nucleus(parse_number(mass_number)?, charge_number);
        }
        Err(PropagationError::invalid(format!("Unknown species {}", s)))
    }
}

/// Reason for terminating the propagation of a particle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum TerminationCause {
    Detected,
    EnergyCutoff,
    RedshiftCutoff,
    TrajectoryLimit,
    NumericalDivergence,
    Dropped,
    Aborted,
}

impl TerminationCause {
    /// Creates an array for iterating over all causes.
    pub fn all() -> [Self; 7] {
        [
            Self::Detected,
            Self::EnergyCutoff,
            Self::RedshiftCutoff,
            Self::TrajectoryLimit,
            Self::NumericalDivergence,
            Self::Dropped,
            Self::Aborted,
        ]
    }

    /// Returns the index of the cause in `all()`.
    pub fn idx(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Detected => "detected",
                Self::EnergyCutoff => "energy cutoff",
                Self::RedshiftCutoff => "redshift cutoff",
                Self::TrajectoryLimit => "trajectory limit",
                Self::NumericalDivergence => "numerical divergence",
                Self::Dropped => "dropped",
                Self::Aborted => "aborted",
            }
        )
    }
}

/// Whether a particle is still being propagated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParticleStatus {
    Active,
    Terminated(TerminationCause),
}

/// Immutable record of a particle's properties at a given moment.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct ParticleSnapshot {
    pub species: Species,
    /// Energy [J].
    pub energy: fpr,
    /// Unwrapped comoving position [m].
    pub position: Point3<fpr>,
    pub direction: Vec3<fpr>,
    pub redshift: fpr,
}

/// Adaptive stepping state carried along with each particle.
#[derive(Clone, Debug, PartialEq)]
pub struct StepControl {
    /// Step length the stepper would like to take next [m].
    pub next_step_length: fpr,
    /// Normalized error estimate of the previous accepted step.
    pub previous_error: fpr,
}

/// Full propagation state of a single particle.
#[derive(Clone, Debug)]
pub struct ParticleState {
    pub species: Species,
    /// Energy [J].
    pub energy: fpr,
    /// Comoving position, wrapped into the simulation volume if periodic [m].
    pub position: Point3<fpr>,
    /// Unit vector along the momentum.
    pub direction: Vec3<fpr>,
    pub redshift: fpr,
    /// Distance travelled since creation [m].
    pub trajectory_length: fpr,
    /// Net number of periodic wraps along each axis.
    pub wrap_counts: In3D<i64>,
    /// Offset that turns the wrapped position into the unwrapped one [m].
    pub source_displacement: Vec3<fpr>,
    /// Emission state of the primary this particle descends from.
    pub origin: ParticleSnapshot,
    /// State at the point where this particle was created.
    pub creation: ParticleSnapshot,
    /// Index of the particle within its branch.
    pub serial: usize,
    /// Index of the parent within its branch.
    pub parent: Option<usize>,
    /// Number of secondary generations since the primary.
    pub generation: u32,
    /// Number of pipeline steps taken along the branch up to this particle.
    pub step_count: u64,
    pub step_control: StepControl,
    pub status: ParticleStatus,
}

impl ParticleState {
    /// Creates a new active primary particle.
    pub fn new(
        species: Species,
        energy: fpr,
        position: Point3<fpr>,
        mut direction: Vec3<fpr>,
        redshift: fpr,
    ) -> Self {
        direction.normalize();
        let snapshot = ParticleSnapshot {
            species,
            energy,
            position: position.clone(),
            direction: direction.clone(),
            redshift,
        };
        Self {
            species,
            energy,
            position,
            direction,
            redshift,
            trajectory_length: 0.0,
            wrap_counts: In3D::same(0),
            source_displacement: Vec3::zero(),
            origin: snapshot.clone(),
            creation: snapshot,
            serial: 0,
            parent: None,
            generation: 0,
            step_count: 0,
            step_control: StepControl {
                next_step_length: fpr::INFINITY,
                previous_error: 1e-4,
            },
            status: ParticleStatus::Active,
        }
    }

    /// Creates a secondary particle at the current position of this particle.
    ///
    /// The secondary inherits position, direction, redshift, wrap state and
    /// origin, and starts with zero trajectory length.
    pub fn spawn_secondary(&self, species: Species, energy: fpr) -> Self {
        let creation = ParticleSnapshot {
            species,
            energy,
            position: self.unwrapped_position(),
            direction: self.direction.clone(),
            redshift: self.redshift,
        };
        Self {
            species,
            energy,
            position: self.position.clone(),
            direction: self.direction.clone(),
            redshift: self.redshift,
            trajectory_length: 0.0,
            wrap_counts: self.wrap_counts.clone(),
            source_displacement: self.source_displacement.clone(),
            origin: self.origin.clone(),
            creation,
            serial: 0,
            parent: Some(self.serial),
            generation: self.generation + 1,
            step_count: self.step_count,
            step_control: StepControl {
                next_step_length: self.step_control.next_step_length,
                previous_error: self.step_control.previous_error,
            },
            status: ParticleStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ParticleStatus::Active
    }

    /// Returns the termination cause if the particle is no longer active.
    pub fn termination_cause(&self) -> Option<TerminationCause> {
        match self.status {
            ParticleStatus::Active => None,
            ParticleStatus::Terminated(cause) => Some(cause),
        }
    }

    /// Marks the particle as inactive.
    pub fn terminate(&mut self, cause: TerminationCause) {
        self.status = ParticleStatus::Terminated(cause);
    }

    /// Returns the position the particle would have without periodic wrapping.
    pub fn unwrapped_position(&self) -> Point3<fpr> {
        &self.position + &self.source_displacement
    }

    /// Returns the true displacement from the emission point of the primary.
    pub fn true_displacement(&self) -> Vec3<fpr> {
        &self.unwrapped_position() - &self.origin.position
    }

    /// Returns the energy per nucleon for nuclei and the total energy otherwise [J].
    pub fn energy_per_nucleon(&self) -> fpr {
        match self.species.mass_number() {
            0 => self.energy,
            mass_number => self.energy / fpr::from(mass_number),
        }
    }

    /// Returns the Lorentz factor.
    pub fn lorentz_factor(&self) -> fpr {
        let rest_energy = self.species.rest_energy();
        if rest_energy > 0.0 {
            self.energy / rest_energy
        } else {
            fpr::INFINITY
        }
    }

    /// Returns the magnetic rigidity E/(Zec) expressed in volts.
    pub fn rigidity(&self) -> fpr {
        self.energy / self.species.charge()
    }

    /// Captures the current state in a snapshot, using the unwrapped position.
    pub fn snapshot(&self) -> ParticleSnapshot {
        ParticleSnapshot {
            species: self.species,
            energy: self.energy,
            position: self.unwrapped_position(),
            direction: self.direction.clone(),
            redshift: self.redshift,
        }
    }

    /// Whether position, direction and energy are all finite.
    pub fn is_finite(&self) -> bool {
        self.energy.is_finite()
            && self.position.is_finite()
            && self.direction.is_finite()
            && self.redshift.is_finite()
    }

    /// Returns the wrap count along the given dimension.
    pub fn wrap_count(&self, dim: Dim3) -> i64 {
        self.wrap_counts[dim]
    }
}
