//! Spontaneous beta decay of unstable nuclei.

use super::{
    interaction_occurs, InteractionOutcome, InteractionProcess, DEFAULT_STEP_LIMIT_FRACTION,
};
use crate::{
    constants::{C_LIGHT, NEUTRON_DECAY_Q_VALUE, NEUTRON_LIFETIME},
    error::{ensure, PropagationResult},
    fpr,
    particle::{ParticleState, Species},
};
use rand::RngCore;
use std::collections::HashMap;

/// Kind of beta decay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BetaChannel {
    /// n → p e⁻ ν̄
    Minus,
    /// p → n e⁺ ν
    Plus,
}

/// Decay properties of a single unstable species.
#[derive(Clone, Copy, Debug)]
pub struct DecayMode {
    /// Mean lifetime in the rest frame [s].
    pub lifetime: fpr,
    pub channel: BetaChannel,
    /// Kinetic energy released in the rest frame [J].
    pub q_value: fpr,
}

/// Beta decay of nuclei with the decay length γcτ.
///
/// The daughter nucleus keeps the direction of the parent, and the lepton
/// pair shares the boosted decay energy equally.
#[derive(Clone, Debug)]
pub struct NuclearDecay {
    modes: HashMap<Species, DecayMode>,
    create_electrons: bool,
    create_neutrinos: bool,
    step_limit_fraction: fpr,
}

impl NuclearDecay {
    /// Creates a new decay process that knows about free neutron decay.
    pub fn new() -> Self {
        let mut modes = HashMap::new();
        modes.insert(
            Species::neutron(),
            DecayMode {
                lifetime: NEUTRON_LIFETIME,
                channel: BetaChannel::Minus,
                q_value: NEUTRON_DECAY_Q_VALUE,
            },
        );
        Self {
            modes,
            create_electrons: false,
            create_neutrinos: false,
            step_limit_fraction: DEFAULT_STEP_LIMIT_FRACTION,
        }
    }

    /// Registers the decay mode of an additional unstable nucleus.
    pub fn with_mode(mut self, species: Species, mode: DecayMode) -> PropagationResult<Self> {
        ensure(
            species.is_nucleus(),
            format!("Only nuclei can decay (got {})", species),
        )?;
        ensure(
            mode.lifetime > 0.0 && mode.q_value >= 0.0,
            "Decay lifetime must be positive and Q-value non-negative",
        )?;
        let charge_number = species.charge_number();
        let valid = match mode.channel {
            BetaChannel::Minus => (charge_number as u32) < species.mass_number(),
            BetaChannel::Plus => charge_number > 0,
        };
        ensure(
            valid,
            format!("{} cannot undergo the given beta decay", species),
        )?;
        self.modes.insert(species, mode);
        Ok(self)
    }

    pub fn with_secondaries(mut self, electrons: bool, neutrinos: bool) -> Self {
        self.create_electrons = electrons;
        self.create_neutrinos = neutrinos;
        self
    }

    /// Sets the fraction of the mean decay length proposed as step limit.
    pub fn with_step_limit_fraction(mut self, fraction: fpr) -> PropagationResult<Self> {
        ensure(
            fraction > 0.0,
            "Step limit fraction must be larger than zero",
        )?;
        self.step_limit_fraction = fraction;
        Ok(self)
    }

    /// Returns the mean decay length γcτ [m] of the particle.
    pub fn decay_length(&self, particle: &ParticleState) -> fpr {
        match self.modes.get(&particle.species) {
            Some(mode) => particle.lorentz_factor() * C_LIGHT * mode.lifetime,
            None => fpr::INFINITY,
        }
    }
}

impl Default for NuclearDecay {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionProcess for NuclearDecay {
    fn name(&self) -> String {
        "NuclearDecay".to_string()
    }

    fn acts_on(&self, particle: &ParticleState) -> bool {
        self.modes.contains_key(&particle.species)
    }

    fn propose_step_limit(&self, particle: &ParticleState) -> fpr {
        self.step_limit_fraction * self.decay_length(particle)
    }

    fn apply(
        &self,
        particle: &mut ParticleState,
        length: fpr,
        rng: &mut dyn RngCore,
    ) -> InteractionOutcome {
        let mode = match self.modes.get(&particle.species) {
            Some(mode) => *mode,
            None => return InteractionOutcome::NoInteraction,
        };
        if !interaction_occurs(self.decay_length(particle), length, rng) {
            return InteractionOutcome::NoInteraction;
        }

        let mass_number = particle.species.mass_number();
        let charge_number = particle.species.charge_number() as u32;
        let (daughter, lepton, neutrino) = match mode.channel {
            BetaChannel::Minus => (
                Species::Nucleus {
                    mass_number,
                    charge_number: charge_number + 1,
                },
                Species::Electron,
                Species::ElectronAntineutrino,
            ),
            BetaChannel::Plus => (
                Species::Nucleus {
                    mass_number,
                    charge_number: charge_number - 1,
                },
                Species::Positron,
                Species::ElectronNeutrino,
            ),
        };

        let lepton_energy = (0.5 * particle.lorentz_factor() * mode.q_value).min(0.5 * particle.energy);
        let mut secondaries = Vec::new();
        if self.create_electrons {
            secondaries.push(particle.spawn_secondary(lepton, lepton_energy));
        }
        if self.create_neutrinos {
            secondaries.push(particle.spawn_secondary(neutrino, lepton_energy));
        }

        let energy_loss = 2.0 * lepton_energy;
        particle.species = daughter;
        particle.energy = (particle.energy - energy_loss).max(0.0);

        InteractionOutcome::Interaction {
            energy_loss,
            new_species: Some(daughter),
            secondaries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::{EEV_TO_J, NEUTRON_REST_ENERGY},
        geometry::{Point3, Vec3},
    };
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn neutron_decay_length_is_dilated() {
        let decay = NuclearDecay::new();
        let energy = 1.0 * EEV_TO_J;
        let neutron = ParticleState::new(
            Species::neutron(),
            energy,
            Point3::origin(),
            Vec3::new(1.0, 0.0, 0.0),
            0.0,
        );
        assert_relative_eq!(
            decay.decay_length(&neutron),
            energy / NEUTRON_REST_ENERGY * C_LIGHT * NEUTRON_LIFETIME
        );
    }

    #[test]
    fn neutrons_decay_into_protons() {
        let decay = NuclearDecay::new().with_secondaries(true, true);
        let mut rng = StdRng::seed_from_u64(11);
        let mut neutron = ParticleState::new(
            Species::neutron(),
            1e9 * NEUTRON_REST_ENERGY,
            Point3::origin(),
            Vec3::new(1.0, 0.0, 0.0),
            0.0,
        );
        let initial_energy = neutron.energy;
        let outcome = decay.apply(&mut neutron, 1e40, &mut rng);

        assert_eq!(neutron.species, Species::proton());
        let secondaries = outcome.into_secondaries();
        assert_eq!(secondaries.len(), 2);
        let total: fpr = neutron.energy + secondaries.iter().map(|s| s.energy).sum::<fpr>();
        assert_relative_eq!(total, initial_energy);
    }

    #[test]
    fn stable_particles_never_decay() {
        let decay = NuclearDecay::new();
        let mut rng = StdRng::seed_from_u64(11);
        let mut proton = ParticleState::new(
            Species::proton(),
            1.0,
            Point3::origin(),
            Vec3::new(1.0, 0.0, 0.0),
            0.0,
        );
        assert!(!decay.apply(&mut proton, 1e40, &mut rng).occurred());
    }

    #[test]
    fn step_limit_scales_with_fraction() {
        let neutron = ParticleState::new(
            Species::neutron(),
            EEV_TO_J,
            Point3::origin(),
            Vec3::new(1.0, 0.0, 0.0),
            0.0,
        );
        let default_decay = NuclearDecay::new();
        let fine_decay = NuclearDecay::new().with_step_limit_fraction(0.01).unwrap();
        assert_relative_eq!(
            default_decay.propose_step_limit(&neutron),
            DEFAULT_STEP_LIMIT_FRACTION * default_decay.decay_length(&neutron)
        );
        assert_relative_eq!(
            fine_decay.propose_step_limit(&neutron),
            0.01 * fine_decay.decay_length(&neutron)
        );
        assert!(NuclearDecay::new().with_step_limit_fraction(0.0).is_err());
    }

    #[test]
    fn impossible_modes_are_rejected() {
        let mode = DecayMode {
            lifetime: 1.0,
            channel: BetaChannel::Plus,
            q_value: 0.0,
        };
        assert!(NuclearDecay::new().with_mode(Species::neutron(), mode).is_err());
    }
}
