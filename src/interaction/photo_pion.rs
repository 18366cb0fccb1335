//! Pion production in collisions of nucleons with background photons.

use super::{
    combine_mean_free_paths, interaction_occurs, mean_free_path::MeanFreePath, InteractionOutcome,
    InteractionProcess, PhotonBackground, DEFAULT_STEP_LIMIT_FRACTION,
};
use crate::{
    error::{ensure, PropagationResult},
    fpr,
    particle::{ParticleState, Species},
    table::DistributionTable,
};
use rand::{Rng, RngCore};
use std::sync::Arc;

/// Fraction of the nucleon energy carried away by the pion.
#[derive(Clone, Debug)]
pub enum Inelasticity {
    Fixed(fpr),
    Tabulated(DistributionTable),
}

impl Inelasticity {
    /// Typical inelasticity close to the Δ resonance.
    pub const DEFAULT_FIXED: fpr = 0.2;

    fn sample(&self, rng: &mut dyn RngCore) -> fpr {
        let value = match self {
            Self::Fixed(value) => *value,
            Self::Tabulated(distribution) => distribution.sample(rng.gen()),
        };
        value.max(0.0).min(1.0)
    }
}

/// Which pion decay products to create as secondaries.
#[derive(Clone, Copy, Debug, Default)]
pub struct PionSecondaries {
    pub photons: bool,
    pub neutrinos: bool,
    pub electrons: bool,
}

/// Photo-pion production on a photon background.
///
/// Nucleons lose a sampled fraction of their energy and convert between
/// proton and neutron with the isospin probability for the Δ resonance.
/// Nuclei are treated as superpositions of free nucleons, and an
/// interaction ejects the struck nucleon from the nucleus.
#[derive(Clone)]
pub struct PhotoPionProduction {
    background: PhotonBackground,
    proton_mean_free_path: Arc<dyn MeanFreePath>,
    neutron_mean_free_path: Arc<dyn MeanFreePath>,
    inelasticity: Inelasticity,
    secondaries: PionSecondaries,
    step_limit_fraction: fpr,
}

impl PhotoPionProduction {
    /// Probability that the struck nucleon changes isospin.
    const ISOSPIN_FLIP_PROBABILITY: fpr = 1.0 / 3.0;

    /// Creates a new process using the same mean free path for protons and neutrons.
    pub fn new(background: PhotonBackground, mean_free_path: Arc<dyn MeanFreePath>) -> Self {
        Self {
            background,
            proton_mean_free_path: Arc::clone(&mean_free_path),
            neutron_mean_free_path: mean_free_path,
            inelasticity: Inelasticity::Fixed(Inelasticity::DEFAULT_FIXED),
            secondaries: PionSecondaries::default(),
            step_limit_fraction: DEFAULT_STEP_LIMIT_FRACTION,
        }
    }

    pub fn with_neutron_mean_free_path(mut self, mean_free_path: Arc<dyn MeanFreePath>) -> Self {
        self.neutron_mean_free_path = mean_free_path;
        self
    }

    pub fn with_inelasticity(mut self, inelasticity: Inelasticity) -> PropagationResult<Self> {
        if let Inelasticity::Fixed(value) = inelasticity {
            ensure(
                value > 0.0 && value <= 1.0,
                format!("Inelasticity must be in the range (0, 1] (is {})", value),
            )?;
        }
        self.inelasticity = inelasticity;
        Ok(self)
    }

    pub fn with_secondaries(mut self, secondaries: PionSecondaries) -> Self {
        self.secondaries = secondaries;
        self
    }

    pub fn with_step_limit_fraction(mut self, fraction: fpr) -> PropagationResult<Self> {
        ensure(
            fraction > 0.0,
            "Step limit fraction must be larger than zero",
        )?;
        self.step_limit_fraction = fraction;
        Ok(self)
    }

    fn effective_mean_free_path(&self, particle: &ParticleState) -> fpr {
        let mass_number = particle.species.mass_number();
        if mass_number == 0 {
            return fpr::INFINITY;
        }
        let charge_number = particle.species.charge_number() as u32;
        let nucleon_energy = particle.energy_per_nucleon();
        let proton_mfp = self
            .proton_mean_free_path
            .mean_free_path(nucleon_energy, particle.redshift);
        let neutron_mfp = self
            .neutron_mean_free_path
            .mean_free_path(nucleon_energy, particle.redshift);
        combine_mean_free_paths([
            proton_mfp / fpr::from(charge_number),
            neutron_mfp / fpr::from(mass_number - charge_number),
        ])
    }

    /// Creates the decay products of the pion as secondaries of the particle.
    fn create_pion_products(
        &self,
        particle: &ParticleState,
        pion_charge: i32,
        pion_energy: fpr,
    ) -> Vec<ParticleState> {
        let mut products = Vec::new();
        match pion_charge {
            // π0 → γγ
            0 => {
                if self.secondaries.photons {
                    for _ in 0..2 {
                        products.push(particle.spawn_secondary(Species::Photon, 0.5 * pion_energy));
                    }
                }
            }
            // π± → μ± ν, μ± → e± ν ν
            _ => {
                let share = 0.25 * pion_energy;
                if self.secondaries.electrons {
                    let lepton = if pion_charge > 0 {
                        Species::Positron
                    } else {
                        Species::Electron
                    };
                    products.push(particle.spawn_secondary(lepton, share));
                }
                if self.secondaries.neutrinos {
                    let neutrinos = if pion_charge > 0 {
                        [
                            Species::MuonNeutrino,
                            Species::MuonAntineutrino,
                            Species::ElectronNeutrino,
                        ]
                    } else {
                        [
                            Species::MuonAntineutrino,
                            Species::MuonNeutrino,
                            Species::ElectronAntineutrino,
                        ]
                    };
                    for neutrino in neutrinos {
                        products.push(particle.spawn_secondary(neutrino, share));
                    }
                }
            }
        }
        products
    }
}

impl InteractionProcess for PhotoPionProduction {
    fn name(&self) -> String {
        format!("PhotoPionProduction({})", self.background)
    }

    fn acts_on(&self, particle: &ParticleState) -> bool {
        particle.species.is_nucleus()
    }

    fn propose_step_limit(&self, particle: &ParticleState) -> fpr {
        if !self.acts_on(particle) {
            return fpr::INFINITY;
        }
        self.step_limit_fraction * self.effective_mean_free_path(particle)
    }

    fn apply(
        &self,
        particle: &mut ParticleState,
        length: fpr,
        rng: &mut dyn RngCore,
    ) -> InteractionOutcome {
        if !self.acts_on(particle)
            || !interaction_occurs(self.effective_mean_free_path(particle), length, rng)
        {
            return InteractionOutcome::NoInteraction;
        }

        let mass_number = particle.species.mass_number();
        let charge_number = particle.species.charge_number() as u32;
        let nucleon_energy = particle.energy_per_nucleon();

        let struck_is_proton = rng.gen::<fpr>() * fpr::from(mass_number) < fpr::from(charge_number);
        let flips = rng.gen::<fpr>() < Self::ISOSPIN_FLIP_PROBABILITY;
        let (outgoing_nucleon, pion_charge) = match (struck_is_proton, flips) {
            (true, false) => (Species::proton(), 0),
            (true, true) => (Species::neutron(), 1),
            (false, false) => (Species::neutron(), 0),
            (false, true) => (Species::proton(), -1),
        };

        let inelasticity = self.inelasticity.sample(rng);
        let pion_energy = inelasticity * nucleon_energy;
        let outgoing_nucleon_energy = (nucleon_energy - pion_energy).max(0.0);
        let mut secondaries = self.create_pion_products(particle, pion_charge, pion_energy);

        if mass_number == 1 {
            let energy_loss = particle.energy - outgoing_nucleon_energy;
            let new_species = (outgoing_nucleon != particle.species).then_some(outgoing_nucleon);
            particle.species = outgoing_nucleon;
            particle.energy = outgoing_nucleon_energy;
            InteractionOutcome::Interaction {
                energy_loss,
                new_species,
                secondaries,
            }
        } else {
            let remnant = Species::Nucleus {
                mass_number: mass_number - 1,
                charge_number: if struck_is_proton {
                    charge_number - 1
                } else {
                    charge_number
                },
            };
            secondaries.push(particle.spawn_secondary(outgoing_nucleon, outgoing_nucleon_energy));
            particle.species = remnant;
            particle.energy = (particle.energy - nucleon_energy).max(0.0);
            InteractionOutcome::Interaction {
                energy_loss: nucleon_energy,
                new_species: Some(remnant),
                secondaries,
            }
        }
    }
}
