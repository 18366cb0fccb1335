//! Disintegration of nuclei by background photons.

use super::{
    interaction_occurs, mean_free_path::MeanFreePath, InteractionOutcome, InteractionProcess,
    PhotonBackground, DEFAULT_STEP_LIMIT_FRACTION,
};
use crate::{
    error::{ensure, PropagationResult},
    fpr,
    particle::{ParticleState, Species},
};
use rand::{Rng, RngCore};
use std::{collections::HashMap, sync::Arc};

/// Photo-disintegration of nuclei on a photon background.
///
/// Each interaction removes a single nucleon from the nucleus. The energy
/// per nucleon is unchanged, so the ejected nucleon carries E/A and the
/// remaining nucleus keeps the rest.
#[derive(Clone)]
pub struct PhotoDisintegration {
    background: PhotonBackground,
    mean_free_paths: HashMap<Species, Arc<dyn MeanFreePath>>,
    default_mean_free_path: Option<Arc<dyn MeanFreePath>>,
    create_nucleons: bool,
    step_limit_fraction: fpr,
}

impl PhotoDisintegration {
    pub fn new(background: PhotonBackground) -> Self {
        Self {
            background,
            mean_free_paths: HashMap::new(),
            default_mean_free_path: None,
            create_nucleons: true,
            step_limit_fraction: DEFAULT_STEP_LIMIT_FRACTION,
        }
    }

    /// Sets the mean free path, as a function of total energy, for the given nucleus.
    pub fn with_mean_free_path(
        mut self,
        species: Species,
        mean_free_path: Arc<dyn MeanFreePath>,
    ) -> PropagationResult<Self> {
        ensure(
            species.mass_number() > 1,
            format!("{} cannot be disintegrated", species),
        )?;
        self.mean_free_paths.insert(species, mean_free_path);
        Ok(self)
    }

    /// Sets the mean free path, as a function of energy per nucleon, used for
    /// nuclei without a dedicated entry.
    pub fn with_default_mean_free_path(mut self, mean_free_path: Arc<dyn MeanFreePath>) -> Self {
        self.default_mean_free_path = Some(mean_free_path);
        self
    }

    /// Whether to propagate the ejected nucleons.
    pub fn with_nucleon_secondaries(mut self, create_nucleons: bool) -> Self {
        self.create_nucleons = create_nucleons;
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

    fn mean_free_path(&self, particle: &ParticleState) -> fpr {
        if particle.species.mass_number() < 2 {
            return fpr::INFINITY;
        }
        match self.mean_free_paths.get(&particle.species) {
            Some(mean_free_path) => mean_free_path.mean_free_path(particle.energy, particle.redshift),
            None => self.default_mean_free_path.as_ref().map_or(fpr::INFINITY, |mean_free_path| {
                mean_free_path.mean_free_path(particle.energy_per_nucleon(), particle.redshift)
            }),
        }
    }
}

impl InteractionProcess for PhotoDisintegration {
    fn name(&self) -> String {
        format!("PhotoDisintegration({})", self.background)
    }

    fn acts_on(&self, particle: &ParticleState) -> bool {
        particle.species.mass_number() > 1
            && (self.default_mean_free_path.is_some()
                || self.mean_free_paths.contains_key(&particle.species))
    }

    fn propose_step_limit(&self, particle: &ParticleState) -> fpr {
        self.step_limit_fraction * self.mean_free_path(particle)
    }

    fn apply(
        &self,
        particle: &mut ParticleState,
        length: fpr,
        rng: &mut dyn RngCore,
    ) -> InteractionOutcome {
        if !self.acts_on(particle) || !interaction_occurs(self.mean_free_path(particle), length, rng)
        {
            return InteractionOutcome::NoInteraction;
        }

        let mass_number = particle.species.mass_number();
        let charge_number = particle.species.charge_number() as u32;
        let nucleon_energy = particle.energy_per_nucleon();

        let ejects_proton = rng.gen::<fpr>() * fpr::from(mass_number) < fpr::from(charge_number);
        let (nucleon, remnant) = if ejects_proton {
            (
                Species::proton(),
                Species::Nucleus {
                    mass_number: mass_number - 1,
                    charge_number: charge_number - 1,
                },
            )
        } else {
            (
                Species::neutron(),
                Species::Nucleus {
                    mass_number: mass_number - 1,
                    charge_number,
                },
            )
        };

        let secondaries = if self.create_nucleons {
            vec![particle.spawn_secondary(nucleon, nucleon_energy)]
        } else {
            Vec::new()
        };
        particle.species = remnant;
        particle.energy = (particle.energy - nucleon_energy).max(0.0);

        InteractionOutcome::Interaction {
            energy_loss: nucleon_energy,
            new_species: Some(remnant),
            secondaries,
        }
    }
}
