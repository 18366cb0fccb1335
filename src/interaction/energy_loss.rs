//! Continuous energy loss, such as electron pair production.

use super::{
    mean_free_path::MeanFreePath, InteractionOutcome, InteractionProcess, PhotonBackground,
    DEFAULT_STEP_LIMIT_FRACTION,
};
use crate::{
    error::{ensure, PropagationResult},
    fpr,
    particle::ParticleState,
};
use rand::RngCore;
use std::sync::Arc;

/// Deterministic drag E' = E exp(-L/λ) with an energy loss length λ.
///
/// The loss length is given for protons as a function of energy, and
/// scaled to a nucleus (A, Z) as λ_A(E) = λ_p(E/A) A/Z².
#[derive(Clone)]
pub struct ContinuousEnergyLoss {
    background: PhotonBackground,
    label: String,
    loss_length: Arc<dyn MeanFreePath>,
    step_limit_fraction: fpr,
}

impl ContinuousEnergyLoss {
    /// Creates a new energy loss process with the given label, such as
    /// `ElectronPairProduction`.
    pub fn new<S: Into<String>>(
        label: S,
        background: PhotonBackground,
        loss_length: Arc<dyn MeanFreePath>,
    ) -> Self {
        Self {
            background,
            label: label.into(),
            loss_length,
            step_limit_fraction: DEFAULT_STEP_LIMIT_FRACTION,
        }
    }

    pub fn with_step_limit_fraction(mut self, fraction: fpr) -> PropagationResult<Self> {
        ensure(
            fraction > 0.0,
            "Step limit fraction must be larger than zero",
        )?;
        self.step_limit_fraction = fraction;
        Ok(self)
    }

    /// Returns the energy loss length [m] of the particle.
    pub fn loss_length(&self, particle: &ParticleState) -> fpr {
        let mass_number = particle.species.mass_number();
        let charge_number = particle.species.charge_number();
        if mass_number == 0 || charge_number == 0 {
            return fpr::INFINITY;
        }
        let proton_length = self
            .loss_length
            .mean_free_path(particle.energy_per_nucleon(), particle.redshift);
        proton_length * fpr::from(mass_number) / fpr::from(charge_number * charge_number)
    }
}

impl InteractionProcess for ContinuousEnergyLoss {
    fn name(&self) -> String {
        format!("{}({})", self.label, self.background)
    }

    fn acts_on(&self, particle: &ParticleState) -> bool {
        particle.species.is_nucleus() && particle.species.is_charged()
    }

    fn propose_step_limit(&self, particle: &ParticleState) -> fpr {
        self.step_limit_fraction * self.loss_length(particle)
    }

    fn apply(
        &self,
        particle: &mut ParticleState,
        length: fpr,
        _rng: &mut dyn RngCore,
    ) -> InteractionOutcome {
        if !self.acts_on(particle) || length <= 0.0 {
            return InteractionOutcome::NoInteraction;
        }
        let loss_length = self.loss_length(particle);
        if !(loss_length.is_finite() && loss_length > 0.0) {
            return InteractionOutcome::NoInteraction;
        }
        let new_energy = particle.energy * fpr::exp(-length / loss_length);
        let energy_loss = particle.energy - new_energy;
        particle.energy = new_energy.max(0.0);
        InteractionOutcome::Interaction {
            energy_loss,
            new_species: None,
            secondaries: Vec::new(),
        }
    }
}
