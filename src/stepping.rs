//! Advancing particles along their trajectories.

pub mod rectilinear;
pub mod redshift;
pub mod rkf;

use crate::{error::PropagationResult, field::FieldSampler, fpr, particle::ParticleState};

/// Summary of a single completed step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    /// Path length actually travelled [m].
    pub length: fpr,
    /// Angle between the directions before and after the step [rad].
    pub deflection: fpr,
    /// Number of attempts needed to produce an acceptable step.
    pub attempts: u32,
}

/// Defines the properties of a scheme for integrating the equation of
/// motion of a particle.
pub trait Stepper: Sync + Send {
    /// Returns the largest step length the stepper is willing to take next.
    fn propose_step_limit(&self, particle: &ParticleState) -> fpr;

    /// Advances the position and direction of the particle by a path length
    /// not exceeding `max_length`, and adds the travelled length to its
    /// trajectory length.
    ///
    /// # Returns
    ///
    /// A `PropagationResult` which is either:
    ///
    /// - `Ok`: Contains a `StepOutcome` describing the accepted step.
    /// - `Err`: Contains a `NumericalDivergence` error if no acceptable step
    ///   could be found. The particle is left unchanged in that case.
    fn advance(
        &self,
        particle: &mut ParticleState,
        max_length: fpr,
        field: &dyn FieldSampler,
    ) -> PropagationResult<StepOutcome>;
}
