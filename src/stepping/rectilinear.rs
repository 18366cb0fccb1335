//! Straight-line stepping for neutral particles or vanishing fields.

use super::{StepOutcome, Stepper};
use crate::{
    error::{ensure, PropagationResult},
    field::FieldSampler,
    fpr,
    particle::ParticleState,
};

/// Stepper that moves particles along straight lines, ignoring the field.
#[derive(Clone, Debug)]
pub struct RectilinearStepper {
    max_step_length: fpr,
}

impl RectilinearStepper {
    pub const DEFAULT_MAX_STEP_LENGTH: fpr = fpr::INFINITY;

    /// Creates a new rectilinear stepper taking steps no longer than the given length.
    pub fn new(max_step_length: fpr) -> PropagationResult<Self> {
        ensure(
            max_step_length > 0.0,
            "Maximum step length must be larger than zero",
        )?;
        Ok(Self { max_step_length })
    }
}

impl Default for RectilinearStepper {
    fn default() -> Self {
        Self {
            max_step_length: Self::DEFAULT_MAX_STEP_LENGTH,
        }
    }
}

impl Stepper for RectilinearStepper {
    fn propose_step_limit(&self, _particle: &ParticleState) -> fpr {
        self.max_step_length
    }

    fn advance(
        &self,
        particle: &mut ParticleState,
        max_length: fpr,
        _field: &dyn FieldSampler,
    ) -> PropagationResult<StepOutcome> {
        let length = max_length.min(self.max_step_length);
        particle.position = &particle.position + &particle.direction * length;
        particle.trajectory_length += length;
        Ok(StepOutcome {
            length,
            deflection: 0.0,
            attempts: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        field::uniform::UniformField,
        geometry::{Dim3, Point3, Vec3},
        particle::Species,
    };
    use approx::assert_abs_diff_eq;

    #[test]
    fn particles_move_in_straight_lines() {
        let stepper = RectilinearStepper::new(5.0).unwrap();
        let mut particle = ParticleState::new(
            Species::Photon,
            1.0,
            Point3::origin(),
            Vec3::new(3.0, 4.0, 0.0),
            0.0,
        );
        let field = UniformField::new(Vec3::new(0.0, 0.0, 1.0));
        let outcome = stepper.advance(&mut particle, 10.0, &field).unwrap();
        assert_eq!(outcome.length, 5.0);
        assert_abs_diff_eq!(particle.position[Dim3::X], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(particle.position[Dim3::Y], 4.0, epsilon = 1e-12);
        assert_eq!(particle.trajectory_length, 5.0);
    }
}
