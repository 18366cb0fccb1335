//! Redshift evolution and adiabatic energy loss along the trajectory.

use crate::{cosmology::RedshiftMapping, fpr, particle::ParticleState};
use std::sync::Arc;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// How redshift evolves once the particle reaches the present epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub enum RedshiftEvolutionMode {
    /// Redshift decreases until z = 0 and then stays there.
    Standard,
    /// Redshift keeps decreasing into negative values.
    Future,
}

/// Updates the redshift of particles according to the comoving length
/// travelled, and optionally applies the adiabatic energy loss
/// E' = E(1 + z')/(1 + z).
#[derive(Clone)]
pub struct RedshiftEvolution {
    mapping: Arc<dyn RedshiftMapping>,
    mode: RedshiftEvolutionMode,
    adiabatic_losses: bool,
}

impl RedshiftEvolution {
    /// Creates a new redshift evolution using the given mapping, with
    /// adiabatic losses enabled.
    pub fn new(mapping: Arc<dyn RedshiftMapping>, mode: RedshiftEvolutionMode) -> Self {
        Self {
            mapping,
            mode,
            adiabatic_losses: true,
        }
    }

    /// Enables or disables adiabatic energy loss.
    pub fn with_adiabatic_losses(mut self, adiabatic_losses: bool) -> Self {
        self.adiabatic_losses = adiabatic_losses;
        self
    }

    pub fn mode(&self) -> RedshiftEvolutionMode {
        self.mode
    }

    pub fn mapping(&self) -> &Arc<dyn RedshiftMapping> {
        &self.mapping
    }

    /// Returns the redshift the particle will have after travelling the given length.
    pub fn redshift_after(&self, redshift: fpr, length: fpr) -> fpr {
        match self.mode {
            RedshiftEvolutionMode::Standard if redshift <= 0.0 => redshift,
            RedshiftEvolutionMode::Standard => {
                self.mapping.redshift_after(redshift, length).max(0.0)
            }
            RedshiftEvolutionMode::Future => self.mapping.redshift_after(redshift, length),
        }
    }

    /// Updates the redshift and energy of the particle for the given travelled length.
    pub fn apply(&self, particle: &mut ParticleState, length: fpr) {
        let old_redshift = particle.redshift;
        let new_redshift = self.redshift_after(old_redshift, length);
        if new_redshift == old_redshift {
            return;
        }
        if self.adiabatic_losses {
            let factor = (1.0 + new_redshift) / (1.0 + old_redshift);
            particle.energy *= factor.max(0.0);
        }
        particle.redshift = new_redshift;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cosmology::LinearRedshiftMapping,
        geometry::{Point3, Vec3},
        particle::Species,
    };
    use approx::assert_abs_diff_eq;

    fn particle_at_redshift(redshift: fpr) -> ParticleState {
        ParticleState::new(
            Species::proton(),
            1.0,
            Point3::origin(),
            Vec3::new(1.0, 0.0, 0.0),
            redshift,
        )
    }

    #[test]
    fn standard_evolution_stops_at_present() {
        let mapping = LinearRedshiftMapping::default();
        let length = 0.3 * mapping.hubble_length();
        let evolution = RedshiftEvolution::new(Arc::new(mapping), RedshiftEvolutionMode::Standard);
        let mut particle = particle_at_redshift(0.1);
        evolution.apply(&mut particle, length);
        assert_eq!(particle.redshift, 0.0);
        assert_abs_diff_eq!(particle.energy, 1.0 / 1.1, epsilon = 1e-12);
    }

    #[test]
    fn future_evolution_reaches_negative_redshift() {
        let mapping = LinearRedshiftMapping::default();
        let length = 0.3 * mapping.hubble_length();
        let evolution = RedshiftEvolution::new(Arc::new(mapping), RedshiftEvolutionMode::Future)
            .with_adiabatic_losses(false);
        let mut particle = particle_at_redshift(0.1);
        evolution.apply(&mut particle, length);
        assert_abs_diff_eq!(particle.redshift, -0.2, epsilon = 1e-12);
        assert_eq!(particle.energy, 1.0);
    }
}
