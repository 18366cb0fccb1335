//! Detection of particles reaching an observer sphere within a redshift window.

use crate::{
    boundary::PeriodicBoundary,
    error::{ensure, PropagationResult},
    fpr,
    geometry::{Point3, Vec3},
    particle::{ParticleSnapshot, ParticleState, Species, TerminationCause},
};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Configuration parameters for observers.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct ObserverConfig {
    /// Center of the observer sphere [m].
    pub position: Point3<fpr>,
    /// Radius of the observer sphere [m].
    pub radius: fpr,
    /// Smallest redshift at which particles are detected.
    pub min_redshift: fpr,
    /// Largest redshift at which particles are detected.
    pub max_redshift: fpr,
    /// Smallest step length proposed when approaching the sphere, relative
    /// to its radius.
    pub relative_surface_tolerance: fpr,
}

impl ObserverConfig {
    pub const DEFAULT_MIN_REDSHIFT: fpr = fpr::NEG_INFINITY;
    pub const DEFAULT_MAX_REDSHIFT: fpr = fpr::INFINITY;
    pub const DEFAULT_RELATIVE_SURFACE_TOLERANCE: fpr = 1e-6;

    /// Creates a configuration for a sphere at the given position with
    /// an unbounded redshift window.
    pub fn new(position: Point3<fpr>, radius: fpr) -> Self {
        Self {
            position,
            radius,
            min_redshift: Self::DEFAULT_MIN_REDSHIFT,
            max_redshift: Self::DEFAULT_MAX_REDSHIFT,
            relative_surface_tolerance: Self::DEFAULT_RELATIVE_SURFACE_TOLERANCE,
        }
    }

    /// Returns an error if any of the configuration parameter values are invalid.
    pub fn validate(&self) -> PropagationResult<()> {
        ensure(
            self.position.is_finite(),
            "Observer position must be finite",
        )?;
        ensure(
            self.radius > 0.0 && self.radius.is_finite(),
            format!(
                "Observer radius must be positive and finite (is {})",
                self.radius
            ),
        )?;
        ensure(
            !self.min_redshift.is_nan() && !self.max_redshift.is_nan(),
            "Observer redshift window bounds cannot be NaN",
        )?;
        ensure(
            self.min_redshift <= self.max_redshift,
            format!(
                "Observer minimum redshift ({}) cannot exceed maximum redshift ({})",
                self.min_redshift, self.max_redshift
            ),
        )?;
        ensure(
            self.relative_surface_tolerance > 0.0 && self.relative_surface_tolerance < 1.0,
            "Relative surface tolerance must be in the range (0, 1)",
        )
    }
}

/// Immutable record of a detected particle.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct DetectionRecord {
    /// Index of the primary in the run.
    pub primary_index: u64,
    /// Index of the particle within the branch of its primary.
    pub serial: usize,
    /// Index of the parent within the branch.
    pub parent: Option<usize>,
    pub generation: u32,
    /// Pipeline step count of the branch at detection.
    pub step_count: u64,
    pub species: Species,
    /// Energy at detection [J].
    pub energy: fpr,
    /// Unwrapped position at detection [m].
    pub position: Point3<fpr>,
    pub direction: Vec3<fpr>,
    pub redshift: fpr,
    /// Path length travelled since creation [m].
    pub trajectory_length: fpr,
    /// Distance from the observer center at detection [m].
    pub observer_distance: fpr,
    /// Emission state of the primary.
    pub origin: ParticleSnapshot,
    /// Creation state of the detected particle.
    pub creation: ParticleSnapshot,
}

/// Sphere that records and deactivates particles entering it while
/// their redshift lies within a window.
///
/// With periodic boundaries the distance is measured to the nearest
/// periodic image of the observer, so particles that have wrapped any
/// number of times are still seen.
#[derive(Clone, Debug)]
pub struct Observer {
    config: ObserverConfig,
    boundary: Option<PeriodicBoundary>,
}

impl Observer {
    /// Creates a new observer, using nearest-image distances if a periodic
    /// boundary is given.
    pub fn new(
        config: ObserverConfig,
        boundary: Option<&PeriodicBoundary>,
    ) -> PropagationResult<Self> {
        config.validate()?;
        if let Some(boundary) = boundary {
            let extents = boundary.bounds().extents();
            ensure(
                2.0 * config.radius < extents.min(),
                format!(
                    "Observer diameter ({}) must be smaller than the smallest box extent ({})",
                    2.0 * config.radius,
                    extents.min()
                ),
            )?;
        }
        Ok(Self {
            config,
            boundary: boundary.cloned(),
        })
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    /// Returns the distance from the particle to the observer center.
    pub fn distance(&self, particle: &ParticleState) -> fpr {
        match &self.boundary {
            Some(boundary) => boundary
                .nearest_image_delta(&particle.position, &self.config.position)
                .length(),
            None => particle.position.distance_to(&self.config.position),
        }
    }

    /// Whether the redshift lies within the detection window.
    pub fn redshift_in_window(&self, redshift: fpr) -> bool {
        redshift >= self.config.min_redshift && redshift <= self.config.max_redshift
    }

    /// Returns the longest step that cannot carry the particle across the
    /// sphere surface without landing inside it.
    ///
    /// Particles already inside the sphere are not constrained.
    pub fn propose_step_limit(&self, particle: &ParticleState) -> fpr {
        let gap = self.distance(particle) - self.config.radius;
        if gap <= 0.0 {
            fpr::INFINITY
        } else {
            gap.max(self.config.relative_surface_tolerance * self.config.radius)
        }
    }

    /// Checks whether the particle is detected, in which case it is
    /// deactivated and a detection record is returned.
    pub fn check(&self, particle: &mut ParticleState, primary_index: u64) -> Option<DetectionRecord> {
        if !particle.is_active() || !self.redshift_in_window(particle.redshift) {
            return None;
        }
        let observer_distance = self.distance(particle);
        let tolerance = self.config.relative_surface_tolerance * self.config.radius;
        if observer_distance > self.config.radius + tolerance {
            return None;
        }
        particle.terminate(TerminationCause::Detected);
        Some(DetectionRecord {
            primary_index,
            serial: particle.serial,
            parent: particle.parent,
            generation: particle.generation,
            step_count: particle.step_count,
            species: particle.species,
            energy: particle.energy,
            position: particle.unwrapped_position(),
            direction: particle.direction.clone(),
            redshift: particle.redshift,
            trajectory_length: particle.trajectory_length,
            observer_distance,
            origin: particle.origin.clone(),
            creation: particle.creation.clone(),
        })
    }
}
