//! Emission of primary particles.

use crate::{
    boundary::{BoundaryBox, PeriodicBoundary},
    cosmology::RedshiftMapping,
    error::{ensure, PropagationError, PropagationResult},
    fpr,
    geometry::{Dim3, Point3, Vec3},
    particle::{ParticleState, Species},
};
use rand::{Rng, RngCore};
use std::{f64::consts::PI, sync::Arc};

/// Defines the properties of a source of primary particles.
pub trait Source: Sync + Send {
    /// Draws a new active primary particle using the given random number generator.
    fn emit(&self, rng: &mut dyn RngCore) -> ParticleState;
}

/// Distribution of emission positions.
#[derive(Clone, Debug)]
pub enum PositionDistribution {
    Point(Point3<fpr>),
    /// Uniformly distributed within the box.
    UniformBox(BoundaryBox),
    /// Uniformly distributed within the sphere.
    UniformSphere { center: Point3<fpr>, radius: fpr },
}

/// Distribution of emission directions.
#[derive(Clone, Debug)]
pub enum DirectionDistribution {
    Fixed(Vec3<fpr>),
    Isotropic,
    /// Pointing from the emission position towards the given point.
    Towards(Point3<fpr>),
}

/// Energy spectrum of emitted particles, with `dN/dE ∝ E^-index`.
#[derive(Clone, Copy, Debug)]
pub enum Spectrum {
    Monoenergetic(fpr),
    PowerLaw {
        index: fpr,
        min_energy: fpr,
        max_energy: fpr,
    },
    /// Power law whose upper energy limit scales with the charge number,
    /// `E_max = Z * max_energy_per_charge`.
    PowerLawRigidityCutoff {
        index: fpr,
        min_energy: fpr,
        max_energy_per_charge: fpr,
    },
}

/// Distribution of emission redshifts.
#[derive(Clone)]
pub enum RedshiftDistribution {
    Fixed(fpr),
    Uniform { min: fpr, max: fpr },
    /// Distributed as `(1 + z)^exponent` between the limits.
    Evolution { min: fpr, max: fpr, exponent: fpr },
    /// Redshift corresponding to the distance between the emission
    /// position and the observer. With a periodic boundary the distance
    /// to the nearest periodic image of the observer is used.
    FromDistance {
        mapping: Arc<dyn RedshiftMapping>,
        observer_position: Point3<fpr>,
        periodic_boundary: Option<PeriodicBoundary>,
    },
}

/// Weighted set of emitted species.
#[derive(Clone, Debug)]
pub struct Composition {
    species: Vec<Species>,
    cumulative_weights: Vec<fpr>,
}

impl Composition {
    /// Creates a new composition from species and their relative abundances.
    ///
    /// The weights do not have to be normalized.
    pub fn new(weighted_species: Vec<(Species, fpr)>) -> PropagationResult<Self> {
        ensure(
            !weighted_species.is_empty(),
            "Source composition must contain at least one species",
        )?;
        ensure(
            weighted_species
                .iter()
                .all(|(_, weight)| *weight > 0.0 && weight.is_finite()),
            "Source composition weights must be positive and finite",
        )?;
        let (species, cumulative_weights): (Vec<_>, Vec<_>) = weighted_species
            .into_iter()
            .scan(0.0, |total, (species, weight)| {
                *total += weight;
                Some((species, *total))
            })
            .unzip();
        Ok(Self {
            species,
            cumulative_weights,
        })
    }

    /// Creates a composition containing a single species.
    pub fn single(species: Species) -> Self {
        Self {
            species: vec![species],
            cumulative_weights: vec![1.0],
        }
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    fn sample(&self, rng: &mut dyn RngCore) -> Species {
        let total = self.cumulative_weights[self.cumulative_weights.len() - 1];
        let value = rng.gen::<fpr>() * total;
        let idx = self
            .cumulative_weights
            .partition_point(|&cumulative_weight| cumulative_weight <= value)
            .min(self.species.len() - 1);
        self.species[idx]
    }
}

/// Source combining independent distributions of position, direction,
/// species, energy and redshift.
#[derive(Clone)]
pub struct CompositeSource {
    position: PositionDistribution,
    direction: DirectionDistribution,
    composition: Composition,
    spectrum: Spectrum,
    redshift: RedshiftDistribution,
}

impl CompositeSource {
    /// Creates a new composite source after validating its distributions.
    pub fn new(
        position: PositionDistribution,
        direction: DirectionDistribution,
        composition: Composition,
        spectrum: Spectrum,
        redshift: RedshiftDistribution,
    ) -> PropagationResult<Self> {
        validate_position(&position)?;
        validate_direction(&direction)?;
        validate_spectrum(&spectrum)?;
        validate_redshift(&redshift)?;
        Ok(Self {
            position,
            direction,
            composition,
            spectrum,
            redshift,
        })
    }

    fn sample_position(&self, rng: &mut dyn RngCore) -> Point3<fpr> {
        match &self.position {
            PositionDistribution::Point(point) => point.clone(),
            PositionDistribution::UniformBox(bounds) => {
                let fractions = [rng.gen::<fpr>(), rng.gen::<fpr>(), rng.gen::<fpr>()];
                let extents = bounds.extents();
                Point3::with_each_component(|dim| {
                    bounds.lower()[dim] + fractions[dim as usize] * extents[dim]
                })
            }
            PositionDistribution::UniformSphere { center, radius } => {
                let distance = radius * rng.gen::<fpr>().cbrt();
                center + &(sample_isotropic_direction(rng) * distance)
            }
        }
    }

    fn sample_direction(&self, rng: &mut dyn RngCore, position: &Point3<fpr>) -> Vec3<fpr> {
        match &self.direction {
            DirectionDistribution::Fixed(direction) => direction.normalized(),
            DirectionDistribution::Isotropic => sample_isotropic_direction(rng),
            DirectionDistribution::Towards(target) => {
                let offset = target - position;
                if offset.is_zero() {
                    sample_isotropic_direction(rng)
                } else {
                    offset.normalized()
                }
            }
        }
    }

    fn sample_energy(&self, rng: &mut dyn RngCore, species: Species) -> fpr {
        match self.spectrum {
            Spectrum::Monoenergetic(energy) => energy,
            Spectrum::PowerLaw {
                index,
                min_energy,
                max_energy,
            } => sample_power_law(rng.gen(), index, min_energy, max_energy),
            Spectrum::PowerLawRigidityCutoff {
                index,
                min_energy,
                max_energy_per_charge,
            } => {
                let charge_number = species.charge_number().unsigned_abs().max(1) as fpr;
                let max_energy = (charge_number * max_energy_per_charge).max(min_energy);
                sample_power_law(rng.gen(), index, min_energy, max_energy)
            }
        }
    }

    fn sample_redshift(&self, rng: &mut dyn RngCore, position: &Point3<fpr>) -> fpr {
        match &self.redshift {
            RedshiftDistribution::Fixed(redshift) => *redshift,
            RedshiftDistribution::Uniform { min, max } => min + rng.gen::<fpr>() * (max - min),
            RedshiftDistribution::Evolution { min, max, exponent } => {
                sample_power_law(rng.gen(), -exponent, 1.0 + min, 1.0 + max) - 1.0
            }
            RedshiftDistribution::FromDistance {
                mapping,
                observer_position,
                periodic_boundary,
            } => {
                let distance = match periodic_boundary {
                    Some(boundary) => boundary
                        .nearest_image_delta(position, observer_position)
                        .length(),
                    None => position.distance_to(observer_position),
                };
                mapping.redshift_at_distance(distance)
            }
        }
    }
}

impl Source for CompositeSource {
    fn emit(&self, rng: &mut dyn RngCore) -> ParticleState {
        let position = self.sample_position(rng);
        let direction = self.sample_direction(rng, &position);
        let species = self.composition.sample(rng);
        let energy = self.sample_energy(rng, species);
        let redshift = self.sample_redshift(rng, &position);
        ParticleState::new(species, energy, position, direction, redshift)
    }
}

fn validate_position(position: &PositionDistribution) -> PropagationResult<()> {
    match position {
        PositionDistribution::Point(point) => {
            ensure(point.is_finite(), "Source position must be finite")
        }
        PositionDistribution::UniformBox(_) => Ok(()),
        PositionDistribution::UniformSphere { center, radius } => {
            ensure(center.is_finite(), "Source sphere center must be finite")?;
            ensure(
                *radius > 0.0 && radius.is_finite(),
                "Source sphere radius must be positive and finite",
            )
        }
    }
}

fn validate_direction(direction: &DirectionDistribution) -> PropagationResult<()> {
    match direction {
        DirectionDistribution::Fixed(direction) => ensure(
            direction.is_finite() && !direction.is_zero(),
            "Fixed source direction must be finite and non-zero",
        ),
        DirectionDistribution::Isotropic => Ok(()),
        DirectionDistribution::Towards(target) => {
            ensure(target.is_finite(), "Source target point must be finite")
        }
    }
}

fn validate_spectrum(spectrum: &Spectrum) -> PropagationResult<()> {
    match *spectrum {
        Spectrum::Monoenergetic(energy) => ensure(
            energy > 0.0 && energy.is_finite(),
            "Source energy must be positive and finite",
        ),
        Spectrum::PowerLaw {
            index,
            min_energy,
            max_energy,
        } => {
            ensure(index.is_finite(), "Spectral index must be finite")?;
            ensure(
                min_energy > 0.0 && min_energy < max_energy && max_energy.is_finite(),
                format!(
                    "Spectrum energy range must satisfy 0 < min < max < inf (is [{:e}, {:e}])",
                    min_energy, max_energy
                ),
            )
        }
        Spectrum::PowerLawRigidityCutoff {
            index,
            min_energy,
            max_energy_per_charge,
        } => {
            ensure(index.is_finite(), "Spectral index must be finite")?;
            ensure(
                min_energy > 0.0
                    && min_energy < max_energy_per_charge
                    && max_energy_per_charge.is_finite(),
                "Spectrum cutoff energy must be finite and larger than the minimum energy",
            )
        }
    }
}

fn validate_redshift(redshift: &RedshiftDistribution) -> PropagationResult<()> {
    match redshift {
        RedshiftDistribution::Fixed(redshift) => ensure(
            *redshift > -1.0 && redshift.is_finite(),
            "Source redshift must be finite and larger than -1",
        ),
        RedshiftDistribution::Uniform { min, max }
        | RedshiftDistribution::Evolution { min, max, .. } => {
            if !(*min > -1.0 && min <= max && max.is_finite()) {
                return Err(PropagationError::invalid(format!(
                    "Source redshift range must satisfy -1 < min <= max < inf (is [{}, {}])",
                    min, max
                )));
            }
            if let RedshiftDistribution::Evolution { exponent, .. } = redshift {
                ensure(exponent.is_finite(), "Source evolution exponent must be finite")?;
            }
            Ok(())
        }
        RedshiftDistribution::FromDistance {
            observer_position,
            ..
        } => ensure(
            observer_position.is_finite(),
            "Observer position for source redshifts must be finite",
        ),
    }
}

/// Returns a unit vector drawn uniformly from the sphere.
pub fn sample_isotropic_direction(rng: &mut dyn RngCore) -> Vec3<fpr> {
    let cos_theta = 2.0 * rng.gen::<fpr>() - 1.0;
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * PI * rng.gen::<fpr>();
    Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

/// Maps a uniform variate in [0, 1) to a value distributed as `x^-index`
/// between the limits.
fn sample_power_law(uniform: fpr, index: fpr, lower: fpr, upper: fpr) -> fpr {
    if upper <= lower {
        return lower;
    }
    let exponent = 1.0 - index;
    if exponent.abs() < 1e-9 {
        lower * (upper / lower).powf(uniform)
    } else {
        let lower_term = lower.powf(exponent);
        (lower_term + uniform * (upper.powf(exponent) - lower_term))
            .powf(1.0 / exponent)
            .max(lower)
            .min(upper)
    }
}

/// Returns the point displaced from `center` by `distance` along the given axis.
pub fn offset_along(center: &Point3<fpr>, dim: Dim3, distance: fpr) -> Point3<fpr> {
    let mut position = center.clone();
    position[dim] += distance;
    position
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constants::EEV_TO_J, cosmology::LinearRedshiftMapping};
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn monoenergetic_proton_source(
        position: PositionDistribution,
        redshift: RedshiftDistribution,
    ) -> CompositeSource {
        CompositeSource::new(
            position,
            DirectionDistribution::Isotropic,
            Composition::single(Species::proton()),
            Spectrum::Monoenergetic(10.0 * EEV_TO_J),
            redshift,
        )
        .unwrap()
    }

    #[test]
    fn uniform_sphere_positions_stay_inside() {
        let center = Point3::new(1.0, 2.0, 3.0);
        let source = monoenergetic_proton_source(
            PositionDistribution::UniformSphere {
                center: center.clone(),
                radius: 0.5,
            },
            RedshiftDistribution::Fixed(0.0),
        );
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            let particle = source.emit(&mut rng);
            assert!(particle.position.distance_to(&center) <= 0.5);
            assert_relative_eq!(particle.direction.length(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn power_law_energies_stay_within_limits() {
        let mut rng = StdRng::seed_from_u64(2);
        for index in [1.0, 2.2, -0.5] {
            for _ in 0..1000 {
                let energy = sample_power_law(rng.gen(), index, 1.0, 100.0);
                assert!((1.0..=100.0).contains(&energy));
            }
        }
    }

    #[test]
    fn rigidity_cutoff_scales_with_charge() {
        let iron = Species::nucleus(56, 26).unwrap();
        let source = CompositeSource::new(
            PositionDistribution::Point(Point3::origin()),
            DirectionDistribution::Fixed(Vec3::new(0.0, 0.0, 1.0)),
            Composition::single(iron),
            Spectrum::PowerLawRigidityCutoff {
                index: -1.0,
                min_energy: 1.0,
                max_energy_per_charge: 10.0,
            },
            RedshiftDistribution::Fixed(0.0),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let max_energy = (0..1000)
            .map(|_| source.emit(&mut rng).energy)
            .fold(0.0, fpr::max);
        assert!(max_energy > 10.0);
        assert!(max_energy <= 260.0);
    }

    #[test]
    fn composition_follows_weights() {
        let composition =
            Composition::new(vec![(Species::proton(), 3.0), (Species::neutron(), 1.0)]).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let n_protons = (0..10000)
            .filter(|_| composition.sample(&mut rng) == Species::proton())
            .count();
        assert_relative_eq!(n_protons as fpr / 10000.0, 0.75, epsilon = 0.02);
    }

    #[test]
    fn redshift_follows_observer_distance() {
        let mapping = Arc::new(LinearRedshiftMapping::default());
        let observer_position = Point3::origin();
        let position = offset_along(&observer_position, Dim3::X, 0.01 * mapping.hubble_length());
        let source = monoenergetic_proton_source(
            PositionDistribution::Point(position),
            RedshiftDistribution::FromDistance {
                mapping,
                observer_position,
                periodic_boundary: None,
            },
        );
        let mut rng = StdRng::seed_from_u64(5);
        assert_relative_eq!(source.emit(&mut rng).redshift, 0.01, max_relative = 1e-9);
    }

    #[test]
    fn redshift_uses_nearest_periodic_image_of_observer() {
        let mapping = Arc::new(LinearRedshiftMapping::default());
        let hubble_length = mapping.hubble_length();
        let boundary = PeriodicBoundary::new(BoundaryBox::cube(0.1 * hubble_length).unwrap());
        let observer_position = Point3::new(
            0.005 * hubble_length,
            0.05 * hubble_length,
            0.05 * hubble_length,
        );
        let position = offset_along(&observer_position, Dim3::X, 0.09 * hubble_length);
        let source = monoenergetic_proton_source(
            PositionDistribution::Point(position),
            RedshiftDistribution::FromDistance {
                mapping,
                observer_position,
                periodic_boundary: Some(boundary),
            },
        );
        let mut rng = StdRng::seed_from_u64(6);
        assert_relative_eq!(source.emit(&mut rng).redshift, 0.01, max_relative = 1e-9);
    }

    #[test]
    fn invalid_distributions_are_rejected() {
        assert!(Composition::new(Vec::new()).is_err());
        assert!(CompositeSource::new(
            PositionDistribution::Point(Point3::origin()),
            DirectionDistribution::Fixed(Vec3::zero()),
            Composition::single(Species::proton()),
            Spectrum::Monoenergetic(1.0),
            RedshiftDistribution::Fixed(0.0),
        )
        .is_err());
        assert!(CompositeSource::new(
            PositionDistribution::Point(Point3::origin()),
            DirectionDistribution::Isotropic,
            Composition::single(Species::proton()),
            Spectrum::Monoenergetic(1.0),
            RedshiftDistribution::Uniform { min: 1.0, max: 0.5 },
        )
        .is_err());
    }
}
