//! Mappings between comoving path length and redshift.

use crate::{
    constants::{C_LIGHT, DEFAULT_HUBBLE_CONSTANT, DEFAULT_OMEGA_LAMBDA, DEFAULT_OMEGA_MATTER},
    error::{ensure, PropagationResult},
    fpr,
    table::Table1,
};
use ndarray::prelude::*;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Defines the relation between comoving distance travelled and redshift.
///
/// Implementations must be monotone: travelling a positive length always
/// lowers the redshift, and negative redshifts must be handled like any
/// other value.
pub trait RedshiftMapping: Sync + Send {
    /// Returns the redshift reached after travelling the given comoving
    /// length [m] starting at redshift `redshift`.
    fn redshift_after(&self, redshift: fpr, length: fpr) -> fpr;

    /// Returns the comoving distance [m] travelled by light between the
    /// two redshifts.
    fn distance_between(&self, redshift_1: fpr, redshift_2: fpr) -> fpr;

    /// Returns the redshift of light emitted at the given comoving
    /// distance [m] from an observer at z = 0.
    fn redshift_at_distance(&self, distance: fpr) -> fpr;
}

/// Linear relation z = D/L_H with a constant Hubble length L_H = c/H0.
///
/// Exact and invertible for redshifts of either sign.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct LinearRedshiftMapping {
    hubble_length: fpr,
}

impl LinearRedshiftMapping {
    /// Creates a new linear mapping for the given Hubble constant [1/s].
    pub fn new(hubble_constant: fpr) -> PropagationResult<Self> {
        ensure(
            hubble_constant > 0.0 && hubble_constant.is_finite(),
            format!(
                "Hubble constant must be positive and finite (is {})",
                hubble_constant
            ),
        )?;
        Ok(Self {
            hubble_length: C_LIGHT / hubble_constant,
        })
    }

    pub fn hubble_length(&self) -> fpr {
        self.hubble_length
    }
}

impl Default for LinearRedshiftMapping {
    fn default() -> Self {
        Self {
            hubble_length: C_LIGHT / DEFAULT_HUBBLE_CONSTANT,
        }
    }
}

impl RedshiftMapping for LinearRedshiftMapping {
    fn redshift_after(&self, redshift: fpr, length: fpr) -> fpr {
        redshift - length / self.hubble_length
    }

    fn distance_between(&self, redshift_1: fpr, redshift_2: fpr) -> fpr {
        (redshift_1 - redshift_2).abs() * self.hubble_length
    }

    fn redshift_at_distance(&self, distance: fpr) -> fpr {
        distance / self.hubble_length
    }
}

/// Configuration parameters for the flat ΛCDM cosmology.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct FlatLambdaCdmConfig {
    /// Hubble constant [1/s].
    pub hubble_constant: fpr,
    /// Present matter density parameter.
    pub omega_matter: fpr,
    /// Present dark energy density parameter.
    pub omega_lambda: fpr,
    /// Smallest tabulated redshift (must be larger than -1).
    pub min_redshift: fpr,
    /// Largest tabulated redshift.
    pub max_redshift: fpr,
    /// Number of nodes in the distance table.
    pub n_nodes: usize,
}

impl FlatLambdaCdmConfig {
    pub const DEFAULT_MIN_REDSHIFT: fpr = -0.9;
    pub const DEFAULT_MAX_REDSHIFT: fpr = 100.0;
    pub const DEFAULT_N_NODES: usize = 1000;

    /// Number of trapezoidal sub-intervals used between table nodes.
    const SUBDIVISIONS: usize = 16;

    /// Returns an error if any of the configuration parameter values are invalid.
    pub fn validate(&self) -> PropagationResult<()> {
        ensure(
            self.hubble_constant > 0.0 && self.hubble_constant.is_finite(),
            "Hubble constant must be positive and finite",
        )?;
        ensure(
            self.omega_matter >= 0.0 && self.omega_lambda >= 0.0,
            "Density parameters must be non-negative",
        )?;
        ensure(
            self.omega_matter + self.omega_lambda > 0.0,
            "Density parameters cannot both be zero",
        )?;
        ensure(
            self.min_redshift > -1.0,
            format!(
                "Minimum tabulated redshift must be larger than -1 (is {})",
                self.min_redshift
            ),
        )?;
        ensure(
            self.max_redshift > self.min_redshift.max(0.0),
            "Maximum tabulated redshift must be larger than zero and the minimum redshift",
        )?;
        ensure(
            self.n_nodes >= 2,
            "Distance table needs at least two nodes",
        )
    }
}

impl Default for FlatLambdaCdmConfig {
    fn default() -> Self {
        Self {
            hubble_constant: DEFAULT_HUBBLE_CONSTANT,
            omega_matter: DEFAULT_OMEGA_MATTER,
            omega_lambda: DEFAULT_OMEGA_LAMBDA,
            min_redshift: Self::DEFAULT_MIN_REDSHIFT,
            max_redshift: Self::DEFAULT_MAX_REDSHIFT,
            n_nodes: Self::DEFAULT_N_NODES,
        }
    }
}

/// Spatially flat cosmology with matter and a cosmological constant.
///
/// The comoving distance D(z) = (c/H0)∫dz/E(z) is tabulated once on nodes
/// evenly spaced in ln(1 + z), and both D(z) and its inverse are
/// interpolated on the same nodes. Redshifts outside the tabulated range
/// are clamped.
#[derive(Clone, Debug)]
pub struct FlatLambdaCdm {
    config: FlatLambdaCdmConfig,
    distance_of_redshift: Table1,
    redshift_of_distance: Table1,
}

impl FlatLambdaCdm {
    /// Creates a new cosmology by tabulating the comoving distance.
    pub fn new(config: FlatLambdaCdmConfig) -> PropagationResult<Self> {
        config.validate()?;

        let hubble_length = C_LIGHT / config.hubble_constant;
        let inverse_hubble_rate = |z: fpr| {
            1.0 / (config.omega_matter * (1.0 + z).powi(3) + config.omega_lambda).sqrt()
        };

        let redshifts = Array1::linspace(
            config.min_redshift.ln_1p(),
            config.max_redshift.ln_1p(),
            config.n_nodes,
        )
        .mapv(fpr::exp_m1);

        let integrate = |lower: fpr, upper: fpr| {
            let dz = (upper - lower) / (FlatLambdaCdmConfig::SUBDIVISIONS as fpr);
            (0..FlatLambdaCdmConfig::SUBDIVISIONS)
                .map(|k| {
                    let z = lower + (k as fpr) * dz;
                    0.5 * (inverse_hubble_rate(z) + inverse_hubble_rate(z + dz)) * dz
                })
                .sum::<fpr>()
        };

        // Accumulate outward from the node closest to z = 0 so that D(0) = 0
        let zero_idx = redshifts
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.abs().total_cmp(&b.abs()))
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        let mut distances = Array1::zeros(config.n_nodes);
        distances[zero_idx] = hubble_length * integrate(0.0, redshifts[zero_idx]);
        for i in zero_idx + 1..config.n_nodes {
            distances[i] = distances[i - 1] + hubble_length * integrate(redshifts[i - 1], redshifts[i]);
        }
        for i in (0..zero_idx).rev() {
            distances[i] = distances[i + 1] - hubble_length * integrate(redshifts[i], redshifts[i + 1]);
        }

        let distance_of_redshift = Table1::new(redshifts.clone(), distances.clone())?;
        let redshift_of_distance = Table1::new(distances, redshifts)?;

        Ok(Self {
            config,
            distance_of_redshift,
            redshift_of_distance,
        })
    }

    pub fn config(&self) -> &FlatLambdaCdmConfig {
        &self.config
    }

    /// Returns the signed comoving distance [m] to redshift `redshift`.
    pub fn comoving_distance(&self, redshift: fpr) -> fpr {
        self.distance_of_redshift.interpolate(redshift)
    }
}

impl RedshiftMapping for FlatLambdaCdm {
    fn redshift_after(&self, redshift: fpr, length: fpr) -> fpr {
        self.redshift_of_distance
            .interpolate(self.comoving_distance(redshift) - length)
    }

    fn distance_between(&self, redshift_1: fpr, redshift_2: fpr) -> fpr {
        (self.comoving_distance(redshift_1) - self.comoving_distance(redshift_2)).abs()
    }

    fn redshift_at_distance(&self, distance: fpr) -> fpr {
        self.redshift_of_distance.interpolate(distance)
    }
}
