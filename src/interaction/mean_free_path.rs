//! Mean free paths as functions of energy and redshift.

use crate::{
    error::{ensure, PropagationError, PropagationResult},
    fpr,
    table::{Table1, Table2},
};
use ndarray::prelude::*;

/// Defines the properties of a mean free path λ(E, z).
pub trait MeanFreePath: Sync + Send {
    /// Returns the mean free path [m] for the given energy [J] and redshift.
    ///
    /// An infinite value means the interaction does not happen.
    fn mean_free_path(&self, energy: fpr, redshift: fpr) -> fpr;
}

/// Mean free path independent of energy and redshift.
#[derive(Clone, Debug)]
pub struct ConstantMeanFreePath(fpr);

impl ConstantMeanFreePath {
    pub fn new(mean_free_path: fpr) -> PropagationResult<Self> {
        ensure(
            mean_free_path > 0.0,
            "Mean free path must be larger than zero",
        )?;
        Ok(Self(mean_free_path))
    }
}

impl MeanFreePath for ConstantMeanFreePath {
    fn mean_free_path(&self, _energy: fpr, _redshift: fpr) -> fpr {
        self.0
    }
}

fn validate_mean_free_paths<'a, I>(values: I) -> PropagationResult<()>
where
    I: IntoIterator<Item = &'a fpr>,
{
    for &value in values {
        ensure(
            value > 0.0,
            format!("Tabulated mean free paths must be positive (found {})", value),
        )?;
    }
    Ok(())
}

fn validate_energies(energies: &Array1<fpr>) -> PropagationResult<()> {
    ensure(
        energies.iter().all(|&energy| energy > 0.0),
        "Tabulated energies must be positive",
    )
}

/// Mean free path tabulated over energy and redshift, interpolated
/// linearly in ln E, z and ln λ.
///
/// Infinite tabulated values are allowed and mark energies where the
/// interaction does not happen.
#[derive(Clone, Debug)]
pub struct TabulatedMeanFreePath {
    log_table: Table2,
}

impl TabulatedMeanFreePath {
    /// Creates a new table where `mean_free_paths[[i, j]]` is the value
    /// at `(energies[i], redshifts[j])`.
    pub fn new(
        energies: Array1<fpr>,
        redshifts: Array1<fpr>,
        mean_free_paths: Array2<fpr>,
    ) -> PropagationResult<Self> {
        validate_energies(&energies)?;
        validate_mean_free_paths(mean_free_paths.iter())?;
        let log_table = Table2::new(
            energies.mapv(fpr::ln),
            redshifts,
            mean_free_paths.mapv(|value| value.ln().min(fpr::MAX.ln())),
        )?;
        Ok(Self { log_table })
    }

    /// Creates a new table valid at all redshifts.
    pub fn from_energy_table(
        energies: Array1<fpr>,
        mean_free_paths: Array1<fpr>,
    ) -> PropagationResult<Self> {
        let n = mean_free_paths.len();
        let values = mean_free_paths.into_shape_with_order((n, 1)).map_err(|err| {
            PropagationError::invalid(format!(
                "Could not reshape mean free paths: {}",
                err
            ))
        })?;
        Self::new(energies, array![0.0], values)
    }
}

impl MeanFreePath for TabulatedMeanFreePath {
    fn mean_free_path(&self, energy: fpr, redshift: fpr) -> fpr {
        if energy <= 0.0 {
            return fpr::INFINITY;
        }
        let log_value = self.log_table.interpolate(energy.ln(), redshift);
        if log_value >= fpr::MAX.ln() {
            fpr::INFINITY
        } else {
            log_value.exp()
        }
    }
}

/// Mean free path at redshift zero, scaled to other redshifts as for a
/// background whose photon density grows as (1 + z)^3 with energies
/// growing as (1 + z):
///
/// λ(E, z) = λ0(E(1 + z)) / ((1 + z)^3 s(z))
///
/// where s(z) is an optional tabulated evolution factor with s(0) = 1.
#[derive(Clone, Debug)]
pub struct RedshiftScaledMeanFreePath {
    present: TabulatedMeanFreePath,
    evolution: Option<Table1>,
}

impl RedshiftScaledMeanFreePath {
    /// Smallest value of 1 + z used in the scaling.
    const MIN_SCALE_FACTOR: fpr = 1e-3;

    pub fn new(present: TabulatedMeanFreePath) -> Self {
        Self {
            present,
            evolution: None,
        }
    }

    /// Adds an evolution factor s(z) tabulated over redshift.
    pub fn with_evolution(mut self, evolution: Table1) -> PropagationResult<Self> {
        validate_mean_free_paths(evolution.y().iter())?;
        self.evolution = Some(evolution);
        Ok(self)
    }
}

impl MeanFreePath for RedshiftScaledMeanFreePath {
    fn mean_free_path(&self, energy: fpr, redshift: fpr) -> fpr {
        let scale = (1.0 + redshift).max(Self::MIN_SCALE_FACTOR);
        let evolution = self
            .evolution
            .as_ref()
            .map_or(1.0, |table| table.interpolate(redshift));
        self.present.mean_free_path(energy * scale, 0.0) / (scale.powi(3) * evolution)
    }
}
