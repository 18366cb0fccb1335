//! Tabulated functions with linear interpolation.
//!
//! Queries outside the range of the tabulated coordinates are clamped to the
//! nearest edge value. This is the only extrapolation policy used anywhere in
//! the crate.

use crate::{
    error::{ensure, PropagationResult},
    fpr,
};
use ndarray::prelude::*;

/// Finds the index `i` of the lower node of the interval `[coords[i], coords[i+1]]`
/// containing `value`, together with the interpolation weight of the upper node.
///
/// Values outside the coordinate range are clamped, and NaN is treated as
/// the first coordinate.
fn locate(coords: &Array1<fpr>, value: fpr) -> (usize, fpr) {
    let n = coords.len();
    if n == 1 || value.is_nan() || value <= coords[0] {
        return (0, 0.0);
    }
    if value >= coords[n - 1] {
        return (n - 2, 1.0);
    }
    let slice = coords.as_slice().unwrap_or(&[]);
    let upper = if slice.is_empty() {
        coords.iter().position(|&coord| coord > value).unwrap_or(n - 1)
    } else {
        slice.partition_point(|&coord| coord <= value)
    };
    let lower = upper - 1;
    let weight = (value - coords[lower]) / (coords[upper] - coords[lower]);
    (lower, weight)
}

fn validate_coords(coords: &Array1<fpr>, name: &str) -> PropagationResult<()> {
    ensure(
        !coords.is_empty(),
        format!("Table {} coordinates must not be empty", name),
    )?;
    ensure(
        coords.iter().all(|coord| coord.is_finite()),
        format!("Table {} coordinates must be finite", name),
    )?;
    ensure(
        coords
            .iter()
            .zip(coords.iter().skip(1))
            .all(|(lower, upper)| upper > lower),
        format!("Table {} coordinates must be strictly increasing", name),
    )
}

/// One-dimensional table y(x).
#[derive(Clone, Debug)]
pub struct Table1 {
    x: Array1<fpr>,
    y: Array1<fpr>,
}

impl Table1 {
    /// Creates a new table from coordinates and values.
    pub fn new(x: Array1<fpr>, y: Array1<fpr>) -> PropagationResult<Self> {
        validate_coords(&x, "x")?;
        ensure(
            x.len() == y.len(),
            format!(
                "Table has {} coordinates but {} values",
                x.len(),
                y.len()
            ),
        )?;
        Ok(Self { x, y })
    }

    pub fn y(&self) -> &Array1<fpr> {
        &self.y
    }

    /// Interpolates the table linearly at the given coordinate.
    pub fn interpolate(&self, x: fpr) -> fpr {
        if self.x.len() == 1 {
            return self.y[0];
        }
        let (i, weight) = locate(&self.x, x);
        (1.0 - weight) * self.y[i] + weight * self.y[i + 1]
    }
}

/// Two-dimensional table z(x, y).
#[derive(Clone, Debug)]
pub struct Table2 {
    x: Array1<fpr>,
    y: Array1<fpr>,
    z: Array2<fpr>,
}

impl Table2 {
    /// Creates a new table where `z[[i, j]]` is the value at `(x[i], y[j])`.
    pub fn new(x: Array1<fpr>, y: Array1<fpr>, z: Array2<fpr>) -> PropagationResult<Self> {
        validate_coords(&x, "x")?;
        validate_coords(&y, "y")?;
        ensure(
            z.dim() == (x.len(), y.len()),
            format!(
                "Table value shape {:?} does not match coordinate lengths ({}, {})",
                z.dim(),
                x.len(),
                y.len()
            ),
        )?;
        Ok(Self { x, y, z })
    }

    /// Interpolates the table bilinearly at the given coordinates.
    pub fn interpolate(&self, x: fpr, y: fpr) -> fpr {
        let (i, wx) = if self.x.len() == 1 {
            (0, 0.0)
        } else {
            locate(&self.x, x)
        };
        let (j, wy) = if self.y.len() == 1 {
            (0, 0.0)
        } else {
            locate(&self.y, y)
        };
        let i_upper = (i + 1).min(self.x.len() - 1);
        let j_upper = (j + 1).min(self.y.len() - 1);
        (1.0 - wx) * (1.0 - wy) * self.z[[i, j]]
            + wx * (1.0 - wy) * self.z[[i_upper, j]]
            + (1.0 - wx) * wy * self.z[[i, j_upper]]
            + wx * wy * self.z[[i_upper, j_upper]]
    }
}

/// Inverse cumulative distribution built from a tabulated probability density.
#[derive(Clone, Debug)]
pub struct DistributionTable {
    x: Array1<fpr>,
    cumulative: Array1<fpr>,
}

impl DistributionTable {
    /// Creates a distribution from an unnormalized probability density
    /// tabulated at the given coordinates.
    pub fn from_pdf(x: Array1<fpr>, pdf: Array1<fpr>) -> PropagationResult<Self> {
        validate_coords(&x, "x")?;
        ensure(
            x.len() >= 2 && x.len() == pdf.len(),
            "Distribution needs at least two coordinates with one density value each",
        )?;
        ensure(
            pdf.iter().all(|&value| value >= 0.0 && value.is_finite()),
            "Probability densities must be finite and non-negative",
        )?;

        let mut cumulative = Array1::zeros(x.len());
        for i in 1..x.len() {
            cumulative[i] = cumulative[i - 1] + 0.5 * (pdf[i] + pdf[i - 1]) * (x[i] - x[i - 1]);
        }
        let total = cumulative[x.len() - 1];
        ensure(total > 0.0, "Probability density integrates to zero")?;
        cumulative.mapv_inplace(|value| value / total);

        Ok(Self { x, cumulative })
    }

    /// Returns the coordinate at which the cumulative probability equals `u`.
    ///
    /// `u` is clamped to `[0, 1]`.
    pub fn sample(&self, u: fpr) -> fpr {
        let u = u.max(0.0).min(1.0);
        let n = self.x.len();
        let upper = self
            .cumulative
            .iter()
            .position(|&value| value >= u)
            .unwrap_or(n - 1)
            .max(1);
        let lower = upper - 1;
        let span = self.cumulative[upper] - self.cumulative[lower];
        if span <= 0.0 {
            return self.x[lower];
        }
        let weight = (u - self.cumulative[lower]) / span;
        (1.0 - weight) * self.x[lower] + weight * self.x[upper]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn interpolation_is_linear_and_clamped() {
        let table = Table1::new(array![0.0, 1.0, 3.0], array![0.0, 2.0, 4.0]).unwrap();
        assert_abs_diff_eq!(table.interpolate(0.5), 1.0);
        assert_abs_diff_eq!(table.interpolate(2.0), 3.0);
        assert_abs_diff_eq!(table.interpolate(-5.0), 0.0);
        assert_abs_diff_eq!(table.interpolate(10.0), 4.0);
    }

    #[test]
    fn nan_queries_are_clamped_to_first_node() {
        let table = Table1::new(array![0.0, 1.0, 3.0], array![5.0, 2.0, 4.0]).unwrap();
        assert_abs_diff_eq!(table.interpolate(fpr::NAN), 5.0);

        let x = array![0.0, 1.0];
        let y = array![0.0, 10.0];
        let z = Array2::from_shape_fn((2, 2), |(i, j)| x[i] + y[j]);
        let table = Table2::new(x, y, z).unwrap();
        assert_abs_diff_eq!(table.interpolate(fpr::NAN, 10.0), 10.0);
    }

    #[test]
    fn non_increasing_coordinates_are_rejected() {
        assert!(Table1::new(array![0.0, 0.0], array![1.0, 2.0]).is_err());
        assert!(Table1::new(array![0.0, 1.0], array![1.0]).is_err());
    }

    #[test]
    fn bilinear_interpolation_reproduces_plane() {
        let x = array![0.0, 1.0, 2.0];
        let y = array![0.0, 10.0];
        let z = Array2::from_shape_fn((3, 2), |(i, j)| x[i] + 2.0 * y[j]);
        let table = Table2::new(x, y, z).unwrap();
        assert_abs_diff_eq!(table.interpolate(1.5, 2.5), 6.5, epsilon = 1e-12);
        assert_abs_diff_eq!(table.interpolate(5.0, 20.0), 22.0, epsilon = 1e-12);
    }

    #[test]
    fn uniform_distribution_samples_linearly() {
        let distribution = DistributionTable::from_pdf(array![1.0, 3.0], array![1.0, 1.0]).unwrap();
        assert_abs_diff_eq!(distribution.sample(0.0), 1.0);
        assert_abs_diff_eq!(distribution.sample(0.25), 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(distribution.sample(1.0), 3.0);
    }
}
