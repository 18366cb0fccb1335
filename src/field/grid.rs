//! Fields tabulated on a regular periodic grid.

use super::FieldSampler;
use crate::{
    boundary::BoundaryBox,
    error::{ensure, PropagationResult},
    fpr,
    geometry::{Dim3, In3D, Point3, Vec3},
};
use ndarray::prelude::*;

/// Field tabulated on the nodes of a regular grid that repeats itself
/// along every axis.
///
/// Node `(i, j, k)` sits at `lower + (i, j, k)*cell_extents`, and the period
/// along each axis is the number of nodes times the cell extent. Values
/// between nodes are found by trilinear interpolation, wrapping around the
/// upper faces.
#[derive(Clone, Debug)]
pub struct GridField {
    lower: Point3<fpr>,
    cell_extents: Vec3<fpr>,
    shape: In3D<usize>,
    values: Array4<fpr>,
}

impl GridField {
    /// Relative tolerance used when comparing periods.
    const PERIOD_TOLERANCE: fpr = 1e-9;

    /// Creates a new grid field from node values with shape `(nx, ny, nz, 3)`.
    pub fn new(
        lower: Point3<fpr>,
        cell_extents: Vec3<fpr>,
        values: Array4<fpr>,
    ) -> PropagationResult<Self> {
        let (nx, ny, nz, n_components) = values.dim();
        ensure(
            n_components == 3,
            format!(
                "Grid field values must have three components (has {})",
                n_components
            ),
        )?;
        ensure(
            nx > 0 && ny > 0 && nz > 0,
            "Grid field must have at least one node along each axis",
        )?;
        ensure(
            Dim3::slice()
                .iter()
                .all(|&dim| cell_extents[dim] > 0.0 && cell_extents[dim].is_finite()),
            "Grid cell extents must be positive and finite",
        )?;
        ensure(
            values.iter().all(|value| value.is_finite()),
            "Grid field values must be finite",
        )?;
        Ok(Self {
            lower,
            cell_extents,
            shape: In3D::new(nx, ny, nz),
            values,
        })
    }

    /// Creates a grid field covering the given box by evaluating a function
    /// at every node.
    pub fn from_fn<E>(bounds: &BoundaryBox, shape: In3D<usize>, evaluate: E) -> PropagationResult<Self>
    where
        E: Fn(&Point3<fpr>) -> Vec3<fpr>,
    {
        ensure(
            shape[Dim3::X] > 0 && shape[Dim3::Y] > 0 && shape[Dim3::Z] > 0,
            "Grid shape must be positive along each axis",
        )?;
        let extents = bounds.extents();
        let cell_extents =
            Vec3::with_each_component(|dim| extents[dim] / (shape[dim] as fpr));
        let lower = bounds.lower().clone();
        let mut values = Array4::zeros((shape[Dim3::X], shape[Dim3::Y], shape[Dim3::Z], 3));
        for i in 0..shape[Dim3::X] {
            for j in 0..shape[Dim3::Y] {
                for k in 0..shape[Dim3::Z] {
                    let node = Point3::new(
                        lower[Dim3::X] + (i as fpr) * cell_extents[Dim3::X],
                        lower[Dim3::Y] + (j as fpr) * cell_extents[Dim3::Y],
                        lower[Dim3::Z] + (k as fpr) * cell_extents[Dim3::Z],
                    );
                    let field_vector = evaluate(&node);
                    for dim in Dim3::slice() {
                        values[[i, j, k, dim.num()]] = field_vector[dim];
                    }
                }
            }
        }
        Self::new(lower, cell_extents, values)
    }

    pub fn shape(&self) -> &In3D<usize> {
        &self.shape
    }

    /// Returns the period of the field along each axis.
    pub fn periods(&self) -> Vec3<fpr> {
        Vec3::with_each_component(|dim| (self.shape[dim] as fpr) * self.cell_extents[dim])
    }

    /// Returns the root mean square field strength over the nodes.
    pub fn rms_strength(&self) -> fpr {
        let n_nodes = (self.values.len() / 3) as fpr;
        (self.values.iter().map(|value| value * value).sum::<fpr>() / n_nodes).sqrt()
    }

    /// Scales the field so that its root mean square strength equals the given value.
    pub fn scale_to_rms_strength(&mut self, rms_strength: fpr) {
        let current = self.rms_strength();
        if current > 0.0 {
            let factor = rms_strength / current;
            self.values.mapv_inplace(|value| value * factor);
        }
    }

    fn node_value(&self, indices: [usize; 3], dim: Dim3) -> fpr {
        self.values[[indices[0], indices[1], indices[2], dim.num()]]
    }
}

impl FieldSampler for GridField {
    fn sample(&self, position: &Point3<fpr>) -> Vec3<fpr> {
        let mut lower_indices = [0_usize; 3];
        let mut upper_indices = [0_usize; 3];
        let mut weights = [0.0; 3];
        for dim in Dim3::slice() {
            let n = self.shape[dim] as i64;
            let coord = (position[dim] - self.lower[dim]) / self.cell_extents[dim];
            let floor = coord.floor();
            weights[dim.num()] = coord - floor;
            let idx = (floor as i64).rem_euclid(n);
            lower_indices[dim.num()] = idx as usize;
            upper_indices[dim.num()] = ((idx + 1) % n) as usize;
        }

        Vec3::with_each_component(|dim| {
            let mut value = 0.0;
            for corner in 0..8 {
                let mut indices = [0_usize; 3];
                let mut weight = 1.0;
                for (axis, index) in indices.iter_mut().enumerate() {
                    if (corner >> axis) & 1 == 1 {
                        *index = upper_indices[axis];
                        weight *= weights[axis];
                    } else {
                        *index = lower_indices[axis];
                        weight *= 1.0 - weights[axis];
                    }
                }
                value += weight * self.node_value(indices, dim);
            }
            value
        })
    }

    fn is_periodic_with(&self, bounds: &BoundaryBox) -> bool {
        let periods = self.periods();
        let extents = bounds.extents();
        Dim3::slice().iter().all(|&dim| {
            let ratio = extents[dim] / periods[dim];
            let rounded = ratio.round();
            rounded >= 1.0 && (ratio - rounded).abs() <= Self::PERIOD_TOLERANCE * rounded
        })
    }

    fn is_null(&self) -> bool {
        self.values.iter().all(|&value| value == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn sinusoidal_field(bounds: &BoundaryBox) -> GridField {
        let extent = bounds.extents()[Dim3::X];
        GridField::from_fn(bounds, In3D::new(16, 8, 4), |point| {
            Vec3::new(
                (2.0 * PI * point[Dim3::Y] / extent).sin(),
                (2.0 * PI * point[Dim3::Z] / extent).cos(),
                1.0,
            )
        })
        .unwrap()
    }

    #[test]
    fn samples_at_nodes_reproduce_values() {
        let bounds = BoundaryBox::cube(8.0).unwrap();
        let field = sinusoidal_field(&bounds);
        let sample = field.sample(&Point3::new(0.0, 2.0, 0.0));
        assert_abs_diff_eq!(sample[Dim3::X], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sample[Dim3::Y], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sample[Dim3::Z], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn sampling_is_periodic() {
        let bounds = BoundaryBox::cube(8.0).unwrap();
        let field = sinusoidal_field(&bounds);
        let delta = 0.37;
        let inside = field.sample(&Point3::new(delta, 1.0 + delta, 3.3));
        let outside = field.sample(&Point3::new(8.0 + delta, 1.0 + delta - 16.0, 3.3 + 8.0));
        for dim in Dim3::slice() {
            assert_abs_diff_eq!(inside[dim], outside[dim], epsilon = 1e-12);
        }
    }

    #[test]
    fn periodicity_check_accepts_multiples_only() {
        let bounds = BoundaryBox::cube(8.0).unwrap();
        let field = sinusoidal_field(&bounds);
        assert!(field.is_periodic_with(&bounds));
        assert!(field.is_periodic_with(&BoundaryBox::cube(16.0).unwrap()));
        assert!(!field.is_periodic_with(&BoundaryBox::cube(12.0).unwrap()));
        assert!(!field.is_periodic_with(&BoundaryBox::cube(4.0).unwrap()));
    }

    #[test]
    fn scaling_sets_rms_strength() {
        let bounds = BoundaryBox::cube(8.0).unwrap();
        let mut field = sinusoidal_field(&bounds);
        field.scale_to_rms_strength(3.0);
        assert_abs_diff_eq!(field.rms_strength(), 3.0, epsilon = 1e-12);
    }
}
