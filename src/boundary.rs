//! Periodic simulation volumes.

use crate::{
    error::{ensure, PropagationResult},
    fpr,
    geometry::{Dim3, In3D, Point3, Vec3},
    num::wrap_into_range,
    particle::ParticleState,
};

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Axis-aligned box `[lower, upper)`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct BoundaryBox {
    lower: Point3<fpr>,
    upper: Point3<fpr>,
}

impl BoundaryBox {
    /// Creates a new box with the given lower and upper corners.
    pub fn new(lower: Point3<fpr>, upper: Point3<fpr>) -> PropagationResult<Self> {
        ensure(
            lower.is_finite() && upper.is_finite(),
            "Box corners must be finite",
        )?;
        for dim in Dim3::slice() {
            ensure(
                upper[dim] > lower[dim],
                format!(
                    "Upper box bound ({}) must be larger than lower bound ({}) along {}",
                    upper[dim], lower[dim], dim
                ),
            )?;
        }
        Ok(Self { lower, upper })
    }

    /// Creates a cube `[0, extent)^3`.
    pub fn cube(extent: fpr) -> PropagationResult<Self> {
        Self::new(Point3::origin(), Point3::new(extent, extent, extent))
    }

    pub fn lower(&self) -> &Point3<fpr> {
        &self.lower
    }

    pub fn upper(&self) -> &Point3<fpr> {
        &self.upper
    }

    /// Returns the side lengths of the box.
    pub fn extents(&self) -> Vec3<fpr> {
        &self.upper - &self.lower
    }

    /// Returns the center of the box.
    pub fn center(&self) -> Point3<fpr> {
        &self.lower + &(self.extents() * 0.5)
    }

    /// Whether the position lies inside the half-open box.
    pub fn contains(&self, position: &Point3<fpr>) -> bool {
        Dim3::slice()
            .iter()
            .all(|&dim| position[dim] >= self.lower[dim] && position[dim] < self.upper[dim])
    }
}

/// Maps particles leaving one face of a box back in through the opposite face.
///
/// The particle keeps integer wrap counts per axis, and its source
/// displacement is always recomputed as counts times extent. The unwrapped
/// position `position + source_displacement` is therefore unaffected by
/// wrapping, however many times it happens.
#[derive(Clone, Debug)]
pub struct PeriodicBoundary {
    bounds: BoundaryBox,
}

impl PeriodicBoundary {
    pub fn new(bounds: BoundaryBox) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &BoundaryBox {
        &self.bounds
    }

    /// Wraps the particle position into the box and updates its wrap
    /// counts and source displacement.
    ///
    /// Returns the number of additional wraps performed along each axis,
    /// which is zero everywhere if the particle was already inside.
    pub fn wrap(&self, particle: &mut ParticleState) -> In3D<i64> {
        let extents = self.bounds.extents();
        let mut additional = In3D::same(0);
        for dim in Dim3::slice() {
            let (wrapped, count) =
                wrap_into_range(particle.position[dim], self.bounds.lower[dim], extents[dim]);
            // Rounding at the lower face can give a moved position with zero net count
            particle.position[dim] = wrapped;
            if count != 0 {
                particle.wrap_counts[dim] += count;
                additional[dim] = count;
            }
            particle.source_displacement[dim] = (particle.wrap_counts[dim] as fpr) * extents[dim];
        }
        additional
    }

    /// Wraps a bare position into the box.
    pub fn wrap_position(&self, position: &Point3<fpr>) -> Point3<fpr> {
        let extents = self.bounds.extents();
        Point3::with_each_component(|dim| {
            wrap_into_range(position[dim], self.bounds.lower[dim], extents[dim]).0
        })
    }

    /// Returns the shortest displacement from `from` to any periodic image of `to`.
    pub fn nearest_image_delta(&self, from: &Point3<fpr>, to: &Point3<fpr>) -> Vec3<fpr> {
        let extents = self.bounds.extents();
        let delta = to - from;
        Vec3::with_each_component(|dim| {
            let half = 0.5 * extents[dim];
            wrap_into_range(delta[dim], -half, extents[dim]).0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::Species;
    use approx::assert_abs_diff_eq;

    fn particle_at(position: Point3<fpr>) -> ParticleState {
        ParticleState::new(
            Species::proton(),
            1.0,
            position,
            Vec3::new(1.0, 0.0, 0.0),
            0.0,
        )
    }

    #[test]
    fn invalid_boxes_are_rejected() {
        assert!(BoundaryBox::new(Point3::origin(), Point3::new(1.0, 0.0, 1.0)).is_err());
        assert!(BoundaryBox::cube(fpr::NAN).is_err());
    }

    #[test]
    fn wrapping_preserves_unwrapped_position() {
        let boundary = PeriodicBoundary::new(BoundaryBox::cube(10.0).unwrap());
        let mut particle = particle_at(Point3::new(5.0, 5.0, 5.0));
        particle.position = Point3::new(23.0, -4.0, 5.0);
        let unwrapped = particle.unwrapped_position();

        let additional = boundary.wrap(&mut particle);

        assert_eq!(additional, In3D::new(2, -1, 0));
        assert_abs_diff_eq!(particle.position[Dim3::X], 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(particle.position[Dim3::Y], 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(particle.source_displacement[Dim3::X], 20.0);
        assert_abs_diff_eq!(particle.source_displacement[Dim3::Y], -10.0);
        for dim in Dim3::slice() {
            assert_abs_diff_eq!(
                particle.unwrapped_position()[dim],
                unwrapped[dim],
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn wrapping_inside_box_is_a_no_op() {
        let boundary = PeriodicBoundary::new(BoundaryBox::cube(10.0).unwrap());
        let mut particle = particle_at(Point3::new(12.5, 1.0, 9.0));
        boundary.wrap(&mut particle);
        let position = particle.position.clone();
        let displacement = particle.source_displacement.clone();

        let additional = boundary.wrap(&mut particle);

        assert_eq!(additional, In3D::same(0));
        assert_eq!(particle.position, position);
        assert_eq!(particle.source_displacement, displacement);
    }

    #[test]
    fn positions_just_below_lower_face_end_up_inside() {
        let bounds = BoundaryBox::cube(10.0).unwrap();
        let boundary = PeriodicBoundary::new(bounds.clone());
        let mut particle = particle_at(Point3::new(-1e-17, 5.0, 5.0));

        let additional = boundary.wrap(&mut particle);

        assert!(bounds.contains(&particle.position));
        assert_eq!(additional, In3D::same(0));
        assert_eq!(particle.wrap_counts, In3D::same(0));
        assert!(bounds.contains(&boundary.wrap_position(&Point3::new(-1e-17, 5.0, 5.0))));
    }

    #[test]
    fn nearest_image_crosses_faces() {
        let boundary = PeriodicBoundary::new(BoundaryBox::cube(10.0).unwrap());
        let delta =
            boundary.nearest_image_delta(&Point3::new(9.0, 5.0, 1.0), &Point3::new(1.0, 5.0, 8.0));
        assert_abs_diff_eq!(delta[Dim3::X], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(delta[Dim3::Y], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(delta[Dim3::Z], -3.0, epsilon = 1e-12);
    }
}
