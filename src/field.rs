//! Vector fields sampled by the steppers.

pub mod grid;
pub mod uniform;

use crate::{
    boundary::BoundaryBox,
    fpr,
    geometry::{Point3, Vec3},
};

/// Defines the properties of a vector field that can be sampled at
/// arbitrary positions.
///
/// Samplers are shared read-only between worker threads.
pub trait FieldSampler: Sync + Send {
    /// Returns the field vector at the given position.
    fn sample(&self, position: &Point3<fpr>) -> Vec3<fpr>;

    /// Whether the field repeats itself with the periods given by the
    /// extents of the box.
    ///
    /// Periodic boundaries may only be combined with fields for which
    /// this holds, since wrapping would otherwise jump across a field
    /// discontinuity.
    fn is_periodic_with(&self, bounds: &BoundaryBox) -> bool;

    /// Whether the field vanishes everywhere.
    fn is_null(&self) -> bool {
        false
    }
}
