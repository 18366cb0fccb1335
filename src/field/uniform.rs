//! Spatially constant fields.

use super::FieldSampler;
use crate::{
    boundary::BoundaryBox,
    fpr,
    geometry::{Point3, Vec3},
};

/// Field with the same value everywhere.
#[derive(Clone, Debug)]
pub struct UniformField {
    value: Vec3<fpr>,
}

impl UniformField {
    pub fn new(value: Vec3<fpr>) -> Self {
        Self { value }
    }

    /// Creates a field that vanishes everywhere.
    pub fn zero() -> Self {
        Self::new(Vec3::zero())
    }

    pub fn value(&self) -> &Vec3<fpr> {
        &self.value
    }
}

impl FieldSampler for UniformField {
    fn sample(&self, _position: &Point3<fpr>) -> Vec3<fpr> {
        self.value.clone()
    }

    fn is_periodic_with(&self, _bounds: &BoundaryBox) -> bool {
        true
    }

    fn is_null(&self) -> bool {
        self.value.is_zero()
    }
}
