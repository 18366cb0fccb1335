//! Utilities related to numbers.

use num;
use std::fmt;

/// Floating point marker trait for easier control over trait bounds.
pub trait BFloat:
    Sync + Send + num::Float + num::cast::FromPrimitive + fmt::Debug + fmt::Display
{
}

impl BFloat for f32 {}
impl BFloat for f64 {}

/// Reduces `value` into `[lower, lower + extent)`.
///
/// Returns the reduced value together with the number of whole extents
/// that were subtracted (negative if extents were added). Non-finite
/// values are returned unchanged.
pub fn wrap_into_range<F: BFloat>(value: F, lower: F, extent: F) -> (F, i64) {
    let shifts = ((value - lower) / extent).floor();
    let mut count = match num::cast::<F, i64>(shifts) {
        Some(0) | None => return (value, 0),
        Some(count) => count,
    };
    let mut wrapped = value - shifts * extent;
    // Rounding can leave the value exactly on the upper edge
    if wrapped >= lower + extent {
        wrapped = (wrapped - extent).max(lower);
        count += 1;
    }
    (wrapped, count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn values_inside_range_are_untouched() {
        assert_eq!(wrap_into_range(0.25_f64, 0.0, 1.0), (0.25, 0));
        assert_eq!(wrap_into_range(0.0_f64, 0.0, 1.0), (0.0, 0));
    }

    #[test]
    fn upper_edge_maps_to_lower_edge() {
        assert_eq!(wrap_into_range(1.0_f64, 0.0, 1.0), (0.0, 1));
    }

    #[test]
    fn values_just_below_lower_edge_map_to_lower_edge() {
        assert_eq!(wrap_into_range(-1e-17_f64, 0.0, 10.0), (0.0, 0));
        let (wrapped, _) = wrap_into_range(3.0 - 1e-16_f64, 3.0, 10.0);
        assert!(wrapped >= 3.0 && wrapped < 13.0);
    }

    #[test]
    fn values_are_wrapped_by_whole_extents() {
        let (wrapped, count) = wrap_into_range(7.3_f64, -1.0, 2.0);
        assert_eq!(count, 4);
        assert_abs_diff_eq!(wrapped, -0.7, epsilon = 1e-12);

        let (wrapped, count) = wrap_into_range(-3.5_f64, 0.0, 1.0);
        assert_eq!(count, -4);
        assert_abs_diff_eq!(wrapped, 0.5, epsilon = 1e-12);
    }
}
