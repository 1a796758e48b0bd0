//! Linear world/index coordinate transform
//!
//! The grid transform is a pure scale: `w = r * i` with resolution `r` in
//! meters per voxel edge. World coordinates are f64 meters, index
//! coordinates are signed integers.

use crate::coord::Coord;
use nalgebra::Vector3;

/// Pure-scale linear transform between world and index space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransform {
    resolution: f64,
}

impl GridTransform {
    /// Create a transform with the given resolution (meters per voxel edge)
    ///
    /// The resolution must be strictly positive; this is enforced at map
    /// construction.
    pub fn new(resolution: f64) -> Self {
        debug_assert!(resolution > 0.0);
        Self { resolution }
    }

    /// Resolution in meters per voxel edge
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Map a world point to continuous index space (exact, no rounding)
    pub fn world_to_index(&self, w: Vector3<f64>) -> Vector3<f64> {
        w / self.resolution
    }

    /// Map an index coordinate to the world position of its index point
    pub fn index_to_world(&self, c: Coord) -> Vector3<f64> {
        Vector3::new(c.x as f64, c.y as f64, c.z as f64) * self.resolution
    }

    /// Map a continuous index-space point back to world space
    pub fn index_to_world_f(&self, i: Vector3<f64>) -> Vector3<f64> {
        i * self.resolution
    }

    /// Componentwise floor to the containing voxel coordinate
    pub fn floor_coord(v: Vector3<f64>) -> Coord {
        Coord::new(
            v.x.floor() as i32,
            v.y.floor() as i32,
            v.z.floor() as i32,
        )
    }

    /// Componentwise round to the nearest voxel coordinate
    ///
    /// Ties round away from zero (`f64::round`). Exact half-voxel ties do
    /// not occur for real sensor data.
    pub fn round_coord(v: Vector3<f64>) -> Coord {
        Coord::new(
            v.x.round() as i32,
            v.y.round() as i32,
            v.z.round() as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_world_index_inverse() {
        let tf = GridTransform::new(0.1);
        let w = Vector3::new(1.23, -4.56, 7.89);
        let back = tf.index_to_world_f(tf.world_to_index(w));
        assert_relative_eq!(back.x, w.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, w.y, epsilon = 1e-12);
        assert_relative_eq!(back.z, w.z, epsilon = 1e-12);
    }

    #[test]
    fn test_index_to_world() {
        let tf = GridTransform::new(0.5);
        let w = tf.index_to_world(Coord::new(2, -4, 0));
        assert_relative_eq!(w.x, 1.0);
        assert_relative_eq!(w.y, -2.0);
        assert_relative_eq!(w.z, 0.0);
    }

    #[test]
    fn test_floor_and_round() {
        let v = Vector3::new(1.9, -0.1, 2.5);
        assert_eq!(GridTransform::floor_coord(v), Coord::new(1, -1, 2));
        assert_eq!(GridTransform::round_coord(v), Coord::new(2, -0, 3));
    }

    #[test]
    fn test_interior_points_map_to_their_voxel() {
        let tf = GridTransform::new(0.1);
        // 0.95m lies strictly inside voxel 9 at 0.1m resolution
        let c = GridTransform::floor_coord(tf.world_to_index(Vector3::new(0.95, 0.0, 0.0)));
        assert_eq!(c, Coord::new(9, 0, 0));
    }

    proptest! {
        #[test]
        fn prop_roundtrip_within_half_voxel(
            x in -1000.0f64..1000.0,
            y in -1000.0f64..1000.0,
            z in -1000.0f64..1000.0,
            r in 0.01f64..2.0,
        ) {
            let tf = GridTransform::new(r);
            let w = Vector3::new(x, y, z);
            let c = GridTransform::round_coord(tf.world_to_index(w));
            let back = tf.index_to_world(c);
            // Rounding to the nearest index point moves at most half a voxel per axis
            prop_assert!((back.x - x).abs() <= r / 2.0 + 1e-9);
            prop_assert!((back.y - y).abs() <= r / 2.0 + 1e-9);
            prop_assert!((back.z - z).abs() <= r / 2.0 + 1e-9);
        }

        #[test]
        fn prop_floor_contains(
            x in -1000.0f64..1000.0,
            r in 0.01f64..2.0,
        ) {
            let tf = GridTransform::new(r);
            let i = tf.world_to_index(Vector3::new(x, 0.0, 0.0));
            let c = GridTransform::floor_coord(i);
            prop_assert!(c.x as f64 <= i.x);
            prop_assert!(i.x < (c.x + 1) as f64);
        }
    }
}
