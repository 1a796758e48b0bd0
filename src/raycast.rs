//! 3D digital differential analyzer
//!
//! Steps through every voxel pierced by a ray, one face crossing at a
//! time, in the order the ray visits them (Amanatides & Woo, "A Fast Voxel
//! Traversal Algorithm for Ray Tracing", 1987). Traversal happens in
//! continuous index space; direction vectors only matter up to positive
//! scale.

use crate::coord::Coord;
use crate::transform::GridTransform;
use nalgebra::Vector3;

/// Incremental voxel walker along a ray
#[derive(Debug, Clone)]
pub struct Dda {
    voxel: Coord,
    step: [i32; 3],
    t_max: [f64; 3],
    t_delta: [f64; 3],
}

impl Dda {
    /// Start a traversal at `origin` (continuous index space) along
    /// `direction`
    ///
    /// Axes with zero direction never advance.
    pub fn new(origin: Vector3<f64>, direction: Vector3<f64>) -> Self {
        let voxel = GridTransform::floor_coord(origin);
        let cell = [voxel.x, voxel.y, voxel.z];
        let mut step = [0i32; 3];
        let mut t_max = [f64::INFINITY; 3];
        let mut t_delta = [f64::INFINITY; 3];

        for axis in 0..3 {
            let d = direction[axis];
            if d > 0.0 {
                step[axis] = 1;
                t_max[axis] = ((cell[axis] + 1) as f64 - origin[axis]) / d;
                t_delta[axis] = 1.0 / d;
            } else if d < 0.0 {
                step[axis] = -1;
                t_max[axis] = (cell[axis] as f64 - origin[axis]) / d;
                t_delta[axis] = -1.0 / d;
            }
        }

        Self {
            voxel,
            step,
            t_max,
            t_delta,
        }
    }

    /// The voxel the walker currently occupies
    pub fn voxel(&self) -> Coord {
        self.voxel
    }

    /// Advance to the next voxel along the ray
    pub fn step(&mut self) {
        let axis = if self.t_max[0] < self.t_max[1] {
            if self.t_max[0] < self.t_max[2] {
                0
            } else {
                2
            }
        } else if self.t_max[1] < self.t_max[2] {
            1
        } else {
            2
        };

        match axis {
            0 => self.voxel.x += self.step[0],
            1 => self.voxel.y += self.step[1],
            _ => self.voxel.z += self.step[2],
        }
        self.t_max[axis] += self.t_delta[axis];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(origin: Vector3<f64>, direction: Vector3<f64>, steps: usize) -> Vec<Coord> {
        let mut dda = Dda::new(origin, direction);
        let mut visited = vec![dda.voxel()];
        for _ in 0..steps {
            dda.step();
            visited.push(dda.voxel());
        }
        visited
    }

    #[test]
    fn test_axis_aligned_positive() {
        let visited = walk(Vector3::new(0.5, 0.5, 0.5), Vector3::new(1.0, 0.0, 0.0), 3);
        assert_eq!(
            visited,
            vec![
                Coord::new(0, 0, 0),
                Coord::new(1, 0, 0),
                Coord::new(2, 0, 0),
                Coord::new(3, 0, 0),
            ]
        );
    }

    #[test]
    fn test_axis_aligned_negative() {
        let visited = walk(Vector3::new(0.5, 0.5, 0.5), Vector3::new(0.0, -2.0, 0.0), 2);
        assert_eq!(
            visited,
            vec![Coord::new(0, 0, 0), Coord::new(0, -1, 0), Coord::new(0, -2, 0)]
        );
    }

    #[test]
    fn test_origin_on_cell_corner() {
        let visited = walk(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0), 2);
        assert_eq!(
            visited,
            vec![Coord::new(0, 0, 0), Coord::new(1, 0, 0), Coord::new(2, 0, 0)]
        );
    }

    #[test]
    fn test_diagonal_orders_crossings() {
        // First boundary hit is y (0.1 away), then x (0.9 away)
        let visited = walk(Vector3::new(0.1, 0.9, 0.5), Vector3::new(1.0, 1.0, 0.0), 2);
        assert_eq!(
            visited,
            vec![Coord::new(0, 0, 0), Coord::new(0, 1, 0), Coord::new(1, 1, 0)]
        );
    }

    #[test]
    fn test_negative_index_space() {
        let visited = walk(Vector3::new(-0.5, -0.5, -0.5), Vector3::new(-1.0, 0.0, 0.0), 2);
        assert_eq!(
            visited,
            vec![Coord::new(-1, -1, -1), Coord::new(-2, -1, -1), Coord::new(-3, -1, -1)]
        );
    }

    #[test]
    fn test_zero_direction_never_moves() {
        let mut dda = Dda::new(Vector3::new(2.5, 2.5, 2.5), Vector3::zeros());
        let start = dda.voxel();
        dda.step();
        assert_eq!(dda.voxel(), start);
    }

    #[test]
    fn test_visits_are_face_adjacent() {
        let visited = walk(
            Vector3::new(0.3, 0.7, 0.1),
            Vector3::new(1.7, -0.6, 2.3),
            20,
        );
        for pair in visited.windows(2) {
            let d = pair[1] - pair[0];
            assert_eq!(d.x.abs() + d.y.abs() + d.z.abs(), 1);
        }
    }
}
