//! Point cloud input types
//!
//! One observation is a set of range returns in the world frame plus the
//! sensor origin. Color and semantic label channels are optional per point;
//! decoding sensor messages into this form is the caller's job.

use crate::voxel::HitAttributes;
use nalgebra::Vector3;

/// A single range return in the world frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Position in world coordinates (meters)
    pub position: Vector3<f64>,
    /// Optional color channels, [0, 1] or [0, 255]
    pub color: Option<[f32; 3]>,
    /// Optional semantic label
    pub label: Option<i32>,
}

impl Point {
    /// Create a bare geometric point
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            color: None,
            label: None,
        }
    }

    /// Attach a color observation
    pub fn with_color(mut self, r: f32, g: f32, b: f32) -> Self {
        self.color = Some([r, g, b]);
        self
    }

    /// Attach a semantic label
    pub fn with_label(mut self, label: i32) -> Self {
        self.label = Some(label);
        self
    }

    /// True if all position components are finite
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|c| c.is_finite())
    }

    pub(crate) fn attributes(&self) -> HitAttributes {
        HitAttributes {
            color: self.color,
            label: self.label,
        }
    }
}

/// A batch of points forming one observation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    points: Vec<Point>,
}

impl PointCloud {
    /// Create an empty cloud
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cloud from bare positions
    pub fn from_positions<I>(positions: I) -> Self
    where
        I: IntoIterator<Item = Vector3<f64>>,
    {
        Self {
            points: positions
                .into_iter()
                .map(|position| Point {
                    position,
                    color: None,
                    label: None,
                })
                .collect(),
        }
    }

    /// Append a point
    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Iterate the points
    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the cloud holds no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl FromIterator<Point> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_builders() {
        let p = Point::new(1.0, 2.0, 3.0).with_color(10.0, 20.0, 30.0).with_label(4);
        assert_eq!(p.position, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(p.color, Some([10.0, 20.0, 30.0]));
        assert_eq!(p.label, Some(4));
        assert!(p.is_finite());
    }

    #[test]
    fn test_non_finite_detection() {
        assert!(!Point::new(f64::NAN, 0.0, 0.0).is_finite());
        assert!(!Point::new(0.0, f64::INFINITY, 0.0).is_finite());
    }

    #[test]
    fn test_cloud_from_positions() {
        let cloud = PointCloud::from_positions(vec![
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 1.0, 0.0),
        ]);
        assert_eq!(cloud.len(), 2);
        assert!(cloud.iter().all(|p| p.color.is_none()));
    }
}
