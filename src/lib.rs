//! # voxmap
//!
//! Probabilistic sparse voxel occupancy mapping for mobile robots and
//! perception stacks.
//!
//! voxmap ingests 3D point clouds together with the sensor origin and
//! maintains a volumetric map of the environment as a sparse voxel grid.
//! Each voxel carries a log-odds occupancy estimate, and the reference
//! payload additionally tracks a running color estimate and a majority
//! semantic label.
//!
//! ## Key Features
//!
//! - **Sparse blocked storage**: lazily allocated 8x8x8 leaf nodes, with
//!   accessor handles that cache the last-touched leaf for raycast speed
//! - **Raycast updates**: a 3D DDA marks free space along each ray and the
//!   endpoint voxel as occupied, with endpoint-bias correction
//! - **Log-odds Bayesian fusion**: clamped additive updates with
//!   hysteresis thresholds, and a change grid recording flipped voxels
//! - **Section protocol**: bounded sub-region extract/apply for map
//!   exchange
//! - **Persistence**: CRC-checked LZ4 container snapshots
//!
//! ## Example
//!
//! ```rust
//! use nalgebra::Vector3;
//! use voxmap::{Map, MapConfig, OccupancyMap, Point, PointCloud};
//!
//! # fn main() -> voxmap::Result<()> {
//! // 10cm voxels
//! let mut map: OccupancyMap = Map::new(0.1)?;
//! map.set_config(&MapConfig::default())?;
//!
//! // One observation: a single return at 1m along +x
//! let cloud: PointCloud = [Point::new(0.94, 0.0, 0.0)].into_iter().collect();
//! let (update, change) = map.insert_point_cloud(&cloud, Vector3::zeros())?;
//! assert!(!update.is_empty());
//!
//! // Query the map by casting a ray against it
//! let hit = map.raytrace(Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0), 5.0);
//! # let _ = (change, hit);
//! # Ok(())
//! # }
//! ```

pub mod cloud;
pub mod config;
pub mod coord;
pub mod error;
pub mod grid;
pub mod io;
pub mod map;
pub mod raycast;
pub mod section;
pub mod transform;
pub mod voxel;

// Re-export commonly used types
pub use crate::cloud::{Point, PointCloud};
pub use crate::config::MapConfig;
pub use crate::coord::{Coord, CoordBox};
pub use crate::error::{Error, Result};
pub use crate::grid::VoxelGrid;
pub use crate::map::{ChangeGrid, Map, OccupancyMap, UpdateGrid};
pub use crate::section::Section;
pub use crate::transform::GridTransform;
pub use crate::voxel::{HitAttributes, LogOdds, OccupancyVoxel, VoxelData};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
