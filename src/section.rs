//! Detached map sections
//!
//! A section is a self-describing sub-region extract of the persistent
//! grid: a sparse grid of the voxels that were active inside an index-space
//! bounding box, tagged with that box as metadata. Sections are detached
//! objects with no aliasing into the map they came from; applying one back
//! replaces the boxed region atomically.

use crate::coord::{Coord, CoordBox};
use crate::error::{Error, Result};
use crate::grid::VoxelGrid;
use serde::{Deserialize, Serialize};

/// A sub-region of a map, carrying its inclusive index-space bounding box
///
/// The element type distinguishes the two extraction variants: `Section<V>`
/// carries full voxel values, `Section<bool>` carries activity only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section<V> {
    grid: VoxelGrid<V>,
    #[serde(default)]
    bb_min: Option<Coord>,
    #[serde(default)]
    bb_max: Option<Coord>,
}

impl<V> Section<V> {
    /// Create a section from an extracted grid and its bounding box
    pub fn new(grid: VoxelGrid<V>, bb: CoordBox) -> Self {
        Self {
            grid,
            bb_min: Some(bb.min),
            bb_max: Some(bb.max),
        }
    }

    /// The section's voxels
    pub fn grid(&self) -> &VoxelGrid<V> {
        &self.grid
    }

    /// The bounding box metadata
    ///
    /// Fails with [`Error::SectionMetadataMissing`] when either corner is
    /// absent, which can happen for sections decoded from external data.
    pub fn bounding_box(&self) -> Result<CoordBox> {
        match (self.bb_min, self.bb_max) {
            (Some(min), Some(max)) => Ok(CoordBox::new(min, max)),
            _ => Err(Error::SectionMetadataMissing),
        }
    }

    /// Number of voxels recorded in the section
    pub fn len(&self) -> usize {
        self.grid.len()
    }

    /// True if the section records no voxels
    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }
}
