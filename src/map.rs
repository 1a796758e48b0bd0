//! The occupancy mapping engine
//!
//! `Map` owns the persistent voxel grid and a transient update grid. One
//! observation cycle raycasts a point cloud into the update grid (misses
//! along each ray, a hit at each endpoint), then fuses the accumulated
//! evidence into the persistent grid with log-odds updates, handing the
//! update grid and a change grid (the voxels whose classification flipped)
//! back to the caller.
//!
//! All operations are synchronous and single-threaded; the engine has no
//! internal locking. Callers overlapping acquisition with mapping keep the
//! stages on their own threads and hand clouds across explicitly.

use crate::cloud::PointCloud;
use crate::config::MapConfig;
use crate::coord::{Coord, CoordBox};
use crate::error::{Error, Result};
use crate::grid::{Accessor, VoxelGrid};
use crate::io;
use crate::raycast::Dda;
use crate::section::Section;
use crate::transform::GridTransform;
use crate::voxel::{HitAttributes, LogOdds, OccupancyVoxel, VoxelData};
use log::{debug, info, warn};
use nalgebra::{Matrix4, Vector3, Vector4};
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// One observation's staged evidence: hit/miss payloads per voxel
pub type UpdateGrid = VoxelGrid<bool>;
/// Voxels whose active classification flipped during one fusion pass
pub type ChangeGrid = VoxelGrid<bool>;

#[derive(Debug, Clone)]
struct Params {
    odds: LogOdds,
    max_range: f64,
    static_env: bool,
    history_cap: usize,
    map_dir: PathBuf,
}

/// Sparse probabilistic occupancy map over voxel payload `V`
///
/// The engine is monomorphized over its payload type; [`OccupancyMap`] is
/// the common instantiation.
pub struct Map<V: VoxelData = OccupancyVoxel> {
    transform: GridTransform,
    grid: VoxelGrid<V>,
    update: UpdateGrid,
    hit_attrs: FxHashMap<Coord, HitAttributes>,
    params: Option<Params>,
}

/// Occupancy map with the reference color+semantics payload
pub type OccupancyMap = Map<OccupancyVoxel>;

impl<V: VoxelData> Map<V> {
    /// Create an empty map at the given resolution (meters per voxel edge)
    pub fn new(resolution: f64) -> Result<Self> {
        if !(resolution > 0.0 && resolution.is_finite()) {
            return Err(Error::InvalidInput(format!(
                "resolution {} must be strictly positive",
                resolution
            )));
        }
        Ok(Self {
            transform: GridTransform::new(resolution),
            grid: VoxelGrid::new(),
            update: VoxelGrid::new(),
            hit_attrs: FxHashMap::default(),
            params: None,
        })
    }

    /// Resolution in meters per voxel edge
    pub fn resolution(&self) -> f64 {
        self.transform.resolution()
    }

    /// The persistent grid
    pub fn grid(&self) -> &VoxelGrid<V> {
        &self.grid
    }

    /// The world/index transform
    pub fn transform(&self) -> &GridTransform {
        &self.transform
    }

    /// Whether a valid configuration has been applied
    pub fn is_configured(&self) -> bool {
        self.params.is_some()
    }

    /// Apply a configuration
    ///
    /// Invalid configurations are rejected and the previous configuration,
    /// if any, stays in effect.
    pub fn set_config(&mut self, config: &MapConfig) -> Result<()> {
        if let Err(err) = config.validate() {
            warn!("rejected map configuration: {}", err);
            return Err(err);
        }
        self.params = Some(Params {
            odds: config.log_odds(),
            max_range: config.max_range,
            static_env: config.static_env,
            history_cap: config.semantic_history_size as usize,
            map_dir: config.map_directory_path.clone(),
        });
        Ok(())
    }

    /// Drop all map content, keeping resolution and configuration
    pub fn reset(&mut self) {
        self.grid = VoxelGrid::new();
        self.update = VoxelGrid::new();
        self.hit_attrs.clear();
    }

    /// Integrate one observation: raycast, fuse, and return the staged
    /// update grid together with the change grid
    pub fn insert_point_cloud(
        &mut self,
        cloud: &PointCloud,
        origin: Vector3<f64>,
    ) -> Result<(UpdateGrid, ChangeGrid)> {
        self.accumulate_update(cloud, origin)?;
        self.integrate_update()
    }

    /// Raycast a cloud into the pending update grid without fusing
    ///
    /// Several clouds can be accumulated before a single
    /// [`integrate_update`](Self::integrate_update) call.
    pub fn accumulate_update(&mut self, cloud: &PointCloud, origin: Vector3<f64>) -> Result<()> {
        let (max_range, static_env) = match &self.params {
            Some(p) => (p.max_range, p.static_env),
            None => return Err(Error::ConfigMissing),
        };
        let transform = self.transform;
        let origin_index = transform.world_to_index(origin);
        let mut skipped = 0usize;

        let mut acc = self.update.accessor();
        for point in cloud {
            if !point.is_finite() {
                skipped += 1;
                continue;
            }

            let mut end_world = point.position;
            let mut truncated = false;
            if max_range > 0.0 {
                let delta = end_world - origin;
                let distance = delta.norm();
                if distance > max_range {
                    end_world = origin + delta / distance * max_range;
                    truncated = true;
                }
            }

            let end_voxel = if static_env {
                GridTransform::floor_coord(transform.world_to_index(end_world))
            } else {
                cast_ray(&transform, origin, origin_index, end_world, &mut acc)
            };

            if !truncated {
                acc.set_value(end_voxel, true, true);
                let attr = point.attributes();
                if !attr.is_empty() {
                    self.hit_attrs.insert(end_voxel, attr);
                }
            }
        }
        drop(acc);

        if skipped > 0 {
            debug!("skipped {} non-finite points", skipped);
        }
        Ok(())
    }

    /// Fuse the pending update grid into the persistent grid
    ///
    /// Returns the consumed update grid and the change grid; the engine
    /// rebinds a fresh update grid for the next cycle.
    pub fn integrate_update(&mut self) -> Result<(UpdateGrid, ChangeGrid)> {
        let (odds, history_cap) = match &self.params {
            Some(p) => (p.odds, p.history_cap),
            None => return Err(Error::ConfigMissing),
        };

        let mut change = ChangeGrid::new();
        if !self.update.is_empty() {
            let update = &self.update;
            let hit_attrs = &self.hit_attrs;
            let mut acc = self.grid.accessor();

            for (c, &is_hit) in update.iter_active() {
                let mut flipped = false;
                if is_hit {
                    acc.modify(c, |value, active| {
                        let last_state = *active;
                        value.integrate_hit(&odds, active);
                        if *active {
                            if let Some(attr) = hit_attrs.get(&c) {
                                value.fuse_attributes(attr, history_cap);
                            }
                        }
                        flipped = last_state != *active;
                    });
                    if flipped {
                        change.set_value(c, true, true);
                    }
                } else {
                    // Free-space evidence only touches voxels that exist;
                    // a never-observed voxel stays unobserved
                    acc.modify_if_present(c, |value, active| {
                        let last_state = *active;
                        value.integrate_miss(&odds, active);
                        flipped = last_state != *active;
                    });
                    if flipped {
                        change.set_active(c, true);
                    }
                }
            }
        }

        let update = std::mem::take(&mut self.update);
        self.hit_attrs.clear();
        Ok((update, change))
    }

    /// Discard the pending update grid without fusing
    pub fn reset_update(&mut self) {
        self.update = VoxelGrid::new();
        self.hit_attrs.clear();
    }

    /// Force active states from a hit/miss grid, bypassing fusion
    ///
    /// Payload `true` activates the voxel, `false` deactivates it; values
    /// are left untouched (absent voxels get default values).
    pub fn overwrite_map(&mut self, update: &UpdateGrid) {
        for (c, &is_hit) in update.iter_active() {
            self.grid.set_active(c, is_hit);
        }
    }

    /// First active voxel along a ray, as a world-space point
    ///
    /// Walks from `origin` along `direction` until an active voxel is found
    /// within `max_length` meters; returns `None` past that length.
    pub fn raytrace(
        &self,
        origin: Vector3<f64>,
        direction: Vector3<f64>,
        max_length: f64,
    ) -> Option<Vector3<f64>> {
        if direction == Vector3::zeros() {
            return None;
        }
        let origin_index = self.transform.world_to_index(origin);
        let resolution = self.transform.resolution();
        let mut dda = Dda::new(origin_index, direction);
        loop {
            let c = dda.voxel();
            let offset = Vector3::new(
                c.x as f64 - origin_index.x,
                c.y as f64 - origin_index.y,
                c.z as f64 - origin_index.z,
            );
            if offset.norm() * resolution >= max_length {
                return None;
            }
            if self.grid.is_active(c) {
                return Some(self.transform.index_to_world(c));
            }
            dda.step();
        }
    }

    /// Extract a sub-region as a full-value section
    ///
    /// The boundaries are an AABB in a reference frame; `reference_to_map`
    /// carries its corners into the map frame before the box is floored to
    /// index space. All active voxels inside the box are copied.
    pub fn map_section(
        &self,
        min_boundary: Vector3<f64>,
        max_boundary: Vector3<f64>,
        reference_to_map: &Matrix4<f64>,
    ) -> Section<V> {
        let bb = self.index_bounding_box(min_boundary, max_boundary, reference_to_map);
        let mut grid = VoxelGrid::new();
        for (c, value) in self.grid.iter_active() {
            if bb.contains(c) {
                grid.set_value(c, value.clone(), true);
            }
        }
        Section::new(grid, bb)
    }

    /// Extract a sub-region as an activity-only section
    pub fn map_section_active(
        &self,
        min_boundary: Vector3<f64>,
        max_boundary: Vector3<f64>,
        reference_to_map: &Matrix4<f64>,
    ) -> Section<bool> {
        let bb = self.index_bounding_box(min_boundary, max_boundary, reference_to_map);
        let mut grid = VoxelGrid::new();
        for (c, _) in self.grid.iter_active() {
            if bb.contains(c) {
                grid.set_value(c, true, true);
            }
        }
        Section::new(grid, bb)
    }

    /// Replace a boxed region with a full-value section's content
    ///
    /// Every active voxel inside the section's box is deactivated first
    /// (values preserved), then the section's voxels are written in.
    pub fn apply_map_section(&mut self, section: &Section<V>) -> Result<()> {
        let bb = section.bounding_box()?;
        self.deactivate_box(&bb);
        for (c, value, _) in section.grid().iter() {
            self.grid.set_value(c, value.clone(), true);
        }
        Ok(())
    }

    /// Replace a boxed region with an activity-only section's content
    pub fn apply_map_section_active(&mut self, section: &Section<bool>) -> Result<()> {
        let bb = section.bounding_box()?;
        self.deactivate_box(&bb);
        for (c, _, _) in section.grid().iter() {
            self.grid.set_active(c, true);
        }
        Ok(())
    }

    fn deactivate_box(&mut self, bb: &CoordBox) {
        let inside: Vec<Coord> = self
            .grid
            .iter_active()
            .map(|(c, _)| c)
            .filter(|c| bb.contains(*c))
            .collect();
        for c in inside {
            self.grid.set_active(c, false);
        }
    }

    fn index_bounding_box(
        &self,
        min_boundary: Vector3<f64>,
        max_boundary: Vector3<f64>,
        reference_to_map: &Matrix4<f64>,
    ) -> CoordBox {
        let mut world_min = Vector3::repeat(f64::INFINITY);
        let mut world_max = Vector3::repeat(f64::NEG_INFINITY);
        for i in 0..8 {
            let corner = Vector4::new(
                if i & 1 == 0 { min_boundary.x } else { max_boundary.x },
                if i & 2 == 0 { min_boundary.y } else { max_boundary.y },
                if i & 4 == 0 { min_boundary.z } else { max_boundary.z },
                1.0,
            );
            let mapped = (reference_to_map * corner).xyz();
            world_min = world_min.inf(&mapped);
            world_max = world_max.sup(&mapped);
        }
        CoordBox::new(
            GridTransform::floor_coord(self.transform.world_to_index(world_min)),
            GridTransform::floor_coord(self.transform.world_to_index(world_max)),
        )
    }

    /// Write a timestamped snapshot into the configured map directory
    ///
    /// Returns the path of the written file.
    pub fn save(&self) -> Result<PathBuf>
    where
        V: Serialize,
    {
        let params = self.params.as_ref().ok_or(Error::ConfigMissing)?;
        std::fs::create_dir_all(&params.map_dir)?;
        let path = io::timestamped_map_path(&params.map_dir);
        let file = File::create(&path)?;
        io::write_map(BufWriter::new(file), self.resolution(), &self.grid)?;
        info!("saved map to {}", path.display());
        Ok(path)
    }

    /// Replace the current grid with a snapshot from disk
    ///
    /// The snapshot's resolution is adopted along with its content.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()>
    where
        V: DeserializeOwned,
    {
        let path = path.as_ref();
        let file = File::open(path)?;
        let (resolution, grid) = io::read_map(BufReader::new(file))?;
        self.transform = GridTransform::new(resolution);
        self.grid = grid;
        self.update = VoxelGrid::new();
        self.hit_attrs.clear();
        info!("loaded map from {}", path.display());
        Ok(())
    }
}

/// Walk one ray into the update grid, marking misses, and return the voxel
/// that should receive the endpoint hit
///
/// The traversal target is the endpoint pulled back by one voxel edge along
/// each moving axis, so the hit voxel itself is never marked as a miss. The
/// walk is bounded by its exact step count so floating-point ties at cell
/// faces cannot spin it.
fn cast_ray(
    transform: &GridTransform,
    origin_world: Vector3<f64>,
    origin_index: Vector3<f64>,
    end_world: Vector3<f64>,
    update: &mut Accessor<'_, bool>,
) -> Coord {
    let resolution = transform.resolution();
    let delta = end_world - origin_world;
    let signum = |v: f64| {
        if v < -resolution {
            -1
        } else if v > resolution {
            1
        } else {
            0
        }
    };
    let sign = Coord::new(signum(delta.x), signum(delta.y), signum(delta.z));
    let corrected = end_world
        - Vector3::new(sign.x as f64, sign.y as f64, sign.z as f64) * resolution;
    let terminal = GridTransform::floor_coord(transform.world_to_index(corrected));

    let start = GridTransform::floor_coord(origin_index);
    let span = terminal - start;
    let mut remaining = (span.x as i64).abs() + (span.y as i64).abs() + (span.z as i64).abs();

    let mut dda = Dda::new(origin_index, corrected - origin_world);
    while dda.voxel() != terminal && remaining > 0 {
        update.set_active(dda.voxel(), true);
        dda.step();
        remaining -= 1;
    }
    terminal + sign
}
