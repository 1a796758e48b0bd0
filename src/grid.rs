//! Sparse blocked voxel grid
//!
//! `VoxelGrid<V>` maps signed 3D integer coordinates to `(value, active)`
//! slots. Storage is blocked: a root hash map keyed by leaf coordinates
//! holds 8x8x8 leaf nodes, allocated lazily on first write. Most of 3D
//! space is empty and costs nothing.
//!
//! The `active` flag classifies a voxel independently of its value; a slot
//! can exist (it has been observed) without being active. Deactivating a
//! voxel preserves its value.
//!
//! [`Accessor`] caches the most recently touched leaf so consecutive
//! accesses within the same 8x8x8 block skip the root lookup. Raycasting
//! steps through adjacent voxels, so nearly all of its grid operations stay
//! inside the cached leaf.

use crate::coord::{Coord, LEAF_VOLUME};
use rustc_hash::FxHashMap;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeSeq, Serializer};

#[derive(Debug, Clone)]
struct Slot<V> {
    value: V,
    active: bool,
}

#[derive(Debug, Clone)]
struct LeafNode<V> {
    slots: Box<[Option<Slot<V>>]>,
    len: u16,
}

impl<V> Default for LeafNode<V> {
    fn default() -> Self {
        Self {
            slots: (0..LEAF_VOLUME).map(|_| None).collect(),
            len: 0,
        }
    }
}

impl<V> LeafNode<V> {
    fn set_value(&mut self, offset: usize, value: V, active: bool) {
        if self.slots[offset].is_none() {
            self.len += 1;
        }
        self.slots[offset] = Some(Slot { value, active });
    }

    fn set_active(&mut self, offset: usize, active: bool)
    where
        V: Default,
    {
        match &mut self.slots[offset] {
            Some(slot) => slot.active = active,
            None => {
                self.slots[offset] = Some(Slot {
                    value: V::default(),
                    active,
                });
                self.len += 1;
            }
        }
    }

    fn modify<F>(&mut self, offset: usize, f: F)
    where
        V: Default,
        F: FnOnce(&mut V, &mut bool),
    {
        if self.slots[offset].is_none() {
            self.slots[offset] = Some(Slot {
                value: V::default(),
                active: false,
            });
            self.len += 1;
        }
        let slot = self.slots[offset].as_mut().unwrap();
        f(&mut slot.value, &mut slot.active);
    }

    fn modify_if_present<F>(&mut self, offset: usize, f: F) -> bool
    where
        F: FnOnce(&mut V, &mut bool),
    {
        match &mut self.slots[offset] {
            Some(slot) => {
                f(&mut slot.value, &mut slot.active);
                true
            }
            None => false,
        }
    }
}

/// Sparse mapping from 3D integer coordinates to `(value, active)` slots
#[derive(Debug, Clone)]
pub struct VoxelGrid<V> {
    nodes: FxHashMap<Coord, LeafNode<V>>,
}

impl<V> Default for VoxelGrid<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> VoxelGrid<V> {
    /// Create an empty grid
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
        }
    }

    /// Get a voxel's value and active flag
    pub fn get(&self, c: Coord) -> Option<(&V, bool)> {
        self.nodes
            .get(&c.leaf_key())
            .and_then(|node| node.slots[c.leaf_offset()].as_ref())
            .map(|slot| (&slot.value, slot.active))
    }

    /// Check whether a voxel is active
    pub fn is_active(&self, c: Coord) -> bool {
        self.get(c).map(|(_, active)| active).unwrap_or(false)
    }

    /// Set a voxel's value and active flag, creating the slot if absent
    pub fn set_value(&mut self, c: Coord, value: V, active: bool) {
        self.nodes
            .entry(c.leaf_key())
            .or_default()
            .set_value(c.leaf_offset(), value, active);
    }

    /// Set a voxel's active flag, leaving its value unchanged
    ///
    /// If the slot does not exist it is created with the default value.
    pub fn set_active(&mut self, c: Coord, active: bool)
    where
        V: Default,
    {
        self.nodes
            .entry(c.leaf_key())
            .or_default()
            .set_active(c.leaf_offset(), active);
    }

    /// Mutate a voxel in place, creating the slot (default value, inactive)
    /// if absent
    pub fn modify<F>(&mut self, c: Coord, f: F)
    where
        V: Default,
        F: FnOnce(&mut V, &mut bool),
    {
        self.nodes
            .entry(c.leaf_key())
            .or_default()
            .modify(c.leaf_offset(), f);
    }

    /// Mutate a voxel in place only if its slot exists
    ///
    /// Returns `true` if the slot existed and the closure ran.
    pub fn modify_if_present<F>(&mut self, c: Coord, f: F) -> bool
    where
        F: FnOnce(&mut V, &mut bool),
    {
        self.nodes
            .get_mut(&c.leaf_key())
            .map(|node| node.modify_if_present(c.leaf_offset(), f))
            .unwrap_or(false)
    }

    /// Iterate all slots as `(coord, value, active)`
    pub fn iter(&self) -> impl Iterator<Item = (Coord, &V, bool)> + '_ {
        self.nodes.iter().flat_map(|(key, node)| {
            let key = *key;
            node.slots.iter().enumerate().filter_map(move |(offset, slot)| {
                slot.as_ref()
                    .map(|s| (Coord::from_leaf(key, offset), &s.value, s.active))
            })
        })
    }

    /// Iterate active slots as `(coord, value)`
    ///
    /// Order is unspecified but stable within one iteration.
    pub fn iter_active(&self) -> impl Iterator<Item = (Coord, &V)> + '_ {
        self.iter()
            .filter_map(|(c, v, active)| active.then_some((c, v)))
    }

    /// Number of slots (observed voxels)
    pub fn len(&self) -> usize {
        self.nodes.values().map(|node| node.len as usize).sum()
    }

    /// Number of active voxels
    pub fn active_count(&self) -> usize {
        self.iter_active().count()
    }

    /// Check whether the grid holds no slots at all
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Remove all slots, releasing every leaf node
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Create an accessor handle caching the most recently touched leaf
    pub fn accessor(&mut self) -> Accessor<'_, V> {
        Accessor {
            grid: self,
            key: Coord::new(0, 0, 0),
            node: None,
        }
    }
}

/// Cursor-style handle over a [`VoxelGrid`] with single-leaf caching
///
/// The accessor takes the current leaf node out of the root map and holds
/// it directly; as long as accesses stay within the same leaf no hashing
/// happens. Moving to another leaf flushes the held node back first.
/// Dropping the accessor flushes the last node.
pub struct Accessor<'g, V> {
    grid: &'g mut VoxelGrid<V>,
    key: Coord,
    node: Option<LeafNode<V>>,
}

impl<'g, V> Accessor<'g, V> {
    fn node_for(&mut self, key: Coord) -> &mut LeafNode<V> {
        if self.node.is_none() || self.key != key {
            self.flush();
            self.node = Some(self.grid.nodes.remove(&key).unwrap_or_default());
            self.key = key;
        }
        self.node.as_mut().unwrap()
    }

    fn flush(&mut self) {
        if let Some(node) = self.node.take() {
            // Empty leaves are dropped instead of reinserted
            if node.len > 0 {
                self.grid.nodes.insert(self.key, node);
            }
        }
    }

    /// Get a voxel's value and active flag
    pub fn get(&mut self, c: Coord) -> Option<(&V, bool)> {
        let node = self.node_for(c.leaf_key());
        node.slots[c.leaf_offset()]
            .as_ref()
            .map(|slot| (&slot.value, slot.active))
    }

    /// Check whether a voxel is active
    pub fn is_active(&mut self, c: Coord) -> bool {
        self.get(c).map(|(_, active)| active).unwrap_or(false)
    }

    /// Set a voxel's value and active flag, creating the slot if absent
    pub fn set_value(&mut self, c: Coord, value: V, active: bool) {
        self.node_for(c.leaf_key())
            .set_value(c.leaf_offset(), value, active);
    }

    /// Set a voxel's active flag, creating a default slot if absent
    pub fn set_active(&mut self, c: Coord, active: bool)
    where
        V: Default,
    {
        self.node_for(c.leaf_key())
            .set_active(c.leaf_offset(), active);
    }

    /// Mutate a voxel in place, creating the slot if absent
    pub fn modify<F>(&mut self, c: Coord, f: F)
    where
        V: Default,
        F: FnOnce(&mut V, &mut bool),
    {
        self.node_for(c.leaf_key()).modify(c.leaf_offset(), f);
    }

    /// Mutate a voxel in place only if its slot exists
    pub fn modify_if_present<F>(&mut self, c: Coord, f: F) -> bool
    where
        F: FnOnce(&mut V, &mut bool),
    {
        self.node_for(c.leaf_key())
            .modify_if_present(c.leaf_offset(), f)
    }
}

impl<V> Drop for Accessor<'_, V> {
    fn drop(&mut self) {
        self.flush();
    }
}

impl<V: Serialize> Serialize for VoxelGrid<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for (c, v, active) in self.iter() {
            seq.serialize_element(&(c, v, active))?;
        }
        seq.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for VoxelGrid<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<(Coord, V, bool)>::deserialize(deserializer)?;
        let mut grid = VoxelGrid::new();
        for (c, v, active) in entries {
            grid.set_value(c, v, active);
        }
        Ok(grid)
    }
}
