//! WorldIndex - slot-addressed spatial lookup for the chunks around the camera.
//!
//! Chunks live in a dense ring buffer covering a square of
//! `2 * view_distance + 1` chunk columns around `center`, each
//! `height_sections` tall. A chunk's slot only depends on its coordinate, so
//! it stays stable while the center moves, and any table indexed by slot
//! (the traversal's lookup table) can mirror this array.

use std::sync::Arc;

use crate::core::error::Error;
use crate::core::types::{IVec3, Result};
use crate::voxel::chunk::{ChunkCoord, CHUNK_SIZE};
use crate::voxel::chunk_handle::ChunkHandle;
use crate::voxel::invalidator::{ChunkInvalidator, DirtyChunk};

/// Shape of the loaded area
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexLayout {
    /// Square radius in chunks around the center column
    pub view_distance: i32,
    /// Lowest chunk Y in the world
    pub min_section_y: i32,
    /// Number of chunk layers in the world
    pub height_sections: i32,
    /// Chunks this close to the view-distance edge count as border chunks
    pub border_margin: i32,
}

impl Default for IndexLayout {
    fn default() -> Self {
        Self {
            view_distance: 12,
            min_section_y: -4,
            height_sections: 24,
            border_margin: 1,
        }
    }
}

fn layout_contains(layout: &IndexLayout, center: ChunkCoord, coord: ChunkCoord) -> bool {
    coord.horizontal_distance(center) <= layout.view_distance
        && coord.y >= layout.min_section_y
        && coord.y < layout.min_section_y + layout.height_sections
}

/// Slot of `coord` in an index with this layout centered on `center`.
///
/// Tables mirroring the index (traversal lookups) address themselves with
/// this so they stay valid without holding the index.
pub fn layout_slot(layout: &IndexLayout, center: ChunkCoord, coord: ChunkCoord) -> Option<usize> {
    if !layout_contains(layout, center, coord) {
        return None;
    }
    let diameter = 2 * layout.view_distance + 1;
    let x = coord.x.rem_euclid(diameter);
    let z = coord.z.rem_euclid(diameter);
    let y = coord.y - layout.min_section_y;
    Some(((z * diameter + x) * layout.height_sections + y) as usize)
}

/// Spatial index for chunk lookup by coordinate or slot.
pub struct WorldIndex {
    layout: IndexLayout,
    /// Camera column the square is centered on (Y is ignored)
    center: ChunkCoord,
    slots: Vec<Option<Arc<ChunkHandle>>>,
    count: usize,
    invalidator: ChunkInvalidator,
}

impl WorldIndex {
    /// Create an empty index centered on `center`.
    pub fn new(layout: IndexLayout, center: ChunkCoord) -> Self {
        let layout = IndexLayout {
            view_distance: layout.view_distance.max(0),
            height_sections: layout.height_sections.max(1),
            border_margin: layout.border_margin.max(0),
            ..layout
        };
        Self {
            layout,
            center,
            slots: vec![None; Self::slot_count_for(&layout)],
            count: 0,
            invalidator: ChunkInvalidator::new(),
        }
    }

    fn slot_count_for(layout: &IndexLayout) -> usize {
        let diameter = (2 * layout.view_distance + 1) as usize;
        diameter * diameter * layout.height_sections as usize
    }

    /// Copy of the chunk table without dirty-tracking state.
    ///
    /// Handles are shared, so this is a pointer copy per slot; it gives a
    /// background traversal a view that cannot change under it.
    pub fn detached(&self) -> WorldIndex {
        WorldIndex {
            layout: self.layout,
            center: self.center,
            slots: self.slots.clone(),
            count: self.count,
            invalidator: ChunkInvalidator::new(),
        }
    }

    pub fn layout(&self) -> &IndexLayout {
        &self.layout
    }

    pub fn center(&self) -> ChunkCoord {
        self.center
    }

    pub fn view_distance(&self) -> i32 {
        self.layout.view_distance
    }

    /// Lowest block Y of the world (inclusive)
    pub fn min_build_height(&self) -> i32 {
        self.layout.min_section_y * CHUNK_SIZE
    }

    /// Highest block Y of the world (exclusive)
    pub fn max_build_height(&self) -> i32 {
        (self.layout.min_section_y + self.layout.height_sections) * CHUNK_SIZE
    }

    /// Chunk Y clamped into the world's height range
    pub fn clamp_section_y(&self, y: i32) -> i32 {
        y.clamp(
            self.layout.min_section_y,
            self.layout.min_section_y + self.layout.height_sections - 1,
        )
    }

    /// Number of slots (size of any slot-indexed mirror table)
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Within view distance of the center and inside world height
    pub fn bounds_contains(&self, coord: ChunkCoord) -> bool {
        layout_contains(&self.layout, self.center, coord)
    }

    /// Out of bounds, or close enough to the view-distance edge that missing
    /// neighbor data is expected rather than a loading gap.
    pub fn is_near_border(&self, coord: ChunkCoord) -> bool {
        !self.bounds_contains(coord)
            || coord.horizontal_distance(self.center)
                >= self.layout.view_distance - self.layout.border_margin
    }

    /// Stable slot of an in-bounds coordinate
    pub fn slot(&self, coord: ChunkCoord) -> Option<usize> {
        layout_slot(&self.layout, self.center, coord)
    }

    /// Handle for a coordinate, if that chunk is loaded.
    pub fn lookup(&self, coord: ChunkCoord) -> Option<&Arc<ChunkHandle>> {
        let slot = self.slot(coord)?;
        self.slots[slot].as_ref().filter(|h| h.coord() == coord)
    }

    /// Add a chunk. Returns the handle it replaced, if any.
    pub fn insert(&mut self, handle: Arc<ChunkHandle>) -> Result<Option<Arc<ChunkHandle>>> {
        let coord = handle.coord();
        let slot = self.slot(coord).ok_or_else(|| {
            Error::Voxel(format!("chunk {} is outside the loaded area around {}", coord, self.center))
        })?;
        let previous = self.slots[slot].replace(handle);
        if previous.is_none() {
            self.count += 1;
        }
        Ok(previous)
    }

    /// Remove a chunk from the index.
    pub fn remove(&mut self, coord: ChunkCoord) -> Option<Arc<ChunkHandle>> {
        let slot = self.slot(coord)?;
        if self.slots[slot].as_ref().is_some_and(|h| h.coord() == coord) {
            self.count -= 1;
            self.invalidator.forget(&coord);
            return self.slots[slot].take();
        }
        None
    }

    /// Move the loaded square to a new center column. Returns the chunks that
    /// fell out of range.
    pub fn recenter(&mut self, center: ChunkCoord) -> Vec<Arc<ChunkHandle>> {
        if center.x == self.center.x && center.z == self.center.z {
            self.center = center;
            return Vec::new();
        }
        self.center = center;
        self.evict_out_of_range()
    }

    /// Change the view distance, re-slotting every chunk that stays in range.
    pub fn set_view_distance(&mut self, view_distance: i32) -> Vec<Arc<ChunkHandle>> {
        let view_distance = view_distance.max(0);
        if view_distance == self.layout.view_distance {
            return Vec::new();
        }
        self.layout.view_distance = view_distance;
        let old = std::mem::replace(&mut self.slots, vec![None; Self::slot_count_for(&self.layout)]);
        self.count = 0;

        let mut dropped = Vec::new();
        for handle in old.into_iter().flatten() {
            match self.slot(handle.coord()) {
                Some(slot) => {
                    self.slots[slot] = Some(handle);
                    self.count += 1;
                }
                None => {
                    self.invalidator.forget(&handle.coord());
                    dropped.push(handle);
                }
            }
        }
        dropped
    }

    fn evict_out_of_range(&mut self) -> Vec<Arc<ChunkHandle>> {
        let mut dropped = Vec::new();
        for slot in 0..self.slots.len() {
            let keep = self.slots[slot]
                .as_ref()
                .is_none_or(|h| self.slot(h.coord()) == Some(slot));
            if !keep {
                if let Some(handle) = self.slots[slot].take() {
                    self.count -= 1;
                    self.invalidator.forget(&handle.coord());
                    dropped.push(handle);
                }
            }
        }
        dropped
    }

    /// Iterate loaded chunks in slot order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ChunkHandle>> {
        self.slots.iter().flatten()
    }

    /// Total number of chunks.
    pub fn chunk_count(&self) -> usize {
        self.count
    }

    /// Invalidate one chunk. Returns false if it is not loaded.
    pub fn mark_dirty(&mut self, coord: ChunkCoord, main_thread_hint: bool) -> bool {
        match self.lookup(coord) {
            Some(handle) => {
                handle.mark_dirty(main_thread_hint);
                self.invalidator.mark_chunk_dirty(coord, main_thread_hint);
                true
            }
            None => false,
        }
    }

    /// Invalidate every loaded chunk touched by an edit of the inclusive block
    /// range, plus face neighbors. Returns how many chunks were marked.
    pub fn mark_region_dirty(&mut self, min_block: IVec3, max_block: IVec3) -> usize {
        ChunkInvalidator::region_chunks(min_block, max_block)
            .filter(|coord| self.mark_dirty(*coord, false))
            .count()
    }

    /// Drain the chunks waiting for recompilation
    pub fn take_dirty_chunks(&mut self) -> Vec<DirtyChunk> {
        self.invalidator.take_dirty_chunks()
    }

    pub fn invalidator(&self) -> &ChunkInvalidator {
        &self.invalidator
    }
}

impl Default for WorldIndex {
    fn default() -> Self {
        Self::new(IndexLayout::default(), ChunkCoord::new(0, 0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::face_visibility::FaceVisibility;

    fn small_layout() -> IndexLayout {
        IndexLayout {
            view_distance: 2,
            min_section_y: 0,
            height_sections: 4,
            border_margin: 1,
        }
    }

    fn handle(x: i32, y: i32, z: i32) -> Arc<ChunkHandle> {
        Arc::new(ChunkHandle::compiled(ChunkCoord::new(x, y, z), FaceVisibility::all(), true))
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut index = WorldIndex::new(small_layout(), ChunkCoord::new(0, 0, 0));
        index.insert(handle(1, 2, -1)).unwrap();

        assert!(index.lookup(ChunkCoord::new(1, 2, -1)).is_some());
        assert!(index.lookup(ChunkCoord::new(1, 1, -1)).is_none());
        assert_eq!(index.chunk_count(), 1);
    }

    #[test]
    fn test_insert_out_of_range_fails() {
        let mut index = WorldIndex::new(small_layout(), ChunkCoord::new(0, 0, 0));
        assert!(index.insert(handle(3, 0, 0)).is_err());
        assert!(index.insert(handle(0, 4, 0)).is_err());
        assert!(index.insert(handle(0, -1, 0)).is_err());
        assert_eq!(index.chunk_count(), 0);
    }

    #[test]
    fn test_slots_are_unique_within_bounds() {
        let index = WorldIndex::new(small_layout(), ChunkCoord::new(7, 0, -3));
        let mut seen = vec![false; index.slot_count()];
        for x in 5..=9 {
            for z in -5..=-1 {
                for y in 0..4 {
                    let slot = index.slot(ChunkCoord::new(x, y, z)).unwrap();
                    assert!(!seen[slot], "slot {} reused", slot);
                    seen[slot] = true;
                }
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_recenter_keeps_slots_and_evicts() {
        let mut index = WorldIndex::new(small_layout(), ChunkCoord::new(0, 0, 0));
        index.insert(handle(-2, 0, 0)).unwrap();
        index.insert(handle(2, 0, 0)).unwrap();
        let slot_before = index.slot(ChunkCoord::new(2, 0, 0));

        let dropped = index.recenter(ChunkCoord::new(1, 0, 0));
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].coord(), ChunkCoord::new(-2, 0, 0));
        assert_eq!(index.slot(ChunkCoord::new(2, 0, 0)), slot_before);
        assert!(index.lookup(ChunkCoord::new(2, 0, 0)).is_some());
        // (3,0,0) now maps onto the slot (-2,0,0) used to have
        assert!(index.lookup(ChunkCoord::new(3, 0, 0)).is_none());
        assert_eq!(index.chunk_count(), 1);
    }

    #[test]
    fn test_set_view_distance_reslots() {
        let mut index = WorldIndex::new(small_layout(), ChunkCoord::new(0, 0, 0));
        index.insert(handle(0, 0, 0)).unwrap();
        index.insert(handle(2, 1, 2)).unwrap();

        let dropped = index.set_view_distance(1);
        assert_eq!(dropped.len(), 1);
        assert_eq!(index.slot_count(), 9 * 4);
        assert!(index.lookup(ChunkCoord::new(0, 0, 0)).is_some());
        assert_eq!(index.chunk_count(), 1);
    }

    #[test]
    fn test_border() {
        let index = WorldIndex::new(small_layout(), ChunkCoord::new(0, 0, 0));
        assert!(!index.is_near_border(ChunkCoord::new(0, 0, 0)));
        assert!(index.is_near_border(ChunkCoord::new(1, 0, 0)));
        assert!(index.is_near_border(ChunkCoord::new(0, 0, -2)));
        assert!(index.is_near_border(ChunkCoord::new(9, 0, 0)));
        assert!(!index.is_near_border(ChunkCoord::new(0, 3, 0)));
    }

    #[test]
    fn test_mark_dirty_delegates() {
        let mut index = WorldIndex::new(small_layout(), ChunkCoord::new(0, 0, 0));
        index.insert(handle(0, 0, 0)).unwrap();
        index.insert(handle(-1, 0, 0)).unwrap();

        assert!(index.mark_dirty(ChunkCoord::new(0, 0, 0), true));
        assert!(!index.mark_dirty(ChunkCoord::new(1, 0, 0), false));
        assert!(index.lookup(ChunkCoord::new(0, 0, 0)).unwrap().is_dirty_from_main_thread());

        // Edit on the x=0 face reaches the loaded neighbor at x=-1
        let marked = index.mark_region_dirty(IVec3::new(0, 4, 4), IVec3::new(2, 4, 4));
        assert_eq!(marked, 2);
        assert!(index.lookup(ChunkCoord::new(-1, 0, 0)).unwrap().is_dirty());

        let dirty = index.take_dirty_chunks();
        assert_eq!(dirty.len(), 2);
        assert!(dirty[0].main_thread);
    }

    #[test]
    fn test_detached_shares_handles() {
        let mut index = WorldIndex::new(small_layout(), ChunkCoord::new(0, 0, 0));
        index.insert(handle(0, 1, 0)).unwrap();
        let view = index.detached();
        index.remove(ChunkCoord::new(0, 1, 0));

        assert_eq!(index.chunk_count(), 0);
        assert_eq!(view.chunk_count(), 1);
        assert!(view.lookup(ChunkCoord::new(0, 1, 0)).is_some());
    }
}
