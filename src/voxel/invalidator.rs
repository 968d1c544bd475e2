//! Dirty tracking for chunks that need recompiling.

use std::collections::HashSet;

use crate::core::types::IVec3;
use crate::voxel::chunk::{ChunkCoord, CHUNK_SHIFT};

/// A chunk waiting for recompilation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyChunk {
    pub coord: ChunkCoord,
    /// The edit came from the player; recompile synchronously if possible
    pub main_thread: bool,
}

/// Tracks which chunks need a rebuild after edits.
///
/// The visibility traversal never reads this; it only sees the effect once
/// the mesh compiler reports a chunk as recompiled.
#[derive(Debug, Default)]
pub struct ChunkInvalidator {
    /// Chunks needing recompilation
    dirty_chunks: HashSet<ChunkCoord>,
    /// Subset of `dirty_chunks` flagged for main-thread rebuild
    main_thread: HashSet<ChunkCoord>,
}

impl ChunkInvalidator {
    /// Create a new chunk invalidator with empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks touched by an edit of the inclusive block range, widened by one
    /// block so chunks sharing a face with the edit are included.
    pub fn region_chunks(min_block: IVec3, max_block: IVec3) -> impl Iterator<Item = ChunkCoord> {
        let lo = (min_block.min(max_block) - IVec3::ONE) >> CHUNK_SHIFT;
        let hi = (min_block.max(max_block) + IVec3::ONE) >> CHUNK_SHIFT;
        (lo.x..=hi.x).flat_map(move |x| {
            (lo.y..=hi.y).flat_map(move |y| (lo.z..=hi.z).map(move |z| ChunkCoord::new(x, y, z)))
        })
    }

    /// Mark a specific chunk as dirty.
    pub fn mark_chunk_dirty(&mut self, coord: ChunkCoord, main_thread: bool) {
        self.dirty_chunks.insert(coord);
        if main_thread {
            self.main_thread.insert(coord);
        }
    }

    /// Take all dirty chunks and clear the dirty list.
    pub fn take_dirty_chunks(&mut self) -> Vec<DirtyChunk> {
        let main_thread = std::mem::take(&mut self.main_thread);
        let mut dirty: Vec<DirtyChunk> = self
            .dirty_chunks
            .drain()
            .map(|coord| DirtyChunk {
                coord,
                main_thread: main_thread.contains(&coord),
            })
            .collect();
        // Main-thread work first so the caller can stop early on a budget
        dirty.sort_by_key(|d| (!d.main_thread, d.coord));
        dirty
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty_chunks.is_empty()
    }

    pub fn is_chunk_dirty(&self, coord: &ChunkCoord) -> bool {
        self.dirty_chunks.contains(coord)
    }

    /// Forget everything about a chunk that left the index
    pub fn forget(&mut self, coord: &ChunkCoord) {
        self.dirty_chunks.remove(coord);
        self.main_thread.remove(coord);
    }

    /// Get count of dirty chunks (for diagnostics).
    pub fn dirty_chunk_count(&self) -> usize {
        self.dirty_chunks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_chunk_dirty_twice() {
        let mut invalidator = ChunkInvalidator::new();
        let coord = ChunkCoord::new(1, 2, 3);

        invalidator.mark_chunk_dirty(coord, false);
        invalidator.mark_chunk_dirty(coord, false);
        assert!(invalidator.is_chunk_dirty(&coord));
        assert_eq!(invalidator.dirty_chunk_count(), 1);
    }

    #[test]
    fn test_take_orders_main_thread_first() {
        let mut invalidator = ChunkInvalidator::new();
        invalidator.mark_chunk_dirty(ChunkCoord::new(0, 0, 0), false);
        invalidator.mark_chunk_dirty(ChunkCoord::new(5, 0, 0), true);

        let dirty = invalidator.take_dirty_chunks();
        assert_eq!(dirty.len(), 2);
        assert_eq!(dirty[0], DirtyChunk { coord: ChunkCoord::new(5, 0, 0), main_thread: true });
        assert!(!dirty[1].main_thread);
        assert!(!invalidator.has_dirty());
        assert!(invalidator.take_dirty_chunks().is_empty());
    }

    #[test]
    fn test_region_inside_one_chunk_touches_neighbors_only_at_faces() {
        // A single block in the middle of chunk (0,0,0) stays in that chunk
        let chunks: Vec<_> =
            ChunkInvalidator::region_chunks(IVec3::splat(8), IVec3::splat(8)).collect();
        assert_eq!(chunks, vec![ChunkCoord::new(0, 0, 0)]);
    }

    #[test]
    fn test_region_on_face_includes_neighbor() {
        // Block at x=0 borders chunk x=-1
        let chunks: Vec<_> =
            ChunkInvalidator::region_chunks(IVec3::new(0, 8, 8), IVec3::new(0, 8, 8)).collect();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.contains(&ChunkCoord::new(-1, 0, 0)));
        assert!(chunks.contains(&ChunkCoord::new(0, 0, 0)));
    }

    #[test]
    fn test_region_corner_touches_eight() {
        let chunks: Vec<_> =
            ChunkInvalidator::region_chunks(IVec3::splat(15), IVec3::splat(15)).collect();
        assert_eq!(chunks.len(), 8);
    }

    #[test]
    fn test_forget() {
        let mut invalidator = ChunkInvalidator::new();
        let coord = ChunkCoord::new(0, 1, 0);
        invalidator.mark_chunk_dirty(coord, true);
        invalidator.forget(&coord);
        assert!(!invalidator.has_dirty());
        assert!(invalidator.take_dirty_chunks().is_empty());
    }
}
