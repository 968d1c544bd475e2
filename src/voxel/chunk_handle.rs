//! ChunkHandle - the per-chunk state the visibility engine reads.
//!
//! Written by the loader and the mesh compiler, read concurrently by the
//! traversal; every field is an atomic so readers never block.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::core::types::IVec3;
use crate::math::Aabb;
use crate::voxel::chunk::ChunkCoord;
use crate::voxel::direction::Direction;
use crate::voxel::face_visibility::FaceVisibility;

/// Thread-safe handle to one chunk of the world.
#[derive(Debug)]
pub struct ChunkHandle {
    coord: ChunkCoord,
    bounds: Aabb,
    /// Packed `FaceVisibility` from the last compile
    visibility: AtomicU64,
    /// All six neighbors have their block data loaded
    complete_neighbors: AtomicBool,
    /// At least one render layer has geometry
    drawable: AtomicBool,
    dirty: AtomicBool,
    dirty_main_thread: AtomicBool,
}

impl ChunkHandle {
    /// Create a handle for a chunk that has not been compiled yet.
    ///
    /// Uncompiled chunks block sight through every face and are dirty.
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            bounds: coord.bounds(),
            visibility: AtomicU64::new(FaceVisibility::none().bits()),
            complete_neighbors: AtomicBool::new(false),
            drawable: AtomicBool::new(false),
            dirty: AtomicBool::new(true),
            dirty_main_thread: AtomicBool::new(false),
        }
    }

    /// Create a handle that is already compiled and has its neighbors loaded.
    pub fn compiled(coord: ChunkCoord, visibility: FaceVisibility, drawable: bool) -> Self {
        let handle = Self::new(coord);
        handle.set_complete_neighbor_data(true);
        handle.set_compiled(visibility, drawable);
        handle
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Block-space minimum corner
    pub fn origin(&self) -> IVec3 {
        self.coord.origin()
    }

    pub fn bounding_box(&self) -> &Aabb {
        &self.bounds
    }

    /// Install the results of a mesh compile.
    pub fn set_compiled(&self, visibility: FaceVisibility, drawable: bool) {
        self.visibility.store(visibility.bits(), Ordering::Release);
        self.drawable.store(drawable, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
        self.dirty_main_thread.store(false, Ordering::Release);
    }

    pub fn face_visibility(&self) -> FaceVisibility {
        FaceVisibility::from_bits(self.visibility.load(Ordering::Acquire))
    }

    #[inline]
    pub fn faces_can_see(&self, a: Direction, b: Direction) -> bool {
        self.face_visibility().can_see(a, b)
    }

    pub fn has_complete_neighbor_data(&self) -> bool {
        self.complete_neighbors.load(Ordering::Acquire)
    }

    pub fn set_complete_neighbor_data(&self, complete: bool) {
        self.complete_neighbors.store(complete, Ordering::Release);
    }

    pub fn has_drawable_content(&self) -> bool {
        self.drawable.load(Ordering::Acquire)
    }

    pub fn is_visually_empty(&self) -> bool {
        !self.has_drawable_content()
    }

    /// Flag the chunk for recompilation. The main-thread hint is sticky until
    /// the next compile.
    pub fn mark_dirty(&self, main_thread_hint: bool) {
        self.dirty.store(true, Ordering::Release);
        if main_thread_hint {
            self.dirty_main_thread.store(true, Ordering::Release);
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn is_dirty_from_main_thread(&self) -> bool {
        self.dirty_main_thread.load(Ordering::Acquire)
    }
}
