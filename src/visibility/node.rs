//! Graph node - one chunk's place in a visibility traversal

use std::sync::Arc;

use crate::voxel::{ChunkCoord, ChunkHandle, DirectionSet};

/// A chunk reached by the visibility search, plus how it was reached.
///
/// Identity is the coordinate; the direction sets are metadata that keeps
/// changing while the node sits in a snapshot.
#[derive(Clone, Debug)]
pub struct GraphNode {
    pub coord: ChunkCoord,
    pub chunk: Arc<ChunkHandle>,
    /// Every direction travelled on the path from the seed to this node
    pub entry_directions: DirectionSet,
    /// Directions this node was discovered through (merged on rediscovery)
    pub discovery_directions: DirectionSet,
    /// BFS layer, 0 for seeds
    pub depth: u32,
}

impl GraphNode {
    /// Seed node: no directions, depth 0
    pub fn seed(chunk: Arc<ChunkHandle>) -> Self {
        Self {
            coord: chunk.coord(),
            chunk,
            entry_directions: DirectionSet::EMPTY,
            discovery_directions: DirectionSet::EMPTY,
            depth: 0,
        }
    }

    pub fn is_seed(&self) -> bool {
        self.depth == 0
    }
}
