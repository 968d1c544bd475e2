//! TraversalSnapshot - the result of one visibility search.
//!
//! Nodes are stored in an arena in discovery order. A dense table mirroring
//! the world index's slot layout maps each slot to its node, so "is this
//! chunk already in the graph" is one array read.

use std::sync::Arc;

use crate::voxel::world_index::{layout_slot, IndexLayout};
use crate::voxel::{ChunkCoord, ChunkHandle, WorldIndex};

use super::node::GraphNode;

const NO_NODE: u32 = u32::MAX;

/// Deduplicated, insertion-ordered set of graph nodes keyed by coordinate.
#[derive(Clone, Debug)]
pub struct TraversalSnapshot {
    nodes: Vec<GraphNode>,
    /// Slot -> node index, `NO_NODE` when empty
    lookup: Vec<u32>,
    layout: IndexLayout,
    /// Index center the slots were computed against
    center: ChunkCoord,
    /// Chunk the search was seeded from
    camera_chunk: ChunkCoord,
}

impl TraversalSnapshot {
    /// Empty snapshot addressed like `index`
    pub fn new(index: &WorldIndex, camera_chunk: ChunkCoord) -> Self {
        Self {
            nodes: Vec::new(),
            lookup: vec![NO_NODE; index.slot_count()],
            layout: *index.layout(),
            center: index.center(),
            camera_chunk,
        }
    }

    /// Snapshot holding nothing, used before the first rebuild lands
    pub fn empty() -> Self {
        let index = WorldIndex::new(
            IndexLayout {
                view_distance: 0,
                height_sections: 1,
                ..IndexLayout::default()
            },
            ChunkCoord::new(0, 0, 0),
        );
        Self::new(&index, ChunkCoord::new(0, 0, 0))
    }

    /// Whether slots in this snapshot mean the same chunks as in `index`
    pub fn matches_index(&self, index: &WorldIndex) -> bool {
        self.layout == *index.layout() && self.center == index.center()
    }

    pub fn camera_chunk(&self) -> ChunkCoord {
        self.camera_chunk
    }

    pub fn center(&self) -> ChunkCoord {
        self.center
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, index: u32) -> &GraphNode {
        &self.nodes[index as usize]
    }

    pub fn node_mut(&mut self, index: u32) -> &mut GraphNode {
        &mut self.nodes[index as usize]
    }

    /// Node index for a coordinate
    pub fn index_of(&self, coord: ChunkCoord) -> Option<u32> {
        let slot = layout_slot(&self.layout, self.center, coord)?;
        let index = self.lookup[slot];
        if index == NO_NODE || self.nodes[index as usize].coord != coord {
            return None;
        }
        Some(index)
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<&GraphNode> {
        self.index_of(coord).map(|i| self.node(i))
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.index_of(coord).is_some()
    }

    /// Add a node and register it in the lookup. Returns `None` if the
    /// coordinate is already present or outside the addressed area.
    pub fn insert(&mut self, node: GraphNode) -> Option<u32> {
        let slot = layout_slot(&self.layout, self.center, node.coord)?;
        if self.index_of(node.coord).is_some() {
            return None;
        }
        let index = self.nodes.len() as u32;
        self.nodes.push(node);
        self.lookup[slot] = index;
        Some(index)
    }

    /// Handles of every node in discovery order
    pub fn chunks(&self) -> impl Iterator<Item = &Arc<ChunkHandle>> {
        self.nodes.iter().map(|n| &n.chunk)
    }
}

impl Default for TraversalSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::{DirectionSet, FaceVisibility};

    fn index() -> WorldIndex {
        WorldIndex::new(
            IndexLayout {
                view_distance: 2,
                min_section_y: 0,
                height_sections: 2,
                border_margin: 1,
            },
            ChunkCoord::new(0, 0, 0),
        )
    }

    fn node(x: i32, y: i32, z: i32) -> GraphNode {
        GraphNode::seed(Arc::new(ChunkHandle::compiled(
            ChunkCoord::new(x, y, z),
            FaceVisibility::all(),
            true,
        )))
    }

    #[test]
    fn test_insert_dedupes_by_coord() {
        let mut snapshot = TraversalSnapshot::new(&index(), ChunkCoord::new(0, 0, 0));
        assert_eq!(snapshot.insert(node(1, 0, 1)), Some(0));

        let mut again = node(1, 0, 1);
        again.discovery_directions = DirectionSet::ALL;
        assert_eq!(snapshot.insert(again), None);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get(ChunkCoord::new(1, 0, 1)).unwrap().discovery_directions.is_empty());
    }

    #[test]
    fn test_slot_collision_is_a_miss() {
        let mut snapshot = TraversalSnapshot::new(&index(), ChunkCoord::new(0, 0, 0));
        snapshot.insert(node(2, 0, 0)).unwrap();
        // (-3,0,0) shares the slot but lies outside the square
        assert!(!snapshot.contains(ChunkCoord::new(-3, 0, 0)));
        assert_eq!(snapshot.insert(node(0, 5, 0)), None);
    }

    #[test]
    fn test_matches_index() {
        let mut idx = index();
        let snapshot = TraversalSnapshot::new(&idx, ChunkCoord::new(0, 0, 0));
        assert!(snapshot.matches_index(&idx));
        idx.recenter(ChunkCoord::new(1, 0, 0));
        assert!(!snapshot.matches_index(&idx));
        assert!(TraversalSnapshot::empty().is_empty());
    }
}
