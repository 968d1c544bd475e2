//! Per-frame frustum pass over the current snapshot

use crate::math::Frustum;

use super::snapshot::TraversalSnapshot;

/// Visible node list, refilled whenever the view changes.
///
/// Holds indices into the snapshot it was last run against; the buffer is
/// reused across frames to avoid per-frame allocation.
#[derive(Debug, Default)]
pub struct FrustumFilter {
    visible: Vec<u32>,
}

impl FrustumFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test every node's bounds against the frustum, keeping snapshot order.
    /// Returns the number of visible nodes.
    pub fn update(&mut self, snapshot: &TraversalSnapshot, frustum: &Frustum) -> usize {
        self.visible.clear();
        self.visible.extend(
            snapshot
                .nodes()
                .iter()
                .enumerate()
                .filter(|(_, node)| frustum.intersects_aabb(node.chunk.bounding_box()))
                .map(|(i, _)| i as u32),
        );
        log::trace!("Frustum filter: {} of {} nodes visible", self.visible.len(), snapshot.len());
        self.visible.len()
    }

    /// Node indices of the visible chunks
    pub fn visible(&self) -> &[u32] {
        &self.visible
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn clear(&mut self) {
        self.visible.clear();
    }
}
