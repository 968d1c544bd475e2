//! Diagnostic counters

use std::time::Duration;

/// Snapshot of the engine's counters for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    /// Chunks in the spatial index
    pub total_chunks: u32,
    /// Nodes in the current snapshot
    pub snapshot_nodes: u32,
    /// Chunks passing the frustum filter
    pub visible_chunks: u32,
    /// Visible chunks with drawable geometry
    pub visible_drawable: u32,
    pub rebuilds_completed: u64,
    pub rebuilds_failed: u64,
    /// Nodes re-expanded by incremental patches
    pub patches_applied: u64,
    pub last_rebuild: Duration,
    pub rebuild_in_flight: bool,
}

impl FrameStats {
    /// One-line summary for the log
    pub fn summary(&self) -> String {
        format!(
            "{} visible ({} drawable) / {} in graph / {} loaded | rebuilds {} ({} failed, last {:.2}ms{}) | patched {}",
            self.visible_chunks,
            self.visible_drawable,
            self.snapshot_nodes,
            self.total_chunks,
            self.rebuilds_completed,
            self.rebuilds_failed,
            self.last_rebuild.as_secs_f64() * 1000.0,
            if self.rebuild_in_flight { ", running" } else { "" },
            self.patches_applied,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let stats = FrameStats {
            total_chunks: 500,
            snapshot_nodes: 300,
            visible_chunks: 120,
            visible_drawable: 80,
            rebuilds_completed: 3,
            last_rebuild: Duration::from_micros(1500),
            rebuild_in_flight: true,
            ..Default::default()
        };
        let line = stats.summary();
        assert!(line.starts_with("120 visible (80 drawable) / 300 in graph / 500 loaded"));
        assert!(line.contains("last 1.50ms, running"));
    }
}
