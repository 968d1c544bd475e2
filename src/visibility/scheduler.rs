//! When to rebuild, when to refilter.

use std::sync::Arc;
use std::time::Instant;

use crate::core::types::{IVec3, Vec3};

use super::config::CullingConfig;
use super::traversal::Watchdog;

/// Per-frame decisions of the visibility engine.
///
/// A full rebuild is due when the camera enters a new rebuild cell, when
/// one was requested, or when the watchdog deadline has passed; never while
/// another rebuild is still running.
#[derive(Debug)]
pub struct RebuildScheduler {
    cell_shift: u32,
    bucket_degrees: f32,
    last_rebuild_cell: Option<IVec3>,
    rebuild_requested: bool,
    last_rotation_bucket: Option<(i32, i32)>,
    last_filter_position: Option<Vec3>,
    watchdog: Arc<Watchdog>,
}

impl RebuildScheduler {
    pub fn new(config: &CullingConfig, watchdog: Arc<Watchdog>) -> Self {
        Self {
            cell_shift: config.rebuild_cell_shift(),
            bucket_degrees: config.rotation_bucket_degrees,
            last_rebuild_cell: None,
            rebuild_requested: false,
            last_rotation_bucket: None,
            last_filter_position: None,
            watchdog,
        }
    }

    pub fn watchdog(&self) -> &Arc<Watchdog> {
        &self.watchdog
    }

    /// Rebuild cell containing a block
    pub fn cell_of(&self, block: IVec3) -> IVec3 {
        block >> self.cell_shift as i32
    }

    /// Rebuild on the next eligible frame regardless of camera movement
    pub fn force_full_rebuild(&mut self) {
        self.rebuild_requested = true;
    }

    pub fn rebuild_requested(&self) -> bool {
        self.rebuild_requested
    }

    /// Decide whether to start a full rebuild this frame. A positive answer
    /// consumes the request and disarms the watchdog.
    pub fn should_rebuild(&mut self, camera_block: IVec3, now: Instant, in_flight: bool) -> bool {
        if in_flight {
            return false;
        }
        let cell = self.cell_of(camera_block);
        let moved = self.last_rebuild_cell != Some(cell);
        let expired = self.watchdog.is_expired(now);
        if !(moved || expired || self.rebuild_requested) {
            return false;
        }

        log::debug!(
            "Scheduling rebuild (moved: {}, watchdog: {}, requested: {})",
            moved,
            expired,
            self.rebuild_requested
        );
        self.last_rebuild_cell = Some(cell);
        self.rebuild_requested = false;
        self.watchdog.clear();
        true
    }

    /// Yaw/pitch bucket of a rotation in degrees
    pub fn rotation_bucket(&self, yaw: f32, pitch: f32) -> (i32, i32) {
        (
            (yaw / self.bucket_degrees).floor() as i32,
            (pitch / self.bucket_degrees).floor() as i32,
        )
    }

    /// Whether the frustum filter must rerun for this camera pose. Records
    /// the pose when it does.
    pub fn should_refilter(&mut self, position: Vec3, yaw: f32, pitch: f32) -> bool {
        let bucket = self.rotation_bucket(yaw, pitch);
        let changed = self.last_rotation_bucket != Some(bucket)
            || self.last_filter_position != Some(position);
        self.last_rotation_bucket = Some(bucket);
        self.last_filter_position = Some(position);
        changed
    }
}
