//! Bridge between the TCP debug server and the render loop.
//!
//! The server thread only touches `SharedDebugState`: it leaves requests
//! there and reads back whatever the render thread last published. The
//! render thread calls `VisibilityEngine::sync_debug_state` once per frame.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sightline_debug::{CaptureInfo, ChunkInfo, DebugCommand, DebugHandler, DebugResponse, ResponseData, StatsInfo};

use crate::math::Frustum;
use crate::visibility::{GraphNode, VisibilityEngine};
use crate::voxel::ChunkCoord;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const POLL_ATTEMPTS: u32 = 200;

/// State shared between the debug server and the render loop
#[derive(Debug, Default)]
pub struct SharedDebugState {
    // Requests (set by the debug handler, consumed by the render loop)
    pub capture_requested: bool,
    pub release_requested: bool,
    pub rebuild_requested: bool,
    pub chunk_query: Option<ChunkCoord>,

    // Published by the render loop
    pub stats: StatsInfo,
    pub capture: Option<CaptureInfo>,
    /// Answer to the last `chunk_query`; inner `None` when the chunk is not
    /// in the graph
    pub chunk_answer: Option<Option<ChunkInfo>>,
}

fn lock(state: &Mutex<SharedDebugState>) -> MutexGuard<'_, SharedDebugState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn node_info(node: &GraphNode, frustum: &Frustum) -> ChunkInfo {
    ChunkInfo {
        x: node.coord.x,
        y: node.coord.y,
        z: node.coord.z,
        depth: node.depth,
        entry_directions: node.entry_directions.bits(),
        discovery_directions: node.discovery_directions.bits(),
        in_frustum: frustum.intersects_aabb(node.chunk.bounding_box()),
        drawable: node.chunk.has_drawable_content(),
    }
}

impl VisibilityEngine {
    /// Apply pending debug requests and publish this frame's state.
    pub fn sync_debug_state(&mut self, state: &Mutex<SharedDebugState>) {
        let mut s = lock(state);

        if std::mem::take(&mut s.rebuild_requested) {
            log::info!("Debug: full rebuild requested");
            self.force_full_rebuild();
        }
        if std::mem::take(&mut s.release_requested) {
            self.release_debug_snapshot();
            s.capture = None;
        }
        if std::mem::take(&mut s.capture_requested) {
            let capture = self.capture_snapshot_for_debug();
            s.capture = Some(CaptureInfo {
                camera_position: capture.camera_position.to_array(),
                camera_chunk: [capture.camera_chunk.x, capture.camera_chunk.y, capture.camera_chunk.z],
                node_count: capture.snapshot.len() as u32,
                visible_count: capture.visible.len() as u32,
                nodes: capture
                    .snapshot
                    .nodes()
                    .iter()
                    .map(|node| node_info(node, &capture.frustum))
                    .collect(),
            });
        }
        if let Some(coord) = s.chunk_query.take() {
            let frustum = self.frustum();
            s.chunk_answer = Some(self.snapshot().get(coord).map(|node| node_info(node, frustum)));
        }

        let stats = self.stats();
        s.stats = StatsInfo {
            total_chunks: stats.total_chunks,
            snapshot_nodes: stats.snapshot_nodes,
            visible_chunks: stats.visible_chunks,
            visible_drawable: stats.visible_drawable,
            rebuilds_completed: stats.rebuilds_completed,
            rebuilds_failed: stats.rebuilds_failed,
            patches_applied: stats.patches_applied,
            last_rebuild_ms: stats.last_rebuild.as_secs_f32() * 1000.0,
            rebuild_in_flight: stats.rebuild_in_flight,
            capture_active: self.debug_capture().is_some(),
        };
    }
}

/// `DebugHandler` answering from a `SharedDebugState`
pub struct VisibilityDebugHandler {
    state: Arc<Mutex<SharedDebugState>>,
}

impl VisibilityDebugHandler {
    pub fn new(state: Arc<Mutex<SharedDebugState>>) -> Self {
        Self { state }
    }

    fn query_chunk(&self, coord: ChunkCoord) -> DebugResponse {
        {
            let mut s = lock(&self.state);
            s.chunk_query = Some(coord);
            s.chunk_answer = None;
        }

        // Wait for the render loop to pick the query up
        for _ in 0..POLL_ATTEMPTS {
            std::thread::sleep(POLL_INTERVAL);
            let mut s = lock(&self.state);
            match s.chunk_answer.take() {
                Some(Some(info)) => return DebugResponse::ok(ResponseData::ChunkInfo(info)),
                Some(None) => return DebugResponse::error(format!("chunk {} is not in the visibility graph", coord)),
                None => {}
            }
        }

        lock(&self.state).chunk_query = None;
        DebugResponse::error("Chunk query timed out")
    }
}

impl DebugHandler for VisibilityDebugHandler {
    fn handle_command(&mut self, cmd: DebugCommand) -> DebugResponse {
        match cmd {
            DebugCommand::Ping => DebugResponse::pong(),

            DebugCommand::GetStats => {
                let s = lock(&self.state);
                DebugResponse::ok(ResponseData::Stats(s.stats.clone()))
            }

            DebugCommand::CaptureSnapshot => {
                lock(&self.state).capture_requested = true;
                DebugResponse::none()
            }

            DebugCommand::ReleaseSnapshot => {
                lock(&self.state).release_requested = true;
                DebugResponse::none()
            }

            DebugCommand::GetCapture => match lock(&self.state).capture.clone() {
                Some(capture) => DebugResponse::ok(ResponseData::Capture(capture)),
                None => DebugResponse::error("No snapshot captured"),
            },

            DebugCommand::GetChunkInfo { x, y, z } => self.query_chunk(ChunkCoord::new(x, y, z)),

            DebugCommand::ForceRebuild => {
                lock(&self.state).rebuild_requested = true;
                DebugResponse::ok(ResponseData::ParamsUpdated {
                    description: "full rebuild scheduled".into(),
                })
            }
        }
    }
}
