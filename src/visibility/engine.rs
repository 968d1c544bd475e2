//! VisibilityEngine - the render thread's view of the visibility system.
//!
//! Owns the current snapshot and the per-frame visible list. Full rebuilds
//! run on the rayon pool against a detached copy of the world index and come
//! back over a channel; installing one is a single `Arc` replacement.
//! Incremental patches run on the render thread between frames.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::camera::Camera;
use crate::core::error::Error;
use crate::core::types::{IVec3, Result, Vec3};
use crate::math::Frustum;
use crate::voxel::{ChunkCoord, ChunkHandle, DirtyChunk, WorldIndex};

use super::config::CullingConfig;
use super::frustum_filter::FrustumFilter;
use super::node::GraphNode;
use super::scheduler::RebuildScheduler;
use super::snapshot::TraversalSnapshot;
use super::stats::FrameStats;
use super::traversal::{self, TraversalContext, Watchdog};

type RebuildFn = fn(&WorldIndex, &TraversalContext) -> TraversalSnapshot;

struct Rebuilt {
    snapshot: Arc<TraversalSnapshot>,
    elapsed: Duration,
}

/// Snapshot and frustum frozen for an out-of-band debug view.
///
/// Later camera movement, rebuilds and patches leave it untouched.
#[derive(Clone, Debug)]
pub struct DebugCapture {
    pub snapshot: Arc<TraversalSnapshot>,
    pub frustum: Frustum,
    pub camera_position: Vec3,
    pub camera_chunk: ChunkCoord,
    /// Node indices that passed the frustum filter when captured
    pub visible: Vec<u32>,
}

impl DebugCapture {
    pub fn visible_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.visible.iter().map(|&i| self.snapshot.node(i))
    }
}

#[derive(Debug, Default)]
struct Counters {
    rebuilds_completed: u64,
    rebuilds_failed: u64,
    patches_applied: u64,
    last_rebuild: Duration,
}

/// Chunk visibility for one camera.
pub struct VisibilityEngine {
    config: CullingConfig,
    index: WorldIndex,
    scheduler: RebuildScheduler,
    snapshot: Arc<TraversalSnapshot>,
    filter: FrustumFilter,
    camera: Camera,
    frustum: Frustum,
    recompiled_tx: Sender<ChunkCoord>,
    recompiled_rx: Receiver<ChunkCoord>,
    results_tx: Sender<Result<Rebuilt>>,
    results_rx: Receiver<Result<Rebuilt>>,
    rebuild_in_flight: bool,
    /// Recompiles drained while a rebuild was running, replayed onto its result
    pending_recompiles: Vec<ChunkCoord>,
    rebuild_fn: RebuildFn,
    capture: Option<DebugCapture>,
    counters: Counters,
}

impl VisibilityEngine {
    /// Create an engine with an empty world index centered on the origin.
    pub fn new(config: CullingConfig) -> Result<Self> {
        let index = WorldIndex::new(config.index_layout(), ChunkCoord::new(0, 0, 0));
        Self::with_index(config, index)
    }

    /// Create an engine over an existing world index.
    pub fn with_index(config: CullingConfig, index: WorldIndex) -> Result<Self> {
        config.validate()?;
        if *index.layout() != config.index_layout() {
            return Err(Error::Config(format!(
                "world index layout {:?} does not match config {:?}",
                index.layout(),
                config.index_layout()
            )));
        }

        let watchdog = Arc::new(Watchdog::new(Instant::now()));
        let (recompiled_tx, recompiled_rx) = mpsc::channel();
        let (results_tx, results_rx) = mpsc::channel();
        let camera = Camera::default();

        Ok(Self {
            scheduler: RebuildScheduler::new(&config, watchdog),
            snapshot: Arc::new(TraversalSnapshot::new(&index, camera.chunk_coord())),
            filter: FrustumFilter::new(),
            frustum: camera.frustum(),
            camera,
            config,
            index,
            recompiled_tx,
            recompiled_rx,
            results_tx,
            results_rx,
            rebuild_in_flight: false,
            pending_recompiles: Vec::new(),
            rebuild_fn: traversal::build_snapshot,
            capture: None,
            counters: Counters::default(),
        })
    }

    pub fn config(&self) -> &CullingConfig {
        &self.config
    }

    pub fn index(&self) -> &WorldIndex {
        &self.index
    }

    /// Mutable world index for the chunk loader. Call between frames.
    pub fn index_mut(&mut self) -> &mut WorldIndex {
        &mut self.index
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Frustum the visible list was last computed with
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Run one frame step.
    pub fn update(&mut self, camera: &Camera, now: Instant) {
        self.camera = *camera;
        self.frustum = camera.frustum();

        let mut filtered = self.poll_rebuild(now);

        if self
            .scheduler
            .should_rebuild(camera.block_pos(), now, self.rebuild_in_flight)
        {
            filtered |= self.start_rebuild(now);
        }

        filtered |= self.apply_patches(now);

        let (yaw, pitch) = camera.euler_degrees();
        if self.scheduler.should_refilter(camera.position, yaw, pitch) && !filtered {
            self.refilter();
        }
    }

    fn context(&self, now: Instant) -> TraversalContext {
        TraversalContext::new(&self.camera, &self.config, self.scheduler.watchdog().clone(), now)
    }

    fn refilter(&mut self) {
        self.filter.update(&self.snapshot, &self.frustum);
    }

    /// Start a full rebuild; returns true if it finished inline and was
    /// installed.
    fn start_rebuild(&mut self, now: Instant) -> bool {
        let ctx = self.context(now);

        if !self.config.background_rebuilds {
            let outcome = run_rebuild(self.rebuild_fn, &self.index, &ctx);
            return self.finish_rebuild(outcome, now);
        }

        let index = self.index.detached();
        let results = self.results_tx.clone();
        let rebuild = self.rebuild_fn;
        self.rebuild_in_flight = true;
        rayon::spawn(move || {
            let outcome = run_rebuild(rebuild, &index, &ctx);
            if results.send(outcome).is_err() {
                log::debug!("Visibility engine dropped before rebuild finished");
            }
        });
        false
    }

    /// Install a finished background rebuild, if one is waiting.
    fn poll_rebuild(&mut self, now: Instant) -> bool {
        match self.results_rx.try_recv() {
            Ok(outcome) => self.finish_rebuild(outcome, now),
            Err(_) => false,
        }
    }

    fn finish_rebuild(&mut self, outcome: Result<Rebuilt>, now: Instant) -> bool {
        self.rebuild_in_flight = false;
        let pending = std::mem::take(&mut self.pending_recompiles);
        match outcome {
            Ok(rebuilt) => {
                self.counters.rebuilds_completed += 1;
                self.counters.last_rebuild = rebuilt.elapsed;
                log::debug!(
                    "Installed visibility snapshot: {} nodes in {:.2}ms",
                    rebuilt.snapshot.len(),
                    rebuilt.elapsed.as_secs_f64() * 1000.0
                );
                self.snapshot = rebuilt.snapshot;
                self.replay_recompiles(&pending, now);
                self.refilter();
                true
            }
            // The previous snapshot already has these patched in
            Err(e) => {
                self.counters.rebuilds_failed += 1;
                log::error!("{}; keeping previous snapshot", e);
                false
            }
        }
    }

    /// Block until the in-flight rebuild (if any) is installed. Returns false
    /// on timeout.
    pub fn wait_for_rebuild(&mut self, timeout: Duration) -> bool {
        if !self.rebuild_in_flight {
            return true;
        }
        match self.results_rx.recv_timeout(timeout) {
            Ok(outcome) => {
                self.finish_rebuild(outcome, Instant::now());
                true
            }
            Err(_) => false,
        }
    }

    /// Drain recompile notifications and re-expand the affected nodes.
    fn apply_patches(&mut self, now: Instant) -> bool {
        let recompiled: Vec<ChunkCoord> = self.recompiled_rx.try_iter().collect();
        if recompiled.is_empty() {
            return false;
        }
        if self.rebuild_in_flight {
            // The worker may have read these chunks before they changed
            self.pending_recompiles.extend_from_slice(&recompiled);
        }

        let seeds = traversal::patch_seeds(&self.snapshot, &self.index, &recompiled);
        if seeds.is_empty() {
            return false;
        }

        let ctx = self.context(now);
        let count = seeds.len();
        // Copies only while a debug capture still holds this snapshot
        let snapshot = Arc::make_mut(&mut self.snapshot);
        let before = snapshot.len();
        let mut queue: VecDeque<u32> = seeds.into();
        traversal::relax(snapshot, &self.index, &ctx, &mut queue);

        log::debug!(
            "Patched {} recompiled chunks: {} -> {} nodes",
            count,
            before,
            snapshot.len()
        );
        self.counters.patches_applied += count as u64;
        self.refilter();
        true
    }

    /// Patch recompiles that raced a background rebuild into its result.
    fn replay_recompiles(&mut self, recompiled: &[ChunkCoord], now: Instant) {
        if recompiled.is_empty() {
            return;
        }
        let ctx = self.context(now);
        let count = traversal::patch(Arc::make_mut(&mut self.snapshot), &self.index, &ctx, recompiled);
        if count > 0 {
            log::debug!(
                "Replayed {} of {} recompiles onto the new snapshot",
                count,
                recompiled.len()
            );
        }
        self.counters.patches_applied += count as u64;
    }

    /// Queue a chunk whose mesh was just rebuilt
    pub fn notify_recompiled(&self, coord: ChunkCoord) {
        // The receiver lives as long as `self`
        let _ = self.recompiled_tx.send(coord);
    }

    /// Sender mesh workers can use to report recompiled chunks from any
    /// thread.
    pub fn recompile_notifier(&self) -> Sender<ChunkCoord> {
        self.recompiled_tx.clone()
    }

    /// Invalidate a chunk so the mesh compiler revisits it.
    pub fn mark_dirty(&mut self, coord: ChunkCoord, main_thread_hint: bool) -> bool {
        self.index.mark_dirty(coord, main_thread_hint)
    }

    /// Invalidate chunks touched by an edit of the inclusive block range and
    /// their face neighbors.
    pub fn mark_region_dirty(&mut self, min_block: IVec3, max_block: IVec3) -> usize {
        self.index.mark_region_dirty(min_block, max_block)
    }

    /// Chunks waiting for the mesh compiler, main-thread work first
    pub fn take_dirty_chunks(&mut self) -> Vec<DirtyChunk> {
        self.index.take_dirty_chunks()
    }

    /// Visible chunks in snapshot order
    pub fn visible_chunks(&self) -> impl Iterator<Item = &Arc<ChunkHandle>> {
        self.visible_nodes().map(|node| &node.chunk)
    }

    pub fn visible_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.filter.visible().iter().map(|&i| self.snapshot.node(i))
    }

    pub fn visible_count(&self) -> usize {
        self.filter.len()
    }

    pub fn total_chunk_count(&self) -> usize {
        self.index.chunk_count()
    }

    pub fn visible_drawable_count(&self) -> usize {
        self.visible_chunks()
            .filter(|chunk| chunk.has_drawable_content())
            .count()
    }

    /// Freeze the current snapshot and frustum for a debug overlay.
    pub fn capture_snapshot_for_debug(&mut self) -> &DebugCapture {
        self.capture.insert(DebugCapture {
            snapshot: Arc::clone(&self.snapshot),
            frustum: self.frustum,
            camera_position: self.camera.position,
            camera_chunk: self.camera.chunk_coord(),
            visible: self.filter.visible().to_vec(),
        })
    }

    pub fn release_debug_snapshot(&mut self) {
        self.capture = None;
    }

    pub fn debug_capture(&self) -> Option<&DebugCapture> {
        self.capture.as_ref()
    }

    /// Rebuild on the next frame no rebuild is running
    pub fn force_full_rebuild(&mut self) {
        self.scheduler.force_full_rebuild();
    }

    /// Resize the loaded area. Returns the chunks that no longer fit.
    pub fn set_view_distance(&mut self, view_distance: i32) -> Result<Vec<Arc<ChunkHandle>>> {
        let config = CullingConfig {
            view_distance,
            ..self.config.clone()
        };
        config.validate()?;
        self.config = config;

        let dropped = self.index.set_view_distance(view_distance);
        log::info!(
            "View distance set to {} chunks ({} chunks dropped)",
            view_distance,
            dropped.len()
        );
        self.scheduler.force_full_rebuild();
        Ok(dropped)
    }

    /// Current snapshot
    pub fn snapshot(&self) -> &Arc<TraversalSnapshot> {
        &self.snapshot
    }

    pub fn rebuild_in_flight(&self) -> bool {
        self.rebuild_in_flight
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            total_chunks: self.total_chunk_count() as u32,
            snapshot_nodes: self.snapshot.len() as u32,
            visible_chunks: self.visible_count() as u32,
            visible_drawable: self.visible_drawable_count() as u32,
            rebuilds_completed: self.counters.rebuilds_completed,
            rebuilds_failed: self.counters.rebuilds_failed,
            patches_applied: self.counters.patches_applied,
            last_rebuild: self.counters.last_rebuild,
            rebuild_in_flight: self.rebuild_in_flight,
        }
    }

    #[cfg(test)]
    fn set_rebuild_fn(&mut self, rebuild: RebuildFn) {
        self.rebuild_fn = rebuild;
    }
}

fn run_rebuild(rebuild: RebuildFn, index: &WorldIndex, ctx: &TraversalContext) -> Result<Rebuilt> {
    let start = Instant::now();
    match panic::catch_unwind(AssertUnwindSafe(|| rebuild(index, ctx))) {
        Ok(snapshot) => Ok(Rebuilt {
            snapshot: Arc::new(snapshot),
            elapsed: start.elapsed(),
        }),
        Err(payload) => Err(Error::Rebuild(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "rebuild panicked".to_string()
    }
}
