//! Breadth-first visibility search over the chunk grid.
//!
//! A full rebuild seeds at the camera and floods outward, pruning neighbors
//! the current chunk's geometry cannot see into. The same relaxation step
//! runs for incremental patches, re-expanding existing nodes after their
//! chunk was recompiled.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::camera::Camera;
use crate::core::types::{IVec3, Vec3};
use crate::voxel::{ChunkCoord, Direction, DirectionSet, WorldIndex, CHUNK_SIZE};

use super::config::CullingConfig;
use super::node::GraphNode;
use super::snapshot::TraversalSnapshot;

/// `ceil(sqrt(3) * 16)`: one chunk diagonal
const RAY_STEP: f32 = 28.0;

/// Deadline after which a full rebuild is forced.
///
/// Shared between the render thread and rebuild workers; stored as
/// milliseconds since `epoch`, 0 meaning unarmed.
#[derive(Debug)]
pub struct Watchdog {
    epoch: Instant,
    deadline_ms: AtomicU64,
}

impl Watchdog {
    pub fn new(epoch: Instant) -> Self {
        Self {
            epoch,
            deadline_ms: AtomicU64::new(0),
        }
    }

    fn millis(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.epoch).as_millis() as u64
    }

    /// Arm for `now + bound`. An earlier pending deadline is kept.
    pub fn arm(&self, now: Instant, bound: Duration) {
        let deadline = (self.millis(now) + bound.as_millis() as u64).max(1);
        let _ = self
            .deadline_ms
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current == 0 || current > deadline).then_some(deadline)
            });
    }

    pub fn clear(&self) {
        self.deadline_ms.store(0, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline_ms.load(Ordering::Acquire) != 0
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        let deadline = self.deadline_ms.load(Ordering::Acquire);
        deadline != 0 && self.millis(now) >= deadline
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.deadline_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Some(self.epoch + Duration::from_millis(ms)),
        }
    }
}

/// Inputs of one traversal pass
#[derive(Clone, Debug)]
pub struct TraversalContext {
    pub camera_position: Vec3,
    pub camera_block: IVec3,
    pub camera_chunk: ChunkCoord,
    pub smart_cull: bool,
    /// Blocks from the camera chunk beyond which a chunk counts as far
    pub far_chunk_distance: i32,
    pub watchdog: Arc<Watchdog>,
    pub staleness_bound: Duration,
    /// Time the pass started, used when arming the watchdog
    pub now: Instant,
}

impl TraversalContext {
    pub fn new(camera: &Camera, config: &CullingConfig, watchdog: Arc<Watchdog>, now: Instant) -> Self {
        Self {
            camera_position: camera.position,
            camera_block: camera.block_pos(),
            camera_chunk: camera.chunk_coord(),
            smart_cull: config.smart_cull,
            far_chunk_distance: config.far_chunk_distance,
            watchdog,
            staleness_bound: Duration::from_millis(config.staleness_bound_ms),
            now,
        }
    }

    /// The chunk is missing data; make sure a rebuild revisits it unless the
    /// gap is just the edge of the loaded area.
    fn report_gap(&self, index: &WorldIndex, coord: ChunkCoord) {
        if !index.is_near_border(coord) {
            log::trace!("Loading gap at {}, arming rebuild watchdog", coord);
            self.watchdog.arm(self.now, self.staleness_bound);
        }
    }

    fn camera_chunk_center(&self) -> Vec3 {
        self.camera_chunk.center()
    }
}

/// Run a full rebuild: seed, then flood until the queue empties.
pub fn build_snapshot(index: &WorldIndex, ctx: &TraversalContext) -> TraversalSnapshot {
    let mut snapshot = TraversalSnapshot::new(index, ctx.camera_chunk);
    let mut queue = VecDeque::new();
    seed(&mut snapshot, index, ctx, &mut queue);
    let seeds = queue.len();
    relax(&mut snapshot, index, ctx, &mut queue);
    log::debug!(
        "Visibility rebuild from {}: {} seeds, {} nodes of {} chunks",
        ctx.camera_chunk,
        seeds,
        snapshot.len(),
        index.chunk_count()
    );
    snapshot
}

/// Enqueue the start of the search.
///
/// The camera's own chunk when it is loaded; otherwise every loaded chunk of
/// the view square at the nearest world layer, closest first.
pub fn seed(
    snapshot: &mut TraversalSnapshot,
    index: &WorldIndex,
    ctx: &TraversalContext,
    queue: &mut VecDeque<u32>,
) {
    if let Some(handle) = index.lookup(ctx.camera_chunk) {
        if let Some(i) = snapshot.insert(GraphNode::seed(handle.clone())) {
            queue.push_back(i);
        }
        return;
    }

    let y = index.clamp_section_y(ctx.camera_chunk.y);
    let radius = index.view_distance();
    let mut candidates = Vec::new();
    for dz in -radius..=radius {
        for dx in -radius..=radius {
            let coord = ChunkCoord::new(ctx.camera_chunk.x + dx, y, ctx.camera_chunk.z + dz);
            if let Some(handle) = index.lookup(coord) {
                let d = handle.origin() + IVec3::splat(CHUNK_SIZE / 2) - ctx.camera_block;
                candidates.push((d.as_i64vec3().length_squared(), handle));
            }
        }
    }
    candidates.sort_by_key(|(distance, _)| *distance);

    for (_, handle) in candidates {
        if let Some(i) = snapshot.insert(GraphNode::seed(handle.clone())) {
            queue.push_back(i);
        }
    }
}

/// Expand queued nodes until the queue is empty.
pub fn relax(
    snapshot: &mut TraversalSnapshot,
    index: &WorldIndex,
    ctx: &TraversalContext,
    queue: &mut VecDeque<u32>,
) {
    let camera_origin = ctx.camera_chunk.origin();

    while let Some(current) = queue.pop_front() {
        let node = snapshot.node(current);
        let coord = node.coord;
        let entry = node.entry_directions;
        let discovered = node.discovery_directions;
        let depth = node.depth;
        let visibility = node.chunk.face_visibility();

        let offset = coord.origin() - camera_origin;
        let far = offset.abs().max_element() > ctx.far_chunk_distance;
        let nominal_axis = Direction::nearest(offset).map(Direction::axis);
        let near_camera = coord.chebyshev_distance(ctx.camera_chunk) <= 1;

        for outgoing in Direction::ALL {
            let neighbor = coord.offset(outgoing);

            if !index.bounds_contains(neighbor) {
                ctx.report_gap(index, neighbor);
                continue;
            }

            if ctx.smart_cull {
                if !near_camera && entry.contains(outgoing.opposite()) {
                    continue;
                }
                if !discovered.is_empty()
                    && !discovered
                        .iter()
                        .any(|d| visibility.can_see(d.opposite(), outgoing))
                {
                    continue;
                }
                if far
                    && nominal_axis != Some(outgoing.axis())
                    && far_neighbor_occluded(snapshot, index, ctx, neighbor, outgoing)
                {
                    continue;
                }
            }

            if let Some(existing) = snapshot.index_of(neighbor) {
                snapshot
                    .node_mut(existing)
                    .discovery_directions
                    .insert(outgoing);
                continue;
            }

            match index.lookup(neighbor) {
                Some(handle) if handle.has_complete_neighbor_data() => {
                    let node = GraphNode {
                        coord: neighbor,
                        chunk: handle.clone(),
                        entry_directions: entry.with(outgoing),
                        discovery_directions: DirectionSet::single(outgoing),
                        depth: depth + 1,
                    };
                    if let Some(i) = snapshot.insert(node) {
                        queue.push_back(i);
                    }
                }
                _ => ctx.report_gap(index, neighbor),
            }
        }
    }
}

/// Coarse line-of-sight test for far chunks: march from the neighbor toward
/// the camera one chunk diagonal at a time. Any sample landing in a chunk the
/// search has not reached means the neighbor is hidden.
pub fn far_neighbor_occluded(
    snapshot: &TraversalSnapshot,
    index: &WorldIndex,
    ctx: &TraversalContext,
    neighbor: ChunkCoord,
    outgoing: Direction,
) -> bool {
    let camera = ctx.camera_chunk_center();
    let origin = neighbor.origin();
    let axis = outgoing.axis() as usize;

    // Face nearest the camera on the travel axis, far corner on the others
    let mut start = origin;
    for i in 0..3 {
        let toward = if i == axis {
            camera[i] > origin[i] as f32
        } else {
            camera[i] < origin[i] as f32
        };
        if toward {
            start[i] += CHUNK_SIZE;
        }
    }

    let mut sample = start.as_vec3();
    let step = (camera - sample).normalize_or_zero() * RAY_STEP;
    if step == Vec3::ZERO {
        return false;
    }

    let limit = ctx.far_chunk_distance as f32;
    let min_y = index.min_build_height() as f32;
    let max_y = index.max_build_height() as f32;
    while camera.distance_squared(sample) > limit * limit {
        sample += step;
        if sample.y < min_y || sample.y > max_y {
            break;
        }
        if !snapshot.contains(ChunkCoord::from_world_pos(sample)) {
            return true;
        }
    }
    false
}

/// Re-expand nodes whose chunks were recompiled, in place.
///
/// Coordinates not in the snapshot, or whose index entry is no longer the
/// handle the node was built from, are ignored. Returns how many nodes were
/// re-expanded.
pub fn patch(
    snapshot: &mut TraversalSnapshot,
    index: &WorldIndex,
    ctx: &TraversalContext,
    recompiled: &[ChunkCoord],
) -> usize {
    let seeds = patch_seeds(snapshot, index, recompiled);
    let count = seeds.len();
    let mut queue: VecDeque<u32> = seeds.into();
    relax(snapshot, index, ctx, &mut queue);
    count
}

/// Nodes a patch for `recompiled` would re-expand
pub fn patch_seeds(
    snapshot: &TraversalSnapshot,
    index: &WorldIndex,
    recompiled: &[ChunkCoord],
) -> Vec<u32> {
    if !snapshot.matches_index(index) {
        log::debug!(
            "Skipping patch of {} chunks: snapshot built around {}, index now at {}",
            recompiled.len(),
            snapshot.center(),
            index.center()
        );
        return Vec::new();
    }

    let mut seeds = Vec::with_capacity(recompiled.len());
    for &coord in recompiled {
        let Some(i) = snapshot.index_of(coord) else {
            continue;
        };
        match index.lookup(coord) {
            Some(handle) if Arc::ptr_eq(handle, &snapshot.node(i).chunk) => {
                if !seeds.contains(&i) {
                    seeds.push(i);
                }
            }
            _ => log::warn!("Ignoring recompile of {}: chunk was replaced or unloaded", coord),
        }
    }
    seeds
}
