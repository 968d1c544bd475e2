//! Sightline demo: flies a camera over a synthetic voxel landscape while the
//! visibility engine culls it, streaming chunks in around the camera.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sightline::core::{logging, Camera, IVec3, Vec3};
use sightline::debug::{SharedDebugState, VisibilityDebugHandler};
use sightline::visibility::{CullingConfig, VisibilityEngine};
use sightline::voxel::{ChunkCoord, ChunkHandle, Direction, FaceVisibility, WorldIndex, CHUNK_SIZE};

/// Chunks the mesh compiler finishes per frame
const COMPILE_BUDGET: usize = 256;
/// Blocks the camera travels per frame
const FLY_SPEED: f32 = 1.5;

/// Procedural terrain: rolling hills over solid rock, with open cave shafts
/// in a sparse grid of columns.
struct DemoWorld {
    seed: u32,
}

impl DemoWorld {
    fn new(seed: u32) -> Self {
        Self { seed }
    }

    fn hash(&self, x: i32, z: i32) -> u32 {
        let mut h = self.seed ^ (x as u32).wrapping_mul(0x9E37_79B1) ^ (z as u32).wrapping_mul(0x85EB_CA77);
        h ^= h >> 15;
        h = h.wrapping_mul(0x2C1B_3C6D);
        h ^ (h >> 12)
    }

    /// Terrain surface height in blocks
    fn surface_height(&self, x: i32, z: i32) -> i32 {
        let fx = x as f32 / 96.0;
        let fz = z as f32 / 96.0;
        let hills = (fx.sin() + (fz * 1.3).cos()) * 18.0 + (fx * 0.37 + fz * 0.61).sin() * 30.0;
        64 + hills as i32
    }

    fn is_cave_column(&self, cx: i32, cz: i32) -> bool {
        self.hash(cx, cz) % 11 == 0
    }

    /// Face connectivity and drawability a mesh compile would produce
    fn compile(&self, coord: ChunkCoord) -> (FaceVisibility, bool) {
        let origin = coord.origin();
        let center_x = origin.x + CHUNK_SIZE / 2;
        let center_z = origin.z + CHUNK_SIZE / 2;
        let surface = self.surface_height(center_x, center_z);
        let top = origin.y + CHUNK_SIZE;

        if origin.y > surface {
            // Open air
            (FaceVisibility::all(), false)
        } else if top > surface {
            // Surface: sight passes over the ground but not down into it
            let mut visibility = FaceVisibility::all();
            for dir in Direction::ALL {
                visibility.set(Direction::Down, dir, false);
            }
            (visibility, true)
        } else if self.is_cave_column(coord.x, coord.z) {
            // Vertical shaft
            let visibility = FaceVisibility::none()
                .with(Direction::Up, Direction::Down, true)
                .with(Direction::Up, Direction::Up, true)
                .with(Direction::Down, Direction::Down, true);
            (visibility, true)
        } else {
            (FaceVisibility::none(), false)
        }
    }
}

/// Keeps the world index filled around the camera and plays the part of
/// the mesh compiler.
struct ChunkStreamer {
    world: DemoWorld,
}

impl ChunkStreamer {
    fn load_around(&self, engine: &mut VisibilityEngine, camera_chunk: ChunkCoord) {
        let index = engine.index_mut();
        let dropped = index.recenter(camera_chunk);
        if !dropped.is_empty() {
            log::debug!("Unloaded {} chunks", dropped.len());
        }

        let layout = *index.layout();
        let center = index.center();
        let mut loaded = 0usize;
        for dz in -layout.view_distance..=layout.view_distance {
            for dx in -layout.view_distance..=layout.view_distance {
                for y in layout.min_section_y..layout.min_section_y + layout.height_sections {
                    let coord = ChunkCoord::new(center.x + dx, y, center.z + dz);
                    if index.lookup(coord).is_some() {
                        continue;
                    }
                    if let Err(e) = index.insert(Arc::new(ChunkHandle::new(coord))) {
                        log::warn!("Failed to load chunk: {}", e);
                        continue;
                    }
                    loaded += 1;
                }
            }
        }
        if loaded > 0 {
            log::debug!("Loaded {} chunks around {}", loaded, center);
        }

        // Neighbor data is complete once every in-range neighbor is present
        for handle in index.iter() {
            if handle.has_complete_neighbor_data() {
                continue;
            }
            let complete = Direction::ALL.iter().all(|&dir| {
                let neighbor = handle.coord().offset(dir);
                !index.bounds_contains(neighbor) || index.lookup(neighbor).is_some()
            });
            handle.set_complete_neighbor_data(complete);
        }
    }

    /// Compile dirty chunks, nearest first, and report them to the engine.
    fn compile_dirty(&self, engine: &mut VisibilityEngine, camera_chunk: ChunkCoord) -> usize {
        let notifier = engine.recompile_notifier();

        let mut pending: Vec<Arc<ChunkHandle>> = engine
            .index()
            .iter()
            .filter(|h| h.is_dirty() && h.has_complete_neighbor_data())
            .cloned()
            .collect();
        for dirty in engine.take_dirty_chunks() {
            if let Some(handle) = engine.index().lookup(dirty.coord) {
                if !pending.iter().any(|h| Arc::ptr_eq(h, handle)) {
                    pending.push(handle.clone());
                }
            }
        }
        pending.sort_by_key(|h| {
            (
                !h.is_dirty_from_main_thread(),
                h.coord().chebyshev_distance(camera_chunk),
            )
        });

        let mut compiled = 0;
        for handle in pending.into_iter().take(COMPILE_BUDGET) {
            let (visibility, drawable) = self.world.compile(handle.coord());
            handle.set_compiled(visibility, drawable);
            if notifier.send(handle.coord()).is_err() {
                break;
            }
            compiled += 1;
        }
        compiled
    }
}

fn start_debug_server(state: Arc<Mutex<SharedDebugState>>) {
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                log::error!("Failed to create tokio runtime for debug server: {}", e);
                return;
            }
        };
        rt.block_on(async {
            let handler = Arc::new(tokio::sync::Mutex::new(VisibilityDebugHandler::new(state)));
            let _server = sightline_debug::DebugServer::start(handler, sightline_debug::DEFAULT_PORT);
            log::info!("Debug server started on port {}", sightline_debug::DEFAULT_PORT);
            // Keep runtime alive
            loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        });
    });
}

fn run(config: CullingConfig, frames: u32, debug_server: bool) -> sightline::core::types::Result<()> {
    let index = WorldIndex::new(config.index_layout(), ChunkCoord::new(0, 0, 0));
    let mut engine = VisibilityEngine::with_index(config, index)?;
    let streamer = ChunkStreamer { world: DemoWorld::new(0x5167_4C1E) };

    let debug_state = Arc::new(Mutex::new(SharedDebugState::default()));
    if debug_server {
        start_debug_server(debug_state.clone());
    }

    let mut camera = Camera::new(Vec3::new(8.0, 110.0, 8.0), 70.0, 16.0 / 9.0);
    let start = Instant::now();

    for frame in 0..frames {
        let t = frame as f32;
        let yaw = (t * 0.2).to_radians();
        camera.position += Vec3::new(yaw.cos(), 0.0, -yaw.sin()) * FLY_SPEED;
        camera.set_rotation_euler(-std::f32::consts::FRAC_PI_2 + yaw * 0.5, -0.25);

        let camera_chunk = camera.chunk_coord();
        streamer.load_around(&mut engine, camera_chunk);

        // Dig a small crater under the camera every few seconds
        if frame % 180 == 90 {
            let block = camera.block_pos();
            let floor = IVec3::new(block.x, 40, block.z);
            let marked = engine.mark_region_dirty(floor - IVec3::splat(3), floor + IVec3::splat(3));
            log::info!("Edit at {}: {} chunks invalidated", floor, marked);
        }

        streamer.compile_dirty(&mut engine, camera_chunk);
        engine.update(&camera, Instant::now());

        if debug_server {
            engine.sync_debug_state(&debug_state);
            std::thread::sleep(Duration::from_millis(16));
        }

        if frame % 60 == 0 {
            log::info!("frame {}: {}", frame, engine.stats().summary());
        }
    }

    if !engine.wait_for_rebuild(Duration::from_secs(5)) {
        log::warn!("Last rebuild still running at exit");
    }
    log::info!(
        "Finished {} frames in {:.2}s: {}",
        frames,
        start.elapsed().as_secs_f32(),
        engine.stats().summary()
    );
    Ok(())
}

fn main() {
    logging::init();
    log::info!("Sightline demo starting...");

    let args: Vec<String> = std::env::args().collect();

    let mut config = match parse_config_arg(&args) {
        Some(path) => match CullingConfig::load(&path) {
            Ok(config) => {
                log::info!("Loaded culling config from {}", path.display());
                config
            }
            Err(e) => {
                log::error!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => CullingConfig::default(),
    };
    if let Some(view_distance) = parse_view_distance_arg(&args) {
        config.view_distance = view_distance;
    }
    let frames = parse_frames_arg(&args).unwrap_or(600);
    let debug_server = args.iter().any(|a| a == "--debug-server");

    log::info!(
        "View distance {} chunks, smart cull {}, {} frames",
        config.view_distance,
        config.smart_cull,
        frames
    );

    if let Err(e) = run(config, frames, debug_server) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

/// Parse --config argument (path to a culling config JSON)
fn parse_config_arg(args: &[String]) -> Option<PathBuf> {
    for i in 0..args.len() {
        if args[i] == "--config" || args[i] == "-c" {
            if let Some(path) = args.get(i + 1) {
                return Some(PathBuf::from(path));
            }
        }
    }
    None
}

/// Parse --view-distance argument (in chunks)
fn parse_view_distance_arg(args: &[String]) -> Option<i32> {
    for i in 0..args.len() {
        if args[i] == "--view-distance" || args[i] == "-v" {
            if let Some(value) = args.get(i + 1) {
                return value.parse().ok();
            }
        }
    }
    None
}

/// Parse --frames argument
fn parse_frames_arg(args: &[String]) -> Option<u32> {
    for i in 0..args.len() {
        if args[i] == "--frames" || args[i] == "-f" {
            if let Some(value) = args.get(i + 1) {
                return value.parse().ok();
            }
        }
    }
    None
}
