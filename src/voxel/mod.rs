//! Voxel world data: chunk coordinates, face connectivity and the chunk index

pub mod chunk;
pub mod chunk_handle;
pub mod direction;
pub mod face_visibility;
pub mod invalidator;
pub mod world_index;

pub use chunk::{ChunkCoord, CHUNK_SIZE};
pub use chunk_handle::ChunkHandle;
pub use direction::{Axis, Direction, DirectionSet};
pub use face_visibility::FaceVisibility;
pub use invalidator::{ChunkInvalidator, DirtyChunk};
pub use world_index::{IndexLayout, WorldIndex};
