//! Sightline - chunk visibility and occlusion culling for voxel worlds

pub mod core;
pub mod math;
pub mod voxel;
pub mod visibility;
pub mod debug;
