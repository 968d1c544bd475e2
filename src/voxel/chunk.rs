//! Chunk grid coordinates

use crate::core::types::{IVec3, Vec3};
use crate::math::Aabb;
use crate::voxel::direction::Direction;

/// Size of a chunk in blocks along each axis
pub const CHUNK_SIZE: i32 = 16;

/// log2(CHUNK_SIZE), for block -> chunk conversion
pub const CHUNK_SHIFT: i32 = 4;

/// Integer coordinate identifying a chunk in the world grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk containing the given block
    pub fn from_block(block: IVec3) -> Self {
        Self {
            x: block.x >> CHUNK_SHIFT,
            y: block.y >> CHUNK_SHIFT,
            z: block.z >> CHUNK_SHIFT,
        }
    }

    /// Chunk containing the given world position
    pub fn from_world_pos(pos: Vec3) -> Self {
        Self::from_block(pos.floor().as_ivec3())
    }

    /// Block-space minimum corner of this chunk
    pub fn origin(&self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z) * CHUNK_SIZE
    }

    /// World-space center of this chunk
    pub fn center(&self) -> Vec3 {
        self.origin().as_vec3() + Vec3::splat(CHUNK_SIZE as f32 * 0.5)
    }

    /// World-space bounds of this chunk
    pub fn bounds(&self) -> Aabb {
        Aabb::from_origin_size(self.origin().as_vec3(), CHUNK_SIZE as f32)
    }

    /// Neighbor across the face in `dir`
    pub fn offset(&self, dir: Direction) -> Self {
        let d = dir.offset();
        Self::new(self.x + d.x, self.y + d.y, self.z + d.z)
    }

    /// Largest per-axis distance in chunks
    pub fn chebyshev_distance(&self, other: ChunkCoord) -> i32 {
        (self.x - other.x)
            .abs()
            .max((self.y - other.y).abs())
            .max((self.z - other.z).abs())
    }

    /// Largest horizontal (X/Z) distance in chunks
    pub fn horizontal_distance(&self, other: ChunkCoord) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_block() {
        assert_eq!(ChunkCoord::from_block(IVec3::new(0, 0, 0)), ChunkCoord::new(0, 0, 0));
        assert_eq!(ChunkCoord::from_block(IVec3::new(15, 16, 31)), ChunkCoord::new(0, 1, 1));
        assert_eq!(ChunkCoord::from_block(IVec3::new(-1, -16, -17)), ChunkCoord::new(-1, -1, -2));
    }

    #[test]
    fn test_from_world_pos_negative() {
        let coord = ChunkCoord::from_world_pos(Vec3::new(-0.1, 5.0, -16.0));
        assert_eq!(coord, ChunkCoord::new(-1, 0, -1));
    }

    #[test]
    fn test_origin_and_bounds() {
        let coord = ChunkCoord::new(1, -2, 3);
        assert_eq!(coord.origin(), IVec3::new(16, -32, 48));
        let bounds = coord.bounds();
        assert_eq!(bounds.min, Vec3::new(16.0, -32.0, 48.0));
        assert_eq!(bounds.max, Vec3::new(32.0, -16.0, 64.0));
        assert_eq!(coord.center(), Vec3::new(24.0, -24.0, 56.0));
    }

    #[test]
    fn test_offset_round_trip() {
        let coord = ChunkCoord::new(4, 5, 6);
        for dir in Direction::ALL {
            assert_eq!(coord.offset(dir).offset(dir.opposite()), coord);
            assert_eq!(coord.offset(dir).chebyshev_distance(coord), 1);
        }
    }

    #[test]
    fn test_distances() {
        let a = ChunkCoord::new(0, 0, 0);
        let b = ChunkCoord::new(3, -7, -2);
        assert_eq!(a.chebyshev_distance(b), 7);
        assert_eq!(a.horizontal_distance(b), 3);
    }
}
