//! Per-chunk face-to-face visibility table produced by mesh compilation.

use crate::voxel::direction::Direction;

/// Symmetric 6x6 table telling whether line of sight can pass from one face
/// of a chunk to another through the chunk's open space.
///
/// Packed as 36 bits of a `u64` (bit `a * 6 + b`), so it is stored and copied
/// as a plain value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FaceVisibility(u64);

const FULL_MASK: u64 = (1 << 36) - 1;

impl FaceVisibility {
    /// Every face sees every other face (empty or airy chunk)
    pub const fn all() -> Self {
        Self(FULL_MASK)
    }

    /// No face sees any other face (solid or not yet compiled chunk)
    pub const fn none() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u64) -> Self {
        Self(bits & FULL_MASK)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    fn bit(a: Direction, b: Direction) -> u64 {
        1 << (a.index() * 6 + b.index())
    }

    /// Set the pair in both orders
    pub fn set(&mut self, a: Direction, b: Direction, visible: bool) {
        let mask = Self::bit(a, b) | Self::bit(b, a);
        if visible {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    /// Builder form of [`set`](Self::set)
    pub fn with(mut self, a: Direction, b: Direction, visible: bool) -> Self {
        self.set(a, b, visible);
        self
    }

    #[inline]
    pub fn can_see(self, a: Direction, b: Direction) -> bool {
        self.0 & Self::bit(a, b) != 0
    }
}
