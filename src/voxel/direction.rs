//! The six axis directions and a compact set of them

use crate::core::types::IVec3;

/// Coordinate axis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// One of the six face directions of a chunk.
///
/// North is -Z, South is +Z, West is -X, East is +X.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    Down = 0,
    Up = 1,
    North = 2,
    South = 3,
    West = 4,
    East = 5,
}

impl Direction {
    /// All directions in index order
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// Stable index in `0..6`
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Direction::Down | Direction::Up => Axis::Y,
            Direction::North | Direction::South => Axis::Z,
            Direction::West | Direction::East => Axis::X,
        }
    }

    /// Unit step in chunk (or block) space
    pub fn offset(self) -> IVec3 {
        match self {
            Direction::Down => IVec3::NEG_Y,
            Direction::Up => IVec3::Y,
            Direction::North => IVec3::NEG_Z,
            Direction::South => IVec3::Z,
            Direction::West => IVec3::NEG_X,
            Direction::East => IVec3::X,
        }
    }

    /// Direction of the dominant axis of `delta`; `None` for a zero vector.
    /// Ties prefer X, then Y.
    pub fn nearest(delta: IVec3) -> Option<Self> {
        if delta == IVec3::ZERO {
            return None;
        }
        let abs = delta.abs();
        let dir = if abs.x >= abs.y && abs.x >= abs.z {
            if delta.x > 0 { Direction::East } else { Direction::West }
        } else if abs.y >= abs.z {
            if delta.y > 0 { Direction::Up } else { Direction::Down }
        } else if delta.z > 0 {
            Direction::South
        } else {
            Direction::North
        };
        Some(dir)
    }
}

/// Bitset over the six directions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DirectionSet(u8);

impl DirectionSet {
    pub const EMPTY: DirectionSet = DirectionSet(0);
    pub const ALL: DirectionSet = DirectionSet(0b11_1111);

    pub fn single(dir: Direction) -> Self {
        Self(1 << dir.index())
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, dir: Direction) -> bool {
        self.0 & (1 << dir.index()) != 0
    }

    /// Add `dir`; returns true if it was not already present
    pub fn insert(&mut self, dir: Direction) -> bool {
        let before = self.0;
        self.0 |= 1 << dir.index();
        before != self.0
    }

    pub fn with(self, dir: Direction) -> Self {
        Self(self.0 | (1 << dir.index()))
    }

    pub fn union(self, other: DirectionSet) -> Self {
        Self(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

impl FromIterator<Direction> for DirectionSet {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, DirectionSet::with)
    }
}
