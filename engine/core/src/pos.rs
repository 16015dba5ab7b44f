use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

const X_BITS: u32 = 26;
const Y_BITS: u32 = 12;
const Z_BITS: u32 = 26;

const X_SHIFT: u32 = Y_BITS + Z_BITS;
const Y_SHIFT: u32 = Z_BITS;

const X_MASK: u64 = (1 << X_BITS) - 1;
const Y_MASK: u64 = (1 << Y_BITS) - 1;
const Z_MASK: u64 = (1 << Z_BITS) - 1;

/// Inclusive-exclusive bounds of the supported coordinate range
pub const HORIZONTAL_BOUND: i32 = 1 << (X_BITS - 1);
pub const VERTICAL_BOUND: i32 = 1 << (Y_BITS - 1);

/// A 3D integer coordinate packed into a single 64-bit key.
///
/// The packing is a bijection over the supported range (x, z within
/// `±HORIZONTAL_BOUND`, y within `±VERTICAL_BOUND`), so the key serves both
/// as the canonical node identifier and as the hash key for adjacency maps.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct PackedPos(u64);

impl PackedPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        debug_assert!(in_range(x, y, z), "coordinate ({x}, {y}, {z}) out of packable range");
        Self((((x as u64) & X_MASK) << X_SHIFT) | (((y as u64) & Y_MASK) << Y_SHIFT) | ((z as u64) & Z_MASK))
    }

    pub fn x(self) -> i32 {
        sign_extend(self.0 >> X_SHIFT, X_BITS)
    }

    pub fn y(self) -> i32 {
        sign_extend(self.0 >> Y_SHIFT, Y_BITS)
    }

    pub fn z(self) -> i32 {
        sign_extend(self.0, Z_BITS)
    }

    /// The neighboring position one unit through `face`, or `None` when the
    /// step leaves the supported coordinate range
    pub fn offset(self, face: Face) -> Option<PackedPos> {
        let (dx, dy, dz) = face.delta();
        let (x, y, z) = (self.x() + dx, self.y() + dy, self.z() + dz);
        in_range(x, y, z).then(|| PackedPos::new(x, y, z))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

fn in_range(x: i32, y: i32, z: i32) -> bool {
    (-HORIZONTAL_BOUND..HORIZONTAL_BOUND).contains(&x)
        && (-VERTICAL_BOUND..VERTICAL_BOUND).contains(&y)
        && (-HORIZONTAL_BOUND..HORIZONTAL_BOUND).contains(&z)
}

fn sign_extend(word: u64, bits: u32) -> i32 {
    let shift = 64 - bits;
    (((word << shift) as i64) >> shift) as i32
}

impl Display for PackedPos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x(), self.y(), self.z())
    }
}

impl Debug for PackedPos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// One of the six unit-adjacency directions between positions.
#[derive(PartialEq, Eq, Clone, Copy, Hash, Debug, Serialize, Deserialize)]
pub enum Face {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Face {
    pub const ALL: [Face; 6] = [Face::Down, Face::Up, Face::North, Face::South, Face::West, Face::East];

    pub fn delta(self) -> (i32, i32, i32) {
        match self {
            Face::Down => (0, -1, 0),
            Face::Up => (0, 1, 0),
            Face::North => (0, 0, -1),
            Face::South => (0, 0, 1),
            Face::West => (-1, 0, 0),
            Face::East => (1, 0, 0),
        }
    }

    pub fn opposite(self) -> Face {
        match self {
            Face::Down => Face::Up,
            Face::Up => Face::Down,
            Face::North => Face::South,
            Face::South => Face::North,
            Face::West => Face::East,
            Face::East => Face::West,
        }
    }

    /// The face from `a` to `b` when they differ by exactly one unit along
    /// exactly one axis, and `None` otherwise
    pub fn between(a: PackedPos, b: PackedPos) -> Option<Face> {
        match (b.x() - a.x(), b.y() - a.y(), b.z() - a.z()) {
            (0, -1, 0) => Some(Face::Down),
            (0, 1, 0) => Some(Face::Up),
            (0, 0, -1) => Some(Face::North),
            (0, 0, 1) => Some(Face::South),
            (-1, 0, 0) => Some(Face::West),
            (1, 0, 0) => Some(Face::East),
            _ => None,
        }
    }
}
