//!
//! Test utils for building small schematics with simple placement rules
//!
use falsework_core::{DependencyGraph, Face, PackedPos, PosHashSet};

/// An in-memory dependency graph over an explicit position set, with a fixed
/// set of faces through which support is allowed.
///
/// `Face::ALL` models omnidirectional placement (every adjacency is mutual);
/// `[Face::Down]` models a gravity-like rule where a block is only supported
/// by the block beneath it.
pub struct GridSchematic {
    positions: PosHashSet,
    support_faces: Vec<Face>,
}

impl GridSchematic {
    pub fn new(positions: PosHashSet, support_faces: Vec<Face>) -> Self {
        Self { positions, support_faces }
    }
}

impl DependencyGraph for GridSchematic {
    fn contains(&self, pos: PackedPos) -> bool {
        self.positions.contains(&pos)
    }

    fn supports(&self, _pos: PackedPos, face: Face) -> bool {
        self.support_faces.contains(&face)
    }

    fn positions(&self) -> impl Iterator<Item = PackedPos> + '_ {
        self.positions.iter().copied()
    }
}

/// A struct with fluent API to streamline schematic building
#[derive(Default)]
pub struct SchematicBuilder {
    positions: PosHashSet,
}

impl SchematicBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(mut self, x: i32, y: i32, z: i32) -> Self {
        self.positions.insert(PackedPos::new(x, y, z));
        self
    }

    /// A vertical run of blocks from `y0` to `y1` inclusive
    pub fn pillar(mut self, x: i32, y0: i32, y1: i32, z: i32) -> Self {
        for y in y0..=y1 {
            self.positions.insert(PackedPos::new(x, y, z));
        }
        self
    }

    pub fn build(self, support_faces: Vec<Face>) -> GridSchematic {
        GridSchematic::new(self.positions, support_faces)
    }

    pub fn build_omnidirectional(self) -> GridSchematic {
        self.build(Face::ALL.to_vec())
    }

    pub fn build_bottom_supported(self) -> GridSchematic {
        self.build(vec![Face::Down])
    }
}
