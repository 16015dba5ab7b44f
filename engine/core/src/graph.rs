use crate::pos::{Face, PackedPos};

/// The base support/dependency graph over the target schematic, provided
/// fully built by the host.
///
/// A directed edge u→v (v's placement is supported by u) exists iff both
/// positions are members, they are face-adjacent, and the placement rule
/// admits supporting v through the face from v to u. The trait only exposes
/// membership and the rule; edges are derived by the overlay.
pub trait DependencyGraph {
    /// Membership in the schematic (the Real position set)
    fn contains(&self, pos: PackedPos) -> bool;

    /// Placement rule only: may a block at `pos` be supported by a neighbor
    /// through `face`? Occupancy of the neighbor cell is ignored; callers
    /// combine this with their own node bookkeeping.
    fn supports(&self, pos: PackedPos, face: Face) -> bool;

    /// All schematic positions
    fn positions(&self) -> impl Iterator<Item = PackedPos> + '_;
}
