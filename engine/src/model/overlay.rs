use crate::model::collapsed::{CollapsedGraph, ComponentId};
use falsework_core::{DependencyGraph, Face, PackedPos, PosHashSet, ScaffoldError, ScaffoldResult};
use log::debug;
use smallvec::SmallVec;

/// The state of a single position within the overlay.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Classification {
    /// Member of the original schematic; membership is fixed forever
    Real,
    /// Added by the planner; once added, permanent for the session
    Scaffolding,
    /// Not part of the graph; the only state eligible to become Scaffolding
    Air,
}

/// A mutable layer over the base dependency graph which admits incremental
/// activation of Air positions into Scaffolding nodes, keeping the collapsed
/// component graph in step with every insertion.
pub struct ScaffoldingOverlay<G> {
    graph: G,
    scaffolding: PosHashSet,
    collapsed: CollapsedGraph,
}

impl<G: DependencyGraph> ScaffoldingOverlay<G> {
    pub fn new(graph: G) -> Self {
        let collapsed = CollapsedGraph::from_dependency_graph(&graph);
        Self { graph, scaffolding: PosHashSet::new(), collapsed }
    }

    pub fn classify(&self, pos: PackedPos) -> Classification {
        if self.graph.contains(pos) {
            Classification::Real
        } else if self.scaffolding.contains(&pos) {
            Classification::Scaffolding
        } else {
            Classification::Air
        }
    }

    pub fn real(&self, pos: PackedPos) -> bool {
        self.classify(pos) == Classification::Real
    }

    pub fn scaffolding(&self, pos: PackedPos) -> bool {
        self.classify(pos) == Classification::Scaffolding
    }

    pub fn air(&self, pos: PackedPos) -> bool {
        self.classify(pos) == Classification::Air
    }

    /// Whether a block hypothetically placed at `pos` would receive a valid
    /// support edge from the neighbor through `face`, per the base dependency
    /// rule. Occupancy of the neighbor cell is deliberately not required:
    /// connector paths are validated while their interiors are still Air, with
    /// each position supported by the previous one once it is placed.
    /// Non-mutating and safe to call on positions not part of the graph.
    pub fn hypothetical_incoming_edge(&self, pos: PackedPos, face: Face) -> bool {
        pos.offset(face).is_some() && self.graph.supports(pos, face)
    }

    /// Transitions an Air position into a Scaffolding node, inserting it into
    /// the overlay graph with its support edges in both directions and
    /// propagating the change into the collapsed graph.
    ///
    /// Returns the id of the component containing `pos` afterwards. Calling
    /// this on a non-Air position, or on a position with no valid incoming
    /// edge, is a contract violation.
    pub fn enable(&mut self, pos: PackedPos) -> ScaffoldResult<ComponentId> {
        if !self.air(pos) {
            return Err(ScaffoldError::InternalInconsistency(format!(
                "cannot enable {pos}: classified {:?}, expected Air",
                self.classify(pos)
            )));
        }
        let mut supporters: SmallVec<[PackedPos; 6]> = SmallVec::new();
        let mut supportees: SmallVec<[PackedPos; 6]> = SmallVec::new();
        for face in Face::ALL {
            let Some(neighbor) = pos.offset(face) else { continue };
            if self.air(neighbor) {
                continue;
            }
            if self.graph.supports(pos, face) {
                supporters.push(neighbor);
            }
            if self.graph.supports(neighbor, face.opposite()) {
                supportees.push(neighbor);
            }
        }
        if supporters.is_empty() {
            return Err(ScaffoldError::InternalInconsistency(format!(
                "cannot enable {pos}: no existing neighbor provides a valid incoming edge"
            )));
        }
        self.scaffolding.insert(pos);
        let id = self.collapsed.insert_node(pos, &supporters, &supportees)?;
        debug!("enabled scaffolding at {pos} into {id}");
        Ok(id)
    }

    pub fn iter_real(&self) -> impl Iterator<Item = PackedPos> + '_ {
        self.graph.positions()
    }

    pub fn scaffolding_positions(&self) -> &PosHashSet {
        &self.scaffolding
    }

    pub fn collapsed(&self) -> &CollapsedGraph {
        &self.collapsed
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }
}
