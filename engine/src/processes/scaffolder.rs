use crate::model::collapsed::{CollapsedGraph, Component, ComponentId};
use crate::model::overlay::{Classification, ScaffoldingOverlay};
use crate::processes::strategy::ScaffoldingStrategy;
use falsework_core::{DependencyGraph, Face, PackedPos, PosHashSet, ScaffoldError, ScaffoldResult};
use indexmap::IndexSet;
use log::debug;

/// Drives root elimination to convergence: repeatedly asks the strategy for a
/// connector path to some rootless component, validates and applies it, and
/// maintains the root set incrementally until a single root remains.
pub struct Scaffolder<G, S> {
    overlay: ScaffoldingOverlay<G>,
    strategy: S,
    // insertion-ordered so each pass visits roots in a stable order
    roots: IndexSet<ComponentId>,
}

impl<G: DependencyGraph, S: ScaffoldingStrategy<G>> Scaffolder<G, S> {
    /// Runs the full planning session over `graph`, producing the terminal
    /// output once every position is connected to a single root.
    pub fn run(graph: G, strategy: S) -> ScaffoldResult<Output<G>> {
        let overlay = ScaffoldingOverlay::new(graph);
        let roots = calc_roots(overlay.collapsed());
        if roots.is_empty() {
            return Err(ScaffoldError::InternalInconsistency("schematic has no positions".into()));
        }
        let mut scaffolder = Self { overlay, strategy, roots };
        while scaffolder.roots.len() > 1 {
            scaffolder.step()?;
        }
        debug!("converged with {} scaffolding positions", scaffolder.overlay.scaffolding_positions().len());
        Ok(Output { overlay: scaffolder.overlay, roots: scaffolder.roots })
    }

    /// One pass over the current roots in stable order; the first root that
    /// yields a usable path wins and the pass ends after applying it. A full
    /// pass with no usable path from any root is terminal.
    fn step(&mut self) -> ScaffoldResult<()> {
        debug_assert!(self.roots.len() > 1);
        let candidates: Vec<ComponentId> = self.roots.iter().copied().collect();
        for root_id in candidates {
            let root = self.overlay.collapsed().get(root_id)?;
            if !root.is_root() {
                return Err(ScaffoldError::InternalInconsistency(format!("tracked root {root_id} has incoming edges")));
            }
            let Some(path) = self.strategy.scaffold_to(root, &self.overlay) else { continue };
            self.apply(root_id, &path)?;
            return Ok(());
        }
        Err(ScaffoldError::Unconnectable)
    }

    /// Enforces the path contract (§ strategy docs) before any mutation.
    /// Violations are contract breaches by the strategy, never recoverable.
    fn validate(&self, root_id: ComponentId, path: &[PackedPos]) -> ScaffoldResult<()> {
        let inconsistency = |msg: String| Err(ScaffoldError::InternalInconsistency(msg));
        if path.len() < 2 {
            return inconsistency(format!("connector path has {} positions, need at least 2", path.len()));
        }
        let (first, last) = (path[0], path[path.len() - 1]);
        let collapsed = self.overlay.collapsed();
        let Some(start_component) = collapsed.component_of(first) else {
            return inconsistency(format!("path start {first} is not part of the graph"));
        };
        let Some(end_component) = collapsed.component_of(last) else {
            return inconsistency(format!("path end {last} is not part of the graph"));
        };
        if start_component == end_component {
            return inconsistency(format!("path start and end are both in {end_component}"));
        }
        if end_component != collapsed.resolve_live(root_id) {
            return inconsistency(format!("path ends in {end_component}, expected root {root_id}"));
        }
        if !collapsed.get(end_component)?.is_root() {
            return inconsistency(format!("path target {end_component} already has incoming edges"));
        }
        for &interior in &path[1..path.len() - 1] {
            if !self.overlay.air(interior) {
                return inconsistency(format!("path interior {interior} is already classified"));
            }
        }
        for pair in path.windows(2) {
            let Some(face) = Face::between(pair[1], pair[0]) else {
                return inconsistency(format!("path positions {} and {} are not face-adjacent", pair[0], pair[1]));
            };
            if !self.overlay.hypothetical_incoming_edge(pair[1], face) {
                return inconsistency(format!("path position {} cannot be supported by {}", pair[1], pair[0]));
            }
        }
        Ok(())
    }

    /// Applies a validated path by enabling its interior positions in order,
    /// then updates the root set incrementally: components created by this
    /// edit are tracked when they are live with no incoming edges, while
    /// tracked roots that died or gained incoming edges are dropped.
    fn apply(&mut self, root_id: ComponentId, path: &[PackedPos]) -> ScaffoldResult<()> {
        self.validate(root_id, path)?;
        debug!("connecting root {root_id} through {} interior positions", path.len() - 2);
        let mark = self.overlay.collapsed().last_component_id();
        for &pos in &path[1..path.len() - 1] {
            self.overlay.enable(pos)?;
        }

        let collapsed = self.overlay.collapsed();
        for id in collapsed.ids_created_after(mark) {
            if collapsed.is_live(id) && collapsed.get(id)?.is_root() {
                self.roots.insert(id);
            }
        }
        // A tracked root that died was merged away and its survivor, being a
        // fresh id, was covered by the scan above; one that gained incoming
        // edges is connected now. Either way it stops being a root.
        self.roots.retain(|&id| collapsed.is_live(id) && collapsed.get(id).is_ok_and(|c| c.is_root()));

        #[cfg(debug_assertions)]
        self.check_root_set()?;
        Ok(())
    }

    /// Debug-grade self-check: the incrementally maintained root set must
    /// equal a full rescan of all live components with empty incoming sets
    #[cfg(debug_assertions)]
    fn check_root_set(&self) -> ScaffoldResult<()> {
        let rescan = calc_roots(self.overlay.collapsed());
        let tracked: std::collections::HashSet<ComponentId> = self.roots.iter().copied().collect();
        let rescanned: std::collections::HashSet<ComponentId> = rescan.iter().copied().collect();
        if tracked != rescanned {
            return Err(ScaffoldError::InternalInconsistency(format!(
                "incremental root set {tracked:?} diverged from rescan {rescanned:?}"
            )));
        }
        Ok(())
    }
}

/// All live components with empty incoming sets. The collapsed graph is a
/// DAG, so this is exactly the root set.
fn calc_roots(collapsed: &CollapsedGraph) -> IndexSet<ComponentId> {
    collapsed.live_components().filter(|c| c.is_root()).map(|c| c.id()).collect()
}

/// Read-only terminal snapshot of a converged planning session.
///
/// The plan is frozen once computed: this view exposes only immutable
/// accessors, making further mutation unrepresentable rather than merely
/// rejected at runtime.
pub struct Output<G> {
    overlay: ScaffoldingOverlay<G>,
    roots: IndexSet<ComponentId>,
}

impl<G: DependencyGraph> Output<G> {
    /// The unique root component everything is reachable from
    pub fn root(&self) -> ScaffoldResult<&Component> {
        let Some(&root_id) = self.roots.first().filter(|_| self.roots.len() == 1) else {
            return Err(ScaffoldError::InternalInconsistency(format!("expected exactly one root, have {}", self.roots.len())));
        };
        let root = self.overlay.collapsed().get(root_id)?;
        if !root.is_root() {
            return Err(ScaffoldError::InternalInconsistency(format!("terminal root {root_id} has incoming edges")));
        }
        Ok(root)
    }

    pub fn classify(&self, pos: PackedPos) -> Classification {
        self.overlay.classify(pos)
    }

    pub fn real(&self, pos: PackedPos) -> bool {
        self.overlay.real(pos)
    }

    pub fn scaffolding(&self, pos: PackedPos) -> bool {
        self.overlay.scaffolding(pos)
    }

    pub fn air(&self, pos: PackedPos) -> bool {
        self.overlay.air(pos)
    }

    pub fn iter_real(&self) -> impl Iterator<Item = PackedPos> + '_ {
        self.overlay.iter_real()
    }

    pub fn scaffolding_positions(&self) -> &PosHashSet {
        self.overlay.scaffolding_positions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processes::strategy::{BreadthFirstStrategy, StrategyFn};
    use crate::testutils::SchematicBuilder;

    fn pos(x: i32, y: i32, z: i32) -> PackedPos {
        PackedPos::new(x, y, z)
    }

    #[test]
    fn test_two_islands_one_gap_cell() {
        // A grounded block and a floating block separated by one Air cell
        let schematic = SchematicBuilder::new().block(0, 0, 0).block(0, 2, 0).build_bottom_supported();
        let output = Scaffolder::run(schematic, BreadthFirstStrategy::default()).unwrap();

        assert_eq!(output.scaffolding_positions(), &PosHashSet::from([pos(0, 1, 0)]));
        assert_eq!(output.iter_real().collect::<PosHashSet>(), PosHashSet::from([pos(0, 0, 0), pos(0, 2, 0)]));
        assert!(output.scaffolding(pos(0, 1, 0)));
        assert!(output.real(pos(0, 2, 0)));
        assert!(output.air(pos(1, 0, 0)));
        let root = output.root().unwrap();
        assert!(root.contains(pos(0, 0, 0)));
    }

    #[test]
    fn test_unconnectable_islands() {
        // Two single-block islands at the same height: under bottom-only
        // support no chain can bridge sideways, in any direction
        let schematic = SchematicBuilder::new().block(0, 0, 0).block(5, 0, 5).build_bottom_supported();
        let result = Scaffolder::run(schematic, BreadthFirstStrategy::default());
        assert_eq!(result.err(), Some(ScaffoldError::Unconnectable));
    }

    #[test]
    fn test_already_converged_needs_no_strategy() {
        let schematic = SchematicBuilder::new().pillar(0, 0, 3, 0).build_bottom_supported();
        let refuse = |_: &Component, _: &ScaffoldingOverlay<_>| -> Option<Vec<PackedPos>> {
            panic!("strategy must not be consulted when a single root remains")
        };
        let output = Scaffolder::run(schematic, StrategyFn(refuse)).unwrap();
        assert!(output.root().unwrap().contains(pos(0, 0, 0)));
        assert!(output.scaffolding_positions().is_empty());
    }

    #[test]
    fn test_rejects_non_adjacent_path() {
        let schematic = SchematicBuilder::new().block(0, 0, 0).block(0, 3, 0).build_bottom_supported();
        let jump = |root: &Component, overlay: &ScaffoldingOverlay<_>| {
            let start = overlay.iter_real().find(|&p| !root.contains(p)).unwrap();
            let end = overlay.iter_real().find(|&p| root.contains(p)).unwrap();
            Some(vec![start, end])
        };
        let result = Scaffolder::run(schematic, StrategyFn(jump));
        assert!(matches!(result.err(), Some(ScaffoldError::InternalInconsistency(_))));
    }

    #[test]
    fn test_rejects_classified_interior() {
        let schematic = SchematicBuilder::new().pillar(0, 0, 1, 0).block(0, 3, 0).build_bottom_supported();
        let through_real = |_: &Component, _: &ScaffoldingOverlay<_>| {
            Some(vec![pos(0, 0, 0), pos(0, 1, 0), pos(0, 2, 0), pos(0, 3, 0)])
        };
        let result = Scaffolder::run(schematic, StrategyFn(through_real));
        assert!(matches!(result.err(), Some(ScaffoldError::InternalInconsistency(_))));
    }

    #[test]
    fn test_rejects_target_with_incoming_edges() {
        // The pillar 3..=5 is internally chained, so only its bottom block is
        // rootless; (0,4,0) lives in a component already supported by (0,3,0)
        let schematic = SchematicBuilder::new().block(0, 0, 0).pillar(0, 3, 5, 0).build_bottom_supported();
        let overlay = ScaffoldingOverlay::new(schematic);
        let roots = calc_roots(overlay.collapsed());
        let supported = overlay.collapsed().component_of(pos(0, 4, 0)).unwrap();
        let scaffolder = Scaffolder { overlay, strategy: BreadthFirstStrategy::default(), roots };
        let result = scaffolder.validate(supported, &[pos(0, 0, 0), pos(0, 4, 0)]);
        assert!(matches!(result, Err(ScaffoldError::InternalInconsistency(msg)) if msg.contains("incoming")));
    }

    #[test]
    fn test_merge_collapses_roots_omnidirectionally() {
        // With omnidirectional support every adjacency is mutual, so applying
        // the connector merges both islands and the gap cell into one component
        let schematic = SchematicBuilder::new().block(0, 0, 0).block(0, 2, 0).build_omnidirectional();
        let output = Scaffolder::run(schematic, BreadthFirstStrategy::default()).unwrap();
        let root = output.root().unwrap();
        assert_eq!(root.positions().len(), 3);
        assert!(root.contains(pos(0, 1, 0)));
        assert_eq!(output.scaffolding_positions().len(), 1);
    }
}
