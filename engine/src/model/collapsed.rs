use falsework_core::{DependencyGraph, Face, PackedPos, PosHashMap, PosHashSet, ScaffoldError, ScaffoldResult};
use std::collections::{HashSet, VecDeque};
use std::fmt::{Display, Formatter};

/// Identifier of a component in the collapsed graph. Assigned at creation,
/// monotonically increasing, never reused.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
pub struct ComponentId(u64);

impl ComponentId {
    fn as_index(self) -> usize {
        self.0 as usize
    }
}

impl Display for ComponentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// A maximal mutually-reachable set of overlay-graph nodes, or a singleton
/// when no cycle includes it. The live components always form a DAG.
#[derive(Debug)]
pub struct Component {
    id: ComponentId,
    positions: PosHashSet,
    incoming: HashSet<ComponentId>,
    outgoing: HashSet<ComponentId>,
}

impl Component {
    fn singleton(id: ComponentId, pos: PackedPos) -> Self {
        Self { id, positions: PosHashSet::from([pos]), incoming: HashSet::new(), outgoing: HashSet::new() }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn positions(&self) -> &PosHashSet {
        &self.positions
    }

    pub fn contains(&self, pos: PackedPos) -> bool {
        self.positions.contains(&pos)
    }

    /// Whether this component has no incoming edges. Edge sets may hold stale
    /// (dead) ids, but staleness never changes emptiness: a stale id still
    /// resolves to a live external neighbor.
    pub fn is_root(&self) -> bool {
        self.incoming.is_empty()
    }

    /// Raw incoming ids. May contain dead entries; resolve through
    /// [`CollapsedGraph::resolve_live`] before comparing identities.
    pub fn incoming_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.incoming.iter().copied()
    }
}

enum Entry {
    Live(Component),
    Dead { merged_into: ComponentId },
}

/// The DAG obtained by collapsing every strongly-connected subset of the
/// overlay graph into a single component, maintained incrementally as
/// scaffolding nodes are inserted.
///
/// Components are held in an arena indexed by id. A merge marks the merged
/// components dead with a redirect to the survivor; redirects always point
/// to a higher id, so redirect chains terminate.
pub struct CollapsedGraph {
    arena: Vec<Entry>,
    locations: PosHashMap<ComponentId>,
}

impl CollapsedGraph {
    /// Builds the initial collapsed graph over the Real positions of the base
    /// dependency graph, collapsing inherent support cycles
    pub fn from_dependency_graph<G: DependencyGraph>(graph: &G) -> Self {
        let nodes: Vec<PackedPos> = graph.positions().collect();
        let index_of: PosHashMap<usize> = nodes.iter().enumerate().map(|(i, &pos)| (pos, i)).collect();

        // Edge u -> v: v's placement is supported by u
        let mut successors = vec![Vec::new(); nodes.len()];
        for (v_idx, &v) in nodes.iter().enumerate() {
            for face in Face::ALL {
                let Some(u) = v.offset(face) else { continue };
                if graph.contains(u) && graph.supports(v, face) {
                    successors[index_of[&u]].push(v_idx);
                }
            }
        }

        let sccs = strongly_connected(&successors);
        let mut collapsed = Self { arena: Vec::with_capacity(sccs.len()), locations: PosHashMap::new() };
        let mut scc_of = vec![0usize; nodes.len()];
        for (scc_idx, scc) in sccs.iter().enumerate() {
            let id = ComponentId(scc_idx as u64);
            let positions: PosHashSet = scc.iter().map(|&i| nodes[i]).collect();
            for &pos in &positions {
                collapsed.locations.insert(pos, id);
            }
            for &i in scc {
                scc_of[i] = scc_idx;
            }
            collapsed.arena.push(Entry::Live(Component {
                id,
                positions,
                incoming: HashSet::new(),
                outgoing: HashSet::new(),
            }));
        }
        for (u_idx, succ) in successors.iter().enumerate() {
            for &v_idx in succ {
                let (cu, cv) = (scc_of[u_idx], scc_of[v_idx]);
                if cu != cv {
                    match &mut collapsed.arena[cv] {
                        Entry::Live(c) => c.incoming.insert(ComponentId(cu as u64)),
                        Entry::Dead { .. } => unreachable!("initial components are all live"),
                    };
                    match &mut collapsed.arena[cu] {
                        Entry::Live(c) => c.outgoing.insert(ComponentId(cv as u64)),
                        Entry::Dead { .. } => unreachable!("initial components are all live"),
                    };
                }
            }
        }
        collapsed
    }

    /// Follows the dead-redirect chain of `id` to its live fixed point.
    /// Idempotent; a live id resolves to itself.
    pub fn resolve_live(&self, id: ComponentId) -> ComponentId {
        let mut current = id;
        loop {
            match &self.arena[current.as_index()] {
                Entry::Live(_) => return current,
                Entry::Dead { merged_into } => current = *merged_into,
            }
        }
    }

    /// Resolve with path compression, for use on mutating entry points
    fn resolve_compress(&mut self, id: ComponentId) -> ComponentId {
        let live = self.resolve_live(id);
        let mut current = id;
        while current != live {
            match &mut self.arena[current.as_index()] {
                Entry::Dead { merged_into } => current = std::mem::replace(merged_into, live),
                Entry::Live(_) => unreachable!("chain below the live fixed point is all dead"),
            }
        }
        live
    }

    pub fn is_live(&self, id: ComponentId) -> bool {
        matches!(self.arena[id.as_index()], Entry::Live(_))
    }

    /// The component holding `id`. The id must be live; accessing a dead
    /// entry without resolving it first is a contract violation.
    pub fn get(&self, id: ComponentId) -> ScaffoldResult<&Component> {
        match &self.arena[id.as_index()] {
            Entry::Live(component) => Ok(component),
            Entry::Dead { .. } => {
                Err(ScaffoldError::InternalInconsistency(format!("component {id} is dead and was accessed as live")))
            }
        }
    }

    fn get_mut(&mut self, id: ComponentId) -> ScaffoldResult<&mut Component> {
        match &mut self.arena[id.as_index()] {
            Entry::Live(component) => Ok(component),
            Entry::Dead { .. } => {
                Err(ScaffoldError::InternalInconsistency(format!("component {id} is dead and was accessed as live")))
            }
        }
    }

    /// The live component containing `pos`, if `pos` is part of the graph
    pub fn component_of(&self, pos: PackedPos) -> Option<ComponentId> {
        self.locations.get(&pos).map(|&id| self.resolve_live(id))
    }

    /// The highest component id allocated so far
    pub fn last_component_id(&self) -> Option<ComponentId> {
        self.arena.len().checked_sub(1).map(|i| ComponentId(i as u64))
    }

    /// All ids allocated strictly after `mark` (all ids when `mark` is `None`),
    /// in creation order. Includes ids that have since died.
    pub fn ids_created_after(&self, mark: Option<ComponentId>) -> impl Iterator<Item = ComponentId> + '_ {
        let start = mark.map_or(0, |id| id.as_index() + 1);
        (start..self.arena.len()).map(|i| ComponentId(i as u64))
    }

    pub fn live_components(&self) -> impl Iterator<Item = &Component> + '_ {
        self.arena.iter().filter_map(|entry| match entry {
            Entry::Live(component) => Some(component),
            Entry::Dead { .. } => None,
        })
    }

    /// Live components reachable from `id` in the collapsed DAG, inclusive
    pub fn descendants(&self, id: ComponentId) -> ScaffoldResult<HashSet<ComponentId>> {
        self.closure(&[id], |c| &c.outgoing)
    }

    /// Inserts one new overlay node with its support edges: `supporters` hold
    /// the node, `supportees` are held by it. The node receives a fresh
    /// singleton component; when the new edges close a cycle across existing
    /// components, every component on such a cycle is merged into a fresh
    /// surviving component and the merged ones are redirected to it.
    ///
    /// Returns the id of the component containing `pos` afterwards.
    pub(crate) fn insert_node(
        &mut self,
        pos: PackedPos,
        supporters: &[PackedPos],
        supportees: &[PackedPos],
    ) -> ScaffoldResult<ComponentId> {
        if self.locations.contains_key(&pos) {
            return Err(ScaffoldError::InternalInconsistency(format!("position {pos} is already part of the graph")));
        }
        let new_id = ComponentId(self.arena.len() as u64);
        self.arena.push(Entry::Live(Component::singleton(new_id, pos)));
        self.locations.insert(pos, new_id);

        let sources = self.components_of(supporters)?;
        let targets = self.components_of(supportees)?;
        for &source in &sources {
            self.get_mut(new_id)?.incoming.insert(source);
            self.get_mut(source)?.outgoing.insert(new_id);
        }
        for &target in &targets {
            self.get_mut(new_id)?.outgoing.insert(target);
            self.get_mut(target)?.incoming.insert(new_id);
        }

        // A cycle through the new node exists iff some component is both
        // reachable from a supportee and an ancestor of a supporter
        let reaches_back = self.closure(&sources, |c| &c.incoming)?;
        let mut cycle: HashSet<ComponentId> =
            self.closure(&targets, |c| &c.outgoing)?.intersection(&reaches_back).copied().collect();
        if cycle.is_empty() {
            return Ok(new_id);
        }
        cycle.insert(new_id);
        self.merge(cycle)
    }

    fn components_of(&mut self, positions: &[PackedPos]) -> ScaffoldResult<Vec<ComponentId>> {
        let mut ids = Vec::with_capacity(positions.len());
        for &pos in positions {
            let raw = *self.locations.get(&pos).ok_or_else(|| {
                ScaffoldError::InternalInconsistency(format!("edge endpoint {pos} is not part of the graph"))
            })?;
            let id = self.resolve_compress(raw);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Live components reachable from `start` (inclusive) along `edges`
    fn closure(
        &self,
        start: &[ComponentId],
        edges: impl Fn(&Component) -> &HashSet<ComponentId>,
    ) -> ScaffoldResult<HashSet<ComponentId>> {
        let mut seen: HashSet<ComponentId> = start.iter().copied().collect();
        let mut queue: VecDeque<ComponentId> = seen.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            for raw in edges(self.get(id)?).iter() {
                let next = self.resolve_live(*raw);
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        Ok(seen)
    }

    /// Collapses `members` into one fresh surviving component. All members
    /// die with a redirect to the survivor; the survivor's edge sets are the
    /// union of the members' sets restricted to components outside the set.
    fn merge(&mut self, members: HashSet<ComponentId>) -> ScaffoldResult<ComponentId> {
        debug_assert!(members.len() > 1);
        let survivor = ComponentId(self.arena.len() as u64);
        let mut positions = PosHashSet::new();
        let mut incoming = HashSet::new();
        let mut outgoing = HashSet::new();
        for &member in &members {
            let component = self.get(member)?;
            for raw in component.incoming.iter() {
                let id = self.resolve_live(*raw);
                if !members.contains(&id) {
                    incoming.insert(id);
                }
            }
            for raw in component.outgoing.iter() {
                let id = self.resolve_live(*raw);
                if !members.contains(&id) {
                    outgoing.insert(id);
                }
            }
            positions.extend(component.positions.iter().copied());
        }
        for &pos in &positions {
            self.locations.insert(pos, survivor);
        }
        for &member in &members {
            self.arena[member.as_index()] = Entry::Dead { merged_into: survivor };
        }
        log::debug!("merged {} components into {survivor} ({} positions)", members.len(), positions.len());
        self.arena.push(Entry::Live(Component { id: survivor, positions, incoming, outgoing }));
        Ok(survivor)
    }
}

/// Iterative Tarjan over an integer-indexed successor list; returns the
/// strongly connected components
fn strongly_connected(successors: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;
    let n = successors.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut next_index = 0usize;
    let mut sccs = Vec::new();
    // (node, next successor offset) frames replace recursion
    let mut frames: Vec<(usize, usize)> = Vec::new();

    for start in 0..n {
        if index[start] != UNVISITED {
            continue;
        }
        frames.push((start, 0));
        while let Some(frame) = frames.last_mut() {
            let (v, child) = *frame;
            if child == 0 {
                index[v] = next_index;
                lowlink[v] = next_index;
                next_index += 1;
                stack.push(v);
                on_stack[v] = true;
            }
            if let Some(&w) = successors[v].get(child) {
                frame.1 += 1;
                if index[w] == UNVISITED {
                    frames.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }
            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if lowlink[v] == index[v] {
                let mut scc = Vec::new();
                loop {
                    let w = stack.pop().unwrap();
                    on_stack[w] = false;
                    scc.push(w);
                    if w == v {
                        break;
                    }
                }
                sccs.push(scc);
            }
        }
    }
    sccs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::SchematicBuilder;
    use falsework_core::PackedPos;
    use itertools::Itertools;

    fn pos(x: i32, y: i32, z: i32) -> PackedPos {
        PackedPos::new(x, y, z)
    }

    #[test]
    fn test_initial_cycle_collapse() {
        // Three mutually supporting blocks in a row collapse to one component
        let schematic = SchematicBuilder::new().block(0, 0, 0).block(1, 0, 0).block(2, 0, 0).build_omnidirectional();
        let collapsed = CollapsedGraph::from_dependency_graph(&schematic);
        assert_eq!(collapsed.live_components().count(), 1);
        let root = collapsed.live_components().exactly_one().ok().unwrap();
        assert_eq!(root.positions().len(), 3);
        assert!(root.is_root());
    }

    #[test]
    fn test_initial_acyclic_chain() {
        // Bottom-only support yields a chain of singleton components
        let schematic = SchematicBuilder::new().block(0, 0, 0).block(0, 1, 0).block(0, 2, 0).build_bottom_supported();
        let collapsed = CollapsedGraph::from_dependency_graph(&schematic);
        assert_eq!(collapsed.live_components().count(), 3);
        assert_eq!(collapsed.live_components().filter(|c| c.is_root()).count(), 1);
        let root = collapsed.live_components().find(|c| c.is_root()).unwrap();
        assert!(root.contains(pos(0, 0, 0)));
    }

    #[test]
    fn test_insert_without_merge() {
        let schematic = SchematicBuilder::new().block(0, 0, 0).block(0, 2, 0).build_bottom_supported();
        let mut collapsed = CollapsedGraph::from_dependency_graph(&schematic);
        assert_eq!(collapsed.live_components().count(), 2);
        let below = collapsed.component_of(pos(0, 0, 0)).unwrap();
        let above = collapsed.component_of(pos(0, 2, 0)).unwrap();

        // The gap cell is supported by the lower block and supports the upper one
        let id = collapsed.insert_node(pos(0, 1, 0), &[pos(0, 0, 0)], &[pos(0, 2, 0)]).unwrap();
        assert!(collapsed.is_live(id));
        assert_eq!(collapsed.component_of(pos(0, 1, 0)), Some(id));
        assert!(!collapsed.get(id).unwrap().is_root());
        assert!(collapsed.get(below).unwrap().is_root());
        assert!(!collapsed.get(above).unwrap().is_root());
        assert_eq!(collapsed.live_components().filter(|c| c.is_root()).count(), 1);
    }

    #[test]
    fn test_insert_closing_cycle_merges() {
        let schematic = SchematicBuilder::new().block(0, 0, 0).block(0, 2, 0).build_omnidirectional();
        let mut collapsed = CollapsedGraph::from_dependency_graph(&schematic);
        let below = collapsed.component_of(pos(0, 0, 0)).unwrap();
        let above = collapsed.component_of(pos(0, 2, 0)).unwrap();
        assert_ne!(below, above);

        // Omnidirectional support makes every edge mutual, so the connector
        // merges everything into one fresh component
        let neighbors = [pos(0, 0, 0), pos(0, 2, 0)];
        let survivor = collapsed.insert_node(pos(0, 1, 0), &neighbors, &neighbors).unwrap();
        assert!(survivor > above.max(below));
        assert!(!collapsed.is_live(below));
        assert!(!collapsed.is_live(above));
        assert_eq!(collapsed.resolve_live(below), survivor);
        assert_eq!(collapsed.resolve_live(above), survivor);
        assert_eq!(collapsed.resolve_live(survivor), survivor);
        let component = collapsed.get(survivor).unwrap();
        assert_eq!(component.positions().len(), 3);
        assert!(component.is_root());
        assert_eq!(collapsed.live_components().count(), 1);
    }

    #[test]
    fn test_merge_restricts_incoming_to_externals() {
        // A bottom-supported pillar under an omnidirectional pair: the pair
        // merges, and its incoming must keep only the external pillar edge
        let schematic = SchematicBuilder::new().block(0, 0, 0).block(0, 1, 0).build_bottom_supported();
        let mut collapsed = CollapsedGraph::from_dependency_graph(&schematic);
        let base = collapsed.component_of(pos(0, 0, 0)).unwrap();
        let top = collapsed.component_of(pos(0, 1, 0)).unwrap();

        // New node alongside the top block, mutually supporting with it and
        // also supported by nothing else
        let survivor = collapsed.insert_node(pos(1, 1, 0), &[pos(0, 1, 0)], &[pos(0, 1, 0)]).unwrap();
        assert!(!collapsed.is_live(top));
        let component = collapsed.get(survivor).unwrap();
        assert_eq!(component.positions().len(), 2);
        let incoming = component.incoming_ids().map(|id| collapsed.resolve_live(id)).collect::<HashSet<_>>();
        assert_eq!(incoming, HashSet::from([base]));
    }

    #[test]
    fn test_dead_access_is_inconsistency() {
        let schematic = SchematicBuilder::new().block(0, 0, 0).block(0, 2, 0).build_omnidirectional();
        let mut collapsed = CollapsedGraph::from_dependency_graph(&schematic);
        let below = collapsed.component_of(pos(0, 0, 0)).unwrap();
        let neighbors = [pos(0, 0, 0), pos(0, 2, 0)];
        collapsed.insert_node(pos(0, 1, 0), &neighbors, &neighbors).unwrap();
        assert!(matches!(collapsed.get(below), Err(ScaffoldError::InternalInconsistency(_))));
    }

    #[test]
    fn test_duplicate_insert_is_inconsistency() {
        let schematic = SchematicBuilder::new().block(0, 0, 0).build_bottom_supported();
        let mut collapsed = CollapsedGraph::from_dependency_graph(&schematic);
        let result = collapsed.insert_node(pos(0, 0, 0), &[], &[]);
        assert!(matches!(result, Err(ScaffoldError::InternalInconsistency(_))));
    }
}
