use crate::model::collapsed::Component;
use crate::model::overlay::ScaffoldingOverlay;
use falsework_core::{DependencyGraph, Face, PackedPos, PosHashMap};
use log::trace;
use std::collections::VecDeque;

/// Proposes connector paths for rootless components.
///
/// A returned path is an ordered sequence of at least two positions: the
/// first is an existing node outside `root`'s component, the last is a member
/// of `root`, every interior position is Air, and each consecutive position
/// is face-adjacent to and supportable by its predecessor. The orchestrator
/// re-validates every proposal, so implementations are not trusted.
///
/// `None` means no feasible connector was found for this root in the current
/// graph state. That is normal control flow, not an error.
pub trait ScaffoldingStrategy<G: DependencyGraph> {
    fn scaffold_to(&mut self, root: &Component, overlay: &ScaffoldingOverlay<G>) -> Option<Vec<PackedPos>>;
}

/// Adapter turning a closure into a strategy
pub struct StrategyFn<F>(pub F);

impl<G: DependencyGraph, F> ScaffoldingStrategy<G> for StrategyFn<F>
where
    F: FnMut(&Component, &ScaffoldingOverlay<G>) -> Option<Vec<PackedPos>>,
{
    fn scaffold_to(&mut self, root: &Component, overlay: &ScaffoldingOverlay<G>) -> Option<Vec<PackedPos>> {
        (self.0)(root, overlay)
    }
}

/// Reference strategy: a bounded multi-source breadth-first search.
///
/// Seeded from every existing node outside `root` and its descendants
/// (connecting a root to its own descendant is disallowed), it expands
/// through Air cells along valid hypothetical support edges and stops at the
/// first member of `root`, yielding a shortest valid connector.
pub struct BreadthFirstStrategy {
    max_expansions: usize,
}

impl BreadthFirstStrategy {
    pub fn new(max_expansions: usize) -> Self {
        Self { max_expansions }
    }
}

impl Default for BreadthFirstStrategy {
    fn default() -> Self {
        Self::new(1 << 16)
    }
}

impl<G: DependencyGraph> ScaffoldingStrategy<G> for BreadthFirstStrategy {
    fn scaffold_to(&mut self, root: &Component, overlay: &ScaffoldingOverlay<G>) -> Option<Vec<PackedPos>> {
        let collapsed = overlay.collapsed();
        let excluded = collapsed.descendants(root.id()).ok()?;

        // parent map doubles as the visited set; sources carry no parent
        let mut parents: PosHashMap<Option<PackedPos>> = PosHashMap::new();
        let mut queue: VecDeque<PackedPos> = VecDeque::new();
        for pos in overlay.iter_real().chain(overlay.scaffolding_positions().iter().copied()) {
            if collapsed.component_of(pos).is_some_and(|id| !excluded.contains(&id)) {
                parents.insert(pos, None);
                queue.push_back(pos);
            }
        }

        let mut expansions = 0usize;
        while let Some(current) = queue.pop_front() {
            expansions += 1;
            if expansions > self.max_expansions {
                trace!("search for {} gave up after {expansions} expansions", root.id());
                return None;
            }
            for face in Face::ALL {
                let Some(next) = current.offset(face) else { continue };
                // `next` must be supportable by `current` once placed in order
                if !overlay.hypothetical_incoming_edge(next, face.opposite()) {
                    continue;
                }
                if root.contains(next) {
                    let mut path = vec![next];
                    let mut back = Some(current);
                    while let Some(pos) = back {
                        path.push(pos);
                        back = parents[&pos];
                    }
                    path.reverse();
                    trace!("found connector of {} positions for {} after {expansions} expansions", path.len(), root.id());
                    return Some(path);
                }
                if overlay.air(next) && !parents.contains_key(&next) {
                    parents.insert(next, Some(current));
                    queue.push_back(next);
                }
            }
        }
        trace!("search space exhausted for {} after {expansions} expansions", root.id());
        None
    }
}
