pub mod errors;
pub mod graph;
pub mod pos;

pub use errors::{ScaffoldError, ScaffoldResult};
pub use graph::DependencyGraph;
pub use pos::{Face, PackedPos};

use std::collections::{HashMap, HashSet};

pub type PosHashMap<V> = HashMap<PackedPos, V>;
pub type PosHashSet = HashSet<PackedPos>;
