use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::error::GraphError;
use super::node::{Edge, EdgeKind, ResourceNode};

/// A shared, lock-guarded handle to a [`DependencyGraph`]. Reads take a
/// shared guard, writes take an exclusive one. The graph itself never
/// blocks a caller under a global lock beyond that.
pub type SharedGraph = Arc<tokio::sync::RwLock<DependencyGraph>>;

/// The dependency graph: nodes keyed by address, plus the directed edges
/// between them, a mapping from address to node, and a mapping from
/// address to its outgoing targets.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, ResourceNode>,
    /// address -> outgoing edges, in insertion order (duplicates by `to`
    /// are rejected in `add_edge`, so this also is the edge set).
    outgoing: HashMap<String, Vec<Edge>>,
    layer_cache: Mutex<Option<Vec<Vec<String>>>>,
}

// `Mutex` already gives us Sync; `Clone` can't copy a `Mutex` contents
// meaningfully here, so we provide a manual impl that resets the cache.
impl Clone for DependencyGraph {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            outgoing: self.outgoing.clone(),
            layer_cache: Mutex::new(None),
        }
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn invalidate_cache(&self) {
        *self.layer_cache.lock().unwrap() = None;
    }

    /// Idempotent, keyed by address. Returns the node now stored at that
    /// address: the existing one if there was a conflict, the new one
    /// otherwise.
    pub fn add_node(&mut self, node: ResourceNode) -> ResourceNode {
        if let Some(existing) = self.nodes.get(&node.address) {
            return existing.clone();
        }
        let address = node.address.clone();
        self.outgoing.entry(address.clone()).or_default();
        self.nodes.insert(address, node.clone());
        self.invalidate_cache();
        node
    }

    /// Requires both endpoints to already exist. No-ops (without error) if
    /// the edge already exists. Rejects self-loops.
    pub fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind) -> Result<(), GraphError> {
        if from == to {
            return Err(GraphError::SelfLoop(from.to_string()));
        }
        if !self.nodes.contains_key(from) {
            return Err(GraphError::NodeNotFound(from.to_string()));
        }
        if !self.nodes.contains_key(to) {
            return Err(GraphError::NodeNotFound(to.to_string()));
        }

        let already_present = self.outgoing[from].iter().any(|e| e.to == to);
        if already_present {
            debug!(from, to, "duplicate edge ignored");
            return Ok(());
        }

        self.outgoing
            .get_mut(from)
            .unwrap()
            .push(Edge {
                from: from.to_string(),
                to: to.to_string(),
                kind,
            });

        self.nodes
            .get_mut(from)
            .unwrap()
            .dependencies
            .push(to.to_string());
        self.nodes
            .get_mut(to)
            .unwrap()
            .dependents
            .push(from.to_string());

        self.invalidate_cache();
        Ok(())
    }

    pub fn get_node(&self, address: &str) -> Option<&ResourceNode> {
        self.nodes.get(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.nodes.contains_key(address)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Shallow, insertion-ordered list of `address`'s direct dependencies.
    pub fn dependencies_of(&self, address: &str) -> Result<&[String], GraphError> {
        self.nodes
            .get(address)
            .map(|n| n.dependencies.as_slice())
            .ok_or_else(|| GraphError::NodeNotFound(address.to_string()))
    }

    /// Shallow, insertion-ordered list of `address`'s direct dependents.
    pub fn dependents_of(&self, address: &str) -> Result<&[String], GraphError> {
        self.nodes
            .get(address)
            .map(|n| n.dependents.as_slice())
            .ok_or_else(|| GraphError::NodeNotFound(address.to_string()))
    }

    /// Kahn's algorithm with a deterministic, lexicographic tie-break: the
    /// ready set is a `BTreeSet`, so the smallest address by string order
    /// is always popped first. Identical graphs therefore always produce
    /// identical orderings.
    pub fn topological_sort(&self) -> Result<Vec<String>, GraphError> {
        let mut in_degree: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|(addr, node)| (addr.as_str(), node.dependencies.len()))
            .collect();

        let mut ready: BTreeSet<String> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(addr, _)| addr.to_string())
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(address) = ready.iter().next().cloned() {
            ready.remove(&address);
            order.push(address.clone());
            let dependents = self
                .nodes
                .get(&address)
                .map(|n| n.dependents.as_slice())
                .unwrap_or(&[]);
            for dependent in dependents {
                let degree = in_degree.get_mut(dependent.as_str()).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(dependent.clone());
                }
            }
        }

        if order.len() != self.nodes.len() {
            let remaining: Vec<String> = self
                .nodes
                .keys()
                .filter(|addr| !order.contains(addr))
                .cloned()
                .collect();
            return Err(GraphError::CycleDetected(remaining));
        }

        Ok(order)
    }

    /// DFS with white/gray/black coloring.
    pub fn has_cycle(&self) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color: HashMap<&str, Color> = self
            .nodes
            .keys()
            .map(|addr| (addr.as_str(), Color::White))
            .collect();

        fn visit<'a>(
            node: &'a str,
            outgoing: &'a HashMap<String, Vec<Edge>>,
            color: &mut HashMap<&'a str, Color>,
        ) -> bool {
            color.insert(node, Color::Gray);
            for edge in outgoing.get(node).into_iter().flatten() {
                match color.get(edge.to.as_str()) {
                    Some(Color::Gray) => return true,
                    Some(Color::White) | None => {
                        if visit(edge.to.as_str(), outgoing, color) {
                            return true;
                        }
                    }
                    Some(Color::Black) => {}
                }
            }
            color.insert(node, Color::Black);
            false
        }

        let addresses: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        for address in addresses {
            if color.get(address) == Some(&Color::White) {
                if visit(address, &self.outgoing, &mut color) {
                    return true;
                }
            }
        }
        false
    }

    /// Nodes grouped by topological depth: layer 0 has no dependencies,
    /// layer `i` depends only on layers `< i`. Lazily cached; invalidated
    /// on any mutation.
    pub fn layers(&self) -> Result<Vec<Vec<String>>, GraphError> {
        if let Some(cached) = self.layer_cache.lock().unwrap().clone() {
            return Ok(cached);
        }

        let mut remaining_deps: HashMap<&str, HashSet<&str>> = self
            .nodes
            .iter()
            .map(|(addr, node)| {
                (
                    addr.as_str(),
                    node.dependencies.iter().map(String::as_str).collect(),
                )
            })
            .collect();

        let mut layers: Vec<Vec<String>> = Vec::new();
        let mut placed: HashSet<&str> = HashSet::new();

        while placed.len() < self.nodes.len() {
            let mut layer: Vec<String> = remaining_deps
                .iter()
                .filter(|(addr, deps)| !placed.contains(*addr) && deps.is_empty())
                .map(|(addr, _)| addr.to_string())
                .collect();

            if layer.is_empty() {
                let remaining: Vec<String> = self
                    .nodes
                    .keys()
                    .filter(|addr| !placed.contains(addr.as_str()))
                    .cloned()
                    .collect();
                return Err(GraphError::CycleDetected(remaining));
            }

            layer.sort();
            for addr in &layer {
                placed.insert(self.nodes.get_key_value(addr).unwrap().0.as_str());
            }
            for deps in remaining_deps.values_mut() {
                for addr in &layer {
                    deps.remove(addr.as_str());
                }
            }
            layers.push(layer);
        }

        *self.layer_cache.lock().unwrap() = Some(layers.clone());
        Ok(layers)
    }

    /// Nodes with no dependencies and no dependents.
    pub fn orphans(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .nodes
            .values()
            .filter(|n| n.is_orphan())
            .map(|n| n.address.clone())
            .collect();
        out.sort();
        out
    }

    /// Topological order restricted to `subset`: computed as the full
    /// topological order filtered down to subset members, which preserves
    /// validity since a subsequence of a topological order remains one.
    pub fn creation_order(&self, subset: &[String]) -> Result<Vec<String>, GraphError> {
        self.assert_known(subset)?;
        let full = self.topological_sort()?;
        let members: HashSet<&str> = subset.iter().map(String::as_str).collect();
        Ok(full
            .into_iter()
            .filter(|addr| members.contains(addr.as_str()))
            .collect())
    }

    /// Reverse of `creation_order`, deepest-layer-first, safe for
    /// deleting a subset without violating dependents that remain.
    pub fn deletion_order(&self, subset: &[String]) -> Result<Vec<String>, GraphError> {
        let mut order = self.creation_order(subset)?;
        order.reverse();
        Ok(order)
    }

    /// `(ok, blockers)`: a blocker is a dependent of some subset member
    /// that is not itself part of the subset being deleted.
    pub fn validate_deletion(&self, subset: &[String]) -> (bool, Vec<String>) {
        let members: HashSet<&str> = subset.iter().map(String::as_str).collect();
        let mut blockers: BTreeSet<String> = BTreeSet::new();
        for address in subset {
            if let Some(node) = self.nodes.get(address) {
                for dependent in &node.dependents {
                    if !members.contains(dependent.as_str()) {
                        blockers.insert(dependent.clone());
                    }
                }
            }
        }
        (blockers.is_empty(), blockers.into_iter().collect())
    }

    fn assert_known(&self, subset: &[String]) -> Result<(), GraphError> {
        for address in subset {
            if !self.nodes.contains_key(address) {
                return Err(GraphError::UnknownAddress(address.clone()));
            }
        }
        Ok(())
    }

    /// Breadth-first reachability from `address` following dependencies
    /// (used by the planner to seed resource-level action dependencies).
    pub fn reachable_dependencies(&self, address: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        if let Some(node) = self.nodes.get(address) {
            for dep in &node.dependencies {
                queue.push_back(dep.clone());
            }
        }
        let mut out = Vec::new();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next.clone()) {
                out.push(next.clone());
                if let Some(node) = self.nodes.get(&next) {
                    for dep in &node.dependencies {
                        queue.push_back(dep.clone());
                    }
                }
            }
        }
        out
    }
}
