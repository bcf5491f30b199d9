use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::resource::CloudProvider;

/// The closed set of edge kinds the graph can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Explicit,
    Implicit,
    Data,
}

/// A directed edge between two node addresses. Self-loops are invalid by
/// construction: the graph rejects them in `add_edge`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

/// A node in the dependency graph. `address` is its unique key within the
/// owning [`super::DependencyGraph`]. `dependencies`/`dependents` are
/// maintained by the graph itself and always mirror each other across an
/// edge. Callers should not construct them by hand except to seed a
/// fresh, edge-free node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub address: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    pub provider: CloudProvider,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub level: usize,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub dependents: Vec<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl ResourceNode {
    pub fn new(
        address: impl Into<String>,
        node_type: impl Into<String>,
        name: impl Into<String>,
        provider: CloudProvider,
    ) -> Self {
        Self {
            address: address.into(),
            node_type: node_type.into(),
            name: name.into(),
            provider,
            module: None,
            level: 0,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn is_orphan(&self) -> bool {
        self.dependencies.is_empty() && self.dependents.is_empty()
    }
}
