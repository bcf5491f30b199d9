pub mod error;
pub mod graph;
pub mod node;

pub use error::GraphError;
pub use graph::{DependencyGraph, SharedGraph};
pub use node::{Edge, EdgeKind, ResourceNode};
