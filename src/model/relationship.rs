use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::resource::ResourceRef;

/// The closed set of relationship kinds between two resources. Each
/// variant names a directed relationship; `inverse()` gives the implied
/// relationship in the opposite direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    DependsOn,
    DependedOnBy,
    Contains,
    ContainedBy,
    NetworkPeer,
    SecuresAccessTo,
    SecuredBy,
    Manages,
    ManagedBy,
}

impl RelationshipKind {
    pub fn inverse(self) -> Self {
        match self {
            RelationshipKind::DependsOn => RelationshipKind::DependedOnBy,
            RelationshipKind::DependedOnBy => RelationshipKind::DependsOn,
            RelationshipKind::Contains => RelationshipKind::ContainedBy,
            RelationshipKind::ContainedBy => RelationshipKind::Contains,
            RelationshipKind::NetworkPeer => RelationshipKind::NetworkPeer,
            RelationshipKind::SecuresAccessTo => RelationshipKind::SecuredBy,
            RelationshipKind::SecuredBy => RelationshipKind::SecuresAccessTo,
            RelationshipKind::Manages => RelationshipKind::ManagedBy,
            RelationshipKind::ManagedBy => RelationshipKind::Manages,
        }
    }
}

/// A derived relationship between two resources, as produced by the
/// relationship mapper or supplied directly by a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: ResourceRef,
    pub target_id: ResourceRef,
    pub kind: RelationshipKind,
    #[serde(default)]
    pub bidirectional: bool,
    /// Confidence/closeness of the relationship in `[0.0, 1.0]`.
    pub strength: f64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_round_trips() {
        assert_eq!(
            RelationshipKind::DependsOn.inverse().inverse(),
            RelationshipKind::DependsOn
        );
        assert_eq!(RelationshipKind::NetworkPeer.inverse(), RelationshipKind::NetworkPeer);
    }
}
