pub mod relationship;
pub mod resource;

pub use relationship::{Relationship, RelationshipKind};
pub use resource::{
    CloudProvider, Difference, DriftKind, DriftObservation, Resource, ResourceRef, Severity,
};
