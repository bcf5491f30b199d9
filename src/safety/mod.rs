pub mod engine;
pub mod impact;
pub mod policy;
pub mod thresholds;

pub use engine::{ApprovalRequirement, PolicyRegistry, SafetyEngine, ValidationReport};
pub use impact::Impact;
pub use policy::{Condition, Enforcement, Policy, Rule, RuleAction, ValidationOptions, Violation};
pub use thresholds::{BlockedTimeWindow, ThresholdBreach, Thresholds};
