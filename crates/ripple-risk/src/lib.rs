//! ripple-risk: risk scoring and policy guardrails.
//!
//! The risk engine is a pure function of (change record, impact snapshot,
//! incident history, clock): it combines weighted factors into a 0–100
//! score and a qualitative level. The policy engine evaluates configured
//! guardrails against a proposed change and reduces them to a single
//! verdict; the conflict detector reports guardrails that contradict each
//! other.

pub mod conflicts;
pub mod engine;
pub mod policy;

pub use conflicts::{detect_conflicts, ConflictType, PolicyConflict};
pub use engine::{RiskEngine, RiskFactor, RiskResult};
pub use policy::{
    evaluate_policies, overall_verdict, PolicyContext, PolicyEvaluation, PolicyStore, PolicyVerdict,
};
