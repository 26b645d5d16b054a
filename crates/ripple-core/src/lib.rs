//! ripple-core: Shared types and configuration for the ripple platform.
//!
//! This crate provides the foundational types used across all ripple
//! components:
//! - Topology node and edge types for the infrastructure graph
//! - Change records, approvals, and the change lifecycle enums
//! - Policy guardrail definitions
//! - Impact snapshot types produced by the analyzer
//! - Process-wide configuration

pub mod change;
pub mod config;
pub mod impact;
pub mod policy;
pub mod types;

pub use change::{Approval, ApprovalRole, ApprovalStatus, Change, ChangeAction, ChangeId, ChangeStatus, ChangeType, RiskLevel};
pub use impact::{AffectedEndpoint, CriticalPath, ImpactSnapshot, ImpactedNode, TraversalStrategy};
pub use policy::{Policy, PolicyAction, PolicyCondition, PolicyRuleType};
pub use types::{Criticality, Edge, EdgeKind, Environment, Node, NodeId, NodeKind};
