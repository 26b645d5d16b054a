//! Error types for the ripple-workflow crate.

use thiserror::Error;

use ripple_core::change::ChangeStatus;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transition forbidden: {from} -> {to}")]
    TransitionForbidden { from: ChangeStatus, to: ChangeStatus },

    #[error("Change blocked by policy: {policies:?}")]
    PolicyBlocked {
        policies: Vec<String>,
        reasons: Vec<String>,
    },

    #[error("Approval already decided")]
    ApprovalAlreadyDecided,

    #[error("Execution attempted outside the maintenance window without an override")]
    MaintenanceWindowViolation,

    #[error(transparent)]
    Impact(#[from] ripple_impact::ImpactError),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
