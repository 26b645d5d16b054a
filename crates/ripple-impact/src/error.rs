//! Error types for the ripple-impact crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImpactError {
    #[error("No analyzable targets: the change has an empty or fully unresolvable target set")]
    EmptyTargets,

    #[error("Analysis canceled: the change was edited while analysis was in flight")]
    Canceled,
}

pub type Result<T> = std::result::Result<T, ImpactError>;
