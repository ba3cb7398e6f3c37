use thiserror::Error;

use crate::catalog::{Dimension, Level};

/// A state transition the query state refuses to apply.
///
/// The state is left exactly as it was before the attempt.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("cannot set all dimensions to ALL")]
    InvalidSelection,
    #[error("level '{level}' is not available for the {dimension} dimension")]
    UnknownLevel { dimension: Dimension, level: Level },
}

/// Failure to read a dimension, level or branch name from text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown dimension '{0}'")]
    UnknownDimension(String),
    #[error("unknown level '{0}'")]
    UnknownLevel(String),
    #[error("unknown branch '{0}', expected 'category' or 'supplier'")]
    UnknownBranch(String),
}

/// A fetch that produced no usable data set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service answered with `success = false`; the text is its own
    /// diagnostic and is shown as-is.
    #[error("{0}")]
    Rejected(String),
    #[error("network error: {0}")]
    Transport(String),
}
