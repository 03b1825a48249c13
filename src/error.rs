//! Error types.
//!
//! Validation errors are raised before any mutation is attempted and block
//! a whole batch. Persistence errors are scoped to a single reservation's
//! mutation. Inconsistent state is never reported: durations and guest
//! counts are clamped instead.

use thiserror::Error;

pub use crate::validation::{ValidationError, ValidationErrorKind};

/// Failure reported by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("backend unreachable")]
    Offline,

    #[error("save rejected: {reason}")]
    Rejected { reason: String },

    #[error("reservation not found: {0}")]
    NotFound(String),
}

impl PersistenceError {
    /// Creates a rejection with a reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// Illegal reassignment session transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} while session is {state}")]
pub struct SessionError {
    pub state: &'static str,
    pub action: &'static str,
}

/// A source record that cannot be placed on the grid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("reservation {id}: start time is missing or not finite")]
    InvalidStart { id: String },

    #[error("reservation {id}: no table assigned")]
    NoTables { id: String },

    #[error("reservation without id")]
    MissingId,
}

/// Invalid engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: i64 },
}

/// Crate-level error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("persisting {reservation_id} failed: {source}")]
    Persistence {
        reservation_id: String,
        #[source]
        source: PersistenceError,
    },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("reservation not found: {0}")]
    ReservationNotFound(String),
}

impl TimelineError {
    pub(crate) fn persistence(reservation_id: impl Into<String>, source: PersistenceError) -> Self {
        Self::Persistence {
            reservation_id: reservation_id.into(),
            source,
        }
    }

    /// Whether this error was raised before any mutation was attempted.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, TimelineError>;
