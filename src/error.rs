//! Error types for the session core and its collaborators

use thiserror::Error;
use uuid::Uuid;

use crate::session::{Operation, StateTag};

/// Failure reported by an external collaborator (backend, routine store, catalog)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("failed to create workout: {0}")]
    CreateFailed(String),

    #[error("failed to log set: {0}")]
    LogFailed(String),

    #[error("failed to finish workout: {0}")]
    FinishFailed(String),

    #[error("routine store error: {0}")]
    Routine(String),

    #[error("exercise catalog error: {0}")]
    Catalog(String),
}

/// Input rejected before any network call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("select an exercise first")]
    NoExerciseSelected,

    #[error("weight must not be negative (got {0})")]
    NegativeWeight(f64),

    #[error("weight must be a finite number")]
    NonFiniteWeight,

    #[error("reps must be positive")]
    ZeroReps,

    #[error("RPE must be between 0 and 10 (got {0})")]
    InvalidRpe(f32),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Network(#[from] ClientError),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("cannot {action} while session is {state}")]
    InvalidTransition { action: &'static str, state: StateTag },

    #[error("{0} already in flight")]
    Busy(Operation),

    #[error("discarded response for workout {workout_id}: session was reset")]
    Stale { workout_id: Uuid },
}

impl SessionError {
    /// Backend failures the caller may retry without re-entering data
    pub fn is_retryable(&self) -> bool {
        matches!(self, SessionError::Network(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SessionError::Validation(_))
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
