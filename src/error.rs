//! Error taxonomy for timetable generation.
//!
//! Each variant is one failure class of a generation run. Capacity
//! shortfalls are not errors: they travel as warnings on the outcome.

use std::fmt::Display;

use thiserror::Error;

use crate::repository::RepositoryError;
use crate::scheduler::Conflict;
use crate::validation::ValidationError;

/// A generation run that could not complete.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The request was malformed or the week is already scheduled.
    #[error("Invalid generation request: {}", join(.0))]
    Request(Vec<ValidationError>),

    /// Fetched child or therapist records are incomplete or invalid.
    #[error("Invalid timetable data: {}", join(.0))]
    DataIntegrity(Vec<ValidationError>),

    /// The computed assignments double-book a therapist.
    #[error("{} scheduling conflict(s) detected", .0.len())]
    Conflict(Vec<Conflict>),

    /// The repository rejected the batch; nothing was written.
    #[error("Failed to save sessions: {0}")]
    Persistence(#[source] RepositoryError),

    /// Unexpected internal or collaborator fault.
    #[error("Engine error: {0}")]
    Engine(String),
}

impl GenerationError {
    /// Wraps an unexpected fault.
    pub fn engine(err: impl Display) -> Self {
        Self::Engine(err.to_string())
    }

    /// One message per underlying problem, as reported on the outcome.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Request(errors) | Self::DataIntegrity(errors) => {
                errors.iter().map(|e| e.message.clone()).collect()
            }
            Self::Conflict(conflicts) => conflicts.iter().map(ToString::to_string).collect(),
            Self::Persistence(err) => err.messages(),
            Self::Engine(_) => vec![self.to_string()],
        }
    }

    /// Whether the caller can fix the failure by correcting its request.
    pub fn is_request_error(&self) -> bool {
        matches!(self, Self::Request(_))
    }
}

fn join<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
