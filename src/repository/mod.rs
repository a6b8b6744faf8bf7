//! Data access for timetable generation.
//!
//! The generator reads children, therapists and historical loads through
//! [`DataRepository`] and writes the finished batch back through it. Two
//! implementations ship with the crate:
//!
//! - [`InMemoryRepository`]: complete store for development and tests.
//! - [`CachedRepository`]: read-through cache in front of any repository.

mod cache;
mod memory;

use std::collections::HashMap;

use thiserror::Error;

pub use cache::{
    Cache, CacheKey, CachedRepository, DisabledCache, InMemoryCache, CHILDREN_PREFIX,
    THERAPISTS_PREFIX,
};
pub use memory::InMemoryRepository;

use crate::models::{Assignment, Child, ChildId, Therapist, TherapistId, WeekStart};
use crate::scheduler::WeekOverview;

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Error type for repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The batch double-books a therapist; nothing was written.
    #[error("Scheduling conflicts detected: {}", .0.join("; "))]
    Conflict(Vec<String>),

    /// The store rejected the write; nothing was written.
    #[error("Database error during bulk creation: {message}")]
    Write { message: String },

    #[error("Repository unavailable: {message}")]
    Unavailable { message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Another run already wrote sessions for this week.
    #[error("Sessions for week {week} already exist")]
    WeekOccupied { week: WeekStart },
}

impl RepositoryError {
    /// One message per problem.
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Conflict(conflicts) => conflicts.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// Store of children, therapists and sessions.
///
/// Implementations must make [`bulk_create_sessions`](Self::bulk_create_sessions)
/// all-or-nothing and must refuse a batch for a week that already holds
/// sessions, so that two concurrent runs for one week cannot both commit.
pub trait DataRepository: Send + Sync {
    /// Active children among `ids`, with department needs and availability.
    fn fetch_active_children_with_needs(&self, ids: &[ChildId]) -> RepositoryResult<Vec<Child>>;

    /// Active therapists among `ids`, with only their available windows.
    fn fetch_available_therapists_with_schedule(
        &self,
        ids: &[TherapistId],
    ) -> RepositoryResult<Vec<Therapist>>;

    /// Sessions per therapist in the week before `week`.
    fn previous_week_loads(&self, week: WeekStart) -> RepositoryResult<HashMap<TherapistId, u32>>;

    /// Sessions per therapist already stored for `week`.
    fn current_week_loads(&self, week: WeekStart) -> RepositoryResult<HashMap<TherapistId, u32>>;

    fn sessions_exist(&self, week: WeekStart) -> RepositoryResult<bool>;

    /// Deletes every session of `week`, returning how many were removed.
    fn clear_week(&self, week: WeekStart) -> RepositoryResult<usize>;

    /// Persists the batch, returning the number of sessions created.
    fn bulk_create_sessions(&self, assignments: &[Assignment]) -> RepositoryResult<usize>;

    fn week_overview(&self, week: WeekStart) -> RepositoryResult<WeekOverview>;
}

impl<R: DataRepository + ?Sized> DataRepository for std::sync::Arc<R> {
    fn fetch_active_children_with_needs(&self, ids: &[ChildId]) -> RepositoryResult<Vec<Child>> {
        (**self).fetch_active_children_with_needs(ids)
    }

    fn fetch_available_therapists_with_schedule(
        &self,
        ids: &[TherapistId],
    ) -> RepositoryResult<Vec<Therapist>> {
        (**self).fetch_available_therapists_with_schedule(ids)
    }

    fn previous_week_loads(&self, week: WeekStart) -> RepositoryResult<HashMap<TherapistId, u32>> {
        (**self).previous_week_loads(week)
    }

    fn current_week_loads(&self, week: WeekStart) -> RepositoryResult<HashMap<TherapistId, u32>> {
        (**self).current_week_loads(week)
    }

    fn sessions_exist(&self, week: WeekStart) -> RepositoryResult<bool> {
        (**self).sessions_exist(week)
    }

    fn clear_week(&self, week: WeekStart) -> RepositoryResult<usize> {
        (**self).clear_week(week)
    }

    fn bulk_create_sessions(&self, assignments: &[Assignment]) -> RepositoryResult<usize> {
        (**self).bulk_create_sessions(assignments)
    }

    fn week_overview(&self, week: WeekStart) -> RepositoryResult<WeekOverview> {
        (**self).week_overview(week)
    }
}
