//! In-memory repository.
//!
//! Stores all records behind one `RwLock`, which makes every operation
//! atomic. Suitable for tests and local development; clones share state.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::{DataRepository, RepositoryError, RepositoryResult};
use crate::models::{
    Assignment, Child, ChildId, DepartmentId, Session, SessionId, Therapist, TherapistId,
    WeekStart,
};
use crate::scheduler::{ConflictVerifier, NameDirectory, ResultAggregator, WeekAnalytics, WeekOverview};

/// In-memory [`DataRepository`].
///
/// # Example
///
/// ```
/// use therapy_timetable::models::{Child, DepartmentNeed};
/// use therapy_timetable::repository::{DataRepository, InMemoryRepository};
///
/// let repo = InMemoryRepository::new();
/// repo.add_child(Child::new(1, "Ada").with_need(DepartmentNeed::new(10, "Speech", 2)));
///
/// let children = repo.fetch_active_children_with_needs(&[1, 2]).unwrap();
/// assert_eq!(children.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    data: Arc<RwLock<StoreData>>,
}

#[derive(Debug)]
struct StoreData {
    departments: HashMap<DepartmentId, String>,
    children: BTreeMap<ChildId, StoredChild>,
    therapists: BTreeMap<TherapistId, StoredTherapist>,
    sessions: Vec<Session>,
    next_session_id: SessionId,
    pending_write_failure: Option<String>,
    is_healthy: bool,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            departments: HashMap::new(),
            children: BTreeMap::new(),
            therapists: BTreeMap::new(),
            sessions: Vec::new(),
            next_session_id: 1,
            pending_write_failure: None,
            is_healthy: true,
        }
    }
}

#[derive(Debug)]
struct StoredChild {
    child: Child,
    is_active: bool,
}

/// A therapist with every availability record and its on/off flag.
#[derive(Debug)]
struct StoredTherapist {
    therapist: Therapist,
    window_available: Vec<bool>,
    is_active: bool,
}

impl StoredTherapist {
    fn as_fetched(&self) -> Therapist {
        let mut therapist = self.therapist.clone();
        therapist.availability = self
            .therapist
            .availability
            .iter()
            .zip(&self.window_available)
            .filter(|(_, on)| **on)
            .map(|(w, _)| w.clone())
            .collect();
        therapist.unavailable_windows = self.window_available.iter().filter(|on| !**on).count();
        therapist
    }
}

impl StoreData {
    fn week_sessions(&self, week: WeekStart) -> Vec<Session> {
        self.sessions
            .iter()
            .filter(|s| s.week_starting == week)
            .cloned()
            .collect()
    }

    fn loads(&self, week: WeekStart) -> HashMap<TherapistId, u32> {
        let mut loads = HashMap::new();
        for s in self.sessions.iter().filter(|s| s.week_starting == week) {
            *loads.entry(s.therapist_id).or_insert(0) += 1;
        }
        loads
    }

    fn names(&self) -> NameDirectory {
        NameDirectory {
            children: self
                .children
                .iter()
                .map(|(id, c)| (*id, c.child.display_name()))
                .collect(),
            therapists: self
                .therapists
                .iter()
                .map(|(id, t)| (*id, t.therapist.display_name()))
                .collect(),
            departments: self.departments.clone(),
        }
    }
}

fn unavailable<T>(_: PoisonError<T>) -> RepositoryError {
    RepositoryError::Unavailable {
        message: "store lock poisoned".to_string(),
    }
}

fn offline() -> RepositoryError {
    RepositoryError::Unavailable {
        message: "store is offline".to_string(),
    }
}

impl InMemoryRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepositoryResult<RwLockReadGuard<'_, StoreData>> {
        let data = self.data.read().map_err(unavailable)?;
        if !data.is_healthy {
            return Err(offline());
        }
        Ok(data)
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, StoreData>> {
        let data = self.data.write().map_err(unavailable)?;
        if !data.is_healthy {
            return Err(offline());
        }
        Ok(data)
    }

    /// Setup access; ignores health and recovers a poisoned lock.
    fn setup(&self) -> RwLockWriteGuard<'_, StoreData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a department name.
    pub fn add_department(&self, id: DepartmentId, name: impl Into<String>) {
        self.setup().departments.insert(id, name.into());
    }

    /// Stores an active child. Department names of its needs are registered.
    pub fn add_child(&self, child: Child) {
        let mut data = self.setup();
        for need in &child.departments {
            data.departments
                .entry(need.department_id)
                .or_insert_with(|| need.department_name.clone());
        }
        data.children.insert(
            child.id,
            StoredChild {
                child,
                is_active: true,
            },
        );
    }

    /// Stores an active therapist with every window marked available.
    pub fn add_therapist(&self, therapist: Therapist) {
        let mut data = self.setup();
        if let Some(department_id) = therapist.department_id {
            data.departments
                .entry(department_id)
                .or_insert_with(|| therapist.department_name.clone());
        }
        let window_available = vec![true; therapist.availability.len()];
        data.therapists.insert(
            therapist.id,
            StoredTherapist {
                therapist,
                window_available,
                is_active: true,
            },
        );
    }

    pub fn set_child_active(&self, id: ChildId, active: bool) -> RepositoryResult<()> {
        let mut data = self.write()?;
        let stored = data.children.get_mut(&id).ok_or_else(|| RepositoryError::NotFound {
            entity: "Child",
            id: id.to_string(),
        })?;
        stored.is_active = active;
        Ok(())
    }

    pub fn set_therapist_active(&self, id: TherapistId, active: bool) -> RepositoryResult<()> {
        let mut data = self.write()?;
        let stored = data.therapists.get_mut(&id).ok_or_else(|| RepositoryError::NotFound {
            entity: "Therapist",
            id: id.to_string(),
        })?;
        stored.is_active = active;
        Ok(())
    }

    /// Switches one availability record of a therapist on or off.
    ///
    /// `index` is the record's position in the therapist's availability list.
    pub fn set_window_available(
        &self,
        therapist_id: TherapistId,
        index: usize,
        available: bool,
    ) -> RepositoryResult<()> {
        let mut data = self.write()?;
        let flag = data
            .therapists
            .get_mut(&therapist_id)
            .and_then(|t| t.window_available.get_mut(index))
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Availability window",
                id: format!("{therapist_id}/{index}"),
            })?;
        *flag = available;
        Ok(())
    }

    /// Stores one session directly, bypassing batch checks.
    pub fn insert_session(&self, assignment: Assignment) -> SessionId {
        let mut data = self.setup();
        let id = data.next_session_id;
        data.next_session_id += 1;
        data.sessions.push(assignment.into_session(id));
        id
    }

    /// Stored sessions of `week`, in insertion order.
    pub fn sessions_for_week(&self, week: WeekStart) -> RepositoryResult<Vec<Session>> {
        Ok(self.read()?.week_sessions(week))
    }

    /// Total number of stored sessions.
    pub fn session_count(&self) -> usize {
        self.data
            .read()
            .map(|d| d.sessions.len())
            .unwrap_or_else(|e| e.into_inner().sessions.len())
    }

    /// Makes the next batch write fail with `message`.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        self.setup().pending_write_failure = Some(message.into());
    }

    /// Simulates the store going offline (`false`) or coming back.
    pub fn set_healthy(&self, healthy: bool) {
        self.setup().is_healthy = healthy;
    }

    /// Load analytics over all active therapists.
    pub fn week_analytics(&self, week: WeekStart) -> RepositoryResult<WeekAnalytics> {
        let data = self.read()?;
        let therapists: Vec<Therapist> = data
            .therapists
            .values()
            .filter(|t| t.is_active)
            .map(StoredTherapist::as_fetched)
            .collect();
        Ok(ResultAggregator::analytics(
            week,
            &therapists,
            &data.loads(week),
            &data.loads(week.previous()),
            &data.week_sessions(week),
        ))
    }
}

impl DataRepository for InMemoryRepository {
    fn fetch_active_children_with_needs(&self, ids: &[ChildId]) -> RepositoryResult<Vec<Child>> {
        let data = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| data.children.get(id))
            .filter(|c| c.is_active)
            .map(|c| c.child.clone())
            .collect())
    }

    fn fetch_available_therapists_with_schedule(
        &self,
        ids: &[TherapistId],
    ) -> RepositoryResult<Vec<Therapist>> {
        let data = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| data.therapists.get(id))
            .filter(|t| t.is_active)
            .map(StoredTherapist::as_fetched)
            .collect())
    }

    fn previous_week_loads(&self, week: WeekStart) -> RepositoryResult<HashMap<TherapistId, u32>> {
        Ok(self.read()?.loads(week.previous()))
    }

    fn current_week_loads(&self, week: WeekStart) -> RepositoryResult<HashMap<TherapistId, u32>> {
        Ok(self.read()?.loads(week))
    }

    fn sessions_exist(&self, week: WeekStart) -> RepositoryResult<bool> {
        Ok(self.read()?.sessions.iter().any(|s| s.week_starting == week))
    }

    fn clear_week(&self, week: WeekStart) -> RepositoryResult<usize> {
        let mut data = self.write()?;
        let before = data.sessions.len();
        data.sessions.retain(|s| s.week_starting != week);
        let removed = before - data.sessions.len();
        debug!(week = %week, removed, "cleared week");
        Ok(removed)
    }

    fn bulk_create_sessions(&self, assignments: &[Assignment]) -> RepositoryResult<usize> {
        let mut data = self.write()?;

        if let Some(message) = data.pending_write_failure.take() {
            return Err(RepositoryError::Write { message });
        }
        if assignments.is_empty() {
            return Ok(0);
        }

        ConflictVerifier::verify(assignments).map_err(|conflicts| {
            RepositoryError::Conflict(conflicts.iter().map(ToString::to_string).collect())
        })?;

        let weeks: BTreeSet<WeekStart> = assignments.iter().map(|a| a.week_starting).collect();
        for &week in &weeks {
            if data.sessions.iter().any(|s| s.week_starting == week) {
                return Err(RepositoryError::WeekOccupied { week });
            }
        }

        for assignment in assignments {
            let id = data.next_session_id;
            data.next_session_id += 1;
            data.sessions.push(assignment.clone().into_session(id));
        }
        debug!(created = assignments.len(), "sessions written");
        Ok(assignments.len())
    }

    fn week_overview(&self, week: WeekStart) -> RepositoryResult<WeekOverview> {
        let data = self.read()?;
        Ok(ResultAggregator::overview(
            week,
            &data.week_sessions(week),
            &data.names(),
        ))
    }
}
