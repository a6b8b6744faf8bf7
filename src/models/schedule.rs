//! Schedule (solution) model.
//!
//! An [`Assignment`] is one placed session: a child, a therapist, a date
//! and a time window. A [`Schedule`] collects the assignments produced by
//! one generation run; once persisted, each becomes a [`Session`] with an id.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ChildId, DepartmentId, SessionId, TherapistId, TimeWindow, WeekStart};

/// A (child, therapist, date, time window) placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub child_id: ChildId,
    pub therapist_id: TherapistId,
    pub department_id: DepartmentId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub week_starting: WeekStart,
    /// Priority score of the winning candidate at placement time.
    pub priority_score: i64,
}

/// A persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub child_id: ChildId,
    pub therapist_id: TherapistId,
    pub department_id: DepartmentId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub week_starting: WeekStart,
}

/// A manual edit to an existing session. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub session_id: SessionId,
    pub therapist_id: Option<TherapistId>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

impl Assignment {
    /// The assigned time window.
    #[inline]
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }

    /// Converts into a persisted session with the given id.
    pub fn into_session(self, id: SessionId) -> Session {
        Session {
            id,
            child_id: self.child_id,
            therapist_id: self.therapist_id,
            department_id: self.department_id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            week_starting: self.week_starting,
        }
    }
}

impl Session {
    /// The session's time window.
    #[inline]
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }
}

impl SessionUpdate {
    /// An update for the given session that changes nothing yet.
    pub fn for_session(session_id: SessionId) -> Self {
        Self {
            session_id,
            ..Default::default()
        }
    }

    pub fn with_therapist(mut self, therapist_id: TherapistId) -> Self {
        self.therapist_id = Some(therapist_id);
        self
    }

    pub fn with_times(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    /// The session as it would look after applying this update.
    pub fn apply_to(&self, session: &Session) -> Session {
        Session {
            therapist_id: self.therapist_id.unwrap_or(session.therapist_id),
            date: self.date.unwrap_or(session.date),
            start_time: self.start_time.unwrap_or(session.start_time),
            end_time: self.end_time.unwrap_or(session.end_time),
            ..session.clone()
        }
    }
}

/// Assignments produced by one generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schedule {
    pub assignments: Vec<Assignment>,
}

impl Schedule {
    /// Creates an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an assignment.
    pub fn add_assignment(&mut self, assignment: Assignment) {
        self.assignments.push(assignment);
    }

    /// Number of assignments.
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    /// Whether nothing was placed.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Sessions per therapist.
    pub fn therapist_loads(&self) -> BTreeMap<TherapistId, usize> {
        let mut loads = BTreeMap::new();
        for a in &self.assignments {
            *loads.entry(a.therapist_id).or_insert(0) += 1;
        }
        loads
    }

    /// Consumes the schedule, returning its assignments.
    pub fn into_assignments(self) -> Vec<Assignment> {
        self.assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn week() -> WeekStart {
        WeekStart::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).unwrap()
    }

    fn assignment(child: ChildId, therapist: TherapistId, start: u32) -> Assignment {
        Assignment {
            child_id: child,
            therapist_id: therapist,
            department_id: 1,
            date: week().date(),
            start_time: hm(start),
            end_time: hm(start + 1),
            week_starting: week(),
            priority_score: 100,
        }
    }

    fn sample_schedule() -> Schedule {
        let mut s = Schedule::new();
        s.add_assignment(assignment(1, 10, 9));
        s.add_assignment(assignment(2, 10, 10));
        s.add_assignment(assignment(1, 20, 11));
        s
    }

    #[test]
    fn test_schedule_queries() {
        let s = sample_schedule();
        assert_eq!(s.assignment_count(), 3);
        assert_eq!(s.therapist_loads().get(&10), Some(&2));
        assert_eq!(s.therapist_loads().get(&20), Some(&1));
    }

    #[test]
    fn test_into_session_keeps_fields() {
        let a = assignment(1, 10, 9);
        let session = a.clone().into_session(42);
        assert_eq!(session.id, 42);
        assert_eq!(session.window(), a.window());
        assert_eq!(session.week_starting, a.week_starting);
    }

    #[test]
    fn test_update_apply() {
        let session = assignment(1, 10, 9).into_session(1);
        let update = SessionUpdate::for_session(1)
            .with_therapist(11)
            .with_times(hm(13), hm(14));
        let updated = update.apply_to(&session);
        assert_eq!(updated.therapist_id, 11);
        assert_eq!(updated.start_time, hm(13));
        assert_eq!(updated.date, session.date);
        assert_eq!(updated.child_id, 1);
    }

    #[test]
    fn test_empty_schedule() {
        let s = Schedule::new();
        assert!(s.is_empty());
        assert!(s.therapist_loads().is_empty());
    }
}
