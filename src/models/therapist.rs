//! Therapist model.
//!
//! Therapists are the supply side of the timetable. Each belongs to a
//! single department and publishes weekly availability windows; individual
//! windows can be switched off without being deleted.

use serde::{Deserialize, Serialize};

use super::{AvailabilityWindow, DepartmentId, TherapistId, WeeklyWindow};

/// A therapist as fetched for generation.
///
/// `availability` only holds windows currently marked available;
/// `unavailable_windows` counts the records that exist but are switched off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Therapist {
    /// Unique therapist identifier.
    pub id: TherapistId,
    /// Display name.
    pub name: String,
    /// Department the therapist works in.
    pub department_id: Option<DepartmentId>,
    /// Department display name.
    pub department_name: String,
    /// Available weekly windows.
    pub availability: Vec<AvailabilityWindow>,
    /// Number of availability records marked unavailable.
    #[serde(default)]
    pub unavailable_windows: usize,
}

impl Therapist {
    /// Creates a therapist in a department, with no availability.
    pub fn new(
        id: TherapistId,
        name: impl Into<String>,
        department_id: DepartmentId,
        department_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            department_id: Some(department_id),
            department_name: department_name.into(),
            availability: Vec::new(),
            unavailable_windows: 0,
        }
    }

    /// Creates a therapist with no department assignment.
    pub fn unassigned(id: TherapistId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            department_id: None,
            department_name: String::new(),
            availability: Vec::new(),
            unavailable_windows: 0,
        }
    }

    /// Adds an available window.
    pub fn with_availability(mut self, window: AvailabilityWindow) -> Self {
        self.availability.push(window);
        self
    }

    /// Sets the count of switched-off availability records.
    pub fn with_unavailable_windows(mut self, count: usize) -> Self {
        self.unavailable_windows = count;
        self
    }

    /// Name used in messages; falls back to the id when unnamed.
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("Therapist ID {}", self.id)
        } else {
            self.name.clone()
        }
    }

    /// Whether any availability record exists, available or not.
    pub fn has_schedule(&self) -> bool {
        !self.availability.is_empty() || self.unavailable_windows > 0
    }

    /// Available windows with a recognized day.
    pub fn weekly_windows(&self) -> Vec<WeeklyWindow> {
        self.availability
            .iter()
            .filter_map(AvailabilityWindow::weekly)
            .collect()
    }
}
