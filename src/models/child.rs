//! Child model.
//!
//! A child is the demand side of the timetable: each department need
//! asks for a number of weekly sessions, to be placed within the child's
//! availability windows.

use serde::{Deserialize, Serialize};

use super::{AvailabilityWindow, ChildId, DayOfWeek, DepartmentId, WeeklyWindow};

/// A child with department needs and weekly availability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Child {
    /// Unique child identifier.
    pub id: ChildId,
    /// Display name.
    pub name: String,
    /// Therapy departments the child attends.
    pub departments: Vec<DepartmentNeed>,
    /// Weekly availability records.
    pub availability: Vec<AvailabilityWindow>,
}

/// Weekly session requirement for one department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentNeed {
    /// Department identifier.
    pub department_id: DepartmentId,
    /// Department display name.
    pub department_name: String,
    /// Sessions required per week.
    pub sessions_per_week: u32,
}

impl DepartmentNeed {
    pub fn new(
        department_id: DepartmentId,
        department_name: impl Into<String>,
        sessions_per_week: u32,
    ) -> Self {
        Self {
            department_id,
            department_name: department_name.into(),
            sessions_per_week,
        }
    }
}

impl Child {
    /// Creates a child with no needs and no availability.
    pub fn new(id: ChildId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            departments: Vec::new(),
            availability: Vec::new(),
        }
    }

    /// Adds a department need.
    pub fn with_need(mut self, need: DepartmentNeed) -> Self {
        self.departments.push(need);
        self
    }

    /// Adds an availability record.
    pub fn with_availability(mut self, window: AvailabilityWindow) -> Self {
        self.availability.push(window);
        self
    }

    /// Name used in messages; falls back to the id when unnamed.
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("Child ID {}", self.id)
        } else {
            self.name.clone()
        }
    }

    /// Total sessions required per week across all departments.
    pub fn weekly_sessions(&self) -> u32 {
        self.departments.iter().map(|d| d.sessions_per_week).sum()
    }

    /// Distinct available days, in the order they were first listed.
    pub fn available_days(&self) -> Vec<DayOfWeek> {
        let mut days = Vec::new();
        for day in self.availability.iter().filter_map(AvailabilityWindow::day) {
            if !days.contains(&day) {
                days.push(day);
            }
        }
        days
    }

    /// Availability records with a recognized day.
    pub fn weekly_windows(&self) -> Vec<WeeklyWindow> {
        self.availability
            .iter()
            .filter_map(AvailabilityWindow::weekly)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn hm(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn test_child_builder() {
        let child = Child::new(1, "Ada")
            .with_need(DepartmentNeed::new(10, "Speech", 2))
            .with_need(DepartmentNeed::new(20, "Occupational", 3))
            .with_availability(AvailabilityWindow::new(DayOfWeek::Monday, hm(9), hm(11)));

        assert_eq!(child.id, 1);
        assert_eq!(child.weekly_sessions(), 5);
        assert_eq!(child.weekly_windows().len(), 1);
    }

    #[test]
    fn test_available_days_dedup_keeps_order() {
        let child = Child::new(1, "Ada")
            .with_availability(AvailabilityWindow::new(DayOfWeek::Wednesday, hm(9), hm(10)))
            .with_availability(AvailabilityWindow::new(DayOfWeek::Monday, hm(9), hm(10)))
            .with_availability(AvailabilityWindow::new(DayOfWeek::Wednesday, hm(13), hm(14)))
            .with_availability(AvailabilityWindow::raw("Funday", hm(9), hm(10)));

        assert_eq!(
            child.available_days(),
            vec![DayOfWeek::Wednesday, DayOfWeek::Monday]
        );
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(Child::new(7, "").display_name(), "Child ID 7");
        assert_eq!(Child::new(7, "Ben").display_name(), "Ben");
    }
}
