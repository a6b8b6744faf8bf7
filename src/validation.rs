//! Input validation for timetable generation.
//!
//! Two passes run before any allocation:
//!
//! 1. [`RequestValidator`] checks the generation request itself, in order,
//!    stopping at the first failing class:
//!    - the week starts on a Monday (alone, nothing else is checked);
//!    - both selections are non-empty, free of duplicates and within limits
//!      (all of these are reported together);
//!    - the week is empty unless regeneration was requested.
//! 2. [`DataValidator`] checks the fetched children and therapists and
//!    reports every offending entity by name, so that all issues can be
//!    fixed in one pass. It also estimates capacity, which only ever
//!    produces warnings.
//!
//! [`validate_session_update`] checks manual edits against existing sessions.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::config::{CapacityConfig, RequestLimits, SchedulingConfig, WorkingHours};
use crate::error::GenerationError;
use crate::generator::GenerationRequest;
use crate::models::{
    AvailabilityWindow, Child, DepartmentId, Session, SessionUpdate, Therapist, TimeWindow,
    WeekStart,
};
use crate::repository::DataRepository;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Week start is not a Monday.
    NotMonday,
    /// No children or no therapists were selected.
    EmptySelection,
    /// The same id was selected twice.
    DuplicateId,
    /// More entities selected than allowed in one run.
    SelectionTooLarge,
    /// The week already has sessions and regeneration was not requested.
    SessionsExist,
    /// None of the selected ids resolved to an active record.
    NoActiveRecords,
    /// A child without department needs, or a therapist without a department.
    MissingDepartment,
    /// No availability records at all.
    MissingAvailability,
    /// An availability record with an unrecognized day.
    InvalidDay,
    /// An availability record or session with an unusable time range.
    InvalidTimeRange,
    /// A child needs more sessions than a week can hold.
    ExcessiveDemand,
    /// A manual update references a session that does not exist.
    UnknownSession,
    /// A manual update would double-book a therapist.
    TherapistConflict,
    /// A manual update moves a session out of its week.
    OutsideWeek,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Checks the shape of a generation request.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    limits: RequestLimits,
}

impl RequestValidator {
    pub fn new(config: &SchedulingConfig) -> Self {
        Self {
            limits: config.limits.clone(),
        }
    }

    /// Runs all request checks, consulting the repository only when the
    /// request is structurally valid.
    ///
    /// # Returns
    /// The validated week on success.
    pub fn validate<R: DataRepository + ?Sized>(
        &self,
        request: &GenerationRequest,
        repository: &R,
    ) -> Result<WeekStart, GenerationError> {
        let week = self
            .validate_structure(request)
            .map_err(GenerationError::Request)?;

        if !request.regenerate_existing {
            let exists = repository
                .sessions_exist(week)
                .map_err(GenerationError::engine)?;
            if exists {
                return Err(GenerationError::Request(vec![ValidationError::new(
                    ValidationErrorKind::SessionsExist,
                    "Sessions already exist for this week. Use regenerate_existing=true to overwrite.",
                )]));
            }
        }

        Ok(week)
    }

    /// Checks that need no data access: the Monday rule, then selections.
    pub fn validate_structure(
        &self,
        request: &GenerationRequest,
    ) -> Result<WeekStart, Vec<ValidationError>> {
        let week = WeekStart::new(request.week_starting).map_err(|_| {
            vec![ValidationError::new(
                ValidationErrorKind::NotMonday,
                "Week must start on Monday",
            )]
        })?;

        let mut errors = Vec::new();

        if request.active_children.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptySelection,
                "No children selected",
            ));
        }
        if request.active_therapists.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptySelection,
                "No therapists selected",
            ));
        }

        if request.active_children.len() > self.limits.max_children_per_request {
            errors.push(ValidationError::new(
                ValidationErrorKind::SelectionTooLarge,
                format!(
                    "Too many children selected (max {} per week)",
                    self.limits.max_children_per_request
                ),
            ));
        }
        if request.active_therapists.len() > self.limits.max_therapists_per_request {
            errors.push(ValidationError::new(
                ValidationErrorKind::SelectionTooLarge,
                format!(
                    "Too many therapists selected (max {} per week)",
                    self.limits.max_therapists_per_request
                ),
            ));
        }

        if has_duplicates(&request.active_children) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                "Duplicate children IDs found in selection",
            ));
        }
        if has_duplicates(&request.active_therapists) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                "Duplicate therapist IDs found in selection",
            ));
        }

        if errors.is_empty() {
            Ok(week)
        } else {
            Err(errors)
        }
    }
}

fn has_duplicates(ids: &[u32]) -> bool {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().any(|id| !seen.insert(id))
}

/// Non-fatal findings of a successful data check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataReport {
    pub warnings: Vec<String>,
}

/// Checks fetched domain records before allocation.
#[derive(Debug, Clone)]
pub struct DataValidator {
    hours: WorkingHours,
    limits: RequestLimits,
    capacity: CapacityConfig,
}

impl DataValidator {
    pub fn new(config: &SchedulingConfig) -> Self {
        Self {
            hours: config.hours.clone(),
            limits: config.limits.clone(),
            capacity: config.capacity.clone(),
        }
    }

    /// Validates children and therapists together.
    ///
    /// # Returns
    /// Capacity and availability warnings on success, or every integrity
    /// error found across both lists.
    pub fn validate(
        &self,
        children: &[Child],
        therapists: &[Therapist],
    ) -> Result<DataReport, Vec<ValidationError>> {
        let mut errors = Vec::new();
        if let Err(mut e) = self.validate_children(children) {
            errors.append(&mut e);
        }
        if let Err(mut e) = self.validate_therapists(therapists) {
            errors.append(&mut e);
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut warnings: Vec<String> = therapists
            .iter()
            .filter(|t| t.availability.is_empty() && t.unavailable_windows > 0)
            .map(|t| {
                format!(
                    "{}: All availability windows are marked unavailable",
                    t.display_name()
                )
            })
            .collect();
        warnings.extend(self.capacity_warnings(children, therapists));

        Ok(DataReport { warnings })
    }

    /// Checks needs and availability of every child.
    pub fn validate_children(&self, children: &[Child]) -> ValidationResult {
        let mut errors = Vec::new();

        if children.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::NoActiveRecords,
                "No active children found for the selection",
            ));
        }

        for child in children {
            let name = child.display_name();

            if child.departments.is_empty() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::MissingDepartment,
                    format!("{name}: No departments assigned"),
                ));
            }

            if child.availability.is_empty() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::MissingAvailability,
                    format!("{name}: No availability schedule set"),
                ));
            }

            let weekly = child.weekly_sessions();
            if weekly > self.limits.max_child_weekly_sessions {
                errors.push(ValidationError::new(
                    ValidationErrorKind::ExcessiveDemand,
                    format!("{name}: Too many weekly sessions required ({weekly})"),
                ));
            }

            for window in &child.availability {
                self.check_window(&name, window, &mut errors);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Checks department and availability of every therapist.
    ///
    /// A therapist whose records all exist but are switched off is not an
    /// error; it simply offers no supply this week.
    pub fn validate_therapists(&self, therapists: &[Therapist]) -> ValidationResult {
        let mut errors = Vec::new();

        if therapists.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::NoActiveRecords,
                "No therapists available for any department",
            ));
        }

        for therapist in therapists {
            let name = therapist.display_name();

            if therapist.department_id.is_none() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::MissingDepartment,
                    format!("{name}: No department assigned"),
                ));
            }

            if !therapist.has_schedule() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::MissingAvailability,
                    format!("{name}: No availability schedule set"),
                ));
            }

            for window in &therapist.availability {
                self.check_window(&name, window, &mut errors);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn check_window(&self, owner: &str, window: &AvailabilityWindow, errors: &mut Vec<ValidationError>) {
        if window.day().is_none() {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidDay,
                format!("{owner}: Invalid day '{}'", window.day_of_week),
            ));
        }
        let range = window.window();
        if !self.is_valid_time_range(&range) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidTimeRange,
                format!("{owner}: Invalid time range {range}"),
            ));
        }
    }

    /// Whether a window is non-empty, inside working hours and of an
    /// acceptable length.
    pub fn is_valid_time_range(&self, window: &TimeWindow) -> bool {
        is_valid_time_range(&self.hours, window)
    }

    /// Sessions a therapist can take in a week: available hours scaled by
    /// the booking efficiency, rounded down.
    pub fn weekly_capacity(&self, therapist: &Therapist) -> u32 {
        let minutes: i64 = therapist
            .availability
            .iter()
            .map(|w| w.window().duration_minutes().max(0))
            .sum();
        let hours = minutes as f64 / 60.0;
        (hours * self.capacity.efficiency).floor() as u32
    }

    /// Compares total and per-department demand against capacity.
    pub fn capacity_warnings(&self, children: &[Child], therapists: &[Therapist]) -> Vec<String> {
        let mut departments: BTreeMap<DepartmentId, (String, u32, u32)> = BTreeMap::new();

        for child in children {
            for need in &child.departments {
                let entry = departments
                    .entry(need.department_id)
                    .or_insert_with(|| (need.department_name.clone(), 0, 0));
                entry.1 += need.sessions_per_week;
            }
        }
        for therapist in therapists {
            let Some(department_id) = therapist.department_id else {
                continue;
            };
            let entry = departments
                .entry(department_id)
                .or_insert_with(|| (therapist.department_name.clone(), 0, 0));
            entry.2 += self.weekly_capacity(therapist);
        }

        let needed: u32 = departments.values().map(|d| d.1).sum();
        let available: u32 = departments.values().map(|d| d.2).sum();

        let mut warnings = Vec::new();
        if needed > available {
            warnings.push(format!(
                "Insufficient therapist capacity: {needed} sessions needed, {available} available"
            ));
        }

        for (department_id, (name, needed, available)) in &departments {
            if *needed == 0 {
                continue;
            }
            let label = if name.is_empty() {
                department_id.to_string()
            } else {
                name.clone()
            };
            if needed > available {
                warnings.push(format!(
                    "Department {label}: {needed} sessions needed, {available} available"
                ));
            } else if f64::from(*needed) > f64::from(*available) * self.capacity.high_utilization_ratio {
                warnings.push(format!(
                    "Department {label}: High utilization ({needed}/{available})"
                ));
            }
        }

        warnings
    }
}

fn is_valid_time_range(hours: &WorkingHours, window: &TimeWindow) -> bool {
    if !window.is_valid() {
        return false;
    }
    if window.start < hours.start || window.end > hours.end {
        return false;
    }
    let minutes = window.duration_minutes();
    minutes >= hours.min_window_minutes && minutes <= hours.max_window_minutes
}

/// Validates a manual session edit.
///
/// Checks the resulting time range, keeps the session inside its week and
/// reports every other session of the same therapist on the same date that
/// would overlap.
pub fn validate_session_update(
    update: &SessionUpdate,
    existing: &[Session],
    hours: &WorkingHours,
) -> ValidationResult {
    let Some(current) = existing.iter().find(|s| s.id == update.session_id) else {
        return Err(vec![ValidationError::new(
            ValidationErrorKind::UnknownSession,
            format!("Session {} not found", update.session_id),
        )]);
    };

    let updated = update.apply_to(current);
    let window = updated.window();
    let mut errors = Vec::new();

    if !is_valid_time_range(hours, &window) {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidTimeRange,
            format!("Invalid time range {window}"),
        ));
    }

    if !updated.week_starting.contains(updated.date) {
        errors.push(ValidationError::new(
            ValidationErrorKind::OutsideWeek,
            format!(
                "Session date {} is outside week {}",
                updated.date, updated.week_starting
            ),
        ));
    }

    for other in existing {
        if other.id == updated.id
            || other.therapist_id != updated.therapist_id
            || other.date != updated.date
        {
            continue;
        }
        if other.window().overlaps(&window) {
            errors.push(ValidationError::new(
                ValidationErrorKind::TherapistConflict,
                format!("Therapist conflict: overlapping session at {}", other.window()),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
