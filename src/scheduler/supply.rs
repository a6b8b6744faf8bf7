//! Supply model: therapists with grouped availability and fairness state.

use std::collections::{BTreeMap, HashMap};

use crate::models::{DayOfWeek, DepartmentId, Therapist, TherapistId, TimeWindow};

/// A therapist as seen by the allocation engine.
///
/// `current_load` and `fairness_score` start from persisted loads and grow
/// by one with every session placed during the run.
#[derive(Debug, Clone, PartialEq)]
pub struct TherapistSupply {
    pub therapist_id: TherapistId,
    pub therapist_name: String,
    pub department_id: DepartmentId,
    pub department_name: String,
    /// Available windows grouped by day, in record order.
    pub availability: BTreeMap<DayOfWeek, Vec<TimeWindow>>,
    /// Sessions already held in the week being generated.
    pub current_load: u32,
    /// Previous-week plus current-week sessions, including those placed this run.
    pub fairness_score: u32,
}

impl TherapistSupply {
    /// Windows on `day`; empty if the therapist does not work that day.
    pub fn windows_on(&self, day: DayOfWeek) -> &[TimeWindow] {
        self.availability.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Records one placed session.
    pub fn record_session(&mut self) {
        self.current_load += 1;
        self.fairness_score += 1;
    }
}

/// Builds the supply model from fetched therapists and persisted loads.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupplyModelBuilder;

impl SupplyModelBuilder {
    pub fn new() -> Self {
        Self
    }

    /// One supply entry per therapist with a department.
    ///
    /// Therapists without a department cannot serve any need and are left
    /// out. Missing load entries count as zero.
    pub fn build(
        &self,
        therapists: &[Therapist],
        previous_week_loads: &HashMap<TherapistId, u32>,
        current_week_loads: &HashMap<TherapistId, u32>,
    ) -> Vec<TherapistSupply> {
        therapists
            .iter()
            .filter_map(|therapist| {
                let department_id = therapist.department_id?;

                let mut availability: BTreeMap<DayOfWeek, Vec<TimeWindow>> = BTreeMap::new();
                for weekly in therapist.weekly_windows() {
                    availability.entry(weekly.day).or_default().push(weekly.window);
                }

                let previous = previous_week_loads.get(&therapist.id).copied().unwrap_or(0);
                let current = current_week_loads.get(&therapist.id).copied().unwrap_or(0);

                Some(TherapistSupply {
                    therapist_id: therapist.id,
                    therapist_name: therapist.display_name(),
                    department_id,
                    department_name: therapist.department_name.clone(),
                    availability,
                    current_load: current,
                    fairness_score: previous + current,
                })
            })
            .collect()
    }
}
