//! Greedy, fairness-driven session allocation.
//!
//! # Algorithm
//!
//! For each demand, in the shuffled order given by the demand builder:
//!
//! 1. Collect the therapists of the demand's department, stably sorted by
//!    `(fairness_score, current_load)`. The department list is sorted in
//!    place, so ties keep the order left by the previous demand.
//! 2. For each of the child's days, for each therapist working that day,
//!    skip when either daily cap is reached; otherwise tile the overlap of
//!    the therapist's and the child's windows into slots.
//! 3. Score every slot and keep the highest; the first slot found wins ties.
//! 4. Commit the winner: bump the therapist's load and fairness score and
//!    both daily counters.
//!
//! Placed demands are never revisited. Demands without a candidate are left
//! unplaced and reported as warnings.
//!
//! # Priority score
//!
//! ```text
//! 100
//!   + (10 - current_load) * 2          fairness, may go negative
//!   + 5 if slot starts before cutoff   morning
//!   + max(0, 3 - child sessions that date)
//!   + max(0, 6 - therapist sessions that date)
//! ```
//!
//! # Complexity
//! O(d * t * k * s) where d=demands, t=therapists per department,
//! k=days per child, s=slots per overlap.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::demand::SessionDemand;
use super::matcher::TimeWindowMatcher;
use super::supply::TherapistSupply;
use super::tracking::{DailyCounters, Occupancy};
use crate::config::{AllocationConfig, OccupancyPolicy};
use crate::models::{Assignment, DepartmentId, Schedule, TimeWindow, WeekStart};

/// Result of one allocation pass.
#[derive(Debug, Clone, Default)]
pub struct Allocation {
    /// Placed assignments, in placement order.
    pub schedule: Schedule,
    /// One message per demand that could not be placed.
    pub warnings: Vec<String>,
    /// Number of demands left unplaced.
    pub unplaced: usize,
}

impl Allocation {
    pub fn placed(&self) -> usize {
        self.schedule.assignment_count()
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    supply: usize,
    date: NaiveDate,
    slot: TimeWindow,
    score: i64,
}

/// Greedy allocation engine.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use chrono::NaiveTime;
/// use therapy_timetable::config::AllocationConfig;
/// use therapy_timetable::models::{
///     AvailabilityWindow, Child, DayOfWeek, DepartmentNeed, Therapist, WeekStart,
/// };
/// use therapy_timetable::scheduler::{AllocationEngine, DemandModelBuilder, SupplyModelBuilder};
///
/// let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
/// let eleven = NaiveTime::from_hms_opt(11, 0, 0).unwrap();
/// let child = Child::new(1, "Ada")
///     .with_need(DepartmentNeed::new(10, "Speech", 1))
///     .with_availability(AvailabilityWindow::new(DayOfWeek::Monday, nine, eleven));
/// let therapist = Therapist::new(5, "Dr. Lee", 10, "Speech")
///     .with_availability(AvailabilityWindow::new(DayOfWeek::Monday, nine, eleven));
///
/// let demands = DemandModelBuilder::new(42).build(&[child]);
/// let supply = SupplyModelBuilder::new().build(&[therapist], &HashMap::new(), &HashMap::new());
/// let week = WeekStart::new(chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).unwrap();
///
/// let allocation = AllocationEngine::new(AllocationConfig::default()).allocate(&demands, supply, week);
/// assert_eq!(allocation.placed(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct AllocationEngine {
    config: AllocationConfig,
    matcher: TimeWindowMatcher,
}

impl AllocationEngine {
    pub fn new(config: AllocationConfig) -> Self {
        let matcher = TimeWindowMatcher::new(config.slot_minutes);
        Self { config, matcher }
    }

    /// Places as many demands as possible.
    ///
    /// `supplies` is consumed: load and fairness updates made during the
    /// pass do not outlive it.
    pub fn allocate(
        &self,
        demands: &[SessionDemand],
        mut supplies: Vec<TherapistSupply>,
        week: WeekStart,
    ) -> Allocation {
        let mut by_department: HashMap<DepartmentId, Vec<usize>> = HashMap::new();
        for (idx, supply) in supplies.iter().enumerate() {
            by_department.entry(supply.department_id).or_default().push(idx);
        }

        let mut counters = DailyCounters::new();
        let mut occupancy = Occupancy::new();
        let mut allocation = Allocation::default();

        for demand in demands {
            let Some(candidates) = by_department
                .get_mut(&demand.department_id)
                .filter(|c| !c.is_empty())
            else {
                debug!(
                    child = demand.child_id,
                    department = demand.department_id,
                    "no therapist in department"
                );
                allocation.warnings.push(format!(
                    "No therapists available for department {}",
                    demand.department_name
                ));
                allocation.unplaced += 1;
                continue;
            };

            // Re-sorted in place, so equal keys keep the previous demand's order.
            candidates.sort_by_key(|&i| (supplies[i].fairness_score, supplies[i].current_load));

            let best =
                self.best_candidate(demand, candidates, &supplies, &counters, &occupancy, week);

            let Some(best) = best else {
                debug!(
                    child = demand.child_id,
                    department = demand.department_id,
                    "no slot for demand"
                );
                allocation.warnings.push(format!(
                    "Could not allocate session for {} in {}",
                    demand.child_name, demand.department_name
                ));
                allocation.unplaced += 1;
                continue;
            };

            let supply = &mut supplies[best.supply];
            supply.record_session();
            counters.record(demand.child_id, supply.therapist_id, best.date);
            occupancy.commit(demand.child_id, supply.therapist_id, best.date, best.slot);

            allocation.schedule.add_assignment(Assignment {
                child_id: demand.child_id,
                therapist_id: supply.therapist_id,
                department_id: demand.department_id,
                date: best.date,
                start_time: best.slot.start,
                end_time: best.slot.end,
                week_starting: week,
                priority_score: best.score,
            });
        }

        info!(
            week = %week,
            demands = demands.len(),
            placed = allocation.placed(),
            unplaced = allocation.unplaced,
            "allocation pass finished"
        );
        allocation
    }

    fn best_candidate(
        &self,
        demand: &SessionDemand,
        order: &[usize],
        supplies: &[TherapistSupply],
        counters: &DailyCounters,
        occupancy: &Occupancy,
        week: WeekStart,
    ) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;

        for &day in &demand.day_preferences {
            let date = week.date_for(day);
            let child_today = counters.child_sessions(demand.child_id, date);
            if child_today >= self.config.max_child_sessions_per_day {
                continue;
            }
            let child_windows = demand.windows_on(day);

            for &idx in order {
                let supply = &supplies[idx];
                let therapist_windows = supply.windows_on(day);
                if therapist_windows.is_empty() {
                    continue;
                }
                let therapist_today = counters.therapist_sessions(supply.therapist_id, date);
                if therapist_today >= self.config.max_therapist_sessions_per_day {
                    continue;
                }

                for slot in self.matcher.overlap(therapist_windows, &child_windows) {
                    if self.config.occupancy == OccupancyPolicy::TrackCommitted
                        && !occupancy.is_free(demand.child_id, supply.therapist_id, date, &slot)
                    {
                        continue;
                    }
                    let score = self.priority(supply, &slot, child_today, therapist_today);
                    if best.map_or(true, |b| score > b.score) {
                        best = Some(Candidate {
                            supply: idx,
                            date,
                            slot,
                            score,
                        });
                    }
                }
            }
        }

        best
    }

    /// Priority of placing a session in `slot` with this therapist.
    pub fn priority(
        &self,
        supply: &TherapistSupply,
        slot: &TimeWindow,
        child_sessions_today: u32,
        therapist_sessions_today: u32,
    ) -> i64 {
        let mut score = 100;
        score += (10 - i64::from(supply.current_load)) * 2;
        if slot.start < self.config.morning_cutoff {
            score += 5;
        }
        score += (3 - i64::from(child_sessions_today)).max(0);
        score += (6 - i64::from(therapist_sessions_today)).max(0);
        score
    }
}

impl Default for AllocationEngine {
    fn default() -> Self {
        Self::new(AllocationConfig::default())
    }
}
