//! Read-side packaging of generation results.
//!
//! [`ResultAggregator`] collects warnings across a run and turns the end
//! state into a [`GenerationOutcome`]. It also builds the two read models:
//!
//! | Model | Contents |
//! |-------|----------|
//! | [`WeekOverview`] | Sessions grouped by day, then by `HH:MM-HH:MM` slot, with display names, per-therapist tally and total |
//! | [`WeekAnalytics`] | Per-therapist current vs previous load, utilization status, daily distribution, average per therapist |
//!
//! Neither model applies business rules; both are pure transformations of
//! stored sessions.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::generator::GenerationStage;
use crate::models::{
    ChildId, DayOfWeek, DepartmentId, Session, SessionId, Therapist, TherapistId, WeekStart,
};

const UNKNOWN: &str = "Unknown";

/// Display names for the ids found in stored sessions.
#[derive(Debug, Clone, Default)]
pub struct NameDirectory {
    pub children: HashMap<ChildId, String>,
    pub therapists: HashMap<TherapistId, String>,
    pub departments: HashMap<DepartmentId, String>,
}

impl NameDirectory {
    pub fn child(&self, id: ChildId) -> &str {
        self.children.get(&id).map_or(UNKNOWN, String::as_str)
    }

    pub fn therapist(&self, id: TherapistId) -> &str {
        self.therapists.get(&id).map_or(UNKNOWN, String::as_str)
    }

    pub fn department(&self, id: DepartmentId) -> &str {
        self.departments.get(&id).map_or(UNKNOWN, String::as_str)
    }
}

/// One session as shown in the timetable grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverviewEntry {
    pub session_id: SessionId,
    pub child_id: ChildId,
    pub child_name: String,
    pub therapist_id: TherapistId,
    pub therapist_name: String,
    pub department_id: DepartmentId,
    pub department_name: String,
}

/// All sessions sharing one time key on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSchedule {
    /// `HH:MM-HH:MM`.
    pub time: String,
    pub sessions: Vec<OverviewEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day: DayOfWeek,
    pub date: NaiveDate,
    pub slots: Vec<SlotSchedule>,
}

/// Timetable of one week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekOverview {
    pub week_starting: WeekStart,
    /// Flat session list ordered by date, start time and therapist.
    pub sessions: Vec<Session>,
    /// Grid: days in calendar order, slots in start-time order.
    pub days: Vec<DaySchedule>,
    pub therapist_loads: BTreeMap<TherapistId, usize>,
    pub total_sessions: usize,
}

impl WeekOverview {
    /// An overview with no sessions.
    pub fn empty(week_starting: WeekStart) -> Self {
        Self {
            week_starting,
            sessions: Vec::new(),
            days: Vec::new(),
            therapist_loads: BTreeMap::new(),
            total_sessions: 0,
        }
    }

    /// The grid column for `day`, if it has any session.
    pub fn day(&self, day: DayOfWeek) -> Option<&DaySchedule> {
        self.days.iter().find(|d| d.day == day)
    }
}

/// Load band of a therapist for one week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UtilizationStatus {
    High,
    Normal,
    Low,
}

impl UtilizationStatus {
    /// `High` above 20 sessions, `Normal` above 10, otherwise `Low`.
    pub fn from_sessions(sessions: u32) -> Self {
        if sessions > 20 {
            Self::High
        } else if sessions > 10 {
            Self::Normal
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TherapistLoad {
    pub therapist_id: TherapistId,
    pub therapist_name: String,
    pub department_id: Option<DepartmentId>,
    pub department_name: String,
    pub current_week_sessions: u32,
    pub previous_week_sessions: u32,
    pub load_change: i64,
    pub utilization_status: UtilizationStatus,
}

/// Load analytics for one week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekAnalytics {
    pub week_starting: WeekStart,
    pub total_sessions: usize,
    pub therapist_analytics: Vec<TherapistLoad>,
    /// Sessions per working day; every day is present.
    pub daily_distribution: BTreeMap<DayOfWeek, usize>,
    pub average_sessions_per_therapist: f64,
}

/// Result of a generation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOutcome {
    pub success: bool,
    pub sessions_created: usize,
    /// Generation-halting problems, in the order found.
    pub errors: Vec<String>,
    /// Non-fatal findings, in the order found.
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timetable_data: Option<WeekOverview>,
    /// Final stage: `Done` or `Failed`.
    pub stage: GenerationStage,
    /// Stage in progress when the run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<GenerationStage>,
}

/// Accumulates warnings during a run and packages its outcome.
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    warnings: Vec<String>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn extend_warnings(&mut self, messages: impl IntoIterator<Item = String>) {
        self.warnings.extend(messages);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Outcome of a run that persisted its batch.
    pub fn succeed(self, sessions_created: usize, overview: WeekOverview) -> GenerationOutcome {
        GenerationOutcome {
            success: true,
            sessions_created,
            errors: Vec::new(),
            warnings: self.warnings,
            timetable_data: Some(overview),
            stage: GenerationStage::Done,
            failed_at: None,
        }
    }

    /// Outcome of a run that stopped at `stage`. Nothing counts as created.
    pub fn fail(self, error: &GenerationError, stage: GenerationStage) -> GenerationOutcome {
        GenerationOutcome {
            success: false,
            sessions_created: 0,
            errors: error.messages(),
            warnings: self.warnings,
            timetable_data: None,
            stage: GenerationStage::Failed,
            failed_at: Some(stage),
        }
    }

    /// Groups a week's sessions into the timetable grid.
    pub fn overview(week: WeekStart, sessions: &[Session], names: &NameDirectory) -> WeekOverview {
        let mut sessions: Vec<Session> = sessions.to_vec();
        sessions.sort_by_key(|s| (s.date, s.start_time, s.end_time, s.therapist_id, s.id));

        let mut therapist_loads = BTreeMap::new();
        let mut days: Vec<DaySchedule> = Vec::new();

        for session in &sessions {
            *therapist_loads.entry(session.therapist_id).or_insert(0) += 1;

            let Some(day) = DayOfWeek::from_weekday(session.date.weekday()) else {
                continue;
            };
            if days.last().map_or(true, |d| d.date != session.date) {
                days.push(DaySchedule {
                    day,
                    date: session.date,
                    slots: Vec::new(),
                });
            }
            let Some(column) = days.last_mut() else {
                continue;
            };

            let time = session.window().key();
            if column.slots.last().map_or(true, |s| s.time != time) {
                column.slots.push(SlotSchedule {
                    time,
                    sessions: Vec::new(),
                });
            }
            if let Some(slot) = column.slots.last_mut() {
                slot.sessions.push(OverviewEntry {
                    session_id: session.id,
                    child_id: session.child_id,
                    child_name: names.child(session.child_id).to_string(),
                    therapist_id: session.therapist_id,
                    therapist_name: names.therapist(session.therapist_id).to_string(),
                    department_id: session.department_id,
                    department_name: names.department(session.department_id).to_string(),
                });
            }
        }

        WeekOverview {
            week_starting: week,
            total_sessions: sessions.len(),
            sessions,
            days,
            therapist_loads,
        }
    }

    /// Per-therapist load comparison and daily distribution for a week.
    ///
    /// `sessions` are the sessions of `week`; loads missing from either
    /// map count as zero.
    pub fn analytics(
        week: WeekStart,
        therapists: &[Therapist],
        current_week_loads: &HashMap<TherapistId, u32>,
        previous_week_loads: &HashMap<TherapistId, u32>,
        sessions: &[Session],
    ) -> WeekAnalytics {
        let therapist_analytics: Vec<TherapistLoad> = therapists
            .iter()
            .map(|t| {
                let current = current_week_loads.get(&t.id).copied().unwrap_or(0);
                let previous = previous_week_loads.get(&t.id).copied().unwrap_or(0);
                TherapistLoad {
                    therapist_id: t.id,
                    therapist_name: t.display_name(),
                    department_id: t.department_id,
                    department_name: t.department_name.clone(),
                    current_week_sessions: current,
                    previous_week_sessions: previous,
                    load_change: i64::from(current) - i64::from(previous),
                    utilization_status: UtilizationStatus::from_sessions(current),
                }
            })
            .collect();

        let mut daily_distribution: BTreeMap<DayOfWeek, usize> =
            DayOfWeek::ALL.iter().map(|&d| (d, 0)).collect();
        for session in sessions {
            if let Some(day) = DayOfWeek::from_weekday(session.date.weekday()) {
                *daily_distribution.entry(day).or_insert(0) += 1;
            }
        }

        let average_sessions_per_therapist = if therapists.is_empty() {
            0.0
        } else {
            sessions.len() as f64 / therapists.len() as f64
        };

        WeekAnalytics {
            week_starting: week,
            total_sessions: sessions.len(),
            therapist_analytics,
            daily_distribution,
            average_sessions_per_therapist,
        }
    }
}
