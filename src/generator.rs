//! Timetable generation pipeline.
//!
//! One call to [`TimetableGenerator::generate`] runs the stages
//!
//! ```text
//! Received -> Validated -> (Cleared) -> Built -> Allocating -> Verified -> Done
//!     \___________\____________\__________\__________\____________\-> Failed
//! ```
//!
//! Expected failures (bad request, bad data, conflicts, rejected writes)
//! come back as a failed [`GenerationOutcome`]; the call itself never
//! panics or returns `Err`. All allocation state lives inside one call, so
//! runs for different weeks can share a generator.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SchedulingConfig;
use crate::error::GenerationError;
use crate::models::{Assignment, ChildId, TherapistId, WeekStart};
use crate::repository::DataRepository;
use crate::scheduler::{
    AllocationEngine, ConflictVerifier, DemandModelBuilder, ResultAggregator, SupplyModelBuilder,
    WeekOverview,
};
use crate::validation::{DataValidator, RequestValidator};

pub use crate::scheduler::GenerationOutcome;

/// A request to generate one week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Must be a Monday.
    pub week_starting: NaiveDate,
    pub active_children: Vec<ChildId>,
    pub active_therapists: Vec<TherapistId>,
    /// Replace sessions already stored for the week.
    #[serde(default)]
    pub regenerate_existing: bool,
}

impl GenerationRequest {
    pub fn new(
        week_starting: NaiveDate,
        active_children: Vec<ChildId>,
        active_therapists: Vec<TherapistId>,
    ) -> Self {
        Self {
            week_starting,
            active_children,
            active_therapists,
            regenerate_existing: false,
        }
    }

    pub fn regenerate(mut self) -> Self {
        self.regenerate_existing = true;
        self
    }
}

/// Progress of one generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStage {
    Received,
    Validated,
    Cleared,
    Built,
    Allocating,
    Verified,
    Done,
    Failed,
}

impl GenerationStage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Cleared => "cleared",
            Self::Built => "built",
            Self::Allocating => "allocating",
            Self::Verified => "verified",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether a run may move from `self` to `next`.
    pub fn can_advance_to(self, next: Self) -> bool {
        use GenerationStage::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Received, Validated)
            | (Validated, Cleared)
            | (Validated, Built)
            | (Cleared, Built)
            | (Built, Allocating)
            | (Allocating, Verified)
            | (Verified, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stage tracker of a single run.
#[derive(Debug)]
struct Run {
    stage: GenerationStage,
}

impl Run {
    fn advance(&mut self, next: GenerationStage) -> Result<(), GenerationError> {
        if !self.stage.can_advance_to(next) {
            return Err(GenerationError::engine(format!(
                "illegal stage transition {} -> {next}",
                self.stage
            )));
        }
        debug!(from = %self.stage, to = %next, "stage transition");
        self.stage = next;
        Ok(())
    }
}

/// Generates weekly timetables against a repository.
///
/// # Example
///
/// ```
/// use chrono::{NaiveDate, NaiveTime};
/// use therapy_timetable::config::SchedulingConfig;
/// use therapy_timetable::generator::{GenerationRequest, TimetableGenerator};
/// use therapy_timetable::models::{AvailabilityWindow, Child, DayOfWeek, DepartmentNeed, Therapist};
/// use therapy_timetable::repository::InMemoryRepository;
///
/// let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
/// let eleven = NaiveTime::from_hms_opt(11, 0, 0).unwrap();
///
/// let repo = InMemoryRepository::new();
/// repo.add_child(
///     Child::new(1, "Ada")
///         .with_need(DepartmentNeed::new(10, "Speech", 1))
///         .with_availability(AvailabilityWindow::new(DayOfWeek::Monday, nine, eleven)),
/// );
/// repo.add_therapist(
///     Therapist::new(5, "Dr. Lee", 10, "Speech")
///         .with_availability(AvailabilityWindow::new(DayOfWeek::Monday, nine, eleven)),
/// );
///
/// let generator = TimetableGenerator::new(repo, SchedulingConfig::default(), 42);
/// let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let outcome = generator.generate(&GenerationRequest::new(monday, vec![1], vec![5]));
///
/// assert!(outcome.success);
/// assert_eq!(outcome.sessions_created, 1);
/// ```
#[derive(Debug)]
pub struct TimetableGenerator<R> {
    repository: R,
    config: SchedulingConfig,
    seed: u64,
}

impl<R: DataRepository> TimetableGenerator<R> {
    /// Creates a generator. `seed` fixes the demand order of every run.
    pub fn new(repository: R, config: SchedulingConfig, seed: u64) -> Self {
        Self {
            repository,
            config,
            seed,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    /// Runs the whole pipeline for one week.
    pub fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let mut aggregator = ResultAggregator::new();
        let mut run = Run {
            stage: GenerationStage::Received,
        };

        match self.execute(request, &mut run, &mut aggregator) {
            Ok((created, overview)) => {
                info!(
                    week = %overview.week_starting,
                    created,
                    warnings = aggregator.warnings().len(),
                    "timetable generated"
                );
                aggregator.succeed(created, overview)
            }
            Err(err) => {
                if err.is_request_error() {
                    info!(
                        week = %request.week_starting,
                        error = %err,
                        "generation request rejected"
                    );
                } else {
                    warn!(
                        week = %request.week_starting,
                        stage = %run.stage,
                        error = %err,
                        "timetable generation failed"
                    );
                }
                aggregator.fail(&err, run.stage)
            }
        }
    }

    fn execute(
        &self,
        request: &GenerationRequest,
        run: &mut Run,
        aggregator: &mut ResultAggregator,
    ) -> Result<(usize, WeekOverview), GenerationError> {
        let week = RequestValidator::new(&self.config).validate(request, &self.repository)?;
        run.advance(GenerationStage::Validated)?;
        info!(
            week = %week,
            children = request.active_children.len(),
            therapists = request.active_therapists.len(),
            "generation request accepted"
        );

        if request.regenerate_existing {
            let removed = self
                .repository
                .clear_week(week)
                .map_err(GenerationError::engine)?;
            if removed > 0 {
                aggregator.warn(format!("Cleared {removed} existing sessions"));
            }
            run.advance(GenerationStage::Cleared)?;
        }

        let assignments = self.build_and_allocate(request, week, run, aggregator)?;

        ConflictVerifier::verify(&assignments).map_err(GenerationError::Conflict)?;
        run.advance(GenerationStage::Verified)?;

        let created = self
            .repository
            .bulk_create_sessions(&assignments)
            .map_err(GenerationError::Persistence)?;
        let overview = self
            .repository
            .week_overview(week)
            .map_err(GenerationError::engine)?;
        run.advance(GenerationStage::Done)?;

        Ok((created, overview))
    }

    fn build_and_allocate(
        &self,
        request: &GenerationRequest,
        week: WeekStart,
        run: &mut Run,
        aggregator: &mut ResultAggregator,
    ) -> Result<Vec<Assignment>, GenerationError> {
        let children = self
            .repository
            .fetch_active_children_with_needs(&request.active_children)
            .map_err(GenerationError::engine)?;
        let therapists = self
            .repository
            .fetch_available_therapists_with_schedule(&request.active_therapists)
            .map_err(GenerationError::engine)?;

        let report = DataValidator::new(&self.config)
            .validate(&children, &therapists)
            .map_err(GenerationError::DataIntegrity)?;
        aggregator.extend_warnings(report.warnings);

        let previous = self
            .repository
            .previous_week_loads(week)
            .map_err(GenerationError::engine)?;
        let current = self
            .repository
            .current_week_loads(week)
            .map_err(GenerationError::engine)?;

        let demands = DemandModelBuilder::new(self.seed).build(&children);
        let supplies = SupplyModelBuilder::new().build(&therapists, &previous, &current);
        run.advance(GenerationStage::Built)?;
        debug!(
            week = %week,
            demands = demands.len(),
            therapists = supplies.len(),
            "models built"
        );

        run.advance(GenerationStage::Allocating)?;
        let allocation =
            AllocationEngine::new(self.config.allocation.clone()).allocate(&demands, supplies, week);
        aggregator.extend_warnings(allocation.warnings);

        Ok(allocation.schedule.into_assignments())
    }
}
