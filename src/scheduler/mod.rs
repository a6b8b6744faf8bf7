//! Weekly session allocation.
//!
//! Turns children's department needs and therapists' availability into a
//! conflict-free set of assignments.
//!
//! # Pipeline
//!
//! 1. [`DemandModelBuilder`] expands needs into shuffled [`SessionDemand`]s.
//! 2. [`SupplyModelBuilder`] groups therapist windows by day and seeds
//!    fairness from historical load.
//! 3. [`AllocationEngine`] places demands greedily, using
//!    [`TimeWindowMatcher`] for candidate slots and [`DailyCounters`] /
//!    [`Occupancy`] for per-run bookkeeping.
//! 4. [`ConflictVerifier`] rejects any batch that double-books a therapist.
//! 5. [`ResultAggregator`] packages the outcome and the week overview.
//!
//! The engine is a greedy heuristic: it is fast and reproducible for a
//! given seed, but not optimal.

mod aggregate;
mod conflict;
mod demand;
mod engine;
mod matcher;
mod supply;
mod tracking;

pub use aggregate::{
    DaySchedule, GenerationOutcome, NameDirectory, OverviewEntry, ResultAggregator, SlotSchedule,
    TherapistLoad, UtilizationStatus, WeekAnalytics, WeekOverview,
};
pub use conflict::{Conflict, ConflictVerifier};
pub use demand::{DemandModelBuilder, SessionDemand};
pub use engine::{Allocation, AllocationEngine};
pub use matcher::TimeWindowMatcher;
pub use supply::{SupplyModelBuilder, TherapistSupply};
pub use tracking::{DailyCounters, Occupancy};
