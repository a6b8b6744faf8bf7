//! Weekly therapy timetable generation.
//!
//! Allocates recurring therapy sessions to (child, therapist, time slot)
//! triples for one week, respecting availability windows, daily caps and
//! fairness across therapists.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Child`, `Therapist`, `AvailabilityWindow`,
//!   `WeekStart`, `TimeWindow`, `Assignment`, `Session`
//! - **`validation`**: Request and data integrity checks, capacity warnings,
//!   manual session edit checks
//! - **`scheduler`**: Demand/supply models, slot matching, the greedy
//!   allocation engine, conflict verification and result aggregation
//! - **`repository`**: The `DataRepository` collaborator, an in-memory
//!   store and a read-through cache
//! - **`generator`**: The end-to-end generation pipeline
//! - **`config`**: Layered configuration (defaults, `timetable.toml`, env)
//! - **`error`**: Failure taxonomy of a generation run
//!
//! # Algorithm
//!
//! Allocation is greedy and non-backtracking. Demands are shuffled with a
//! caller-supplied seed, then each is placed on the best-scoring slot among
//! the least-loaded therapists of its department. Results are reproducible
//! for a given seed and input, but not globally optimal.
//!
//! # Logging
//!
//! The crate emits `tracing` events and never installs a subscriber.

pub mod config;
pub mod error;
pub mod generator;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod validation;
