//! Timetable domain models.
//!
//! Provides the data types for weekly therapy timetabling: children with
//! department needs, therapists with availability, and the sessions placed
//! between them.
//!
//! # Domain Mappings
//!
//! | therapy-timetable | Generic scheduling |
//! |-------------------|--------------------|
//! | Child | Task / demand owner |
//! | DepartmentNeed | Recurring activity requirement |
//! | Therapist | Resource |
//! | AvailabilityWindow | Calendar window |
//! | Assignment / Session | Assignment |

mod calendar;
mod child;
mod schedule;
mod therapist;

pub use calendar::{
    AvailabilityWindow, DayOfWeek, NotMonday, TimeWindow, UnknownDay, WeekStart, WeeklyWindow,
};
pub use child::{Child, DepartmentNeed};
pub use schedule::{Assignment, Schedule, Session, SessionUpdate};
pub use therapist::Therapist;

/// Child identifier.
pub type ChildId = u32;
/// Therapist identifier.
pub type TherapistId = u32;
/// Department identifier.
pub type DepartmentId = u32;
/// Persisted session identifier.
pub type SessionId = u64;
