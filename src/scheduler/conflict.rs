//! Therapist double-booking detection.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Assignment, TherapistId, TimeWindow};

/// Two sessions of one therapist that overlap on the same date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub therapist_id: TherapistId,
    pub date: NaiveDate,
    /// The earlier-starting session.
    pub first: TimeWindow,
    pub second: TimeWindow,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Therapist {} has overlapping sessions on {}: {} and {}",
            self.therapist_id, self.date, self.first, self.second
        )
    }
}

/// Checks a batch of assignments for therapist overlaps.
///
/// Assignments are grouped by `(therapist, date)` and sorted by start
/// time; each adjacent pair whose first window ends after the second one
/// starts is reported. Touching windows are fine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictVerifier;

impl ConflictVerifier {
    /// Returns every adjacent overlap, ordered by therapist, date and time.
    pub fn find_conflicts(assignments: &[Assignment]) -> Vec<Conflict> {
        let mut groups: BTreeMap<(TherapistId, NaiveDate), Vec<TimeWindow>> = BTreeMap::new();
        for a in assignments {
            groups
                .entry((a.therapist_id, a.date))
                .or_default()
                .push(a.window());
        }

        let mut conflicts = Vec::new();
        for ((therapist_id, date), mut windows) in groups {
            windows.sort_by_key(|w| (w.start, w.end));
            for pair in windows.windows(2) {
                if pair[0].end > pair[1].start {
                    conflicts.push(Conflict {
                        therapist_id,
                        date,
                        first: pair[0],
                        second: pair[1],
                    });
                }
            }
        }
        conflicts
    }

    /// `Ok` when the batch has no therapist overlap.
    pub fn verify(assignments: &[Assignment]) -> Result<(), Vec<Conflict>> {
        let conflicts = Self::find_conflicts(assignments);
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(conflicts)
        }
    }
}
