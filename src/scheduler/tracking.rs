//! Per-run allocation bookkeeping.
//!
//! Counts and occupied windows are keyed by `(entity id, date)`. Lookups
//! never insert: a missing key reads as zero sessions or a free day.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::{ChildId, TherapistId, TimeWindow};

/// Sessions placed so far in the run, per child and per therapist per date.
#[derive(Debug, Clone, Default)]
pub struct DailyCounters {
    child: HashMap<(ChildId, NaiveDate), u32>,
    therapist: HashMap<(TherapistId, NaiveDate), u32>,
}

impl DailyCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions the child already has on `date` (0 if none).
    pub fn child_sessions(&self, child_id: ChildId, date: NaiveDate) -> u32 {
        self.child.get(&(child_id, date)).copied().unwrap_or(0)
    }

    /// Sessions the therapist already has on `date` (0 if none).
    pub fn therapist_sessions(&self, therapist_id: TherapistId, date: NaiveDate) -> u32 {
        self.therapist.get(&(therapist_id, date)).copied().unwrap_or(0)
    }

    /// Records one session for both parties.
    pub fn record(&mut self, child_id: ChildId, therapist_id: TherapistId, date: NaiveDate) {
        *self.child.entry((child_id, date)).or_insert(0) += 1;
        *self.therapist.entry((therapist_id, date)).or_insert(0) += 1;
    }
}

/// Windows committed so far in the run, per child and per therapist per date.
#[derive(Debug, Clone, Default)]
pub struct Occupancy {
    child: HashMap<(ChildId, NaiveDate), Vec<TimeWindow>>,
    therapist: HashMap<(TherapistId, NaiveDate), Vec<TimeWindow>>,
}

impl Occupancy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether neither party has a committed window overlapping `window`.
    pub fn is_free(
        &self,
        child_id: ChildId,
        therapist_id: TherapistId,
        date: NaiveDate,
        window: &TimeWindow,
    ) -> bool {
        let clear = |taken: Option<&Vec<TimeWindow>>| {
            taken.map_or(true, |ws| ws.iter().all(|w| !w.overlaps(window)))
        };
        clear(self.child.get(&(child_id, date))) && clear(self.therapist.get(&(therapist_id, date)))
    }

    /// Marks `window` as taken for both parties.
    pub fn commit(
        &mut self,
        child_id: ChildId,
        therapist_id: TherapistId,
        date: NaiveDate,
        window: TimeWindow,
    ) {
        self.child.entry((child_id, date)).or_default().push(window);
        self.therapist
            .entry((therapist_id, date))
            .or_default()
            .push(window);
    }
}
