//! Overlap slots between two sets of availability windows.
//!
//! # Algorithm
//!
//! For every pair of windows (one from each side) the overlap
//! `[max(starts), min(ends))` is tiled into consecutive fixed-length slots
//! starting at the overlap's own start. A trailing remainder shorter than
//! one slot is dropped. Slots are anchored to each pairing rather than to
//! a wall-clock grid, so two pairings on the same day may produce slots
//! with different start offsets.
//!
//! # Complexity
//! O(a * b * s) where a, b = window counts, s = slots per overlap.

use chrono::TimeDelta;

use crate::models::TimeWindow;

/// Tiles window overlaps into fixed-length slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindowMatcher {
    slot: TimeDelta,
}

impl TimeWindowMatcher {
    /// Creates a matcher producing slots of `slot_minutes` minutes.
    ///
    /// A length that is not positive or does not fit a `TimeDelta` yields
    /// no slots at all.
    pub fn new(slot_minutes: i64) -> Self {
        Self {
            slot: TimeDelta::try_minutes(slot_minutes).unwrap_or_else(TimeDelta::zero),
        }
    }

    /// Slot length.
    pub fn slot(&self) -> TimeDelta {
        self.slot
    }

    /// Every full slot lying within both a window of `a` and a window of `b`.
    ///
    /// Slots are returned in pairing order: all slots of `(a[0], b[0])`,
    /// then `(a[0], b[1])`, and so on. Duplicates are kept when windows on
    /// one side overlap each other.
    pub fn overlap(&self, a: &[TimeWindow], b: &[TimeWindow]) -> Vec<TimeWindow> {
        let mut slots = Vec::new();
        for wa in a {
            for wb in b {
                if let Some(common) = wa.intersection(wb) {
                    self.tile(common, &mut slots);
                }
            }
        }
        slots
    }

    fn tile(&self, window: TimeWindow, out: &mut Vec<TimeWindow>) {
        if self.slot <= TimeDelta::zero() {
            return;
        }
        let mut start = window.start;
        loop {
            let (end, wrapped) = start.overflowing_add_signed(self.slot);
            // wrapped past midnight
            if wrapped != 0 || end > window.end {
                break;
            }
            out.push(TimeWindow::new(start, end));
            start = end;
        }
    }
}

impl Default for TimeWindowMatcher {
    fn default() -> Self {
        Self::new(60)
    }
}
