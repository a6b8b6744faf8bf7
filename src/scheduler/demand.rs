//! Demand model: one entry per session to place.
//!
//! Each child's department need expands into `sessions_per_week`
//! identical [`SessionDemand`] entries. The full list is shuffled with a
//! seeded generator so that no child is systematically favoured by input
//! order while runs stay reproducible for a given seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::models::{Child, ChildId, DayOfWeek, DepartmentId, TimeWindow, WeeklyWindow};

/// One session that still needs a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDemand {
    pub child_id: ChildId,
    pub child_name: String,
    pub department_id: DepartmentId,
    pub department_name: String,
    /// Days to try, in the order the child listed them.
    pub day_preferences: Vec<DayOfWeek>,
    /// Every availability window of the child.
    pub time_preferences: Vec<WeeklyWindow>,
}

impl SessionDemand {
    /// The child's windows on `day`.
    pub fn windows_on(&self, day: DayOfWeek) -> Vec<TimeWindow> {
        self.time_preferences
            .iter()
            .filter(|w| w.day == day)
            .map(|w| w.window)
            .collect()
    }
}

/// Expands children into a shuffled demand list.
#[derive(Debug, Clone, Copy)]
pub struct DemandModelBuilder {
    seed: u64,
}

impl DemandModelBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Builds the shuffled demand list.
    ///
    /// Needs asking for zero sessions contribute nothing. Windows with an
    /// unrecognized day are ignored.
    pub fn build(&self, children: &[Child]) -> Vec<SessionDemand> {
        let mut demands = Vec::new();

        for child in children {
            let day_preferences = child.available_days();
            let time_preferences = child.weekly_windows();
            let child_name = child.display_name();

            for need in &child.departments {
                for _ in 0..need.sessions_per_week {
                    demands.push(SessionDemand {
                        child_id: child.id,
                        child_name: child_name.clone(),
                        department_id: need.department_id,
                        department_name: need.department_name.clone(),
                        day_preferences: day_preferences.clone(),
                        time_preferences: time_preferences.clone(),
                    });
                }
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        demands.shuffle(&mut rng);
        demands
    }
}
