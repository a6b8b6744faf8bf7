//! Layered configuration for timetable generation.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`TIMETABLE_*` prefix, `__` as separator)
//! 2. `timetable.toml` in the working directory
//! 3. Built-in defaults
//!
//! Figment maps `TIMETABLE_ALLOCATION__SLOT_MINUTES` -> `allocation.slot_minutes`,
//! `TIMETABLE_HOURS__START` -> `hours.start`, etc.
//!
//! ```no_run
//! use therapy_timetable::config::SchedulingConfig;
//!
//! let config = SchedulingConfig::load().expect("config");
//! assert!(config.allocation.slot_minutes > 0);
//! ```

use chrono::NaiveTime;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "timetable.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "TIMETABLE_";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction or merge error.
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    /// A configuration field has an invalid value.
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Working hours and accepted availability window lengths.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub min_window_minutes: i64,
    pub max_window_minutes: i64,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: hm(8, 0),
            end: hm(16, 0),
            min_window_minutes: 30,
            max_window_minutes: 120,
        }
    }
}

/// How the allocator treats slots already taken earlier in the same run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyPolicy {
    /// Skip slots overlapping a session committed earlier in the run for the
    /// same therapist or the same child.
    #[default]
    TrackCommitted,
    /// Only daily caps are checked during allocation; overlaps are left for
    /// the conflict verifier, which rejects the whole batch.
    VerifierOnly,
}

/// Allocation engine settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AllocationConfig {
    /// Length of one session slot.
    pub slot_minutes: i64,
    pub max_child_sessions_per_day: u32,
    pub max_therapist_sessions_per_day: u32,
    /// Slots starting before this time get the morning bonus.
    pub morning_cutoff: NaiveTime,
    pub occupancy: OccupancyPolicy,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            slot_minutes: 60,
            max_child_sessions_per_day: 5,
            max_therapist_sessions_per_day: 8,
            morning_cutoff: hm(12, 0),
            occupancy: OccupancyPolicy::TrackCommitted,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RequestLimits {
    pub max_children_per_request: usize,
    pub max_therapists_per_request: usize,
    pub max_child_weekly_sessions: u32,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_children_per_request: 50,
            max_therapists_per_request: 20,
            max_child_weekly_sessions: 25,
        }
    }
}

/// Capacity estimation used for warnings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CapacityConfig {
    /// Fraction of available hours that can be booked.
    pub efficiency: f64,
    /// Demand above this fraction of capacity is reported as high utilization.
    pub high_utilization_ratio: f64,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            efficiency: 0.8,
            high_utilization_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SchedulingConfig {
    #[serde(default)]
    pub hours: WorkingHours,
    #[serde(default)]
    pub allocation: AllocationConfig,
    #[serde(default)]
    pub limits: RequestLimits,
    #[serde(default)]
    pub capacity: CapacityConfig,
}

impl SchedulingConfig {
    /// Load configuration from defaults, `timetable.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Extract and check a configuration from an arbitrary figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the provider chain.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if Path::new(CONFIG_FILE).exists() {
            figment = figment.merge(Toml::file(CONFIG_FILE));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Rejects values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hours.start >= self.hours.end {
            return Err(invalid("hours.start", "must be earlier than hours.end"));
        }
        if self.hours.min_window_minutes > self.hours.max_window_minutes {
            return Err(invalid(
                "hours.min_window_minutes",
                "must not exceed hours.max_window_minutes",
            ));
        }
        if self.allocation.slot_minutes <= 0 {
            return Err(invalid("allocation.slot_minutes", "must be positive"));
        }
        let working_minutes = (self.hours.end - self.hours.start).num_minutes();
        if self.allocation.slot_minutes > working_minutes {
            return Err(invalid(
                "allocation.slot_minutes",
                "must not exceed the working day",
            ));
        }
        if !(0.0..=1.0).contains(&self.capacity.efficiency) {
            return Err(invalid("capacity.efficiency", "must be within 0.0..=1.0"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
