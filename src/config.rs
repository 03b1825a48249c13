//! Engine configuration.
//!
//! All fields have defaults, so an empty JSON object is a valid config.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grid::TimeGrid;
use crate::models::{DurationPolicy, MS_PER_MINUTE};

/// Timeline engine knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Grid column width (minutes).
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: i64,
    /// Floor applied to every reservation's effective duration (minutes).
    #[serde(default = "default_min_duration_minutes")]
    pub min_duration_minutes: i64,
    /// Duration used when neither the record nor its course define one (minutes).
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: i64,
    /// Highest turn number shown by the presentation layer. `None` = uncapped.
    #[serde(default = "default_rotation_display_cap")]
    pub rotation_display_cap: Option<u32>,
    /// Fixed column count. `None` derives it from the service hours.
    #[serde(default)]
    pub columns: Option<u32>,
}

fn default_slot_minutes() -> i64 {
    5
}

fn default_min_duration_minutes() -> i64 {
    5
}

fn default_duration_minutes() -> i64 {
    120
}

fn default_rotation_display_cap() -> Option<u32> {
    Some(3)
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            slot_minutes: default_slot_minutes(),
            min_duration_minutes: default_min_duration_minutes(),
            default_duration_minutes: default_duration_minutes(),
            rotation_display_cap: default_rotation_display_cap(),
            columns: None,
        }
    }
}

impl TimelineConfig {
    /// Parses and validates a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that all durations are positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("slot_minutes", self.slot_minutes),
            ("min_duration_minutes", self.min_duration_minutes),
            ("default_duration_minutes", self.default_duration_minutes),
        ] {
            if value <= 0 {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        Ok(())
    }

    /// Slot width in milliseconds.
    #[inline]
    pub fn slot_ms(&self) -> i64 {
        self.slot_minutes * MS_PER_MINUTE
    }

    /// Duration policy without a course resolver.
    pub fn duration_policy(&self) -> DurationPolicy {
        DurationPolicy::new()
            .with_default_duration_min(self.default_duration_minutes)
            .with_min_duration_min(self.min_duration_minutes)
    }

    /// Grid covering one service on `date`.
    pub fn time_grid(&self, date: NaiveDate, open: NaiveTime, close: NaiveTime) -> TimeGrid {
        let grid = TimeGrid::for_service(date, open, close, self.slot_ms());
        match self.columns {
            Some(columns) => TimeGrid { columns, ..grid },
            None => grid,
        }
    }
}
