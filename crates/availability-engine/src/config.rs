//! Engine configuration.
//!
//! Everything that used to be an ambient setting (the organization's
//! default zone, the reminder window, slot limits) lives in
//! [`EngineConfig`] and is handed to each component at construction.
//!
//! ## Environment Variables
//! - `AVAILABILITY_DEFAULT_TIMEZONE`: IANA zone bookings are stored in
//! - `AVAILABILITY_DEFAULT_STEP_MINUTES`: slot width when a query omits one
//! - `AVAILABILITY_MIN_STEP_MINUTES`: smallest slot width accepted
//! - `AVAILABILITY_MAX_RANGE_DAYS`: widest query window in days
//! - `AVAILABILITY_REMINDER_WINDOW_MINUTES`: look-ahead for reminders
//! - `AVAILABILITY_CONFLICT_POLICY`: `allow` or `reject`
//!
//! Missing variables keep their defaults.

use chrono::Duration;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Slot widths below this are never accepted, whatever the configuration says.
pub const STEP_FLOOR_MINUTES: i64 = 10;

/// Widest configurable slot: one whole day.
pub const MAX_STEP_MINUTES: i64 = 24 * 60;

/// Longest configurable reminder look-ahead: one week.
pub const MAX_REMINDER_WINDOW_MINUTES: i64 = 7 * 24 * 60;

/// Widest configurable query window.
pub const MAX_RANGE_DAYS_LIMIT: i64 = 366;

/// What the write path does when a booking overlaps an active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Store the booking anyway; overlaps surface in the availability grid.
    #[default]
    Allow,
    /// Refuse the write with [`EngineError::SlotConflict`].
    Reject,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "reject" => Ok(Self::Reject),
            other => Err(EngineError::Config(format!(
                "invalid conflict policy '{other}', expected 'allow' or 'reject'"
            ))),
        }
    }
}

/// Engine configuration, injected into every component that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// IANA zone naive booking dates and times are expressed in.
    pub default_timezone: String,
    pub default_step_minutes: i64,
    pub min_step_minutes: i64,
    pub max_range_days: i64,
    pub reminder_window_minutes: i64,
    pub conflict_policy: ConflictPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timezone: "Europe/London".to_string(),
            default_step_minutes: 30,
            min_step_minutes: STEP_FLOOR_MINUTES,
            max_range_days: 7,
            reminder_window_minutes: 60,
            conflict_policy: ConflictPolicy::Allow,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document. Keys that are absent keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the document is malformed or the
    /// resulting configuration fails [`EngineConfig::validate`].
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `AVAILABILITY_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if a variable is present but invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup, using the same keys as [`EngineConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(zone) = lookup("AVAILABILITY_DEFAULT_TIMEZONE") {
            config.default_timezone = zone.trim().to_string();
        }
        if let Some(v) = lookup("AVAILABILITY_DEFAULT_STEP_MINUTES") {
            config.default_step_minutes = parse_number("default step", &v)?;
        }
        if let Some(v) = lookup("AVAILABILITY_MIN_STEP_MINUTES") {
            config.min_step_minutes = parse_number("minimum step", &v)?;
        }
        if let Some(v) = lookup("AVAILABILITY_MAX_RANGE_DAYS") {
            config.max_range_days = parse_number("max range days", &v)?;
        }
        if let Some(v) = lookup("AVAILABILITY_REMINDER_WINDOW_MINUTES") {
            config.reminder_window_minutes = parse_number("reminder window", &v)?;
        }
        if let Some(v) = lookup("AVAILABILITY_CONFLICT_POLICY") {
            config.conflict_policy = v.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check field ranges and cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for an unknown default zone, a step
    /// outside `[10, 1440]` minutes, a default step under the minimum, a
    /// negative or over-limit range, or a reminder window outside one week.
    pub fn validate(&self) -> Result<()> {
        self.default_tz()?;
        check_range(
            "min_step_minutes",
            self.min_step_minutes,
            STEP_FLOOR_MINUTES,
            MAX_STEP_MINUTES,
        )?;
        check_range(
            "default_step_minutes",
            self.default_step_minutes,
            STEP_FLOOR_MINUTES,
            MAX_STEP_MINUTES,
        )?;
        if self.default_step_minutes < self.min_step_minutes {
            return Err(EngineError::Config(format!(
                "default_step_minutes ({}) is below min_step_minutes ({})",
                self.default_step_minutes, self.min_step_minutes
            )));
        }
        check_range("max_range_days", self.max_range_days, 0, MAX_RANGE_DAYS_LIMIT)?;
        check_range(
            "reminder_window_minutes",
            self.reminder_window_minutes,
            0,
            MAX_REMINDER_WINDOW_MINUTES,
        )?;
        Ok(())
    }

    /// The organization default zone, parsed.
    pub fn default_tz(&self) -> Result<Tz> {
        self.default_timezone
            .parse::<Tz>()
            .map_err(|_| {
                EngineError::Config(format!(
                    "unknown default timezone '{}'",
                    self.default_timezone
                ))
            })
    }

    // Accessors clamp to the validated ranges.

    pub fn default_step(&self) -> Duration {
        minutes_clamped(self.default_step_minutes, STEP_FLOOR_MINUTES, MAX_STEP_MINUTES)
    }

    pub fn min_step(&self) -> Duration {
        minutes_clamped(self.min_step_minutes, STEP_FLOOR_MINUTES, MAX_STEP_MINUTES)
    }

    pub fn reminder_window(&self) -> Duration {
        minutes_clamped(self.reminder_window_minutes, 0, MAX_REMINDER_WINDOW_MINUTES)
    }
}

fn minutes_clamped(value: i64, min: i64, max: i64) -> Duration {
    Duration::minutes(value.clamp(min, max))
}

fn check_range(field: &str, value: i64, min: i64, max: i64) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::Config(format!(
            "{field} must be between {min} and {max}, got {value}"
        )))
    }
}

fn parse_number(what: &str, raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|e| EngineError::Config(format!("invalid {what} '{raw}': {e}")))
}
