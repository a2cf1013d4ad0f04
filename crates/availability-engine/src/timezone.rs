//! Display-time conversion of naive booking times.
//!
//! Booking dates and times are stored naive, in the organization's default
//! zone. [`TimeZoner`] renders them in a viewer's zone. Conversion is total:
//! missing inputs render as empty strings, and an unknown target zone falls
//! back to the default zone with a warning. Displaying a booking must never
//! fail.

use std::fmt::Write;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::model::Booking;

/// 12-hour clock, e.g. `"02:30 PM"`.
pub const TIME_FORMAT: &str = "%I:%M %p";

/// Day-first date, e.g. `"03/06/2024"`.
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

/// A time range rendered in a target zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimeRangeDisplay {
    pub start: String,
    pub end: String,
    /// `"{start} - {end}"`.
    pub range: String,
}

/// Converts naive default-zone times for display in arbitrary zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeZoner {
    default_tz: Tz,
}

impl TimeZoner {
    pub fn new(default_tz: Tz) -> Self {
        Self { default_tz }
    }

    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the configured default zone is unknown.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self::new(config.default_tz()?))
    }

    pub fn default_tz(&self) -> Tz {
        self.default_tz
    }

    /// Resolve a target zone name, falling back to the default zone.
    ///
    /// `None` and blank names select the default silently; names that are not
    /// IANA zones select it with a warning.
    pub fn resolve(&self, name: Option<&str>) -> Tz {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            None => self.default_tz,
            Some(n) => parse_timezone(n).unwrap_or_else(|_| {
                warn!(
                    timezone = n,
                    fallback = self.default_tz.name(),
                    "unknown timezone, falling back to default"
                );
                self.default_tz
            }),
        }
    }

    /// Render `start_time`–`end_time` on `date` in the target zone.
    ///
    /// Returns empty strings if any of the three inputs is missing.
    pub fn to_zone(
        &self,
        date: Option<NaiveDate>,
        start_time: Option<NaiveTime>,
        end_time: Option<NaiveTime>,
        target: Option<&str>,
    ) -> TimeRangeDisplay {
        let (Some(date), Some(start_time), Some(end_time)) = (date, start_time, end_time) else {
            return TimeRangeDisplay::default();
        };
        let tz = self.resolve(target);

        let start = localize(&self.default_tz, date.and_time(start_time)).with_timezone(&tz);
        let end = localize(&self.default_tz, date.and_time(end_time)).with_timezone(&tz);

        let start = format_or_empty(&start, TIME_FORMAT);
        let end = format_or_empty(&end, TIME_FORMAT);
        let range = format!("{start} - {end}");

        debug!(%date, target = tz.name(), range = %range, "converted time range");
        TimeRangeDisplay { start, end, range }
    }

    /// Render `date` in the target zone using a strftime `format`.
    ///
    /// The date is anchored at `reference_time` (local noon when absent) before
    /// conversion, so a late booking may render as the next day in a zone ahead
    /// of the default. Noon keeps DST transitions, which happen at night, from
    /// flipping the day. An invalid `format` falls back to
    /// [`DEFAULT_DATE_FORMAT`].
    pub fn to_zone_date(
        &self,
        date: Option<NaiveDate>,
        reference_time: Option<NaiveTime>,
        target: Option<&str>,
        format: &str,
    ) -> String {
        let Some(date) = date else {
            return String::new();
        };
        let tz = self.resolve(target);
        let reference_time = reference_time.unwrap_or_else(noon);
        let local = localize(&self.default_tz, date.and_time(reference_time)).with_timezone(&tz);

        let mut out = String::new();
        if write!(out, "{}", local.format(format)).is_err() {
            warn!(format, "invalid date format, using default");
            return format_or_empty(&local, DEFAULT_DATE_FORMAT);
        }
        out
    }

    // ── Booking display ─────────────────────────────────────────────────

    /// The booking's date as seen by a user in `user_tz`.
    pub fn booking_date_str(&self, booking: &Booking, user_tz: Option<&str>) -> String {
        self.to_zone_date(
            Some(booking.date),
            Some(booking.start_time),
            user_tz,
            DEFAULT_DATE_FORMAT,
        )
    }

    /// The booking's time range as seen by a user in `user_tz`.
    pub fn booking_time_str(&self, booking: &Booking, user_tz: Option<&str>) -> String {
        self.to_zone(
            Some(booking.date),
            Some(booking.start_time),
            Some(booking.end_time),
            user_tz,
        )
        .range
    }

    /// Just the booking's start time as seen by a user in `user_tz`.
    pub fn booking_start_time_str(&self, booking: &Booking, user_tz: Option<&str>) -> String {
        self.to_zone(
            Some(booking.date),
            Some(booking.start_time),
            Some(booking.start_time),
            user_tz,
        )
        .start
    }
}

/// Parse an IANA timezone string into `Tz`.
///
/// # Errors
///
/// Returns [`EngineError::UnknownTimezone`] if `s` is not a known zone.
pub fn parse_timezone(s: &str) -> Result<Tz> {
    s.parse::<Tz>()
        .map_err(|_| EngineError::UnknownTimezone(format!("'{}'", s)))
}

// ── Internal helpers ────────────────────────────────────────────────────────

fn noon() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default()
}

/// Attach `tz` to a naive local datetime.
///
/// Ambiguous times (the repeated hour when clocks go back) resolve to the
/// standard-time reading, which is the later instant. Times inside a
/// spring-forward gap are read with the pre-transition offset, i.e. shifted
/// forward past the gap.
fn localize(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    tz.from_local_datetime(&naive)
        .latest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

fn format_or_empty(dt: &DateTime<Tz>, format: &str) -> String {
    let mut out = String::new();
    match write!(out, "{}", dt.format(format)) {
        Ok(()) => out,
        Err(_) => String::new(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
