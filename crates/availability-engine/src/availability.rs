//! The read entry point: an annotated slot grid for a scope and date range.
//!
//! [`AvailabilityService::get_availability`] validates the query, resolves
//! working hours when the query asks for them, expands the slot grid, makes
//! one batched booking fetch for the whole window and overlays the result.
//! If the fetch fails the whole call fails; a grid without booking data
//! would show every slot as free.

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::guard::{self, BookingCandidate};
use crate::model::{OwnerRef, Scope};
use crate::overlay::{annotate, AnnotatedSlot};
use crate::recurring::{effective_rules, RecurringHourRule};
use crate::slots::SlotExpander;
use crate::store::{BookingSource, RuleSource};

/// Date format accepted for query parameters.
pub const QUERY_DATE_FORMAT: &str = "%Y-%m-%d";

/// One availability request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityQuery {
    pub scope: Scope,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub step: Duration,
    /// Restrict the grid to the scope's working hours.
    pub working_hours: bool,
}

impl AvailabilityQuery {
    pub fn new(scope: Scope, start_date: NaiveDate, end_date: NaiveDate, step: Duration) -> Self {
        Self {
            scope,
            start_date,
            end_date,
            step,
            working_hours: false,
        }
    }

    pub fn with_working_hours(mut self) -> Self {
        self.working_hours = true;
        self
    }

    /// Build a query from raw request parameters.
    ///
    /// Dates are `YYYY-MM-DD`; `step_minutes` falls back to the configured
    /// default.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] if either date is missing or
    /// malformed.
    pub fn from_params(
        scope: Scope,
        start_date: Option<&str>,
        end_date: Option<&str>,
        step_minutes: Option<i64>,
        config: &EngineConfig,
    ) -> Result<Self> {
        let (Some(start), Some(end)) = (start_date, end_date) else {
            return Err(EngineError::InvalidArgument(
                "Both start_date and end_date are required".to_string(),
            ));
        };
        let step = match step_minutes {
            None => config.default_step(),
            Some(minutes) => Duration::try_minutes(minutes).ok_or_else(|| {
                EngineError::InvalidArgument(format!("step of {minutes} minutes is out of range"))
            })?,
        };
        Ok(Self::new(scope, parse_date(start)?, parse_date(end)?, step))
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), QUERY_DATE_FORMAT).map_err(|_| {
        EngineError::InvalidArgument(format!("invalid date '{raw}', expected YYYY-MM-DD"))
    })
}

/// Computes availability over injected rule and booking sources.
#[derive(Debug, Clone)]
pub struct AvailabilityService<R, B> {
    rules: R,
    bookings: B,
    config: EngineConfig,
}

impl<R: RuleSource, B: BookingSource> AvailabilityService<R, B> {
    pub fn new(rules: R, bookings: B, config: EngineConfig) -> Self {
        Self {
            rules,
            bookings,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The annotated slot grid for `query`, in chronological order.
    ///
    /// `today` drives the working-hours policy window and is ignored for
    /// unfiltered queries.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidArgument`] for an inverted range or a step
    ///   under the configured minimum, or an hours-filtered user scope.
    /// - [`EngineError::RangeTooLarge`] if the range spans more than
    ///   `max_range_days`.
    /// - Any error from the rule or booking source, unchanged.
    pub fn get_availability(
        &self,
        query: &AvailabilityQuery,
        today: NaiveDate,
    ) -> Result<Vec<AnnotatedSlot>> {
        self.validate(query)?;

        let mut grid = SlotExpander::new(query.start_date, query.end_date, query.step)?;
        if query.working_hours {
            grid = grid.with_hours(self.working_hours(&query.scope, today)?);
        }

        let mut bookings =
            self.bookings
                .fetch_active_bookings(&query.scope, query.start_date, query.end_date)?;
        bookings.retain(|b| query.scope.contains(b));

        let slots = annotate(&grid, &bookings);
        debug!(
            scope = ?query.scope,
            start = %query.start_date,
            end = %query.end_date,
            step_minutes = query.step.num_minutes(),
            working_hours = query.working_hours,
            bookings = bookings.len(),
            slots = slots.len(),
            "availability computed"
        );
        Ok(slots)
    }

    /// The working hours in force on `today` for a business scope.
    ///
    /// Rules come from the employee when the scope names one, otherwise from
    /// the business; the policy is always the business's.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] for a user scope, or any error
    /// from the rule source.
    pub fn working_hours(&self, scope: &Scope, today: NaiveDate) -> Result<Vec<RecurringHourRule>> {
        let Scope::Business {
            business_id,
            employee_id,
        } = *scope
        else {
            return Err(EngineError::InvalidArgument(
                "working hours need a business scope".to_string(),
            ));
        };
        let owner = employee_id.map_or(OwnerRef::Business(business_id), OwnerRef::Employee);
        let rules = self.rules.fetch_rules(owner)?;
        let policy = self.rules.fetch_policy(business_id)?;
        Ok(effective_rules(&rules, &policy, today))
    }

    /// Whether writing `candidate` would overlap an active booking in its scope.
    pub fn would_conflict(&self, candidate: &BookingCandidate) -> Result<bool> {
        let existing = self.bookings.fetch_active_bookings(
            &candidate.scope(),
            candidate.date,
            candidate.date,
        )?;
        Ok(guard::would_conflict(candidate, &existing))
    }

    /// Like [`AvailabilityService::would_conflict`], but an overlap is an error.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SlotConflict`] naming the overlapping bookings.
    pub fn check_candidate(&self, candidate: &BookingCandidate) -> Result<()> {
        let existing = self.bookings.fetch_active_bookings(
            &candidate.scope(),
            candidate.date,
            candidate.date,
        )?;
        guard::ensure_no_conflict(candidate, &existing)
    }

    fn validate(&self, query: &AvailabilityQuery) -> Result<()> {
        if query.end_date < query.start_date {
            return Err(EngineError::InvalidArgument(format!(
                "end date {} is before start date {}",
                query.end_date, query.start_date
            )));
        }
        let days = query
            .end_date
            .signed_duration_since(query.start_date)
            .num_days();
        if days > self.config.max_range_days {
            return Err(EngineError::RangeTooLarge {
                days,
                max_days: self.config.max_range_days,
            });
        }
        let min_step = self.config.min_step();
        if query.step < min_step {
            return Err(EngineError::InvalidArgument(format!(
                "step must be at least {} minutes, got {} minutes",
                min_step.num_minutes(),
                query.step.num_minutes()
            )));
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
