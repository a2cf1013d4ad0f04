//! Selection of bookings due for a reminder.
//!
//! Two reminders exist per booking: an upcoming-appointment reminder sent
//! shortly before the start, and a daily reminder sent the day before or the
//! day of. Each has its own flag on the booking, so a batch that already ran
//! selects nothing the second time. Only confirmed bookings are reminded.
//!
//! `now` is always a naive time in the organization's default zone, the same
//! zone booking dates and times are stored in.

use chrono::{Days, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::ledger::BookingLedger;
use crate::model::{Booking, BookingStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// Sent within the reminder window before the booking starts.
    Upcoming,
    /// Sent once on the day before or the day of the booking.
    Daily,
}

/// Picks the bookings a reminder batch should notify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPlanner {
    window: Duration,
}

impl ReminderPlanner {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_window(config.reminder_window())
    }

    pub fn with_window(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Confirmed bookings not yet reminded whose start lies in `[now, now + window]`.
    pub fn due_reminders<'a>(&self, bookings: &'a [Booking], now: NaiveDateTime) -> Vec<&'a Booking> {
        let until = now.checked_add_signed(self.window).unwrap_or(now);
        bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Confirmed && !b.was_user_reminded)
            .filter(|b| b.start() >= now && b.start() <= until)
            .collect()
    }

    /// Confirmed bookings not yet daily-reminded, dated today or tomorrow,
    /// starting no earlier than the current time of day.
    pub fn due_daily_reminders<'a>(
        &self,
        bookings: &'a [Booking],
        now: NaiveDateTime,
    ) -> Vec<&'a Booking> {
        let today = now.date();
        let tomorrow = next_day(today);
        bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Confirmed && !b.was_user_reminded_daily)
            .filter(|b| b.date >= today && b.date <= tomorrow)
            .filter(|b| b.start_time >= now.time())
            .collect()
    }

    /// Run one reminder batch against `ledger`.
    ///
    /// `notify` is called once per due booking. Bookings whose notification
    /// succeeded are flagged as reminded; failures are logged and retried by
    /// the next batch. Returns the number of bookings flagged.
    pub fn dispatch<F>(
        &self,
        ledger: &BookingLedger,
        kind: ReminderKind,
        now: NaiveDateTime,
        mut notify: F,
    ) -> usize
    where
        F: FnMut(ReminderKind, &Booking) -> Result<()>,
    {
        let today = now.date();
        let horizon = match kind {
            ReminderKind::Upcoming => now.checked_add_signed(self.window).unwrap_or(now).date(),
            ReminderKind::Daily => next_day(today),
        };
        let candidates = ledger.bookings_between(today, horizon);
        let due = match kind {
            ReminderKind::Upcoming => self.due_reminders(&candidates, now),
            ReminderKind::Daily => self.due_daily_reminders(&candidates, now),
        };

        let mut sent: Vec<Uuid> = Vec::with_capacity(due.len());
        for booking in due {
            match notify(kind, booking) {
                Ok(()) => sent.push(booking.id),
                Err(e) => warn!(booking_id = %booking.id, ?kind, error = %e, "reminder not sent"),
            }
        }

        match kind {
            ReminderKind::Upcoming => ledger.mark_reminded(&sent),
            ReminderKind::Daily => ledger.mark_reminded_daily(&sent),
        }
        info!(?kind, count = sent.len(), %now, "reminder batch finished");
        sent.len()
    }
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(date)
}

// ── Tests ───────────────────────────────────────────────────────────────────
