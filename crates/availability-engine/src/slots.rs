//! Expand a date range into a grid of fixed-width slots.
//!
//! Each day from midnight to the following midnight is cut into slots of
//! `step`, in chronological order, day-major. A slot is emitted only if it
//! ends by the following midnight, so when `step` does not divide a day the
//! trailing partial slot is dropped rather than truncated.
//!
//! The grid is lazy and restartable: [`SlotExpander::iter`] can be called any
//! number of times and always yields the same sequence.

use chrono::{Days, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::config::STEP_FLOOR_MINUTES;
use crate::error::{EngineError, Result};
use crate::model::DayOfWeek;
use crate::recurring::{RecurringHourRule, RuleSet};

/// One fixed-width interval within a calendar day.
///
/// `end_time` is `00:00:00` for the last slot of a day; [`Slot::end`] places
/// that on the following date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Slot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl Slot {
    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn end(&self) -> NaiveDateTime {
        let end = self.date.and_time(self.end_time);
        if end <= self.start() {
            end.checked_add_days(Days::new(1)).unwrap_or(end)
        } else {
            end
        }
    }
}

/// A restartable slot grid over `[start_date, end_date]`.
#[derive(Debug, Clone)]
pub struct SlotExpander {
    start_date: NaiveDate,
    end_date: NaiveDate,
    step: Duration,
    hours: Option<RuleSet>,
}

impl SlotExpander {
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] if `step` is under ten minutes
    /// or `end_date` precedes `start_date`.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, step: Duration) -> Result<Self> {
        if step < Duration::minutes(STEP_FLOOR_MINUTES) {
            return Err(EngineError::InvalidArgument(format!(
                "step must be at least {STEP_FLOOR_MINUTES} minutes, got {} minutes",
                step.num_minutes()
            )));
        }
        if end_date < start_date {
            return Err(EngineError::InvalidArgument(format!(
                "end date {end_date} is before start date {start_date}"
            )));
        }
        Ok(Self {
            start_date,
            end_date,
            step,
            hours: None,
        })
    }

    /// Keep only slots that fall entirely inside one of `rules` for their
    /// weekday. An empty rule list filters out every slot.
    pub fn with_hours<I: IntoIterator<Item = RecurringHourRule>>(mut self, rules: I) -> Self {
        self.hours = Some(rules.into_iter().collect());
        self
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn iter(&self) -> Slots<'_> {
        Slots {
            expander: self,
            day: Some(self.start_date),
            cursor: midnight(self.start_date),
        }
    }

    fn admits(&self, slot: &Slot) -> bool {
        match &self.hours {
            None => true,
            Some(rules) => rules
                .for_day(DayOfWeek::of(slot.date))
                .any(|r| r.covers(slot.start(), slot.end())),
        }
    }
}

impl<'a> IntoIterator for &'a SlotExpander {
    type Item = Slot;
    type IntoIter = Slots<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`SlotExpander`]'s grid.
#[derive(Debug, Clone)]
pub struct Slots<'a> {
    expander: &'a SlotExpander,
    day: Option<NaiveDate>,
    cursor: NaiveDateTime,
}

impl Iterator for Slots<'_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        loop {
            let day = self.day?;
            let day_end = midnight(day).checked_add_days(Days::new(1))?;

            match self.cursor.checked_add_signed(self.expander.step) {
                Some(next) if next <= day_end => {
                    let slot = Slot {
                        date: day,
                        start_time: self.cursor.time(),
                        end_time: next.time(),
                    };
                    self.cursor = next;
                    if self.expander.admits(&slot) {
                        return Some(slot);
                    }
                }
                _ => {
                    self.day = day.succ_opt().filter(|d| *d <= self.expander.end_date);
                    if let Some(next_day) = self.day {
                        self.cursor = midnight(next_day);
                    }
                }
            }
        }
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::default())
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_single_day_half_hour_grid() {
        let grid = SlotExpander::new(d(2024, 6, 3), d(2024, 6, 3), Duration::minutes(30)).unwrap();
        let slots: Vec<Slot> = grid.iter().collect();
        assert_eq!(slots.len(), 48);

        assert_eq!(slots[0].start_time, t(0, 0));
        assert_eq!(slots[0].end_time, t(0, 30));
        assert_eq!(slots[20].start_time, t(10, 0));
        assert_eq!(slots[20].end_time, t(10, 30));

        let last = slots[47];
        assert_eq!(last.start_time, t(23, 30));
        assert_eq!(last.end_time, t(0, 0));
        assert_eq!(last.end(), d(2024, 6, 4).and_time(t(0, 0)));
    }

    #[test]
    fn test_multi_day_count() {
        let grid = SlotExpander::new(d(2024, 6, 3), d(2024, 6, 5), Duration::minutes(60)).unwrap();
        assert_eq!(grid.iter().count(), 3 * 24);
        assert!(grid.iter().all(|s| s.date >= d(2024, 6, 3) && s.date <= d(2024, 6, 5)));
    }

    #[test]
    fn test_non_dividing_step_drops_trailing_partial() {
        // 1440 / 25 = 57.6 → 57 whole slots per day
        let grid = SlotExpander::new(d(2024, 6, 3), d(2024, 6, 4), Duration::minutes(25)).unwrap();
        let slots: Vec<Slot> = grid.iter().collect();
        assert_eq!(slots.len(), 2 * 57);

        let last_of_first_day = slots[56];
        assert_eq!(last_of_first_day.start_time, t(23, 20));
        assert_eq!(last_of_first_day.end_time, t(23, 45));
        assert!(slots.iter().all(|s| s.end() - s.start() == Duration::minutes(25)));

        // Second day restarts at midnight, not at 23:45 + 25m
        assert_eq!(slots[57].date, d(2024, 6, 4));
        assert_eq!(slots[57].start_time, t(0, 0));
    }

    #[test]
    fn test_step_below_floor_rejected() {
        let err = SlotExpander::new(d(2024, 6, 3), d(2024, 6, 3), Duration::minutes(5)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert!(err.to_string().contains("at least 10 minutes"), "got: {err}");
        assert!(SlotExpander::new(d(2024, 6, 3), d(2024, 6, 3), Duration::minutes(10)).is_ok());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = SlotExpander::new(d(2024, 6, 4), d(2024, 6, 3), Duration::minutes(30)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn test_step_longer_than_day_yields_nothing() {
        let grid = SlotExpander::new(d(2024, 6, 3), d(2024, 6, 5), Duration::hours(25)).unwrap();
        assert_eq!(grid.iter().count(), 0);
    }

    #[test]
    fn test_whole_day_step() {
        let grid = SlotExpander::new(d(2024, 6, 3), d(2024, 6, 4), Duration::days(1)).unwrap();
        let slots: Vec<Slot> = grid.iter().collect();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].start_time, t(0, 0));
        assert_eq!(slots[0].end_time, t(0, 0));
        assert_eq!(slots[0].end(), d(2024, 6, 4).and_time(t(0, 0)));
    }

    #[test]
    fn test_restartable() {
        let grid = SlotExpander::new(d(2024, 6, 3), d(2024, 6, 4), Duration::minutes(45)).unwrap();
        let first: Vec<Slot> = grid.iter().collect();
        let second: Vec<Slot> = (&grid).into_iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_chronological_order() {
        let grid = SlotExpander::new(d(2024, 6, 3), d(2024, 6, 9), Duration::minutes(40)).unwrap();
        let slots: Vec<Slot> = grid.iter().collect();
        assert!(slots.windows(2).all(|w| w[0].start() < w[1].start()));
    }

    #[test]
    fn test_hours_filter_keeps_slots_inside_rules() {
        // 2024-06-03 is a Monday
        let rules = vec![
            RecurringHourRule::new(DayOfWeek::Monday, t(9, 0), t(12, 0)).unwrap(),
            RecurringHourRule::new(DayOfWeek::Monday, t(13, 0), t(17, 0)).unwrap(),
        ];
        let grid = SlotExpander::new(d(2024, 6, 3), d(2024, 6, 4), Duration::minutes(30))
            .unwrap()
            .with_hours(rules);
        let slots: Vec<Slot> = grid.iter().collect();

        assert_eq!(slots.len(), 6 + 8);
        assert!(slots.iter().all(|s| s.date == d(2024, 6, 3)));
        assert_eq!(slots[0].start_time, t(9, 0));
        assert_eq!(slots[5].end_time, t(12, 0));
        assert_eq!(slots[6].start_time, t(13, 0));
        assert_eq!(slots[13].end_time, t(17, 0));
    }

    #[test]
    fn test_hours_filter_drops_straddling_slots() {
        let rules = vec![RecurringHourRule::new(DayOfWeek::Monday, t(9, 15), t(10, 15)).unwrap()];
        let grid = SlotExpander::new(d(2024, 6, 3), d(2024, 6, 3), Duration::minutes(30))
            .unwrap()
            .with_hours(rules);
        let slots: Vec<Slot> = grid.iter().collect();
        // 09:00-09:30 and 10:00-10:30 straddle the rule edges; only 09:30-10:00 fits
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start_time, t(9, 30));
    }

    #[test]
    fn test_all_day_rule_keeps_last_slot() {
        let rules = vec![RecurringHourRule::new(
            DayOfWeek::Monday,
            t(0, 0),
            NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
        )
        .unwrap()];
        let grid = SlotExpander::new(d(2024, 6, 3), d(2024, 6, 3), Duration::minutes(30))
            .unwrap()
            .with_hours(rules);
        let slots: Vec<Slot> = grid.iter().collect();
        assert_eq!(slots.len(), 48);
        assert_eq!(slots[47].start_time, t(23, 30));
    }

    #[test]
    fn test_empty_hours_filter_closes_everything() {
        let grid = SlotExpander::new(d(2024, 6, 3), d(2024, 6, 3), Duration::minutes(30))
            .unwrap()
            .with_hours(Vec::new());
        assert_eq!(grid.iter().count(), 0);
    }
}
