//! Weekly working-hour rules and the policy deciding when they are in force.
//!
//! A [`RecurringHourRule`] is a weekday plus an open interval, e.g. "Monday
//! 09:00–17:00". Rules are shared structurally between businesses, employees
//! and services, so they are never edited in place: an owner's [`RuleSet`]
//! only ever adds and removes whole rules.
//!
//! A business's [`RecurringHoursPolicy`] can restrict its rules to the current
//! week (or the current and next week) relative to an anchor date.
//! [`effective_rules`] applies that policy for a given `today` and is
//! recomputed on every read.

use std::collections::BTreeSet;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineError;
use crate::model::{check_time_range, DayOfWeek, VisitType};

// ── Rules ───────────────────────────────────────────────────────────────────

/// A weekly-repeating open interval. Always satisfies `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RuleFields")]
pub struct RecurringHourRule {
    day_of_week: DayOfWeek,
    #[serde(rename = "start_time")]
    start: NaiveTime,
    #[serde(rename = "end_time")]
    end: NaiveTime,
    visit_type: Option<VisitType>,
}

#[derive(Deserialize)]
struct RuleFields {
    day_of_week: DayOfWeek,
    start_time: NaiveTime,
    end_time: NaiveTime,
    #[serde(default)]
    visit_type: Option<VisitType>,
}

impl TryFrom<RuleFields> for RecurringHourRule {
    type Error = EngineError;

    fn try_from(f: RuleFields) -> Result<Self, EngineError> {
        Ok(Self::new(f.day_of_week, f.start_time, f.end_time)?.with_visit_type(f.visit_type))
    }
}

impl RecurringHourRule {
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] unless `start < end`.
    pub fn new(day_of_week: DayOfWeek, start: NaiveTime, end: NaiveTime) -> Result<Self, EngineError> {
        check_time_range(start, end)?;
        Ok(Self {
            day_of_week,
            start,
            end,
            visit_type: None,
        })
    }

    pub fn with_visit_type(mut self, visit_type: Option<VisitType>) -> Self {
        self.visit_type = visit_type;
        self
    }

    pub fn day_of_week(&self) -> DayOfWeek {
        self.day_of_week
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn visit_type(&self) -> Option<VisitType> {
        self.visit_type
    }

    /// Whether `[start, end)` lies entirely within this rule's interval on
    /// `start`'s date.
    ///
    /// A rule ending at 23:59:59 or later runs to the following midnight, so
    /// an all-day rule admits the day's last slot.
    pub fn covers(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        let date = start.date();
        DayOfWeek::of(date) == self.day_of_week
            && start.time() >= self.start
            && end <= self.end_on(date)
    }

    fn end_on(&self, date: NaiveDate) -> NaiveDateTime {
        let end = date.and_time(self.end);
        if self.end >= last_second() {
            date.succ_opt()
                .map(|next| next.and_time(NaiveTime::default()))
                .unwrap_or(end)
        } else {
            end
        }
    }
}

fn last_second() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default()
}

// ── Rule sets ───────────────────────────────────────────────────────────────

/// The rules attached to one owner, deduplicated by structural identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: BTreeSet<RecurringHourRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a rule. Returns `false` if an identical rule was already present.
    pub fn add(&mut self, rule: RecurringHourRule) -> bool {
        self.rules.insert(rule)
    }

    /// Detach a rule. Returns `false` if it was not attached.
    pub fn remove(&mut self, rule: &RecurringHourRule) -> bool {
        self.rules.remove(rule)
    }

    /// Swap one rule for another: the old one is detached, never edited.
    ///
    /// Returns `false` and leaves the set unchanged if `old` was not attached.
    pub fn replace(&mut self, old: &RecurringHourRule, new: RecurringHourRule) -> bool {
        if !self.rules.remove(old) {
            return false;
        }
        self.rules.insert(new);
        true
    }

    /// Replace every rule at once, as a batch working-hours update does.
    pub fn replace_all<I: IntoIterator<Item = RecurringHourRule>>(&mut self, rules: I) {
        self.rules = rules.into_iter().collect();
    }

    pub fn contains(&self, rule: &RecurringHourRule) -> bool {
        self.rules.contains(rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules ordered by weekday, then start time.
    pub fn iter(&self) -> impl Iterator<Item = &RecurringHourRule> {
        self.rules.iter()
    }

    pub fn for_day(&self, day: DayOfWeek) -> impl Iterator<Item = &RecurringHourRule> {
        self.rules.iter().filter(move |r| r.day_of_week == day)
    }

    pub fn to_vec(&self) -> Vec<RecurringHourRule> {
        self.rules.iter().copied().collect()
    }
}

impl FromIterator<RecurringHourRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = RecurringHourRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

// ── Policy ──────────────────────────────────────────────────────────────────

/// Which weeks a business's rules apply to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyForWeeks {
    ThisWeekOnly,
    ThisWeekAndNext,
    AllWeeks,
}

/// A business's apply-for-weeks setting.
///
/// `mode` is nullable in storage; an unset mode together with an anchor date
/// means no week is in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringHoursPolicy {
    pub mode: Option<ApplyForWeeks>,
    pub anchor_date: Option<NaiveDate>,
}

impl Default for RecurringHoursPolicy {
    fn default() -> Self {
        Self {
            mode: Some(ApplyForWeeks::AllWeeks),
            anchor_date: None,
        }
    }
}

impl RecurringHoursPolicy {
    pub fn new(mode: ApplyForWeeks, anchor_date: NaiveDate) -> Self {
        Self {
            mode: Some(mode),
            anchor_date: Some(anchor_date),
        }
    }

    /// Whether rules are in force on `today`.
    ///
    /// The week is `anchor_date` shifted back by `today`'s weekday index
    /// (Monday = 0), spanning seven days; `ThisWeekAndNext` extends it by
    /// another seven.
    pub fn is_live(&self, today: NaiveDate) -> bool {
        let Some(anchor) = self.anchor_date else {
            return true;
        };
        let Some(mode) = self.mode else {
            return false;
        };

        let extra_days = match mode {
            ApplyForWeeks::AllWeeks => return true,
            ApplyForWeeks::ThisWeekOnly => 0,
            ApplyForWeeks::ThisWeekAndNext => 7,
        };

        let offset = u64::from(today.weekday().num_days_from_monday());
        let window = anchor.checked_sub_days(Days::new(offset)).and_then(|week_start| {
            week_start
                .checked_add_days(Days::new(6 + extra_days))
                .map(|window_end| (week_start, window_end))
        });

        match window {
            Some((week_start, window_end)) => week_start <= today && today <= window_end,
            None => false,
        }
    }
}

/// The subset of `rules` in force on `today` under `policy`: all or nothing.
pub fn effective_rules(
    rules: &[RecurringHourRule],
    policy: &RecurringHoursPolicy,
    today: NaiveDate,
) -> Vec<RecurringHourRule> {
    if policy.is_live(today) {
        rules.to_vec()
    } else {
        debug!(
            %today,
            mode = ?policy.mode,
            anchor = ?policy.anchor_date,
            "working hours outside policy window"
        );
        Vec::new()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
