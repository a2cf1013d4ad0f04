//! In-process booking and working-hours store.
//!
//! [`BookingLedger`] implements both persistence ports and owns the write
//! path. Creating or editing a booking runs the overlap guard and the insert
//! under one write lock, so two concurrent writers for the same time cannot
//! both observe a free slot. With [`ConflictPolicy::Allow`] the guard is
//! skipped and overlapping bookings are stored as-is.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveTime};
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ConflictPolicy, EngineConfig};
use crate::error::{EngineError, Result};
use crate::guard::{ensure_no_conflict, BookingCandidate};
use crate::model::{Booking, BookingStatus, OwnerRef, Scope};
use crate::recurring::{RecurringHourRule, RecurringHoursPolicy, RuleSet};
use crate::store::{BookingSource, RuleSource};

/// Changes applied by [`BookingLedger::edit`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingEdit {
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    /// `Some(None)` unassigns the employee.
    pub employee_id: Option<Option<Uuid>>,
    pub user_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
}

impl BookingEdit {
    pub fn reschedule(date: NaiveDate, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            date: Some(date),
            start_time: Some(start_time),
            end_time: Some(end_time),
            ..Self::default()
        }
    }

    pub fn status(status: BookingStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    fn apply(&self, booking: &mut Booking) {
        if let Some(date) = self.date {
            booking.date = date;
        }
        if let Some(start) = self.start_time {
            booking.start_time = start;
        }
        if let Some(end) = self.end_time {
            booking.end_time = end;
        }
        if let Some(employee) = self.employee_id {
            booking.employee_id = employee;
        }
        if let Some(user) = self.user_id {
            booking.user_id = user;
        }
        if let Some(status) = self.status {
            booking.status = status;
        }
    }
}

/// Bookings, working-hour rules and policies held in memory.
#[derive(Debug, Default)]
pub struct BookingLedger {
    conflict_policy: ConflictPolicy,
    bookings: RwLock<BTreeMap<Uuid, Booking>>,
    rules: RwLock<HashMap<OwnerRef, RuleSet>>,
    policies: RwLock<HashMap<Uuid, RecurringHoursPolicy>>,
}

impl BookingLedger {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_policy(config.conflict_policy)
    }

    pub fn with_policy(conflict_policy: ConflictPolicy) -> Self {
        Self {
            conflict_policy,
            ..Self::default()
        }
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.conflict_policy
    }

    // ── Bookings ────────────────────────────────────────────────────────

    /// Store a new booking. Client-created bookings are confirmed immediately,
    /// whatever status `booking` carries.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidArgument`] if the times are inverted or the id is taken.
    /// - [`EngineError::SlotConflict`] if the policy is `Reject` and the booking
    ///   overlaps an active booking in its scope.
    pub fn create(&self, mut booking: Booking) -> Result<Booking> {
        booking.validate()?;
        booking.status = BookingStatus::Confirmed;

        let mut bookings = self.bookings.write();
        if bookings.contains_key(&booking.id) {
            return Err(EngineError::InvalidArgument(format!(
                "booking {} already exists",
                booking.id
            )));
        }
        self.check_conflicts(&BookingCandidate::from_booking(&booking), &bookings)?;

        debug!(booking_id = %booking.id, date = %booking.date, "booking created");
        bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    /// Apply `edit` to a stored booking.
    ///
    /// The overlap check runs only when the edited booking is still active.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] for an unknown id.
    /// - [`EngineError::InvalidArgument`] if the edit inverts the times.
    /// - [`EngineError::SlotConflict`] as for [`BookingLedger::create`].
    pub fn edit(&self, id: Uuid, edit: &BookingEdit) -> Result<Booking> {
        let mut bookings = self.bookings.write();
        let mut updated = bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("booking {id}")))?;
        edit.apply(&mut updated);
        updated.validate()?;

        if updated.is_active() {
            self.check_conflicts(&BookingCandidate::from_booking(&updated), &bookings)?;
        }

        debug!(booking_id = %id, status = ?updated.status, "booking edited");
        bookings.insert(id, updated.clone());
        Ok(updated)
    }

    pub fn get(&self, id: Uuid) -> Result<Booking> {
        self.bookings
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("booking {id}")))
    }

    pub fn len(&self) -> usize {
        self.bookings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.read().is_empty()
    }

    /// Every booking dated within `[from, to]`, whatever its status.
    pub fn bookings_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<Booking> {
        let mut out: Vec<Booking> = self
            .bookings
            .read()
            .values()
            .filter(|b| b.date >= from && b.date <= to)
            .cloned()
            .collect();
        sort_chronologically(&mut out);
        out
    }

    /// Flag bookings as having received their upcoming-appointment reminder.
    pub fn mark_reminded(&self, ids: &[Uuid]) {
        let mut bookings = self.bookings.write();
        for id in ids {
            if let Some(b) = bookings.get_mut(id) {
                b.was_user_reminded = true;
            }
        }
    }

    /// Flag bookings as having received their daily reminder.
    pub fn mark_reminded_daily(&self, ids: &[Uuid]) {
        let mut bookings = self.bookings.write();
        for id in ids {
            if let Some(b) = bookings.get_mut(id) {
                b.was_user_reminded_daily = true;
            }
        }
    }

    fn check_conflicts(
        &self,
        candidate: &BookingCandidate,
        bookings: &BTreeMap<Uuid, Booking>,
    ) -> Result<()> {
        if self.conflict_policy == ConflictPolicy::Allow {
            return Ok(());
        }
        let same_day: Vec<Booking> = bookings
            .values()
            .filter(|b| b.date == candidate.date)
            .cloned()
            .collect();
        ensure_no_conflict(candidate, &same_day).inspect_err(|e| {
            info!(
                business_id = %candidate.business_id,
                date = %candidate.date,
                error = %e,
                "booking rejected"
            );
        })
    }

    // ── Working hours ───────────────────────────────────────────────────

    /// Attach `rule` to `owner`. Returns `false` if it was already attached.
    pub fn add_rule(&self, owner: OwnerRef, rule: RecurringHourRule) -> bool {
        self.rules.write().entry(owner).or_default().add(rule)
    }

    /// Detach `rule` from `owner`. Other owners sharing the rule keep it.
    pub fn remove_rule(&self, owner: OwnerRef, rule: &RecurringHourRule) -> bool {
        self.rules
            .write()
            .get_mut(&owner)
            .is_some_and(|set| set.remove(rule))
    }

    /// Set the same working hours on every owner in `owners` at once.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] if `owners` is empty.
    pub fn replace_rules(&self, owners: &[OwnerRef], rules: &[RecurringHourRule]) -> Result<()> {
        if owners.is_empty() {
            return Err(EngineError::InvalidArgument(
                "at least one of business, employee or service must be given".to_string(),
            ));
        }
        let replacement: RuleSet = rules.iter().copied().collect();
        let mut all = self.rules.write();
        for owner in owners {
            all.insert(*owner, replacement.clone());
        }
        Ok(())
    }

    pub fn set_policy(&self, business_id: Uuid, policy: RecurringHoursPolicy) {
        self.policies.write().insert(business_id, policy);
    }
}

impl RuleSource for BookingLedger {
    fn fetch_rules(&self, owner: OwnerRef) -> Result<Vec<RecurringHourRule>> {
        Ok(self
            .rules
            .read()
            .get(&owner)
            .map(RuleSet::to_vec)
            .unwrap_or_default())
    }

    fn fetch_policy(&self, business_id: Uuid) -> Result<RecurringHoursPolicy> {
        Ok(self
            .policies
            .read()
            .get(&business_id)
            .copied()
            .unwrap_or_default())
    }
}

impl BookingSource for BookingLedger {
    fn fetch_active_bookings(
        &self,
        scope: &Scope,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Booking>> {
        let mut out: Vec<Booking> = self
            .bookings
            .read()
            .values()
            .filter(|b| b.is_active())
            .filter(|b| b.date >= from && b.date <= to)
            .filter(|b| scope.contains(b))
            .cloned()
            .collect();
        sort_chronologically(&mut out);
        Ok(out)
    }
}

fn sort_chronologically(bookings: &mut [Booking]) {
    bookings.sort_by_key(|b| (b.date, b.start_time, b.end_time, b.id));
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DayOfWeek;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn draft(business: Uuid, start: u32, end: u32) -> Booking {
        Booking::new(Uuid::new_v4(), business, d(2024, 6, 3), t(start, 0), t(end, 0)).unwrap()
    }

    #[test]
    fn test_create_confirms() {
        let ledger = BookingLedger::default();
        let pending = draft(Uuid::new_v4(), 10, 11).with_status(BookingStatus::Pending);
        let stored = ledger.create(pending).unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
        assert_eq!(ledger.get(stored.id).unwrap().status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_create_duplicate_id_rejected() {
        let ledger = BookingLedger::default();
        let b = draft(Uuid::new_v4(), 10, 11);
        ledger.create(b.clone()).unwrap();
        assert!(matches!(ledger.create(b), Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_allow_policy_stores_overlaps() {
        let ledger = BookingLedger::with_policy(ConflictPolicy::Allow);
        let business = Uuid::new_v4();
        ledger.create(draft(business, 10, 11)).unwrap();
        ledger.create(draft(business, 10, 11)).unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_reject_policy_blocks_overlap() {
        let ledger = BookingLedger::with_policy(ConflictPolicy::Reject);
        let business = Uuid::new_v4();
        let first = ledger.create(draft(business, 10, 11)).unwrap();
        match ledger.create(draft(business, 10, 12)) {
            Err(EngineError::SlotConflict { booking_ids }) => assert_eq!(booking_ids, vec![first.id]),
            other => panic!("expected SlotConflict, got {other:?}"),
        }
        assert_eq!(ledger.len(), 1);

        // Different business, same time: fine
        ledger.create(draft(Uuid::new_v4(), 10, 11)).unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_edit_reschedule_ignores_own_slot() {
        let ledger = BookingLedger::with_policy(ConflictPolicy::Reject);
        let business = Uuid::new_v4();
        let b = ledger.create(draft(business, 10, 11)).unwrap();
        let moved = ledger
            .edit(b.id, &BookingEdit::reschedule(d(2024, 6, 3), t(10, 30), t(11, 30)))
            .unwrap();
        assert_eq!(moved.start_time, t(10, 30));
    }

    #[test]
    fn test_edit_into_occupied_time_rejected() {
        let ledger = BookingLedger::with_policy(ConflictPolicy::Reject);
        let business = Uuid::new_v4();
        ledger.create(draft(business, 10, 11)).unwrap();
        let other = ledger.create(draft(business, 12, 13)).unwrap();
        let err = ledger
            .edit(other.id, &BookingEdit::reschedule(d(2024, 6, 3), t(10, 30), t(11, 30)))
            .unwrap_err();
        assert!(matches!(err, EngineError::SlotConflict { .. }));
        assert_eq!(ledger.get(other.id).unwrap().start_time, t(12, 0));
    }

    #[test]
    fn test_cancel_frees_time_for_new_booking() {
        let ledger = BookingLedger::with_policy(ConflictPolicy::Reject);
        let business = Uuid::new_v4();
        let b = ledger.create(draft(business, 10, 11)).unwrap();
        ledger.edit(b.id, &BookingEdit::status(BookingStatus::Cancelled)).unwrap();
        assert!(ledger.create(draft(business, 10, 11)).is_ok());
    }

    #[test]
    fn test_edit_inverting_times_rejected() {
        let ledger = BookingLedger::default();
        let b = ledger.create(draft(Uuid::new_v4(), 10, 11)).unwrap();
        let edit = BookingEdit {
            end_time: Some(t(9, 0)),
            ..BookingEdit::default()
        };
        assert!(matches!(ledger.edit(b.id, &edit), Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_edit_unknown_booking() {
        let ledger = BookingLedger::default();
        let err = ledger
            .edit(Uuid::new_v4(), &BookingEdit::status(BookingStatus::Completed))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_fetch_active_filters_scope_status_and_range() {
        let ledger = BookingLedger::default();
        let business = Uuid::new_v4();
        let late = ledger.create(draft(business, 15, 16)).unwrap();
        let early = ledger.create(draft(business, 9, 10)).unwrap();
        let cancelled = ledger.create(draft(business, 11, 12)).unwrap();
        ledger
            .edit(cancelled.id, &BookingEdit::status(BookingStatus::Cancelled))
            .unwrap();
        ledger.create(draft(Uuid::new_v4(), 9, 10)).unwrap();
        let mut next_week = draft(business, 9, 10);
        next_week.date = d(2024, 6, 12);
        ledger.create(next_week).unwrap();

        let got = ledger
            .fetch_active_bookings(&Scope::business(business), d(2024, 6, 3), d(2024, 6, 9))
            .unwrap();
        let ids: Vec<Uuid> = got.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }

    #[test]
    fn test_rules_shared_between_owners() {
        let ledger = BookingLedger::default();
        let business = OwnerRef::Business(Uuid::new_v4());
        let employee = OwnerRef::Employee(Uuid::new_v4());
        let rule = RecurringHourRule::new(DayOfWeek::Monday, t(9, 0), t(17, 0)).unwrap();

        ledger.replace_rules(&[business, employee], &[rule, rule]).unwrap();
        assert_eq!(ledger.fetch_rules(business).unwrap(), vec![rule]);
        assert_eq!(ledger.fetch_rules(employee).unwrap(), vec![rule]);

        assert!(ledger.remove_rule(employee, &rule));
        assert!(ledger.fetch_rules(employee).unwrap().is_empty());
        assert_eq!(ledger.fetch_rules(business).unwrap(), vec![rule]);

        assert!(ledger.add_rule(employee, rule));
        assert!(!ledger.add_rule(employee, rule));
    }

    #[test]
    fn test_replace_rules_requires_owner() {
        let ledger = BookingLedger::default();
        assert!(ledger.replace_rules(&[], &[]).is_err());
    }

    #[test]
    fn test_policy_defaults_to_all_weeks() {
        let ledger = BookingLedger::default();
        let business = Uuid::new_v4();
        assert_eq!(ledger.fetch_policy(business).unwrap(), RecurringHoursPolicy::default());

        let policy = RecurringHoursPolicy::new(crate::recurring::ApplyForWeeks::ThisWeekOnly, d(2024, 1, 1));
        ledger.set_policy(business, policy);
        assert_eq!(ledger.fetch_policy(business).unwrap(), policy);
    }

    #[test]
    fn test_mark_reminded() {
        let ledger = BookingLedger::default();
        let b = ledger.create(draft(Uuid::new_v4(), 10, 11)).unwrap();
        ledger.mark_reminded(&[b.id, Uuid::new_v4()]);
        let stored = ledger.get(b.id).unwrap();
        assert!(stored.was_user_reminded);
        assert!(!stored.was_user_reminded_daily);
        ledger.mark_reminded_daily(&[b.id]);
        assert!(ledger.get(b.id).unwrap().was_user_reminded_daily);
    }
}
