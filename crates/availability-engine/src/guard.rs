//! Write-time overlap check for new and edited bookings.
//!
//! Uses the same interval test as the slot overlay, restricted to the
//! candidate's scope: the same business, and the same employee when the
//! candidate names one. The check is advisory; whether an overlap blocks the
//! write is the caller's decision (see [`crate::config::ConflictPolicy`]).

use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::{check_time_range, Booking, Scope};
use crate::overlay::intervals_overlap;

/// A booking about to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingCandidate {
    pub business_id: Uuid,
    pub employee_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// The stored booking this candidate replaces when editing. It is never
    /// reported as conflicting with itself.
    pub replaces: Option<Uuid>,
}

impl BookingCandidate {
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] unless `start_time < end_time`.
    pub fn new(
        business_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<Self> {
        check_time_range(start_time, end_time)?;
        Ok(Self {
            business_id,
            employee_id: None,
            date,
            start_time,
            end_time,
            replaces: None,
        })
    }

    /// The candidate for writing `booking` back as it currently stands.
    pub fn from_booking(booking: &Booking) -> Self {
        Self {
            business_id: booking.business_id,
            employee_id: booking.employee_id,
            date: booking.date,
            start_time: booking.start_time,
            end_time: booking.end_time,
            replaces: Some(booking.id),
        }
    }

    pub fn with_employee(mut self, employee_id: Uuid) -> Self {
        self.employee_id = Some(employee_id);
        self
    }

    pub fn editing(mut self, booking_id: Uuid) -> Self {
        self.replaces = Some(booking_id);
        self
    }

    pub fn scope(&self) -> Scope {
        Scope::Business {
            business_id: self.business_id,
            employee_id: self.employee_id,
        }
    }

    fn overlaps(&self, booking: &Booking) -> bool {
        self.date == booking.date
            && intervals_overlap(
                self.date.and_time(self.start_time),
                self.date.and_time(self.end_time),
                booking.start(),
                booking.end(),
            )
    }
}

/// Active bookings in the candidate's scope that overlap it.
pub fn find_conflicts<'a>(candidate: &BookingCandidate, existing: &'a [Booking]) -> Vec<&'a Booking> {
    let scope = candidate.scope();
    existing
        .iter()
        .filter(|b| b.is_active())
        .filter(|b| Some(b.id) != candidate.replaces)
        .filter(|b| scope.contains(b))
        .filter(|b| candidate.overlaps(b))
        .collect()
}

/// Whether writing `candidate` would double-book its scope.
pub fn would_conflict(candidate: &BookingCandidate, existing: &[Booking]) -> bool {
    !find_conflicts(candidate, existing).is_empty()
}

/// Reject `candidate` if it overlaps anything.
///
/// # Errors
///
/// Returns [`EngineError::SlotConflict`] listing every overlapping booking.
pub fn ensure_no_conflict(candidate: &BookingCandidate, existing: &[Booking]) -> Result<()> {
    let conflicts = find_conflicts(candidate, existing);
    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(EngineError::SlotConflict {
            booking_ids: conflicts.iter().map(|b| b.id).collect(),
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BookingStatus;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    struct Fixture {
        business: Uuid,
        alice: Uuid,
        bob: Uuid,
        bookings: Vec<Booking>,
    }

    fn fixture() -> Fixture {
        let business = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let day = d(2024, 6, 3);
        let bookings = vec![
            Booking::new(Uuid::new_v4(), business, day, t(10, 0), t(11, 0))
                .unwrap()
                .with_employee(alice),
            Booking::new(Uuid::new_v4(), business, day, t(14, 0), t(15, 0))
                .unwrap()
                .with_employee(bob),
            Booking::new(Uuid::new_v4(), business, day, t(16, 0), t(17, 0))
                .unwrap()
                .with_employee(alice)
                .with_status(BookingStatus::Cancelled),
        ];
        Fixture {
            business,
            alice,
            bob,
            bookings,
        }
    }

    #[test]
    fn test_overlap_with_same_employee() {
        let f = fixture();
        let c = BookingCandidate::new(f.business, d(2024, 6, 3), t(10, 30), t(11, 30))
            .unwrap()
            .with_employee(f.alice);
        assert!(would_conflict(&c, &f.bookings));
        let hits = find_conflicts(&c, &f.bookings);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, f.bookings[0].id);
    }

    #[test]
    fn test_other_employee_is_free() {
        let f = fixture();
        let c = BookingCandidate::new(f.business, d(2024, 6, 3), t(10, 0), t(11, 0))
            .unwrap()
            .with_employee(f.bob);
        assert!(!would_conflict(&c, &f.bookings));
    }

    #[test]
    fn test_business_wide_candidate_sees_every_employee() {
        let f = fixture();
        let c = BookingCandidate::new(f.business, d(2024, 6, 3), t(10, 30), t(14, 30)).unwrap();
        let ids: Vec<Uuid> = find_conflicts(&c, &f.bookings).iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![f.bookings[0].id, f.bookings[1].id]);
    }

    #[test]
    fn test_other_business_ignored() {
        let f = fixture();
        let c = BookingCandidate::new(Uuid::new_v4(), d(2024, 6, 3), t(10, 0), t(11, 0)).unwrap();
        assert!(!would_conflict(&c, &f.bookings));
    }

    #[test]
    fn test_cancelled_booking_frees_time() {
        let f = fixture();
        let c = BookingCandidate::new(f.business, d(2024, 6, 3), t(16, 0), t(17, 0))
            .unwrap()
            .with_employee(f.alice);
        assert!(!would_conflict(&c, &f.bookings));
    }

    #[test]
    fn test_adjacent_is_not_conflict() {
        let f = fixture();
        let c = BookingCandidate::new(f.business, d(2024, 6, 3), t(11, 0), t(12, 0))
            .unwrap()
            .with_employee(f.alice);
        assert!(!would_conflict(&c, &f.bookings));
    }

    #[test]
    fn test_edit_ignores_itself() {
        let f = fixture();
        let mut moved = f.bookings[0].clone();
        moved.start_time = t(10, 15);
        moved.end_time = t(11, 15);
        assert!(!would_conflict(&BookingCandidate::from_booking(&moved), &f.bookings));

        let without_self = BookingCandidate::from_booking(&moved);
        let as_new = BookingCandidate {
            replaces: None,
            ..without_self
        };
        assert!(would_conflict(&as_new, &f.bookings));
    }

    #[test]
    fn test_ensure_reports_all_ids() {
        let f = fixture();
        let c = BookingCandidate::new(f.business, d(2024, 6, 3), t(9, 0), t(18, 0)).unwrap();
        match ensure_no_conflict(&c, &f.bookings) {
            Err(EngineError::SlotConflict { booking_ids }) => {
                assert_eq!(booking_ids, vec![f.bookings[0].id, f.bookings[1].id]);
            }
            other => panic!("expected SlotConflict, got {other:?}"),
        }
        let free = BookingCandidate::new(f.business, d(2024, 6, 4), t(9, 0), t(18, 0)).unwrap();
        assert!(ensure_no_conflict(&free, &f.bookings).is_ok());
    }

    #[test]
    fn test_candidate_rejects_inverted_times() {
        assert!(BookingCandidate::new(Uuid::new_v4(), d(2024, 6, 3), t(12, 0), t(11, 0)).is_err());
    }
}
