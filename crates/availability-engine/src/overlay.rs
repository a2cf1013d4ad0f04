//! Overlay existing bookings on a slot grid.
//!
//! A slot is booked when any active booking on the same date overlaps it.
//! Every overlapping booking is reported, not only the first: double bookings
//! that already exist in storage must stay visible to operators.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Booking;
use crate::slots::Slot;

/// A slot plus the bookings occupying it.
///
/// Serializes to the wire shape consumers expect: `bookings_uids` and
/// `user_uids` are `null`, not `[]`, when the slot is free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedSlot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_booked: bool,
    pub bookings_uids: Option<Vec<Uuid>>,
    pub user_uids: Option<Vec<Uuid>>,
}

impl AnnotatedSlot {
    pub fn free(slot: Slot) -> Self {
        Self {
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            is_booked: false,
            bookings_uids: None,
            user_uids: None,
        }
    }

    pub fn slot(&self) -> Slot {
        Slot {
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// Whether `[booking_start, booking_end)` overlaps `[slot_start, slot_end)`.
///
/// The three cases are: the booking starts inside the slot, the booking ends
/// inside the slot, or the booking spans the whole slot. For non-empty
/// intervals this is exactly `booking_start < slot_end && booking_end >
/// slot_start`; a booking ending when the slot starts does not overlap it.
pub fn intervals_overlap(
    slot_start: NaiveDateTime,
    slot_end: NaiveDateTime,
    booking_start: NaiveDateTime,
    booking_end: NaiveDateTime,
) -> bool {
    (slot_start <= booking_start && booking_start < slot_end)
        || (slot_start < booking_end && booking_end <= slot_end)
        || (booking_start <= slot_start && booking_end >= slot_end)
}

/// Whether `booking` occupies any part of `slot`. Bookings on other dates never do.
pub fn booking_overlaps_slot(slot: &Slot, booking: &Booking) -> bool {
    slot.date == booking.date
        && intervals_overlap(slot.start(), slot.end(), booking.start(), booking.end())
}

/// Active bookings indexed by date, ready to annotate slots.
#[derive(Debug, Clone, Default)]
pub struct ConflictOverlay<'a> {
    by_date: BTreeMap<NaiveDate, Vec<&'a Booking>>,
}

impl<'a> ConflictOverlay<'a> {
    /// Index `bookings`, dropping cancelled and rejected ones.
    pub fn new(bookings: &'a [Booking]) -> Self {
        let mut by_date: BTreeMap<NaiveDate, Vec<&'a Booking>> = BTreeMap::new();
        for booking in bookings.iter().filter(|b| b.is_active()) {
            by_date.entry(booking.date).or_default().push(booking);
        }
        Self { by_date }
    }

    /// Active bookings overlapping `slot`, in input order.
    pub fn conflicts(&self, slot: &Slot) -> Vec<&'a Booking> {
        self.by_date
            .get(&slot.date)
            .map(|day| {
                day.iter()
                    .copied()
                    .filter(|b| booking_overlaps_slot(slot, b))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn annotate_slot(&self, slot: Slot) -> AnnotatedSlot {
        let conflicts = self.conflicts(&slot);
        if conflicts.is_empty() {
            return AnnotatedSlot::free(slot);
        }

        let bookings_uids: Vec<Uuid> = conflicts.iter().map(|b| b.id).collect();
        let mut user_uids: Vec<Uuid> = Vec::with_capacity(conflicts.len());
        for booking in &conflicts {
            if !user_uids.contains(&booking.user_id) {
                user_uids.push(booking.user_id);
            }
        }

        AnnotatedSlot {
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            is_booked: true,
            bookings_uids: Some(bookings_uids),
            user_uids: Some(user_uids),
        }
    }
}

/// Annotate every slot in `slots` against `bookings`, preserving slot order.
pub fn annotate<I>(slots: I, bookings: &[Booking]) -> Vec<AnnotatedSlot>
where
    I: IntoIterator<Item = Slot>,
{
    let overlay = ConflictOverlay::new(bookings);
    slots
        .into_iter()
        .map(|slot| overlay.annotate_slot(slot))
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────────────────
