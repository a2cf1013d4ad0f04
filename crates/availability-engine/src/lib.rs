//! # availability-engine
//!
//! Booking availability and double-booking detection for appointment-based
//! businesses.
//!
//! Given a business (optionally narrowed to one employee), a date range and a
//! slot width, the engine produces every slot in the range annotated with
//! the bookings occupying it. Weekly working-hour rules, and the policy
//! limiting which weeks they apply to, can restrict the grid. The same
//! overlap test guards new and edited bookings at write time.
//!
//! ## Modules
//!
//! - [`availability`]: query parsing and the annotated slot grid
//! - [`slots`]: fixed-width slot expansion over a date range
//! - [`overlay`]: marking slots occupied by active bookings
//! - [`guard`]: write-time overlap check for booking candidates
//! - [`recurring`]: weekly working-hour rules and apply-for-weeks policy
//! - [`timezone`]: display-time conversion of naive booking times
//! - [`store`]: persistence ports the engine reads through
//! - [`ledger`]: in-process store with a locked booking write path
//! - [`reminders`]: selecting bookings due for a reminder
//! - [`model`]: bookings, scopes and shared enums
//! - [`config`]: engine configuration
//! - [`error`]: error types

pub mod availability;
pub mod config;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod model;
pub mod overlay;
pub mod recurring;
pub mod reminders;
pub mod slots;
pub mod store;
pub mod timezone;

pub use availability::{AvailabilityQuery, AvailabilityService};
pub use config::{ConflictPolicy, EngineConfig};
pub use error::{EngineError, Result};
pub use guard::{ensure_no_conflict, find_conflicts, would_conflict, BookingCandidate};
pub use ledger::{BookingEdit, BookingLedger};
pub use model::{Booking, BookingStatus, DayOfWeek, OwnerRef, Scope, VisitType};
pub use overlay::{annotate, intervals_overlap, AnnotatedSlot, ConflictOverlay};
pub use recurring::{
    effective_rules, ApplyForWeeks, RecurringHourRule, RecurringHoursPolicy, RuleSet,
};
pub use reminders::{ReminderKind, ReminderPlanner};
pub use slots::{Slot, SlotExpander};
pub use store::{BookingSource, RuleSource};
pub use timezone::{parse_timezone, TimeRangeDisplay, TimeZoner};
