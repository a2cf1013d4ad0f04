//! Persistence ports consumed by the engine.
//!
//! The engine never talks to storage directly. Each query performs one
//! batched fetch per port; a failed fetch fails the whole query with
//! [`crate::EngineError::Store`].

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Booking, OwnerRef, Scope};
use crate::recurring::{RecurringHourRule, RecurringHoursPolicy};

/// Source of working-hour rules and the policy governing them.
pub trait RuleSource: Send + Sync {
    /// Rules attached to `owner`. Unknown owners have no rules.
    fn fetch_rules(&self, owner: OwnerRef) -> Result<Vec<RecurringHourRule>>;

    /// The business's apply-for-weeks policy.
    fn fetch_policy(&self, business_id: Uuid) -> Result<RecurringHoursPolicy>;
}

/// Source of bookings.
pub trait BookingSource: Send + Sync {
    /// Active bookings in `scope` dated within `[from, to]`, ordered by date
    /// and start time.
    fn fetch_active_bookings(&self, scope: &Scope, from: NaiveDate, to: NaiveDate)
        -> Result<Vec<Booking>>;
}

impl<T: RuleSource + ?Sized> RuleSource for &T {
    fn fetch_rules(&self, owner: OwnerRef) -> Result<Vec<RecurringHourRule>> {
        (**self).fetch_rules(owner)
    }

    fn fetch_policy(&self, business_id: Uuid) -> Result<RecurringHoursPolicy> {
        (**self).fetch_policy(business_id)
    }
}

impl<T: RuleSource + ?Sized> RuleSource for Arc<T> {
    fn fetch_rules(&self, owner: OwnerRef) -> Result<Vec<RecurringHourRule>> {
        (**self).fetch_rules(owner)
    }

    fn fetch_policy(&self, business_id: Uuid) -> Result<RecurringHoursPolicy> {
        (**self).fetch_policy(business_id)
    }
}

impl<T: BookingSource + ?Sized> BookingSource for &T {
    fn fetch_active_bookings(
        &self,
        scope: &Scope,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Booking>> {
        (**self).fetch_active_bookings(scope, from, to)
    }
}

impl<T: BookingSource + ?Sized> BookingSource for Arc<T> {
    fn fetch_active_bookings(
        &self,
        scope: &Scope,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Booking>> {
        (**self).fetch_active_bookings(scope, from, to)
    }
}
