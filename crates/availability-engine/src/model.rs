//! Shared entities: bookings, the scopes they are partitioned by, and the
//! enums used across the engine.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// Day of the week a recurring rule or booking falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// The weekday `date` falls on.
    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
            Weekday::Sun => Self::Sunday,
        }
    }
}

impl From<DayOfWeek> for Weekday {
    fn from(day: DayOfWeek) -> Self {
        match day {
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
            DayOfWeek::Sunday => Weekday::Sun,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitType {
    OnSite,
    HomeVisit,
}

/// Lifecycle status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    Rejected,
}

impl BookingStatus {
    /// Whether a booking in this status occupies its time range.
    ///
    /// Cancelled and rejected bookings free their slot; everything else,
    /// including completed bookings, still counts.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Cancelled | Self::Rejected)
    }
}

/// The owner a set of recurring hour rules is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum OwnerRef {
    Business(Uuid),
    Employee(Uuid),
    Service(Uuid),
}

/// The partition bookings and availability queries are evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Scope {
    /// A business, optionally narrowed to one of its employees.
    Business {
        business_id: Uuid,
        employee_id: Option<Uuid>,
    },
    /// Every booking made by one client, across businesses.
    User { user_id: Uuid },
}

impl Scope {
    pub fn business(business_id: Uuid) -> Self {
        Self::Business {
            business_id,
            employee_id: None,
        }
    }

    pub fn employee(business_id: Uuid, employee_id: Uuid) -> Self {
        Self::Business {
            business_id,
            employee_id: Some(employee_id),
        }
    }

    pub fn user(user_id: Uuid) -> Self {
        Self::User { user_id }
    }

    pub fn business_id(&self) -> Option<Uuid> {
        match self {
            Self::Business { business_id, .. } => Some(*business_id),
            Self::User { .. } => None,
        }
    }

    /// Whether `booking` belongs to this scope.
    ///
    /// A business scope without an employee covers every booking of the
    /// business, assigned or not.
    pub fn contains(&self, booking: &Booking) -> bool {
        match self {
            Self::Business {
                business_id,
                employee_id,
            } => {
                booking.business_id == *business_id
                    && employee_id.is_none_or(|e| booking.employee_id == Some(e))
            }
            Self::User { user_id } => booking.user_id == *user_id,
        }
    }
}

/// A client's reservation of a time range on one date.
///
/// Deserializing rejects a booking whose start is not before its end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BookingFields")]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_id: Uuid,
    pub employee_id: Option<Uuid>,
    pub service_ids: BTreeSet<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: BookingStatus,
    pub was_user_reminded: bool,
    pub was_user_reminded_daily: bool,
}

#[derive(Deserialize)]
struct BookingFields {
    id: Uuid,
    user_id: Uuid,
    business_id: Uuid,
    #[serde(default)]
    employee_id: Option<Uuid>,
    #[serde(default)]
    service_ids: BTreeSet<Uuid>,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    status: BookingStatus,
    #[serde(default)]
    was_user_reminded: bool,
    #[serde(default)]
    was_user_reminded_daily: bool,
}

impl TryFrom<BookingFields> for Booking {
    type Error = EngineError;

    fn try_from(f: BookingFields) -> Result<Self> {
        check_time_range(f.start_time, f.end_time)?;
        Ok(Self {
            id: f.id,
            user_id: f.user_id,
            business_id: f.business_id,
            employee_id: f.employee_id,
            service_ids: f.service_ids,
            date: f.date,
            start_time: f.start_time,
            end_time: f.end_time,
            status: f.status,
            was_user_reminded: f.was_user_reminded,
            was_user_reminded_daily: f.was_user_reminded_daily,
        })
    }
}

impl Booking {
    /// A confirmed booking with a fresh id and no employee or services.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidArgument`] unless `start_time < end_time`.
    pub fn new(
        user_id: Uuid,
        business_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<Self> {
        check_time_range(start_time, end_time)?;
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            business_id,
            employee_id: None,
            service_ids: BTreeSet::new(),
            date,
            start_time,
            end_time,
            status: BookingStatus::Confirmed,
            was_user_reminded: false,
            was_user_reminded_daily: false,
        })
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_employee(mut self, employee_id: Uuid) -> Self {
        self.employee_id = Some(employee_id);
        self
    }

    pub fn with_services<I: IntoIterator<Item = Uuid>>(mut self, services: I) -> Self {
        self.service_ids = services.into_iter().collect();
        self
    }

    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn end(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }

    pub fn day_of_week(&self) -> DayOfWeek {
        DayOfWeek::of(self.date)
    }

    /// Re-check the `start_time < end_time` invariant, e.g. after deserializing.
    pub fn validate(&self) -> Result<()> {
        check_time_range(self.start_time, self.end_time)
    }
}

pub(crate) fn check_time_range(start: NaiveTime, end: NaiveTime) -> Result<()> {
    if start < end {
        Ok(())
    } else {
        Err(EngineError::InvalidArgument(format!(
            "start time {start} must be before end time {end}"
        )))
    }
}
