use std::convert::TryFrom;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio_postgres::Row;
use validator::{Validate, ValidationError};

use crate::db::*;
use crate::errors::RepoError;
use crate::types::TimeSlotId;

pub const ID_COLUMN: &str = "id";
pub const DATE_COLUMN: &str = "slot_date";
pub const START_TIME_COLUMN: &str = "start_time";
pub const END_TIME_COLUMN: &str = "end_time";
pub const MAX_BOOKINGS_COLUMN: &str = "max_bookings";
pub const CURRENT_BOOKINGS_COLUMN: &str = "current_bookings";
const CREATED_AT_COLUMN: &str = "created_at";

/// Delivery or pickup window with a booking counter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: TimeSlotId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_bookings: i32,
    pub current_bookings: i32,
    pub created_at: DateTime<Utc>,
}

impl TimeSlot {
    pub fn remaining(&self) -> i32 {
        (self.max_bookings - self.current_bookings).max(0)
    }

    pub fn has_capacity(&self) -> bool {
        self.current_bookings < self.max_bookings
    }
}

impl TryFrom<Row> for TimeSlot {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get(ID_COLUMN)?,
            date: row.try_get(DATE_COLUMN)?,
            start_time: row.try_get(START_TIME_COLUMN)?,
            end_time: row.try_get(END_TIME_COLUMN)?,
            max_bookings: row.try_get(MAX_BOOKINGS_COLUMN)?,
            current_bookings: row.try_get(CURRENT_BOOKINGS_COLUMN)?,
            created_at: row.try_get(CREATED_AT_COLUMN)?,
        })
    }
}

/// Public view of a slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSlotAvailability {
    #[serde(flatten)]
    pub slot: TimeSlot,
    pub remaining: i32,
    pub available: bool,
}

impl From<TimeSlot> for TimeSlotAvailability {
    fn from(slot: TimeSlot) -> Self {
        Self {
            remaining: slot.remaining(),
            available: slot.has_capacity(),
            slot,
        }
    }
}

fn validate_slot_times(slot: &NewTimeSlot) -> Result<(), ValidationError> {
    if slot.end_time <= slot.start_time {
        return Err(ValidationError::new("end_before_start"));
    }
    Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_slot_times", skip_on_field_errors = false))]
pub struct NewTimeSlot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[validate(range(min = 1, max = 1000))]
    pub max_bookings: i32,
}

impl Inserter for NewTimeSlot {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(DATE_COLUMN, self.date)
            .with_arg(START_TIME_COLUMN, self.start_time)
            .with_arg(END_TIME_COLUMN, self.end_time)
            .with_arg(MAX_BOOKINGS_COLUMN, self.max_bookings)
            .with_arg(CURRENT_BOOKINGS_COLUMN, 0i32)
            .with_arg(CREATED_AT_COLUMN, Utc::now())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimeSlotSearch {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub available_only: bool,
}

#[derive(Clone, Debug, Default)]
pub struct TimeSlotFilter {
    pub id: Option<TimeSlotId>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl From<TimeSlotId> for TimeSlotFilter {
    fn from(id: TimeSlotId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }
}

impl Filter for TimeSlotFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.id {
            b = b.with_filter(ID_COLUMN, v);
        }
        if let Some(v) = self.date_from {
            b = b.with_comparison(DATE_COLUMN, Comparison::Gte, v);
        }
        if let Some(v) = self.date_to {
            b = b.with_comparison(DATE_COLUMN, Comparison::Lte, v);
        }

        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(max_bookings: i32, current_bookings: i32) -> TimeSlot {
        TimeSlot {
            id: TimeSlotId(1),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            max_bookings,
            current_bookings,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn capacity() {
        assert!(slot(3, 2).has_capacity());
        assert!(!slot(3, 3).has_capacity());
        assert_eq!(slot(3, 1).remaining(), 2);
        assert_eq!(slot(3, 5).remaining(), 0);
    }

    #[test]
    fn end_must_follow_start() {
        let payload = NewTimeSlot {
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            max_bookings: 4,
        };
        assert!(payload.validate().is_err());
    }
}
