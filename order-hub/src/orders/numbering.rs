//! Human-readable order numbers
//!
//! Format: `<dayOfMonth><perDayCounter>` without zero-padding, so the 2nd order
//! on the 16th is `"162"`. Unique per restaurant per calendar day only; the
//! calendar day is taken in the business timezone.

use super::storage::{OrderStorage, StorageResult};
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use redb::WriteTransaction;

/// Calendar day an order belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessDay {
    /// `YYYYMMDD`, counter key
    pub date_key: String,
    pub day_of_month: u32,
}

impl BusinessDay {
    pub fn at(now: DateTime<Utc>, tz: Tz) -> Self {
        let local = now.with_timezone(&tz);
        Self {
            date_key: local.format("%Y%m%d").to_string(),
            day_of_month: local.day(),
        }
    }

    pub fn order_number(&self, counter: u64) -> String {
        format!("{}{}", self.day_of_month, counter)
    }
}

/// Allocated order number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderNumber {
    pub counter: u64,
    pub date_key: String,
    pub display: String,
}

/// Mints order numbers from the per-day counter table
#[derive(Debug, Clone, Copy)]
pub struct OrderNumberGenerator {
    tz: Tz,
}

impl OrderNumberGenerator {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Allocate the next number inside `txn`
    ///
    /// The counter only advances if `txn` commits.
    pub fn next_in(
        &self,
        storage: &OrderStorage,
        txn: &WriteTransaction,
        restaurant_id: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<OrderNumber> {
        let day = BusinessDay::at(now, self.tz);
        let counter = storage.increment_day_counter(txn, restaurant_id, &day.date_key)?;
        Ok(OrderNumber {
            counter,
            display: day.order_number(counter),
            date_key: day.date_key,
        })
    }
}
