use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use tokio_postgres::Row;

use crate::db::*;
use crate::errors::RepoError;
use crate::types::{InactivityNotificationId, OrderId, UserId};

const ID_COLUMN: &str = "id";
const ORDER_ID_COLUMN: &str = "order_id";
const USER_ID_COLUMN: &str = "user_id";
const EMAIL_COLUMN: &str = "email";
const AMOUNT_TTC_COLUMN: &str = "amount_ttc";
const CREATED_AT_COLUMN: &str = "created_at";
const REMINDED_AT_COLUMN: &str = "reminded_at";
const RECOVERED_AT_COLUMN: &str = "recovered_at";
const LAST_LOGIN_AT_COLUMN: &str = "last_login_at";
const NOTIFIED_AT_COLUMN: &str = "notified_at";

/// Payment started but never completed. One row per order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AbandonedCheckout {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub email: String,
    pub amount_ttc: f64,
    pub created_at: DateTime<Utc>,
    pub reminded_at: Option<DateTime<Utc>>,
    pub recovered_at: Option<DateTime<Utc>>,
}

impl TryFrom<Row> for AbandonedCheckout {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        Ok(Self {
            order_id: row.try_get(ORDER_ID_COLUMN)?,
            user_id: row.try_get(USER_ID_COLUMN)?,
            email: row.try_get(EMAIL_COLUMN)?,
            amount_ttc: row.try_get(AMOUNT_TTC_COLUMN)?,
            created_at: row.try_get(CREATED_AT_COLUMN)?,
            reminded_at: row.try_get(REMINDED_AT_COLUMN)?,
            recovered_at: row.try_get(RECOVERED_AT_COLUMN)?,
        })
    }
}

pub struct NewAbandonedCheckout {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub email: String,
    pub amount_ttc: f64,
}

impl Inserter for NewAbandonedCheckout {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(ORDER_ID_COLUMN, self.order_id)
            .with_arg(USER_ID_COLUMN, self.user_id)
            .with_arg(EMAIL_COLUMN, self.email)
            .with_arg(AMOUNT_TTC_COLUMN, self.amount_ttc)
            .with_arg(CREATED_AT_COLUMN, Utc::now())
    }
}

#[derive(Clone, Debug, Default)]
pub struct AbandonedCheckoutFilter {
    pub order_id: Option<OrderId>,
    pub created_before: Option<DateTime<Utc>>,
    pub reminded: Option<bool>,
    pub recovered: Option<bool>,
}

impl From<OrderId> for AbandonedCheckoutFilter {
    fn from(order_id: OrderId) -> Self {
        Self {
            order_id: Some(order_id),
            ..Default::default()
        }
    }
}

impl AbandonedCheckoutFilter {
    /// Checkouts that still deserve a reminder.
    pub fn pending_reminder(created_before: DateTime<Utc>) -> Self {
        Self {
            order_id: None,
            created_before: Some(created_before),
            reminded: Some(false),
            recovered: Some(false),
        }
    }
}

impl Filter for AbandonedCheckoutFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.order_id {
            b = b.with_filter(ORDER_ID_COLUMN, v);
        }
        if let Some(v) = self.created_before {
            b = b.with_comparison(CREATED_AT_COLUMN, Comparison::Lt, v);
        }
        if let Some(v) = self.reminded {
            b = b.with_null(REMINDED_AT_COLUMN, !v);
        }
        if let Some(v) = self.recovered {
            b = b.with_null(RECOVERED_AT_COLUMN, !v);
        }

        b
    }
}

#[derive(Clone, Debug, Default)]
pub struct AbandonedCheckoutUpdateData {
    pub reminded_at: Option<DateTime<Utc>>,
    pub recovered_at: Option<DateTime<Utc>>,
}

pub struct AbandonedCheckoutUpdater {
    pub filter: AbandonedCheckoutFilter,
    pub data: AbandonedCheckoutUpdateData,
}

impl Updater for AbandonedCheckoutUpdater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        let AbandonedCheckoutUpdater { filter, data } = self;

        let mut b = UpdateBuilder::from(filter.into_filtered_operation_builder(table));

        if let Some(v) = data.reminded_at {
            b = b.with_value(REMINDED_AT_COLUMN, v);
        }
        if let Some(v) = data.recovered_at {
            b = b.with_value(RECOVERED_AT_COLUMN, v);
        }

        b
    }
}

/// Sent to a user who has not logged in for a while.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InactivityNotification {
    pub id: InactivityNotificationId,
    pub user_id: UserId,
    pub email: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub notified_at: DateTime<Utc>,
}

impl TryFrom<Row> for InactivityNotification {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get(ID_COLUMN)?,
            user_id: row.try_get(USER_ID_COLUMN)?,
            email: row.try_get(EMAIL_COLUMN)?,
            last_login_at: row.try_get(LAST_LOGIN_AT_COLUMN)?,
            notified_at: row.try_get(NOTIFIED_AT_COLUMN)?,
        })
    }
}

pub struct NewInactivityNotification {
    pub user_id: UserId,
    pub email: String,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Inserter for NewInactivityNotification {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(ID_COLUMN, InactivityNotificationId::new())
            .with_arg(USER_ID_COLUMN, self.user_id)
            .with_arg(EMAIL_COLUMN, self.email)
            .with_arg(LAST_LOGIN_AT_COLUMN, self.last_login_at)
            .with_arg(NOTIFIED_AT_COLUMN, Utc::now())
    }
}

#[derive(Clone, Debug, Default)]
pub struct InactivityNotificationFilter {
    pub user_id: Option<UserId>,
    pub notified_after: Option<DateTime<Utc>>,
}

impl Filter for InactivityNotificationFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.user_id {
            b = b.with_filter(USER_ID_COLUMN, v);
        }
        if let Some(v) = self.notified_after {
            b = b.with_comparison(NOTIFIED_AT_COLUMN, Comparison::Gt, v);
        }

        b
    }
}
