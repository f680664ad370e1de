use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use tokio_postgres::Row;

use crate::db::*;
use crate::errors::RepoError;
use crate::types::{EmailLogId, OrderId};

const ID_COLUMN: &str = "id";
const RECIPIENT_COLUMN: &str = "recipient";
const TEMPLATE_COLUMN: &str = "template";
const SUBJECT_COLUMN: &str = "subject";
const STATUS_COLUMN: &str = "status";
const ERROR_COLUMN: &str = "error";
const ORDER_ID_COLUMN: &str = "order_id";
const CREATED_AT_COLUMN: &str = "created_at";

db_enum! {
    pub enum EmailStatus {
        Sent => "sent",
        Failed => "failed",
        Skipped => "skipped",
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmailLog {
    pub id: EmailLogId,
    pub recipient: String,
    pub template: String,
    pub subject: String,
    pub status: EmailStatus,
    pub error: Option<String>,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<Row> for EmailLog {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        let status: String = row.try_get(STATUS_COLUMN)?;
        Ok(Self {
            id: row.try_get(ID_COLUMN)?,
            recipient: row.try_get(RECIPIENT_COLUMN)?,
            template: row.try_get(TEMPLATE_COLUMN)?,
            subject: row.try_get(SUBJECT_COLUMN)?,
            status: status.parse()?,
            error: row.try_get(ERROR_COLUMN)?,
            order_id: row.try_get(ORDER_ID_COLUMN)?,
            created_at: row.try_get(CREATED_AT_COLUMN)?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct NewEmailLog {
    pub recipient: String,
    pub template: String,
    pub subject: String,
    pub status: EmailStatus,
    pub error: Option<String>,
    pub order_id: Option<OrderId>,
}

impl Inserter for NewEmailLog {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(ID_COLUMN, EmailLogId::new())
            .with_arg(RECIPIENT_COLUMN, self.recipient)
            .with_arg(TEMPLATE_COLUMN, self.template)
            .with_arg(SUBJECT_COLUMN, self.subject)
            .with_arg(STATUS_COLUMN, self.status.to_string())
            .with_arg(ERROR_COLUMN, self.error)
            .with_arg(ORDER_ID_COLUMN, self.order_id)
            .with_arg(CREATED_AT_COLUMN, Utc::now())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EmailLogSearchTerms {
    pub recipient: Option<String>,
    pub status: Option<EmailStatus>,
    pub order_id: Option<OrderId>,
    pub offset: Option<i64>,
    pub count: Option<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct EmailLogFilter {
    pub recipient: Option<String>,
    pub status: Option<EmailStatus>,
    pub order_id: Option<OrderId>,
}

impl Filter for EmailLogFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.recipient {
            b = b.with_filter(RECIPIENT_COLUMN, v.to_lowercase());
        }
        if let Some(v) = self.status {
            b = b.with_filter(STATUS_COLUMN, v.to_string());
        }
        if let Some(v) = self.order_id {
            b = b.with_filter(ORDER_ID_COLUMN, v);
        }

        b
    }
}

pub fn email_log_by_newest(b: FilteredOperationBuilder) -> FilteredOperationBuilder {
    b.with_ordering(CREATED_AT_COLUMN, Ordering::Descending)
}
