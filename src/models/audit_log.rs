use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio_postgres::Row;

use crate::db::*;
use crate::errors::RepoError;
use crate::types::{AuditLogId, UserId};

const ID_COLUMN: &str = "id";
const ENTITY_TYPE_COLUMN: &str = "entity_type";
const ENTITY_ID_COLUMN: &str = "entity_id";
const ACTION_COLUMN: &str = "action";
const ACTOR_ID_COLUMN: &str = "actor_id";
const DETAILS_COLUMN: &str = "details";
const CREATED_AT_COLUMN: &str = "created_at";

db_enum! {
    pub enum AuditEntity {
        Order => "order",
        User => "user",
        FidDocument => "fid_document",
        Service => "service",
        Pricing => "pricing",
        CompanyActivities => "company_activities",
    }
}

/// Append-only record of a change made through the API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: AuditLogId,
    pub entity_type: AuditEntity,
    pub entity_id: String,
    pub action: String,
    pub actor_id: Option<UserId>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<Row> for AuditLog {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        let entity_type: String = row.try_get(ENTITY_TYPE_COLUMN)?;
        Ok(Self {
            id: row.try_get(ID_COLUMN)?,
            entity_type: entity_type.parse()?,
            entity_id: row.try_get(ENTITY_ID_COLUMN)?,
            action: row.try_get(ACTION_COLUMN)?,
            actor_id: row.try_get(ACTOR_ID_COLUMN)?,
            details: row.try_get(DETAILS_COLUMN)?,
            created_at: row.try_get(CREATED_AT_COLUMN)?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct NewAuditLog {
    pub entity_type: AuditEntity,
    pub entity_id: String,
    pub action: String,
    pub actor_id: Option<UserId>,
    pub details: Value,
}

impl NewAuditLog {
    pub fn new<I: ToString, A: Into<String>>(entity_type: AuditEntity, entity_id: I, action: A, actor_id: Option<UserId>, details: Value) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.to_string(),
            action: action.into(),
            actor_id,
            details,
        }
    }
}

impl Inserter for NewAuditLog {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(ID_COLUMN, AuditLogId::new())
            .with_arg(ENTITY_TYPE_COLUMN, self.entity_type.to_string())
            .with_arg(ENTITY_ID_COLUMN, self.entity_id)
            .with_arg(ACTION_COLUMN, self.action)
            .with_arg(ACTOR_ID_COLUMN, self.actor_id)
            .with_arg(DETAILS_COLUMN, self.details)
            .with_arg(CREATED_AT_COLUMN, Utc::now())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuditLogSearchTerms {
    pub entity_type: Option<AuditEntity>,
    pub entity_id: Option<String>,
    pub offset: Option<i64>,
    pub count: Option<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct AuditLogFilter {
    pub entity_type: Option<AuditEntity>,
    pub entity_id: Option<String>,
}

impl Filter for AuditLogFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.entity_type {
            b = b.with_filter(ENTITY_TYPE_COLUMN, v.to_string());
        }
        if let Some(v) = self.entity_id {
            b = b.with_filter(ENTITY_ID_COLUMN, v);
        }

        b
    }
}

pub fn audit_log_by_newest(b: FilteredOperationBuilder) -> FilteredOperationBuilder {
    b.with_ordering(CREATED_AT_COLUMN, Ordering::Descending)
}

pub fn audit_log_by_oldest(b: FilteredOperationBuilder) -> FilteredOperationBuilder {
    b.with_ordering(CREATED_AT_COLUMN, Ordering::Ascending)
}
