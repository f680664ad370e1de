use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use tokio_postgres::Row;

use crate::db::*;
use crate::errors::RepoError;
use crate::models::User;
use crate::types::{SessionId, UserId};

const ID_COLUMN: &str = "id";
const USER_ID_COLUMN: &str = "user_id";
const TOKEN_COLUMN: &str = "token";
const USER_AGENT_COLUMN: &str = "user_agent";
const CREATED_AT_COLUMN: &str = "created_at";
const EXPIRES_AT_COLUMN: &str = "expires_at";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    #[serde(skip_serializing, default)]
    pub token: String,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl TryFrom<Row> for Session {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get(ID_COLUMN)?,
            user_id: row.try_get(USER_ID_COLUMN)?,
            token: row.try_get(TOKEN_COLUMN)?,
            user_agent: row.try_get(USER_AGENT_COLUMN)?,
            created_at: row.try_get(CREATED_AT_COLUMN)?,
            expires_at: row.try_get(EXPIRES_AT_COLUMN)?,
        })
    }
}

/// Returned once, on login. The token is never readable afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

pub struct NewSession {
    pub user_id: UserId,
    pub token: String,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Inserter for NewSession {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(ID_COLUMN, SessionId::new())
            .with_arg(USER_ID_COLUMN, self.user_id)
            .with_arg(TOKEN_COLUMN, self.token)
            .with_arg(USER_AGENT_COLUMN, self.user_agent)
            .with_arg(CREATED_AT_COLUMN, Utc::now())
            .with_arg(EXPIRES_AT_COLUMN, self.expires_at)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SessionFilter {
    pub id: Option<SessionId>,
    pub user_id: Option<UserId>,
    pub token: Option<String>,
    pub expired_before: Option<DateTime<Utc>>,
}

impl Filter for SessionFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.id {
            b = b.with_filter(ID_COLUMN, v);
        }
        if let Some(v) = self.user_id {
            b = b.with_filter(USER_ID_COLUMN, v);
        }
        if let Some(v) = self.token {
            b = b.with_filter(TOKEN_COLUMN, v);
        }
        if let Some(v) = self.expired_before {
            b = b.with_comparison(EXPIRES_AT_COLUMN, Comparison::Lte, v);
        }

        b
    }
}
