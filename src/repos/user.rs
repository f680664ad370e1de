use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use tokio_postgres::GenericClient;

use crate::db::*;
use crate::errors::RepoError;
use crate::models::user::{ID_COLUMN, LOCK_UNTIL_COLUMN, LOGIN_ATTEMPTS_COLUMN};
use crate::models::*;
use crate::types::UserId;

pub const TABLE: &str = "users";

pub type UserRepoImpl = DbRepoImpl<User, NewUser, UserFilter, UserUpdater>;

pub fn make_repo() -> UserRepoImpl {
    UserRepoImpl::new(TABLE)
}

lazy_static! {
    static ref FAILED_LOGIN_QUERY: String = {
        let previous = format!(
            "(CASE WHEN {lock} <= $2 THEN 0 ELSE {attempts} END)",
            lock = LOCK_UNTIL_COLUMN,
            attempts = LOGIN_ATTEMPTS_COLUMN,
        );
        format!(
            "UPDATE {table} SET \
             {attempts} = CASE WHEN {previous} + 1 >= $3 THEN 0 ELSE {previous} + 1 END, \
             {lock} = CASE WHEN {previous} + 1 >= $3 THEN $4 WHEN {lock} > $2 THEN {lock} ELSE NULL END \
             WHERE {id} = $1 RETURNING *;",
            table = TABLE,
            attempts = LOGIN_ATTEMPTS_COLUMN,
            lock = LOCK_UNTIL_COLUMN,
            id = ID_COLUMN,
            previous = previous,
        )
    };
}

/// Counts one failed password check in a single statement. Reaching
/// `max_attempts` sets the lock and restarts the counter; an expired lock
/// restarts it too.
pub async fn record_failed_login<C>(
    conn: &C,
    id: UserId,
    now: DateTime<Utc>,
    max_attempts: i32,
    lock_until: DateTime<Utc>,
) -> Result<User, RepoError>
where
    C: GenericClient + Sync,
{
    let row = conn
        .query_opt(FAILED_LOGIN_QUERY.as_str(), &[&id, &now, &max_attempts, &lock_until])
        .await?
        .ok_or(RepoError::NotFound)?;
    User::try_from(row)
}
