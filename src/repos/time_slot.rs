use std::convert::TryFrom;

use tokio_postgres::GenericClient;

use crate::db::*;
use crate::errors::RepoError;
use crate::models::time_slot::*;
use crate::types::TimeSlotId;

pub const TABLE: &str = "time_slots";

pub type TimeSlotRepoImpl = DbRepoImpl<TimeSlot, NewTimeSlot, TimeSlotFilter, NoUpdater>;

pub fn make_repo() -> TimeSlotRepoImpl {
    TimeSlotRepoImpl::new(TABLE)
}

lazy_static! {
    static ref RESERVE_QUERY: String = format!(
        "UPDATE {table} SET {current} = {current} + 1 WHERE {id} = $1 AND {current} < {max} RETURNING *;",
        table = TABLE,
        current = CURRENT_BOOKINGS_COLUMN,
        max = MAX_BOOKINGS_COLUMN,
        id = ID_COLUMN,
    );
    static ref RELEASE_QUERY: String = format!(
        "UPDATE {table} SET {current} = GREATEST({current} - 1, 0) WHERE {id} = $1 RETURNING *;",
        table = TABLE,
        current = CURRENT_BOOKINGS_COLUMN,
        id = ID_COLUMN,
    );
    static ref DELETE_UNBOOKED_QUERY: String = format!(
        "DELETE FROM {table} WHERE {id} = $1 AND {current} = 0 RETURNING *;",
        table = TABLE,
        current = CURRENT_BOOKINGS_COLUMN,
        id = ID_COLUMN,
    );
}

/// Takes one booking on the slot. `None` when the slot is full or unknown;
/// the check and the increment are a single statement.
pub async fn reserve<C>(conn: &C, id: TimeSlotId) -> Result<Option<TimeSlot>, RepoError>
where
    C: GenericClient + Sync,
{
    debug!("Reserving time slot {}", id);
    match conn.query_opt(RESERVE_QUERY.as_str(), &[&id]).await? {
        Some(row) => TimeSlot::try_from(row).map(Some),
        None => Ok(None),
    }
}

/// Gives one booking back, never going below zero.
pub async fn release<C>(conn: &C, id: TimeSlotId) -> Result<Option<TimeSlot>, RepoError>
where
    C: GenericClient + Sync,
{
    debug!("Releasing time slot {}", id);
    match conn.query_opt(RELEASE_QUERY.as_str(), &[&id]).await? {
        Some(row) => TimeSlot::try_from(row).map(Some),
        None => Ok(None),
    }
}

/// Deletes the slot only while nobody holds a booking on it. `None` when the
/// slot is booked or unknown.
pub async fn delete_unbooked<C>(conn: &C, id: TimeSlotId) -> Result<Option<TimeSlot>, RepoError>
where
    C: GenericClient + Sync,
{
    debug!("Deleting time slot {}", id);
    match conn.query_opt(DELETE_UNBOOKED_QUERY.as_str(), &[&id]).await? {
        Some(row) => TimeSlot::try_from(row).map(Some),
        None => Ok(None),
    }
}
