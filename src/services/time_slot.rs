use chrono::{Duration, Utc};

use super::types::{validate, ServiceContext, ServiceFuture};
use crate::acl;
use crate::db::Ordering;
use crate::errors::Error;
use crate::models::time_slot::{DATE_COLUMN, START_TIME_COLUMN};
use crate::models::*;
use crate::repos;
use crate::types::TimeSlotId;

/// Listing window when the caller gives no upper bound.
const DEFAULT_WINDOW_DAYS: i64 = 60;

pub trait TimeSlotService: Send + Sync {
    /// Slots in the date range with their remaining capacity
    fn list(&self, search: TimeSlotSearch) -> ServiceFuture<Vec<TimeSlotAvailability>>;
    fn create(&self, payload: NewTimeSlot) -> ServiceFuture<TimeSlot>;
    /// Refused while the slot still holds bookings
    fn delete(&self, id: TimeSlotId) -> ServiceFuture<TimeSlot>;
}

pub struct TimeSlotServiceImpl {
    pub ctx: ServiceContext,
    pub login: UserLogin,
}

impl TimeSlotServiceImpl {
    pub fn new(ctx: ServiceContext, login: UserLogin) -> Self {
        Self { ctx, login }
    }
}

impl TimeSlotService for TimeSlotServiceImpl {
    fn list(&self, search: TimeSlotSearch) -> ServiceFuture<Vec<TimeSlotAvailability>> {
        let ctx = self.ctx.clone();

        Box::pin(async move {
            let from = search.from.unwrap_or_else(|| Utc::now().date_naive());
            let to = search.to.unwrap_or(from + Duration::days(DEFAULT_WINDOW_DAYS));
            if to < from {
                return Ok(vec![]);
            }

            let conn = ctx.connection().await?;
            let slots = repos::time_slot::make_repo()
                .select_full(
                    &*conn,
                    TimeSlotFilter {
                        id: None,
                        date_from: Some(from),
                        date_to: Some(to),
                    },
                    |b| {
                        b.with_ordering(DATE_COLUMN, Ordering::Ascending)
                            .with_ordering(START_TIME_COLUMN, Ordering::Ascending)
                    },
                )
                .await?;

            Ok(slots
                .into_iter()
                .map(TimeSlotAvailability::from)
                .filter(|slot| !search.available_only || slot.available)
                .collect())
        })
    }

    fn create(&self, payload: NewTimeSlot) -> ServiceFuture<TimeSlot> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            validate(&payload)?;
            let conn = ctx.connection().await?;
            Ok(repos::time_slot::make_repo().insert_exactly_one(&*conn, payload).await?)
        })
    }

    fn delete(&self, id: TimeSlotId) -> ServiceFuture<TimeSlot> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            let conn = ctx.connection().await?;
            if let Some(deleted) = repos::time_slot::delete_unbooked(&*conn, id).await? {
                return Ok(deleted);
            }

            match repos::time_slot::make_repo().select_one(&*conn, id.into()).await? {
                Some(slot) => Err(format_err!("Time slot {} still holds {} bookings", id, slot.current_bookings)
                    .context(Error::Conflict)
                    .into()),
                None => Err(format_err!("Time slot {}", id).context(Error::NotFound).into()),
            }
        })
    }
}
