//! Orders: placement with slot reservation, the status machine and the
//! delivery-date negotiation between admins and customers.

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use failure::Error as FailureError;
use serde_json::json;
use tokio_postgres::GenericClient;
use validator::{ValidationError, ValidationErrors};

use super::notification::{Notification, Notifier};
use super::pricing::price_configuration;
use super::types::{validate, ServiceContext, ServiceFuture};
use crate::acl::{self, Action};
use crate::config::Config;
use crate::errors::{Error, RepoError};
use crate::models::*;
use crate::repos;
use crate::types::{OrderId, TimeSlotId};

pub trait OrderService: Send + Sync {
    /// Books one configuration for the current user
    fn create_order(&self, configuration: BookingConfiguration) -> ServiceFuture<Order>;
    /// Turns every cart item into an order, all or nothing
    fn checkout(&self) -> ServiceFuture<Vec<Order>>;
    /// Orders of the current user, newest first
    fn list_mine(&self) -> ServiceFuture<Vec<Order>>;
    fn get_order(&self, id: OrderIdentifier) -> ServiceFuture<Order>;
    fn cancel(&self, id: OrderId) -> ServiceFuture<Order>;
    /// Customer answer to a proposed delivery date
    fn respond_delivery_date(&self, id: OrderId, payload: DeliveryDateResponsePayload) -> ServiceFuture<Order>;
    /// Search using the terms provided.
    fn search(&self, terms: OrderSearchTerms) -> ServiceFuture<OrderSearchResults>;
    fn set_status(&self, id: OrderId, payload: SetOrderStatusPayload) -> ServiceFuture<Order>;
    fn propose_delivery_date(&self, id: OrderId, payload: ProposeDeliveryDatePayload) -> ServiceFuture<Order>;
    fn delete_order(&self, id: OrderId) -> ServiceFuture<Order>;
    /// Audit trail of the order, oldest first
    fn history(&self, id: OrderId) -> ServiceFuture<Vec<AuditLog>>;
}

pub struct OrderServiceImpl {
    pub ctx: ServiceContext,
    pub login: UserLogin,
}

impl OrderServiceImpl {
    pub fn new(ctx: ServiceContext, login: UserLogin) -> Self {
        Self { ctx, login }
    }
}

pub async fn audit_order<C>(conn: &C, login: UserLogin, order_id: OrderId, action: &str, details: serde_json::Value) -> Result<(), FailureError>
where
    C: GenericClient + Sync,
{
    repos::audit_log::make_repo()
        .insert_exactly_one(conn, NewAuditLog::new(AuditEntity::Order, order_id, action, login.user_id(), details))
        .await?;
    Ok(())
}

async fn reserve_slot<C>(conn: &C, id: TimeSlotId) -> Result<TimeSlot, FailureError>
where
    C: GenericClient + Sync,
{
    if let Some(slot) = repos::time_slot::reserve(conn, id).await? {
        return Ok(slot);
    }
    match repos::time_slot::make_repo().select_one(conn, id.into()).await? {
        Some(_) => Err(format_err!("Time slot {} is full", id).context(Error::SlotFull).into()),
        None => Err(format_err!("Time slot {}", id).context(Error::NotFound).into()),
    }
}

/// Takes one booking on each slot of the configuration.
async fn reserve_slots<C>(conn: &C, configuration: &BookingConfiguration) -> Result<BookedSlots, FailureError>
where
    C: GenericClient + Sync,
{
    let mut slots = BookedSlots::default();
    if let Some(id) = configuration.delivery_slot_id {
        slots.delivery = Some(reserve_slot(conn, id).await?);
    }
    if let Some(id) = configuration.pickup_slot_id {
        slots.pickup = Some(reserve_slot(conn, id).await?);
    }

    if let (Some(delivery), Some(pickup)) = (&slots.delivery, &slots.pickup) {
        if pickup.date < delivery.date {
            let mut errors = ValidationErrors::new();
            errors.add("pickup_slot_id", ValidationError::new("pickup_before_delivery"));
            return Err(format_err!("Pickup is scheduled before delivery").context(Error::Validate(errors)).into());
        }
    }

    Ok(slots)
}

pub async fn release_slots<C>(conn: &C, configuration: &BookingConfiguration) -> Result<(), RepoError>
where
    C: GenericClient + Sync,
{
    for id in configuration.slot_ids() {
        repos::time_slot::release(conn, id).await?;
    }
    Ok(())
}

/// Prices, reserves and inserts one order. Meant to run inside a transaction.
async fn place_order<C>(conn: &C, config: &Config, login: UserLogin, user: &User, configuration: BookingConfiguration) -> Result<Order, FailureError>
where
    C: GenericClient + Sync,
{
    let quote = price_configuration(conn, config, &configuration).await?;
    let slots = reserve_slots(conn, &configuration).await?;

    let order = repos::order::make_repo()
        .insert_exactly_one(
            conn,
            NewOrder {
                user_id: user.id,
                customer: CustomerSnapshot::from(user),
                service_name: quote.service.name,
                waste_type_name: quote.waste_type.name,
                configuration,
                delivery_date: slots.delivery.map(|slot| slot.date),
                pickup_date: slots.pickup.map(|slot| slot.date),
                price: quote.price,
            },
        )
        .await?;
    audit_order(conn, login, order.id, "created", json!({ "total_ttc": order.price.total_ttc })).await?;
    info!("Placed order {} for user {}", order.number(), user.id);

    Ok(order)
}

/// Applies a status change if the machine allows it. The update is guarded
/// by the status that was read, so concurrent changes end in `Conflict`.
async fn change_status(ctx: &ServiceContext, login: UserLogin, order: Order, next: OrderStatus, comment: Option<String>) -> Result<Order, FailureError> {
    if !order.status.can_transition_to(next) {
        return Err(format_err!("Order {} cannot go from {} to {}", order.number(), order.status, next)
            .context(Error::InvalidTransition)
            .into());
    }

    let mut conn = ctx.connection().await?;
    let tx = conn.transaction().await.map_err(RepoError::from)?;
    let updated = repos::order::make_repo()
        .update(
            &tx,
            OrderUpdater {
                filter: OrderFilter {
                    id: Some(order.id),
                    status: Some(order.status),
                    ..Default::default()
                },
                data: OrderUpdateData {
                    status: Some(next),
                    admin_comment: comment.clone(),
                    ..Default::default()
                },
            },
        )
        .await?
        .pop()
        .ok_or_else(|| format_err!("Order {} changed concurrently", order.number()).context(Error::Conflict))?;

    if next == OrderStatus::Cancelled {
        release_slots(&tx, &updated.configuration).await?;
    }
    audit_order(
        &tx,
        login,
        updated.id,
        "status_changed",
        json!({ "from": order.status, "to": next, "comment": comment }),
    )
    .await?;
    tx.commit().await.map_err(RepoError::from)?;

    Notifier::new(ctx)
        .notify(
            updated.customer.email.clone(),
            Some(updated.customer.full_name()),
            Notification::OrderStatusChanged {
                order: updated.clone(),
                comment,
            },
        )
        .await;

    Ok(updated)
}

async fn load_order(ctx: &ServiceContext, id: OrderIdentifier) -> Result<Order, FailureError> {
    let conn = ctx.connection().await?;
    repos::order::make_repo()
        .select_one(&*conn, id.into())
        .await?
        .ok_or_else(|| format_err!("Order {:?}", id).context(Error::NotFound).into())
}

impl OrderService for OrderServiceImpl {
    fn create_order(&self, configuration: BookingConfiguration) -> ServiceFuture<Order> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let user_id = acl::require_user(&login)?;
            let order = {
                let mut conn = ctx.connection().await?;
                let user = repos::user::make_repo().select_exactly_one(&*conn, user_id.into()).await?;
                let tx = conn.transaction().await.map_err(RepoError::from)?;
                let order = place_order(&tx, &ctx.config, login, &user, configuration).await?;
                tx.commit().await.map_err(RepoError::from)?;
                order
            };

            Notifier::new(&ctx)
                .notify(
                    order.customer.email.clone(),
                    Some(order.customer.full_name()),
                    Notification::OrderReceived { order: order.clone() },
                )
                .await;

            Ok(order)
        })
    }

    fn checkout(&self) -> ServiceFuture<Vec<Order>> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let user_id = acl::require_user(&login)?;
            let customer = CartCustomer::User(user_id);
            let orders = {
                let mut conn = ctx.connection().await?;
                let user = repos::user::make_repo().select_exactly_one(&*conn, user_id.into()).await?;
                let cart_repo = repos::cart_item::make_repo();
                let tx = conn.transaction().await.map_err(RepoError::from)?;

                let items = cart_repo
                    .select(
                        &tx,
                        CartItemFilter {
                            id: None,
                            customer: Some(customer),
                        },
                    )
                    .await?;
                if items.is_empty() {
                    let mut errors = ValidationErrors::new();
                    errors.add("cart", ValidationError::new("empty"));
                    return Err(format_err!("Cart of user {} is empty", user_id).context(Error::Validate(errors)).into());
                }

                let mut orders = Vec::with_capacity(items.len());
                for item in items {
                    orders.push(place_order(&tx, &ctx.config, login, &user, item.configuration).await?);
                }
                cart_repo
                    .delete(
                        &tx,
                        CartItemFilter {
                            id: None,
                            customer: Some(customer),
                        },
                    )
                    .await?;
                tx.commit().await.map_err(RepoError::from)?;
                orders
            };

            let notifier = Notifier::new(&ctx);
            for order in &orders {
                notifier
                    .notify(
                        order.customer.email.clone(),
                        Some(order.customer.full_name()),
                        Notification::OrderReceived { order: order.clone() },
                    )
                    .await;
            }

            Ok(orders)
        })
    }

    fn list_mine(&self) -> ServiceFuture<Vec<Order>> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let user_id = acl::require_user(&login)?;
            let conn = ctx.connection().await?;
            Ok(repos::order::make_repo()
                .select_full(
                    &*conn,
                    OrderFilter {
                        user_id: Some(user_id),
                        ..Default::default()
                    },
                    order_by_newest,
                )
                .await?)
        })
    }

    fn get_order(&self, id: OrderIdentifier) -> ServiceFuture<Order> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let order = load_order(&ctx, id).await?;
            acl::ensure_access(&login, order.user_id, Action::Read)?;
            Ok(order)
        })
    }

    fn cancel(&self, id: OrderId) -> ServiceFuture<Order> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_user(&login)?;
            let order = load_order(&ctx, OrderIdentifier::Id(id)).await?;
            acl::ensure_access(&login, order.user_id, Action::Update)?;
            change_status(&ctx, login, order, OrderStatus::Cancelled, None).await
        })
    }

    fn respond_delivery_date(&self, id: OrderId, payload: DeliveryDateResponsePayload) -> ServiceFuture<Order> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_user(&login)?;
            let order = load_order(&ctx, OrderIdentifier::Id(id)).await?;
            acl::ensure_access(&login, order.user_id, Action::Update)?;

            let proposed = pending_proposal(order.status, order.delivery_date_status, order.proposed_delivery_date)
                .map_err(|kind| {
                    format_err!("Order {} ({}) takes no delivery date answer", order.number(), order.status).context(kind)
                })?;
            let data = if payload.accept {
                OrderUpdateData {
                    delivery_date: Some(Some(proposed)),
                    delivery_date_status: Some(Some(DeliveryDateStatus::Accepted)),
                    ..Default::default()
                }
            } else {
                OrderUpdateData {
                    delivery_date_status: Some(Some(DeliveryDateStatus::Rejected)),
                    ..Default::default()
                }
            };

            let updated = {
                let mut conn = ctx.connection().await?;
                let tx = conn.transaction().await.map_err(RepoError::from)?;
                let updated = repos::order::make_repo()
                    .update_exactly_one(&tx, OrderUpdater { filter: id.into(), data })
                    .await?;
                let action = if payload.accept { "delivery_date_accepted" } else { "delivery_date_rejected" };
                audit_order(&tx, login, id, action, json!({ "date": proposed })).await?;
                tx.commit().await.map_err(RepoError::from)?;
                updated
            };

            let comment = if payload.accept {
                format!("Vous avez accepté la livraison du {}.", proposed.format("%d/%m/%Y"))
            } else {
                format!("Vous avez refusé la livraison du {}. Nous revenons vers vous.", proposed.format("%d/%m/%Y"))
            };
            Notifier::new(&ctx)
                .notify(
                    updated.customer.email.clone(),
                    Some(updated.customer.full_name()),
                    Notification::OrderStatusChanged {
                        order: updated.clone(),
                        comment: Some(comment),
                    },
                )
                .await;

            Ok(updated)
        })
    }

    fn search(&self, terms: OrderSearchTerms) -> ServiceFuture<OrderSearchResults> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            let paging = Paging {
                offset: terms.offset,
                count: terms.count,
            };
            let filter = OrderFilter {
                status: terms.status,
                payment_status: terms.payment_status,
                email_like: terms.email.filter(|e| !e.trim().is_empty()),
                created_from: terms.created_from.map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN))),
                created_to: terms
                    .created_to
                    .map(|d| Utc.from_utc_datetime(&(d + Duration::days(1)).and_time(NaiveTime::MIN))),
                ..Default::default()
            };

            let conn = ctx.connection().await?;
            let repo = repos::order::make_repo();
            let total_count = repo.count(&*conn, filter.clone()).await?;
            let orders = repo
                .select_full(&*conn, filter, |b| {
                    order_by_newest(b).with_limit(Some(paging.limit())).with_offset(Some(paging.offset()))
                })
                .await?;

            Ok(OrderSearchResults { total_count, orders })
        })
    }

    fn set_status(&self, id: OrderId, payload: SetOrderStatusPayload) -> ServiceFuture<Order> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            validate(&payload)?;
            let order = load_order(&ctx, OrderIdentifier::Id(id)).await?;
            change_status(&ctx, login, order, payload.status, payload.comment).await
        })
    }

    fn propose_delivery_date(&self, id: OrderId, payload: ProposeDeliveryDatePayload) -> ServiceFuture<Order> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            validate(&payload)?;
            let order = load_order(&ctx, OrderIdentifier::Id(id)).await?;
            if order.status.is_terminal() {
                return Err(format_err!("Order {} is {}", order.number(), order.status)
                    .context(Error::InvalidTransition)
                    .into());
            }

            let updated = {
                let mut conn = ctx.connection().await?;
                let tx = conn.transaction().await.map_err(RepoError::from)?;
                let updated = repos::order::make_repo()
                    .update_exactly_one(
                        &tx,
                        OrderUpdater {
                            filter: id.into(),
                            data: OrderUpdateData {
                                proposed_delivery_date: Some(Some(payload.date)),
                                delivery_date_status: Some(Some(DeliveryDateStatus::Proposed)),
                                admin_comment: payload.comment.clone(),
                                ..Default::default()
                            },
                        },
                    )
                    .await?;
                audit_order(
                    &tx,
                    login,
                    id,
                    "delivery_date_proposed",
                    json!({ "date": payload.date, "comment": payload.comment }),
                )
                .await?;
                tx.commit().await.map_err(RepoError::from)?;
                updated
            };

            Notifier::new(&ctx)
                .notify(
                    updated.customer.email.clone(),
                    Some(updated.customer.full_name()),
                    Notification::DeliveryDateProposed {
                        order: updated.clone(),
                        comment: payload.comment,
                    },
                )
                .await;

            Ok(updated)
        })
    }

    fn delete_order(&self, id: OrderId) -> ServiceFuture<Order> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            let mut conn = ctx.connection().await?;
            let tx = conn.transaction().await.map_err(RepoError::from)?;
            let order = repos::order::make_repo()
                .delete(&tx, id.into())
                .await?
                .pop()
                .ok_or_else(|| format_err!("Order {}", id).context(Error::NotFound))?;
            if !order.status.is_terminal() {
                release_slots(&tx, &order.configuration).await?;
            }
            audit_order(&tx, login, id, "deleted", json!({ "number": order.number() })).await?;
            tx.commit().await.map_err(RepoError::from)?;
            warn!("Order {} deleted", order.number());
            Ok(order)
        })
    }

    fn history(&self, id: OrderId) -> ServiceFuture<Vec<AuditLog>> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            let conn = ctx.connection().await?;
            Ok(repos::audit_log::make_repo()
                .select_full(
                    &*conn,
                    AuditLogFilter {
                        entity_type: Some(AuditEntity::Order),
                        entity_id: Some(id.to_string()),
                    },
                    audit_log_by_oldest,
                )
                .await?)
        })
    }
}

/// Date the customer is asked to accept. Closed orders take no answer.
fn pending_proposal(
    status: OrderStatus,
    delivery_date_status: Option<DeliveryDateStatus>,
    proposed: Option<NaiveDate>,
) -> Result<NaiveDate, Error> {
    if status.is_terminal() {
        return Err(Error::InvalidTransition);
    }
    match (delivery_date_status, proposed) {
        (Some(DeliveryDateStatus::Proposed), Some(date)) => Ok(date),
        _ => Err(Error::Conflict),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_orders_take_no_delivery_date_answer() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 14);
        let proposed = Some(DeliveryDateStatus::Proposed);

        assert_eq!(pending_proposal(OrderStatus::Confirmed, proposed, date), Ok(date.unwrap()));
        assert_eq!(pending_proposal(OrderStatus::Cancelled, proposed, date), Err(Error::InvalidTransition));
        assert_eq!(pending_proposal(OrderStatus::Completed, proposed, date), Err(Error::InvalidTransition));
        assert_eq!(
            pending_proposal(OrderStatus::Pending, Some(DeliveryDateStatus::Accepted), date),
            Err(Error::Conflict)
        );
        assert_eq!(pending_proposal(OrderStatus::Pending, None, None), Err(Error::Conflict));
    }
}
