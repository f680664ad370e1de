//! Card payments through the provider's payment intents.

use chrono::Utc;
use serde_json::json;

use super::notification::{Notification, Notifier};
use super::order::audit_order;
use super::types::{ServiceContext, ServiceFuture};
use crate::acl::{self, Action};
use crate::clients::{CreatePaymentIntent, PaymentIntent};
use crate::errors::{Error, RepoError};
use crate::models::*;
use crate::repos;
use crate::types::OrderId;

/// What the checkout page needs to mount the card form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntentResponse {
    pub order_id: OrderId,
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub publishable_key: String,
    pub amount_cents: i64,
    pub currency: String,
}

/// An existing intent can be handed out again while it is still payable
/// for the current amount.
pub fn is_reusable(intent: &PaymentIntent, amount_cents: i64) -> bool {
    intent.amount == amount_cents && intent.status != "succeeded" && intent.status != "canceled"
}

pub trait PaymentService: Send + Sync {
    fn create_intent(&self, order_id: OrderId) -> ServiceFuture<PaymentIntentResponse>;
    /// Reads the intent back from the provider and applies its outcome
    fn confirm(&self, order_id: OrderId) -> ServiceFuture<Order>;
}

pub struct PaymentServiceImpl {
    pub ctx: ServiceContext,
    pub login: UserLogin,
}

impl PaymentServiceImpl {
    pub fn new(ctx: ServiceContext, login: UserLogin) -> Self {
        Self { ctx, login }
    }
}

impl PaymentService for PaymentServiceImpl {
    fn create_intent(&self, order_id: OrderId) -> ServiceFuture<PaymentIntentResponse> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_user(&login)?;
            let order = {
                let conn = ctx.connection().await?;
                repos::order::make_repo().select_exactly_one(&*conn, order_id.into()).await?
            };
            acl::ensure_access(&login, order.user_id, Action::Update)?;

            if order.payment_status == PaymentStatus::Paid {
                return Err(format_err!("Order {} is already paid", order.number()).context(Error::Conflict).into());
            }
            if order.status == OrderStatus::Cancelled {
                return Err(format_err!("Order {} is cancelled", order.number()).context(Error::InvalidTransition).into());
            }

            let amount_cents = order.price.total_ttc_cents();
            let existing = match order.payment_intent_id.clone() {
                Some(intent_id) => Some(ctx.payment.retrieve_intent(intent_id).await?).filter(|intent| is_reusable(intent, amount_cents)),
                None => None,
            };
            let intent = match existing {
                Some(intent) => intent,
                None => {
                    ctx.payment
                        .create_intent(CreatePaymentIntent {
                            amount_cents,
                            currency: ctx.config.payment.currency.clone(),
                            order_id: order.id.to_string(),
                            order_number: order.number(),
                            receipt_email: order.customer.email.clone(),
                        })
                        .await?
                }
            };

            {
                let conn = ctx.connection().await?;
                if order.payment_intent_id.as_ref() != Some(&intent.id) {
                    repos::order::make_repo()
                        .update_exactly_one(
                            &*conn,
                            OrderUpdater {
                                filter: order.id.into(),
                                data: OrderUpdateData {
                                    payment_intent_id: Some(intent.id.clone()),
                                    ..Default::default()
                                },
                            },
                        )
                        .await?;
                    audit_order(&*conn, login, order.id, "payment_intent_created", json!({ "payment_intent_id": intent.id })).await?;
                }

                let checkout_repo = repos::marketing::make_abandoned_checkout_repo();
                if checkout_repo.select_one(&*conn, order.id.into()).await?.is_none() {
                    checkout_repo
                        .insert_exactly_one(
                            &*conn,
                            NewAbandonedCheckout {
                                order_id: order.id,
                                user_id: order.user_id,
                                email: order.customer.email.clone(),
                                amount_ttc: order.price.total_ttc,
                            },
                        )
                        .await?;
                }
            }

            Ok(PaymentIntentResponse {
                order_id: order.id,
                payment_intent_id: intent.id,
                client_secret: intent.client_secret,
                publishable_key: ctx.config.payment.publishable_key.clone(),
                amount_cents,
                currency: intent.currency,
            })
        })
    }

    fn confirm(&self, order_id: OrderId) -> ServiceFuture<Order> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_user(&login)?;
            let order = {
                let conn = ctx.connection().await?;
                repos::order::make_repo().select_exactly_one(&*conn, order_id.into()).await?
            };
            acl::ensure_access(&login, order.user_id, Action::Update)?;

            let intent_id = order
                .payment_intent_id
                .clone()
                .ok_or_else(|| format_err!("Order {} has no payment intent", order.number()).context(Error::Conflict))?;
            let intent = ctx.payment.retrieve_intent(intent_id).await?;
            if let Some(id) = intent.metadata.get("order_id") {
                if *id != order.id.to_string() {
                    return Err(format_err!("Payment intent {} belongs to order {}", intent.id, id).context(Error::Conflict).into());
                }
            }

            match intent.payment_status() {
                PaymentStatus::Paid if order.payment_status == PaymentStatus::Paid => Ok(order),
                PaymentStatus::Paid => {
                    let updated = {
                        let mut conn = ctx.connection().await?;
                        let tx = conn.transaction().await.map_err(RepoError::from)?;
                        let next_status = if order.status == OrderStatus::Pending {
                            Some(OrderStatus::Confirmed)
                        } else {
                            None
                        };
                        let updated = repos::order::make_repo()
                            .update_exactly_one(
                                &tx,
                                OrderUpdater {
                                    filter: order.id.into(),
                                    data: OrderUpdateData {
                                        payment_status: Some(PaymentStatus::Paid),
                                        status: next_status,
                                        ..Default::default()
                                    },
                                },
                            )
                            .await?;
                        repos::marketing::make_abandoned_checkout_repo()
                            .update(
                                &tx,
                                AbandonedCheckoutUpdater {
                                    filter: order.id.into(),
                                    data: AbandonedCheckoutUpdateData {
                                        reminded_at: None,
                                        recovered_at: Some(Utc::now()),
                                    },
                                },
                            )
                            .await?;
                        audit_order(&tx, login, order.id, "payment_succeeded", json!({ "payment_intent_id": intent.id, "amount": intent.amount }))
                            .await?;
                        tx.commit().await.map_err(RepoError::from)?;
                        updated
                    };
                    info!("Order {} paid", updated.number());

                    Notifier::new(&ctx)
                        .notify(
                            updated.customer.email.clone(),
                            Some(updated.customer.full_name()),
                            Notification::PaymentConfirmed { order: updated.clone() },
                        )
                        .await;
                    Ok(updated)
                }
                PaymentStatus::Failed => {
                    let message = intent.error_message().unwrap_or_else(|| "Le paiement a échoué".to_string());
                    {
                        let conn = ctx.connection().await?;
                        repos::order::make_repo()
                            .update_exactly_one(
                                &*conn,
                                OrderUpdater {
                                    filter: order.id.into(),
                                    data: OrderUpdateData {
                                        payment_status: Some(PaymentStatus::Failed),
                                        ..Default::default()
                                    },
                                },
                            )
                            .await?;
                        audit_order(&*conn, login, order.id, "payment_failed", json!({ "payment_intent_id": intent.id, "message": message }))
                            .await?;
                    }
                    Err(Error::Payment(message).into())
                }
                _ => Ok(order),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    fn intent(status: &str, amount: i64) -> PaymentIntent {
        PaymentIntent {
            id: "pi_1".to_string(),
            client_secret: Some("pi_1_secret".to_string()),
            amount,
            currency: "eur".to_string(),
            status: status.to_string(),
            metadata: hashmap! { "order_id".to_string() => "9b2f4a4e-56c1-4f0e-a3a4-0c9f41a7e1d2".to_string() },
            last_payment_error: None,
        }
    }

    #[test]
    fn open_intent_with_same_amount_is_reused() {
        assert!(is_reusable(&intent("requires_payment_method", 50208), 50208));
        assert!(!is_reusable(&intent("requires_payment_method", 50208), 41840));
        assert!(!is_reusable(&intent("succeeded", 50208), 50208));
        assert!(!is_reusable(&intent("canceled", 50208), 50208));
    }
}
