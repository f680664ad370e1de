//! Reminder campaigns run by the marketing loader.

use chrono::{Duration, Utc};

use super::notification::{Notification, Notifier};
use super::types::{ServiceContext, ServiceFuture};
use crate::acl;
use crate::config::Marketing;
use crate::models::*;
use crate::repos;

pub trait MarketingService: Send + Sync {
    /// One reminder per unpaid checkout older than the configured delay.
    /// Returns the number of reminders sent.
    fn remind_abandoned_checkouts(&self) -> ServiceFuture<usize>;
    /// One notification per inactivity period. Returns the number sent.
    fn notify_inactive_users(&self) -> ServiceFuture<usize>;
}

pub struct MarketingServiceImpl {
    pub ctx: ServiceContext,
    pub login: UserLogin,
    pub settings: Marketing,
}

impl MarketingServiceImpl {
    pub fn new(ctx: ServiceContext, login: UserLogin, settings: Marketing) -> Self {
        Self { ctx, login, settings }
    }
}

impl MarketingService for MarketingServiceImpl {
    fn remind_abandoned_checkouts(&self) -> ServiceFuture<usize> {
        let ctx = self.ctx.clone();
        let login = self.login;
        let abandoned_after = Duration::hours(self.settings.abandoned_after_hours);

        Box::pin(async move {
            acl::require_admin(&login)?;
            let notifier = Notifier::new(&ctx);
            let conn = ctx.connection().await?;
            let checkout_repo = repos::marketing::make_abandoned_checkout_repo();
            let order_repo = repos::order::make_repo();

            let checkouts = checkout_repo
                .select(&*conn, AbandonedCheckoutFilter::pending_reminder(Utc::now() - abandoned_after))
                .await?;

            let mut sent = 0;
            for checkout in checkouts {
                let now = Utc::now();
                let order = order_repo.select_one(&*conn, checkout.order_id.into()).await?;
                let data = match order {
                    Some(ref order) if order.payment_status == PaymentStatus::Paid => AbandonedCheckoutUpdateData {
                        reminded_at: None,
                        recovered_at: Some(now),
                    },
                    Some(ref order) if order.status == OrderStatus::Cancelled => AbandonedCheckoutUpdateData {
                        reminded_at: Some(now),
                        recovered_at: None,
                    },
                    _ => {
                        notifier
                            .notify(
                                checkout.email.clone(),
                                None,
                                Notification::AbandonedCheckout {
                                    order_id: checkout.order_id,
                                    amount_ttc: checkout.amount_ttc,
                                },
                            )
                            .await;
                        sent += 1;
                        AbandonedCheckoutUpdateData {
                            reminded_at: Some(now),
                            recovered_at: None,
                        }
                    }
                };
                checkout_repo
                    .update(
                        &*conn,
                        AbandonedCheckoutUpdater {
                            filter: checkout.order_id.into(),
                            data,
                        },
                    )
                    .await?;
            }

            Ok(sent)
        })
    }

    fn notify_inactive_users(&self) -> ServiceFuture<usize> {
        let ctx = self.ctx.clone();
        let login = self.login;
        let inactivity = Duration::days(self.settings.inactivity_days);

        Box::pin(async move {
            acl::require_admin(&login)?;
            let notifier = Notifier::new(&ctx);
            let conn = ctx.connection().await?;
            let notification_repo = repos::marketing::make_inactivity_notification_repo();

            let users = repos::user::make_repo()
                .select(
                    &*conn,
                    UserFilter {
                        role: Some(UserRole::Customer),
                        last_login_before: Some(Utc::now() - inactivity),
                        ..Default::default()
                    },
                )
                .await?;

            let mut sent = 0;
            for user in users {
                let already_notified = notification_repo
                    .count(
                        &*conn,
                        InactivityNotificationFilter {
                            user_id: Some(user.id),
                            notified_after: user.last_login_at,
                        },
                    )
                    .await?
                    > 0;
                if already_notified {
                    continue;
                }

                notifier
                    .notify(
                        user.email.clone(),
                        Some(user.full_name()),
                        Notification::Inactivity {
                            first_name: user.first_name.clone(),
                        },
                    )
                    .await;
                notification_repo
                    .insert_exactly_one(
                        &*conn,
                        NewInactivityNotification {
                            user_id: user.id,
                            email: user.email,
                            last_login_at: user.last_login_at,
                        },
                    )
                    .await?;
                sent += 1;
            }

            Ok(sent)
        })
    }
}
