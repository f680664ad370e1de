//! Cart service. Items are complete booking configurations, priced when
//! they are added or changed.

use super::pricing::price_configuration;
use super::types::{ServiceContext, ServiceFuture};
use crate::acl;
use crate::db::Ordering;
use crate::errors::Error;
use crate::models::*;
use crate::repos;
use crate::types::CartItemId;

pub trait CartService: Send + Sync {
    /// Get user's cart contents
    fn get_cart(&self) -> ServiceFuture<Cart>;
    /// Prices the configuration and adds it to the cart
    fn add_item(&self, configuration: BookingConfiguration) -> ServiceFuture<Cart>;
    /// Replaces the configuration of one item and prices it again
    fn update_item(&self, id: CartItemId, configuration: BookingConfiguration) -> ServiceFuture<Cart>;
    fn delete_item(&self, id: CartItemId) -> ServiceFuture<Cart>;
    /// Clear user's cart
    fn clear_cart(&self) -> ServiceFuture<Cart>;
    /// Moves an anonymous cart to the logged-in user
    fn merge(&self, payload: MergeCartPayload) -> ServiceFuture<Cart>;
}

pub struct CartServiceImpl {
    pub ctx: ServiceContext,
    pub login: UserLogin,
}

impl CartServiceImpl {
    pub fn new(ctx: ServiceContext, login: UserLogin) -> Self {
        Self { ctx, login }
    }
}

async fn load_cart(ctx: &ServiceContext, customer: CartCustomer) -> Result<Cart, failure::Error> {
    let conn = ctx.connection().await?;
    let items = repos::cart_item::make_repo()
        .select_full(
            &*conn,
            CartItemFilter {
                id: None,
                customer: Some(customer),
            },
            |b| b.with_ordering("created_at", Ordering::Ascending),
        )
        .await?;
    Ok(Cart::from(items))
}

impl CartService for CartServiceImpl {
    fn get_cart(&self) -> ServiceFuture<Cart> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let customer = acl::require_cart_customer(&login)?;
            load_cart(&ctx, customer).await
        })
    }

    fn add_item(&self, configuration: BookingConfiguration) -> ServiceFuture<Cart> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let customer = acl::require_cart_customer(&login)?;
            {
                let conn = ctx.connection().await?;
                let quote = price_configuration(&*conn, &ctx.config, &configuration).await?;
                let item = repos::cart_item::make_repo()
                    .insert_exactly_one(
                        &*conn,
                        NewCartItem {
                            customer,
                            configuration,
                            price: quote.price,
                        },
                    )
                    .await?;
                debug!("Added cart item {} for {:?}", item.id, customer);
            }
            load_cart(&ctx, customer).await
        })
    }

    fn update_item(&self, id: CartItemId, configuration: BookingConfiguration) -> ServiceFuture<Cart> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let customer = acl::require_cart_customer(&login)?;
            {
                let conn = ctx.connection().await?;
                let quote = price_configuration(&*conn, &ctx.config, &configuration).await?;
                repos::cart_item::make_repo()
                    .update(
                        &*conn,
                        CartItemUpdater {
                            filter: CartItemFilter {
                                id: Some(id),
                                customer: Some(customer),
                            },
                            data: CartItemUpdateData {
                                configuration: Some((configuration, quote.price)),
                                customer: None,
                            },
                        },
                    )
                    .await?
                    .pop()
                    .ok_or_else(|| format_err!("Cart item {}", id).context(Error::NotFound))?;
            }
            load_cart(&ctx, customer).await
        })
    }

    fn delete_item(&self, id: CartItemId) -> ServiceFuture<Cart> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let customer = acl::require_cart_customer(&login)?;
            {
                let conn = ctx.connection().await?;
                repos::cart_item::make_repo()
                    .delete(
                        &*conn,
                        CartItemFilter {
                            id: Some(id),
                            customer: Some(customer),
                        },
                    )
                    .await?
                    .pop()
                    .ok_or_else(|| format_err!("Cart item {}", id).context(Error::NotFound))?;
            }
            load_cart(&ctx, customer).await
        })
    }

    fn clear_cart(&self) -> ServiceFuture<Cart> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let customer = acl::require_cart_customer(&login)?;
            let conn = ctx.connection().await?;
            repos::cart_item::make_repo()
                .delete(
                    &*conn,
                    CartItemFilter {
                        id: None,
                        customer: Some(customer),
                    },
                )
                .await?;
            Ok(Cart::default())
        })
    }

    fn merge(&self, payload: MergeCartPayload) -> ServiceFuture<Cart> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            let user_id = acl::require_user(&login)?;
            let customer = CartCustomer::User(user_id);
            {
                let conn = ctx.connection().await?;
                let merged = repos::cart_item::make_repo()
                    .update(
                        &*conn,
                        CartItemUpdater {
                            filter: CartItemFilter {
                                id: None,
                                customer: Some(CartCustomer::Anonymous(payload.session_id)),
                            },
                            data: CartItemUpdateData {
                                configuration: None,
                                customer: Some(customer),
                            },
                        },
                    )
                    .await?;
                info!("Merged {} cart items of session {} into user {}", merged.len(), payload.session_id, user_id);
            }
            load_cart(&ctx, customer).await
        })
    }
}
