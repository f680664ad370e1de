use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use tokio_postgres::Row;

use crate::db::*;
use crate::errors::RepoError;
use crate::models::{BookingConfiguration, PriceBreakdown};
use crate::types::{CartItemId, CartSessionId, UserId};

const ID_COLUMN: &str = "id";
const USER_ID_COLUMN: &str = "user_id";
const SESSION_ID_COLUMN: &str = "session_id";
const CREATED_AT_COLUMN: &str = "created_at";
const UPDATED_AT_COLUMN: &str = "updated_at";

/// Owner of a cart: a registered user or an anonymous browser session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum CartCustomer {
    User(UserId),
    Anonymous(CartSessionId),
}

impl CartCustomer {
    fn from_row(row: &Row) -> Result<Self, RepoError> {
        let user_id: Option<UserId> = row.try_get(USER_ID_COLUMN)?;
        let session_id: Option<CartSessionId> = row.try_get(SESSION_ID_COLUMN)?;
        match (user_id, session_id) {
            (Some(user_id), _) => Ok(CartCustomer::User(user_id)),
            (None, Some(session_id)) => Ok(CartCustomer::Anonymous(session_id)),
            (None, None) => Err(RepoError::Parse {
                reason: "Cart item has neither user nor session".to_string(),
            }),
        }
    }

    fn user_id(self) -> Option<UserId> {
        match self {
            CartCustomer::User(id) => Some(id),
            CartCustomer::Anonymous(_) => None,
        }
    }

    fn session_id(self) -> Option<CartSessionId> {
        match self {
            CartCustomer::User(_) => None,
            CartCustomer::Anonymous(id) => Some(id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub customer: CartCustomer,
    #[serde(flatten)]
    pub configuration: BookingConfiguration,
    pub price: PriceBreakdown,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<Row> for CartItem {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get(ID_COLUMN)?,
            customer: CartCustomer::from_row(&row)?,
            configuration: BookingConfiguration::from_row(&row)?,
            price: PriceBreakdown::from_row(&row)?,
            created_at: row.try_get(CREATED_AT_COLUMN)?,
            updated_at: row.try_get(UPDATED_AT_COLUMN)?,
        })
    }
}

/// Cart contents with the amount to pay.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub total_ht: f64,
    pub vat: f64,
    pub total_ttc: f64,
}

impl From<Vec<CartItem>> for Cart {
    fn from(items: Vec<CartItem>) -> Self {
        let sum = |f: fn(&PriceBreakdown) -> f64| crate::pricing::round2(items.iter().map(|item| f(&item.price)).sum());
        Self {
            total_ht: sum(|p| p.total_ht),
            vat: sum(|p| p.vat),
            total_ttc: sum(|p| p.total_ttc),
            items,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeCartPayload {
    pub session_id: CartSessionId,
}

pub struct NewCartItem {
    pub customer: CartCustomer,
    pub configuration: BookingConfiguration,
    pub price: PriceBreakdown,
}

impl Inserter for NewCartItem {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        let now = Utc::now();
        let b = InsertBuilder::new(table)
            .with_arg(ID_COLUMN, CartItemId::new())
            .with_arg(USER_ID_COLUMN, self.customer.user_id())
            .with_arg(SESSION_ID_COLUMN, self.customer.session_id())
            .with_arg(CREATED_AT_COLUMN, now)
            .with_arg(UPDATED_AT_COLUMN, now);
        let b = self.configuration.write_into_inserter(b);
        self.price.write_into_inserter(b)
    }
}

#[derive(Clone, Debug, Default)]
pub struct CartItemFilter {
    pub id: Option<CartItemId>,
    pub customer: Option<CartCustomer>,
}

impl Filter for CartItemFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.id {
            b = b.with_filter(ID_COLUMN, v);
        }
        match self.customer {
            Some(CartCustomer::User(v)) => b = b.with_filter(USER_ID_COLUMN, v),
            Some(CartCustomer::Anonymous(v)) => b = b.with_filter(SESSION_ID_COLUMN, v),
            None => {}
        }

        b
    }
}

#[derive(Clone, Debug, Default)]
pub struct CartItemUpdateData {
    pub configuration: Option<(BookingConfiguration, PriceBreakdown)>,
    /// New owner, used when an anonymous cart is merged on login.
    pub customer: Option<CartCustomer>,
}

pub struct CartItemUpdater {
    pub filter: CartItemFilter,
    pub data: CartItemUpdateData,
}

impl Updater for CartItemUpdater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        let CartItemUpdater { filter, data } = self;

        let mut b = UpdateBuilder::from(filter.into_filtered_operation_builder(table)).with_value(UPDATED_AT_COLUMN, Utc::now());

        if let Some((configuration, price)) = data.configuration {
            b = configuration.write_into_updater(b);
            b = price.write_into_updater(b);
        }
        if let Some(customer) = data.customer {
            b = b
                .with_value(USER_ID_COLUMN, customer.user_id())
                .with_value(SESSION_ID_COLUMN, customer.session_id());
        }

        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::tests::make_configuration;

    fn item(total_ht: f64, vat: f64) -> CartItem {
        let now = Utc::now();
        CartItem {
            id: CartItemId::new(),
            customer: CartCustomer::Anonymous(CartSessionId::new()),
            configuration: make_configuration(),
            price: PriceBreakdown {
                total_ht,
                vat,
                total_ttc: total_ht + vat,
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn cart_totals_sum_items() {
        let cart = Cart::from(vec![item(100.1, 20.02), item(200.2, 40.04)]);
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.total_ht, 300.3);
        assert_eq!(cart.vat, 60.06);
        assert_eq!(cart.total_ttc, 360.36);
    }

    #[test]
    fn customer_serializes_with_tag() {
        let id = UserId::new();
        let json = serde_json::to_value(CartCustomer::User(id)).unwrap();
        assert_eq!(json["type"], "user");
        assert_eq!(json["id"], id.to_string());
    }
}
