use std::convert::TryFrom;

use chrono::{DateTime, NaiveDate, Utc};
use tokio_postgres::Row;
use validator::Validate;

use crate::db::*;
use crate::errors::RepoError;
use crate::models::{BookingConfiguration, PriceBreakdown, User};
use crate::types::{OrderId, OrderSlug, UserId};

const ID_COLUMN: &str = "id";
const SLUG_COLUMN: &str = "slug";
const USER_ID_COLUMN: &str = "user_id";
const CUSTOMER_EMAIL_COLUMN: &str = "customer_email";
const CUSTOMER_FIRST_NAME_COLUMN: &str = "customer_first_name";
const CUSTOMER_LAST_NAME_COLUMN: &str = "customer_last_name";
const CUSTOMER_PHONE_COLUMN: &str = "customer_phone";
const CUSTOMER_COMPANY_COLUMN: &str = "customer_company";
const SERVICE_NAME_COLUMN: &str = "service_name";
const WASTE_TYPE_NAME_COLUMN: &str = "waste_type_name";
const DELIVERY_DATE_COLUMN: &str = "delivery_date";
const PICKUP_DATE_COLUMN: &str = "pickup_date";
const PROPOSED_DELIVERY_DATE_COLUMN: &str = "proposed_delivery_date";
const DELIVERY_DATE_STATUS_COLUMN: &str = "delivery_date_status";
const STATUS_COLUMN: &str = "status";
const PAYMENT_STATUS_COLUMN: &str = "payment_status";
const PAYMENT_INTENT_ID_COLUMN: &str = "payment_intent_id";
const ADMIN_COMMENT_COLUMN: &str = "admin_comment";
const CREATED_AT_COLUMN: &str = "created_at";
const UPDATED_AT_COLUMN: &str = "updated_at";

db_enum! {
    pub enum OrderStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Delivered => "delivered",
        Collected => "collected",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl OrderStatus {
    fn rank(self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Confirmed => 1,
            OrderStatus::Delivered => 2,
            OrderStatus::Collected => 3,
            OrderStatus::Completed => 4,
            OrderStatus::Cancelled => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == OrderStatus::Completed || self == OrderStatus::Cancelled
    }

    /// Statuses only move forward. Cancellation is possible until the
    /// container has been delivered.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self.is_terminal() || self == next {
            return false;
        }
        match next {
            OrderStatus::Cancelled => self == OrderStatus::Pending || self == OrderStatus::Confirmed,
            _ => next.rank() > self.rank(),
        }
    }
}

db_enum! {
    pub enum PaymentStatus {
        Pending => "pending",
        Paid => "paid",
        Failed => "failed",
        Refunded => "refunded",
    }
}

db_enum! {
    pub enum DeliveryDateStatus {
        Proposed => "proposed",
        Accepted => "accepted",
        Rejected => "rejected",
    }
}

/// Customer data copied on the order when it is placed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub company_name: Option<String>,
}

impl<'a> From<&'a User> for CustomerSnapshot {
    fn from(user: &'a User) -> Self {
        Self {
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone: user.phone.clone(),
            company_name: user.company_name.clone(),
        }
    }
}

impl CustomerSnapshot {
    fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            email: row.try_get(CUSTOMER_EMAIL_COLUMN)?,
            first_name: row.try_get(CUSTOMER_FIRST_NAME_COLUMN)?,
            last_name: row.try_get(CUSTOMER_LAST_NAME_COLUMN)?,
            phone: row.try_get(CUSTOMER_PHONE_COLUMN)?,
            company_name: row.try_get(CUSTOMER_COMPANY_COLUMN)?,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub slug: OrderSlug,
    pub user_id: UserId,
    pub customer: CustomerSnapshot,
    pub service_name: String,
    pub waste_type_name: String,
    #[serde(flatten)]
    pub configuration: BookingConfiguration,
    pub delivery_date: Option<NaiveDate>,
    pub pickup_date: Option<NaiveDate>,
    pub proposed_delivery_date: Option<NaiveDate>,
    pub delivery_date_status: Option<DeliveryDateStatus>,
    pub price: PriceBreakdown,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    pub admin_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn number(&self) -> String {
        format!("CMD-{:06}", self.slug.0)
    }
}

impl TryFrom<Row> for Order {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        let status: String = row.try_get(STATUS_COLUMN)?;
        let payment_status: String = row.try_get(PAYMENT_STATUS_COLUMN)?;
        let delivery_date_status: Option<String> = row.try_get(DELIVERY_DATE_STATUS_COLUMN)?;
        Ok(Self {
            id: row.try_get(ID_COLUMN)?,
            slug: row.try_get(SLUG_COLUMN)?,
            user_id: row.try_get(USER_ID_COLUMN)?,
            customer: CustomerSnapshot::from_row(&row)?,
            service_name: row.try_get(SERVICE_NAME_COLUMN)?,
            waste_type_name: row.try_get(WASTE_TYPE_NAME_COLUMN)?,
            configuration: BookingConfiguration::from_row(&row)?,
            delivery_date: row.try_get(DELIVERY_DATE_COLUMN)?,
            pickup_date: row.try_get(PICKUP_DATE_COLUMN)?,
            proposed_delivery_date: row.try_get(PROPOSED_DELIVERY_DATE_COLUMN)?,
            delivery_date_status: delivery_date_status.map(|s| s.parse()).transpose()?,
            price: PriceBreakdown::from_row(&row)?,
            status: status.parse()?,
            payment_status: payment_status.parse()?,
            payment_intent_id: row.try_get(PAYMENT_INTENT_ID_COLUMN)?,
            admin_comment: row.try_get(ADMIN_COMMENT_COLUMN)?,
            created_at: row.try_get(CREATED_AT_COLUMN)?,
            updated_at: row.try_get(UPDATED_AT_COLUMN)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum OrderIdentifier {
    Id(OrderId),
    Slug(OrderSlug),
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct SetOrderStatusPayload {
    pub status: OrderStatus,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct ProposeDeliveryDatePayload {
    pub date: NaiveDate,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliveryDateResponsePayload {
    pub accept: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OrderSearchTerms {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub email: Option<String>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
    pub offset: Option<i64>,
    pub count: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderSearchResults {
    pub total_count: i64,
    pub orders: Vec<Order>,
}

pub struct NewOrder {
    pub user_id: UserId,
    pub customer: CustomerSnapshot,
    pub service_name: String,
    pub waste_type_name: String,
    pub configuration: BookingConfiguration,
    pub delivery_date: Option<NaiveDate>,
    pub pickup_date: Option<NaiveDate>,
    pub price: PriceBreakdown,
}

impl Inserter for NewOrder {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        let now = Utc::now();
        let b = InsertBuilder::new(table)
            .with_arg(ID_COLUMN, OrderId::new())
            .with_arg(USER_ID_COLUMN, self.user_id)
            .with_arg(CUSTOMER_EMAIL_COLUMN, self.customer.email)
            .with_arg(CUSTOMER_FIRST_NAME_COLUMN, self.customer.first_name)
            .with_arg(CUSTOMER_LAST_NAME_COLUMN, self.customer.last_name)
            .with_arg(CUSTOMER_PHONE_COLUMN, self.customer.phone)
            .with_arg(CUSTOMER_COMPANY_COLUMN, self.customer.company_name)
            .with_arg(SERVICE_NAME_COLUMN, self.service_name)
            .with_arg(WASTE_TYPE_NAME_COLUMN, self.waste_type_name)
            .with_arg(DELIVERY_DATE_COLUMN, self.delivery_date)
            .with_arg(PICKUP_DATE_COLUMN, self.pickup_date)
            .with_arg(STATUS_COLUMN, OrderStatus::Pending.to_string())
            .with_arg(PAYMENT_STATUS_COLUMN, PaymentStatus::Pending.to_string())
            .with_arg(CREATED_AT_COLUMN, now)
            .with_arg(UPDATED_AT_COLUMN, now);
        let b = self.configuration.write_into_inserter(b);
        self.price.write_into_inserter(b)
    }
}

#[derive(Clone, Debug, Default)]
pub struct OrderFilter {
    pub id: Option<OrderId>,
    pub slug: Option<OrderSlug>,
    pub user_id: Option<UserId>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub email_like: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub payment_intent_id: Option<String>,
}

impl From<OrderId> for OrderFilter {
    fn from(id: OrderId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }
}

impl From<OrderIdentifier> for OrderFilter {
    fn from(v: OrderIdentifier) -> Self {
        match v {
            OrderIdentifier::Id(id) => Self {
                id: Some(id),
                ..Default::default()
            },
            OrderIdentifier::Slug(slug) => Self {
                slug: Some(slug),
                ..Default::default()
            },
        }
    }
}

impl Filter for OrderFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.id {
            b = b.with_filter(ID_COLUMN, v);
        }
        if let Some(v) = self.slug {
            b = b.with_filter(SLUG_COLUMN, v);
        }
        if let Some(v) = self.user_id {
            b = b.with_filter(USER_ID_COLUMN, v);
        }
        if let Some(v) = self.status {
            b = b.with_filter(STATUS_COLUMN, v.to_string());
        }
        if let Some(v) = self.payment_status {
            b = b.with_filter(PAYMENT_STATUS_COLUMN, v.to_string());
        }
        if let Some(v) = self.email_like {
            b = b.with_comparison(CUSTOMER_EMAIL_COLUMN, Comparison::ILike, contains_pattern(&v));
        }
        if let Some(v) = self.created_from {
            b = b.with_comparison(CREATED_AT_COLUMN, Comparison::Gte, v);
        }
        if let Some(v) = self.created_to {
            b = b.with_comparison(CREATED_AT_COLUMN, Comparison::Lt, v);
        }
        if let Some(v) = self.payment_intent_id {
            b = b.with_filter(PAYMENT_INTENT_ID_COLUMN, v);
        }

        b
    }
}

pub fn order_by_newest(b: FilteredOperationBuilder) -> FilteredOperationBuilder {
    b.with_ordering(CREATED_AT_COLUMN, Ordering::Descending)
}

#[derive(Clone, Debug, Default)]
pub struct OrderUpdateData {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_intent_id: Option<String>,
    pub delivery_date: Option<Option<NaiveDate>>,
    pub proposed_delivery_date: Option<Option<NaiveDate>>,
    pub delivery_date_status: Option<Option<DeliveryDateStatus>>,
    pub admin_comment: Option<String>,
}

pub struct OrderUpdater {
    pub filter: OrderFilter,
    pub data: OrderUpdateData,
}

impl Updater for OrderUpdater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        let OrderUpdater { filter, data } = self;

        let mut b = UpdateBuilder::from(filter.into_filtered_operation_builder(table)).with_value(UPDATED_AT_COLUMN, Utc::now());

        if let Some(v) = data.status {
            b = b.with_value(STATUS_COLUMN, v.to_string());
        }
        if let Some(v) = data.payment_status {
            b = b.with_value(PAYMENT_STATUS_COLUMN, v.to_string());
        }
        if let Some(v) = data.payment_intent_id {
            b = b.with_value(PAYMENT_INTENT_ID_COLUMN, v);
        }
        if let Some(v) = data.delivery_date {
            b = b.with_value(DELIVERY_DATE_COLUMN, v);
        }
        if let Some(v) = data.proposed_delivery_date {
            b = b.with_value(PROPOSED_DELIVERY_DATE_COLUMN, v);
        }
        if let Some(v) = data.delivery_date_status {
            b = b.with_value(DELIVERY_DATE_STATUS_COLUMN, v.map(|s| s.to_string()));
        }
        if let Some(v) = data.admin_comment {
            b = b.with_value(ADMIN_COMMENT_COLUMN, v);
        }

        b
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;
    use super::*;

    const ALL: [OrderStatus; 6] = [Pending, Confirmed, Delivered, Collected, Completed, Cancelled];

    #[test]
    fn happy_path_moves_forward() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Delivered));
        assert!(Delivered.can_transition_to(Collected));
        assert!(Collected.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Delivered));
    }

    #[test]
    fn never_moves_backwards() {
        assert!(!Delivered.can_transition_to(Confirmed));
        assert!(!Collected.can_transition_to(Pending));
        assert!(!Confirmed.can_transition_to(Confirmed));
    }

    #[test]
    fn terminal_statuses_are_absorbing() {
        for next in ALL.iter() {
            assert!(!Completed.can_transition_to(*next));
            assert!(!Cancelled.can_transition_to(*next));
        }
    }

    #[test]
    fn cancellation_only_before_delivery() {
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Collected.can_transition_to(Cancelled));
    }

    #[test]
    fn statuses_round_trip_through_text() {
        for status in ALL.iter() {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), *status);
        }
        assert!("shipped".parse::<OrderStatus>().is_err());
    }
}
