use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use validator::{Validate, ValidationError};

use crate::db::*;
use crate::errors::RepoError;
use crate::types::{RentalPricingId, ServiceId, TransportPricingId, TreatmentPricingId, WasteTypeId};

const ID_COLUMN: &str = "id";
const SERVICE_ID_COLUMN: &str = "service_id";
const MIN_DAYS_COLUMN: &str = "min_days";
const MAX_DAYS_COLUMN: &str = "max_days";
const SUPPLEMENT_COLUMN: &str = "supplement";
const MIN_KM_COLUMN: &str = "min_km";
const MAX_KM_COLUMN: &str = "max_km";
const PRICE_COLUMN: &str = "price";
const WASTE_TYPE_ID_COLUMN: &str = "waste_type_id";
const PRICE_PER_TON_COLUMN: &str = "price_per_ton";
const CREATED_AT_COLUMN: &str = "created_at";

const BASE_PRICE_COLUMN: &str = "base_price";
const DURATION_SUPPLEMENT_COLUMN: &str = "duration_supplement";
const TRANSPORT_PRICE_COLUMN: &str = "transport_price";
const TREATMENT_PRICE_COLUMN: &str = "treatment_price";
const DISTANCE_KM_COLUMN: &str = "distance_km";
const TOTAL_HT_COLUMN: &str = "total_ht";
const VAT_COLUMN: &str = "vat";
const TOTAL_TTC_COLUMN: &str = "total_ttc";

/// Rental-duration tier. A tier without service applies to every container.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RentalPricing {
    pub id: RentalPricingId,
    pub service_id: Option<ServiceId>,
    pub min_days: i32,
    pub max_days: i32,
    pub supplement: f64,
    pub created_at: DateTime<Utc>,
}

impl RentalPricing {
    pub fn contains(&self, days: i32) -> bool {
        self.min_days <= days && days <= self.max_days
    }
}

impl TryFrom<Row> for RentalPricing {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get(ID_COLUMN)?,
            service_id: row.try_get(SERVICE_ID_COLUMN)?,
            min_days: row.try_get(MIN_DAYS_COLUMN)?,
            max_days: row.try_get(MAX_DAYS_COLUMN)?,
            supplement: row.try_get(SUPPLEMENT_COLUMN)?,
            created_at: row.try_get(CREATED_AT_COLUMN)?,
        })
    }
}

/// Distance tier, `[min_km, max_km)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransportPricing {
    pub id: TransportPricingId,
    pub min_km: f64,
    pub max_km: f64,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

impl TransportPricing {
    pub fn contains(&self, km: f64) -> bool {
        self.min_km <= km && km < self.max_km
    }
}

impl TryFrom<Row> for TransportPricing {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get(ID_COLUMN)?,
            min_km: row.try_get(MIN_KM_COLUMN)?,
            max_km: row.try_get(MAX_KM_COLUMN)?,
            price: row.try_get(PRICE_COLUMN)?,
            created_at: row.try_get(CREATED_AT_COLUMN)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreatmentPricing {
    pub id: TreatmentPricingId,
    pub waste_type_id: WasteTypeId,
    pub price_per_ton: f64,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<Row> for TreatmentPricing {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get(ID_COLUMN)?,
            waste_type_id: row.try_get(WASTE_TYPE_ID_COLUMN)?,
            price_per_ton: row.try_get(PRICE_PER_TON_COLUMN)?,
            created_at: row.try_get(CREATED_AT_COLUMN)?,
        })
    }
}

fn validate_day_range(tier: &RentalPricingPayload) -> Result<(), ValidationError> {
    if tier.max_days < tier.min_days {
        return Err(ValidationError::new("max_days_before_min_days"));
    }
    Ok(())
}

fn validate_km_range(tier: &TransportPricingPayload) -> Result<(), ValidationError> {
    if tier.max_km <= tier.min_km {
        return Err(ValidationError::new("max_km_before_min_km"));
    }
    Ok(())
}

pub fn rental_by_range(b: FilteredOperationBuilder) -> FilteredOperationBuilder {
    b.with_ordering(MIN_DAYS_COLUMN, Ordering::Ascending)
        .with_ordering(ID_COLUMN, Ordering::Ascending)
}

pub fn transport_by_range(b: FilteredOperationBuilder) -> FilteredOperationBuilder {
    b.with_ordering(MIN_KM_COLUMN, Ordering::Ascending)
        .with_ordering(ID_COLUMN, Ordering::Ascending)
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_day_range", skip_on_field_errors = false))]
pub struct RentalPricingPayload {
    pub service_id: Option<ServiceId>,
    #[validate(range(min = 1))]
    pub min_days: i32,
    #[validate(range(min = 1))]
    pub max_days: i32,
    #[validate(range(min = 0.0))]
    pub supplement: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_km_range", skip_on_field_errors = false))]
pub struct TransportPricingPayload {
    #[validate(range(min = 0.0))]
    pub min_km: f64,
    #[validate(range(min = 0.0))]
    pub max_km: f64,
    #[validate(range(min = 0.0))]
    pub price: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct TreatmentPricingPayload {
    pub waste_type_id: WasteTypeId,
    #[validate(range(min = 0.0))]
    pub price_per_ton: f64,
}

impl Inserter for RentalPricingPayload {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(SERVICE_ID_COLUMN, self.service_id)
            .with_arg(MIN_DAYS_COLUMN, self.min_days)
            .with_arg(MAX_DAYS_COLUMN, self.max_days)
            .with_arg(SUPPLEMENT_COLUMN, self.supplement)
            .with_arg(CREATED_AT_COLUMN, Utc::now())
    }
}

impl Inserter for TransportPricingPayload {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(MIN_KM_COLUMN, self.min_km)
            .with_arg(MAX_KM_COLUMN, self.max_km)
            .with_arg(PRICE_COLUMN, self.price)
            .with_arg(CREATED_AT_COLUMN, Utc::now())
    }
}

impl Inserter for TreatmentPricingPayload {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(WASTE_TYPE_ID_COLUMN, self.waste_type_id)
            .with_arg(PRICE_PER_TON_COLUMN, self.price_per_ton)
            .with_arg(CREATED_AT_COLUMN, Utc::now())
    }
}

/// Pricing tables are small; filtering is by id only.
#[derive(Clone, Copy, Debug)]
pub struct PricingFilter<Id> {
    pub id: Option<Id>,
}

impl<Id> PricingFilter<Id> {
    pub fn all() -> Self {
        Self { id: None }
    }
}

impl<Id> From<Id> for PricingFilter<Id> {
    fn from(id: Id) -> Self {
        Self { id: Some(id) }
    }
}

impl<Id> Filter for PricingFilter<Id>
where
    Id: tokio_postgres::types::ToSql + Send + Sync + 'static,
{
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);
        if let Some(v) = self.id {
            b = b.with_filter(ID_COLUMN, v);
        }
        b
    }
}

#[derive(Clone, Debug, Default)]
pub struct TreatmentPricingFilter {
    pub id: Option<TreatmentPricingId>,
    pub waste_type_id: Option<WasteTypeId>,
}

impl Filter for TreatmentPricingFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);
        if let Some(v) = self.id {
            b = b.with_filter(ID_COLUMN, v);
        }
        if let Some(v) = self.waste_type_id {
            b = b.with_filter(WASTE_TYPE_ID_COLUMN, v);
        }
        b
    }
}

/// Full replacement of a tier.
pub struct PricingUpdater<Id, P> {
    pub id: Id,
    pub payload: P,
}

impl Updater for PricingUpdater<RentalPricingId, RentalPricingPayload> {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        UpdateBuilder::from(FilteredOperationBuilder::new(table).with_filter(ID_COLUMN, self.id))
            .with_value(SERVICE_ID_COLUMN, self.payload.service_id)
            .with_value(MIN_DAYS_COLUMN, self.payload.min_days)
            .with_value(MAX_DAYS_COLUMN, self.payload.max_days)
            .with_value(SUPPLEMENT_COLUMN, self.payload.supplement)
    }
}

impl Updater for PricingUpdater<TransportPricingId, TransportPricingPayload> {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        UpdateBuilder::from(FilteredOperationBuilder::new(table).with_filter(ID_COLUMN, self.id))
            .with_value(MIN_KM_COLUMN, self.payload.min_km)
            .with_value(MAX_KM_COLUMN, self.payload.max_km)
            .with_value(PRICE_COLUMN, self.payload.price)
    }
}

impl Updater for PricingUpdater<TreatmentPricingId, TreatmentPricingPayload> {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        UpdateBuilder::from(FilteredOperationBuilder::new(table).with_filter(ID_COLUMN, self.id))
            .with_value(WASTE_TYPE_ID_COLUMN, self.payload.waste_type_id)
            .with_value(PRICE_PER_TON_COLUMN, self.payload.price_per_ton)
    }
}

/// Result of the price calculator, stored on cart items and orders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_price: f64,
    pub duration_supplement: f64,
    pub transport_price: f64,
    pub treatment_price: f64,
    pub distance_km: f64,
    pub total_ht: f64,
    pub vat: f64,
    pub total_ttc: f64,
}

impl PriceBreakdown {
    pub fn write_into_inserter(self, b: InsertBuilder) -> InsertBuilder {
        b.with_arg(BASE_PRICE_COLUMN, self.base_price)
            .with_arg(DURATION_SUPPLEMENT_COLUMN, self.duration_supplement)
            .with_arg(TRANSPORT_PRICE_COLUMN, self.transport_price)
            .with_arg(TREATMENT_PRICE_COLUMN, self.treatment_price)
            .with_arg(DISTANCE_KM_COLUMN, self.distance_km)
            .with_arg(TOTAL_HT_COLUMN, self.total_ht)
            .with_arg(VAT_COLUMN, self.vat)
            .with_arg(TOTAL_TTC_COLUMN, self.total_ttc)
    }

    pub fn write_into_updater(self, b: UpdateBuilder) -> UpdateBuilder {
        b.with_value(BASE_PRICE_COLUMN, self.base_price)
            .with_value(DURATION_SUPPLEMENT_COLUMN, self.duration_supplement)
            .with_value(TRANSPORT_PRICE_COLUMN, self.transport_price)
            .with_value(TREATMENT_PRICE_COLUMN, self.treatment_price)
            .with_value(DISTANCE_KM_COLUMN, self.distance_km)
            .with_value(TOTAL_HT_COLUMN, self.total_ht)
            .with_value(VAT_COLUMN, self.vat)
            .with_value(TOTAL_TTC_COLUMN, self.total_ttc)
    }

    pub fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            base_price: row.try_get(BASE_PRICE_COLUMN)?,
            duration_supplement: row.try_get(DURATION_SUPPLEMENT_COLUMN)?,
            transport_price: row.try_get(TRANSPORT_PRICE_COLUMN)?,
            treatment_price: row.try_get(TREATMENT_PRICE_COLUMN)?,
            distance_km: row.try_get(DISTANCE_KM_COLUMN)?,
            total_ht: row.try_get(TOTAL_HT_COLUMN)?,
            vat: row.try_get(VAT_COLUMN)?,
            total_ttc: row.try_get(TOTAL_TTC_COLUMN)?,
        })
    }

    /// Amount in the smallest currency unit, as the payment provider expects it.
    pub fn total_ttc_cents(&self) -> i64 {
        (self.total_ttc * 100.0).round() as i64
    }
}

/// Everything the calculator reads from the pricing tables.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingTables {
    pub rental: Vec<RentalPricing>,
    pub transport: Vec<TransportPricing>,
    pub treatment: Vec<TreatmentPricing>,
}
