use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use validator::Validate;

use crate::db::*;
use crate::errors::RepoError;
use crate::types::ServiceId;

const ID_COLUMN: &str = "id";
const NAME_COLUMN: &str = "name";
const DESCRIPTION_COLUMN: &str = "description";
const VOLUME_M3_COLUMN: &str = "volume_m3";
const BASE_PRICE_COLUMN: &str = "base_price";
const LENGTH_M_COLUMN: &str = "length_m";
const WIDTH_M_COLUMN: &str = "width_m";
const HEIGHT_M_COLUMN: &str = "height_m";
const INCLUDED_DAYS_COLUMN: &str = "included_days";
const IMAGE_URL_COLUMN: &str = "image_url";
const ACTIVE_COLUMN: &str = "active";
const CREATED_AT_COLUMN: &str = "created_at";
const UPDATED_AT_COLUMN: &str = "updated_at";

/// Container offer, e.g. "Benne 10 m³".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    pub description: Option<String>,
    pub volume_m3: f64,
    pub base_price: f64,
    pub length_m: Option<f64>,
    pub width_m: Option<f64>,
    pub height_m: Option<f64>,
    /// Rental days covered by the base price.
    pub included_days: i32,
    pub image_url: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<Row> for Service {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get(ID_COLUMN)?,
            name: row.try_get(NAME_COLUMN)?,
            description: row.try_get(DESCRIPTION_COLUMN)?,
            volume_m3: row.try_get(VOLUME_M3_COLUMN)?,
            base_price: row.try_get(BASE_PRICE_COLUMN)?,
            length_m: row.try_get(LENGTH_M_COLUMN)?,
            width_m: row.try_get(WIDTH_M_COLUMN)?,
            height_m: row.try_get(HEIGHT_M_COLUMN)?,
            included_days: row.try_get(INCLUDED_DAYS_COLUMN)?,
            image_url: row.try_get(IMAGE_URL_COLUMN)?,
            active: row.try_get(ACTIVE_COLUMN)?,
            created_at: row.try_get(CREATED_AT_COLUMN)?,
            updated_at: row.try_get(UPDATED_AT_COLUMN)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct NewService {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0.1, max = 100.0))]
    pub volume_m3: f64,
    #[validate(range(min = 0.0))]
    pub base_price: f64,
    #[validate(range(min = 0.0))]
    pub length_m: Option<f64>,
    #[validate(range(min = 0.0))]
    pub width_m: Option<f64>,
    #[validate(range(min = 0.0))]
    pub height_m: Option<f64>,
    #[validate(range(min = 0, max = 365))]
    pub included_days: i32,
    #[validate(url)]
    pub image_url: Option<String>,
}

impl Inserter for NewService {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        let now = Utc::now();
        InsertBuilder::new(table)
            .with_arg(NAME_COLUMN, self.name)
            .with_arg(DESCRIPTION_COLUMN, self.description)
            .with_arg(VOLUME_M3_COLUMN, self.volume_m3)
            .with_arg(BASE_PRICE_COLUMN, self.base_price)
            .with_arg(LENGTH_M_COLUMN, self.length_m)
            .with_arg(WIDTH_M_COLUMN, self.width_m)
            .with_arg(HEIGHT_M_COLUMN, self.height_m)
            .with_arg(INCLUDED_DAYS_COLUMN, self.included_days)
            .with_arg(IMAGE_URL_COLUMN, self.image_url)
            .with_arg(ACTIVE_COLUMN, true)
            .with_arg(CREATED_AT_COLUMN, now)
            .with_arg(UPDATED_AT_COLUMN, now)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ServiceFilter {
    pub id: Option<ServiceId>,
    pub active: Option<bool>,
}

impl From<ServiceId> for ServiceFilter {
    fn from(id: ServiceId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }
}

impl Filter for ServiceFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.id {
            b = b.with_filter(ID_COLUMN, v);
        }
        if let Some(v) = self.active {
            b = b.with_filter(ACTIVE_COLUMN, v);
        }

        b
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
pub struct ServiceUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0.1, max = 100.0))]
    pub volume_m3: Option<f64>,
    #[validate(range(min = 0.0))]
    pub base_price: Option<f64>,
    #[validate(range(min = 0.0))]
    pub length_m: Option<f64>,
    #[validate(range(min = 0.0))]
    pub width_m: Option<f64>,
    #[validate(range(min = 0.0))]
    pub height_m: Option<f64>,
    #[validate(range(min = 0, max = 365))]
    pub included_days: Option<i32>,
    #[validate(url)]
    pub image_url: Option<String>,
    pub active: Option<bool>,
}

pub struct ServiceUpdater {
    pub filter: ServiceFilter,
    pub data: ServiceUpdate,
}

impl Updater for ServiceUpdater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        let ServiceUpdater { filter, data } = self;

        let mut b = UpdateBuilder::from(filter.into_filtered_operation_builder(table)).with_value(UPDATED_AT_COLUMN, Utc::now());

        if let Some(v) = data.name {
            b = b.with_value(NAME_COLUMN, v);
        }
        if let Some(v) = data.description {
            b = b.with_value(DESCRIPTION_COLUMN, v);
        }
        if let Some(v) = data.volume_m3 {
            b = b.with_value(VOLUME_M3_COLUMN, v);
        }
        if let Some(v) = data.base_price {
            b = b.with_value(BASE_PRICE_COLUMN, v);
        }
        if let Some(v) = data.length_m {
            b = b.with_value(LENGTH_M_COLUMN, v);
        }
        if let Some(v) = data.width_m {
            b = b.with_value(WIDTH_M_COLUMN, v);
        }
        if let Some(v) = data.height_m {
            b = b.with_value(HEIGHT_M_COLUMN, v);
        }
        if let Some(v) = data.included_days {
            b = b.with_value(INCLUDED_DAYS_COLUMN, v);
        }
        if let Some(v) = data.image_url {
            b = b.with_value(IMAGE_URL_COLUMN, v);
        }
        if let Some(v) = data.active {
            b = b.with_value(ACTIVE_COLUMN, v);
        }

        b
    }
}
