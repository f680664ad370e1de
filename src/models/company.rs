use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use validator::Validate;

use crate::db::*;
use crate::errors::RepoError;

pub const COMPANY_ACTIVITIES_ROW_ID: i32 = 1;

const ID_COLUMN: &str = "id";
const COMPANY_NAME_COLUMN: &str = "company_name";
const EMAIL_COLUMN: &str = "email";
const PHONE_COLUMN: &str = "phone";
const ADDRESS_COLUMN: &str = "address";
const OPENING_HOURS_COLUMN: &str = "opening_hours";
const ACTIVITIES_COLUMN: &str = "activities";
const UPDATED_AT_COLUMN: &str = "updated_at";

/// Site-wide company information shown in the footer and legal pages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompanyActivities {
    pub company_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub opening_hours: String,
    pub activities: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<Row> for CompanyActivities {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        Ok(Self {
            company_name: row.try_get(COMPANY_NAME_COLUMN)?,
            email: row.try_get(EMAIL_COLUMN)?,
            phone: row.try_get(PHONE_COLUMN)?,
            address: row.try_get(ADDRESS_COLUMN)?,
            opening_hours: row.try_get(OPENING_HOURS_COLUMN)?,
            activities: row.try_get(ACTIVITIES_COLUMN)?,
            updated_at: row.try_get(UPDATED_AT_COLUMN)?,
        })
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
pub struct CompanyActivitiesUpdate {
    #[validate(length(min = 1, max = 200))]
    pub company_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 500))]
    pub opening_hours: Option<String>,
    pub activities: Option<Vec<String>>,
}

/// The table holds a single row.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompanyActivitiesFilter;

impl Filter for CompanyActivitiesFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        FilteredOperationBuilder::new(table).with_filter(ID_COLUMN, COMPANY_ACTIVITIES_ROW_ID)
    }
}

/// Initial row written on first start.
#[derive(Clone, Debug)]
pub struct NewCompanyActivities {
    pub company_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub opening_hours: String,
    pub activities: Vec<String>,
}

impl Default for NewCompanyActivities {
    fn default() -> Self {
        Self {
            company_name: "REMONDIS".to_string(),
            email: "contact@remondis.fr".to_string(),
            phone: "+33 1 00 00 00 00".to_string(),
            address: String::new(),
            opening_hours: "Lundi - Vendredi 7h30 - 17h30".to_string(),
            activities: vec![
                "Location de bennes".to_string(),
                "Collecte et traitement des déchets".to_string(),
                "Recyclage".to_string(),
            ],
        }
    }
}

impl Inserter for NewCompanyActivities {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        InsertBuilder::new(table)
            .with_arg(ID_COLUMN, COMPANY_ACTIVITIES_ROW_ID)
            .with_arg(COMPANY_NAME_COLUMN, self.company_name)
            .with_arg(EMAIL_COLUMN, self.email)
            .with_arg(PHONE_COLUMN, self.phone)
            .with_arg(ADDRESS_COLUMN, self.address)
            .with_arg(OPENING_HOURS_COLUMN, self.opening_hours)
            .with_arg(ACTIVITIES_COLUMN, self.activities)
            .with_arg(UPDATED_AT_COLUMN, Utc::now())
    }
}

pub struct CompanyActivitiesUpdater(pub CompanyActivitiesUpdate);

impl Updater for CompanyActivitiesUpdater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        let data = self.0;
        let mut b = UpdateBuilder::from(CompanyActivitiesFilter.into_filtered_operation_builder(table))
            .with_value(UPDATED_AT_COLUMN, Utc::now());

        if let Some(v) = data.company_name {
            b = b.with_value(COMPANY_NAME_COLUMN, v);
        }
        if let Some(v) = data.email {
            b = b.with_value(EMAIL_COLUMN, v);
        }
        if let Some(v) = data.phone {
            b = b.with_value(PHONE_COLUMN, v);
        }
        if let Some(v) = data.address {
            b = b.with_value(ADDRESS_COLUMN, v);
        }
        if let Some(v) = data.opening_hours {
            b = b.with_value(OPENING_HOURS_COLUMN, v);
        }
        if let Some(v) = data.activities {
            b = b.with_value(ACTIVITIES_COLUMN, v);
        }

        b
    }
}
