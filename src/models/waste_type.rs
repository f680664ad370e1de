use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use validator::Validate;

use crate::db::*;
use crate::errors::RepoError;
use crate::models::fid::WASTE_CODE_REGEX;
use crate::types::WasteTypeId;

const ID_COLUMN: &str = "id";
const NAME_COLUMN: &str = "name";
const DESCRIPTION_COLUMN: &str = "description";
const WASTE_CODE_COLUMN: &str = "waste_code";
const HAZARDOUS_COLUMN: &str = "hazardous";
const REQUIRES_FID_COLUMN: &str = "requires_fid";
const ACTIVE_COLUMN: &str = "active";
const CREATED_AT_COLUMN: &str = "created_at";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WasteType {
    pub id: WasteTypeId,
    pub name: String,
    pub description: Option<String>,
    /// European waste list code, e.g. "17 09 04".
    pub waste_code: Option<String>,
    pub hazardous: bool,
    pub requires_fid: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<Row> for WasteType {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get(ID_COLUMN)?,
            name: row.try_get(NAME_COLUMN)?,
            description: row.try_get(DESCRIPTION_COLUMN)?,
            waste_code: row.try_get(WASTE_CODE_COLUMN)?,
            hazardous: row.try_get(HAZARDOUS_COLUMN)?,
            requires_fid: row.try_get(REQUIRES_FID_COLUMN)?,
            active: row.try_get(ACTIVE_COLUMN)?,
            created_at: row.try_get(CREATED_AT_COLUMN)?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct NewWasteType {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(regex(path = "WASTE_CODE_REGEX", message = "Code déchet invalide"))]
    pub waste_code: Option<String>,
    #[serde(default)]
    pub requires_fid: bool,
}

impl Inserter for NewWasteType {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        let hazardous = self.waste_code.as_deref().map(is_hazardous_code).unwrap_or(false);
        InsertBuilder::new(table)
            .with_arg(NAME_COLUMN, self.name)
            .with_arg(DESCRIPTION_COLUMN, self.description)
            .with_arg(WASTE_CODE_COLUMN, self.waste_code)
            .with_arg(HAZARDOUS_COLUMN, hazardous)
            .with_arg(REQUIRES_FID_COLUMN, self.requires_fid || hazardous)
            .with_arg(ACTIVE_COLUMN, true)
            .with_arg(CREATED_AT_COLUMN, Utc::now())
    }
}

/// Hazardous entries of the waste list end with an asterisk.
pub fn is_hazardous_code(code: &str) -> bool {
    code.trim_end().ends_with('*')
}

#[derive(Clone, Debug, Default)]
pub struct WasteTypeFilter {
    pub id: Option<WasteTypeId>,
    pub active: Option<bool>,
}

impl From<WasteTypeId> for WasteTypeFilter {
    fn from(id: WasteTypeId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }
}

impl Filter for WasteTypeFilter {
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
pub struct WasteTypeUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(regex(path = "WASTE_CODE_REGEX", message = "Code déchet invalide"))]
    pub waste_code: Option<String>,
    pub requires_fid: Option<bool>,
    pub active: Option<bool>,
}

pub struct WasteTypeUpdater {
    pub filter: WasteTypeFilter,
    pub data: WasteTypeUpdate,
}

impl Updater for WasteTypeUpdater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        let WasteTypeUpdater { filter, data } = self;

        let mut b = UpdateBuilder::from(filter.into_filtered_operation_builder(table));

        if let Some(v) = data.name {
            b = b.with_value(NAME_COLUMN, v);
        }
        if let Some(v) = data.description {
            b = b.with_value(DESCRIPTION_COLUMN, v);
        }
        if let Some(v) = data.waste_code {
            b = b.with_value(HAZARDOUS_COLUMN, is_hazardous_code(&v));
            b = b.with_value(WASTE_CODE_COLUMN, v);
        }
        if let Some(v) = data.requires_fid {
            b = b.with_value(REQUIRES_FID_COLUMN, v);
        }
        if let Some(v) = data.active {
            b = b.with_value(ACTIVE_COLUMN, v);
        }

        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asterisk_marks_hazardous_codes() {
        assert!(is_hazardous_code("17 06 05*"));
        assert!(!is_hazardous_code("17 09 04"));
    }

    #[test]
    fn waste_code_format_is_checked() {
        let payload = NewWasteType {
            name: "Gravats".to_string(),
            description: None,
            waste_code: Some("170904".to_string()),
            requires_fid: false,
        };
        assert!(payload.validate().is_err());

        let payload = NewWasteType {
            waste_code: Some("17 09 04".to_string()),
            ..payload
        };
        assert!(payload.validate().is_ok());
    }
}
