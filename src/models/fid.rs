//! Fiche d'identification des déchets: waste characterization form a
//! producer fills in before hazardous or regulated waste is accepted.

use std::convert::TryFrom;

use chrono::{DateTime, Utc};
use regex::Regex;
use tokio_postgres::Row;
use validator::{Validate, ValidationError};

use crate::db::*;
use crate::errors::RepoError;
use crate::models::waste_type::is_hazardous_code;
use crate::types::{FidDocumentId, OrderId, UserId};

lazy_static! {
    pub static ref SIRET_REGEX: Regex = Regex::new(r"^\d{14}$").unwrap();
    pub static ref WASTE_CODE_REGEX: Regex = Regex::new(r"^\d{2} \d{2} \d{2}\*?$").unwrap();
}

const ID_COLUMN: &str = "id";
const USER_ID_COLUMN: &str = "user_id";
const ORDER_ID_COLUMN: &str = "order_id";
const STATUS_COLUMN: &str = "status";
const PRODUCER_NAME_COLUMN: &str = "producer_name";
const PRODUCER_SIRET_COLUMN: &str = "producer_siret";
const PRODUCER_ADDRESS_COLUMN: &str = "producer_address";
const PRODUCER_CONTACT_NAME_COLUMN: &str = "producer_contact_name";
const PRODUCER_EMAIL_COLUMN: &str = "producer_email";
const PRODUCER_PHONE_COLUMN: &str = "producer_phone";
const WASTE_CODE_COLUMN: &str = "waste_code";
const WASTE_DESCRIPTION_COLUMN: &str = "waste_description";
const WASTE_ORIGIN_COLUMN: &str = "waste_origin";
const ESTIMATED_QUANTITY_TONS_COLUMN: &str = "estimated_quantity_tons";
const PHYSICAL_STATE_COLUMN: &str = "physical_state";
const PACKAGING_COLUMN: &str = "packaging";
const HAZARDOUS_COLUMN: &str = "hazardous";
const ADMIN_COMMENT_COLUMN: &str = "admin_comment";
const SUBMITTED_AT_COLUMN: &str = "submitted_at";
const REVIEWED_AT_COLUMN: &str = "reviewed_at";
const CREATED_AT_COLUMN: &str = "created_at";
const UPDATED_AT_COLUMN: &str = "updated_at";

db_enum! {
    pub enum FidStatus {
        Draft => "draft",
        Submitted => "submitted",
        Validated => "validated",
        Rejected => "rejected",
    }
}

impl FidStatus {
    /// Producers may edit drafts and rejected documents.
    pub fn is_editable(self) -> bool {
        self == FidStatus::Draft || self == FidStatus::Rejected
    }

    pub fn can_submit(self) -> bool {
        self.is_editable()
    }

    /// Only submitted documents are reviewed.
    pub fn can_review_to(self, next: FidStatus) -> bool {
        self == FidStatus::Submitted && (next == FidStatus::Validated || next == FidStatus::Rejected)
    }
}

db_enum! {
    pub enum PhysicalState {
        Solid => "solid",
        Pasty => "pasty",
        Liquid => "liquid",
        Gaseous => "gaseous",
    }
}

/// SIRET numbers carry a Luhn check digit.
pub fn validate_siret(siret: &str) -> Result<(), ValidationError> {
    if !SIRET_REGEX.is_match(siret) {
        return Err(ValidationError::new("siret_format"));
    }
    let sum: u32 = siret
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| if i % 2 == 1 { if d * 2 > 9 { d * 2 - 9 } else { d * 2 } } else { d })
        .sum();
    if sum % 10 != 0 {
        return Err(ValidationError::new("siret_checksum"));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct FidPayload {
    pub order_id: Option<OrderId>,
    #[validate(length(min = 1, max = 200))]
    pub producer_name: String,
    #[validate(custom = "validate_siret")]
    pub producer_siret: String,
    #[validate(length(min = 1, max = 500))]
    pub producer_address: String,
    #[validate(length(min = 1, max = 200))]
    pub producer_contact_name: String,
    #[validate(email)]
    pub producer_email: String,
    #[validate(length(min = 6, max = 20))]
    pub producer_phone: String,
    #[validate(regex(path = "WASTE_CODE_REGEX", message = "Code déchet invalide"))]
    pub waste_code: String,
    #[validate(length(min = 1, max = 2000))]
    pub waste_description: String,
    #[validate(length(min = 1, max = 2000))]
    pub waste_origin: String,
    #[validate(range(min = 0.0, max = 10000.0))]
    pub estimated_quantity_tons: f64,
    pub physical_state: PhysicalState,
    #[validate(length(min = 1, max = 200))]
    pub packaging: String,
}

impl FidPayload {
    fn write_into_inserter(self, b: InsertBuilder) -> InsertBuilder {
        b.with_arg(HAZARDOUS_COLUMN, is_hazardous_code(&self.waste_code))
            .with_arg(ORDER_ID_COLUMN, self.order_id)
            .with_arg(PRODUCER_NAME_COLUMN, self.producer_name)
            .with_arg(PRODUCER_SIRET_COLUMN, self.producer_siret)
            .with_arg(PRODUCER_ADDRESS_COLUMN, self.producer_address)
            .with_arg(PRODUCER_CONTACT_NAME_COLUMN, self.producer_contact_name)
            .with_arg(PRODUCER_EMAIL_COLUMN, self.producer_email)
            .with_arg(PRODUCER_PHONE_COLUMN, self.producer_phone)
            .with_arg(WASTE_CODE_COLUMN, self.waste_code)
            .with_arg(WASTE_DESCRIPTION_COLUMN, self.waste_description)
            .with_arg(WASTE_ORIGIN_COLUMN, self.waste_origin)
            .with_arg(ESTIMATED_QUANTITY_TONS_COLUMN, self.estimated_quantity_tons)
            .with_arg(PHYSICAL_STATE_COLUMN, self.physical_state.to_string())
            .with_arg(PACKAGING_COLUMN, self.packaging)
    }

    fn write_into_updater(self, b: UpdateBuilder) -> UpdateBuilder {
        b.with_value(HAZARDOUS_COLUMN, is_hazardous_code(&self.waste_code))
            .with_value(ORDER_ID_COLUMN, self.order_id)
            .with_value(PRODUCER_NAME_COLUMN, self.producer_name)
            .with_value(PRODUCER_SIRET_COLUMN, self.producer_siret)
            .with_value(PRODUCER_ADDRESS_COLUMN, self.producer_address)
            .with_value(PRODUCER_CONTACT_NAME_COLUMN, self.producer_contact_name)
            .with_value(PRODUCER_EMAIL_COLUMN, self.producer_email)
            .with_value(PRODUCER_PHONE_COLUMN, self.producer_phone)
            .with_value(WASTE_CODE_COLUMN, self.waste_code)
            .with_value(WASTE_DESCRIPTION_COLUMN, self.waste_description)
            .with_value(WASTE_ORIGIN_COLUMN, self.waste_origin)
            .with_value(ESTIMATED_QUANTITY_TONS_COLUMN, self.estimated_quantity_tons)
            .with_value(PHYSICAL_STATE_COLUMN, self.physical_state.to_string())
            .with_value(PACKAGING_COLUMN, self.packaging)
    }

    fn from_row(row: &Row) -> Result<Self, RepoError> {
        let physical_state: String = row.try_get(PHYSICAL_STATE_COLUMN)?;
        Ok(Self {
            order_id: row.try_get(ORDER_ID_COLUMN)?,
            producer_name: row.try_get(PRODUCER_NAME_COLUMN)?,
            producer_siret: row.try_get(PRODUCER_SIRET_COLUMN)?,
            producer_address: row.try_get(PRODUCER_ADDRESS_COLUMN)?,
            producer_contact_name: row.try_get(PRODUCER_CONTACT_NAME_COLUMN)?,
            producer_email: row.try_get(PRODUCER_EMAIL_COLUMN)?,
            producer_phone: row.try_get(PRODUCER_PHONE_COLUMN)?,
            waste_code: row.try_get(WASTE_CODE_COLUMN)?,
            waste_description: row.try_get(WASTE_DESCRIPTION_COLUMN)?,
            waste_origin: row.try_get(WASTE_ORIGIN_COLUMN)?,
            estimated_quantity_tons: row.try_get(ESTIMATED_QUANTITY_TONS_COLUMN)?,
            physical_state: physical_state.parse()?,
            packaging: row.try_get(PACKAGING_COLUMN)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FidDocument {
    pub id: FidDocumentId,
    pub user_id: UserId,
    pub status: FidStatus,
    #[serde(flatten)]
    pub data: FidPayload,
    pub hazardous: bool,
    pub admin_comment: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<Row> for FidDocument {
    type Error = RepoError;

    fn try_from(row: Row) -> Result<Self, Self::Error> {
        let status: String = row.try_get(STATUS_COLUMN)?;
        Ok(Self {
            id: row.try_get(ID_COLUMN)?,
            user_id: row.try_get(USER_ID_COLUMN)?,
            status: status.parse()?,
            data: FidPayload::from_row(&row)?,
            hazardous: row.try_get(HAZARDOUS_COLUMN)?,
            admin_comment: row.try_get(ADMIN_COMMENT_COLUMN)?,
            submitted_at: row.try_get(SUBMITTED_AT_COLUMN)?,
            reviewed_at: row.try_get(REVIEWED_AT_COLUMN)?,
            created_at: row.try_get(CREATED_AT_COLUMN)?,
            updated_at: row.try_get(UPDATED_AT_COLUMN)?,
        })
    }
}

fn validate_review(payload: &FidReviewPayload) -> Result<(), ValidationError> {
    match payload.status {
        FidStatus::Validated => Ok(()),
        FidStatus::Rejected => match payload.comment {
            Some(ref comment) if !comment.trim().is_empty() => Ok(()),
            _ => Err(ValidationError::new("rejection_comment_required")),
        },
        _ => Err(ValidationError::new("review_status")),
    }
}

/// Admin decision on a submitted document. Rejections need a comment.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_review", skip_on_field_errors = false))]
pub struct FidReviewPayload {
    pub status: FidStatus,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FidSearchTerms {
    pub status: Option<FidStatus>,
    pub offset: Option<i64>,
    pub count: Option<i64>,
}

pub struct NewFidDocument {
    pub user_id: UserId,
    pub data: FidPayload,
}

impl Inserter for NewFidDocument {
    fn into_insert_builder(self, table: &'static str) -> InsertBuilder {
        let now = Utc::now();
        let b = InsertBuilder::new(table)
            .with_arg(ID_COLUMN, FidDocumentId::new())
            .with_arg(USER_ID_COLUMN, self.user_id)
            .with_arg(STATUS_COLUMN, FidStatus::Draft.to_string())
            .with_arg(CREATED_AT_COLUMN, now)
            .with_arg(UPDATED_AT_COLUMN, now);
        self.data.write_into_inserter(b)
    }
}

#[derive(Clone, Debug, Default)]
pub struct FidFilter {
    pub id: Option<FidDocumentId>,
    pub user_id: Option<UserId>,
    pub status: Option<FidStatus>,
}

impl From<FidDocumentId> for FidFilter {
    fn from(id: FidDocumentId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }
}

impl Filter for FidFilter {
    fn into_filtered_operation_builder(self, table: &'static str) -> FilteredOperationBuilder {
        let mut b = FilteredOperationBuilder::new(table);

        if let Some(v) = self.id {
            b = b.with_filter(ID_COLUMN, v);
        }
        if let Some(v) = self.user_id {
            b = b.with_filter(USER_ID_COLUMN, v);
        }
        if let Some(v) = self.status {
            b = b.with_filter(STATUS_COLUMN, v.to_string());
        }

        b
    }
}

pub fn fid_by_newest(b: FilteredOperationBuilder) -> FilteredOperationBuilder {
    b.with_ordering(UPDATED_AT_COLUMN, Ordering::Descending)
}

#[derive(Clone, Debug, Default)]
pub struct FidUpdateData {
    pub data: Option<FidPayload>,
    pub status: Option<FidStatus>,
    pub admin_comment: Option<Option<String>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

pub struct FidUpdater {
    pub filter: FidFilter,
    pub data: FidUpdateData,
}

impl Updater for FidUpdater {
    fn into_update_builder(self, table: &'static str) -> UpdateBuilder {
        let FidUpdater { filter, data } = self;

        let mut b = UpdateBuilder::from(filter.into_filtered_operation_builder(table)).with_value(UPDATED_AT_COLUMN, Utc::now());

        if let Some(v) = data.data {
            b = v.write_into_updater(b);
        }
        if let Some(v) = data.status {
            b = b.with_value(STATUS_COLUMN, v.to_string());
        }
        if let Some(v) = data.admin_comment {
            b = b.with_value(ADMIN_COMMENT_COLUMN, v);
        }
        if let Some(v) = data.submitted_at {
            b = b.with_value(SUBMITTED_AT_COLUMN, v);
        }
        if let Some(v) = data.reviewed_at {
            b = b.with_value(REVIEWED_AT_COLUMN, v);
        }

        b
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn make_payload() -> FidPayload {
        FidPayload {
            order_id: None,
            producer_name: "BTP Rénovation SARL".to_string(),
            producer_siret: "73282932000074".to_string(),
            producer_address: "10 Rue du Chantier, 69007 Lyon".to_string(),
            producer_contact_name: "Paul Martin".to_string(),
            producer_email: "paul.martin@btp-renovation.fr".to_string(),
            producer_phone: "0478000000".to_string(),
            waste_code: "17 06 05*".to_string(),
            waste_description: "Plaques fibrociment".to_string(),
            waste_origin: "Démolition toiture".to_string(),
            estimated_quantity_tons: 2.5,
            physical_state: PhysicalState::Solid,
            packaging: "Big bag".to_string(),
        }
    }

    #[test]
    fn siret_checksum() {
        assert!(validate_siret("73282932000074").is_ok());
        assert!(validate_siret("73282932000075").is_err());
        assert!(validate_siret("7328293200007").is_err());
        assert!(validate_siret("7328293200007A").is_err());
    }

    #[test]
    fn payload_validation() {
        assert!(make_payload().validate().is_ok());

        let mut payload = make_payload();
        payload.waste_code = "17-06-05".to_string();
        payload.producer_email = "not an email".to_string();
        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("waste_code"));
        assert!(fields.contains_key("producer_email"));
    }

    #[test]
    fn workflow() {
        assert!(FidStatus::Draft.can_submit());
        assert!(FidStatus::Rejected.can_submit());
        assert!(!FidStatus::Submitted.can_submit());
        assert!(!FidStatus::Validated.is_editable());

        assert!(FidStatus::Submitted.can_review_to(FidStatus::Validated));
        assert!(FidStatus::Submitted.can_review_to(FidStatus::Rejected));
        assert!(!FidStatus::Draft.can_review_to(FidStatus::Validated));
        assert!(!FidStatus::Submitted.can_review_to(FidStatus::Draft));
    }

    #[test]
    fn rejection_requires_comment() {
        let review = FidReviewPayload {
            status: FidStatus::Rejected,
            comment: Some("  ".to_string()),
        };
        assert!(review.validate().is_err());

        let review = FidReviewPayload {
            status: FidStatus::Rejected,
            comment: Some("Code déchet incohérent".to_string()),
        };
        assert!(review.validate().is_ok());
    }
}
