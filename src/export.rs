//! CSV exports for the back office.

use chrono::{DateTime, Utc};
use csv::Writer;
use failure::Error as FailureError;
use serde::Serialize;

use crate::models::{FidDocument, FidStatus, PhysicalState, User, UserRole};
use crate::types::{FidDocumentId, OrderId, UserId};

pub fn into_csv<R, I>(rows: I) -> Result<Vec<u8>, FailureError>
where
    R: Serialize,
    I: IntoIterator<Item = R>,
{
    let mut writer = Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let res = writer.into_inner()?;
    Ok(res)
}

#[derive(Debug, Clone, Serialize)]
pub struct CsvUser {
    id: UserId,
    email: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    company_name: Option<String>,
    role: UserRole,
    email_verified: bool,
    locked_until: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<User> for CsvUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            company_name: user.company_name,
            role: user.role,
            email_verified: user.email_verified,
            locked_until: user.lock_until,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CsvFid {
    id: FidDocumentId,
    status: FidStatus,
    order_id: Option<OrderId>,
    producer_name: String,
    producer_siret: String,
    producer_address: String,
    producer_contact_name: String,
    producer_email: String,
    producer_phone: String,
    waste_code: String,
    hazardous: bool,
    waste_description: String,
    waste_origin: String,
    estimated_quantity_tons: f64,
    physical_state: PhysicalState,
    packaging: String,
    admin_comment: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl From<FidDocument> for CsvFid {
    fn from(document: FidDocument) -> Self {
        let data = document.data;
        Self {
            id: document.id,
            status: document.status,
            order_id: data.order_id,
            producer_name: data.producer_name,
            producer_siret: data.producer_siret,
            producer_address: data.producer_address,
            producer_contact_name: data.producer_contact_name,
            producer_email: data.producer_email,
            producer_phone: data.producer_phone,
            waste_code: data.waste_code,
            hazardous: document.hazardous,
            waste_description: data.waste_description,
            waste_origin: data.waste_origin,
            estimated_quantity_tons: data.estimated_quantity_tons,
            physical_state: data.physical_state,
            packaging: data.packaging,
            admin_comment: document.admin_comment,
            submitted_at: document.submitted_at,
            reviewed_at: document.reviewed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::tests::make_user;

    #[test]
    fn users_export_with_header() {
        let mut user = make_user();
        user.company_name = Some("Durand, Fils & Cie".to_string());
        let csv = String::from_utf8(into_csv(vec![CsvUser::from(user)]).unwrap()).unwrap();
        let mut lines = csv.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("id,email,first_name,last_name"));
        let row = lines.next().unwrap();
        assert!(row.contains("marie.durand@exemple.fr"));
        assert!(row.contains("\"Durand, Fils & Cie\""));
        assert!(row.contains(",customer,"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn empty_export_is_empty() {
        let rows: Vec<CsvUser> = vec![];
        assert!(into_csv(rows).unwrap().is_empty());
    }
}
