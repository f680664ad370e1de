use geo::Point as GeoPoint;
use tokio_postgres::Row;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::db::{InsertBuilder, UpdateBuilder};
use crate::errors::RepoError;
use crate::models::{AddressFull, PriceBreakdown, Service, TimeSlot, WasteType};
use crate::types::{ServiceId, TimeSlotId, WasteTypeId};

const SERVICE_ID_COLUMN: &str = "service_id";
const WASTE_TYPE_ID_COLUMN: &str = "waste_type_id";
const RENTAL_DAYS_COLUMN: &str = "rental_days";
const ESTIMATED_TONS_COLUMN: &str = "estimated_tons";
const DELIVERY_SLOT_ID_COLUMN: &str = "delivery_slot_id";
const PICKUP_SLOT_ID_COLUMN: &str = "pickup_slot_id";
const NOTES_COLUMN: &str = "notes";

fn validate_slots(configuration: &BookingConfiguration) -> Result<(), ValidationError> {
    match (configuration.delivery_slot_id, configuration.pickup_slot_id) {
        (Some(delivery), Some(pickup)) if delivery == pickup => Err(ValidationError::new("pickup_equals_delivery")),
        _ => Ok(()),
    }
}

/// One container booking as chosen in the wizard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_slots", skip_on_field_errors = false))]
pub struct BookingConfiguration {
    pub service_id: ServiceId,
    pub waste_type_id: WasteTypeId,
    #[validate(range(min = 1, max = 365))]
    pub rental_days: i32,
    #[validate(range(min = 0.0, max = 40.0))]
    pub estimated_tons: f64,
    pub address: AddressFull,
    pub delivery_slot_id: Option<TimeSlotId>,
    pub pickup_slot_id: Option<TimeSlotId>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

impl BookingConfiguration {
    /// Validates the payload and that the address was geocoded.
    pub fn validate_for_pricing(&self) -> Result<GeoPoint<f64>, ValidationErrors> {
        self.validate()?;
        self.address.location.ok_or_else(|| {
            let mut errors = ValidationErrors::new();
            errors.add("address", ValidationError::new("location_required"));
            errors
        })
    }

    pub fn write_into_inserter(self, b: InsertBuilder) -> InsertBuilder {
        let b = b
            .with_arg(SERVICE_ID_COLUMN, self.service_id)
            .with_arg(WASTE_TYPE_ID_COLUMN, self.waste_type_id)
            .with_arg(RENTAL_DAYS_COLUMN, self.rental_days)
            .with_arg(ESTIMATED_TONS_COLUMN, self.estimated_tons)
            .with_arg(DELIVERY_SLOT_ID_COLUMN, self.delivery_slot_id)
            .with_arg(PICKUP_SLOT_ID_COLUMN, self.pickup_slot_id)
            .with_arg(NOTES_COLUMN, self.notes);
        self.address.write_into_inserter(b)
    }

    pub fn write_into_updater(self, b: UpdateBuilder) -> UpdateBuilder {
        let b = b
            .with_value(SERVICE_ID_COLUMN, self.service_id)
            .with_value(WASTE_TYPE_ID_COLUMN, self.waste_type_id)
            .with_value(RENTAL_DAYS_COLUMN, self.rental_days)
            .with_value(ESTIMATED_TONS_COLUMN, self.estimated_tons)
            .with_value(DELIVERY_SLOT_ID_COLUMN, self.delivery_slot_id)
            .with_value(PICKUP_SLOT_ID_COLUMN, self.pickup_slot_id)
            .with_value(NOTES_COLUMN, self.notes);
        self.address.write_into_updater(b)
    }

    pub fn from_row(row: &Row) -> Result<Self, RepoError> {
        Ok(Self {
            service_id: row.try_get(SERVICE_ID_COLUMN)?,
            waste_type_id: row.try_get(WASTE_TYPE_ID_COLUMN)?,
            rental_days: row.try_get(RENTAL_DAYS_COLUMN)?,
            estimated_tons: row.try_get(ESTIMATED_TONS_COLUMN)?,
            address: AddressFull::from_row(row)?,
            delivery_slot_id: row.try_get(DELIVERY_SLOT_ID_COLUMN)?,
            pickup_slot_id: row.try_get(PICKUP_SLOT_ID_COLUMN)?,
            notes: row.try_get(NOTES_COLUMN)?,
        })
    }

    pub fn slot_ids(&self) -> Vec<TimeSlotId> {
        self.delivery_slot_id.iter().chain(self.pickup_slot_id.iter()).cloned().collect()
    }
}

/// Quote returned to the wizard before anything is booked.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub service: Service,
    pub waste_type: WasteType,
    pub rental_days: i32,
    pub estimated_tons: f64,
    pub price: PriceBreakdown,
}

/// Slots resolved for a configuration.
#[derive(Clone, Debug, Default)]
pub struct BookedSlots {
    pub delivery: Option<TimeSlot>,
    pub pickup: Option<TimeSlot>,
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn make_configuration() -> BookingConfiguration {
        BookingConfiguration {
            service_id: ServiceId(1),
            waste_type_id: WasteTypeId(3),
            rental_days: 7,
            estimated_tons: 1.5,
            address: AddressFull {
                location: Some(GeoPoint::new(2.2945, 48.8584)),
                address: Some("5 Avenue Anatole France, 75007 Paris".to_string()),
                ..Default::default()
            },
            delivery_slot_id: Some(TimeSlotId(10)),
            pickup_slot_id: Some(TimeSlotId(11)),
            notes: None,
        }
    }

    #[test]
    fn geocoded_configuration_is_priceable() {
        assert!(make_configuration().validate_for_pricing().is_ok());
    }

    #[test]
    fn address_without_location_is_rejected() {
        let mut configuration = make_configuration();
        configuration.address.location = None;
        let errors = configuration.validate_for_pricing().unwrap_err();
        assert!(errors.field_errors().contains_key("address"));
    }

    #[test]
    fn same_slot_twice_is_rejected() {
        let mut configuration = make_configuration();
        configuration.pickup_slot_id = configuration.delivery_slot_id;
        assert!(configuration.validate().is_err());
    }
}
