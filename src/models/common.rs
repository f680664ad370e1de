use geo::Point as GeoPoint;
use tokio_postgres::Row;

use crate::db::{FilteredOperationBuilder, InsertBuilder, UpdateBuilder};
use crate::errors::RepoError;

const ADDRESS_COLUMN: &str = "address";
const STREET_NUMBER_COLUMN: &str = "street_number";
const ROUTE_COLUMN: &str = "route";
const LOCALITY_COLUMN: &str = "locality";
const POSTAL_CODE_COLUMN: &str = "postal_code";
const ADMINISTRATIVE_AREA_LEVEL_1_COLUMN: &str = "administrative_area_level_1";
const ADMINISTRATIVE_AREA_LEVEL_2_COLUMN: &str = "administrative_area_level_2";
const COUNTRY_COLUMN: &str = "country";
const PLACE_ID_COLUMN: &str = "place_id";
const LATITUDE_COLUMN: &str = "latitude";
const LONGITUDE_COLUMN: &str = "longitude";

/// Delivery address as returned by the places provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressFull {
    pub location: Option<GeoPoint<f64>>,
    pub administrative_area_level_1: Option<String>,
    pub administrative_area_level_2: Option<String>,
    pub country: Option<String>,
    pub locality: Option<String>,
    pub postal_code: Option<String>,
    pub route: Option<String>,
    pub street_number: Option<String>,
    pub address: Option<String>,
    pub place_id: Option<String>,
}

impl AddressFull {
    pub fn write_into_inserter(self, mut b: InsertBuilder) -> InsertBuilder {
        if let Some(v) = self.location {
            b = b.with_arg(LATITUDE_COLUMN, v.y()).with_arg(LONGITUDE_COLUMN, v.x());
        }
        if let Some(v) = self.administrative_area_level_1 {
            b = b.with_arg(ADMINISTRATIVE_AREA_LEVEL_1_COLUMN, v);
        }
        if let Some(v) = self.administrative_area_level_2 {
            b = b.with_arg(ADMINISTRATIVE_AREA_LEVEL_2_COLUMN, v);
        }
        if let Some(v) = self.country {
            b = b.with_arg(COUNTRY_COLUMN, v);
        }
        if let Some(v) = self.locality {
            b = b.with_arg(LOCALITY_COLUMN, v);
        }
        if let Some(v) = self.postal_code {
            b = b.with_arg(POSTAL_CODE_COLUMN, v);
        }
        if let Some(v) = self.route {
            b = b.with_arg(ROUTE_COLUMN, v);
        }
        if let Some(v) = self.street_number {
            b = b.with_arg(STREET_NUMBER_COLUMN, v);
        }
        if let Some(v) = self.address {
            b = b.with_arg(ADDRESS_COLUMN, v);
        }
        if let Some(v) = self.place_id {
            b = b.with_arg(PLACE_ID_COLUMN, v);
        }

        b
    }

    /// Replaces every address column, clearing the ones that are unset.
    pub fn write_into_updater(self, b: UpdateBuilder) -> UpdateBuilder {
        b.with_value(LATITUDE_COLUMN, self.location.map(|v| v.y()))
            .with_value(LONGITUDE_COLUMN, self.location.map(|v| v.x()))
            .with_value(ADMINISTRATIVE_AREA_LEVEL_1_COLUMN, self.administrative_area_level_1)
            .with_value(ADMINISTRATIVE_AREA_LEVEL_2_COLUMN, self.administrative_area_level_2)
            .with_value(COUNTRY_COLUMN, self.country)
            .with_value(LOCALITY_COLUMN, self.locality)
            .with_value(POSTAL_CODE_COLUMN, self.postal_code)
            .with_value(ROUTE_COLUMN, self.route)
            .with_value(STREET_NUMBER_COLUMN, self.street_number)
            .with_value(ADDRESS_COLUMN, self.address)
            .with_value(PLACE_ID_COLUMN, self.place_id)
    }

    pub fn from_row(row: &Row) -> Result<Self, RepoError> {
        let latitude: Option<f64> = row.try_get(LATITUDE_COLUMN)?;
        let longitude: Option<f64> = row.try_get(LONGITUDE_COLUMN)?;
        Ok(Self {
            location: match (latitude, longitude) {
                (Some(lat), Some(lng)) => Some(GeoPoint::new(lng, lat)),
                _ => None,
            },
            administrative_area_level_1: row.try_get(ADMINISTRATIVE_AREA_LEVEL_1_COLUMN)?,
            administrative_area_level_2: row.try_get(ADMINISTRATIVE_AREA_LEVEL_2_COLUMN)?,
            country: row.try_get(COUNTRY_COLUMN)?,
            locality: row.try_get(LOCALITY_COLUMN)?,
            postal_code: row.try_get(POSTAL_CODE_COLUMN)?,
            route: row.try_get(ROUTE_COLUMN)?,
            street_number: row.try_get(STREET_NUMBER_COLUMN)?,
            address: row.try_get(ADDRESS_COLUMN)?,
            place_id: row.try_get(PLACE_ID_COLUMN)?,
        })
    }

    /// One-line rendering for emails and exports.
    pub fn display_line(&self) -> String {
        if let Some(ref address) = self.address {
            return address.clone();
        }
        let street = [self.street_number.as_deref(), self.route.as_deref()]
            .iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        let city = [self.postal_code.as_deref(), self.locality.as_deref()]
            .iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        [street, city].iter().filter(|s| !s.is_empty()).cloned().collect::<Vec<_>>().join(", ")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetterPayload<T> {
    pub value: T,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueContainer<T> {
    pub value: T,
}

impl<T> From<T> for ValueContainer<T> {
    fn from(value: T) -> Self {
        Self { value }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Paging {
    pub offset: Option<i64>,
    pub count: Option<i64>,
}

impl Paging {
    pub const DEFAULT_COUNT: i64 = 50;
    pub const MAX_COUNT: i64 = 500;

    pub fn limit(&self) -> i64 {
        self.count.unwrap_or(Self::DEFAULT_COUNT).max(1).min(Self::MAX_COUNT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Limits a select to one page; `None` selects every matching row.
pub fn paginate(paging: Option<Paging>, b: FilteredOperationBuilder) -> FilteredOperationBuilder {
    match paging {
        Some(paging) => b.with_limit(Some(paging.limit())).with_offset(Some(paging.offset())),
        None => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_line_prefers_formatted_address() {
        let address = AddressFull {
            address: Some("12 Rue de la Paix, 75002 Paris".to_string()),
            route: Some("Rue de la Paix".to_string()),
            ..Default::default()
        };
        assert_eq!(address.display_line(), "12 Rue de la Paix, 75002 Paris");
    }

    #[test]
    fn display_line_from_components() {
        let address = AddressFull {
            street_number: Some("4".to_string()),
            route: Some("Allée des Chênes".to_string()),
            postal_code: Some("69003".to_string()),
            locality: Some("Lyon".to_string()),
            ..Default::default()
        };
        assert_eq!(address.display_line(), "4 Allée des Chênes, 69003 Lyon");
    }

    #[test]
    fn paging_is_clamped() {
        let paging = Paging {
            offset: Some(-3),
            count: Some(100_000),
        };
        assert_eq!(paging.offset(), 0);
        assert_eq!(paging.limit(), Paging::MAX_COUNT);
    }

    #[test]
    fn unpaged_select_has_no_limit() {
        let (query, _) = paginate(None, FilteredOperationBuilder::new("users")).build_select();
        assert_eq!(query, "SELECT * FROM users;");

        let (query, _) = paginate(Some(Paging::default()), FilteredOperationBuilder::new("users")).build_select();
        assert_eq!(query, "SELECT * FROM users LIMIT 50 OFFSET 0;");
    }
}
