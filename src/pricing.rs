//! Price calculator: base price, rental-duration supplement, distance-based
//! transport and per-ton treatment, plus VAT.

use failure::Error as FailureError;
use geo::{HaversineDistance, Point};

use crate::errors::Error;
use crate::models::{PriceBreakdown, PricingTables, Service};
use crate::types::WasteTypeId;

#[derive(Clone, Debug)]
pub struct PriceRequest<'a> {
    pub service: &'a Service,
    pub waste_type_id: WasteTypeId,
    pub rental_days: i32,
    pub estimated_tons: f64,
    pub distance_km: f64,
}

/// Rounds to the cent.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Great-circle distance in kilometres. Points are (longitude, latitude).
pub fn distance_km(from: Point<f64>, to: Point<f64>) -> f64 {
    from.haversine_distance(&to) / 1000.0
}

pub fn duration_supplement(request: &PriceRequest<'_>, tables: &PricingTables) -> Result<f64, FailureError> {
    if request.rental_days <= request.service.included_days {
        return Ok(0.0);
    }

    let service_id = request.service.id;
    // Tiers bound to this service win over the generic ones. Overlaps
    // resolve to the lowest lower bound, then the oldest tier.
    let tier = tables
        .rental
        .iter()
        .filter(|tier| tier.service_id.map(|id| id == service_id).unwrap_or(true))
        .filter(|tier| tier.contains(request.rental_days))
        .min_by_key(|tier| (tier.service_id.is_none(), tier.min_days, tier.id));

    tier.map(|tier| tier.supplement).ok_or_else(|| {
        format_err!("No rental tier covers {} days for service {}", request.rental_days, service_id)
            .context(Error::MissingPrice)
            .into()
    })
}

pub fn transport_price(distance_km: f64, tables: &PricingTables) -> Result<f64, FailureError> {
    tables
        .transport
        .iter()
        .filter(|tier| tier.contains(distance_km))
        .min_by(|a, b| a.min_km.total_cmp(&b.min_km).then(a.id.cmp(&b.id)))
        .map(|tier| tier.price)
        .ok_or_else(|| {
            format_err!("No transport tier covers {:.1} km", distance_km)
                .context(Error::OutOfServiceArea)
                .into()
        })
}

pub fn treatment_price(waste_type_id: WasteTypeId, estimated_tons: f64, tables: &PricingTables) -> Result<f64, FailureError> {
    tables
        .treatment
        .iter()
        .find(|pricing| pricing.waste_type_id == waste_type_id)
        .map(|pricing| pricing.price_per_ton * estimated_tons)
        .ok_or_else(|| {
            format_err!("No treatment price for waste type {}", waste_type_id)
                .context(Error::MissingPrice)
                .into()
        })
}

pub fn calculate(request: &PriceRequest<'_>, tables: &PricingTables, vat_rate: f64) -> Result<PriceBreakdown, FailureError> {
    let base_price = round2(request.service.base_price);
    let duration_supplement = round2(duration_supplement(request, tables)?);
    let transport_price = round2(transport_price(request.distance_km, tables)?);
    let treatment_price = round2(treatment_price(request.waste_type_id, request.estimated_tons, tables)?);

    let total_ht = round2(base_price + duration_supplement + transport_price + treatment_price);
    let vat = round2(total_ht * vat_rate);

    Ok(PriceBreakdown {
        base_price,
        duration_supplement,
        transport_price,
        treatment_price,
        distance_km: round2(request.distance_km),
        total_ht,
        vat,
        total_ttc: round2(total_ht + vat),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::error_kind;
    use crate::models::{RentalPricing, TransportPricing, TreatmentPricing};
    use crate::types::*;
    use chrono::Utc;

    fn service() -> Service {
        let now = Utc::now();
        Service {
            id: ServiceId(1),
            name: "Benne 10 m³".to_string(),
            description: None,
            volume_m3: 10.0,
            base_price: 189.9,
            length_m: Some(3.5),
            width_m: Some(1.8),
            height_m: Some(1.5),
            included_days: 7,
            image_url: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn tables() -> PricingTables {
        let now = Utc::now();
        PricingTables {
            rental: vec![
                RentalPricing {
                    id: RentalPricingId(1),
                    service_id: None,
                    min_days: 8,
                    max_days: 14,
                    supplement: 35.0,
                    created_at: now,
                },
                RentalPricing {
                    id: RentalPricingId(2),
                    service_id: Some(ServiceId(1)),
                    min_days: 8,
                    max_days: 14,
                    supplement: 25.0,
                    created_at: now,
                },
                RentalPricing {
                    id: RentalPricingId(3),
                    service_id: None,
                    min_days: 15,
                    max_days: 30,
                    supplement: 70.0,
                    created_at: now,
                },
            ],
            transport: vec![
                TransportPricing {
                    id: TransportPricingId(1),
                    min_km: 0.0,
                    max_km: 20.0,
                    price: 60.0,
                    created_at: now,
                },
                TransportPricing {
                    id: TransportPricingId(2),
                    min_km: 20.0,
                    max_km: 50.0,
                    price: 95.0,
                    created_at: now,
                },
            ],
            treatment: vec![TreatmentPricing {
                id: TreatmentPricingId(1),
                waste_type_id: WasteTypeId(3),
                price_per_ton: 112.333,
                created_at: now,
            }],
        }
    }

    fn request(service: &Service, rental_days: i32, distance_km: f64) -> PriceRequest<'_> {
        PriceRequest {
            service,
            waste_type_id: WasteTypeId(3),
            rental_days,
            estimated_tons: 1.5,
            distance_km,
        }
    }

    #[test]
    fn total_is_rounded_sum_of_components() {
        let service = service();
        let price = calculate(&request(&service, 5, 12.0), &tables(), 0.2).unwrap();

        assert_eq!(price.base_price, 189.9);
        assert_eq!(price.duration_supplement, 0.0);
        assert_eq!(price.transport_price, 60.0);
        assert_eq!(price.treatment_price, 168.5);
        assert_eq!(
            price.total_ht,
            round2(price.base_price + price.duration_supplement + price.transport_price + price.treatment_price)
        );
        assert_eq!(price.total_ht, 418.4);
        assert_eq!(price.vat, 83.68);
        assert_eq!(price.total_ttc, 502.08);
    }

    #[test]
    fn service_tier_wins_over_generic_tier() {
        let service = service();
        let price = calculate(&request(&service, 10, 12.0), &tables(), 0.2).unwrap();
        assert_eq!(price.duration_supplement, 25.0);

        let price = calculate(&request(&service, 20, 12.0), &tables(), 0.2).unwrap();
        assert_eq!(price.duration_supplement, 70.0);
    }

    #[test]
    fn overlapping_tiers_resolve_to_lowest_bound_then_oldest() {
        let service = service();
        let now = Utc::now();
        let mut tables = tables();
        tables.rental.insert(
            0,
            RentalPricing {
                id: RentalPricingId(4),
                service_id: None,
                min_days: 10,
                max_days: 20,
                supplement: 50.0,
                created_at: now,
            },
        );
        tables.rental.push(RentalPricing {
            id: RentalPricingId(5),
            service_id: None,
            min_days: 15,
            max_days: 30,
            supplement: 90.0,
            created_at: now,
        });
        tables.transport.insert(
            0,
            TransportPricing {
                id: TransportPricingId(3),
                min_km: 10.0,
                max_km: 30.0,
                price: 80.0,
                created_at: now,
            },
        );

        // 18 days: tiers 4, 3 and 5 overlap, the lowest lower bound wins
        let price = calculate(&request(&service, 18, 5.0), &tables, 0.2).unwrap();
        assert_eq!(price.duration_supplement, 50.0);
        // 22 days: tiers 3 and 5 start on the same day, the oldest wins
        let price = calculate(&request(&service, 22, 5.0), &tables, 0.2).unwrap();
        assert_eq!(price.duration_supplement, 70.0);
        // 12 km: [0, 20) and [10, 30) overlap
        let price = calculate(&request(&service, 3, 12.0), &tables, 0.2).unwrap();
        assert_eq!(price.transport_price, 60.0);
        let price = calculate(&request(&service, 3, 25.0), &tables, 0.2).unwrap();
        assert_eq!(price.transport_price, 80.0);

        // Listing order does not matter
        tables.rental.reverse();
        tables.transport.reverse();
        let price = calculate(&request(&service, 22, 25.0), &tables, 0.2).unwrap();
        assert_eq!(price.duration_supplement, 70.0);
        assert_eq!(price.transport_price, 80.0);
    }

    #[test]
    fn transport_upper_bound_is_exclusive() {
        let service = service();
        let price = calculate(&request(&service, 3, 20.0), &tables(), 0.2).unwrap();
        assert_eq!(price.transport_price, 95.0);
    }

    #[test]
    fn too_far_is_out_of_service_area() {
        let service = service();
        let e = calculate(&request(&service, 3, 80.0), &tables(), 0.2).unwrap_err();
        assert_eq!(error_kind(&e), Some(Error::OutOfServiceArea));
    }

    #[test]
    fn missing_tiers_are_reported() {
        let service = service();
        let e = calculate(&request(&service, 45, 12.0), &tables(), 0.2).unwrap_err();
        assert_eq!(error_kind(&e), Some(Error::MissingPrice));

        let mut req = request(&service, 3, 12.0);
        req.waste_type_id = WasteTypeId(99);
        let e = calculate(&req, &tables(), 0.2).unwrap_err();
        assert_eq!(error_kind(&e), Some(Error::MissingPrice));
    }

    #[test]
    fn haversine_distance_paris_lyon() {
        let paris = Point::new(2.3522, 48.8566);
        let lyon = Point::new(4.8357, 45.7640);
        let km = distance_km(paris, lyon);
        assert!(km > 385.0 && km < 400.0, "{}", km);
    }
}
