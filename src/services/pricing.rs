//! Tariff tables and quotes.

use failure::Error as FailureError;
use geo::Point as GeoPoint;
use serde_json::json;
use tokio_postgres::GenericClient;

use super::types::{validate, ServiceContext, ServiceFuture};
use crate::acl;
use crate::config::Config;
use crate::errors::Error;
use crate::models::*;
use crate::pricing::{self, PriceRequest};
use crate::repos;
use crate::types::{RentalPricingId, TransportPricingId, TreatmentPricingId};

/// Validates a configuration and prices it against the current tables.
/// Inactive services and waste types cannot be booked.
pub async fn price_configuration<C>(conn: &C, config: &Config, configuration: &BookingConfiguration) -> Result<Quote, FailureError>
where
    C: GenericClient + Sync,
{
    let location = configuration
        .validate_for_pricing()
        .map_err(|e| format_err!("Invalid booking configuration").context(Error::Validate(e)))?;

    let service = repos::service::make_repo()
        .select_one(
            conn,
            ServiceFilter {
                id: Some(configuration.service_id),
                active: Some(true),
            },
        )
        .await?
        .ok_or_else(|| format_err!("Service {}", configuration.service_id).context(Error::NotFound))?;
    let waste_type = repos::waste_type::make_repo()
        .select_one(
            conn,
            WasteTypeFilter {
                id: Some(configuration.waste_type_id),
                active: Some(true),
            },
        )
        .await?
        .ok_or_else(|| format_err!("Waste type {}", configuration.waste_type_id).context(Error::NotFound))?;

    let tables = repos::pricing::load_tables(conn).await?;
    let depot = GeoPoint::new(config.pricing.depot_longitude, config.pricing.depot_latitude);
    let price = pricing::calculate(
        &PriceRequest {
            service: &service,
            waste_type_id: waste_type.id,
            rental_days: configuration.rental_days,
            estimated_tons: configuration.estimated_tons,
            distance_km: pricing::distance_km(depot, location),
        },
        &tables,
        config.pricing.vat_rate,
    )?;

    Ok(Quote {
        service,
        waste_type,
        rental_days: configuration.rental_days,
        estimated_tons: configuration.estimated_tons,
        price,
    })
}

pub trait PricingService: Send + Sync {
    /// All tiers, public
    fn tables(&self) -> ServiceFuture<PricingTables>;
    /// Prices a configuration without booking anything
    fn quote(&self, configuration: BookingConfiguration) -> ServiceFuture<Quote>;
    fn create_rental(&self, payload: RentalPricingPayload) -> ServiceFuture<RentalPricing>;
    fn update_rental(&self, id: RentalPricingId, payload: RentalPricingPayload) -> ServiceFuture<RentalPricing>;
    fn delete_rental(&self, id: RentalPricingId) -> ServiceFuture<RentalPricing>;
    fn create_transport(&self, payload: TransportPricingPayload) -> ServiceFuture<TransportPricing>;
    fn update_transport(&self, id: TransportPricingId, payload: TransportPricingPayload) -> ServiceFuture<TransportPricing>;
    fn delete_transport(&self, id: TransportPricingId) -> ServiceFuture<TransportPricing>;
    fn create_treatment(&self, payload: TreatmentPricingPayload) -> ServiceFuture<TreatmentPricing>;
    fn update_treatment(&self, id: TreatmentPricingId, payload: TreatmentPricingPayload) -> ServiceFuture<TreatmentPricing>;
    fn delete_treatment(&self, id: TreatmentPricingId) -> ServiceFuture<TreatmentPricing>;
}

pub struct PricingServiceImpl {
    pub ctx: ServiceContext,
    pub login: UserLogin,
}

impl PricingServiceImpl {
    pub fn new(ctx: ServiceContext, login: UserLogin) -> Self {
        Self { ctx, login }
    }
}

async fn audit_pricing<C>(conn: &C, login: UserLogin, entity_id: String, action: &str, details: serde_json::Value) -> Result<(), FailureError>
where
    C: GenericClient + Sync,
{
    repos::audit_log::make_repo()
        .insert_exactly_one(conn, NewAuditLog::new(AuditEntity::Pricing, entity_id, action, login.user_id(), details))
        .await?;
    Ok(())
}

impl PricingService for PricingServiceImpl {
    fn tables(&self) -> ServiceFuture<PricingTables> {
        let ctx = self.ctx.clone();

        Box::pin(async move {
            let conn = ctx.connection().await?;
            Ok(repos::pricing::load_tables(&*conn).await?)
        })
    }

    fn quote(&self, configuration: BookingConfiguration) -> ServiceFuture<Quote> {
        let ctx = self.ctx.clone();

        Box::pin(async move {
            let conn = ctx.connection().await?;
            price_configuration(&*conn, &ctx.config, &configuration).await
        })
    }

    fn create_rental(&self, payload: RentalPricingPayload) -> ServiceFuture<RentalPricing> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            validate(&payload)?;
            let conn = ctx.connection().await?;
            let details = serde_json::to_value(&payload)?;
            let tier = repos::pricing::make_rental_repo().insert_exactly_one(&*conn, payload).await?;
            audit_pricing(&*conn, login, format!("rental:{}", tier.id), "created", details).await?;
            Ok(tier)
        })
    }

    fn update_rental(&self, id: RentalPricingId, payload: RentalPricingPayload) -> ServiceFuture<RentalPricing> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            validate(&payload)?;
            let conn = ctx.connection().await?;
            let details = serde_json::to_value(&payload)?;
            let tier = repos::pricing::make_rental_repo()
                .update_exactly_one(&*conn, PricingUpdater { id, payload })
                .await?;
            audit_pricing(&*conn, login, format!("rental:{}", id), "updated", details).await?;
            Ok(tier)
        })
    }

    fn delete_rental(&self, id: RentalPricingId) -> ServiceFuture<RentalPricing> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            let conn = ctx.connection().await?;
            let tier = repos::pricing::make_rental_repo()
                .delete(&*conn, id.into())
                .await?
                .pop()
                .ok_or_else(|| format_err!("Rental tier {}", id).context(Error::NotFound))?;
            audit_pricing(&*conn, login, format!("rental:{}", id), "deleted", json!({})).await?;
            Ok(tier)
        })
    }

    fn create_transport(&self, payload: TransportPricingPayload) -> ServiceFuture<TransportPricing> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            validate(&payload)?;
            let conn = ctx.connection().await?;
            let details = serde_json::to_value(&payload)?;
            let tier = repos::pricing::make_transport_repo().insert_exactly_one(&*conn, payload).await?;
            audit_pricing(&*conn, login, format!("transport:{}", tier.id), "created", details).await?;
            Ok(tier)
        })
    }

    fn update_transport(&self, id: TransportPricingId, payload: TransportPricingPayload) -> ServiceFuture<TransportPricing> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            validate(&payload)?;
            let conn = ctx.connection().await?;
            let details = serde_json::to_value(&payload)?;
            let tier = repos::pricing::make_transport_repo()
                .update_exactly_one(&*conn, PricingUpdater { id, payload })
                .await?;
            audit_pricing(&*conn, login, format!("transport:{}", id), "updated", details).await?;
            Ok(tier)
        })
    }

    fn delete_transport(&self, id: TransportPricingId) -> ServiceFuture<TransportPricing> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            let conn = ctx.connection().await?;
            let tier = repos::pricing::make_transport_repo()
                .delete(&*conn, id.into())
                .await?
                .pop()
                .ok_or_else(|| format_err!("Transport tier {}", id).context(Error::NotFound))?;
            audit_pricing(&*conn, login, format!("transport:{}", id), "deleted", json!({})).await?;
            Ok(tier)
        })
    }

    fn create_treatment(&self, payload: TreatmentPricingPayload) -> ServiceFuture<TreatmentPricing> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            validate(&payload)?;
            let conn = ctx.connection().await?;
            let details = serde_json::to_value(&payload)?;
            let pricing = repos::pricing::make_treatment_repo().insert_exactly_one(&*conn, payload).await?;
            audit_pricing(&*conn, login, format!("treatment:{}", pricing.id), "created", details).await?;
            Ok(pricing)
        })
    }

    fn update_treatment(&self, id: TreatmentPricingId, payload: TreatmentPricingPayload) -> ServiceFuture<TreatmentPricing> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            validate(&payload)?;
            let conn = ctx.connection().await?;
            let details = serde_json::to_value(&payload)?;
            let pricing = repos::pricing::make_treatment_repo()
                .update_exactly_one(&*conn, PricingUpdater { id, payload })
                .await?;
            audit_pricing(&*conn, login, format!("treatment:{}", id), "updated", details).await?;
            Ok(pricing)
        })
    }

    fn delete_treatment(&self, id: TreatmentPricingId) -> ServiceFuture<TreatmentPricing> {
        let ctx = self.ctx.clone();
        let login = self.login;

        Box::pin(async move {
            acl::require_admin(&login)?;
            let conn = ctx.connection().await?;
            let pricing = repos::pricing::make_treatment_repo()
                .delete(
                    &*conn,
                    TreatmentPricingFilter {
                        id: Some(id),
                        ..Default::default()
                    },
                )
                .await?
                .pop()
                .ok_or_else(|| format_err!("Treatment pricing {}", id).context(Error::NotFound))?;
            audit_pricing(&*conn, login, format!("treatment:{}", id), "deleted", json!({})).await?;
            Ok(pricing)
        })
    }
}
