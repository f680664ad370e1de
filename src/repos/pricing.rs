use tokio_postgres::GenericClient;

use crate::db::*;
use crate::errors::RepoError;
use crate::models::*;
use crate::types::*;

pub const RENTAL_TABLE: &str = "rental_pricing";
pub const TRANSPORT_TABLE: &str = "transport_pricing";
pub const TREATMENT_TABLE: &str = "treatment_pricing";

pub type RentalPricingRepoImpl =
    DbRepoImpl<RentalPricing, RentalPricingPayload, PricingFilter<RentalPricingId>, PricingUpdater<RentalPricingId, RentalPricingPayload>>;
pub type TransportPricingRepoImpl = DbRepoImpl<
    TransportPricing,
    TransportPricingPayload,
    PricingFilter<TransportPricingId>,
    PricingUpdater<TransportPricingId, TransportPricingPayload>,
>;
pub type TreatmentPricingRepoImpl =
    DbRepoImpl<TreatmentPricing, TreatmentPricingPayload, TreatmentPricingFilter, PricingUpdater<TreatmentPricingId, TreatmentPricingPayload>>;

pub fn make_rental_repo() -> RentalPricingRepoImpl {
    RentalPricingRepoImpl::new(RENTAL_TABLE)
}

pub fn make_transport_repo() -> TransportPricingRepoImpl {
    TransportPricingRepoImpl::new(TRANSPORT_TABLE)
}

pub fn make_treatment_repo() -> TreatmentPricingRepoImpl {
    TreatmentPricingRepoImpl::new(TREATMENT_TABLE)
}

/// Loads the three tariff tables the calculator needs, tiers sorted by
/// lower bound.
pub async fn load_tables<C>(conn: &C) -> Result<PricingTables, RepoError>
where
    C: GenericClient + Sync,
{
    Ok(PricingTables {
        rental: make_rental_repo().select_full(conn, PricingFilter::all(), rental_by_range).await?,
        transport: make_transport_repo()
            .select_full(conn, PricingFilter::all(), transport_by_range)
            .await?,
        treatment: make_treatment_repo().select(conn, TreatmentPricingFilter::default()).await?,
    })
}
