//! HTTP entry point: resolves the caller, then dispatches the route to the
//! matching service.

pub mod routing;

use std::sync::Arc;

use chrono::Utc;
use hyper::header::{HeaderMap, AUTHORIZATION, USER_AGENT};
use hyper::{Body, Method, Request};

use self::routing::*;
use crate::errors::Error;
use crate::http::controller::Controller;
use crate::http::errors::ControllerError;
use crate::http::request_util::{parse_body, parse_query, serialize, serialize_future, ControllerFuture, ControllerResponse};
use crate::models::*;
use crate::router::RouteParser;
use crate::services::*;
use crate::types::CartSessionId;

pub const CART_SESSION_HEADER: &str = "cart-session";

pub type Factory<S> = Arc<dyn Fn(UserLogin) -> Box<S> + Send + Sync>;

/// Builds a service bound to the caller of the current request.
pub struct ServiceFactory {
    pub auth: Factory<dyn AuthService>,
    pub catalog: Factory<dyn CatalogService>,
    pub pricing: Factory<dyn PricingService>,
    pub time_slot: Factory<dyn TimeSlotService>,
    pub cart: Factory<dyn CartService>,
    pub order: Factory<dyn OrderService>,
    pub payment: Factory<dyn PaymentService>,
    pub fid: Factory<dyn FidService>,
    pub user: Factory<dyn UserService>,
    pub places: Factory<dyn PlacesService>,
    pub company: Factory<dyn CompanyService>,
    pub logs: Factory<dyn LogService>,
}

macro_rules! factory {
    ($ctx:expr, $service:ident, $trait_:ident) => {{
        let ctx = $ctx.clone();
        Arc::new(move |login| Box::new($service::new(ctx.clone(), login)) as Box<dyn $trait_>)
    }};
}

impl ServiceFactory {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            auth: factory!(ctx, AuthServiceImpl, AuthService),
            catalog: factory!(ctx, CatalogServiceImpl, CatalogService),
            pricing: factory!(ctx, PricingServiceImpl, PricingService),
            time_slot: factory!(ctx, TimeSlotServiceImpl, TimeSlotService),
            cart: factory!(ctx, CartServiceImpl, CartService),
            order: factory!(ctx, OrderServiceImpl, OrderService),
            payment: factory!(ctx, PaymentServiceImpl, PaymentService),
            fid: factory!(ctx, FidServiceImpl, FidService),
            user: factory!(ctx, UserServiceImpl, UserService),
            places: factory!(ctx, PlacesServiceImpl, PlacesService),
            company: factory!(ctx, CompanyServiceImpl, CompanyService),
            logs: factory!(ctx, LogServiceImpl, LogService),
        }
    }
}

pub struct ControllerImpl {
    route_parser: Arc<RouteParser<Route>>,
    service_factory: Arc<ServiceFactory>,
}

impl ControllerImpl {
    pub fn new(ctx: ServiceContext) -> Self {
        Self::with_factory(ServiceFactory::new(ctx))
    }

    pub fn with_factory(service_factory: ServiceFactory) -> Self {
        ControllerImpl {
            route_parser: Arc::new(routing::make_router()),
            service_factory: Arc::new(service_factory),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl hyper::header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty())
}

/// Resolves the caller: a bearer token must name a live session, otherwise
/// the request is anonymous and may carry a cart session id.
pub async fn extract_login(service_factory: &ServiceFactory, headers: &HeaderMap) -> Result<UserLogin, ControllerError> {
    let cart_session = match header_str(headers, CART_SESSION_HEADER) {
        Some(raw) => Some(raw.parse::<CartSessionId>().map_err(|e| {
            ControllerError::BadRequest(format_err!("Invalid cart session {}: {}", raw, e).context(Error::Parse).into())
        })?),
        None => None,
    };
    let anonymous = UserLogin::Anonymous { cart_session };

    let token = match header_str(headers, AUTHORIZATION) {
        Some(raw) => match raw.strip_prefix("Bearer ") {
            Some(token) => token.trim().to_string(),
            None => {
                return Err(ControllerError::Unauthorized(
                    format_err!("Unsupported authorization scheme").context(Error::Unauthorized).into(),
                ))
            }
        },
        None => return Ok(anonymous),
    };

    let login = (service_factory.auth)(anonymous)
        .authenticate(token)
        .await
        .map_err(ControllerError::from)?;
    debug!("Authenticated request as {:?}", login.user_id());
    Ok(login)
}

fn csv_filename(prefix: &str) -> String {
    format!("{}-{}.csv", prefix, Utc::now().format("%Y-%m-%d"))
}

impl Controller for ControllerImpl {
    fn call(&self, request: Request<Body>) -> ControllerFuture {
        let service_factory = self.service_factory.clone();
        let route = self.route_parser.test(request.uri().path());

        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let method = parts.method;
            let query = parts.uri.query().map(str::to_string);
            let query = query.as_deref();

            let route = match route {
                Some(route) => route,
                None => return Err(ControllerError::NotFound),
            };
            if let (&Method::GET, Route::Healthcheck) = (&method, route) {
                return serialize(&"Ok");
            }

            let login = extract_login(&service_factory, &parts.headers).await?;
            let sf = &service_factory;

            match (method, route) {
                // Auth
                (Method::POST, Route::AuthRegister) => serialize_future((sf.auth)(login).register(parse_body(body).await?)).await,
                (Method::POST, Route::AuthLogin) => {
                    let user_agent = header_str(&parts.headers, USER_AGENT).map(str::to_string);
                    serialize_future((sf.auth)(login).login(parse_body(body).await?, user_agent)).await
                }
                (Method::POST, Route::AuthLogout) => serialize_future((sf.auth)(login).logout()).await,
                (Method::POST, Route::AuthVerifyEmail) => serialize_future((sf.auth)(login).verify_email(parse_body(body).await?)).await,
                (Method::GET, Route::AuthMe) => serialize_future((sf.auth)(login).me()).await,
                (Method::GET, Route::AuthSessions) => serialize_future((sf.auth)(login).sessions()).await,
                (Method::DELETE, Route::AuthSession { session_id }) => serialize_future((sf.auth)(login).revoke_session(session_id)).await,

                // Catalog
                (Method::GET, Route::Services) => serialize_future((sf.catalog)(login).list_services()).await,
                (Method::POST, Route::Services) => serialize_future((sf.catalog)(login).create_service(parse_body(body).await?)).await,
                (Method::GET, Route::Service { service_id }) => serialize_future((sf.catalog)(login).get_service(service_id)).await,
                (Method::PUT, Route::Service { service_id }) => {
                    serialize_future((sf.catalog)(login).update_service(service_id, parse_body(body).await?)).await
                }
                (Method::DELETE, Route::Service { service_id }) => serialize_future((sf.catalog)(login).deactivate_service(service_id)).await,
                (Method::GET, Route::WasteTypes) => serialize_future((sf.catalog)(login).list_waste_types()).await,
                (Method::POST, Route::WasteTypes) => serialize_future((sf.catalog)(login).create_waste_type(parse_body(body).await?)).await,
                (Method::PUT, Route::WasteType { waste_type_id }) => {
                    serialize_future((sf.catalog)(login).update_waste_type(waste_type_id, parse_body(body).await?)).await
                }
                (Method::DELETE, Route::WasteType { waste_type_id }) => {
                    serialize_future((sf.catalog)(login).deactivate_waste_type(waste_type_id)).await
                }

                // Pricing
                (Method::POST, Route::PricingQuote) => serialize_future((sf.pricing)(login).quote(parse_body(body).await?)).await,
                (Method::GET, Route::RentalPricing) => {
                    let tables = (sf.pricing)(login).tables().await?;
                    serialize(&tables.rental)
                }
                (Method::POST, Route::RentalPricing) => serialize_future((sf.pricing)(login).create_rental(parse_body(body).await?)).await,
                (Method::PUT, Route::RentalPricingTier { id }) => {
                    serialize_future((sf.pricing)(login).update_rental(id, parse_body(body).await?)).await
                }
                (Method::DELETE, Route::RentalPricingTier { id }) => serialize_future((sf.pricing)(login).delete_rental(id)).await,
                (Method::GET, Route::TransportPricing) => {
                    let tables = (sf.pricing)(login).tables().await?;
                    serialize(&tables.transport)
                }
                (Method::POST, Route::TransportPricing) => {
                    serialize_future((sf.pricing)(login).create_transport(parse_body(body).await?)).await
                }
                (Method::PUT, Route::TransportPricingTier { id }) => {
                    serialize_future((sf.pricing)(login).update_transport(id, parse_body(body).await?)).await
                }
                (Method::DELETE, Route::TransportPricingTier { id }) => serialize_future((sf.pricing)(login).delete_transport(id)).await,
                (Method::GET, Route::TreatmentPricing) => {
                    let tables = (sf.pricing)(login).tables().await?;
                    serialize(&tables.treatment)
                }
                (Method::POST, Route::TreatmentPricing) => {
                    serialize_future((sf.pricing)(login).create_treatment(parse_body(body).await?)).await
                }
                (Method::PUT, Route::TreatmentPricingTier { id }) => {
                    serialize_future((sf.pricing)(login).update_treatment(id, parse_body(body).await?)).await
                }
                (Method::DELETE, Route::TreatmentPricingTier { id }) => serialize_future((sf.pricing)(login).delete_treatment(id)).await,

                // Time slots
                (Method::GET, Route::TimeSlots) => serialize_future((sf.time_slot)(login).list(parse_query(query)?)).await,
                (Method::POST, Route::TimeSlots) => serialize_future((sf.time_slot)(login).create(parse_body(body).await?)).await,
                (Method::DELETE, Route::TimeSlot { time_slot_id }) => serialize_future((sf.time_slot)(login).delete(time_slot_id)).await,

                // Cart
                (Method::GET, Route::Cart) => serialize_future((sf.cart)(login).get_cart()).await,
                (Method::POST, Route::CartItems) => serialize_future((sf.cart)(login).add_item(parse_body(body).await?)).await,
                (Method::PUT, Route::CartItem { cart_item_id }) => {
                    serialize_future((sf.cart)(login).update_item(cart_item_id, parse_body(body).await?)).await
                }
                (Method::DELETE, Route::CartItem { cart_item_id }) => serialize_future((sf.cart)(login).delete_item(cart_item_id)).await,
                (Method::POST, Route::CartClear) => serialize_future((sf.cart)(login).clear_cart()).await,
                (Method::POST, Route::CartMerge) => serialize_future((sf.cart)(login).merge(parse_body(body).await?)).await,

                // Orders
                (Method::GET, Route::Orders) => serialize_future((sf.order)(login).list_mine()).await,
                (Method::POST, Route::Orders) => serialize_future((sf.order)(login).create_order(parse_body(body).await?)).await,
                (Method::POST, Route::OrdersCheckout) => serialize_future((sf.order)(login).checkout()).await,
                (Method::GET, Route::Order { order_id }) => serialize_future((sf.order)(login).get_order(order_id)).await,
                (Method::POST, Route::OrderCancel { order_id }) => serialize_future((sf.order)(login).cancel(order_id)).await,
                (Method::PUT, Route::OrderDeliveryDate { order_id }) => {
                    serialize_future((sf.order)(login).respond_delivery_date(order_id, parse_body(body).await?)).await
                }
                (Method::POST, Route::OrderPaymentIntent { order_id }) => {
                    serialize_future((sf.payment)(login).create_intent(order_id)).await
                }
                (Method::POST, Route::OrderPaymentConfirm { order_id }) => serialize_future((sf.payment)(login).confirm(order_id)).await,

                // Back office orders
                (Method::GET, Route::AdminOrders) => serialize_future((sf.order)(login).search(parse_query(query)?)).await,
                (Method::GET, Route::AdminOrder { order_id }) => {
                    acl_admin(login)?;
                    serialize_future((sf.order)(login).get_order(OrderIdentifier::Id(order_id))).await
                }
                (Method::DELETE, Route::AdminOrder { order_id }) => serialize_future((sf.order)(login).delete_order(order_id)).await,
                (Method::PUT, Route::AdminOrderStatus { order_id }) => {
                    serialize_future((sf.order)(login).set_status(order_id, parse_body(body).await?)).await
                }
                (Method::PUT, Route::AdminOrderDeliveryDate { order_id }) => {
                    serialize_future((sf.order)(login).propose_delivery_date(order_id, parse_body(body).await?)).await
                }
                (Method::GET, Route::AdminOrderHistory { order_id }) => serialize_future((sf.order)(login).history(order_id)).await,

                // Back office users
                (Method::GET, Route::AdminUsers) => serialize_future((sf.user)(login).list(parse_query(query)?)).await,
                (Method::GET, Route::AdminUsersExport) => {
                    let body = (sf.user)(login).export_csv(parse_query(query)?).await?;
                    Ok(ControllerResponse::csv(csv_filename("users"), body))
                }
                (Method::PUT, Route::AdminUserRole { user_id }) => {
                    serialize_future((sf.user)(login).set_role(user_id, parse_body(body).await?)).await
                }
                (Method::POST, Route::AdminUserUnlock { user_id }) => serialize_future((sf.user)(login).unlock(user_id)).await,

                // FID
                (Method::GET, Route::Fids) => serialize_future((sf.fid)(login).list_mine()).await,
                (Method::POST, Route::Fids) => serialize_future((sf.fid)(login).create(parse_body(body).await?)).await,
                (Method::GET, Route::Fid { fid_id }) => serialize_future((sf.fid)(login).get(fid_id)).await,
                (Method::PUT, Route::Fid { fid_id }) => serialize_future((sf.fid)(login).update(fid_id, parse_body(body).await?)).await,
                (Method::POST, Route::FidSubmit { fid_id }) => serialize_future((sf.fid)(login).submit(fid_id)).await,
                (Method::GET, Route::AdminFids) => serialize_future((sf.fid)(login).list(parse_query(query)?)).await,
                (Method::GET, Route::AdminFidsExport) => {
                    let body = (sf.fid)(login).export_csv(parse_query(query)?).await?;
                    Ok(ControllerResponse::csv(csv_filename("fid"), body))
                }
                (Method::PUT, Route::AdminFidStatus { fid_id }) => {
                    serialize_future((sf.fid)(login).review(fid_id, parse_body(body).await?)).await
                }

                // Places
                (Method::GET, Route::PlacesAutocomplete) => serialize_future((sf.places)(login).autocomplete(parse_query(query)?)).await,
                (Method::GET, Route::PlacesDetails) => serialize_future((sf.places)(login).details(parse_query(query)?)).await,

                // Site configuration and logs
                (Method::GET, Route::CompanyActivities) => serialize_future((sf.company)(login).get()).await,
                (Method::PUT, Route::AdminCompanyActivities) => serialize_future((sf.company)(login).update(parse_body(body).await?)).await,
                (Method::GET, Route::AdminAuditLogs) => serialize_future((sf.logs)(login).audit_logs(parse_query(query)?)).await,
                (Method::GET, Route::AdminEmailLogs) => serialize_future((sf.logs)(login).email_logs(parse_query(query)?)).await,

                (method, route) => {
                    debug!("No handler for {} {:?}", method, route);
                    Err(ControllerError::NotFound)
                }
            }
        })
    }
}

/// Back office lookups answer 403 to customers before touching the order.
fn acl_admin(login: UserLogin) -> Result<(), ControllerError> {
    crate::acl::require_admin(&login).map_err(ControllerError::from)
}
