use std::str::FromStr;

use crate::models::OrderIdentifier;
use crate::router::RouteParser;
use crate::types::*;

/// List of all routes with params for the app
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Route {
    Healthcheck,
    AuthRegister,
    AuthLogin,
    AuthLogout,
    AuthVerifyEmail,
    AuthMe,
    AuthSessions,
    AuthSession { session_id: SessionId },
    Services,
    Service { service_id: ServiceId },
    WasteTypes,
    WasteType { waste_type_id: WasteTypeId },
    RentalPricing,
    RentalPricingTier { id: RentalPricingId },
    TransportPricing,
    TransportPricingTier { id: TransportPricingId },
    TreatmentPricing,
    TreatmentPricingTier { id: TreatmentPricingId },
    PricingQuote,
    TimeSlots,
    TimeSlot { time_slot_id: TimeSlotId },
    Cart,
    CartItems,
    CartItem { cart_item_id: CartItemId },
    CartClear,
    CartMerge,
    Orders,
    OrdersCheckout,
    Order { order_id: OrderIdentifier },
    OrderCancel { order_id: OrderId },
    OrderPaymentIntent { order_id: OrderId },
    OrderPaymentConfirm { order_id: OrderId },
    OrderDeliveryDate { order_id: OrderId },
    AdminOrders,
    AdminOrder { order_id: OrderId },
    AdminOrderStatus { order_id: OrderId },
    AdminOrderDeliveryDate { order_id: OrderId },
    AdminOrderHistory { order_id: OrderId },
    AdminUsers,
    AdminUsersExport,
    AdminUserRole { user_id: UserId },
    AdminUserUnlock { user_id: UserId },
    Fids,
    Fid { fid_id: FidDocumentId },
    FidSubmit { fid_id: FidDocumentId },
    AdminFids,
    AdminFidsExport,
    AdminFidStatus { fid_id: FidDocumentId },
    PlacesAutocomplete,
    PlacesDetails,
    CompanyActivities,
    AdminCompanyActivities,
    AdminAuditLogs,
    AdminEmailLogs,
}

fn first_param<T: FromStr>(params: Vec<&str>) -> Option<T> {
    params.get(0).and_then(|v| v.parse().ok())
}

pub fn make_router() -> RouteParser<Route> {
    let mut route_parser: RouteParser<Route> = Default::default();

    route_parser.add_route(r"^/healthcheck$", || Route::Healthcheck);

    // Auth
    route_parser.add_route(r"^/api/auth/register$", || Route::AuthRegister);
    route_parser.add_route(r"^/api/auth/login$", || Route::AuthLogin);
    route_parser.add_route(r"^/api/auth/logout$", || Route::AuthLogout);
    route_parser.add_route(r"^/api/auth/verify-email$", || Route::AuthVerifyEmail);
    route_parser.add_route(r"^/api/auth/me$", || Route::AuthMe);
    route_parser.add_route(r"^/api/auth/sessions$", || Route::AuthSessions);
    route_parser.add_route_with_params(r"^/api/auth/sessions/([a-fA-F0-9-]+)$", |params| {
        first_param(params).map(|session_id| Route::AuthSession { session_id })
    });

    // Catalog
    route_parser.add_route(r"^/api/services$", || Route::Services);
    route_parser.add_route_with_params(r"^/api/services/(\d+)$", |params| {
        first_param(params).map(|service_id| Route::Service { service_id })
    });
    route_parser.add_route(r"^/api/waste-types$", || Route::WasteTypes);
    route_parser.add_route_with_params(r"^/api/waste-types/(\d+)$", |params| {
        first_param(params).map(|waste_type_id| Route::WasteType { waste_type_id })
    });

    // Pricing
    route_parser.add_route(r"^/api/pricing/quote$", || Route::PricingQuote);
    route_parser.add_route(r"^/api/pricing/rental$", || Route::RentalPricing);
    route_parser.add_route_with_params(r"^/api/pricing/rental/(\d+)$", |params| {
        first_param(params).map(|id| Route::RentalPricingTier { id })
    });
    route_parser.add_route(r"^/api/pricing/transport$", || Route::TransportPricing);
    route_parser.add_route_with_params(r"^/api/pricing/transport/(\d+)$", |params| {
        first_param(params).map(|id| Route::TransportPricingTier { id })
    });
    route_parser.add_route(r"^/api/pricing/treatment$", || Route::TreatmentPricing);
    route_parser.add_route_with_params(r"^/api/pricing/treatment/(\d+)$", |params| {
        first_param(params).map(|id| Route::TreatmentPricingTier { id })
    });

    // Time slots
    route_parser.add_route(r"^/api/time-slots$", || Route::TimeSlots);
    route_parser.add_route_with_params(r"^/api/time-slots/(\d+)$", |params| {
        first_param(params).map(|time_slot_id| Route::TimeSlot { time_slot_id })
    });

    // Cart
    route_parser.add_route(r"^/api/cart$", || Route::Cart);
    route_parser.add_route(r"^/api/cart/items$", || Route::CartItems);
    route_parser.add_route_with_params(r"^/api/cart/items/([a-fA-F0-9-]+)$", |params| {
        first_param(params).map(|cart_item_id| Route::CartItem { cart_item_id })
    });
    route_parser.add_route(r"^/api/cart/clear$", || Route::CartClear);
    route_parser.add_route(r"^/api/cart/merge$", || Route::CartMerge);

    // Orders
    route_parser.add_route(r"^/api/orders$", || Route::Orders);
    route_parser.add_route(r"^/api/orders/checkout$", || Route::OrdersCheckout);
    route_parser.add_route_with_params(r"^/api/orders/by-slug/(\d+)$", |params| {
        first_param(params).map(|slug| Route::Order {
            order_id: OrderIdentifier::Slug(slug),
        })
    });
    route_parser.add_route_with_params(r"^/api/orders/([a-fA-F0-9-]+)$", |params| {
        first_param(params).map(|id| Route::Order {
            order_id: OrderIdentifier::Id(id),
        })
    });
    route_parser.add_route_with_params(r"^/api/orders/([a-fA-F0-9-]+)/cancel$", |params| {
        first_param(params).map(|order_id| Route::OrderCancel { order_id })
    });
    route_parser.add_route_with_params(r"^/api/orders/([a-fA-F0-9-]+)/payment-intent$", |params| {
        first_param(params).map(|order_id| Route::OrderPaymentIntent { order_id })
    });
    route_parser.add_route_with_params(r"^/api/orders/([a-fA-F0-9-]+)/payment-confirm$", |params| {
        first_param(params).map(|order_id| Route::OrderPaymentConfirm { order_id })
    });
    route_parser.add_route_with_params(r"^/api/orders/([a-fA-F0-9-]+)/delivery-date$", |params| {
        first_param(params).map(|order_id| Route::OrderDeliveryDate { order_id })
    });

    // Admin orders
    route_parser.add_route(r"^/api/admin/orders$", || Route::AdminOrders);
    route_parser.add_route_with_params(r"^/api/admin/orders/([a-fA-F0-9-]+)$", |params| {
        first_param(params).map(|order_id| Route::AdminOrder { order_id })
    });
    route_parser.add_route_with_params(r"^/api/admin/orders/([a-fA-F0-9-]+)/status$", |params| {
        first_param(params).map(|order_id| Route::AdminOrderStatus { order_id })
    });
    route_parser.add_route_with_params(r"^/api/admin/orders/([a-fA-F0-9-]+)/delivery-date$", |params| {
        first_param(params).map(|order_id| Route::AdminOrderDeliveryDate { order_id })
    });
    route_parser.add_route_with_params(r"^/api/admin/orders/([a-fA-F0-9-]+)/history$", |params| {
        first_param(params).map(|order_id| Route::AdminOrderHistory { order_id })
    });

    // Admin users
    route_parser.add_route(r"^/api/admin/users$", || Route::AdminUsers);
    route_parser.add_route(r"^/api/admin/users/export$", || Route::AdminUsersExport);
    route_parser.add_route_with_params(r"^/api/admin/users/([a-fA-F0-9-]+)/role$", |params| {
        first_param(params).map(|user_id| Route::AdminUserRole { user_id })
    });
    route_parser.add_route_with_params(r"^/api/admin/users/([a-fA-F0-9-]+)/unlock$", |params| {
        first_param(params).map(|user_id| Route::AdminUserUnlock { user_id })
    });

    // FID
    route_parser.add_route(r"^/api/fid$", || Route::Fids);
    route_parser.add_route_with_params(r"^/api/fid/([a-fA-F0-9-]+)$", |params| {
        first_param(params).map(|fid_id| Route::Fid { fid_id })
    });
    route_parser.add_route_with_params(r"^/api/fid/([a-fA-F0-9-]+)/submit$", |params| {
        first_param(params).map(|fid_id| Route::FidSubmit { fid_id })
    });
    route_parser.add_route(r"^/api/admin/fid$", || Route::AdminFids);
    route_parser.add_route(r"^/api/admin/fid/export$", || Route::AdminFidsExport);
    route_parser.add_route_with_params(r"^/api/admin/fid/([a-fA-F0-9-]+)/status$", |params| {
        first_param(params).map(|fid_id| Route::AdminFidStatus { fid_id })
    });

    // Places
    route_parser.add_route(r"^/api/places/autocomplete$", || Route::PlacesAutocomplete);
    route_parser.add_route(r"^/api/places/details$", || Route::PlacesDetails);

    // Site configuration and logs
    route_parser.add_route(r"^/api/company-activities$", || Route::CompanyActivities);
    route_parser.add_route(r"^/api/admin/company-activities$", || Route::AdminCompanyActivities);
    route_parser.add_route(r"^/api/admin/audit-logs$", || Route::AdminAuditLogs);
    route_parser.add_route(r"^/api/admin/email-logs$", || Route::AdminEmailLogs);

    route_parser
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_routes() {
        let router = make_router();
        let id = OrderId::new();

        assert_eq!(router.test("/api/orders/checkout"), Some(Route::OrdersCheckout));
        assert_eq!(
            router.test(&format!("/api/orders/{}", id)),
            Some(Route::Order {
                order_id: OrderIdentifier::Id(id)
            })
        );
        assert_eq!(
            router.test("/api/orders/by-slug/123"),
            Some(Route::Order {
                order_id: OrderIdentifier::Slug(OrderSlug(123))
            })
        );
        assert_eq!(
            router.test(&format!("/api/orders/{}/payment-intent", id)),
            Some(Route::OrderPaymentIntent { order_id: id })
        );
        assert_eq!(
            router.test(&format!("/api/admin/orders/{}/history", id)),
            Some(Route::AdminOrderHistory { order_id: id })
        );
    }

    #[test]
    fn literal_routes_win_over_ids() {
        let router = make_router();
        assert_eq!(router.test("/api/admin/users/export"), Some(Route::AdminUsersExport));
        assert_eq!(router.test("/api/admin/fid/export"), Some(Route::AdminFidsExport));
        assert_eq!(router.test("/api/pricing/quote"), Some(Route::PricingQuote));
    }

    #[test]
    fn malformed_ids_do_not_match() {
        let router = make_router();
        assert_eq!(router.test("/api/services/abc"), None);
        assert_eq!(router.test("/api/orders/not-a-uuid"), None);
        assert_eq!(router.test("/api/unknown"), None);
    }
}
