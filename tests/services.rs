//! Service flows against a live Postgres with stubbed providers. Run with
//! `RUN_MODE=test cargo test -- --ignored` once `config/test.toml` points at a
//! scratch database.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveTime, Utc};
use failure::Error as FailureError;
use futures::future::{self, BoxFuture};
use geo::Point;
use hyper::StatusCode;

use bennes_lib::clients::*;
use bennes_lib::config::Config;
use bennes_lib::errors::{error_kind, Error};
use bennes_lib::http::errors::ControllerError;
use bennes_lib::models::*;
use bennes_lib::services::*;
use bennes_lib::types::*;
use bennes_lib::{create_db_pool, migrations, repos};

const PASSWORD: &str = "benne-de-chantier";
const DECLINED: &str = "Votre carte a été refusée.";

/// Emails are dropped, every payment intent comes back declined.
struct DecliningProviders;

impl PaymentClient for DecliningProviders {
    fn create_intent(&self, _request: CreatePaymentIntent) -> BoxFuture<'static, Result<PaymentIntent, FailureError>> {
        Box::pin(future::err(failure::err_msg("intents are created beforehand in tests")))
    }

    fn retrieve_intent(&self, intent_id: String) -> BoxFuture<'static, Result<PaymentIntent, FailureError>> {
        Box::pin(future::ok(PaymentIntent {
            id: intent_id,
            client_secret: None,
            amount: 0,
            currency: "eur".to_string(),
            status: "requires_payment_method".to_string(),
            metadata: HashMap::new(),
            last_payment_error: Some(PaymentError {
                message: Some(DECLINED.to_string()),
                code: Some("card_declined".to_string()),
                decline_code: None,
            }),
        }))
    }
}

impl EmailClient for DecliningProviders {
    fn send(&self, _message: EmailMessage) -> BoxFuture<'static, Result<EmailDelivery, FailureError>> {
        Box::pin(future::ok(EmailDelivery::Skipped))
    }
}

impl PlacesClient for DecliningProviders {
    fn autocomplete(&self, _input: String, _session_token: Option<String>) -> BoxFuture<'static, Result<Vec<PlacePrediction>, FailureError>> {
        Box::pin(future::ok(vec![]))
    }

    fn details(&self, _place_id: String, _session_token: Option<String>) -> BoxFuture<'static, Result<AddressFull, FailureError>> {
        Box::pin(future::err(failure::err_msg("no places in tests")))
    }
}

async fn prepare_context() -> ServiceContext {
    let config = Config::new().unwrap();
    let db_pool = create_db_pool(&config).await.unwrap();
    migrations::run(&db_pool).await.unwrap();
    let providers = Arc::new(DecliningProviders);
    ServiceContext {
        db_pool,
        config: Arc::new(config),
        payment: providers.clone(),
        email: providers.clone(),
        places: providers,
    }
}

async fn create_user(ctx: &ServiceContext, role: UserRole) -> (User, UserLogin) {
    let conn = ctx.db_pool.get().await.unwrap();
    let user = repos::user::make_repo()
        .insert_exactly_one(
            &*conn,
            NewUser {
                email: format!("client-{}@exemple.fr", rand::random::<u32>()),
                password_hash: bcrypt::hash(PASSWORD, 4).unwrap(),
                first_name: "Claire".to_string(),
                last_name: "Moreau".to_string(),
                phone: None,
                company_name: None,
                role,
                verification_token: None,
            },
        )
        .await
        .unwrap();
    let login = UserLogin::User {
        user_id: user.id,
        role,
        session_id: SessionId::new(),
    };
    (user, login)
}

async fn create_slot(ctx: &ServiceContext, max_bookings: i32) -> TimeSlot {
    let conn = ctx.db_pool.get().await.unwrap();
    let date = Utc::now().date_naive() + Duration::days(3650 + i64::from(rand::random::<u16>()));
    repos::time_slot::make_repo()
        .insert_exactly_one(
            &*conn,
            NewTimeSlot {
                date,
                start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                max_bookings,
            },
        )
        .await
        .unwrap()
}

async fn slot_bookings(ctx: &ServiceContext, id: TimeSlotId) -> i32 {
    let conn = ctx.db_pool.get().await.unwrap();
    repos::time_slot::make_repo()
        .select_exactly_one(&*conn, id.into())
        .await
        .unwrap()
        .current_bookings
}

/// Container, waste type and tariffs priced at the depot itself.
struct Catalog {
    service: Service,
    waste_type: WasteType,
    transport: TransportPricing,
}

impl Catalog {
    async fn create(ctx: &ServiceContext) -> Self {
        let conn = ctx.db_pool.get().await.unwrap();
        let service = repos::service::make_repo()
            .insert_exactly_one(
                &*conn,
                NewService {
                    name: format!("Benne 8 m³ {}", rand::random::<u16>()),
                    description: None,
                    volume_m3: 8.0,
                    base_price: 160.0,
                    length_m: None,
                    width_m: None,
                    height_m: None,
                    included_days: 7,
                    image_url: None,
                },
            )
            .await
            .unwrap();
        let waste_type = repos::waste_type::make_repo()
            .insert_exactly_one(
                &*conn,
                NewWasteType {
                    name: format!("Gravats {}", rand::random::<u16>()),
                    description: None,
                    waste_code: None,
                    requires_fid: false,
                },
            )
            .await
            .unwrap();
        repos::pricing::make_treatment_repo()
            .insert_exactly_one(
                &*conn,
                TreatmentPricingPayload {
                    waste_type_id: waste_type.id,
                    price_per_ton: 40.0,
                },
            )
            .await
            .unwrap();
        let transport = repos::pricing::make_transport_repo()
            .insert_exactly_one(
                &*conn,
                TransportPricingPayload {
                    min_km: 0.0,
                    max_km: 5.0,
                    price: 45.0,
                },
            )
            .await
            .unwrap();
        Self {
            service,
            waste_type,
            transport,
        }
    }

    fn configuration(&self, ctx: &ServiceContext, delivery_slot_id: Option<TimeSlotId>) -> BookingConfiguration {
        let depot = Point::new(ctx.config.pricing.depot_longitude, ctx.config.pricing.depot_latitude);
        BookingConfiguration {
            service_id: self.service.id,
            waste_type_id: self.waste_type.id,
            rental_days: 3,
            estimated_tons: 1.0,
            address: AddressFull {
                location: Some(depot),
                address: Some("Rue du Dépôt, Saint-Herblain".to_string()),
                ..Default::default()
            },
            delivery_slot_id,
            pickup_slot_id: None,
            notes: None,
        }
    }

    async fn remove_tariffs(self, ctx: &ServiceContext) {
        let conn = ctx.db_pool.get().await.unwrap();
        repos::pricing::make_transport_repo()
            .delete(&*conn, self.transport.id.into())
            .await
            .unwrap();
    }
}

#[tokio::test]
#[ignore]
async fn locked_account_is_refused_even_with_the_right_password() {
    let ctx = prepare_context().await;
    let (user, _) = create_user(&ctx, UserRole::Customer).await;
    let auth = AuthServiceImpl::new(ctx.clone(), UserLogin::Anonymous { cart_session: None });
    let attempt = |password: &str| LoginPayload {
        email: user.email.clone(),
        password: password.to_string(),
    };

    for _ in 0..ctx.config.auth.max_login_attempts {
        let e = auth.login(attempt("mauvais-mot-de-passe"), None).await.unwrap_err();
        assert_eq!(error_kind(&e), Some(Error::InvalidCredentials));
    }

    match auth.login(attempt(PASSWORD), None).await {
        Err(e) => match error_kind(&e) {
            Some(Error::AccountLocked(until)) => assert!(until > Utc::now()),
            other => panic!("Expected a locked account, got {:?}", other),
        },
        Ok(_) => panic!("Locked account logged in"),
    }

    let conn = ctx.db_pool.get().await.unwrap();
    repos::user::make_repo().delete(&*conn, user.id.into()).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn checkout_rolls_back_when_a_slot_is_full() {
    let ctx = prepare_context().await;
    let (user, login) = create_user(&ctx, UserRole::Customer).await;
    let catalog = Catalog::create(&ctx).await;
    let free = create_slot(&ctx, 2).await;
    let full = create_slot(&ctx, 1).await;
    {
        let conn = ctx.db_pool.get().await.unwrap();
        repos::time_slot::reserve(&*conn, full.id).await.unwrap().unwrap();
        for slot in &[free.id, full.id] {
            repos::cart_item::make_repo()
                .insert_exactly_one(
                    &*conn,
                    NewCartItem {
                        customer: CartCustomer::User(user.id),
                        configuration: catalog.configuration(&ctx, Some(*slot)),
                        price: PriceBreakdown::default(),
                    },
                )
                .await
                .unwrap();
        }
    }

    let e = OrderServiceImpl::new(ctx.clone(), login).checkout().await.unwrap_err();
    assert_eq!(error_kind(&e), Some(Error::SlotFull));

    // Nothing from the failed checkout survives
    assert_eq!(slot_bookings(&ctx, free.id).await, 0);
    assert_eq!(slot_bookings(&ctx, full.id).await, 1);
    let conn = ctx.db_pool.get().await.unwrap();
    let orders = repos::order::make_repo()
        .select(
            &*conn,
            OrderFilter {
                user_id: Some(user.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(orders.is_empty());
    let cart = repos::cart_item::make_repo()
        .select(
            &*conn,
            CartItemFilter {
                id: None,
                customer: Some(CartCustomer::User(user.id)),
            },
        )
        .await
        .unwrap();
    assert_eq!(cart.len(), 2);

    repos::user::make_repo().delete(&*conn, user.id.into()).await.unwrap();
    catalog.remove_tariffs(&ctx).await;
}

#[tokio::test]
#[ignore]
async fn cancelling_an_order_gives_its_slot_back() {
    let ctx = prepare_context().await;
    let (user, login) = create_user(&ctx, UserRole::Customer).await;
    let catalog = Catalog::create(&ctx).await;
    let slot = create_slot(&ctx, 1).await;
    let orders = OrderServiceImpl::new(ctx.clone(), login);

    let order = orders.create_order(catalog.configuration(&ctx, Some(slot.id))).await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.delivery_date, Some(slot.date));
    assert_eq!(slot_bookings(&ctx, slot.id).await, 1);

    let cancelled = orders.cancel(order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(slot_bookings(&ctx, slot.id).await, 0);

    // Cancelled orders stay cancelled
    let e = orders.cancel(order.id).await.unwrap_err();
    assert_eq!(error_kind(&e), Some(Error::InvalidTransition));
    assert_eq!(slot_bookings(&ctx, slot.id).await, 0);

    let conn = ctx.db_pool.get().await.unwrap();
    repos::order::make_repo().delete(&*conn, order.id.into()).await.unwrap();
    repos::user::make_repo().delete(&*conn, user.id.into()).await.unwrap();
    catalog.remove_tariffs(&ctx).await;
}

#[tokio::test]
#[ignore]
async fn declined_payment_marks_the_order_failed() {
    let ctx = prepare_context().await;
    let (user, login) = create_user(&ctx, UserRole::Customer).await;
    let catalog = Catalog::create(&ctx).await;
    let order = OrderServiceImpl::new(ctx.clone(), login)
        .create_order(catalog.configuration(&ctx, None))
        .await
        .unwrap();
    {
        let conn = ctx.db_pool.get().await.unwrap();
        repos::order::make_repo()
            .update_exactly_one(
                &*conn,
                OrderUpdater {
                    filter: order.id.into(),
                    data: OrderUpdateData {
                        payment_intent_id: Some(format!("pi_{}", rand::random::<u32>())),
                        ..Default::default()
                    },
                },
            )
            .await
            .unwrap();
    }

    let e = PaymentServiceImpl::new(ctx.clone(), login).confirm(order.id).await.unwrap_err();
    assert_eq!(error_kind(&e), Some(Error::Payment(DECLINED.to_string())));
    assert_eq!(ControllerError::from(e).code(), StatusCode::PAYMENT_REQUIRED);

    let conn = ctx.db_pool.get().await.unwrap();
    let stored = repos::order::make_repo().select_exactly_one(&*conn, order.id.into()).await.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Failed);
    assert_eq!(stored.status, OrderStatus::Pending);

    repos::order::make_repo().delete(&*conn, order.id.into()).await.unwrap();
    repos::user::make_repo().delete(&*conn, user.id.into()).await.unwrap();
    catalog.remove_tariffs(&ctx).await;
}

fn fid_payload() -> FidPayload {
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

#[tokio::test]
#[ignore]
async fn fid_goes_through_submission_and_review() {
    let ctx = prepare_context().await;
    let (producer, producer_login) = create_user(&ctx, UserRole::Customer).await;
    let (admin, admin_login) = create_user(&ctx, UserRole::Admin).await;
    let producer_fid = FidServiceImpl::new(ctx.clone(), producer_login);
    let admin_fid = FidServiceImpl::new(ctx.clone(), admin_login);

    let draft = producer_fid.create(fid_payload()).await.unwrap();
    assert_eq!(draft.status, FidStatus::Draft);
    assert!(draft.hazardous);

    // Drafts are not reviewed
    let e = admin_fid
        .review(
            draft.id,
            FidReviewPayload {
                status: FidStatus::Validated,
                comment: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(error_kind(&e), Some(Error::InvalidTransition));

    let submitted = producer_fid.submit(draft.id).await.unwrap();
    assert_eq!(submitted.status, FidStatus::Submitted);
    assert!(submitted.submitted_at.is_some());
    let e = producer_fid.submit(draft.id).await.unwrap_err();
    assert_eq!(error_kind(&e), Some(Error::InvalidTransition));
    let e = producer_fid.update(draft.id, fid_payload()).await.unwrap_err();
    assert_eq!(error_kind(&e), Some(Error::InvalidTransition));

    let rejected = admin_fid
        .review(
            draft.id,
            FidReviewPayload {
                status: FidStatus::Rejected,
                comment: Some("Quantité à préciser".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, FidStatus::Rejected);
    assert_eq!(rejected.admin_comment, Some("Quantité à préciser".to_string()));

    // Rejected documents are corrected and sent again
    let mut corrected = fid_payload();
    corrected.estimated_quantity_tons = 3.0;
    producer_fid.update(draft.id, corrected).await.unwrap();
    producer_fid.submit(draft.id).await.unwrap();
    let validated = admin_fid
        .review(
            draft.id,
            FidReviewPayload {
                status: FidStatus::Validated,
                comment: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(validated.status, FidStatus::Validated);
    assert_eq!(validated.data.estimated_quantity_tons, 3.0);

    let e = producer_fid.submit(draft.id).await.unwrap_err();
    assert_eq!(error_kind(&e), Some(Error::InvalidTransition));

    let conn = ctx.db_pool.get().await.unwrap();
    repos::user::make_repo().delete(&*conn, producer.id.into()).await.unwrap();
    repos::user::make_repo().delete(&*conn, admin.id.into()).await.unwrap();
}
