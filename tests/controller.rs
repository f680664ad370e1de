use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bb8_postgres::PostgresConnectionManager;
use failure::Error as FailureError;
use futures::future::{self, BoxFuture};
use hyper::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use hyper::{Body, Method, Request, StatusCode};
use tokio_postgres::NoTls;

use bennes_lib::clients::*;
use bennes_lib::config::Config;
use bennes_lib::controller::*;
use bennes_lib::errors::Error;
use bennes_lib::http::controller::{Application, Controller};
use bennes_lib::http::errors::ControllerError;
use bennes_lib::http::request_util::ControllerResponse;
use bennes_lib::models::*;
use bennes_lib::services::*;
use bennes_lib::types::*;

const ADMIN_TOKEN: &str = "admin-token";
const CUSTOMER_TOKEN: &str = "customer-token";

fn unsupported<T: Send + 'static>() -> ServiceFuture<T> {
    Box::pin(future::err(failure::err_msg("not supported in memory")))
}

fn provider_unavailable<T: Send + 'static>() -> BoxFuture<'static, Result<T, FailureError>> {
    Box::pin(future::err(failure::err_msg("provider unavailable in tests")))
}

struct OfflineProviders;

impl PaymentClient for OfflineProviders {
    fn create_intent(&self, _request: CreatePaymentIntent) -> BoxFuture<'static, Result<PaymentIntent, FailureError>> {
        provider_unavailable()
    }

    fn retrieve_intent(&self, _intent_id: String) -> BoxFuture<'static, Result<PaymentIntent, FailureError>> {
        provider_unavailable()
    }
}

impl EmailClient for OfflineProviders {
    fn send(&self, _message: EmailMessage) -> BoxFuture<'static, Result<EmailDelivery, FailureError>> {
        provider_unavailable()
    }
}

impl PlacesClient for OfflineProviders {
    fn autocomplete(&self, _input: String, _session_token: Option<String>) -> BoxFuture<'static, Result<Vec<PlacePrediction>, FailureError>> {
        provider_unavailable()
    }

    fn details(&self, _place_id: String, _session_token: Option<String>) -> BoxFuture<'static, Result<AddressFull, FailureError>> {
        provider_unavailable()
    }
}

/// Resolves two fixed bearer tokens.
struct AuthServiceMemory {
    admin_id: UserId,
    customer_id: UserId,
}

impl AuthService for AuthServiceMemory {
    fn register(&self, _payload: RegisterPayload) -> ServiceFuture<User> {
        unsupported()
    }

    fn login(&self, _payload: LoginPayload, _user_agent: Option<String>) -> ServiceFuture<LoginResponse> {
        Box::pin(future::err(Error::InvalidCredentials.into()))
    }

    fn logout(&self) -> ServiceFuture<()> {
        Box::pin(future::ok(()))
    }

    fn me(&self) -> ServiceFuture<User> {
        unsupported()
    }

    fn sessions(&self) -> ServiceFuture<Vec<Session>> {
        Box::pin(future::ok(vec![]))
    }

    fn revoke_session(&self, _id: SessionId) -> ServiceFuture<()> {
        Box::pin(future::ok(()))
    }

    fn verify_email(&self, _payload: VerifyEmailPayload) -> ServiceFuture<User> {
        unsupported()
    }

    fn authenticate(&self, token: String) -> ServiceFuture<UserLogin> {
        let login = match token.as_str() {
            ADMIN_TOKEN => Some((self.admin_id, UserRole::Admin)),
            CUSTOMER_TOKEN => Some((self.customer_id, UserRole::Customer)),
            _ => None,
        };
        Box::pin(match login {
            Some((user_id, role)) => future::ok(UserLogin::User {
                user_id,
                role,
                session_id: SessionId::new(),
            }),
            None => future::err(Error::Unauthorized.into()),
        })
    }
}

pub type CartServiceMemoryStorage = Arc<Mutex<HashMap<CartCustomer, Cart>>>;

/// Keeps carts per owner and remembers who asked.
pub struct CartServiceMemory {
    pub login: UserLogin,
    pub inner: CartServiceMemoryStorage,
}

impl CartServiceMemory {
    fn with_cart<F: FnOnce(&mut Cart)>(&self, f: F) -> ServiceFuture<Cart> {
        let customer = match self.login.cart_customer() {
            Some(customer) => customer,
            None => return Box::pin(future::err(Error::Unauthorized.into())),
        };
        let mut inner = self.inner.lock().unwrap();
        let cart = inner.entry(customer).or_insert_with(Cart::default);
        f(cart);
        Box::pin(future::ok(cart.clone()))
    }
}

impl CartService for CartServiceMemory {
    fn get_cart(&self) -> ServiceFuture<Cart> {
        self.with_cart(|_| ())
    }

    fn add_item(&self, _configuration: BookingConfiguration) -> ServiceFuture<Cart> {
        unsupported()
    }

    fn update_item(&self, _id: CartItemId, _configuration: BookingConfiguration) -> ServiceFuture<Cart> {
        unsupported()
    }

    fn delete_item(&self, id: CartItemId) -> ServiceFuture<Cart> {
        self.with_cart(|cart| cart.items.retain(|item| item.id != id))
    }

    fn clear_cart(&self) -> ServiceFuture<Cart> {
        self.with_cart(|cart| *cart = Cart::default())
    }

    fn merge(&self, _payload: MergeCartPayload) -> ServiceFuture<Cart> {
        self.with_cart(|_| ())
    }
}

struct UserExportMemory;

impl UserService for UserExportMemory {
    fn list(&self, _terms: UserSearchTerms) -> ServiceFuture<Vec<User>> {
        Box::pin(future::ok(vec![]))
    }

    fn set_role(&self, _id: UserId, _payload: SetRolePayload) -> ServiceFuture<User> {
        unsupported()
    }

    fn unlock(&self, _id: UserId) -> ServiceFuture<User> {
        unsupported()
    }

    fn export_csv(&self, terms: UserSearchTerms) -> ServiceFuture<Vec<u8>> {
        let role = terms.role.map(|r| r.to_string()).unwrap_or_default();
        Box::pin(future::ok(format!("email,role\njean@exemple.fr,{}\n", role).into_bytes()))
    }
}

/// A context whose pool never connects; only routes rejected before any
/// query are exercised against the real services.
fn offline_context() -> ServiceContext {
    let config = Config::new().unwrap();
    let manager = PostgresConnectionManager::new_from_stringlike(config.db.dsn.as_str(), NoTls).unwrap();
    let providers = Arc::new(OfflineProviders);
    ServiceContext {
        db_pool: bb8::Pool::builder().build_unchecked(manager),
        config: Arc::new(config),
        payment: providers.clone(),
        email: providers.clone(),
        places: providers,
    }
}

struct TestSetup {
    controller: ControllerImpl,
    carts: CartServiceMemoryStorage,
}

fn make_test_controller(customize: impl FnOnce(&mut ServiceFactory)) -> TestSetup {
    let carts = CartServiceMemoryStorage::default();
    let mut factory = ServiceFactory::new(offline_context());

    let (admin_id, customer_id) = (UserId::new(), UserId::new());
    factory.auth = Arc::new(move |_: UserLogin| Box::new(AuthServiceMemory { admin_id, customer_id }) as Box<dyn AuthService>);
    factory.cart = Arc::new({
        let carts = carts.clone();
        move |login: UserLogin| {
            Box::new(CartServiceMemory {
                login,
                inner: carts.clone(),
            }) as Box<dyn CartService>
        }
    });
    customize(&mut factory);

    TestSetup {
        controller: ControllerImpl::with_factory(factory),
        carts,
    }
}

fn request(method: Method, uri: &str, headers: &[(&str, &str)], body: &str) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn call(setup: &TestSetup, request: Request<Body>) -> Result<ControllerResponse, ControllerError> {
    setup.controller.call(request).await
}

#[tokio::test]
async fn healthcheck_returns_ok() {
    let setup = make_test_controller(|_| ());
    let response = call(&setup, request(Method::GET, "/healthcheck", &[], "")).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body_str(), "\"Ok\"");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let setup = make_test_controller(|_| ());

    for (method, uri) in vec![(Method::GET, "/api/nothing-here"), (Method::PATCH, "/api/cart")] {
        match call(&setup, request(method, uri, &[], "")).await {
            Err(ControllerError::NotFound) => (),
            other => panic!("Expected not found for {}, got {:?}", uri, other),
        }
    }
}

#[tokio::test]
async fn malformed_cart_session_is_rejected() {
    let setup = make_test_controller(|_| ());
    let result = call(&setup, request(Method::GET, "/api/cart", &[(CART_SESSION_HEADER, "12345abc")], "")).await;

    match result {
        Err(e @ ControllerError::BadRequest(_)) => assert_eq!(e.code(), StatusCode::BAD_REQUEST),
        other => panic!("Expected bad request, got {:?}", other),
    }
}

#[tokio::test]
async fn unknown_bearer_token_is_unauthorized() {
    let setup = make_test_controller(|_| ());

    for value in &["Bearer expired-token", "Basic dXNlcjpwYXNz"] {
        let result = call(&setup, request(Method::GET, "/api/auth/me", &[(AUTHORIZATION.as_str(), value)], "")).await;
        match result {
            Err(ControllerError::Unauthorized(_)) => (),
            other => panic!("Expected unauthorized for {}, got {:?}", value, other),
        }
    }
}

#[tokio::test]
async fn anonymous_cart_follows_the_session_header() {
    let setup = make_test_controller(|_| ());
    let session = CartSessionId::new();
    let session_header = session.to_string();

    let response = call(
        &setup,
        request(Method::GET, "/api/cart", &[(CART_SESSION_HEADER, session_header.as_str())], ""),
    )
    .await
    .unwrap();
    let cart: Cart = serde_json::from_str(response.body_str()).unwrap();
    assert!(cart.items.is_empty());
    assert!(setup.carts.lock().unwrap().contains_key(&CartCustomer::Anonymous(session)));

    // No header and no token: nobody owns a cart
    match call(&setup, request(Method::GET, "/api/cart", &[], "")).await {
        Err(ControllerError::Unauthorized(_)) => (),
        other => panic!("Expected unauthorized, got {:?}", other),
    }
}

#[tokio::test]
async fn back_office_rejects_customers_and_visitors() {
    let setup = make_test_controller(|_| ());
    let bearer = format!("Bearer {}", CUSTOMER_TOKEN);

    let as_customer = call(
        &setup,
        request(Method::GET, "/api/admin/users", &[(AUTHORIZATION.as_str(), bearer.as_str())], ""),
    )
    .await;
    match as_customer {
        Err(e @ ControllerError::Forbidden(_)) => assert_eq!(e.code(), StatusCode::FORBIDDEN),
        other => panic!("Expected forbidden, got {:?}", other),
    }

    let as_visitor = call(&setup, request(Method::GET, "/api/admin/audit-logs", &[], "")).await;
    match as_visitor {
        Err(ControllerError::Unauthorized(_)) => (),
        other => panic!("Expected unauthorized, got {:?}", other),
    }

    let order_id = OrderId::new();
    let as_customer = call(
        &setup,
        request(
            Method::GET,
            &format!("/api/admin/orders/{}", order_id),
            &[(AUTHORIZATION.as_str(), bearer.as_str())],
            "",
        ),
    )
    .await;
    match as_customer {
        Err(ControllerError::Forbidden(_)) => (),
        other => panic!("Expected forbidden, got {:?}", other),
    }
}

#[tokio::test]
async fn invalid_json_body_is_unprocessable() {
    let setup = make_test_controller(|_| ());
    let bearer = format!("Bearer {}", ADMIN_TOKEN);

    let result = call(
        &setup,
        request(Method::POST, "/api/services", &[(AUTHORIZATION.as_str(), bearer.as_str())], "{\"name\": "),
    )
    .await;
    match result {
        Err(e @ ControllerError::UnprocessableEntity(_)) => assert_eq!(e.to_message().code, 422),
        other => panic!("Expected unprocessable entity, got {:?}", other),
    }
}

#[tokio::test]
async fn users_export_is_a_csv_attachment() {
    let setup = make_test_controller(|factory| {
        factory.user = Arc::new(|_: UserLogin| Box::new(UserExportMemory) as Box<dyn UserService>);
    });
    let bearer = format!("Bearer {}", ADMIN_TOKEN);

    let response = call(
        &setup,
        request(
            Method::GET,
            "/api/admin/users/export?role=admin",
            &[(AUTHORIZATION.as_str(), bearer.as_str())],
            "",
        ),
    )
    .await
    .unwrap();

    assert_eq!(response.body_str(), "email,role\njean@exemple.fr,admin\n");
    let response = response.into_response();
    assert!(response.headers()[CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    let disposition = response.headers()[CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=\"users-"));
}

#[tokio::test]
async fn application_renders_errors_with_cors() {
    let setup = make_test_controller(|_| ());
    let app = Application::new(setup.controller);

    let response = app.handle(request(Method::GET, "/api/admin/email-logs", &[], "")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let message: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(message["code"], 401);

    let preflight = app.handle(request(Method::OPTIONS, "/api/cart", &[], "")).await;
    assert_eq!(preflight.status(), StatusCode::NO_CONTENT);
}
