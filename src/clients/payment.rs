use std::collections::HashMap;

use failure::{Error as FailureError, Fail};
use futures::future::BoxFuture;
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Method, Request};

use crate::config;
use crate::errors::Error;
use crate::http::client::{HttpClient, RawResponse};
use crate::models::PaymentStatus;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentError {
    pub message: Option<String>,
    pub code: Option<String>,
    pub decline_code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct PaymentErrorEnvelope {
    error: PaymentError,
}

/// Payment intent as returned by the provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub last_payment_error: Option<PaymentError>,
}

impl PaymentIntent {
    pub fn payment_status(&self) -> PaymentStatus {
        match self.status.as_str() {
            "succeeded" => PaymentStatus::Paid,
            "canceled" => PaymentStatus::Failed,
            "requires_payment_method" if self.last_payment_error.is_some() => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.last_payment_error.as_ref().and_then(|e| e.message.clone())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreatePaymentIntent {
    pub amount_cents: i64,
    pub currency: String,
    pub order_id: String,
    pub order_number: String,
    pub receipt_email: String,
}

pub trait PaymentClient: Send + Sync {
    fn create_intent(&self, request: CreatePaymentIntent) -> BoxFuture<'static, Result<PaymentIntent, FailureError>>;
    fn retrieve_intent(&self, intent_id: String) -> BoxFuture<'static, Result<PaymentIntent, FailureError>>;
}

/// Provider error bodies are surfaced to the customer as they are.
fn parse_response(response: RawResponse) -> Result<PaymentIntent, FailureError> {
    if response.status.is_success() {
        return response.parse();
    }
    match serde_json::from_slice::<PaymentErrorEnvelope>(&response.body) {
        Ok(envelope) => {
            let message = envelope
                .error
                .message
                .unwrap_or_else(|| format!("Payment provider error {}", response.status));
            Err(Error::Payment(message).into())
        }
        Err(e) => Err(e
            .context(format!("Payment provider answered {}", response.status))
            .context(Error::HttpClient)
            .into()),
    }
}

#[derive(Clone)]
pub struct StripePaymentClient {
    http: HttpClient,
    config: config::Payment,
}

impl StripePaymentClient {
    pub fn new(http: HttpClient, config: config::Payment) -> Self {
        Self { http, config }
    }

    fn request(&self, method: Method, path: &str, form: Option<String>) -> Result<Request<Body>, FailureError> {
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.secret_key)).map_err(|e| e.context(Error::HttpClient))?;
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("{}{}", self.config.api_url.trim_end_matches('/'), path))
            .header(AUTHORIZATION, auth);
        if form.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        }
        builder
            .body(form.map(Body::from).unwrap_or_else(Body::empty))
            .map_err(|e| e.context(Error::HttpClient).into())
    }
}

impl PaymentClient for StripePaymentClient {
    fn create_intent(&self, request: CreatePaymentIntent) -> BoxFuture<'static, Result<PaymentIntent, FailureError>> {
        let client = self.clone();
        Box::pin(async move {
            let form = serde_urlencoded::to_string(&[
                ("amount", request.amount_cents.to_string()),
                ("currency", request.currency.to_lowercase()),
                ("receipt_email", request.receipt_email),
                ("description", format!("Commande {}", request.order_number)),
                ("metadata[order_id]", request.order_id),
                ("metadata[order_number]", request.order_number),
                ("automatic_payment_methods[enabled]", "true".to_string()),
            ])?;
            let http_request = client.request(Method::POST, "/v1/payment_intents", Some(form))?;
            let response = client.http.send(http_request).await?;
            parse_response(response)
        })
    }

    fn retrieve_intent(&self, intent_id: String) -> BoxFuture<'static, Result<PaymentIntent, FailureError>> {
        let client = self.clone();
        Box::pin(async move {
            let http_request = client.request(Method::GET, &format!("/v1/payment_intents/{}", intent_id), None)?;
            let response = client.http.send(http_request).await?;
            parse_response(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::error_kind;
    use hyper::StatusCode;

    fn intent(status: &str, with_error: bool) -> PaymentIntent {
        PaymentIntent {
            id: "pi_123".to_string(),
            client_secret: Some("pi_123_secret_abc".to_string()),
            amount: 50208,
            currency: "eur".to_string(),
            status: status.to_string(),
            metadata: HashMap::new(),
            last_payment_error: if with_error {
                Some(PaymentError {
                    message: Some("Your card was declined.".to_string()),
                    code: Some("card_declined".to_string()),
                    decline_code: None,
                })
            } else {
                None
            },
        }
    }

    #[test]
    fn maps_provider_statuses() {
        assert_eq!(intent("succeeded", false).payment_status(), PaymentStatus::Paid);
        assert_eq!(intent("processing", false).payment_status(), PaymentStatus::Pending);
        assert_eq!(intent("requires_payment_method", false).payment_status(), PaymentStatus::Pending);
        assert_eq!(intent("requires_payment_method", true).payment_status(), PaymentStatus::Failed);
        assert_eq!(intent("canceled", false).payment_status(), PaymentStatus::Failed);
    }

    #[test]
    fn provider_error_message_is_kept_verbatim() {
        let response = RawResponse {
            status: StatusCode::PAYMENT_REQUIRED,
            body: br#"{"error":{"message":"Your card has insufficient funds.","code":"card_declined"}}"#.to_vec(),
        };
        let e = parse_response(response).unwrap_err();
        assert_eq!(
            error_kind(&e),
            Some(Error::Payment("Your card has insufficient funds.".to_string()))
        );
    }

    #[test]
    fn parses_intent() {
        let response = RawResponse {
            status: StatusCode::OK,
            body: br#"{"id":"pi_1","client_secret":"pi_1_secret","amount":1000,"currency":"eur","status":"requires_payment_method","metadata":{"order_id":"x"},"last_payment_error":null}"#.to_vec(),
        };
        let intent = parse_response(response).unwrap();
        assert_eq!(intent.id, "pi_1");
        assert_eq!(intent.metadata["order_id"], "x");
    }

    #[test]
    fn garbage_error_body_is_gateway_error() {
        let response = RawResponse {
            status: StatusCode::BAD_GATEWAY,
            body: b"<html>".to_vec(),
        };
        let e = parse_response(response).unwrap_err();
        assert_eq!(error_kind(&e), Some(Error::HttpClient));
    }
}
