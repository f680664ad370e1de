use std::time::Instant;

use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};

use super::errors::ControllerError;
use super::request_util::{ControllerFuture, JSON_CONTENT_TYPE};
use crate::sentry_integration::log_and_capture_error;

pub trait Controller: Send + Sync {
    fn call(&self, request: Request<Body>) -> ControllerFuture;
}

/// Wraps a controller into hyper responses: error bodies, CORS and access log.
pub struct Application<C> {
    pub controller: C,
}

impl<C: Controller> Application<C> {
    pub fn new(controller: C) -> Self {
        Self { controller }
    }

    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let started = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let mut response = if method == Method::OPTIONS {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::NO_CONTENT;
            response
        } else {
            match self.controller.call(request).await {
                Ok(response) => response.into_response(),
                Err(e) => error_response(e),
            }
        };

        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Authorization, Content-Type, Cart-Session"),
        );

        info!(
            "{} {} -> {} in {} ms",
            method,
            path,
            response.status().as_u16(),
            started.elapsed().as_millis()
        );
        response
    }
}

pub fn error_response(e: ControllerError) -> Response<Body> {
    if e.code().is_server_error() {
        log_and_capture_error(&e);
    } else {
        debug!("Request failed: {}", e);
    }

    let message = e.to_message();
    let body = serde_json::to_string(&message).unwrap_or_default();
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = e.code();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}
