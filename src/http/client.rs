use std::time::Duration;

use failure::{Error as FailureError, Fail};
use hyper::client::HttpConnector;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use hyper::{Body, Client, Method, Request, StatusCode};
use hyper_tls::HttpsConnector;
use serde::de::DeserializeOwned;

use crate::config;
use crate::errors::Error;

#[derive(Debug, Fail)]
pub enum HttpClientError {
    #[fail(display = "Request timed out after {} ms", _0)]
    Timeout(u64),
    #[fail(display = "Unexpected response status {}: {}", status, body)]
    Status { status: u16, body: String },
}

#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, FailureError> {
        serde_json::from_slice(&self.body).map_err(|e| e.context(Error::HttpClient).into())
    }
}

/// Outbound HTTPS client shared by the provider integrations.
#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    timeout_ms: u64,
}

impl HttpClient {
    pub fn new(config: &config::Client) -> Self {
        Self {
            client: Client::builder().build(HttpsConnector::new()),
            timeout_ms: config.timeout_ms,
        }
    }

    /// Sends the request and collects the body, whatever the status.
    pub async fn send(&self, request: Request<Body>) -> Result<RawResponse, FailureError> {
        debug!("Outbound {} {}", request.method(), request.uri());
        let client = self.client.clone();
        let exchange = async move {
            let response = client.request(request).await?;
            let status = response.status();
            let body = hyper::body::to_bytes(response.into_body()).await?;
            Ok::<_, hyper::Error>(RawResponse {
                status,
                body: body.to_vec(),
            })
        };

        match tokio::time::timeout(Duration::from_millis(self.timeout_ms), exchange).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(e.context(Error::HttpClient).into()),
            Err(_) => Err(HttpClientError::Timeout(self.timeout_ms).context(Error::HttpClient).into()),
        }
    }

    /// JSON request; non-2xx statuses are errors.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        body: Option<String>,
        headers: Option<HeaderMap>,
    ) -> Result<T, FailureError> {
        let mut request = Request::builder().method(method).uri(url.as_str());
        if let Some(map) = request.headers_mut() {
            if body.is_some() {
                map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            if let Some(headers) = headers {
                map.extend(headers);
            }
        }
        let request = request
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .map_err(|e| e.context(Error::HttpClient))?;

        let response = self.send(request).await?;
        if !response.status.is_success() {
            return Err(HttpClientError::Status {
                status: response.status.as_u16(),
                body: String::from_utf8_lossy(&response.body).into_owned(),
            }
            .context(Error::HttpClient)
            .into());
        }
        response.parse()
    }
}
