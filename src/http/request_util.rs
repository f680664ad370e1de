use std::future::Future;
use std::pin::Pin;

use failure::Error as FailureError;
use hyper::header::{HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE};
use hyper::{Body, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::errors::ControllerError;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

#[derive(Clone, Debug, PartialEq)]
pub struct ControllerResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub attachment: Option<String>,
    pub body: Vec<u8>,
}

impl ControllerResponse {
    pub fn json(body: String) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: JSON_CONTENT_TYPE,
            attachment: None,
            body: body.into_bytes(),
        }
    }

    pub fn csv(filename: String, body: Vec<u8>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: CSV_CONTENT_TYPE,
            attachment: Some(filename),
            body,
        }
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or_default()
    }

    pub fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        if let Some(filename) = self.attachment {
            if let Ok(v) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)) {
                response.headers_mut().insert(CONTENT_DISPOSITION, v);
            }
        }
        response
    }
}

pub type ControllerFuture = Pin<Box<dyn Future<Output = Result<ControllerResponse, ControllerError>> + Send>>;

pub fn serialize<T: Serialize>(value: &T) -> Result<ControllerResponse, ControllerError> {
    serde_json::to_string(value)
        .map(ControllerResponse::json)
        .map_err(|e| ControllerError::InternalServerError(e.into()))
}

/// Awaits a service call and turns its output into a JSON response.
pub async fn serialize_future<T, F>(f: F) -> Result<ControllerResponse, ControllerError>
where
    T: Serialize,
    F: Future<Output = Result<T, FailureError>>,
{
    let value = f.await.map_err(ControllerError::from)?;
    serialize(&value)
}

pub async fn read_body(body: Body) -> Result<Vec<u8>, ControllerError> {
    hyper::body::to_bytes(body)
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|e| ControllerError::BadRequest(e.into()))
}

pub async fn parse_body<T: DeserializeOwned>(body: Body) -> Result<T, ControllerError> {
    let bytes = read_body(body).await?;
    serde_json::from_slice(&bytes).map_err(|e| ControllerError::UnprocessableEntity(e.into()))
}

pub fn parse_query<T: DeserializeOwned>(query: Option<&str>) -> Result<T, ControllerError> {
    serde_urlencoded::from_str(query.unwrap_or_default()).map_err(|e| ControllerError::BadRequest(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Paging {
        offset: Option<i64>,
        count: Option<i64>,
        email: Option<String>,
    }

    #[test]
    fn parses_query_strings() {
        let paging: Paging = parse_query(Some("offset=10&count=5&email=jean%40exemple.fr")).unwrap();
        assert_eq!(
            paging,
            Paging {
                offset: Some(10),
                count: Some(5),
                email: Some("jean@exemple.fr".to_string()),
            }
        );

        let empty: Paging = parse_query(None).unwrap();
        assert_eq!(empty.offset, None);
    }

    #[test]
    fn csv_response_sets_attachment() {
        let response = ControllerResponse::csv("users.csv".to_string(), b"a,b\n".to_vec()).into_response();
        assert_eq!(response.headers()[CONTENT_TYPE], CSV_CONTENT_TYPE);
        assert_eq!(response.headers()[CONTENT_DISPOSITION], "attachment; filename=\"users.csv\"");
    }
}
