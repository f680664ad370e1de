use failure::Error as FailureError;
use futures::future::BoxFuture;
use geo::Point as GeoPoint;
use hyper::Method;

use crate::config;
use crate::errors::Error;
use crate::http::client::HttpClient;
use crate::models::AddressFull;

/// Suggestion shown while the customer types an address.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacePrediction {
    pub description: String,
    pub place_id: String,
    pub main_text: Option<String>,
    pub secondary_text: Option<String>,
}

pub trait PlacesClient: Send + Sync {
    fn autocomplete(&self, input: String, session_token: Option<String>) -> BoxFuture<'static, Result<Vec<PlacePrediction>, FailureError>>;
    fn details(&self, place_id: String, session_token: Option<String>) -> BoxFuture<'static, Result<AddressFull, FailureError>>;
}

#[derive(Debug, Deserialize)]
struct StructuredFormatting {
    main_text: Option<String>,
    secondary_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPrediction {
    description: String,
    place_id: String,
    structured_formatting: Option<StructuredFormatting>,
}

#[derive(Debug, Deserialize)]
struct AutocompleteResponse {
    status: String,
    #[serde(default)]
    predictions: Vec<RawPrediction>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    #[serde(default)]
    address_components: Vec<AddressComponent>,
    formatted_address: Option<String>,
    geometry: Option<Geometry>,
    place_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    result: Option<PlaceResult>,
    error_message: Option<String>,
}

fn check_status(status: &str, error_message: Option<String>) -> Result<(), FailureError> {
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "NOT_FOUND" | "INVALID_REQUEST" => Err(format_err!("Places lookup failed: {}", status).context(Error::NotFound).into()),
        other => Err(format_err!("Places provider answered {}: {}", other, error_message.unwrap_or_default())
            .context(Error::HttpClient)
            .into()),
    }
}

fn into_predictions(response: AutocompleteResponse) -> Result<Vec<PlacePrediction>, FailureError> {
    check_status(&response.status, response.error_message)?;
    Ok(response
        .predictions
        .into_iter()
        .map(|p| {
            let (main_text, secondary_text) = p
                .structured_formatting
                .map(|f| (f.main_text, f.secondary_text))
                .unwrap_or((None, None));
            PlacePrediction {
                description: p.description,
                place_id: p.place_id,
                main_text,
                secondary_text,
            }
        })
        .collect())
}

fn into_address(response: DetailsResponse) -> Result<AddressFull, FailureError> {
    check_status(&response.status, response.error_message)?;
    let result = response
        .result
        .ok_or_else(|| format_err!("Place details without result").context(Error::NotFound))?;

    let component = |kind: &str| {
        result
            .address_components
            .iter()
            .find(|c| c.types.iter().any(|t| t == kind))
            .map(|c| c.long_name.clone())
    };

    Ok(AddressFull {
        location: result.geometry.as_ref().map(|g| GeoPoint::new(g.location.lng, g.location.lat)),
        administrative_area_level_1: component("administrative_area_level_1"),
        administrative_area_level_2: component("administrative_area_level_2"),
        country: component("country"),
        locality: component("locality"),
        postal_code: component("postal_code"),
        route: component("route"),
        street_number: component("street_number"),
        address: result.formatted_address.clone(),
        place_id: result.place_id.clone(),
    })
}

#[derive(Clone)]
pub struct GooglePlacesClient {
    http: HttpClient,
    config: config::Places,
}

impl GooglePlacesClient {
    pub fn new(http: HttpClient, config: config::Places) -> Self {
        Self { http, config }
    }

    fn url(&self, path: &str, mut params: Vec<(&'static str, String)>) -> Result<String, FailureError> {
        params.push(("language", self.config.language.clone()));
        params.push(("key", self.config.api_key.clone()));
        Ok(format!(
            "{}{}?{}",
            self.config.api_url.trim_end_matches('/'),
            path,
            serde_urlencoded::to_string(&params)?
        ))
    }
}

impl PlacesClient for GooglePlacesClient {
    fn autocomplete(&self, input: String, session_token: Option<String>) -> BoxFuture<'static, Result<Vec<PlacePrediction>, FailureError>> {
        let client = self.clone();
        Box::pin(async move {
            let mut params = vec![
                ("input", input),
                ("types", "address".to_string()),
                ("components", format!("country:{}", client.config.country)),
            ];
            if let Some(token) = session_token {
                params.push(("sessiontoken", token));
            }
            let url = client.url("/place/autocomplete/json", params)?;
            let response: AutocompleteResponse = client.http.request(Method::GET, url, None, None).await?;
            into_predictions(response)
        })
    }

    fn details(&self, place_id: String, session_token: Option<String>) -> BoxFuture<'static, Result<AddressFull, FailureError>> {
        let client = self.clone();
        Box::pin(async move {
            let mut params = vec![
                ("place_id", place_id),
                ("fields", "address_component,formatted_address,geometry,place_id".to_string()),
            ];
            if let Some(token) = session_token {
                params.push(("sessiontoken", token));
            }
            let url = client.url("/place/details/json", params)?;
            let response: DetailsResponse = client.http.request(Method::GET, url, None, None).await?;
            into_address(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::error_kind;

    #[test]
    fn parses_predictions() {
        let response: AutocompleteResponse = serde_json::from_str(
            r#"{
                "status": "OK",
                "predictions": [{
                    "description": "12 Rue de la Paix, Paris, France",
                    "place_id": "ChIJ123",
                    "structured_formatting": {"main_text": "12 Rue de la Paix", "secondary_text": "Paris, France"}
                }]
            }"#,
        )
        .unwrap();
        let predictions = into_predictions(response).unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].place_id, "ChIJ123");
        assert_eq!(predictions[0].main_text.as_deref(), Some("12 Rue de la Paix"));
    }

    #[test]
    fn parses_place_details_into_address() {
        let response: DetailsResponse = serde_json::from_str(
            r#"{
                "status": "OK",
                "result": {
                    "address_components": [
                        {"long_name": "12", "short_name": "12", "types": ["street_number"]},
                        {"long_name": "Rue de la Paix", "short_name": "Rue de la Paix", "types": ["route"]},
                        {"long_name": "Paris", "short_name": "Paris", "types": ["locality", "political"]},
                        {"long_name": "75002", "short_name": "75002", "types": ["postal_code"]},
                        {"long_name": "France", "short_name": "FR", "types": ["country", "political"]}
                    ],
                    "formatted_address": "12 Rue de la Paix, 75002 Paris, France",
                    "geometry": {"location": {"lat": 48.8691, "lng": 2.3316}},
                    "place_id": "ChIJ123"
                }
            }"#,
        )
        .unwrap();
        let address = into_address(response).unwrap();
        assert_eq!(address.street_number.as_deref(), Some("12"));
        assert_eq!(address.postal_code.as_deref(), Some("75002"));
        assert_eq!(address.country.as_deref(), Some("France"));
        let location = address.location.unwrap();
        assert_eq!(location.y(), 48.8691);
        assert_eq!(location.x(), 2.3316);
    }

    #[test]
    fn denied_requests_are_gateway_errors() {
        let response: AutocompleteResponse =
            serde_json::from_str(r#"{"status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."}"#).unwrap();
        let e = into_predictions(response).unwrap_err();
        assert_eq!(error_kind(&e), Some(Error::HttpClient));
    }
}
