//! Address lookup proxied to the places provider, so the API key never
//! reaches the browser.

use super::types::{ServiceContext, ServiceFuture};
use crate::clients::PlacePrediction;
use crate::errors::Error;
use crate::models::*;

/// Shortest input worth sending to the provider.
const MIN_INPUT_LENGTH: usize = 3;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AutocompleteQuery {
    pub input: String,
    pub session_token: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PlaceDetailsQuery {
    pub place_id: String,
    pub session_token: Option<String>,
}

pub trait PlacesService: Send + Sync {
    fn autocomplete(&self, query: AutocompleteQuery) -> ServiceFuture<Vec<PlacePrediction>>;
    /// Structured address with coordinates
    fn details(&self, query: PlaceDetailsQuery) -> ServiceFuture<AddressFull>;
}

pub struct PlacesServiceImpl {
    pub ctx: ServiceContext,
}

impl PlacesServiceImpl {
    pub fn new(ctx: ServiceContext, _login: UserLogin) -> Self {
        Self { ctx }
    }
}

impl PlacesService for PlacesServiceImpl {
    fn autocomplete(&self, query: AutocompleteQuery) -> ServiceFuture<Vec<PlacePrediction>> {
        let places = self.ctx.places.clone();

        Box::pin(async move {
            let input = query.input.trim().to_string();
            if input.chars().count() < MIN_INPUT_LENGTH {
                return Ok(vec![]);
            }
            places.autocomplete(input, query.session_token).await
        })
    }

    fn details(&self, query: PlaceDetailsQuery) -> ServiceFuture<AddressFull> {
        let places = self.ctx.places.clone();

        Box::pin(async move {
            if query.place_id.trim().is_empty() {
                return Err(format_err!("Empty place id").context(Error::NotFound).into());
            }
            places.details(query.place_id, query.session_token).await
        })
    }
}
