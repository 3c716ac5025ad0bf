use std::time::Duration;

use dishmark_core::error::AppError;
use dishmark_core::models::{NearbyQuery, Place};
use dishmark_core::traits::PlaceSearch;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://places.googleapis.com/v1";
const FIELD_MASK: &str =
    "places.id,places.displayName,places.rating,places.formattedAddress,places.types";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PlacesConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl PlacesConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Google Places (New) nearby search, restricted to restaurants.
#[derive(Clone)]
pub struct GooglePlacesClient {
    client: Client,
    url: Url,
    api_key: String,
    timeout_secs: u64,
}

impl GooglePlacesClient {
    pub fn new(config: PlacesConfig) -> Result<Self, AppError> {
        if config.api_key.trim().is_empty() {
            return Err(AppError::ConfigError("Google Maps API key is empty".into()));
        }
        Ok(Self {
            client: http::build_client(config.timeout)?,
            url: http::endpoint(&config.base_url, "places:searchNearby")?,
            api_key: config.api_key,
            timeout_secs: config.timeout.as_secs(),
        })
    }
}

// ---- Places API types ----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchNearbyRequest {
    included_types: [&'static str; 1],
    max_result_count: u32,
    location_restriction: LocationRestriction,
}

#[derive(Serialize)]
struct LocationRestriction {
    circle: Circle,
}

#[derive(Serialize)]
struct Circle {
    center: LatLng,
    radius: f64,
}

#[derive(Serialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

impl From<&NearbyQuery> for SearchNearbyRequest {
    fn from(query: &NearbyQuery) -> Self {
        Self {
            included_types: ["restaurant"],
            max_result_count: query.max_results,
            location_restriction: LocationRestriction {
                circle: Circle {
                    center: LatLng {
                        latitude: query.latitude,
                        longitude: query.longitude,
                    },
                    radius: query.radius,
                },
            },
        }
    }
}

#[derive(Deserialize)]
struct SearchNearbyResponse {
    #[serde(default)]
    places: Vec<ApiPlace>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPlace {
    #[serde(default)]
    id: String,
    #[serde(default)]
    display_name: Option<LocalizedText>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    formatted_address: String,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Deserialize)]
struct LocalizedText {
    #[serde(default)]
    text: String,
}

impl From<ApiPlace> for Place {
    fn from(p: ApiPlace) -> Self {
        Place {
            name: p.display_name.map(|d| d.text).unwrap_or_default(),
            place_id: p.id,
            rating: p.rating,
            vicinity: p.formatted_address,
            types: p.types,
        }
    }
}

impl PlaceSearch for GooglePlacesClient {
    async fn search_nearby(&self, query: &NearbyQuery) -> Result<Vec<Place>, AppError> {
        let response = self
            .client
            .post(self.url.clone())
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&SearchNearbyRequest::from(query))
            .send()
            .await
            .map_err(|e| http::transport_error(e, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(http::status_error(response, "Google Places").await);
        }

        let body: SearchNearbyResponse = response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse Places response: {e}")))?;

        // An empty response body (`{}`) means no results.
        Ok(body
            .places
            .into_iter()
            .filter(|p| !p.id.is_empty())
            .map(Place::from)
            .collect())
    }
}
