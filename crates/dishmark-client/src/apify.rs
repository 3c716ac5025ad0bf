use std::time::Duration;

use dishmark_core::error::AppError;
use dishmark_core::traits::PhotoSource;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://api.apify.com/v2";
/// Google Maps photo scraper actor.
pub const DEFAULT_ACTOR_ID: &str = "nwua9Gu5YrADL7ZDj";
pub const DEFAULT_MAX_IMAGES: u32 = 50;
// Actor runs are synchronous and routinely take minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct ApifyConfig {
    pub base_url: String,
    pub token: String,
    pub actor_id: String,
    pub max_images: u32,
    pub language: String,
    pub timeout: Duration,
}

impl ApifyConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            actor_id: DEFAULT_ACTOR_ID.to_string(),
            max_images: DEFAULT_MAX_IMAGES,
            language: "en".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_images(mut self, max_images: u32) -> Self {
        self.max_images = max_images;
        self
    }
}

/// Fetches photo URLs for a place by running an Apify actor and reading
/// its dataset in the same request.
#[derive(Clone)]
pub struct ApifyPhotoSource {
    client: Client,
    url: Url,
    token: String,
    max_images: u32,
    language: String,
    timeout_secs: u64,
}

impl ApifyPhotoSource {
    pub fn new(config: ApifyConfig) -> Result<Self, AppError> {
        if config.token.trim().is_empty() {
            return Err(AppError::ConfigError("Apify token is empty".into()));
        }
        let url = http::endpoint(
            &config.base_url,
            &format!("acts/{}/run-sync-get-dataset-items", config.actor_id),
        )?;

        Ok(Self {
            client: http::build_client(config.timeout)?,
            url,
            token: config.token,
            max_images: config.max_images,
            language: config.language,
            timeout_secs: config.timeout.as_secs(),
        })
    }
}

// ---- Actor input/output ----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActorInput<'a> {
    place_ids: [&'a str; 1],
    max_images: u32,
    language: &'a str,
    max_crawled_places_per_search: u32,
    maximum_leads_enrichment_records: u32,
    include_web_results: bool,
    scrape_contacts: bool,
    scrape_directories: bool,
    scrape_image_authors: bool,
    scrape_place_detail_page: bool,
    scrape_reviews_personal_data: bool,
    scrape_table_reservation_provider: bool,
    skip_closed_places: bool,
}

impl<'a> ActorInput<'a> {
    fn for_place(place_id: &'a str, max_images: u32, language: &'a str) -> Self {
        Self {
            place_ids: [place_id],
            max_images,
            language,
            max_crawled_places_per_search: 1,
            maximum_leads_enrichment_records: 0,
            include_web_results: false,
            scrape_contacts: false,
            scrape_directories: false,
            scrape_image_authors: false,
            scrape_place_detail_page: false,
            scrape_reviews_personal_data: false,
            scrape_table_reservation_provider: false,
            skip_closed_places: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetItem {
    #[serde(default)]
    image_urls: Vec<String>,
}

/// First dataset item that carries any image URLs.
fn first_image_urls(items: Vec<DatasetItem>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.image_urls)
        .find(|urls| !urls.is_empty())
        .unwrap_or_default()
}

impl PhotoSource for ApifyPhotoSource {
    async fn photo_urls(&self, place_id: &str, place_name: &str) -> Result<Vec<String>, AppError> {
        tracing::debug!(%place_id, "Running photo actor for {place_name}");

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .json(&ActorInput::for_place(place_id, self.max_images, &self.language))
            .send()
            .await
            .map_err(|e| http::transport_error(e, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(http::status_error(response, "Apify").await);
        }

        let items: Vec<DatasetItem> = response
            .json()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to parse Apify dataset: {e}")))?;

        Ok(first_image_urls(items))
    }
}
