use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::config::HarvestConfig;
use crate::error::AppError;
use crate::models::{HarvestSummary, NearbyQuery, Restaurant};
use crate::persist;
use crate::report;
use crate::source;
use crate::traits::{PhotoSource, PlaceSearch};
use crate::util::{listing_file_name, summary_file_name};

/// Orchestrates the harvest: search → skip known places → scrape photos → save.
///
/// The listing file doubles as the checkpoint: it is rewritten after every
/// restaurant, and restaurants already in it are skipped on the next run.
pub struct HarvestService<S, P>
where
    S: PlaceSearch,
    P: PhotoSource,
{
    search: S,
    photos: P,
    config: HarvestConfig,
}

impl<S, P> HarvestService<S, P>
where
    S: PlaceSearch,
    P: PhotoSource,
{
    pub fn new(search: S, photos: P, config: HarvestConfig) -> Self {
        Self {
            search,
            photos,
            config,
        }
    }

    /// Run one harvest around `query`.
    ///
    /// 1. Search nearby places (nothing is written if there are none)
    /// 2. Derive the listing file name from the coordinates and first place
    /// 3. Load the existing listing, if any
    /// 4. Scrape photos for each new place and save after each one
    /// 5. Write the text summary
    pub async fn run(
        &self,
        query: &NearbyQuery,
        cancel: &CancellationToken,
    ) -> Result<HarvestSummary, AppError> {
        // 1. Search
        tracing::info!(
            lat = query.latitude,
            lng = query.longitude,
            "Searching for restaurants"
        );
        let places = self.search.search_nearby(query).await?;
        if places.is_empty() {
            tracing::warn!("No restaurants found");
            return Ok(HarvestSummary {
                output_file: None,
                summary_file: None,
                newly_processed: 0,
                skipped: 0,
                total_restaurants: 0,
                total_photos: 0,
            });
        }
        tracing::info!("Found {} restaurants", places.len());

        // 2. File names
        let file_name = listing_file_name(query.latitude, query.longitude, &places[0]);
        let output_file = self.config.output_dir.join(&file_name);
        let summary_file: PathBuf = self.config.output_dir.join(summary_file_name(&file_name));
        tracing::info!(path = %output_file.display(), "Output file");

        // 3. Existing data
        let mut listing = source::load_listing(&output_file);
        tracing::info!("Loaded {} existing records", listing.len());

        // 4. Scrape
        let mut newly_processed: usize = 0;
        let mut skipped: usize = 0;
        for (i, place) in places.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!("Cancellation requested, stopping harvest");
                break;
            }

            if listing.iter().any(|r| r.place_id == place.place_id) {
                tracing::info!(place_id = %place.place_id, "{} already processed, skipping", place.name);
                skipped += 1;
                continue;
            }

            tracing::info!(place_id = %place.place_id, "Getting photos for {}", place.name);
            let photo_urls = match self.photos.photo_urls(&place.place_id, &place.name).await {
                Ok(urls) => urls,
                Err(e) => {
                    tracing::warn!(place_id = %place.place_id, error = %e, "Photo lookup failed, saving without photos");
                    Vec::new()
                }
            };
            tracing::info!("Found {} photos", photo_urls.len());

            listing.push(Restaurant::from_place(place, photo_urls));
            persist::write_json_atomic(&output_file, &listing)?;
            newly_processed += 1;

            if i + 1 < places.len() && !self.config.restaurant_delay.is_zero() {
                tokio::select! {
                    () = tokio::time::sleep(self.config.restaurant_delay) => {}
                    () = cancel.cancelled() => {}
                }
            }
        }

        // 5. Summary
        let text = report::render_listing_summary(query.latitude, query.longitude, &listing);
        persist::write_atomic(&summary_file, text.as_bytes())?;

        let total_photos: usize = listing.iter().map(|r| r.photo_count).sum();
        tracing::info!(
            newly_processed,
            skipped,
            total = listing.len(),
            total_photos,
            "Harvest complete"
        );

        Ok(HarvestSummary {
            output_file: Some(output_file),
            summary_file: Some(summary_file),
            newly_processed,
            skipped,
            total_restaurants: listing.len(),
            total_photos,
        })
    }
}
