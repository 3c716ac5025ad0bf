use std::future::Future;

use crate::error::AppError;
use crate::models::{NearbyQuery, Place, Restaurant, Verdict};

/// Sends one child reference (a photo URL) to an external analyzer.
///
/// Returns the analyzer's raw output object. Interpreting it is the
/// [`Classifier`]'s job, so the pipeline stays agnostic to any one schema.
pub trait Analyzer: Send + Sync + Clone {
    fn analyze(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;
}

/// Pure decision over an analyzer response.
pub trait Classifier: Send + Sync {
    fn classify(&self, response: &serde_json::Value) -> Verdict;
}

impl<F> Classifier for F
where
    F: Fn(&serde_json::Value) -> Verdict + Send + Sync,
{
    fn classify(&self, response: &serde_json::Value) -> Verdict {
        self(response)
    }
}

/// Finds places around a point.
pub trait PlaceSearch: Send + Sync + Clone {
    fn search_nearby(
        &self,
        query: &NearbyQuery,
    ) -> impl Future<Output = Result<Vec<Place>, AppError>> + Send;
}

/// Looks up photo URLs for a single place.
pub trait PhotoSource: Send + Sync + Clone {
    fn photo_urls(
        &self,
        place_id: &str,
        place_name: &str,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;
}

/// A parent unit of work: a stable key plus the children to analyze.
pub trait WorkItem {
    fn key(&self) -> &str;

    /// Human-readable name for logs and reports.
    fn label(&self) -> &str;

    fn children(&self) -> &[String];
}

impl WorkItem for Restaurant {
    fn key(&self) -> &str {
        &self.place_id
    }

    fn label(&self) -> &str {
        &self.restaurant_name
    }

    fn children(&self) -> &[String] {
        &self.photo_urls
    }
}
