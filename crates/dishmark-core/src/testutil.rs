//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::models::{NearbyQuery, Place, Restaurant};
use crate::pipeline::{PipelineEvent, PipelineReporter};
use crate::traits::{Analyzer, PhotoSource, PlaceSearch};

// ---------------------------------------------------------------------------
// MockAnalyzer
// ---------------------------------------------------------------------------

/// Workflow output for a photo showing a dish.
pub fn dish_response(name: &str) -> serde_json::Value {
    serde_json::json!({"is_a_dish": 1, "name": name, "desc": format!("{name} description")})
}

/// Workflow output for a photo that is not a dish.
pub fn not_dish_response() -> serde_json::Value {
    serde_json::json!({"is_a_dish": 0, "name": "", "desc": ""})
}

/// Mock analyzer with a response queue, a fallback response, and a set of
/// references that always fail.
#[derive(Clone)]
pub struct MockAnalyzer {
    /// Each call pops the first element; when empty, `fallback` is returned.
    responses: Arc<Mutex<Vec<Result<serde_json::Value, AppError>>>>,
    fallback: serde_json::Value,
    failing: Arc<Mutex<HashSet<String>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockAnalyzer {
    pub fn new(fallback: serde_json::Value) -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            fallback,
            failing: Arc::new(Mutex::new(HashSet::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every photo is a dish called `name`.
    pub fn dish(name: &str) -> Self {
        Self::new(dish_response(name))
    }

    /// No photo is a dish.
    pub fn not_dish() -> Self {
        Self::new(not_dish_response())
    }

    pub fn with_responses(responses: Vec<Result<serde_json::Value, AppError>>) -> Self {
        let mock = Self::not_dish();
        *mock.responses.lock().unwrap() = responses;
        mock
    }

    /// Make calls for `reference` fail with a network error.
    pub fn failing_on(self, reference: &str) -> Self {
        self.failing.lock().unwrap().insert(reference.to_string());
        self
    }

    /// References analyzed so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Analyzer for MockAnalyzer {
    async fn analyze(&self, reference: &str) -> Result<serde_json::Value, AppError> {
        self.calls.lock().unwrap().push(reference.to_string());
        if self.failing.lock().unwrap().contains(reference) {
            return Err(AppError::NetworkError(format!(
                "Connection failed for {reference}"
            )));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.fallback.clone())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockPlaceSearch
// ---------------------------------------------------------------------------

/// Mock place search returning a fixed result.
#[derive(Clone)]
pub struct MockPlaceSearch {
    result: Arc<Mutex<Option<Result<Vec<Place>, AppError>>>>,
    pub queries: Arc<Mutex<Vec<NearbyQuery>>>,
}

impl MockPlaceSearch {
    pub fn new(places: Vec<Place>) -> Self {
        Self {
            result: Arc::new(Mutex::new(Some(Ok(places)))),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            result: Arc::new(Mutex::new(Some(Err(error)))),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl PlaceSearch for MockPlaceSearch {
    async fn search_nearby(&self, query: &NearbyQuery) -> Result<Vec<Place>, AppError> {
        self.queries.lock().unwrap().push(*query);
        // The stored result is handed out once; later calls see no places.
        self.result.lock().unwrap().take().unwrap_or(Ok(Vec::new()))
    }
}

// ---------------------------------------------------------------------------
// MockPhotoSource
// ---------------------------------------------------------------------------

/// Mock photo source: `count` generated URLs per place, with optional
/// failing place ids.
#[derive(Clone)]
pub struct MockPhotoSource {
    count: usize,
    failing: Arc<Mutex<HashSet<String>>>,
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl MockPhotoSource {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            failing: Arc::new(Mutex::new(HashSet::new())),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_on(self, place_id: &str) -> Self {
        self.failing.lock().unwrap().insert(place_id.to_string());
        self
    }
}

impl PhotoSource for MockPhotoSource {
    async fn photo_urls(&self, place_id: &str, _place_name: &str) -> Result<Vec<String>, AppError> {
        self.requested.lock().unwrap().push(place_id.to_string());
        if self.failing.lock().unwrap().contains(place_id) {
            return Err(AppError::HttpError(format!("actor run failed for {place_id}")));
        }
        Ok(photo_urls_for(place_id, self.count))
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock pipeline reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == label)
            .count()
    }
}

impl PipelineReporter for MockReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        let label = match &event {
            PipelineEvent::RunStarted { .. } => "RunStarted",
            PipelineEvent::SourceStarted { .. } => "SourceStarted",
            PipelineEvent::SourceSkipped { .. } => "SourceSkipped",
            PipelineEvent::ParentSkipped { .. } => "ParentSkipped",
            PipelineEvent::ParentStarted { .. } => "ParentStarted",
            PipelineEvent::ChildAnalyzed { .. } => "ChildAnalyzed",
            PipelineEvent::ParentCompleted { .. } => "ParentCompleted",
            PipelineEvent::Cancelled => "Cancelled",
            PipelineEvent::RunFinished { .. } => "RunFinished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Deterministic photo URLs for a place.
pub fn photo_urls_for(place_id: &str, count: usize) -> Vec<String> {
    (1..=count)
        .map(|i| format!("https://img.example/{place_id}/{i}.jpg"))
        .collect()
}

/// Create a restaurant with `photos` generated photo URLs.
pub fn make_restaurant(place_id: &str, photos: usize) -> Restaurant {
    let photo_urls = photo_urls_for(place_id, photos);
    Restaurant {
        restaurant_name: format!("Restaurant {place_id}"),
        place_id: place_id.to_string(),
        rating: Some(4.2),
        vicinity: Some("1 Rue de Rivoli, 75001 Paris, France".to_string()),
        photo_count: photo_urls.len(),
        photo_urls,
    }
}

/// Create a place as returned by a nearby search.
pub fn make_place(place_id: &str, name: &str) -> Place {
    Place {
        name: name.to_string(),
        place_id: place_id.to_string(),
        rating: Some(4.0),
        vicinity: "2 Rue Las Cases, 75007 Paris, France".to_string(),
        types: vec!["restaurant".to_string()],
    }
}
