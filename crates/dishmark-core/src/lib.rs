pub mod batch;
pub mod checkpoint;
pub mod classify;
pub mod config;
pub mod error;
pub mod harvest;
pub mod models;
pub mod persist;
pub mod pipeline;
pub mod report;
pub mod source;
#[cfg(test)]
pub mod testutil;
pub mod throttle;
pub mod traits;
pub mod util;

pub use classify::DishClassifier;
pub use config::{HarvestConfig, PipelineConfig};
pub use error::AppError;
pub use harvest::HarvestService;
pub use models::{
    AnalysisRecord, DishEntry, HarvestSummary, NearbyQuery, Outcome, Place, Restaurant,
    RunSummary, Verdict,
};
pub use pipeline::{BatchProcessor, PipelineReporter, TracingPipelineReporter};
pub use traits::{Analyzer, Classifier, PhotoSource, PlaceSearch, WorkItem};
