pub mod apify;
pub mod dify;
mod http;
pub mod places;

pub use apify::{ApifyConfig, ApifyPhotoSource};
pub use dify::{DifyAnalyzer, DifyConfig};
pub use places::{GooglePlacesClient, PlacesConfig};
