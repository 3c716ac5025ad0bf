use std::time::Duration;

use dishmark_core::error::AppError;
use reqwest::{Client, Response};
use serde::Deserialize;
use url::Url;

pub(crate) fn build_client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .user_agent("dishmark/0.1")
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::HttpError(e.to_string()))
}

/// Join `path` onto `base`, keeping any path prefix `base` already has.
pub(crate) fn endpoint(base: &str, path: &str) -> Result<Url, AppError> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    Url::parse(&raw).map_err(|e| AppError::ConfigError(format!("Invalid endpoint '{raw}': {e}")))
}

pub(crate) fn transport_error(e: reqwest::Error, timeout_secs: u64) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout_secs)
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {e}"))
    } else {
        AppError::HttpError(e.to_string())
    }
}

/// Error bodies differ per vendor; all three put a `message` somewhere.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Turn a non-success response into an error. 429 is always
/// `RateLimitExceeded`; 5xx is retryable.
pub(crate) async fn status_error(response: Response, service: &str) -> AppError {
    let status_code = response.status().as_u16();
    if status_code == 429 {
        return AppError::RateLimitExceeded;
    }
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error.map(|d| d.message).or(b.message))
        .unwrap_or(body);

    AppError::AnalyzerError {
        message: format!("{service}: {message}"),
        status_code,
        retryable: status_code >= 500,
    }
}
