use std::time::Duration;

use dishmark_core::error::AppError;
use dishmark_core::traits::Analyzer;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://api.dify.ai/v1";
pub const DEFAULT_USER: &str = "image-analyzer";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection settings for a Dify workflow.
#[derive(Debug, Clone)]
pub struct DifyConfig {
    pub base_url: String,
    pub token: String,
    /// End-user identifier Dify attaches to each run.
    pub user: String,
    pub timeout: Duration,
}

impl DifyConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            user: DEFAULT_USER.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Runs a blocking Dify workflow on one image URL and returns the
/// workflow's `outputs` object.
#[derive(Clone)]
pub struct DifyAnalyzer {
    client: Client,
    url: Url,
    token: String,
    user: String,
    timeout_secs: u64,
}

impl DifyAnalyzer {
    pub fn new(config: DifyConfig) -> Result<Self, AppError> {
        if config.token.trim().is_empty() {
            return Err(AppError::ConfigError("Dify token is empty".into()));
        }
        Ok(Self {
            client: http::build_client(config.timeout)?,
            url: http::endpoint(&config.base_url, "workflows/run")?,
            token: config.token,
            user: config.user,
            timeout_secs: config.timeout.as_secs(),
        })
    }
}

// ---- Dify API types ----

#[derive(Serialize)]
struct WorkflowRequest<'a> {
    inputs: Inputs<'a>,
    response_mode: &'static str,
    user: &'a str,
}

#[derive(Serialize)]
struct Inputs<'a> {
    image: ImageInput<'a>,
}

#[derive(Serialize)]
struct ImageInput<'a> {
    url: &'a str,
    transfer_method: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
}

impl<'a> WorkflowRequest<'a> {
    fn for_image(url: &'a str, user: &'a str) -> Self {
        Self {
            inputs: Inputs {
                image: ImageInput {
                    url,
                    transfer_method: "remote_url",
                    kind: "image",
                },
            },
            response_mode: "blocking",
            user,
        }
    }
}

#[derive(Deserialize)]
struct WorkflowResponse {
    data: Option<WorkflowData>,
}

#[derive(Deserialize)]
struct WorkflowData {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    outputs: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Pull `data.outputs` out of a workflow response.
fn outputs(response: WorkflowResponse) -> Result<serde_json::Value, AppError> {
    let data = response
        .data
        .ok_or_else(|| AppError::MalformedResponse("missing data".into()))?;

    if data.status.as_deref() == Some("failed") {
        return Err(AppError::AnalyzerError {
            message: data.error.unwrap_or_else(|| "workflow failed".into()),
            status_code: 200,
            retryable: false,
        });
    }

    match data.outputs {
        Some(outputs) if outputs.is_object() => Ok(outputs),
        Some(other) => Err(AppError::MalformedResponse(format!(
            "data.outputs is not an object: {other}"
        ))),
        None => Err(AppError::MalformedResponse("missing data.outputs".into())),
    }
}

impl Analyzer for DifyAnalyzer {
    async fn analyze(&self, reference: &str) -> Result<serde_json::Value, AppError> {
        tracing::debug!(url = %reference, "Running Dify workflow");

        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(&self.token)
            .json(&WorkflowRequest::for_image(reference, &self.user))
            .send()
            .await
            .map_err(|e| http::transport_error(e, self.timeout_secs))?;

        if !response.status().is_success() {
            return Err(http::status_error(response, "Dify").await);
        }

        let body: WorkflowResponse = response
            .json()
            .await
            .map_err(|e| AppError::MalformedResponse(format!("Failed to parse Dify response: {e}")))?;

        outputs(body)
    }
}
