//! CRM integration for audience sync.
//!
//! After an audience has been written to a destination table, the CRM is
//! asked to pull that table. The request is a single authenticated POST:
//!
//! ```json
//! {"table": "Campaign", "rows": 42, "campaign": "Spring re-engagement"}
//! ```
//!
//! and the CRM answers with `{"status": "queued", "job_id": "..."}`.

use std::fmt;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// CRM client errors.
#[derive(Debug, Error)]
pub enum CrmError {
    /// The provided API key was invalid.
    #[error("invalid API key: {reason}")]
    InvalidApiKey { reason: &'static str },
    /// The endpoint is not an http(s) URL.
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        endpoint: String,
        reason: &'static str,
    },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// API returned an error response.
    #[error("API error: {message}")]
    Api { message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// CRM sync client.
///
/// # Thread Safety
///
/// The client is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new client for the given endpoint and API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or whitespace-only, if the
    /// endpoint is not an http(s) URL, or if the HTTP client fails to build.
    pub fn new(endpoint: &str, api_key: impl Into<String>) -> Result<Self, CrmError> {
        let api_key = api_key.into();

        if api_key.is_empty() {
            return Err(CrmError::InvalidApiKey {
                reason: "API key cannot be empty",
            });
        }
        if api_key.trim().is_empty() {
            return Err(CrmError::InvalidApiKey {
                reason: "API key cannot be whitespace-only",
            });
        }

        let endpoint = parse_endpoint(endpoint)?;

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(CrmError::ClientBuild)?;

        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }

    /// Asks the CRM to pull the synced table.
    pub async fn request_sync(&self, request: &SyncRequest) -> Result<SyncReceipt, CrmError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            table = %request.table,
            rows = request.rows,
            "requesting CRM sync"
        );

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(parse_api_error(&body).unwrap_or_else(|| CrmError::Api {
                message: format!("status {status}: {body}"),
            }));
        }

        parse_receipt(&body)
    }
}

/// Body of a sync request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncRequest {
    pub table: String,
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
}

/// The CRM's acknowledgement of a sync request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncReceipt {
    pub status: String,
    #[serde(default)]
    pub job_id: Option<String>,
}

fn parse_endpoint(endpoint: &str) -> Result<Url, CrmError> {
    let invalid = |reason| CrmError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };
    let url = Url::parse(endpoint.trim()).map_err(|_| invalid("not a valid URL"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(invalid("scheme must be http or https")),
    }
}

fn parse_receipt(body: &str) -> Result<SyncReceipt, CrmError> {
    serde_json::from_str(body).map_err(|err| CrmError::InvalidResponse(err.to_string()))
}

fn parse_api_error(body: &str) -> Option<CrmError> {
    #[derive(Deserialize)]
    struct ErrorPayload {
        error: ErrorDetails,
    }

    #[derive(Deserialize)]
    struct ErrorDetails {
        message: String,
    }

    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .map(|payload| CrmError::Api {
            message: payload.error.message,
        })
}
