//! Client for the central collection API.
//!
//! The API is a single endpoint multiplexed by an `action` query parameter.
//! Every response is wrapped in an [`ApiEnvelope`]:
//!
//! ```text
//! { "success": true, "message": "...", "data": { ... } }
//! ```
//!
//! Agents depend on the [`CentralApi`] trait so the transport can be
//! replaced in tests.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use scadalink_common::{ApiConfig, Reading, Tag};

use crate::error::{AgentError, Result};
use crate::heartbeat::Heartbeat;

/// Header carrying the agent's API key (`X-API-Key`).
pub const API_KEY_HEADER: &str = "x-api-key";

/// Response wrapper used by every action.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

/// `data` payload of a `get_tags` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagList {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Outcome of a data submission as reported by the server.
///
/// `errors > 0` means some readings were rejected server-side while the
/// request as a whole succeeded.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubmitReport {
    #[serde(default)]
    pub submission_id: Option<u64>,
    #[serde(default)]
    pub total_readings: u64,
    #[serde(default)]
    pub processed: u64,
    #[serde(default)]
    pub errors: u64,
    #[serde(default)]
    pub error_details: Vec<String>,
}

impl SubmitReport {
    pub fn is_partial(&self) -> bool {
        self.errors > 0
    }
}

/// Request body of a `submit_data` call.
#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    plc_id: u32,
    readings: &'a [Reading],
}

/// Boundary between an agent and the central collection service.
pub trait CentralApi {
    /// Fetch the ordered tag list for a controller.
    fn fetch_tags(&self, plc_id: u32) -> impl Future<Output = Result<Vec<Tag>>> + Send;

    /// Report liveness.
    fn send_heartbeat(&self, heartbeat: &Heartbeat) -> impl Future<Output = Result<()>> + Send;

    /// Deliver one batch of readings, in order.
    fn submit_readings(
        &self,
        plc_id: u32,
        readings: &[Reading],
    ) -> impl Future<Output = Result<SubmitReport>> + Send;
}

/// [`CentralApi`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: reqwest::Client,
    url: String,
    request_timeout: Duration,
    submit_timeout: Duration,
}

impl HttpApiClient {
    /// Build a client from the API section of the configuration.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| AgentError::validation("api.api_key contains invalid header characters"))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("scadalink-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentError::with_context("Failed to build HTTP client", e))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            submit_timeout: Duration::from_secs(config.submit_timeout_secs),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Turn an HTTP response into the envelope's `data`, enforcing `success`.
async fn read_envelope<T: DeserializeOwned>(
    action: &'static str,
    response: reqwest::Response,
) -> Result<Option<T>> {
    let status = response.status();
    let body = response.bytes().await.map_err(send_error(action))?;
    let parsed = serde_json::from_slice::<ApiEnvelope<T>>(&body);

    if !status.is_success() {
        let detail = parsed
            .ok()
            .and_then(|envelope| envelope.message)
            .unwrap_or_else(|| "no message".to_string());
        return Err(AgentError::Http {
            action,
            message: format!("HTTP {}: {}", status, detail),
        });
    }

    let envelope = parsed.map_err(|e| AgentError::Http {
        action,
        message: format!("invalid response body: {}", e),
    })?;

    if !envelope.success {
        return Err(AgentError::Api {
            action,
            message: envelope
                .message
                .unwrap_or_else(|| "no message".to_string()),
        });
    }

    Ok(envelope.data)
}

fn send_error(action: &'static str) -> impl FnOnce(reqwest::Error) -> AgentError {
    move |e| AgentError::Http {
        action,
        message: e.to_string(),
    }
}

impl CentralApi for HttpApiClient {
    async fn fetch_tags(&self, plc_id: u32) -> Result<Vec<Tag>> {
        const ACTION: &str = "get_tags";

        let plc_id_param = plc_id.to_string();
        let response = self
            .client
            .get(&self.url)
            .query(&[("action", ACTION), ("plc_id", plc_id_param.as_str())])
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(send_error(ACTION))?;

        let list: TagList = read_envelope(ACTION, response).await?.unwrap_or_default();
        debug!(plc_id, tags = list.tags.len(), "Fetched tag registry");
        Ok(list.tags)
    }

    async fn send_heartbeat(&self, heartbeat: &Heartbeat) -> Result<()> {
        const ACTION: &str = "heartbeat";

        let response = self
            .client
            .post(&self.url)
            .query(&[("action", ACTION)])
            .timeout(self.request_timeout)
            .json(heartbeat)
            .send()
            .await
            .map_err(send_error(ACTION))?;

        read_envelope::<serde_json::Value>(ACTION, response).await?;
        Ok(())
    }

    async fn submit_readings(&self, plc_id: u32, readings: &[Reading]) -> Result<SubmitReport> {
        const ACTION: &str = "submit_data";

        let body = SubmitRequest {
            kind: "tag_data",
            plc_id,
            readings,
        };

        let response = self
            .client
            .post(&self.url)
            .query(&[("action", ACTION)])
            .timeout(self.submit_timeout)
            .json(&body)
            .send()
            .await
            .map_err(send_error(ACTION))?;

        Ok(read_envelope(ACTION, response).await?.unwrap_or_default())
    }
}
