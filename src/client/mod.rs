//! HTTP client for the Tencent Cloud FaceID API.
//!
//! One signed POST per call, a bounded timeout, and uniform classification
//! of failures: transport faults surface as [`ClientError::Transport`],
//! while a non-200 status is normalized into the provider's own error
//! envelope (`RequestFailed`). Retry policy lives in the poller, not here.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::signer;
use crate::types::Credentials;

/// Error types for provider calls.
pub mod error;

pub use error::ClientError;

/// Per-request timeout, matching the provider's recommended bound.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of idle connections to keep per host.
const MAX_IDLE_CONNECTIONS_PER_HOST: usize = 10;

/// FaceID API version, part of every request's headers.
const API_VERSION: &str = "2018-03-01";

/// Provider region the FaceID rule lives in.
const REGION: &str = "ap-beijing";

/// Shared HTTP client with connection pooling for all provider requests.
/// Initialized once and reused across verifications.
static HTTP_CLIENT: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
        .pool_max_idle_per_host(MAX_IDLE_CONNECTIONS_PER_HOST)
        .user_agent(format!("faceid-verify/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("Failed to create HTTP client")
});

/// Wire names of the FaceID operations used by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Issue a new verification session
    DetectAuth,
    /// Fetch the detection result for an issued session
    GetDetectInfoEnhanced,
}

impl Action {
    /// The `X-TC-Action` header value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DetectAuth => "DetectAuth",
            Self::GetDetectInfoEnhanced => "GetDetectInfoEnhanced",
        }
    }
}

/// Provider error body as it appears in responses (`Error.Code` /
/// `Error.Message`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ApiError {
    pub(crate) code: Option<String>,
    pub(crate) message: Option<String>,
}

/// Abstraction over the provider transport.
///
/// The session and poller are generic over this trait so tests can script
/// provider responses without a network.
#[async_trait]
pub trait FaceidApi: Send + Sync {
    /// Sends one signed request and returns the unwrapped `Response` object
    /// verbatim; callers interpret the domain-specific fields.
    ///
    /// # Errors
    /// [`ClientError::Transport`] on network failure,
    /// [`ClientError::MalformedResponse`] when a 200 body is not the
    /// expected envelope.
    async fn send(
        &self,
        action: Action,
        params: Value,
        credentials: &Credentials,
    ) -> Result<Value, ClientError>;
}

#[async_trait]
impl<'a, T: FaceidApi + ?Sized> FaceidApi for &'a T {
    async fn send(
        &self,
        action: Action,
        params: Value,
        credentials: &Credentials,
    ) -> Result<Value, ClientError> {
        (**self).send(action, params, credentials).await
    }
}

/// Client for the production FaceID endpoint.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    base_url: String,
}

impl ProviderClient {
    /// Creates a client pointed at the production endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(format!("https://{}/", signer::ENDPOINT_HOST))
    }

    /// Creates a client with an overridden base URL.
    ///
    /// The signed `host` header stays the production endpoint; this exists
    /// for pointing tests at a local server.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    #[instrument(skip_all, fields(action = action.as_str()))]
    async fn request(
        &self,
        action: Action,
        params: Value,
        credentials: &Credentials,
    ) -> Result<Value, ClientError> {
        // The signature binds these exact payload bytes; the same string is
        // sent as the body.
        let payload = serde_json::to_string(&params)?;
        let envelope = signer::sign(credentials, &payload, Utc::now());

        let response = HTTP_CLIENT
            .post(&self.base_url)
            .header("Authorization", &envelope.authorization)
            .header("Content-Type", envelope.content_type)
            .header("X-TC-Action", action.as_str())
            .header("X-TC-Timestamp", envelope.timestamp.to_string())
            .header("X-TC-Version", API_VERSION)
            .header("X-TC-Region", REGION)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(%status, "provider returned a non-200 status");
            return Ok(request_failed_envelope(status.as_u16()));
        }

        let text = response.text().await?;
        let body: Value = serde_json::from_str(&text)
            .map_err(|e| ClientError::MalformedResponse(e.to_string()))?;

        debug!("provider call completed");

        match body {
            Value::Object(mut map) => map
                .remove("Response")
                .ok_or_else(|| ClientError::MalformedResponse("missing Response envelope".into())),
            _ => Err(ClientError::MalformedResponse(
                "response body is not a JSON object".into(),
            )),
        }
    }
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FaceidApi for ProviderClient {
    async fn send(
        &self,
        action: Action,
        params: Value,
        credentials: &Credentials,
    ) -> Result<Value, ClientError> {
        self.request(action, params, credentials).await
    }
}

/// The provider-shaped error envelope used for HTTP-level failures, so the
/// poller and session classify them like any other provider error.
fn request_failed_envelope(status: u16) -> Value {
    serde_json::json!({
        "Error": {
            "Code": "RequestFailed",
            "Message": format!("HTTP error: {status}"),
        }
    })
}
