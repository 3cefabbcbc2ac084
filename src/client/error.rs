//! Error types for the provider HTTP client.

use thiserror::Error;

/// Errors raised while talking to the provider endpoint.
///
/// Transport failures are kept distinct from HTTP-level failures: a non-2xx
/// status is normalized into the provider's own error envelope by the client
/// and never appears here.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network-level failure (connect, TLS, timeout, interrupted body)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A 200 response whose body is not the expected `Response` envelope
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// Request parameters could not be serialized to JSON
    #[error("failed to serialize request parameters: {0}")]
    Serialization(#[from] serde_json::Error),
}
