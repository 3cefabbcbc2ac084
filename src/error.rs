//! Caller-facing error taxonomy.
//!
//! Every failure crossing the crate boundary is a typed variant with a
//! human-readable message; no raw panic or transport error escapes the core.

use thiserror::Error;

use crate::client::ClientError;

/// Errors surfaced by session issuance and status polling.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The host has no license key configured; checked before any network
    /// call and never retried
    #[error("verification module is not licensed, contact the administrator")]
    Unlicensed,

    /// A required credential field is empty; fatal configuration error
    #[error("incomplete provider credentials: missing {field}")]
    IncompleteCredentials {
        /// Name of the missing field (`SecretId`, `SecretKey` or `RuleId`)
        field: &'static str,
    },

    /// The provider refused the request with a domain error
    #[error("{message}")]
    Provider {
        /// Provider error code, e.g. `InvalidParameterValue.RuleIdNotExist`
        code: String,
        /// Provider error message, passed through verbatim
        message: String,
    },

    /// Network-level failure reaching the provider
    #[error("verification service temporarily unavailable")]
    ServiceUnavailable(#[source] ClientError),

    /// The provider answered with an empty or unusable success envelope
    #[error("request failed")]
    RequestFailed,
}
