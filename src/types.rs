//! Core data types shared across the verification flow.

use serde::{Deserialize, Serialize};

use crate::error::VerificationError;

/// Provider credentials plus the host-issued license key.
///
/// Immutable once constructed; passed explicitly into every operation so the
/// crate never reads global configuration.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Tencent Cloud `SecretId`
    pub secret_id: String,
    /// Tencent Cloud `SecretKey`
    pub secret_key: String,
    /// FaceID business rule id (`RuleId`)
    pub rule_id: String,
    /// Host license key; an empty value disables the module entirely
    pub license_key: String,
}

impl Credentials {
    /// Creates credentials from explicit values.
    pub fn new(
        secret_id: impl Into<String>,
        secret_key: impl Into<String>,
        rule_id: impl Into<String>,
        license_key: impl Into<String>,
    ) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
            rule_id: rule_id.into(),
            license_key: license_key.into(),
        }
    }

    /// Loads credentials from `FACEID_SECRET_ID`, `FACEID_SECRET_KEY`,
    /// `FACEID_RULE_ID` and `FACEID_LICENSE_KEY`.
    ///
    /// A missing license key maps to an empty string, so the unlicensed check
    /// fires on first use rather than at load time.
    ///
    /// # Errors
    /// Returns [`VerificationError::IncompleteCredentials`] when any of the
    /// three required variables is unset.
    pub fn from_env() -> Result<Self, VerificationError> {
        let read = |var: &str, field: &'static str| {
            std::env::var(var)
                .map_err(|_| VerificationError::IncompleteCredentials { field })
        };
        Ok(Self {
            secret_id: read("FACEID_SECRET_ID", "SecretId")?,
            secret_key: read("FACEID_SECRET_KEY", "SecretKey")?,
            rule_id: read("FACEID_RULE_ID", "RuleId")?,
            license_key: std::env::var("FACEID_LICENSE_KEY").unwrap_or_default(),
        })
    }

    /// Fails fast when the configuration cannot support a provider call.
    ///
    /// The license gate is checked first, then credential completeness; both
    /// checks run before any network traffic.
    ///
    /// # Errors
    /// [`VerificationError::Unlicensed`] for an empty license key,
    /// [`VerificationError::IncompleteCredentials`] for any empty required
    /// field.
    pub fn validate(&self) -> Result<(), VerificationError> {
        if self.license_key.is_empty() {
            return Err(VerificationError::Unlicensed);
        }
        for (field, value) in [
            ("SecretId", &self.secret_id),
            ("SecretKey", &self.secret_key),
            ("RuleId", &self.rule_id),
        ] {
            if value.is_empty() {
                return Err(VerificationError::IncompleteCredentials { field });
            }
        }
        Ok(())
    }
}

/// One face-verification attempt for a single subject.
///
/// Constructed per attempt and never persisted. The redirect URL is where the
/// provider sends the subject's browser after completion; the crate passes it
/// through opaquely.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    /// Subject's real name
    pub name: String,
    /// Subject's national ID number
    pub id_card: String,
    /// Callback URL handed to the provider verbatim
    pub redirect_url: String,
}

impl VerificationRequest {
    /// Creates a request for one verification attempt.
    pub fn new(
        name: impl Into<String>,
        id_card: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            id_card: id_card.into(),
            redirect_url: redirect_url.into(),
        }
    }
}

/// Successful result of session issuance.
///
/// Handed to the host, which records the token against its pending
/// certification record and renders the URL for the subject to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedVerification {
    /// Opaque provider session identifier (`BizToken`), valid for the
    /// provider's session window (a few minutes)
    pub biz_token: String,
    /// URL the subject opens to perform the face scan
    pub url: String,
}

/// Verification state as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Subject has not completed the flow yet; never surfaced by `poll`
    Pending,
    /// Face match succeeded
    Approved,
    /// Provider definitively refused this verification
    Rejected,
    /// Request failure, unrecoverable provider error, timeout or cancellation
    Error,
}

/// Terminal result of one polling run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOutcome {
    /// Terminal status (never [`VerificationStatus::Pending`])
    pub status: VerificationStatus,
    /// Human-readable reason; provider messages pass through verbatim
    pub message: String,
}

impl PollOutcome {
    pub(crate) fn new(status: VerificationStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Whether the verification completed successfully.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.status == VerificationStatus::Approved
    }
}
