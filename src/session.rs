//! Verification session issuance (the provider's `DetectAuth` operation).

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::client::{Action, ApiError, ClientError, FaceidApi};
use crate::error::VerificationError;
use crate::types::{Credentials, StartedVerification, VerificationRequest};

/// Success body of `DetectAuth`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DetectAuthResult {
    biz_token: Option<String>,
    url: Option<String>,
    error: Option<ApiError>,
}

/// Issues new face-verification sessions against the provider.
pub struct VerificationSession<C> {
    api: C,
}

impl<C: FaceidApi> VerificationSession<C> {
    /// Wraps a provider transport.
    pub const fn new(api: C) -> Self {
        Self { api }
    }

    /// Starts a verification session for one subject.
    ///
    /// Returns the provider-issued `BizToken` and the URL the subject opens
    /// to perform the face scan. The token is only valid for the provider's
    /// session window, so the host should hand the URL to the subject right
    /// away.
    ///
    /// # Errors
    /// - [`VerificationError::Unlicensed`] /
    ///   [`VerificationError::IncompleteCredentials`] before any network
    ///   call when the configuration is unusable;
    /// - [`VerificationError::ServiceUnavailable`] on transport failure;
    /// - [`VerificationError::Provider`] when the provider refuses the
    ///   request with a domain error;
    /// - [`VerificationError::RequestFailed`] for an empty or unusable
    ///   response.
    pub async fn start(
        &self,
        request: &VerificationRequest,
        credentials: &Credentials,
    ) -> Result<StartedVerification, VerificationError> {
        credentials.validate()?;

        let params = json!({
            "RuleId": credentials.rule_id,
            "IdCard": request.id_card,
            "Name": request.name,
            "RedirectUrl": request.redirect_url,
        });

        let response = match self.api.send(Action::DetectAuth, params, credentials).await {
            Ok(response) => response,
            Err(ClientError::Transport(e)) => {
                warn!(error = %e, "transport failure while starting a verification");
                return Err(VerificationError::ServiceUnavailable(
                    ClientError::Transport(e),
                ));
            }
            Err(e) => {
                warn!(error = %e, "unusable provider response while starting a verification");
                return Err(VerificationError::RequestFailed);
            }
        };

        let result: DetectAuthResult =
            serde_json::from_value(response).map_err(|_| VerificationError::RequestFailed)?;

        match result.biz_token {
            Some(biz_token) if !biz_token.is_empty() => {
                info!(%biz_token, "verification session issued");
                Ok(StartedVerification {
                    biz_token,
                    url: result.url.unwrap_or_default(),
                })
            }
            _ => match result.error {
                Some(error) => Err(VerificationError::Provider {
                    code: error.code.unwrap_or_default(),
                    message: error.message.unwrap_or_else(|| "unknown error".to_string()),
                }),
                None => Err(VerificationError::RequestFailed),
            },
        }
    }
}
