//! Status-polling state machine for in-flight verifications.
//!
//! Face verification is human-paced: the subject has to scan a code and
//! complete a face scan, which takes seconds to minutes. The poller trades
//! fast feedback on quick completions against not hammering the provider on
//! slow ones: a bounded number of attempts with a progressive inter-attempt
//! delay, all within one cancellable async call.
//!
//! The state machine is single-level: every run starts in `Pending` and
//! moves to exactly one of `Approved`, `Rejected` or `Error`, with no
//! re-entry. `Pending` itself is never returned to the caller.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{Action, ApiError, ClientError, FaceidApi};
use crate::error::VerificationError;
use crate::types::{Credentials, PollOutcome, VerificationStatus};

/// Attempt budget for one polling run.
pub const MAX_ATTEMPTS: u32 = 100;

/// Progressive inter-attempt delays; the last entry repeats once reached.
pub const BACKOFF_DELAYS: [Duration; 5] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(3),
    Duration::from_secs(5),
    Duration::from_secs(10),
];

const MSG_APPROVED: &str = "verification approved";
const MSG_REQUEST_FAILED: &str = "request failed";
const MSG_NOT_VERIFIED: &str = "not yet verified";
const MSG_UNKNOWN_STATUS: &str = "unknown verification status";
const MSG_UNAVAILABLE: &str = "verification service temporarily unavailable";
const MSG_TIMED_OUT: &str = "verification timed out, failed";
const MSG_CANCELLED: &str = "verification cancelled";

/// Error codes that can never be resolved by further polling when they
/// accompany a text result.
const UNRECOVERABLE_RULE_CODES: [&str; 4] = [
    "InvalidParameterValue.RuleIdNotExist",
    "InvalidParameterValue.RuleIdDisabled",
    "UnauthorizedOperation.Nonactivated",
    "UnauthorizedOperation.RegionNotSupported",
];

/// Extended unrecoverable set consulted when a response carries only a
/// top-level error.
const UNRECOVERABLE_AUTH_CODES: [&str; 6] = [
    "InvalidParameterValue.RuleIdNotExist",
    "InvalidParameterValue.RuleIdDisabled",
    "UnauthorizedOperation.Nonactivated",
    "UnauthorizedOperation.RegionNotSupported",
    "UnauthorizedOperation.ActivateError",
    "AuthFailure.InvalidAuthorization",
];

/// `GetDetectInfoEnhanced` response, reduced to the fields the state machine
/// inspects.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DetectInfoResult {
    text: Option<TextInfo>,
    error: Option<ApiError>,
}

/// Text-info block of the detection result.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TextInfo {
    err_code: Option<i64>,
    err_msg: Option<String>,
}

/// Per-attempt classification result.
enum Step {
    /// Polling stops with this outcome
    Terminal(PollOutcome),
    /// Not finished yet; carries the best-known reason so far
    Transient(String),
}

/// Polls a verification session until a terminal outcome.
pub struct StatusPoller<C> {
    api: C,
    max_attempts: u32,
    deadline: Option<Duration>,
}

impl<C: FaceidApi> StatusPoller<C> {
    /// Wraps a provider transport with the default attempt budget and no
    /// deadline.
    pub const fn new(api: C) -> Self {
        Self {
            api,
            max_attempts: MAX_ATTEMPTS,
            deadline: None,
        }
    }

    /// Caps the total polling duration; once exceeded, the run returns the
    /// timeout outcome without further attempts.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Overrides the attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Polls the verification identified by `biz_token` until it reaches a
    /// terminal state, the attempt budget or deadline is exhausted, or
    /// `cancel` fires between attempts.
    ///
    /// Blocks (asynchronously) for the duration of the run — worst case
    /// `MAX_ATTEMPTS` requests with saturating backoff in between. Hosts
    /// that cannot wait that long pass a deadline or a cancellation token.
    /// Concurrent polls are independent; polling the same token twice yields
    /// the same outcome for an unchanged remote state.
    ///
    /// # Errors
    /// Only configuration failures ([`VerificationError::Unlicensed`],
    /// [`VerificationError::IncompleteCredentials`]) are returned as `Err`,
    /// before any network call. Every other failure is a terminal
    /// [`PollOutcome`] with [`VerificationStatus::Error`] or
    /// [`VerificationStatus::Rejected`] and a human-readable message.
    pub async fn poll(
        &self,
        biz_token: &str,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, VerificationError> {
        credentials.validate()?;

        let started = Instant::now();
        let mut attempt: u32 = 0;
        let mut last_reason = String::new();

        loop {
            let params = json!({
                "BizToken": biz_token,
                "RuleId": credentials.rule_id,
                // text-info result type
                "InfoType": "1",
            });

            let step = match self
                .api
                .send(Action::GetDetectInfoEnhanced, params, credentials)
                .await
            {
                Ok(body) => classify(&body),
                Err(ClientError::Transport(e)) => {
                    warn!(error = %e, "transport failure while polling, giving up");
                    Step::Terminal(PollOutcome::new(VerificationStatus::Error, MSG_UNAVAILABLE))
                }
                Err(e) => {
                    warn!(error = %e, "unusable provider response while polling, giving up");
                    Step::Terminal(PollOutcome::new(
                        VerificationStatus::Error,
                        MSG_REQUEST_FAILED,
                    ))
                }
            };

            match step {
                Step::Terminal(outcome) => {
                    info!(
                        status = ?outcome.status,
                        message = %outcome.message,
                        attempts = attempt + 1,
                        "polling finished"
                    );
                    return Ok(outcome);
                }
                Step::Transient(reason) => {
                    debug!(attempt = attempt + 1, %reason, "verification still pending");
                    last_reason = reason;
                }
            }

            attempt += 1;
            if attempt >= self.max_attempts {
                warn!(%last_reason, "attempt budget exhausted");
                return Ok(PollOutcome::new(VerificationStatus::Error, MSG_TIMED_OUT));
            }
            if let Some(deadline) = self.deadline {
                if started.elapsed() >= deadline {
                    warn!(%last_reason, "polling deadline exceeded");
                    return Ok(PollOutcome::new(VerificationStatus::Error, MSG_TIMED_OUT));
                }
            }

            tokio::select! {
                () = sleep(delay_for_attempt(attempt)) => {}
                () = cancel.cancelled() => {
                    info!(%last_reason, "polling cancelled by the caller");
                    return Ok(PollOutcome::new(VerificationStatus::Error, MSG_CANCELLED));
                }
            }
        }
    }
}

/// Delay before attempt `attempt + 1`, saturating at the last schedule
/// entry: attempt 1 waits 1 s, attempt 5 and later wait 10 s.
const fn delay_for_attempt(attempt: u32) -> Duration {
    let index = (attempt - 1) as usize;
    let last = BACKOFF_DELAYS.len() - 1;
    BACKOFF_DELAYS[if index < last { index } else { last }]
}

/// Classifies one provider response.
///
/// Terminal cases:
/// - `Text.ErrCode == 0` — approved;
/// - text result paired with a top-level error from the unrecoverable rule
///   set — rejected with the provider's message;
/// - a top-level error without a text result — error, always under the
///   current attempt (the extended set only sharpens the log line);
/// - an empty response — error, "request failed".
///
/// Everything else is transient and the loop keeps going.
fn classify(body: &Value) -> Step {
    if body.is_null() {
        return Step::Terminal(PollOutcome::new(
            VerificationStatus::Error,
            MSG_REQUEST_FAILED,
        ));
    }

    let Ok(result) = serde_json::from_value::<DetectInfoResult>(body.clone()) else {
        return Step::Transient(MSG_UNKNOWN_STATUS.to_string());
    };

    match (result.text, result.error) {
        (Some(text), error) => {
            if text.err_code == Some(0) {
                return Step::Terminal(PollOutcome::new(
                    VerificationStatus::Approved,
                    MSG_APPROVED,
                ));
            }
            if let Some(error) = error {
                if let Some(code) = error.code.as_deref() {
                    if UNRECOVERABLE_RULE_CODES.contains(&code) {
                        return Step::Terminal(PollOutcome::new(
                            VerificationStatus::Rejected,
                            error
                                .message
                                .unwrap_or_else(|| MSG_NOT_VERIFIED.to_string()),
                        ));
                    }
                }
            }
            Step::Transient(text.err_msg.unwrap_or_else(|| MSG_NOT_VERIFIED.to_string()))
        }
        (None, Some(error)) => {
            let code = error.code.unwrap_or_default();
            if UNRECOVERABLE_AUTH_CODES.contains(&code.as_str()) {
                warn!(%code, "unrecoverable provider error");
            }
            Step::Terminal(PollOutcome::new(
                VerificationStatus::Error,
                error
                    .message
                    .unwrap_or_else(|| MSG_UNKNOWN_STATUS.to_string()),
            ))
        }
        (None, None) => Step::Transient(MSG_UNKNOWN_STATUS.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Provider double that replays a scripted list of responses.
    struct ScriptedApi {
        responses: Mutex<VecDeque<Result<Value, ClientError>>>,
        calls: AtomicU32,
    }

    impl ScriptedApi {
        fn new(responses: Vec<Result<Value, ClientError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FaceidApi for ScriptedApi {
        async fn send(
            &self,
            _action: Action,
            _params: Value,
            _credentials: &Credentials,
        ) -> Result<Value, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .expect("script lock")
                .pop_front()
                .expect("script exhausted")
        }
    }

    fn credentials() -> Credentials {
        Credentials::new("id", "key", "rule", "license")
    }

    fn pending() -> Result<Value, ClientError> {
        Ok(json!({"Text": {"ErrCode": 1, "ErrMsg": "subject has not completed the scan"}}))
    }

    fn approved() -> Result<Value, ClientError> {
        Ok(json!({"Text": {"ErrCode": 0, "ErrMsg": "ok"}}))
    }

    #[test]
    fn backoff_schedule_saturates_at_ten_seconds() {
        let seconds: Vec<u64> = (1..=7)
            .map(|attempt| delay_for_attempt(attempt).as_secs())
            .collect();
        assert_eq!(seconds, vec![1, 2, 3, 5, 10, 10, 10]);
    }

    #[tokio::test(start_paused = true)]
    async fn approved_on_third_attempt_after_two_pending_responses() {
        let api = ScriptedApi::new(vec![pending(), pending(), approved()]);
        let poller = StatusPoller::new(&api);
        let started = Instant::now();

        let outcome = poller
            .poll("biz-1", &credentials(), &CancellationToken::new())
            .await
            .expect("config is valid");

        assert_eq!(outcome.status, VerificationStatus::Approved);
        assert_eq!(outcome.message, "verification approved");
        assert!(outcome.is_approved());
        assert_eq!(api.calls(), 3);
        // two waits: 1 s after attempt 1, 2 s after attempt 2
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn unrecoverable_rule_error_stops_after_one_attempt() {
        let api = ScriptedApi::new(vec![Ok(json!({
            "Error": {
                "Code": "InvalidParameterValue.RuleIdNotExist",
                "Message": "rule does not exist",
            }
        }))]);
        let poller = StatusPoller::new(&api);

        let outcome = poller
            .poll("biz-2", &credentials(), &CancellationToken::new())
            .await
            .expect("config is valid");

        assert_eq!(outcome.status, VerificationStatus::Error);
        assert_eq!(outcome.message, "rule does not exist");
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn any_top_level_only_error_is_terminal() {
        // Codes outside the unrecoverable set still stop the loop when the
        // response carries no text result.
        let api = ScriptedApi::new(vec![Ok(json!({
            "Error": { "Code": "InternalError", "Message": "backend glitch" }
        }))]);
        let poller = StatusPoller::new(&api);

        let outcome = poller
            .poll("biz-3", &credentials(), &CancellationToken::new())
            .await
            .expect("config is valid");

        assert_eq!(outcome.status, VerificationStatus::Error);
        assert_eq!(outcome.message, "backend glitch");
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rule_error_next_to_a_text_result_is_a_rejection() {
        let api = ScriptedApi::new(vec![Ok(json!({
            "Text": { "ErrCode": 2, "ErrMsg": "face mismatch" },
            "Error": {
                "Code": "UnauthorizedOperation.Nonactivated",
                "Message": "service not activated",
            }
        }))]);
        let poller = StatusPoller::new(&api);

        let outcome = poller
            .poll("biz-4", &credentials(), &CancellationToken::new())
            .await
            .expect("config is valid");

        assert_eq!(outcome.status, VerificationStatus::Rejected);
        assert_eq!(outcome.message, "service not activated");
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_the_budget_times_out_after_exactly_100_attempts() {
        let api = ScriptedApi::new((0..100).map(|_| pending()).collect());
        let poller = StatusPoller::new(&api);
        let started = Instant::now();

        let outcome = poller
            .poll("biz-5", &credentials(), &CancellationToken::new())
            .await
            .expect("config is valid");

        assert_eq!(outcome.status, VerificationStatus::Error);
        assert_eq!(outcome.message, "verification timed out, failed");
        assert_eq!(api.calls(), 100);
        // 99 waits: 1 + 2 + 3 + 5 + 95 * 10
        assert_eq!(started.elapsed(), Duration::from_secs(961));
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_shapes_are_transient() {
        let api = ScriptedApi::new(vec![Ok(json!("weird")), approved()]);
        let poller = StatusPoller::new(&api);

        let outcome = poller
            .poll("biz-6", &credentials(), &CancellationToken::new())
            .await
            .expect("config is valid");

        assert_eq!(outcome.status, VerificationStatus::Approved);
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn null_response_stops_with_request_failed() {
        let api = ScriptedApi::new(vec![Ok(Value::Null)]);
        let poller = StatusPoller::new(&api);

        let outcome = poller
            .poll("biz-7", &credentials(), &CancellationToken::new())
            .await
            .expect("config is valid");

        assert_eq!(outcome.status, VerificationStatus::Error);
        assert_eq!(outcome.message, "request failed");
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_response_stops_with_request_failed() {
        let api = ScriptedApi::new(vec![Err(ClientError::MalformedResponse(
            "missing Response envelope".into(),
        ))]);
        let poller = StatusPoller::new(&api);

        let outcome = poller
            .poll("biz-8", &credentials(), &CancellationToken::new())
            .await
            .expect("config is valid");

        assert_eq!(outcome.status, VerificationStatus::Error);
        assert_eq!(outcome.message, "request failed");
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_between_attempts_ends_the_run() {
        let api = ScriptedApi::new(vec![pending(), pending()]);
        let poller = StatusPoller::new(&api);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = poller
            .poll("biz-9", &credentials(), &cancel)
            .await
            .expect("config is valid");

        assert_eq!(outcome.status, VerificationStatus::Error);
        assert_eq!(outcome.message, "verification cancelled");
        // the first attempt runs; the cancel wins the first backoff race
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_shorter_than_the_budget_is_honored() {
        let api = ScriptedApi::new((0..10).map(|_| pending()).collect());
        let poller = StatusPoller::new(&api).with_deadline(Duration::from_secs(4));

        let outcome = poller
            .poll("biz-10", &credentials(), &CancellationToken::new())
            .await
            .expect("config is valid");

        assert_eq!(outcome.status, VerificationStatus::Error);
        assert_eq!(outcome.message, "verification timed out, failed");
        // elapsed reaches 1 + 2 + 3 = 6 s >= 4 s after the fourth attempt
        assert_eq!(api.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_twice_with_unchanged_remote_state_is_idempotent() {
        let api = ScriptedApi::new(vec![approved(), approved()]);
        let poller = StatusPoller::new(&api);
        let cancel = CancellationToken::new();

        let first = poller
            .poll("biz-11", &credentials(), &cancel)
            .await
            .expect("config is valid");
        let second = poller
            .poll("biz-11", &credentials(), &cancel)
            .await
            .expect("config is valid");

        assert_eq!(first, second);
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn unlicensed_poll_makes_no_network_calls() {
        let api = ScriptedApi::new(vec![]);
        let poller = StatusPoller::new(&api);
        let mut creds = credentials();
        creds.license_key.clear();

        let result = poller
            .poll("biz-12", &creds, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(VerificationError::Unlicensed)));
        assert_eq!(api.calls(), 0);
    }
}
