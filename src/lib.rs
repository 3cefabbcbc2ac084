//! Tencent Cloud FaceID real-name verification.
//!
//! This crate issues remote face-verification sessions for a person (name +
//! national ID number) and polls the provider until the verification reaches
//! a terminal state. The flow has two halves:
//!
//! 1. [`VerificationSession::start`] calls the provider's `DetectAuth`
//!    operation and returns a `BizToken` plus a redirect URL the subject
//!    opens (typically rendered as a QR code by the host).
//! 2. [`StatusPoller::poll`] repeatedly calls `GetDetectInfoEnhanced` with
//!    that token, classifying each response until the verification is
//!    approved, definitively rejected, or the attempt budget runs out.
//!
//! Every outbound request is signed with the provider's TC3-HMAC-SHA256
//! canonical-request scheme (see [`signer`]). Hosts supply [`Credentials`]
//! explicitly on every operation; the crate keeps no global state and
//! persists nothing.

/// Provider HTTP client and the `FaceidApi` trait seam
pub mod client;

/// Caller-facing error taxonomy
pub mod error;

/// Status-polling state machine
pub mod poller;

/// Verification session issuance
pub mod session;

/// TC3-HMAC-SHA256 request signing
pub mod signer;

/// Core data types shared across the verification flow
pub mod types;

pub use client::{Action, ClientError, FaceidApi, ProviderClient};
pub use error::VerificationError;
pub use poller::StatusPoller;
pub use session::VerificationSession;
pub use types::{
    Credentials, PollOutcome, StartedVerification, VerificationRequest, VerificationStatus,
};
