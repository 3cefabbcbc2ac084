//! TC3-HMAC-SHA256 request signing for the Tencent Cloud API.
//!
//! Pure functions, no I/O. The scheme is byte-exact: header casing, newline
//! placement and the hex/binary split in the key derivation all feed the
//! final signature, and the provider rejects any deviation with a
//! signature-mismatch error. A wrong signature is a programming defect, not
//! a transient fault, so nothing here is retried.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::types::Credentials;

type HmacSha256 = Hmac<Sha256>;

/// Signature algorithm identifier sent in the Authorization header.
pub const ALGORITHM: &str = "TC3-HMAC-SHA256";

/// Provider API host; also the signed `host` header value.
pub const ENDPOINT_HOST: &str = "faceid.tencentcloudapi.com";

/// Provider service name used in the credential scope.
pub const SERVICE: &str = "faceid";

/// Content type of every request; part of the signed headers.
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";

const SIGNED_HEADERS: &str = "content-type;host";
const SCOPE_SUFFIX: &str = "tc3_request";

/// A fully signed outbound request.
///
/// Bound to the exact (payload, timestamp) pair it was built from; never
/// cached or reused across requests.
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    /// HTTP method, always `POST`
    pub method: &'static str,
    /// Request URI, always `/`
    pub uri: &'static str,
    /// Signed `content-type` header value
    pub content_type: &'static str,
    /// Signed `host` header value
    pub host: &'static str,
    /// Lowercase hex SHA-256 of the raw JSON payload
    pub payload_hash: String,
    /// Unix timestamp the signature is bound to
    pub timestamp: i64,
    /// Complete `Authorization` header value
    pub authorization: String,
}

/// Signs one request payload at the given instant.
///
/// Implements the provider's canonical-request scheme:
/// 1. hash the payload into a canonical request string,
/// 2. build the string-to-sign from the timestamp and the per-date
///    credential scope,
/// 3. derive the signing key by HMAC-chaining date, service and scope
///    suffix (binary output at every step),
/// 4. hex-encode the final HMAC and assemble the Authorization header.
#[must_use]
pub fn sign(credentials: &Credentials, payload: &str, now: DateTime<Utc>) -> SignedEnvelope {
    let timestamp = now.timestamp();
    let date = now.format("%Y-%m-%d").to_string();

    let payload_hash = sha256_hex(payload.as_bytes());
    let canonical_request = format!(
        "POST\n/\n\ncontent-type:{CONTENT_TYPE}\nhost:{ENDPOINT_HOST}\n\n{SIGNED_HEADERS}\n{payload_hash}"
    );

    let credential_scope = format!("{date}/{SERVICE}/{SCOPE_SUFFIX}");
    let hashed_canonical_request = sha256_hex(canonical_request.as_bytes());
    let string_to_sign =
        format!("{ALGORITHM}\n{timestamp}\n{credential_scope}\n{hashed_canonical_request}");

    let key = signing_key(&credentials.secret_key, &date);
    let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

    let authorization = format!(
        "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
        credentials.secret_id
    );

    SignedEnvelope {
        method: "POST",
        uri: "/",
        content_type: CONTENT_TYPE,
        host: ENDPOINT_HOST,
        payload_hash,
        timestamp,
        authorization,
    }
}

/// Derives the per-date signing key: `HMAC(HMAC(HMAC("TC3" + secret, date),
/// service), "tc3_request")`, binary at each step.
fn signing_key(secret_key: &str, date: &str) -> Vec<u8> {
    let secret_date = hmac_sha256(format!("TC3{secret_key}").as_bytes(), date.as_bytes());
    let secret_service = hmac_sha256(&secret_date, SERVICE.as_bytes());
    hmac_sha256(&secret_service, SCOPE_SUFFIX.as_bytes())
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC-SHA256 accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC key of any length is valid");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
