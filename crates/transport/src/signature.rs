//! Webhook signature verification.
//!
//! Mailgun signs every webhook with an HMAC-SHA256 of `timestamp + token`
//! keyed by the account API key, hex-encoded.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex-encoded signature Mailgun attaches to a webhook.
pub fn compute_signature(api_key: &str, timestamp: &str, token: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(api_key.as_bytes()).expect("HMAC can accept any key length");
    mac.update(timestamp.as_bytes());
    mac.update(token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a webhook signature, returning `false` straight away when any of
/// `token`, `timestamp` or `signature` is empty.
///
/// The comparison is a plain string equality, not a constant-time one.
pub fn verify_signature(api_key: &str, token: &str, timestamp: &str, signature: &str) -> bool {
    if token.is_empty() || timestamp.is_empty() || signature.is_empty() {
        return false;
    }
    signature == compute_signature(api_key, timestamp, token)
}
