//! URL signing for the static-map endpoint.
//!
//! When a signing secret is configured, the provider requires a `signature`
//! query parameter: the HMAC-SHA1 of the canonical `path?query` string,
//! keyed with the base64url-decoded secret and emitted base64url-encoded.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use thiserror::Error;

type HmacSha1 = Hmac<Sha1>;

/// Failure to produce a URL signature.
#[derive(Debug, Clone, Error)]
pub enum SigningError {
    /// The configured secret is not valid base64url.
    #[error("signing secret is not valid base64url: {0}")]
    InvalidSecret(String),
}

/// Signs a canonical `path?query` string with a base64url-encoded secret.
///
/// Returns the base64url-encoded HMAC-SHA1 digest, ready to be appended as
/// the `signature` query parameter. The input must be the exact resource
/// string the provider will see: URL-encoded, parameters in insertion order.
pub fn sign_path_query(path_query: &str, secret_b64url: &str) -> Result<String, SigningError> {
    let key = URL_SAFE
        .decode(secret_b64url)
        .map_err(|e| SigningError::InvalidSecret(e.to_string()))?;

    // HMAC accepts keys of any length; new_from_slice cannot fail for SHA1.
    let mut mac = HmacSha1::new_from_slice(&key)
        .map_err(|e| SigningError::InvalidSecret(e.to_string()))?;
    mac.update(path_query.as_bytes());

    Ok(URL_SAFE.encode(mac.finalize().into_bytes()))
}
