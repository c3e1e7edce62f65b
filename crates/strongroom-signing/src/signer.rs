//! HMAC-SHA256 token signing and the [`CookieSigner`] seam.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Serialize, de::DeserializeOwned};
use sha2::Sha256;

use crate::SigningError;

type HmacSha256 = Hmac<Sha256>;

/// Serializes `value` to JSON and signs it with `secret`.
///
/// The output only uses the URL-safe base64 alphabet plus one `.`, so it
/// can be placed in a cookie without quoting.
///
/// # Errors
/// - [`SigningError::Payload`] if `value` cannot be serialized.
/// - [`SigningError::InvalidKey`] if the secret is rejected as a key.
pub fn signed_serialize<T: Serialize>(
    value: &T,
    secret: &str,
) -> Result<String, SigningError> {
    let json = serde_json::to_vec(value)?;
    let payload = URL_SAFE_NO_PAD.encode(json);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SigningError::InvalidKey)?;
    mac.update(payload.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{payload}.{signature}"))
}

/// Verifies a token produced by [`signed_serialize`] and decodes its value.
///
/// The signature is checked in constant time before the payload is parsed.
///
/// # Errors
/// - [`SigningError::Malformed`] if the token is not `payload.signature`
///   or is not base64.
/// - [`SigningError::BadSignature`] if it was not signed with `secret`.
/// - [`SigningError::Payload`] if the signed payload is not a `T`.
pub fn signed_deserialize<T: DeserializeOwned>(
    token: &str,
    secret: &str,
) -> Result<T, SigningError> {
    let (payload, signature) =
        token.rsplit_once('.').ok_or(SigningError::Malformed)?;
    if payload.is_empty() || signature.is_empty() {
        return Err(SigningError::Malformed);
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| SigningError::Malformed)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SigningError::InvalidKey)?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| SigningError::BadSignature)?;

    let json = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| SigningError::Malformed)?;
    Ok(serde_json::from_slice(&json)?)
}

// ---------------------------------------------------------------------------
// CookieSigner
// ---------------------------------------------------------------------------

/// Signs and verifies string cookie values.
///
/// The session factory depends on this trait rather than on the functions
/// above, so an application that already has a cookie-signing scheme
/// (shared with another service, say) can keep using it.
///
/// Signers are captured by response callbacks, which may run on any thread.
pub trait CookieSigner: Send + Sync + 'static {
    /// Produces a signed token wrapping `value`.
    fn sign(&self, value: &str, secret: &str) -> Result<String, SigningError>;

    /// Returns the value inside `token` if it was signed with `secret`.
    fn verify(&self, token: &str, secret: &str)
    -> Result<String, SigningError>;
}

/// The default [`CookieSigner`]: JSON payload, HMAC-SHA256 signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSigner;

impl CookieSigner for HmacSigner {
    fn sign(&self, value: &str, secret: &str) -> Result<String, SigningError> {
        signed_serialize(&value, secret)
    }

    fn verify(
        &self,
        token: &str,
        secret: &str,
    ) -> Result<String, SigningError> {
        signed_deserialize(token, secret)
    }
}
