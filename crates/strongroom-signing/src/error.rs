//! Error types for cookie signing.

/// Errors produced while signing or verifying a cookie token.
///
/// The session factory never shows these to its caller: any verification
/// failure simply means "this request has no usable session cookie".
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// The token does not have the `payload.signature` shape, or one of
    /// its halves is not valid base64.
    #[error("malformed signed token")]
    Malformed,

    /// The signature does not match the payload for this secret.
    /// Either the cookie was tampered with or it was signed with a
    /// different secret.
    #[error("signature mismatch")]
    BadSignature,

    /// The secret could not be used as an HMAC key.
    #[error("invalid signing key")]
    InvalidKey,

    /// The payload could not be converted to or from JSON.
    #[error("payload encoding failed: {0}")]
    Payload(#[from] serde_json::Error),
}
