//! Vault error types.

/// Errors produced while sealing or opening a token.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The blob was sealed with a PIN and none was supplied.
    #[error("a pin code is required to open this token")]
    PinRequired,

    /// The PIN is wrong or the blob was tampered with.
    #[error("incorrect pin code")]
    BadCredential,

    /// The blob is not something this crate produced.
    #[error("malformed sealed token: {0}")]
    Malformed(&'static str),

    #[error("unsupported sealed token version {0}")]
    UnsupportedVersion(u8),

    /// Key derivation or encryption failed.
    #[error("cipher error: {0}")]
    CipherError(String),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}
