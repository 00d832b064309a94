//! Bot token sealing.
//!
//! The token is encrypted with XChaCha20-Poly1305 under a key derived by
//! Argon2id from the user's PIN, or from a built-in passphrase when no PIN is
//! configured. Opening a PIN-sealed token without the PIN fails with
//! [`VaultError::PinRequired`]; with the wrong PIN, [`VaultError::BadCredential`].

pub mod error;
pub mod kdf;
pub mod seal;

pub use {
    error::VaultError,
    kdf::KdfParams,
    seal::{TokenSealer, open_token, requires_pin, seal_token},
};
