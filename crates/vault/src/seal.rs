//! Sealed token format.
//!
//! Blob layout before base64:
//! `[version: 1][flags: 1][m_cost: 4][t_cost: 4][p_cost: 4][salt: 16][nonce: 24][ciphertext + tag]`
//! with integers little-endian. The KDF parameters travel with the blob so a
//! token sealed with older parameters can still be opened.

#[allow(deprecated)] // upstream generic-array 0.x deprecation
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use {
    base64::{Engine, engine::general_purpose::STANDARD},
    rand::RngCore,
    zeroize::Zeroizing,
};

use crate::{
    error::VaultError,
    kdf::{self, KdfParams, SALT_LEN},
};

pub const VERSION: u8 = 0x01;

const FLAG_PIN: u8 = 0b0000_0001;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 2 + 12 + SALT_LEN + NONCE_LEN;
const AAD: &[u8] = b"tgsync:bot_token";

/// Seals and opens bot tokens with a fixed set of KDF parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSealer {
    params: KdfParams,
}

impl TokenSealer {
    #[must_use]
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    /// Seal `plaintext`. Without a PIN the blob can be opened by anyone
    /// running this crate; with one, only by the PIN holder.
    #[allow(deprecated)]
    pub fn seal(&self, plaintext: &str, pin: Option<&str>) -> Result<String, VaultError> {
        let salt = kdf::generate_salt();
        let key = kdf::derive_key(pin, &salt, &self.params)?;
        let cipher = XChaCha20Poly1305::new((&*key).into());

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce_bytes), Payload {
                msg: plaintext.as_bytes(),
                aad: AAD,
            })
            .map_err(|e| VaultError::CipherError(e.to_string()))?;

        let mut blob = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        blob.push(VERSION);
        blob.push(if pin.is_some() { FLAG_PIN } else { 0 });
        blob.extend_from_slice(&self.params.m_cost.to_le_bytes());
        blob.extend_from_slice(&self.params.t_cost.to_le_bytes());
        blob.extend_from_slice(&self.params.p_cost.to_le_bytes());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }
}

/// Seal with the default KDF parameters.
pub fn seal_token(plaintext: &str, pin: Option<&str>) -> Result<String, VaultError> {
    TokenSealer::default().seal(plaintext, pin)
}

/// Open a blob produced by [`TokenSealer::seal`].
///
/// A PIN passed for a blob sealed without one is ignored.
#[allow(deprecated)]
pub fn open_token(sealed: &str, pin: Option<&str>) -> Result<Zeroizing<String>, VaultError> {
    let blob = STANDARD.decode(sealed.trim())?;
    let header = Header::parse(&blob)?;

    let pin = if header.needs_pin {
        Some(pin.ok_or(VaultError::PinRequired)?)
    } else {
        None
    };
    let key = kdf::derive_key(pin, header.salt, &header.params)?;
    let cipher = XChaCha20Poly1305::new((&*key).into());

    let plaintext = cipher
        .decrypt(XNonce::from_slice(header.nonce), Payload {
            msg: &blob[HEADER_LEN..],
            aad: AAD,
        })
        .map_err(|_| VaultError::BadCredential)?;

    String::from_utf8(plaintext)
        .map(Zeroizing::new)
        .map_err(|_| VaultError::Malformed("token is not valid utf-8"))
}

/// Whether opening `sealed` needs a PIN.
pub fn requires_pin(sealed: &str) -> Result<bool, VaultError> {
    let blob = STANDARD.decode(sealed.trim())?;
    Ok(Header::parse(&blob)?.needs_pin)
}

struct Header<'a> {
    needs_pin: bool,
    params: KdfParams,
    salt: &'a [u8],
    nonce: &'a [u8],
}

impl<'a> Header<'a> {
    fn parse(blob: &'a [u8]) -> Result<Self, VaultError> {
        if blob.len() < HEADER_LEN + TAG_LEN {
            return Err(VaultError::Malformed("sealed token too short"));
        }
        if blob[0] != VERSION {
            return Err(VaultError::UnsupportedVersion(blob[0]));
        }
        let u32_at = |offset: usize| {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&blob[offset..offset + 4]);
            u32::from_le_bytes(bytes)
        };
        let params = KdfParams {
            m_cost: u32_at(2),
            t_cost: u32_at(6),
            p_cost: u32_at(10),
        };
        if !params.within_limits() {
            return Err(VaultError::Malformed("kdf parameters out of range"));
        }
        let salt_start = 2 + 12;
        let nonce_start = salt_start + SALT_LEN;
        Ok(Self {
            needs_pin: blob[1] & FLAG_PIN != 0,
            params,
            salt: &blob[salt_start..nonce_start],
            nonce: &blob[nonce_start..HEADER_LEN],
        })
    }
}
