//! Argon2id key derivation for PIN → token key.

use {argon2::Argon2, rand::RngCore, zeroize::Zeroizing};

use crate::error::VaultError;

/// Passphrase used when the token is sealed without a PIN. This only keeps the
/// token out of the config file in clear text; it is not a secret.
const BUILTIN_PASSPHRASE: &[u8] = b"tgsync/bot-token/v1";

pub const SALT_LEN: usize = 16;

/// Argon2id parameters, stored in every sealed blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 19_456, // 19 MiB
            t_cost: 2,
            p_cost: 1,
        }
    }
}

impl KdfParams {
    /// Whether these parameters stay within four times the defaults. Blobs
    /// carrying anything larger are rejected before any key derivation.
    #[must_use]
    pub fn within_limits(&self) -> bool {
        let max = Self::default();
        self.m_cost <= max.m_cost.saturating_mul(4)
            && self.t_cost <= max.t_cost.saturating_mul(4)
            && self.p_cost <= max.p_cost.saturating_mul(4)
    }
}

/// Derive a 256-bit key from an optional PIN and a salt.
pub fn derive_key(
    pin: Option<&str>,
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; 32]>, VaultError> {
    let argon2_params = argon2::Params::new(params.m_cost, params.t_cost, params.p_cost, Some(32))
        .map_err(|e| VaultError::CipherError(format!("invalid KDF params: {e}")))?;
    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2_params,
    );

    let password = pin.map_or(BUILTIN_PASSPHRASE, str::as_bytes);
    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password, salt, output.as_mut())
        .map_err(|e| VaultError::CipherError(format!("KDF failed: {e}")))?;
    Ok(output)
}

pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
