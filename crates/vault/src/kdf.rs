//! scrypt key derivation for API key → record encryption key.

use zeroize::Zeroizing;

use crate::error::VaultError;

/// Application-level salt. Fixed so the same API key always yields the same
/// key across restarts.
pub const APP_SALT: &[u8] = b"courier-integration-salt-v1";

/// scrypt cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// log2 of the CPU/memory cost `N` (15 → N = 32768).
    pub log_n: u8,
    /// Block size.
    pub r: u32,
    /// Parallelism.
    pub p: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            log_n: 15,
            r: 8,
            p: 1,
        }
    }
}

/// Derive a 256-bit key from `password` and `salt` with scrypt.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    params: &KdfParams,
) -> Result<Zeroizing<[u8; 32]>, VaultError> {
    let scrypt_params = scrypt::Params::new(params.log_n, params.r, params.p, 32)
        .map_err(|e| VaultError::Kdf(format!("invalid scrypt params: {e}")))?;

    let mut output = Zeroizing::new([0u8; 32]);
    scrypt::scrypt(password, salt, &scrypt_params, output.as_mut())
        .map_err(|e| VaultError::Kdf(e.to_string()))?;

    Ok(output)
}
