//! Cipher trait for swappable authenticated encryption backends.

use crate::error::VaultError;

/// Authenticated encryption with associated data (AEAD) over a 256-bit key.
pub trait Cipher: Send + Sync {
    /// Encrypt `plaintext` with `key`, binding `aad` into the tag.
    ///
    /// Returns `[nonce || ciphertext || tag]`.
    fn encrypt(&self, key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, VaultError>;

    /// Decrypt a blob previously produced by [`encrypt`](Self::encrypt).
    fn decrypt(&self, key: &[u8; 32], ciphertext: &[u8], aad: &[u8])
    -> Result<Vec<u8>, VaultError>;
}
