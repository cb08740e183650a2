//! ChaCha20-Poly1305 implementation of the [`Cipher`] trait.

#[allow(deprecated)] // upstream generic-array 0.x deprecation
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::RngCore;

use crate::{error::VaultError, traits::Cipher};

/// Nonce size for ChaCha20-Poly1305 (12 bytes).
pub const NONCE_LEN: usize = 12;

/// Poly1305 tag size.
const TAG_LEN: usize = 16;

/// ChaCha20-Poly1305 AEAD cipher.
///
/// Encrypted blob layout: `[nonce: 12 bytes][ciphertext + Poly1305 tag: N + 16 bytes]`.
/// A fresh random nonce is drawn for every encryption.
pub struct ChaCha20Poly1305Cipher;

impl Cipher for ChaCha20Poly1305Cipher {
    #[allow(deprecated)]
    fn encrypt(&self, key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, VaultError> {
        let cipher = ChaCha20Poly1305::new(key.into());

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, Payload {
                msg: plaintext,
                aad,
            })
            .map_err(|e| VaultError::Cipher(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    #[allow(deprecated)]
    fn decrypt(
        &self,
        key: &[u8; 32],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::Cipher("ciphertext too short".to_string()));
        }

        let (nonce_bytes, ct) = ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let cipher = ChaCha20Poly1305::new(key.into());

        cipher
            .decrypt(nonce, Payload { msg: ct, aad })
            .map_err(|e| VaultError::Cipher(e.to_string()))
    }
}
