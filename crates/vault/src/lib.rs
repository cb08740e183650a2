//! Encrypted store for integration credentials (bot tokens, linked accounts,
//! mail passwords).
//!
//! A single 256-bit key is derived once per process from the administrative
//! API key with scrypt. Every record is sealed with ChaCha20-Poly1305 under
//! that key, so rotating the API key revokes all stored secrets. The
//! [`CredentialStore`] purges everything when any record fails to decrypt.

pub mod chacha20;
pub mod credentials;
pub mod error;
pub mod kdf;
pub mod store;
pub mod traits;

pub use {
    chacha20::ChaCha20Poly1305Cipher,
    credentials::{
        IntegrationCredentials, IntegrationType, MailCredentials, SignalCredentials,
        TelegramCredentials,
    },
    error::{Result, VaultError},
    kdf::KdfParams,
    store::{CredentialRecord, CredentialStore},
    traits::Cipher,
};

/// Run database migrations for the vault crate.
///
/// Creates the `integration_credentials` table. Must run before a
/// [`CredentialStore`] is constructed on the pool.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
