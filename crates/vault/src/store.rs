//! SQLite-backed credential store.

use {
    courier_common::db::retry_busy,
    sqlx::SqlitePool,
    tracing::{info, warn},
    zeroize::Zeroizing,
};

use crate::{
    chacha20::ChaCha20Poly1305Cipher,
    credentials::{
        IntegrationCredentials, IntegrationType, MailCredentials, SignalCredentials,
        TelegramCredentials,
    },
    error::{Result, VaultError},
    kdf::{self, KdfParams},
    traits::Cipher,
};

/// Record metadata, without the secret payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub integration: String,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    integration_type: String,
    enabled: i64,
    created_at: String,
    updated_at: String,
}

impl From<RecordRow> for CredentialRecord {
    fn from(r: RecordRow) -> Self {
        Self {
            integration: r.integration_type,
            enabled: r.enabled != 0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Encrypted per-integration credentials.
///
/// The encryption key is derived once at construction. Construction also
/// checks that every stored record still decrypts and purges the whole table
/// when one does not, so a changed API key never leaves stale secrets behind.
pub struct CredentialStore<C: Cipher = ChaCha20Poly1305Cipher> {
    pool: SqlitePool,
    cipher: C,
    key: Zeroizing<[u8; 32]>,
}

impl CredentialStore<ChaCha20Poly1305Cipher> {
    /// Open the store with production scrypt parameters.
    pub async fn new(pool: SqlitePool, api_key: &str) -> Result<Self> {
        Self::with_params(pool, api_key, KdfParams::default()).await
    }

    /// Open the store with explicit KDF parameters.
    pub async fn with_params(pool: SqlitePool, api_key: &str, params: KdfParams) -> Result<Self> {
        let password = Zeroizing::new(api_key.as_bytes().to_vec());
        let key = tokio::task::spawn_blocking(move || {
            kdf::derive_key(&password, kdf::APP_SALT, &params)
        })
        .await
        .map_err(|e| VaultError::Kdf(format!("derivation task failed: {e}")))??;

        let store = Self {
            pool,
            cipher: ChaCha20Poly1305Cipher,
            key,
        };
        store.verify_or_purge().await?;
        Ok(store)
    }
}

impl<C: Cipher> CredentialStore<C> {
    /// Encrypt and upsert credentials. Saving re-enables a disabled record.
    pub async fn save<T: IntegrationCredentials>(&self, credentials: &T) -> Result<()> {
        let integration = T::INTEGRATION.as_str();
        let plaintext = Zeroizing::new(serde_json::to_vec(credentials)?);
        let blob = self
            .cipher
            .encrypt(&self.key, &plaintext, integration.as_bytes())?;

        retry_busy("save credentials", || {
            sqlx::query(
                "INSERT INTO integration_credentials (integration_type, credentials_encrypted, enabled)
                 VALUES (?, ?, 1)
                 ON CONFLICT(integration_type) DO UPDATE SET
                    credentials_encrypted = excluded.credentials_encrypted,
                    enabled = 1,
                    updated_at = datetime('now')",
            )
            .bind(integration)
            .bind(blob.as_slice())
            .execute(&self.pool)
        })
        .await?;

        info!(integration, "credentials saved");
        Ok(())
    }

    /// Load and decrypt credentials.
    ///
    /// Returns [`VaultError::NotConfigured`] when no record exists or it is
    /// disabled, and [`VaultError::Corrupted`] when it fails to decrypt.
    pub async fn get<T: IntegrationCredentials>(&self) -> Result<T> {
        let integration = T::INTEGRATION;
        let row: Option<(Vec<u8>, i64)> = sqlx::query_as(
            "SELECT credentials_encrypted, enabled FROM integration_credentials WHERE integration_type = ?",
        )
        .bind(integration.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some((blob, enabled)) = row else {
            return Err(VaultError::not_configured(integration));
        };
        if enabled == 0 {
            return Err(VaultError::not_configured(integration));
        }

        let plaintext = Zeroizing::new(
            self.cipher
                .decrypt(&self.key, &blob, integration.as_str().as_bytes())
                .map_err(|e| VaultError::corrupted(integration.as_str(), e))?,
        );
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Remove one integration's record. Returns whether a record existed.
    pub async fn delete_integration(&self, integration: IntegrationType) -> Result<bool> {
        let result = retry_busy("delete credentials", || {
            sqlx::query("DELETE FROM integration_credentials WHERE integration_type = ?")
                .bind(integration.as_str())
                .execute(&self.pool)
        })
        .await?;
        let existed = result.rows_affected() > 0;
        if existed {
            info!(%integration, "credentials deleted");
        }
        Ok(existed)
    }

    /// Whether a record exists and is enabled.
    pub async fn is_enabled(&self, integration: IntegrationType) -> Result<bool> {
        let enabled: Option<i64> = sqlx::query_scalar(
            "SELECT enabled FROM integration_credentials WHERE integration_type = ?",
        )
        .bind(integration.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(enabled.is_some_and(|e| e != 0))
    }

    /// Toggle a record without touching its payload. Returns whether a record
    /// existed.
    pub async fn set_enabled(&self, integration: IntegrationType, enabled: bool) -> Result<bool> {
        let result = retry_busy("toggle credentials", || {
            sqlx::query(
                "UPDATE integration_credentials SET enabled = ?, updated_at = datetime('now')
                 WHERE integration_type = ?",
            )
            .bind(enabled)
            .bind(integration.as_str())
            .execute(&self.pool)
        })
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Metadata for every stored record, ordered by integration name.
    pub async fn list(&self) -> Result<Vec<CredentialRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(
            "SELECT integration_type, enabled, created_at, updated_at
             FROM integration_credentials ORDER BY integration_type",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Delete every record. Returns how many were removed.
    pub async fn clear_all(&self) -> Result<u64> {
        let result = retry_busy("clear credentials", || {
            sqlx::query("DELETE FROM integration_credentials").execute(&self.pool)
        })
        .await?;
        Ok(result.rows_affected())
    }

    /// Check that every stored record decrypts under the current key.
    ///
    /// Disabled records are checked too. Only authentication is verified; the
    /// payload is not parsed.
    pub async fn check_integrity(&self) -> Result<()> {
        let rows: Vec<(String, Vec<u8>)> = sqlx::query_as(
            "SELECT integration_type, credentials_encrypted FROM integration_credentials",
        )
        .fetch_all(&self.pool)
        .await?;

        for (integration, blob) in rows {
            self.cipher
                .decrypt(&self.key, &blob, integration.as_bytes())
                .map(Zeroizing::new)
                .map_err(|e| VaultError::corrupted(integration.as_str(), e))?;
        }
        Ok(())
    }

    /// Run [`check_integrity`](Self::check_integrity) and clear the store when
    /// a record is corrupted. Returns `true` when records were purged.
    pub async fn verify_or_purge(&self) -> Result<bool> {
        match self.check_integrity().await {
            Ok(()) => Ok(false),
            Err(VaultError::Corrupted {
                integration,
                reason,
            }) => {
                warn!(
                    %integration,
                    %reason,
                    "stored credentials cannot be decrypted, the API key may have changed"
                );
                let removed = self.clear_all().await?;
                warn!(
                    removed,
                    "cleared all integration credentials, integrations must be linked again"
                );
                Ok(true)
            },
            Err(e) => Err(e),
        }
    }

    pub async fn save_signal(&self, credentials: &SignalCredentials) -> Result<()> {
        self.save(credentials).await
    }

    pub async fn get_signal(&self) -> Result<SignalCredentials> {
        self.get().await
    }

    pub async fn save_telegram(&self, credentials: &TelegramCredentials) -> Result<()> {
        self.save(credentials).await
    }

    pub async fn get_telegram(&self) -> Result<TelegramCredentials> {
        self.get().await
    }

    pub async fn save_mail(&self, credentials: &MailCredentials) -> Result<()> {
        self.save(credentials).await
    }

    pub async fn get_mail(&self) -> Result<MailCredentials> {
        self.get().await
    }
}
