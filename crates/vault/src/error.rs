//! Vault error types.

use crate::credentials::IntegrationType;

/// Errors produced by credential store operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// No record exists for the integration, or it is disabled.
    #[error("integration {integration} not configured")]
    NotConfigured { integration: IntegrationType },

    /// A stored record failed authenticated decryption (tampered data or the
    /// API key changed since it was written).
    #[error("credentials corrupted for {integration}: {reason}")]
    Corrupted {
        integration: String,
        reason: String,
    },

    /// Encryption failed.
    #[error("cipher error: {0}")]
    Cipher(String),

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VaultError {
    #[must_use]
    pub fn not_configured(integration: IntegrationType) -> Self {
        Self::NotConfigured { integration }
    }

    #[must_use]
    pub fn corrupted(integration: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Corrupted {
            integration: integration.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether callers should treat this as "not linked" rather than a failure.
    #[must_use]
    pub fn is_not_configured(&self) -> bool {
        matches!(self, Self::NotConfigured { .. })
    }

    #[must_use]
    pub fn is_corrupted(&self) -> bool {
        matches!(self, Self::Corrupted { .. })
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
