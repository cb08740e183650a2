use std::error::Error as StdError;

/// Crate-wide result type for channel and subscription operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed channel errors shared across channel traits and stores.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input payload or parameter is invalid.
    #[error("invalid channel input: {message}")]
    InvalidInput { message: String },

    /// A stored row does not describe a valid subscription.
    #[error("invalid subscription row {id}: {message}")]
    InvalidRow { id: String, message: String },

    /// Operation is currently unavailable (not linked/not configured).
    #[error("channel operation unavailable: {message}")]
    Unavailable { message: String },

    /// Wrapped source error from an external dependency.
    #[error("channel operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_row(id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::InvalidRow {
            id: id.into(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Outcome of a failed [`ChannelSender::send`](crate::ChannelSender::send).
///
/// The classification belongs to the sender: permanent means retrying cannot
/// help (no linked account, malformed subscription data), everything else is
/// transient and subject to the publisher's backoff.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("permanent delivery failure: {message}")]
    Permanent {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    #[error("delivery failed: {message}")]
    Transient {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl DeliveryError {
    #[must_use]
    pub fn permanent(message: impl std::fmt::Display) -> Self {
        Self::Permanent {
            message: message.to_string(),
            source: None,
        }
    }

    #[must_use]
    pub fn transient(message: impl std::fmt::Display) -> Self {
        Self::Transient {
            message: message.to_string(),
            source: None,
        }
    }

    #[must_use]
    pub fn permanent_from(
        context: impl std::fmt::Display,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Permanent {
            message: format!("{context}: {source}"),
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub fn transient_from(
        context: impl std::fmt::Display,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Transient {
            message: format!("{context}: {source}"),
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent { .. })
    }
}
