use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    #[error(transparent)]
    Channel(#[from] courier_channels::Error),

    #[error(transparent)]
    Vault(#[from] courier_vault::VaultError),

    #[error("{message}")]
    Message { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

impl From<Error> for courier_channels::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Channel(inner) => inner,
            Error::Message { message } => Self::unavailable(message),
            other => Self::external("telegram", other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
