use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("signal-cli not found (looked for {path})")]
    NotInstalled { path: PathBuf },

    #[error("no linked signal account")]
    NotLinked,

    #[error("signal-cli: {message}")]
    Cli { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Channel(#[from] courier_channels::Error),

    #[error(transparent)]
    Vault(#[from] courier_vault::VaultError),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn cli(message: impl Into<String>) -> Self {
        Self::Cli {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl courier_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

impl From<Error> for courier_channels::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Channel(inner) => inner,
            Error::NotInstalled { .. } | Error::NotLinked => Self::unavailable(err),
            other => Self::external("signal", other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

courier_common::impl_context!();
