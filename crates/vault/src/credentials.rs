//! Typed credential records, one per integration.

use std::{fmt, str::FromStr};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize, de::DeserializeOwned},
};

/// Integrations that keep secrets in the credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationType {
    Signal,
    Telegram,
    Mail,
}

impl IntegrationType {
    pub const ALL: [Self; 3] = [Self::Signal, Self::Telegram, Self::Mail];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signal => "signal",
            Self::Telegram => "telegram",
            Self::Mail => "mail",
        }
    }
}

impl fmt::Display for IntegrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signal" => Ok(Self::Signal),
            "telegram" => Ok(Self::Telegram),
            "mail" => Ok(Self::Mail),
            other => Err(format!("unknown integration type: {other}")),
        }
    }
}

/// A credential payload bound to one integration type.
///
/// The integration name doubles as the record key and the AEAD associated
/// data, so a blob stored for one integration never decrypts as another.
pub trait IntegrationCredentials: Serialize + DeserializeOwned + Send + Sync {
    const INTEGRATION: IntegrationType;
}

/// A linked signal-cli account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalCredentials {
    pub phone_number: String,
    #[serde(default)]
    pub linked: bool,
}

impl IntegrationCredentials for SignalCredentials {
    const INTEGRATION: IntegrationType = IntegrationType::Signal;
}

/// Telegram bot token and the chat it posts to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramCredentials {
    #[serde(serialize_with = "serialize_secret")]
    pub bot_token: Secret<String>,
    /// Filled in once the operator has messaged the bot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
}

impl IntegrationCredentials for TelegramCredentials {
    const INTEGRATION: IntegrationType = IntegrationType::Telegram;
}

/// Mail account used by the mail integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailCredentials {
    pub email: String,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub password: Option<Secret<String>>,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_token: Option<Secret<String>>,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_token: Option<Secret<String>>,
    /// Resume point for the mailbox event stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_id: Option<String>,
}

impl IntegrationCredentials for MailCredentials {
    const INTEGRATION: IntegrationType = IntegrationType::Mail;
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_str(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}
