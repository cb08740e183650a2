//! Config schema types.

use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub server: ServerConfig,
    /// Administrative API key. Guards the HTTP surface and seeds the key
    /// that encrypts stored integration credentials.
    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub storage: StorageConfig,
    pub delivery: DeliveryConfig,
    pub signal: SignalConfig,
    pub telegram: TelegramConfig,
    pub webpush: WebPushConfig,
}

impl CourierConfig {
    /// The API key, or an empty string when unset (validation rejects that).
    pub fn api_key(&self) -> &str {
        self.api_key
            .as_ref()
            .map(|k| k.expose_secret().as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "0.0.0.0".
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database holding apps, subscriptions and credentials.
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./data/courier.db"),
        }
    }
}

/// Per-subscription retry policy for the publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubled after each retry.
    pub base_delay_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 500,
        }
    }
}

/// Group messaging through a local `signal-cli` install.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub enabled: bool,
    pub cli_path: PathBuf,
    /// signal-cli data directory. Defaults to `~/.local/share/signal-cli`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_dir: Option<PathBuf>,
    /// Name shown for the linked device in the phone's device list.
    pub device_name: String,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cli_path: PathBuf::from("signal-cli"),
            config_dir: None,
            device_name: "Courier".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebPushConfig {
    /// VAPID `sub` claim (a `mailto:` or `https:` contact URI).
    pub subscriber: String,
    pub ttl_secs: u32,
    /// Reject encrypted registrations whose endpoint is plain `http`.
    pub require_https_for_encrypted: bool,
}

impl Default for WebPushConfig {
    fn default() -> Self {
        Self {
            subscriber: "mailto:admin@localhost".into(),
            ttl_secs: 86_400,
            require_https_for_encrypted: true,
        }
    }
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

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = CourierConfig::default();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.delivery.max_attempts, 10);
        assert_eq!(cfg.delivery.base_delay_ms, 500);
        assert_eq!(cfg.webpush.ttl_secs, 86_400);
        assert!(!cfg.signal.enabled);
        assert_eq!(cfg.api_key(), "");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: CourierConfig = toml::from_str(
            r#"
            api_key = "k"

            [telegram]
            enabled = true

            [delivery]
            max_attempts = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.api_key(), "k");
        assert!(cfg.telegram.enabled);
        assert_eq!(cfg.delivery.max_attempts, 3);
        assert_eq!(cfg.delivery.base_delay_ms, 500);
        assert_eq!(cfg.server.bind, "0.0.0.0");
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let cfg: CourierConfig = toml::from_str(r#"api_key = "hunter2""#).unwrap();
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }
}
