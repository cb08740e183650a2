use std::{sync::Arc, time::Instant};

use {
    courier_channels::{SenderRegistry, SubscriptionStore},
    courier_delivery::Publisher,
    courier_signal::SignalIntegration,
    courier_telegram::TelegramIntegration,
    secrecy::Secret,
};

/// Everything the HTTP handlers reach into.
pub struct GatewayState {
    pub publisher: Arc<Publisher>,
    pub api_key: Secret<String>,
    pub telegram: Option<Arc<TelegramIntegration>>,
    pub signal: Option<SignalIntegration>,
    /// Reject encrypted web-push registrations on plain `http://` endpoints.
    pub require_https_for_encrypted: bool,
    pub version: String,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(publisher: Arc<Publisher>, api_key: Secret<String>) -> Self {
        Self {
            publisher,
            api_key,
            telegram: None,
            signal: None,
            require_https_for_encrypted: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn with_telegram(mut self, telegram: Arc<TelegramIntegration>) -> Self {
        self.telegram = Some(telegram);
        self
    }

    #[must_use]
    pub fn with_signal(mut self, signal: SignalIntegration) -> Self {
        self.signal = Some(signal);
        self
    }

    #[must_use]
    pub fn with_require_https_for_encrypted(mut self, require: bool) -> Self {
        self.require_https_for_encrypted = require;
        self
    }

    pub fn store(&self) -> &Arc<dyn SubscriptionStore> {
        self.publisher.store()
    }

    pub fn registry(&self) -> &Arc<SenderRegistry> {
        self.publisher.registry()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayState>,
}
