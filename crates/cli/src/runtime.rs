//! Wiring from a loaded config to a ready publisher and its integrations.

use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    courier_channels::{GroupCache, SenderRegistry, SqliteSubscriptionStore, SubscriptionStore},
    courier_config::CourierConfig,
    courier_delivery::{Publisher, RetryPolicy},
    courier_gateway::GatewayState,
    courier_signal::{SignalCli, SignalIntegration},
    courier_telegram::TelegramIntegration,
    courier_vault::CredentialStore,
    courier_webpush::{WebPushSender, WebPushSenderConfig},
    secrecy::Secret,
    sqlx::SqlitePool,
    tracing::{info, warn},
};

/// Open the database and bring every store's schema up to date.
pub async fn open_storage(config: &CourierConfig) -> anyhow::Result<SqlitePool> {
    let path = &config.storage.database_path;
    let pool = courier_common::db::open_pool(path)
        .await
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    courier_channels::run_migrations(&pool).await?;
    courier_vault::run_migrations(&pool).await?;
    Ok(pool)
}

pub struct Runtime {
    pub publisher: Arc<Publisher>,
    pub telegram: Option<Arc<TelegramIntegration>>,
    pub signal: Option<SignalIntegration>,
}

impl Runtime {
    /// Build the delivery core from `config` and restore linked integrations.
    ///
    /// Senders register in a fixed order (web push, Signal, Telegram), which
    /// is also the auto-subscribe priority.
    pub async fn build(config: &CourierConfig) -> anyhow::Result<Self> {
        let pool = open_storage(config).await?;
        let credentials = Arc::new(
            CredentialStore::new(pool.clone(), config.api_key())
                .await
                .context("failed to open credential store")?,
        );
        let store: Arc<dyn SubscriptionStore> = Arc::new(SqliteSubscriptionStore::new(pool.clone()));
        let registry = Arc::new(SenderRegistry::new());

        let webpush = WebPushSender::new(WebPushSenderConfig {
            subscriber: config.webpush.subscriber.clone(),
            ttl_secs: config.webpush.ttl_secs,
        })?;
        registry.register(Arc::new(webpush));

        let signal = if config.signal.enabled {
            let client = SignalCli::new(
                config.signal.cli_path.clone(),
                config.signal.config_dir.clone(),
            );
            let integration = SignalIntegration::new(
                Arc::new(client),
                Arc::clone(&credentials),
                Arc::clone(&store),
                Arc::new(GroupCache::new(pool.clone())),
                Arc::clone(&registry),
            )
            .with_device_name(config.signal.device_name.clone());
            match integration.restore().await {
                Ok(true) => info!("signal integration restored"),
                Ok(false) => info!("signal enabled but not linked"),
                Err(e) => warn!(error = %e, "failed to restore signal integration"),
            }
            Some(integration)
        } else {
            None
        };

        let telegram = if config.telegram.enabled {
            let integration = Arc::new(TelegramIntegration::new(
                Arc::clone(&credentials),
                Arc::clone(&store),
                Arc::clone(&registry),
            ));
            match integration.restore().await {
                Ok(true) => info!("telegram integration restored"),
                Ok(false) => info!("telegram enabled but not linked"),
                Err(e) => warn!(error = %e, "failed to restore telegram integration"),
            }
            Some(integration)
        } else {
            None
        };

        let policy = RetryPolicy::new(
            config.delivery.max_attempts,
            Duration::from_millis(config.delivery.base_delay_ms),
        );
        let publisher = Arc::new(Publisher::new(store, registry).with_policy(policy));

        Ok(Self {
            publisher,
            telegram,
            signal,
        })
    }

    pub fn into_gateway_state(self, config: &CourierConfig) -> GatewayState {
        let mut state = GatewayState::new(
            self.publisher,
            Secret::new(config.api_key().to_string()),
        )
        .with_require_https_for_encrypted(config.webpush.require_https_for_encrypted);
        if let Some(telegram) = self.telegram {
            state = state.with_telegram(telegram);
        }
        if let Some(signal) = self.signal {
            state = state.with_signal(signal);
        }
        state
    }
}
