//! Linking and unlinking the Telegram bot.

use std::sync::Arc;

use {
    courier_channels::{Channel, SenderRegistry, SubscriptionStore},
    courier_vault::{CredentialStore, IntegrationType, TelegramCredentials},
    secrecy::{ExposeSecret, Secret},
    tracing::{info, warn},
};

use crate::{
    Error, Result,
    bot::{BotConnector, TeloxideConnector},
    sender::TelegramSender,
};

/// Owns the Telegram link lifecycle: credentials in the vault and the
/// sender in the registry always change together.
pub struct TelegramIntegration {
    credentials: Arc<CredentialStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    registry: Arc<SenderRegistry>,
    connector: Arc<dyn BotConnector>,
}

impl TelegramIntegration {
    pub fn new(
        credentials: Arc<CredentialStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        registry: Arc<SenderRegistry>,
    ) -> Self {
        Self::with_connector(credentials, subscriptions, registry, Arc::new(TeloxideConnector))
    }

    pub fn with_connector(
        credentials: Arc<CredentialStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        registry: Arc<SenderRegistry>,
        connector: Arc<dyn BotConnector>,
    ) -> Self {
        Self {
            credentials,
            subscriptions,
            registry,
            connector,
        }
    }

    /// Verify `bot_token`, persist it with `chat_id`, and start delivering.
    pub async fn link(&self, bot_token: Secret<String>, chat_id: i64) -> Result<()> {
        if bot_token.expose_secret().trim().is_empty() {
            return Err(Error::Channel(courier_channels::Error::invalid_input(
                "bot_token is required",
            )));
        }
        if chat_id == 0 {
            return Err(Error::Channel(courier_channels::Error::invalid_input(
                "chat_id is required",
            )));
        }

        let bot = self.connector.connect(&bot_token).await?;
        self.credentials
            .save_telegram(&TelegramCredentials {
                bot_token,
                chat_id: Some(chat_id),
            })
            .await?;
        self.registry.register(Arc::new(TelegramSender::new(
            bot,
            Some(chat_id),
            Arc::clone(&self.subscriptions),
        )));

        info!(chat_id, "telegram linked");
        Ok(())
    }

    /// Forget the bot. Its subscriptions are deleted since no other bot can
    /// post to them. Returns the number of subscriptions removed.
    pub async fn unlink(&self) -> Result<u64> {
        let had_credentials = self
            .credentials
            .delete_integration(IntegrationType::Telegram)
            .await?;
        let had_sender = self.registry.deregister(Channel::Telegram);
        let removed = self
            .subscriptions
            .delete_subscriptions_by_channel(Channel::Telegram)
            .await?;

        info!(had_credentials, had_sender, removed, "telegram unlinked");
        Ok(removed)
    }

    /// Re-register the sender from stored credentials at startup.
    ///
    /// Returns `false` when nothing is linked. A token the Bot API no longer
    /// accepts is logged and left in place for the operator to relink.
    pub async fn restore(&self) -> Result<bool> {
        let credentials = match self.credentials.get_telegram().await {
            Ok(credentials) => credentials,
            Err(e) if e.is_not_configured() => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let bot = match self.connector.connect(&credentials.bot_token).await {
            Ok(bot) => bot,
            Err(e) => {
                warn!(error = %e, "stored telegram token failed verification");
                return Ok(false);
            },
        };
        self.registry.register(Arc::new(TelegramSender::new(
            bot,
            credentials.chat_id,
            Arc::clone(&self.subscriptions),
        )));

        info!(chat_id = ?credentials.chat_id, "telegram sender restored");
        Ok(true)
    }

    /// Chat id saved with the current link, if any.
    pub async fn default_chat_id(&self) -> Result<Option<i64>> {
        match self.credentials.get_telegram().await {
            Ok(credentials) => Ok(credentials.chat_id.filter(|id| *id != 0)),
            Err(e) if e.is_not_configured() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
