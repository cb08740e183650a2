use std::sync::Arc;

use {
    async_trait::async_trait,
    courier_channels::{
        AutoSubscribe, Channel, ChannelSender, DeliveryError, LinkStatus, NewSubscription,
        Subscription, SubscriptionStore, SubscriptionTarget, TelegramChat,
    },
    courier_common::Notification,
    tracing::{debug, info},
};

use crate::{
    bot::{BotApi, classify_request_error},
    format::render_notification,
};

/// Sender for [`Channel::Telegram`] subscriptions through one linked bot.
pub struct TelegramSender {
    bot: Arc<dyn BotApi>,
    /// Chat used for auto-subscribed apps.
    default_chat_id: Option<i64>,
    store: Arc<dyn SubscriptionStore>,
}

impl TelegramSender {
    pub fn new(
        bot: Arc<dyn BotApi>,
        default_chat_id: Option<i64>,
        store: Arc<dyn SubscriptionStore>,
    ) -> Self {
        Self {
            bot,
            default_chat_id: default_chat_id.filter(|id| *id != 0),
            store,
        }
    }

    pub fn default_chat_id(&self) -> Option<i64> {
        self.default_chat_id
    }
}

#[async_trait]
impl ChannelSender for TelegramSender {
    fn channel(&self) -> Channel {
        Channel::Telegram
    }

    async fn send(
        &self,
        subscription: &Subscription,
        notification: &Notification,
    ) -> Result<(), DeliveryError> {
        let SubscriptionTarget::Telegram(TelegramChat { chat_id }) = subscription.target else {
            return Err(DeliveryError::permanent(format!(
                "subscription {} is not a telegram subscription",
                subscription.id
            )));
        };
        if chat_id == 0 {
            return Err(DeliveryError::permanent(format!(
                "subscription {} has no chat id",
                subscription.id
            )));
        }

        let text = render_notification(&subscription.app_name, notification);
        self.bot
            .send_html(chat_id, &text)
            .await
            .map_err(classify_request_error)?;

        debug!(subscription_id = %subscription.id, chat_id, "telegram message sent");
        Ok(())
    }

    fn link_status(&self) -> Option<&dyn LinkStatus> {
        Some(self)
    }

    fn auto_subscriber(&self) -> Option<&dyn AutoSubscribe> {
        Some(self)
    }
}

#[async_trait]
impl LinkStatus for TelegramSender {
    async fn is_linked(&self) -> courier_channels::Result<bool> {
        Ok(self.default_chat_id.is_some())
    }
}

#[async_trait]
impl AutoSubscribe for TelegramSender {
    async fn can_auto_subscribe(&self) -> courier_channels::Result<()> {
        if self.default_chat_id.is_none() {
            return Err(courier_channels::Error::unavailable(
                "telegram is linked without a chat id",
            ));
        }
        Ok(())
    }

    async fn auto_subscribe(&self, app_name: &str) -> courier_channels::Result<String> {
        let chat_id = self.default_chat_id.ok_or_else(|| {
            courier_channels::Error::unavailable("telegram is linked without a chat id")
        })?;

        let id = self
            .store
            .add_subscription(NewSubscription::new(
                app_name,
                SubscriptionTarget::Telegram(TelegramChat { chat_id }),
            ))
            .await?;

        info!(app = app_name, subscription_id = %id, chat_id, "auto-subscribed app to telegram");
        Ok(id)
    }
}
