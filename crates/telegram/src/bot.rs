use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    courier_channels::DeliveryError,
    secrecy::{ExposeSecret, Secret},
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{ChatId, ParseMode},
    },
    tracing::info,
};

use crate::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The subset of the Bot API the relay uses.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Send an HTML-formatted message to `chat_id`.
    async fn send_html(&self, chat_id: i64, text: &str) -> std::result::Result<(), RequestError>;
}

/// Produces a verified [`BotApi`] for a token.
#[async_trait]
pub trait BotConnector: Send + Sync {
    /// Build a client for `token` and check it against the Bot API.
    async fn connect(&self, token: &Secret<String>) -> Result<Arc<dyn BotApi>>;
}

/// [`BotApi`] backed by teloxide.
pub struct TeloxideBot {
    bot: Bot,
}

#[async_trait]
impl BotApi for TeloxideBot {
    async fn send_html(&self, chat_id: i64, text: &str) -> std::result::Result<(), RequestError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}

/// Connects to the real Bot API and verifies the token with `getMe`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TeloxideConnector;

#[async_trait]
impl BotConnector for TeloxideConnector {
    async fn connect(&self, token: &Secret<String>) -> Result<Arc<dyn BotApi>> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::external("telegram http client", e))?;
        let bot = Bot::with_client(token.expose_secret(), client);

        let me = bot.get_me().await?;
        info!(username = ?me.username, "telegram bot verified");

        Ok(Arc::new(TeloxideBot { bot }))
    }
}

/// Map a Bot API failure onto the publisher's retry classification.
///
/// Only rejections tied to the chat, the token, or the message itself are
/// permanent. Unrecognized API replies (Telegram reports its own 5xx errors
/// as [`ApiError::Unknown`]), rate limits and transport failures are transient.
pub fn classify_request_error(err: RequestError) -> DeliveryError {
    match err {
        RequestError::Api(ref api) if is_permanent_rejection(api) => {
            DeliveryError::permanent_from("telegram rejected the message", err)
        },
        RequestError::MigrateToChatId(_) => {
            DeliveryError::permanent_from("telegram chat migrated", err)
        },
        other => DeliveryError::transient_from("telegram request", other),
    }
}

fn is_permanent_rejection(api: &ApiError) -> bool {
    matches!(
        api,
        ApiError::ChatNotFound
            | ApiError::UserNotFound
            | ApiError::GroupDeactivated
            | ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::UserDeactivated
            | ApiError::CantInitiateConversation
            | ApiError::CantTalkWithBots
            | ApiError::NotEnoughRightsToPostMessages
            | ApiError::InvalidToken
            | ApiError::MessageIsTooLong
            | ApiError::MessageTextIsEmpty
            | ApiError::CantParseEntities(_)
    )
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case::rate_limited(RequestError::RetryAfter(teloxide::types::Seconds::from_seconds(5)))]
    #[case::io(RequestError::Io(std::io::Error::other("reset")))]
    #[case::server_error(RequestError::Api(ApiError::Unknown("Internal Server Error".into())))]
    #[case::bad_gateway(RequestError::Api(ApiError::Unknown("Bad Gateway".into())))]
    #[case::unlisted_api_error(RequestError::Api(ApiError::MessageNotModified))]
    fn transient_failures(#[case] err: RequestError) {
        assert!(!classify_request_error(err).is_permanent());
    }

    #[rstest]
    #[case::chat_not_found(ApiError::ChatNotFound)]
    #[case::bot_blocked(ApiError::BotBlocked)]
    #[case::bot_kicked(ApiError::BotKickedFromSupergroup)]
    #[case::invalid_token(ApiError::InvalidToken)]
    #[case::bad_markup(ApiError::CantParseEntities("Bad Request: can't parse entities".into()))]
    fn explicit_rejections_are_permanent(#[case] api: ApiError) {
        assert!(classify_request_error(RequestError::Api(api)).is_permanent());
    }

    #[test]
    fn migrated_chat_is_permanent() {
        let err = RequestError::MigrateToChatId(ChatId(-100_123));
        assert!(classify_request_error(err).is_permanent());
    }
}
