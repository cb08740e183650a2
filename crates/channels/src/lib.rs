//! Delivery channels: the subscription model, the sender contract every
//! channel integration implements, the sender registry and the SQLite-backed
//! subscription store.

pub mod channel;
pub mod error;
pub mod group_cache;
pub mod registry;
pub mod sender;
pub mod store;
pub mod store_sqlite;
pub mod subscription;

pub use {
    channel::Channel,
    error::{DeliveryError, Error, Result},
    group_cache::GroupCache,
    registry::SenderRegistry,
    sender::{AutoSubscribe, ChannelSender, LinkStatus},
    store::SubscriptionStore,
    store_sqlite::SqliteSubscriptionStore,
    subscription::{
        App, NewSubscription, SignalGroup, Subscription, SubscriptionTarget, TelegramChat,
        WebPushKeys, WebPushTarget, validate_app_name,
    },
};

/// Run database migrations for the channels crate.
///
/// Creates the `apps`, `subscriptions` and `signal_groups` tables.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
