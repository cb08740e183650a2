//! The contract every delivery channel implements.

use {async_trait::async_trait, courier_common::Notification};

use crate::{Channel, DeliveryError, Result, Subscription};

/// Delivers one notification to one subscription on one channel.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// The channel this sender handles. Used as the registry key.
    fn channel(&self) -> Channel;

    /// Attempt a single delivery. Retry policy belongs to the caller; the
    /// sender only classifies its failure as permanent or transient.
    async fn send(
        &self,
        subscription: &Subscription,
        notification: &Notification,
    ) -> std::result::Result<(), DeliveryError>;

    /// Link state of the underlying account, when the channel has one.
    fn link_status(&self) -> Option<&dyn LinkStatus> {
        None
    }

    /// Default-subscription provisioning, when the channel supports it.
    fn auto_subscriber(&self) -> Option<&dyn AutoSubscribe> {
        None
    }
}

/// Whether the account/bot behind a sender is currently usable.
#[async_trait]
pub trait LinkStatus: Send + Sync {
    async fn is_linked(&self) -> Result<bool>;
}

/// Creates a default subscription for an app that has none.
#[async_trait]
pub trait AutoSubscribe: Send + Sync {
    /// Check that provisioning can succeed right now (e.g. an account is
    /// linked). Returns the reason as an error when it cannot.
    async fn can_auto_subscribe(&self) -> Result<()>;

    /// Persist exactly one new subscription for `app_name` and return its id.
    async fn auto_subscribe(&self, app_name: &str) -> Result<String>;
}
