use async_trait::async_trait;

use crate::{App, Channel, NewSubscription, Result, Subscription};

/// Persistent storage for apps and their subscriptions.
///
/// The store is the single source of truth; callers never cache its contents
/// across requests.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert the app if it does not exist yet.
    async fn register_app(&self, name: &str) -> Result<()>;

    /// Register the owning app, then persist the subscription. Returns the
    /// generated id.
    async fn add_subscription(&self, subscription: NewSubscription) -> Result<String>;

    /// The app with its subscriptions, or `None` when unknown.
    async fn get_app(&self, name: &str) -> Result<Option<App>>;

    /// Every app with its subscriptions, ordered by name.
    async fn get_all_apps(&self) -> Result<Vec<App>>;

    async fn get_subscription(&self, id: &str) -> Result<Option<Subscription>>;

    /// Returns whether a subscription was deleted.
    async fn delete_subscription(&self, id: &str) -> Result<bool>;

    /// Returns the number of subscriptions deleted.
    async fn delete_subscriptions_by_channel(&self, channel: Channel) -> Result<u64>;

    /// Delete an app and, by cascade, its subscriptions. Returns whether the
    /// app existed.
    async fn remove_app(&self, name: &str) -> Result<bool>;
}
