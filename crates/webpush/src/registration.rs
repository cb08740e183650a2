//! Web-push registration entry points over the subscription store.

use {
    courier_channels::{
        Channel, Error, NewSubscription, Result, SubscriptionStore, SubscriptionTarget,
        validate_app_name,
    },
    serde::Deserialize,
    tracing::info,
};

use crate::validate::validate_target;

/// Body of a web-push registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub app_name: String,
    pub push_endpoint: String,
    #[serde(default)]
    pub p256dh: Option<String>,
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub vapid_private_key: Option<String>,
}

/// Validate and persist a web-push subscription. Returns its id.
///
/// Nothing is written when validation fails.
pub async fn register(
    store: &dyn SubscriptionStore,
    request: &RegistrationRequest,
    require_https_for_encrypted: bool,
) -> Result<String> {
    validate_app_name(&request.app_name)?;
    let target = validate_target(
        &request.push_endpoint,
        request.p256dh.as_deref(),
        request.auth.as_deref(),
        request.vapid_private_key.as_deref(),
        require_https_for_encrypted,
    )?;
    let encrypted = target.is_encrypted();

    let id = store
        .add_subscription(NewSubscription::new(
            &request.app_name,
            SubscriptionTarget::WebPush(target),
        ))
        .await?;

    info!(app = %request.app_name, subscription_id = %id, encrypted, "web push subscription registered");
    Ok(id)
}

/// Delete a web-push subscription by id. Returns whether it existed.
///
/// Ids belonging to other channels are rejected rather than deleted.
pub async fn unregister(store: &dyn SubscriptionStore, subscription_id: &str) -> Result<bool> {
    match store.get_subscription(subscription_id).await? {
        None => Ok(false),
        Some(sub) if sub.channel() != Channel::WebPush => Err(Error::invalid_input(format!(
            "subscription {subscription_id} is not a web push subscription"
        ))),
        Some(_) => store.delete_subscription(subscription_id).await,
    }
}
