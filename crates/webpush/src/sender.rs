use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD},
    courier_channels::{
        Channel, ChannelSender, DeliveryError, Subscription, SubscriptionTarget, WebPushKeys,
        WebPushTarget,
    },
    courier_common::Notification,
    p256::pkcs8::{EncodePrivateKey, LineEnding},
    tracing::debug,
    web_push::{
        ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
        WebPushMessageBuilder,
    },
};

const PLAIN_POST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct WebPushSenderConfig {
    /// VAPID `sub` claim.
    pub subscriber: String,
    pub ttl_secs: u32,
}

impl Default for WebPushSenderConfig {
    fn default() -> Self {
        Self {
            subscriber: "mailto:admin@localhost".into(),
            ttl_secs: 86_400,
        }
    }
}

/// Sender for [`Channel::WebPush`] subscriptions.
///
/// Targets with keys get an `aes128gcm` payload signed with the
/// subscription's own VAPID key; plain targets get the notification JSON as
/// an HTTP `POST`.
pub struct WebPushSender {
    push: Arc<dyn WebPushClient + Send + Sync>,
    http: reqwest::Client,
    config: WebPushSenderConfig,
}

impl WebPushSender {
    pub fn new(config: WebPushSenderConfig) -> courier_channels::Result<Self> {
        let push = web_push::IsahcWebPushClient::new()
            .map_err(|e| courier_channels::Error::unavailable(format!("web push client: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(PLAIN_POST_TIMEOUT)
            .build()
            .map_err(|e| courier_channels::Error::external("http client", e))?;
        Ok(Self::with_clients(config, Arc::new(push), http))
    }

    pub fn with_clients(
        config: WebPushSenderConfig,
        push: Arc<dyn WebPushClient + Send + Sync>,
        http: reqwest::Client,
    ) -> Self {
        Self { push, http, config }
    }

    async fn send_encrypted(
        &self,
        subscription: &Subscription,
        endpoint: &str,
        keys: &WebPushKeys,
        payload: &[u8],
    ) -> Result<(), DeliveryError> {
        let info = SubscriptionInfo {
            endpoint: endpoint.to_string(),
            keys: web_push::SubscriptionKeys {
                p256dh: keys.p256dh.clone(),
                auth: keys.auth.clone(),
            },
        };

        let pem = vapid_pem(&keys.vapid_private_key).map_err(|e| {
            DeliveryError::permanent(format!(
                "invalid VAPID key for subscription {}: {e}",
                subscription.id
            ))
        })?;
        let mut sig_builder = VapidSignatureBuilder::from_pem(pem.as_bytes(), &info)
            .map_err(|e| DeliveryError::permanent(format!("invalid VAPID key: {e}")))?;
        sig_builder.add_claim("sub", self.config.subscriber.as_str());
        let signature = sig_builder
            .build()
            .map_err(|e| DeliveryError::permanent(format!("VAPID signature: {e}")))?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_ttl(self.config.ttl_secs);
        builder.set_vapid_signature(signature);
        let message = builder
            .build()
            .map_err(|e| DeliveryError::permanent(format!("build push message: {e}")))?;

        self.push
            .send(message)
            .await
            .map_err(|e| DeliveryError::transient(format!("web push: {e}")))?;
        Ok(())
    }

    async fn send_plain(&self, endpoint: &str, payload: Vec<u8>) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::transient_from("callback request", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::transient(format!(
                "callback returned status {status}"
            )));
        }
        Ok(())
    }
}

/// PKCS#8 PEM for a raw base64 P-256 scalar, the form the VAPID builder reads.
fn vapid_pem(raw: &str) -> Result<String, String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(raw.trim_end_matches('='))
        .map_err(|e| e.to_string())?;
    let key = p256::SecretKey::from_slice(&bytes).map_err(|e| e.to_string())?;
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.to_string())
        .map_err(|e| e.to_string())
}

#[async_trait]
impl ChannelSender for WebPushSender {
    fn channel(&self) -> Channel {
        Channel::WebPush
    }

    async fn send(
        &self,
        subscription: &Subscription,
        notification: &Notification,
    ) -> Result<(), DeliveryError> {
        let SubscriptionTarget::WebPush(WebPushTarget { endpoint, keys }) = &subscription.target
        else {
            return Err(DeliveryError::permanent(format!(
                "subscription {} is not a web push subscription",
                subscription.id
            )));
        };

        let payload = serde_json::to_vec(notification)
            .map_err(|e| DeliveryError::permanent_from("encode notification", e))?;

        match keys {
            Some(keys) => {
                self.send_encrypted(subscription, endpoint, keys, &payload)
                    .await?
            },
            None => self.send_plain(endpoint, payload).await?,
        }

        debug!(subscription_id = %subscription.id, encrypted = keys.is_some(), "web push delivered");
        Ok(())
    }
}
