//! Apps and their channel subscriptions.

use serde::{Deserialize, Serialize};

use crate::{Channel, Error, Result};

/// A previously created messaging group and the account that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalGroup {
    pub group_id: String,
    pub account: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramChat {
    pub chat_id: i64,
}

/// Encryption material for a web-push target. All three are required
/// together; see `courier_webpush::validate` for the checks applied before
/// one is constructed from user input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPushKeys {
    /// Uncompressed P-256 point, URL-safe base64 without padding.
    pub p256dh: String,
    /// 16-byte auth secret, URL-safe base64 without padding.
    pub auth: String,
    /// 32-byte P-256 scalar, URL-safe base64 without padding.
    pub vapid_private_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPushTarget {
    pub endpoint: String,
    /// `None` for a plain callback that receives unencrypted JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<WebPushKeys>,
}

impl WebPushTarget {
    pub fn is_encrypted(&self) -> bool {
        self.keys.is_some()
    }
}

/// Channel-specific payload. The variant is the subscription's channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum SubscriptionTarget {
    Signal(SignalGroup),
    Telegram(TelegramChat),
    WebPush(WebPushTarget),
}

impl SubscriptionTarget {
    pub fn channel(&self) -> Channel {
        match self {
            Self::Signal(_) => Channel::Signal,
            Self::Telegram(_) => Channel::Telegram,
            Self::WebPush(_) => Channel::WebPush,
        }
    }

    /// Structural checks applied before a target is persisted.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Signal(group) => {
                if group.group_id.trim().is_empty() {
                    return Err(Error::invalid_input("signal group id is required"));
                }
                if group.account.trim().is_empty() {
                    return Err(Error::invalid_input("signal account is required"));
                }
            },
            Self::Telegram(_) => {},
            Self::WebPush(target) => {
                if target.endpoint.trim().is_empty() {
                    return Err(Error::invalid_input("web push endpoint is required"));
                }
                if let Some(keys) = &target.keys
                    && (keys.p256dh.is_empty()
                        || keys.auth.is_empty()
                        || keys.vapid_private_key.is_empty())
                {
                    return Err(Error::invalid_input(
                        "web push encryption requires p256dh, auth and vapid_private_key",
                    ));
                }
            },
        }
        Ok(())
    }
}

/// One delivery target belonging to an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// 128-bit random id, lowercase hex.
    pub id: String,
    pub app_name: String,
    #[serde(flatten)]
    pub target: SubscriptionTarget,
}

impl Subscription {
    pub fn channel(&self) -> Channel {
        self.target.channel()
    }
}

/// A subscription that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
    pub app_name: String,
    pub target: SubscriptionTarget,
}

impl NewSubscription {
    pub fn new(app_name: impl Into<String>, target: SubscriptionTarget) -> Self {
        Self {
            app_name: app_name.into(),
            target,
        }
    }
}

/// A named publisher and its subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub name: String,
    pub subscriptions: Vec<Subscription>,
}

impl App {
    pub fn has_channel(&self, channel: Channel) -> bool {
        self.subscriptions.iter().any(|s| s.channel() == channel)
    }
}

/// Reject app names that cannot be used as a single URL path segment.
pub fn validate_app_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::invalid_input("app name is required"));
    }
    if name.contains('/') {
        return Err(Error::invalid_input("app name must not contain '/'"));
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> WebPushKeys {
        WebPushKeys {
            p256dh: "BP".into(),
            auth: "au".into(),
            vapid_private_key: "vk".into(),
        }
    }

    #[test]
    fn serializes_with_channel_tag() {
        let sub = Subscription {
            id: "ab".into(),
            app_name: "backup".into(),
            target: SubscriptionTarget::Telegram(TelegramChat { chat_id: 42 }),
        };
        let value = serde_json::to_value(&sub).unwrap();
        assert_eq!(value["channel"], "telegram");
        assert_eq!(value["chat_id"], 42);
        assert_eq!(serde_json::from_value::<Subscription>(value).unwrap(), sub);
    }

    #[test]
    fn webpush_tag_matches_channel_name() {
        let target = SubscriptionTarget::WebPush(WebPushTarget {
            endpoint: "https://push.example/x".into(),
            keys: None,
        });
        let value = serde_json::to_value(&target).unwrap();
        assert_eq!(value["channel"], Channel::WebPush.as_str());
        assert!(value.get("keys").is_none());
    }

    #[test]
    fn validate_rejects_empty_fields() {
        let bad_group = SubscriptionTarget::Signal(SignalGroup {
            group_id: " ".into(),
            account: "+1".into(),
        });
        assert!(bad_group.validate().is_err());

        let bad_push = SubscriptionTarget::WebPush(WebPushTarget {
            endpoint: String::new(),
            keys: None,
        });
        assert!(bad_push.validate().is_err());

        let partial = SubscriptionTarget::WebPush(WebPushTarget {
            endpoint: "https://push.example/x".into(),
            keys: Some(WebPushKeys {
                auth: String::new(),
                ..keys()
            }),
        });
        assert!(partial.validate().is_err());

        let full = SubscriptionTarget::WebPush(WebPushTarget {
            endpoint: "https://push.example/x".into(),
            keys: Some(keys()),
        });
        assert!(full.validate().is_ok());
    }

    #[test]
    fn app_names() {
        assert!(validate_app_name("backup-job").is_ok());
        assert!(validate_app_name("").is_err());
        assert!(validate_app_name("a/b").is_err());
    }
}
