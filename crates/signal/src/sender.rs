use std::sync::Arc;

use {
    async_trait::async_trait,
    courier_channels::{
        AutoSubscribe, Channel, ChannelSender, DeliveryError, GroupCache, LinkStatus,
        NewSubscription, SignalGroup, Subscription, SubscriptionStore, SubscriptionTarget,
    },
    courier_common::Notification,
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result,
    client::{Account, SignalClient},
    format::render_notification,
};

/// Sender for [`Channel::Signal`] subscriptions. Each app posts to its own
/// group owned by the linked account.
pub struct SignalSender {
    client: Arc<dyn SignalClient>,
    groups: Arc<GroupCache>,
    store: Arc<dyn SubscriptionStore>,
}

impl SignalSender {
    pub fn new(
        client: Arc<dyn SignalClient>,
        groups: Arc<GroupCache>,
        store: Arc<dyn SubscriptionStore>,
    ) -> Self {
        Self {
            client,
            groups,
            store,
        }
    }

    async fn require_account(&self) -> Result<Account> {
        self.client.linked_account().await?.ok_or(Error::NotLinked)
    }

    /// Group for `app_name` owned by `account`: the cached one when it still
    /// belongs to that account, otherwise a freshly created (and cached) one.
    pub async fn group_for_app(&self, app_name: &str, account: &Account) -> Result<SignalGroup> {
        if let Some(group) = self.groups.get_for_account(app_name, &account.number).await? {
            debug!(app = app_name, group_id = %group.group_id, "reusing cached signal group");
            return Ok(group);
        }

        let group_id = self.client.create_group(&account.number, app_name).await?;
        let group = SignalGroup {
            group_id,
            account: account.number.clone(),
        };
        if let Err(e) = self.groups.put(app_name, &group).await {
            warn!(app = app_name, error = %e, "failed to cache signal group");
        }
        info!(app = app_name, group_id = %group.group_id, "created signal group");
        Ok(group)
    }

    /// Add a Signal subscription for `app_name` on the linked account.
    pub async fn subscribe_app(&self, app_name: &str) -> Result<String> {
        let account = self.require_account().await?;
        let group = self.group_for_app(app_name, &account).await?;
        let id = self
            .store
            .add_subscription(NewSubscription::new(
                app_name,
                SubscriptionTarget::Signal(group),
            ))
            .await?;
        Ok(id)
    }
}

#[async_trait]
impl ChannelSender for SignalSender {
    fn channel(&self) -> Channel {
        Channel::Signal
    }

    async fn send(
        &self,
        subscription: &Subscription,
        notification: &Notification,
    ) -> std::result::Result<(), DeliveryError> {
        let SubscriptionTarget::Signal(group) = &subscription.target else {
            return Err(DeliveryError::permanent(format!(
                "subscription {} is not a signal subscription",
                subscription.id
            )));
        };
        if group.group_id.is_empty() {
            return Err(DeliveryError::permanent(format!(
                "signal group not configured for subscription {}",
                subscription.id
            )));
        }

        let account = match self.client.linked_account().await {
            Ok(Some(account)) => account,
            Ok(None) => return Err(DeliveryError::permanent("no linked signal account")),
            Err(e) => return Err(DeliveryError::transient_from("signal account lookup", e)),
        };
        if group.account != account.number {
            return Err(DeliveryError::permanent(format!(
                "group for subscription {} belongs to {}, linked account is {}",
                subscription.id, group.account, account.number
            )));
        }

        let message = render_notification(notification);
        match self
            .client
            .send_group_message(&account.number, &group.group_id, &message)
            .await
        {
            Ok(()) => {},
            Err(e @ Error::NotInstalled { .. }) => {
                return Err(DeliveryError::permanent_from("signal send", e));
            },
            Err(e) => return Err(DeliveryError::transient_from("signal send", e)),
        }

        debug!(subscription_id = %subscription.id, group_id = %group.group_id, "signal message sent");
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
impl LinkStatus for SignalSender {
    async fn is_linked(&self) -> courier_channels::Result<bool> {
        Ok(self.client.linked_account().await?.is_some())
    }
}

#[async_trait]
impl AutoSubscribe for SignalSender {
    async fn can_auto_subscribe(&self) -> courier_channels::Result<()> {
        self.require_account().await?;
        Ok(())
    }

    async fn auto_subscribe(&self, app_name: &str) -> courier_channels::Result<String> {
        let id = self.subscribe_app(app_name).await?;
        info!(app = app_name, subscription_id = %id, "auto-subscribed app to signal");
        Ok(id)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use {super::*, crate::client::LinkSession, courier_channels::SqliteSubscriptionStore};

    /// In-memory signal-cli stand-in.
    #[derive(Default)]
    pub(crate) struct FakeClient {
        pub(crate) account: Mutex<Option<String>>,
        pub(crate) groups_created: AtomicUsize,
        pub(crate) sent: Mutex<Vec<(String, String, String)>>,
        pub(crate) fail_send: bool,
        /// Completion of the next link; `None` completes immediately.
        pub(crate) link_result: Mutex<Option<tokio::sync::oneshot::Receiver<Result<()>>>>,
        pub(crate) link_calls: AtomicUsize,
        pub(crate) link_delay: Option<std::time::Duration>,
        pub(crate) fail_link: bool,
        pub(crate) panic_in_link: bool,
    }

    impl FakeClient {
        pub(crate) fn linked(number: &str) -> Self {
            let client = Self::default();
            *client.account.lock().unwrap() = Some(number.to_string());
            client
        }
    }

    async fn exploding_link() -> Result<()> {
        panic!("link task blew up")
    }

    #[async_trait]
    impl SignalClient for FakeClient {
        async fn linked_account(&self) -> Result<Option<Account>> {
            Ok(self.account.lock().unwrap().clone().map(|number| Account {
                number,
                uuid: None,
            }))
        }

        async fn create_group(&self, account: &str, name: &str) -> Result<String> {
            let n = self.groups_created.fetch_add(1, Ordering::SeqCst);
            Ok(format!("group-{name}-{account}-{n}"))
        }

        async fn send_group_message(
            &self,
            account: &str,
            group_id: &str,
            message: &str,
        ) -> Result<()> {
            if self.fail_send {
                return Err(Error::cli("untrusted identity"));
            }
            self.sent.lock().unwrap().push((
                account.to_string(),
                group_id.to_string(),
                message.to_string(),
            ));
            Ok(())
        }

        async fn start_link(&self, _device_name: &str) -> Result<LinkSession> {
            self.link_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.link_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_link {
                return Err(Error::cli("signal-cli exited before printing a link"));
            }
            let pending = self.link_result.lock().unwrap().take();
            let completion: futures::future::BoxFuture<'static, Result<()>> = match pending {
                _ if self.panic_in_link => Box::pin(exploding_link()),
                Some(rx) => Box::pin(async move {
                    rx.await
                        .unwrap_or_else(|_| Err(Error::cli("link process vanished")))
                }),
                None => Box::pin(async { Ok(()) }),
            };
            Ok(LinkSession {
                uri: "sgnl://linkdevice?uuid=test".into(),
                completion,
            })
        }
    }

    pub(crate) struct Fixture {
        pub(crate) client: Arc<FakeClient>,
        pub(crate) groups: Arc<GroupCache>,
        pub(crate) store: Arc<dyn SubscriptionStore>,
        pub(crate) sender: SignalSender,
    }

    pub(crate) async fn fixture(client: FakeClient) -> Fixture {
        let pool = courier_common::db::memory_pool().await.unwrap();
        courier_channels::run_migrations(&pool).await.unwrap();
        let client = Arc::new(client);
        let groups = Arc::new(GroupCache::new(pool.clone()));
        let store: Arc<dyn SubscriptionStore> = Arc::new(SqliteSubscriptionStore::new(pool));
        let sender = SignalSender::new(client.clone(), Arc::clone(&groups), Arc::clone(&store));
        Fixture {
            client,
            groups,
            store,
            sender,
        }
    }

    fn subscription(group_id: &str, account: &str) -> Subscription {
        Subscription {
            id: "sub-1".into(),
            app_name: "nas".into(),
            target: SubscriptionTarget::Signal(SignalGroup {
                group_id: group_id.into(),
                account: account.into(),
            }),
        }
    }

    #[tokio::test]
    async fn sends_to_group_as_linked_account() {
        let f = fixture(FakeClient::linked("+15551234567")).await;
        f.sender
            .send(
                &subscription("g1", "+15551234567"),
                &Notification::new("done").with_title("Backup"),
            )
            .await
            .unwrap();

        let sent = f.client.sent.lock().unwrap();
        assert_eq!(
            sent.as_slice(),
            &[(
                "+15551234567".to_string(),
                "g1".to_string(),
                "Backup\n\ndone".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn owner_mismatch_is_permanent() {
        let f = fixture(FakeClient::linked("+15550000001")).await;
        let err = f
            .sender
            .send(&subscription("g1", "+15550000002"), &Notification::new("x"))
            .await
            .unwrap_err();
        assert!(err.is_permanent());
        assert!(f.client.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unlinked_or_missing_group_is_permanent() {
        let f = fixture(FakeClient::default()).await;
        let err = f
            .sender
            .send(&subscription("g1", "+1"), &Notification::new("x"))
            .await
            .unwrap_err();
        assert!(err.is_permanent());

        let f = fixture(FakeClient::linked("+1")).await;
        let err = f
            .sender
            .send(&subscription("", "+1"), &Notification::new("x"))
            .await
            .unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn cli_failure_is_transient() {
        let client = FakeClient {
            fail_send: true,
            ..FakeClient::linked("+1")
        };
        let f = fixture(client).await;
        let err = f
            .sender
            .send(&subscription("g1", "+1"), &Notification::new("x"))
            .await
            .unwrap_err();
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn link_status_tracks_account() {
        let f = fixture(FakeClient::default()).await;
        let status = f.sender.link_status().unwrap();
        assert!(!status.is_linked().await.unwrap());
        *f.client.account.lock().unwrap() = Some("+1".into());
        assert!(status.is_linked().await.unwrap());
    }

    #[tokio::test]
    async fn auto_subscribe_creates_and_caches_group() {
        let f = fixture(FakeClient::linked("+1")).await;
        let auto = f.sender.auto_subscriber().unwrap();
        auto.can_auto_subscribe().await.unwrap();
        let id = auto.auto_subscribe("nas").await.unwrap();

        let app = f.store.get_app("nas").await.unwrap().unwrap();
        assert_eq!(app.subscriptions.len(), 1);
        assert_eq!(app.subscriptions[0].id, id);
        let cached = f.groups.get("nas").await.unwrap().unwrap();
        assert_eq!(
            app.subscriptions[0].target,
            SubscriptionTarget::Signal(cached.clone())
        );
        assert_eq!(cached.account, "+1");
    }

    #[tokio::test]
    async fn cached_group_reused_only_for_same_account() {
        let f = fixture(FakeClient::linked("+1")).await;
        f.sender.subscribe_app("nas").await.unwrap();
        f.store.remove_app("nas").await.unwrap();
        f.sender.subscribe_app("nas").await.unwrap();
        assert_eq!(f.client.groups_created.load(Ordering::SeqCst), 1);

        *f.client.account.lock().unwrap() = Some("+2".into());
        f.sender.subscribe_app("nas").await.unwrap();
        assert_eq!(f.client.groups_created.load(Ordering::SeqCst), 2);
        assert_eq!(f.groups.get("nas").await.unwrap().unwrap().account, "+2");
    }

    #[tokio::test]
    async fn auto_subscribe_requires_linked_account() {
        let f = fixture(FakeClient::default()).await;
        assert!(f.sender.can_auto_subscribe().await.is_err());
        assert!(f.sender.auto_subscribe("nas").await.is_err());
        assert!(f.store.get_app("nas").await.unwrap().is_none());
    }
}
