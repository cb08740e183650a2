use std::sync::Arc;

use {
    courier_channels::{
        App, ChannelSender, DeliveryError, SenderRegistry, Subscription, SubscriptionStore,
    },
    courier_common::Notification,
    serde::Serialize,
    tracing::{debug, error, info, warn},
};

use crate::{
    error::PublishError,
    retry::{RetryPolicy, Sleep, TokioSleep},
};

/// Per-publish outcome counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
    /// Subscriptions whose channel has no registered sender.
    pub skipped: usize,
    /// Id of the subscription created by auto-subscribe, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_subscribed: Option<String>,
}

impl PublishReport {
    /// Nothing was attempted: no subscriptions, or all on disabled channels.
    pub fn is_dropped(&self) -> bool {
        self.delivered == 0 && self.failed == 0
    }
}

/// Fans a notification out to every subscription of an app.
///
/// Delivery runs inline within [`publish`](Self::publish): it returns once
/// every subscription has succeeded, been rejected permanently, or exhausted
/// its retries. Subscriptions are read from the store on every call.
pub struct Publisher {
    store: Arc<dyn SubscriptionStore>,
    registry: Arc<SenderRegistry>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleep>,
}

impl Publisher {
    pub fn new(store: Arc<dyn SubscriptionStore>, registry: Arc<SenderRegistry>) -> Self {
        Self {
            store,
            registry,
            policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleep),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleep>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<SenderRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Deliver `notification` to every subscription of `app_name`.
    ///
    /// Succeeds when at least one subscription was delivered, or when there
    /// was nothing to deliver to (the notification is dropped and logged).
    /// Fails with the last delivery error when every attempted subscription
    /// failed.
    pub async fn publish(
        &self,
        app_name: &str,
        notification: &Notification,
    ) -> Result<PublishReport, PublishError> {
        let mut report = PublishReport::default();

        let mut app = self.store.get_app(app_name).await?;
        if !has_subscriptions(app.as_ref()) {
            report.auto_subscribed = self.auto_subscribe(app_name).await;
            if report.auto_subscribed.is_some() {
                app = self.store.get_app(app_name).await?;
            }
        }

        let Some(app) = app.filter(|a| !a.subscriptions.is_empty()) else {
            warn!(app = %app_name, "no subscriptions for app, dropping notification");
            return Ok(report);
        };

        let mut last_error = None;
        for subscription in &app.subscriptions {
            let channel = subscription.channel();
            let Some(sender) = self.registry.get(channel) else {
                debug!(
                    app = %app_name,
                    subscription_id = %subscription.id,
                    %channel,
                    "skipping subscription for disabled channel"
                );
                report.skipped += 1;
                continue;
            };

            match self
                .send_with_retry(sender.as_ref(), subscription, notification)
                .await
            {
                Ok(()) => report.delivered += 1,
                Err(source) => {
                    report.failed += 1;
                    last_error = Some(PublishError::Delivery {
                        subscription_id: subscription.id.clone(),
                        source,
                    });
                },
            }
        }

        if report.delivered == 0
            && let Some(err) = last_error
        {
            return Err(err);
        }

        debug!(
            app = %app_name,
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            "publish complete"
        );
        Ok(report)
    }

    /// Walk the auto-subscribe chain in registration order until one
    /// provisioner creates a subscription.
    async fn auto_subscribe(&self, app_name: &str) -> Option<String> {
        for sender in self.registry.auto_subscribers() {
            let Some(provisioner) = sender.auto_subscriber() else {
                continue;
            };
            let channel = sender.channel();

            if let Err(e) = provisioner.can_auto_subscribe().await {
                debug!(app = %app_name, %channel, error = %e, "auto-subscribe unavailable");
                continue;
            }

            match provisioner.auto_subscribe(app_name).await {
                Ok(subscription_id) => {
                    info!(app = %app_name, %channel, %subscription_id, "auto-subscribed app");
                    return Some(subscription_id);
                },
                Err(e) => {
                    warn!(app = %app_name, %channel, error = %e, "auto-subscribe failed");
                },
            }
        }
        None
    }

    async fn send_with_retry(
        &self,
        sender: &dyn ChannelSender,
        subscription: &Subscription,
        notification: &Notification,
    ) -> Result<(), DeliveryError> {
        let app = subscription.app_name.as_str();
        let subscription_id = subscription.id.as_str();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match sender.send(subscription, notification).await {
                Ok(()) => {
                    if attempt > 1 {
                        info!(app, subscription_id, attempt, "notification sent after retry");
                    }
                    return Ok(());
                },
                Err(e) => e,
            };

            if err.is_permanent() {
                error!(app, subscription_id, attempt, error = %err, "permanent delivery error, not retrying");
                return Err(err);
            }
            if attempt >= self.policy.max_attempts {
                error!(app, subscription_id, attempts = attempt, error = %err, "delivery failed after retries");
                return Err(err);
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                app,
                subscription_id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "delivery failed, retrying"
            );
            self.sleeper.sleep(delay).await;
        }
    }
}

fn has_subscriptions(app: Option<&App>) -> bool {
    app.is_some_and(|a| !a.subscriptions.is_empty())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Mutex,
            atomic::{AtomicU32, Ordering},
        },
        time::Duration,
    };

    use {
        async_trait::async_trait,
        courier_channels::{
            AutoSubscribe, Channel, NewSubscription, SignalGroup, SqliteSubscriptionStore,
            SubscriptionTarget, TelegramChat, WebPushTarget,
        },
    };

    use super::*;

    #[derive(Default)]
    struct RecordingSleep {
        delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleep {
        fn millis(&self) -> Vec<u128> {
            self.delays
                .lock()
                .unwrap()
                .iter()
                .map(Duration::as_millis)
                .collect()
        }
    }

    #[async_trait]
    impl Sleep for RecordingSleep {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    #[derive(Clone, Copy)]
    enum Step {
        Ok,
        Transient,
        Permanent,
    }

    /// Plays back a script of outcomes; repeats the last step when exhausted.
    struct ScriptedSender {
        channel: Channel,
        script: Mutex<VecDeque<Step>>,
        last: Mutex<Step>,
        calls: AtomicU32,
    }

    impl ScriptedSender {
        fn new(channel: Channel, steps: &[Step]) -> Arc<Self> {
            Arc::new(Self {
                channel,
                script: Mutex::new(steps.iter().copied().collect()),
                last: Mutex::new(*steps.last().unwrap()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChannelSender for ScriptedSender {
        fn channel(&self) -> Channel {
            self.channel
        }

        async fn send(
            &self,
            _subscription: &Subscription,
            _notification: &Notification,
        ) -> Result<(), DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(*self.last.lock().unwrap());
            match step {
                Step::Ok => Ok(()),
                Step::Transient => Err(DeliveryError::transient("connection reset")),
                Step::Permanent => Err(DeliveryError::permanent("no linked account")),
            }
        }
    }

    /// Telegram-like sender that can provision a default chat subscription.
    struct Provisioner {
        channel: Channel,
        store: Arc<dyn SubscriptionStore>,
        ready: bool,
        provisioned: AtomicU32,
        sends: AtomicU32,
    }

    impl Provisioner {
        fn new(channel: Channel, store: Arc<dyn SubscriptionStore>, ready: bool) -> Arc<Self> {
            Arc::new(Self {
                channel,
                store,
                ready,
                provisioned: AtomicU32::new(0),
                sends: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ChannelSender for Provisioner {
        fn channel(&self) -> Channel {
            self.channel
        }

        async fn send(
            &self,
            _subscription: &Subscription,
            _notification: &Notification,
        ) -> Result<(), DeliveryError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn auto_subscriber(&self) -> Option<&dyn AutoSubscribe> {
            Some(self)
        }
    }

    #[async_trait]
    impl AutoSubscribe for Provisioner {
        async fn can_auto_subscribe(&self) -> courier_channels::Result<()> {
            if self.ready {
                Ok(())
            } else {
                Err(courier_channels::Error::unavailable("not linked"))
            }
        }

        async fn auto_subscribe(&self, app_name: &str) -> courier_channels::Result<String> {
            self.provisioned.fetch_add(1, Ordering::SeqCst);
            let target = match self.channel {
                Channel::Signal => SubscriptionTarget::Signal(SignalGroup {
                    group_id: "grp".into(),
                    account: "+1".into(),
                }),
                _ => SubscriptionTarget::Telegram(TelegramChat { chat_id: 7 }),
            };
            self.store
                .add_subscription(NewSubscription::new(app_name, target))
                .await
        }
    }

    struct Harness {
        store: Arc<dyn SubscriptionStore>,
        registry: Arc<SenderRegistry>,
        sleep: Arc<RecordingSleep>,
        publisher: Publisher,
    }

    async fn harness() -> Harness {
        let pool = courier_common::db::memory_pool().await.unwrap();
        courier_channels::run_migrations(&pool).await.unwrap();
        let store: Arc<dyn SubscriptionStore> = Arc::new(SqliteSubscriptionStore::new(pool));
        let registry = Arc::new(SenderRegistry::new());
        let sleep = Arc::new(RecordingSleep::default());
        let publisher = Publisher::new(Arc::clone(&store), Arc::clone(&registry))
            .with_sleeper(Arc::clone(&sleep) as Arc<dyn Sleep>);
        Harness {
            store,
            registry,
            sleep,
            publisher,
        }
    }

    fn telegram() -> SubscriptionTarget {
        SubscriptionTarget::Telegram(TelegramChat { chat_id: 1 })
    }

    fn push() -> SubscriptionTarget {
        SubscriptionTarget::WebPush(WebPushTarget {
            endpoint: "https://hooks.example/n".into(),
            keys: None,
        })
    }

    async fn subscribe(h: &Harness, app: &str, target: SubscriptionTarget) -> String {
        h.store
            .add_subscription(NewSubscription::new(app, target))
            .await
            .unwrap()
    }

    fn note() -> Notification {
        Notification::new("disk almost full").with_title("nas")
    }

    #[tokio::test]
    async fn transient_failures_then_success_backs_off() {
        let h = harness().await;
        subscribe(&h, "app", telegram()).await;
        let sender = ScriptedSender::new(Channel::Telegram, &[
            Step::Transient,
            Step::Transient,
            Step::Transient,
            Step::Transient,
            Step::Ok,
        ]);
        h.registry.register(sender.clone());

        let report = h.publisher.publish("app", &note()).await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(sender.calls(), 5);
        assert_eq!(h.sleep.millis(), vec![500, 1_000, 2_000, 4_000]);
    }

    #[tokio::test]
    async fn permanent_error_short_circuits() {
        let h = harness().await;
        let id = subscribe(&h, "app", telegram()).await;
        let sender = ScriptedSender::new(Channel::Telegram, &[Step::Permanent]);
        h.registry.register(sender.clone());

        let err = h.publisher.publish("app", &note()).await.unwrap_err();
        assert!(err.is_permanent());
        assert!(matches!(&err, PublishError::Delivery { subscription_id, .. } if *subscription_id == id));
        assert_eq!(sender.calls(), 1);
        assert!(h.sleep.millis().is_empty());
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let h = harness().await;
        subscribe(&h, "app", telegram()).await;
        let sender = ScriptedSender::new(Channel::Telegram, &[Step::Transient]);
        h.registry.register(sender.clone());

        let err = h.publisher.publish("app", &note()).await.unwrap_err();
        assert!(!err.is_permanent());
        assert_eq!(sender.calls(), 10);
        let delays = h.sleep.millis();
        assert_eq!(delays.len(), 9);
        assert_eq!(delays.last(), Some(&128_000));
    }

    #[tokio::test]
    async fn custom_policy_is_honoured() {
        let h = harness().await;
        subscribe(&h, "app", telegram()).await;
        let sender = ScriptedSender::new(Channel::Telegram, &[Step::Transient]);
        h.registry.register(sender.clone());
        let publisher = Publisher::new(Arc::clone(&h.store), Arc::clone(&h.registry))
            .with_policy(RetryPolicy::new(3, Duration::from_millis(10)))
            .with_sleeper(Arc::clone(&h.sleep) as Arc<dyn Sleep>);

        publisher.publish("app", &note()).await.unwrap_err();
        assert_eq!(sender.calls(), 3);
        assert_eq!(h.sleep.millis(), vec![10, 20]);
    }

    #[tokio::test]
    async fn one_success_is_enough() {
        let h = harness().await;
        subscribe(&h, "app", push()).await;
        subscribe(&h, "app", telegram()).await;
        let failing = ScriptedSender::new(Channel::WebPush, &[Step::Transient]);
        let working = ScriptedSender::new(Channel::Telegram, &[Step::Ok]);
        h.registry.register(failing.clone());
        h.registry.register(working.clone());

        let report = h.publisher.publish("app", &note()).await.unwrap();
        assert_eq!((report.delivered, report.failed), (1, 1));
        assert_eq!(failing.calls(), 10);
        assert_eq!(working.calls(), 1);
    }

    #[tokio::test]
    async fn all_failures_return_last_error() {
        let h = harness().await;
        subscribe(&h, "app", push()).await;
        let last = subscribe(&h, "app", telegram()).await;
        h.registry
            .register(ScriptedSender::new(Channel::WebPush, &[Step::Permanent]));
        h.registry
            .register(ScriptedSender::new(Channel::Telegram, &[Step::Permanent]));

        let err = h.publisher.publish("app", &note()).await.unwrap_err();
        assert!(matches!(err, PublishError::Delivery { subscription_id, .. } if subscription_id == last));
    }

    #[tokio::test]
    async fn disabled_channels_are_skipped_silently() {
        let h = harness().await;
        subscribe(&h, "app", push()).await;
        subscribe(&h, "app", telegram()).await;
        let working = ScriptedSender::new(Channel::Telegram, &[Step::Ok]);
        h.registry.register(working.clone());

        let report = h.publisher.publish("app", &note()).await.unwrap();
        assert_eq!((report.delivered, report.skipped), (1, 1));

        h.registry.deregister(Channel::Telegram);
        let report = h.publisher.publish("app", &note()).await.unwrap();
        assert_eq!(report.skipped, 2);
        assert!(report.is_dropped());
    }

    #[tokio::test]
    async fn unknown_app_is_auto_subscribed_and_delivered() {
        let h = harness().await;
        let provisioner = Provisioner::new(Channel::Telegram, Arc::clone(&h.store), true);
        h.registry.register(provisioner.clone());

        let report = h.publisher.publish("fresh", &note()).await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(provisioner.provisioned.load(Ordering::SeqCst), 1);
        assert_eq!(provisioner.sends.load(Ordering::SeqCst), 1);

        let app = h.store.get_app("fresh").await.unwrap().unwrap();
        assert_eq!(app.subscriptions.len(), 1);
        assert_eq!(report.auto_subscribed.as_deref(), Some(app.subscriptions[0].id.as_str()));

        // Second publish reuses the subscription.
        h.publisher.publish("fresh", &note()).await.unwrap();
        assert_eq!(provisioner.provisioned.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auto_subscribe_follows_registration_order() {
        let h = harness().await;
        let unlinked = Provisioner::new(Channel::Signal, Arc::clone(&h.store), false);
        let linked = Provisioner::new(Channel::Telegram, Arc::clone(&h.store), true);
        h.registry.register(unlinked.clone());
        h.registry.register(linked.clone());

        h.publisher.publish("fresh", &note()).await.unwrap();
        assert_eq!(unlinked.provisioned.load(Ordering::SeqCst), 0);
        assert_eq!(linked.provisioned.load(Ordering::SeqCst), 1);

        let h = harness().await;
        let first = Provisioner::new(Channel::Signal, Arc::clone(&h.store), true);
        let second = Provisioner::new(Channel::Telegram, Arc::clone(&h.store), true);
        h.registry.register(first.clone());
        h.registry.register(second.clone());

        h.publisher.publish("fresh", &note()).await.unwrap();
        assert_eq!(first.provisioned.load(Ordering::SeqCst), 1);
        assert_eq!(second.provisioned.load(Ordering::SeqCst), 0);
        let app = h.store.get_app("fresh").await.unwrap().unwrap();
        assert_eq!(app.subscriptions.len(), 1);
    }

    #[tokio::test]
    async fn app_with_no_subscriptions_is_auto_subscribed() {
        let h = harness().await;
        h.store.register_app("empty").await.unwrap();
        let provisioner = Provisioner::new(Channel::Telegram, Arc::clone(&h.store), true);
        h.registry.register(provisioner.clone());

        let report = h.publisher.publish("empty", &note()).await.unwrap();
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn nothing_to_deliver_drops_silently() {
        let h = harness().await;
        h.registry
            .register(Provisioner::new(Channel::Telegram, Arc::clone(&h.store), false));

        let report = h.publisher.publish("nobody", &note()).await.unwrap();
        assert!(report.is_dropped());
        assert!(report.auto_subscribed.is_none());
        assert!(h.store.get_app("nobody").await.unwrap().is_none());
    }
}
