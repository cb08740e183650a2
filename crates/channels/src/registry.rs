use std::sync::{Arc, RwLock};

use tracing::info;

use crate::{Channel, ChannelSender};

/// Channel → sender mapping, mutated at runtime as integrations link and
/// unlink.
///
/// Entries keep their registration order, which is also the priority order
/// of the auto-subscribe chain. Replacing the sender of an already
/// registered channel keeps its position.
#[derive(Default)]
pub struct SenderRegistry {
    senders: RwLock<Vec<(Channel, Arc<dyn ChannelSender>)>>,
}

impl SenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sender` under its own channel, replacing any previous one.
    pub fn register(&self, sender: Arc<dyn ChannelSender>) {
        let channel = sender.channel();
        let mut senders = self.senders.write().unwrap_or_else(|e| e.into_inner());
        match senders.iter_mut().find(|(c, _)| *c == channel) {
            Some(entry) => entry.1 = sender,
            None => senders.push((channel, sender)),
        }
        info!(%channel, "sender registered");
    }

    /// Remove the sender for `channel`. Returns whether one was registered.
    pub fn deregister(&self, channel: Channel) -> bool {
        let mut senders = self.senders.write().unwrap_or_else(|e| e.into_inner());
        let before = senders.len();
        senders.retain(|(c, _)| *c != channel);
        let removed = senders.len() != before;
        if removed {
            info!(%channel, "sender deregistered");
        }
        removed
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<dyn ChannelSender>> {
        let senders = self.senders.read().unwrap_or_else(|e| e.into_inner());
        senders
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, s)| Arc::clone(s))
    }

    pub fn has_channel(&self, channel: Channel) -> bool {
        let senders = self.senders.read().unwrap_or_else(|e| e.into_inner());
        senders.iter().any(|(c, _)| *c == channel)
    }

    /// Registered channels in registration order.
    pub fn registered_channels(&self) -> Vec<Channel> {
        let senders = self.senders.read().unwrap_or_else(|e| e.into_inner());
        senders.iter().map(|(c, _)| *c).collect()
    }

    /// Senders exposing the auto-subscribe capability, in priority order.
    pub fn auto_subscribers(&self) -> Vec<Arc<dyn ChannelSender>> {
        let senders = self.senders.read().unwrap_or_else(|e| e.into_inner());
        senders
            .iter()
            .filter(|(_, s)| s.auto_subscriber().is_some())
            .map(|(_, s)| Arc::clone(s))
            .collect()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{AutoSubscribe, DeliveryError, Result, Subscription},
        async_trait::async_trait,
        courier_common::Notification,
    };

    struct Stub {
        channel: Channel,
        tag: &'static str,
        auto: bool,
    }

    #[async_trait]
    impl ChannelSender for Stub {
        fn channel(&self) -> Channel {
            self.channel
        }

        async fn send(
            &self,
            _subscription: &Subscription,
            _notification: &Notification,
        ) -> std::result::Result<(), DeliveryError> {
            Ok(())
        }

        fn auto_subscriber(&self) -> Option<&dyn AutoSubscribe> {
            self.auto.then_some(self as &dyn AutoSubscribe)
        }
    }

    #[async_trait]
    impl AutoSubscribe for Stub {
        async fn can_auto_subscribe(&self) -> Result<()> {
            Ok(())
        }

        async fn auto_subscribe(&self, _app_name: &str) -> Result<String> {
            Ok(self.tag.to_string())
        }
    }

    fn stub(channel: Channel, tag: &'static str, auto: bool) -> Arc<dyn ChannelSender> {
        Arc::new(Stub { channel, tag, auto })
    }

    #[test]
    fn register_get_deregister() {
        let registry = SenderRegistry::new();
        assert!(!registry.has_channel(Channel::Telegram));

        registry.register(stub(Channel::Telegram, "tg", true));
        assert!(registry.has_channel(Channel::Telegram));
        assert!(registry.get(Channel::Telegram).is_some());
        assert!(registry.get(Channel::Signal).is_none());

        assert!(registry.deregister(Channel::Telegram));
        assert!(!registry.deregister(Channel::Telegram));
        assert!(registry.registered_channels().is_empty());
    }

    #[tokio::test]
    async fn replacement_keeps_priority_position() {
        let registry = SenderRegistry::new();
        registry.register(stub(Channel::Signal, "signal-1", true));
        registry.register(stub(Channel::WebPush, "push", false));
        registry.register(stub(Channel::Telegram, "tg", true));
        registry.register(stub(Channel::Signal, "signal-2", true));

        assert_eq!(registry.registered_channels(), vec![
            Channel::Signal,
            Channel::WebPush,
            Channel::Telegram
        ]);

        let chain = registry.auto_subscribers();
        assert_eq!(chain.len(), 2);
        let first = chain[0].auto_subscriber().unwrap();
        assert_eq!(first.auto_subscribe("app").await.unwrap(), "signal-2");
        assert_eq!(chain[1].channel(), Channel::Telegram);
    }

    #[test]
    fn concurrent_register_and_lookup() {
        let registry = Arc::new(SenderRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        if i % 2 == 0 {
                            registry.register(stub(Channel::Telegram, "tg", false));
                            registry.deregister(Channel::Telegram);
                        } else if let Some(sender) = registry.get(Channel::Telegram) {
                            assert_eq!(sender.channel(), Channel::Telegram);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(registry.registered_channels().len() <= 1);
    }
}
