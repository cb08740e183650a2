use courier_channels::DeliveryError;

/// Why a publish failed.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Loading or provisioning subscriptions failed.
    #[error("subscription store error: {0}")]
    Store(#[from] courier_channels::Error),

    /// Nothing was delivered; this is the last subscription failure seen.
    #[error("delivery to subscription {subscription_id} failed: {source}")]
    Delivery {
        subscription_id: String,
        #[source]
        source: DeliveryError,
    },
}

impl PublishError {
    /// Whether the failure came from a sender that classified it permanent.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Delivery { source, .. } if source.is_permanent())
    }
}
