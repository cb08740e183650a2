//! Device linking and the Signal sender's registration lifecycle.
//!
//! Linking is a two-phase flow. [`SignalIntegration::start_link`] returns the
//! `sgnl://linkdevice` URI as soon as signal-cli prints it. The rest of the
//! flow (waiting for the phone to scan it, saving credentials, registering the
//! sender) runs on a spawned task whose outcome is published on a
//! [`watch`] channel and logged.

use std::sync::Arc;

use {
    courier_channels::{Channel, GroupCache, SenderRegistry, SubscriptionStore},
    courier_vault::{CredentialStore, IntegrationType, SignalCredentials},
    futures::future::BoxFuture,
    serde::Serialize,
    tokio::sync::watch,
    tracing::{error, info, warn},
};

use crate::{
    Error, Result,
    client::SignalClient,
    error::Context,
    format::format_phone_number,
    sender::SignalSender,
};

pub const DEFAULT_DEVICE_NAME: &str = "Courier";

/// Progress of the most recent device link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LinkState {
    Idle,
    Pending,
    Linked { phone_number: String },
    Failed { reason: String },
}

/// Returned by [`SignalIntegration::start_link`].
#[derive(Debug)]
pub struct LinkStarted {
    /// URI to render as a QR code for the primary device.
    pub uri: String,
    pub state: watch::Receiver<LinkState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalStatus {
    pub available: bool,
    pub linked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

#[derive(Clone)]
pub struct SignalIntegration {
    client: Arc<dyn SignalClient>,
    credentials: Arc<CredentialStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    groups: Arc<GroupCache>,
    registry: Arc<SenderRegistry>,
    device_name: String,
    state: Arc<watch::Sender<LinkState>>,
}

impl SignalIntegration {
    pub fn new(
        client: Arc<dyn SignalClient>,
        credentials: Arc<CredentialStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        groups: Arc<GroupCache>,
        registry: Arc<SenderRegistry>,
    ) -> Self {
        let (state, _) = watch::channel(LinkState::Idle);
        Self {
            client,
            credentials,
            subscriptions,
            groups,
            registry,
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            state: Arc::new(state),
        }
    }

    #[must_use]
    pub fn with_device_name(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = device_name.into();
        self
    }

    pub fn is_available(&self) -> bool {
        self.client.is_available()
    }

    /// Subscribe to link progress.
    pub fn link_state(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }

    /// The sender as registered, so callers (e.g. admin add-channel) can use
    /// its group handling directly.
    pub fn sender(&self) -> SignalSender {
        SignalSender::new(
            Arc::clone(&self.client),
            Arc::clone(&self.groups),
            Arc::clone(&self.subscriptions),
        )
    }

    fn register_sender(&self) {
        self.registry.register(Arc::new(self.sender()));
    }

    /// Start linking and return the device URI. Completion is reported on
    /// [`LinkStarted::state`]. Only one link runs at a time.
    pub async fn start_link(&self, device_name: Option<&str>) -> Result<LinkStarted> {
        let mut previous = None;
        self.state.send_if_modified(|state| {
            if *state == LinkState::Pending {
                return false;
            }
            previous = Some(std::mem::replace(state, LinkState::Pending));
            true
        });
        let Some(previous) = previous else {
            return Err(Error::message("a signal link is already in progress"));
        };

        let device_name = device_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.device_name.as_str());
        let session = match self.client.start_link(device_name).await {
            Ok(session) => session,
            Err(e) => {
                self.state.send_replace(previous);
                return Err(e);
            },
        };

        let task = tokio::spawn(self.clone().finish_link(session.completion));
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            if let Err(e) = task.await {
                error!(error = %e, "signal link task aborted");
                state.send_replace(LinkState::Failed {
                    reason: format!("link task aborted: {e}"),
                });
            }
        });

        Ok(LinkStarted {
            uri: session.uri,
            state: self.state.subscribe(),
        })
    }

    async fn finish_link(self, completion: BoxFuture<'static, Result<()>>) {
        let outcome = match completion.await {
            Ok(()) => self.complete_link().await,
            Err(e) => Err(e),
        };

        let state = match outcome {
            Ok(number) => {
                info!(phone_number = %format_phone_number(&number), "signal device linked");
                LinkState::Linked {
                    phone_number: number,
                }
            },
            Err(e) => {
                error!(error = %e, "signal device link failed");
                LinkState::Failed {
                    reason: e.to_string(),
                }
            },
        };
        self.state.send_replace(state);
    }

    async fn complete_link(&self) -> Result<String> {
        let account = self
            .client
            .linked_account()
            .await?
            .context("link finished but no account was found")?;

        self.credentials
            .save_signal(&SignalCredentials {
                phone_number: account.number.clone(),
                linked: true,
            })
            .await?;
        self.register_sender();
        Ok(account.number)
    }

    pub async fn status(&self) -> Result<SignalStatus> {
        let account = self.client.linked_account().await?;
        Ok(SignalStatus {
            available: self.client.is_available(),
            linked: account.is_some(),
            phone_number: account.map(|a| a.number),
        })
    }

    /// Stop delivering and forget the stored account. Subscriptions are kept:
    /// their groups stay valid if the same account links again, and the
    /// sender rejects groups owned by any other account.
    pub async fn unlink(&self) -> Result<bool> {
        let had_sender = self.registry.deregister(Channel::Signal);
        let had_credentials = self
            .credentials
            .delete_integration(IntegrationType::Signal)
            .await?;
        self.state.send_replace(LinkState::Idle);

        info!(had_sender, had_credentials, "signal unlinked");
        Ok(had_sender || had_credentials)
    }

    /// Register the sender at startup when signal-cli still has a linked
    /// account. Returns whether it was registered.
    pub async fn restore(&self) -> Result<bool> {
        if !self.client.is_available() {
            warn!("signal enabled but signal-cli was not found");
            return Ok(false);
        }

        let Some(account) = self.client.linked_account().await? else {
            info!("signal enabled, no linked account");
            return Ok(false);
        };

        let saved = match self.credentials.get_signal().await {
            Ok(saved) => Some(saved),
            Err(e) if e.is_not_configured() => None,
            Err(e) => return Err(e.into()),
        };
        if saved.is_none_or(|s| s.phone_number != account.number) {
            self.credentials
                .save_signal(&SignalCredentials {
                    phone_number: account.number.clone(),
                    linked: true,
                })
                .await?;
        }

        self.register_sender();
        self.state.send_replace(LinkState::Linked {
            phone_number: account.number.clone(),
        });
        info!(phone_number = %format_phone_number(&account.number), "signal sender restored");
        Ok(true)
    }
}
