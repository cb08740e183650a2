//! Signal group-messaging channel for courier, driven through `signal-cli`.
//!
//! Each app gets its own group owned by the linked account. The group id is
//! cached per app so re-subscribing an app reuses its group.

pub mod client;
pub mod error;
pub mod format;
pub mod integration;
pub mod sender;

pub use {
    client::{Account, LinkSession, SignalCli, SignalClient},
    error::{Error, Result},
    integration::{LinkStarted, LinkState, SignalIntegration, SignalStatus},
    sender::SignalSender,
};
