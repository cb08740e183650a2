//! The publish path: resolve an app's subscriptions, auto-provision one when
//! there are none, and deliver to each through its channel sender with
//! per-subscription retry.

pub mod error;
pub mod publisher;
pub mod retry;

pub use {
    error::PublishError,
    publisher::{PublishReport, Publisher},
    retry::{RetryPolicy, Sleep, TokioSleep},
};
