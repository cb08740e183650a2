//! Browser push and plain HTTP callback delivery.
//!
//! Registrations carry cryptographic material supplied by clients, so every
//! key is decoded and checked against the P-256 curve before a subscription
//! is persisted ([`validate`]). The [`WebPushSender`] then delivers either an
//! `aes128gcm` encrypted, VAPID-signed push or a plain JSON `POST`.

pub mod registration;
pub mod sender;
pub mod validate;

pub use {
    registration::{RegistrationRequest, register, unregister},
    sender::{WebPushSender, WebPushSenderConfig},
    validate::{ValidationError, normalize_key, validate_target},
};
