//! HTTP surface of the relay.
//!
//! A thin axum layer over the delivery core: publish (JSON and simple text),
//! web-push registration, admin CRUD over apps and subscriptions, and the
//! link flows of the account-backed channels. Everything but `/health`
//! requires the API key.

pub mod admin;
pub mod auth;
pub mod error;
pub mod integrations;
pub mod publish;
pub mod server;
pub mod state;
pub mod webpush_routes;

pub use {
    error::{ApiError, ApiResult},
    server::{build_gateway_app, start_gateway},
    state::{AppState, GatewayState},
};
