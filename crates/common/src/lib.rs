//! Shared types, error definitions, and database helpers used across all
//! courier crates.

pub mod db;
pub mod error;
pub mod types;

pub use {
    error::{CourierError, Error, FromMessage, Result},
    types::{Action, Notification},
};
