//! Configuration loading, env substitution, env overrides, and validation.
//!
//! Config files: `courier.toml`, `courier.yaml`, or `courier.json`
//! Searched in `./` then `~/.config/courier/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{
        CourierConfig, DeliveryConfig, ServerConfig, SignalConfig, StorageConfig, TelegramConfig,
        WebPushConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
