use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::CourierConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "courier.toml",
    "courier.yaml",
    "courier.yml",
    "courier.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<CourierConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply environment
/// overrides.
///
/// Search order:
/// 1. `explicit` when given
/// 2. `./courier.{toml,yaml,yml,json}` (project-local)
/// 3. `~/.config/courier/courier.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `CourierConfig::default()` if no file is found or the file
/// fails to parse.
pub fn discover_and_load(explicit: Option<&Path>) -> CourierConfig {
    let path = explicit.map(Path::to_path_buf).or_else(find_config_file);
    let mut config = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            match load_config(&path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                    CourierConfig::default()
                },
            }
        },
        None => {
            debug!("no config file found, using defaults");
            CourierConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Apply `COURIER_*` environment variables on top of file values.
pub fn apply_env_overrides(config: &mut CourierConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut CourierConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(key) = get("COURIER_API_KEY") {
        config.api_key = Some(Secret::new(key));
    }
    if let Some(bind) = get("COURIER_BIND") {
        config.server.bind = bind;
    }
    if let Some(port) = get("COURIER_PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(e) => warn!(value = %port, error = %e, "ignoring invalid COURIER_PORT"),
        }
    }
    if let Some(path) = get("COURIER_DATABASE_PATH") {
        config.storage.database_path = PathBuf::from(path);
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/courier/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "courier").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<CourierConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
