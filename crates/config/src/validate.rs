//! Semantic validation of a loaded configuration.
//!
//! Parsing already rejects malformed files; this pass catches values that
//! parse fine but cannot work (no API key, zero retry attempts, ...).

use crate::schema::CourierConfig;

/// Keys shorter than this are accepted with a warning.
const MIN_RECOMMENDED_API_KEY_LEN: usize = 16;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "delivery.max_attempts"
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Iterate over diagnostics of one severity.
    pub fn of(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.severity == severity)
    }

    fn push(&mut self, severity: Severity, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path,
            message: message.into(),
        });
    }
}

/// Validate a configuration.
#[must_use]
pub fn validate(config: &CourierConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    let api_key = config.api_key();
    if api_key.trim().is_empty() {
        result.push(
            Severity::Error,
            "api_key",
            "an API key is required (set api_key or COURIER_API_KEY)",
        );
    } else if api_key.len() < MIN_RECOMMENDED_API_KEY_LEN {
        result.push(
            Severity::Warning,
            "api_key",
            format!("API key is shorter than {MIN_RECOMMENDED_API_KEY_LEN} characters"),
        );
    }

    if config.server.port == 0 {
        result.push(Severity::Error, "server.port", "port must be non-zero");
    }

    if config.delivery.max_attempts == 0 {
        result.push(
            Severity::Error,
            "delivery.max_attempts",
            "at least one delivery attempt is required",
        );
    }
    if config.delivery.base_delay_ms == 0 {
        result.push(
            Severity::Warning,
            "delivery.base_delay_ms",
            "retries will run back-to-back without backoff",
        );
    }

    if config.signal.enabled && config.signal.cli_path.as_os_str().is_empty() {
        result.push(
            Severity::Error,
            "signal.cli_path",
            "signal is enabled but no signal-cli path is set",
        );
    }

    let subscriber = config.webpush.subscriber.as_str();
    if !(subscriber.starts_with("mailto:") || subscriber.starts_with("https://")) {
        result.push(
            Severity::Warning,
            "webpush.subscriber",
            "VAPID subscriber should be a mailto: or https:// URI",
        );
    }

    result
}
