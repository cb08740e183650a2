use {
    anyhow::Result,
    clap::Subcommand,
    courier_config::{CourierConfig, Severity, ValidationResult},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration and report errors and warnings.
    Check,
}

pub fn handle_config(config: &CourierConfig, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check => {
            let result = courier_config::validate(config);
            print_diagnostics(&result);
            if result.has_errors() {
                anyhow::bail!("configuration is invalid");
            }
            Ok(())
        },
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub fn print_diagnostics(result: &ValidationResult) {
    for d in &result.diagnostics {
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
        };
        eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
    }

    let errors = result.of(Severity::Error).count();
    let warnings = result.of(Severity::Warning).count();
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }
}
