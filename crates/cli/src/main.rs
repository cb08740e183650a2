mod app_commands;
mod config_commands;
mod credentials_commands;
mod runtime;

use std::{path::PathBuf, sync::Arc};

use {
    clap::{Parser, Subcommand},
    courier_common::Notification,
    courier_config::CourierConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::runtime::Runtime;

#[derive(Parser)]
#[command(name = "courier", about = "Courier, a self-hosted notification relay", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery in ./ and ~/.config/courier/).
    #[arg(long, short, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway (default when no subcommand is provided).
    Serve,
    /// Publish one notification through the configured channels.
    Publish {
        /// App to publish as.
        app: String,
        /// Message body.
        message: String,
        #[arg(long, short)]
        title: Option<String>,
        #[arg(long)]
        tag: Option<String>,
    },
    /// App and subscription management.
    Apps {
        #[command(subcommand)]
        action: app_commands::AppAction,
    },
    /// Stored integration credentials.
    Credentials {
        #[command(subcommand)]
        action: credentials_commands::CredentialsAction,
    },
    /// Configuration checks.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Load the config and refuse to continue when it has errors.
fn load_config(cli: &Cli) -> anyhow::Result<CourierConfig> {
    let mut config = courier_config::discover_and_load(cli.config.as_deref());
    if let Some(ref bind) = cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let result = courier_config::validate(&config);
    if result.has_errors() {
        config_commands::print_diagnostics(&result);
        anyhow::bail!("configuration is invalid, see `courier config check`");
    }
    for d in result.of(courier_config::Severity::Warning) {
        tracing::warn!(path = d.path, "{}", d.message);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mut cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "courier starting");

    let command = cli.command.take();
    if let Some(Commands::Config { action }) = command {
        let config = courier_config::discover_and_load(cli.config.as_deref());
        return config_commands::handle_config(&config, action);
    }

    let config = load_config(&cli)?;
    match command {
        None | Some(Commands::Serve) => serve(config).await,
        Some(Commands::Publish {
            app,
            message,
            title,
            tag,
        }) => publish(&config, &app, message, title, tag).await,
        Some(Commands::Apps { action }) => app_commands::handle_apps(&config, action).await,
        Some(Commands::Credentials { action }) => {
            credentials_commands::handle_credentials(&config, action).await
        },
        Some(Commands::Config { .. }) => Ok(()),
    }
}

async fn serve(config: CourierConfig) -> anyhow::Result<()> {
    let runtime = Runtime::build(&config).await?;
    let state = Arc::new(runtime.into_gateway_state(&config));
    courier_gateway::start_gateway(state, &config.server.bind, config.server.port).await
}

async fn publish(
    config: &CourierConfig,
    app: &str,
    message: String,
    title: Option<String>,
    tag: Option<String>,
) -> anyhow::Result<()> {
    courier_channels::validate_app_name(app)?;
    let runtime = Runtime::build(config).await?;
    let notification = Notification {
        title,
        tag,
        ..Notification::new(message)
    };

    let report = runtime.publisher.publish(app, &notification).await?;
    if report.is_dropped() {
        eprintln!("No deliverable subscriptions for '{app}'; notification dropped.");
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
