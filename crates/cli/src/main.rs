mod auth_commands;
mod config;
mod sso_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "tollgate", about = "Tollgate: logins and fresh tokens for API tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Path to config.toml (defaults to the platform config directory).
    #[arg(long, global = true, env = "TOLLGATE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// OAuth2 authorization-code providers.
    Auth {
        #[command(subcommand)]
        action: auth_commands::AuthAction,
    },
    /// Username/password SSO login with OAuth1 to OAuth2 exchange.
    Sso {
        #[command(subcommand)]
        action: sso_commands::SsoAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // Logs go to stderr so `token` output stays pipeable.
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "tollgate starting");

    let config = Config::load(cli.config.as_deref())?;
    debug!(store = ?config.secret_store, "loaded config");

    match cli.command {
        Commands::Auth { action } => auth_commands::handle_auth(action, &config).await,
        Commands::Sso { action } => sso_commands::handle_sso(action, &config).await,
    }
}
