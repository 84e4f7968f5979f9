mod run_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "beacon", about = "Beacon, multi-credential gateway presence keeper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path. Defaults to beacon.{toml,yaml,yml,json} in the
    /// working directory, then ~/.config/beacon/.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect every credential and keep the sessions alive.
    Run {
        /// Do not start sessions until an operator asks for them.
        #[arg(long)]
        no_autostart: bool,
        /// Ignore standard input; run until interrupted.
        #[arg(long)]
        no_console: bool,
    },
    /// Validate the configuration and list the configured credentials.
    Check,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "beacon starting");

    let config = beacon_config::discover_and_load(cli.config.as_deref())?;
    match cli.command {
        Commands::Run {
            no_autostart,
            no_console,
        } => run_commands::run(config, !no_autostart, !no_console).await,
        Commands::Check => run_commands::check(&config),
    }
}
