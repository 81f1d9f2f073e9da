//! MicroMarket HTTP server.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use micromarket::config::Configuration;
use micromarket::{app, initialize_state, seed, telemetry};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Parser)]
#[command(version, about = "Product catalog API with per-user favorites")]
struct Cli {
    /// Path of the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the HTTP server (default).
    Serve {
        /// Load demo data before serving.
        #[arg(long)]
        seed: bool,
    },
    /// Wipe the store and load demo data.
    Seed,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Configuration::default().path(cli.config.clone()).read()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "micromarket=info,tower_http=info".into());
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer());

    match config.telemetry.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let provider = telemetry::setup_tracer(endpoint)
                .map_err(|err| err.to_string())?;
            opentelemetry::global::set_tracer_provider(provider);

            let logs = telemetry::setup_logging(endpoint).map_err(|err| err.to_string())?;
            registry.with(logs).init();
        },
        None => registry.init(),
    }

    if !cli.config.is_file() {
        tracing::warn!(path = %cli.config.display(), "configuration file not found, using defaults");
    }

    let state = initialize_state(config.clone()).await?;

    match cli.command.unwrap_or(Command::Serve { seed: false }) {
        Command::Seed => {
            seed::run(&state).await?;
        },
        Command::Serve { seed: with_seed } => {
            if with_seed {
                seed::run(&state).await?;
            }

            let listener = tokio::net::TcpListener::bind(&config.address).await?;
            tracing::info!(address = %config.address, "micromarket listening");

            axum::serve(listener, app(state))
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        },
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "cannot listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(err) => {
                tracing::error!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received, starting graceful shutdown");
}
