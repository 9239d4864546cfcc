use anyhow::Context;
use backend_lib::{
    audit::audit_credentials,
    auth::Sweeper,
    config::{LogFormat, Settings},
    directory::FlatFileDirectory,
    router, AppState,
};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "taller", about = "Authentication and session server")]
struct Cli {
    /// Config file (defaults to ./taller.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Report which stored credentials still need migration to a hashed format
    AuditCredentials {
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(settings: &Settings) {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match settings.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("loading configuration")?;
    init_tracing(&settings);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings).await,
        Command::AuditCredentials { json } => audit(settings, json).await,
    }
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let bind_addr = settings.server.bind_addr;
    let sweep_every = settings.sweep_interval();

    let state = Arc::new(
        AppState::new(settings)
            .await
            .context("building application state")?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = Arc::new(Sweeper::new(state.auth.clone())).spawn(sweep_every, shutdown_rx);

    let app = router::create_router(state);
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!(addr = %bind_addr, "listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
            info!("shutting down");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(err) = sweeper.await {
        warn!(error = %err, "sweeper task ended abnormally");
    }
    Ok(())
}

async fn audit(settings: Settings, json: bool) -> anyhow::Result<()> {
    let path = &settings.directory.users_file;
    let directory = FlatFileDirectory::open(path)
        .await
        .with_context(|| format!("opening user directory {}", path.display()))?;
    let report = audit_credentials(&directory).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for entry in &report.entries {
            let status = if entry.needs_migration { "NEEDS MIGRATION" } else { "ok" };
            println!("{:<24} {:<32} {:<8} {}", entry.id, entry.email, entry.format.as_str(), status);
        }
        println!(
            "{} hashed, {} need migration",
            report.hashed, report.needs_migration
        );
    }
    Ok(())
}
