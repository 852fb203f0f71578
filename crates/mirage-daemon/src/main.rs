//! mirage-daemon binary.
//!
//! Wires configuration, logging, the session store, the optional
//! generative responder, and the TCP listener together, then runs
//! until an operator interrupt. The responder credential is read from
//! the environment at startup; when it is absent the daemon runs in
//! local-only mode and says so — a missing backend is a normal mode,
//! never a startup failure.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mirage_core::config::HoneypotConfig;
use mirage_daemon::listener::ConnectionListener;
use mirage_daemon::pipeline::CommandPipeline;
use mirage_daemon::responder::{HttpBackend, RemoteResponder};
use mirage_daemon::store::{SessionStore, SqliteSessionStore};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "mirage-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to TOML configuration file (defaults apply if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address (host:port)
    #[arg(long)]
    listen: Option<String>,

    /// Override the session database path
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&args)?;
    let bind_addr = config.bind_addr().context("invalid bind address")?;

    let store = SqliteSessionStore::open(&config.store.db_path).with_context(|| {
        format!(
            "failed to open session database {}",
            config.store.db_path.display()
        )
    })?;
    info!(db = %config.store.db_path.display(), "Session store ready");

    let pipeline = Arc::new(CommandPipeline::new(build_responder(&config)));
    let store: Arc<dyn SessionStore> = Arc::new(store);

    let listener = ConnectionListener::bind(bind_addr, config.listener.max_connections)
        .await
        .context("failed to start listener")?;
    info!(
        addr = %listener.local_addr(),
        max_connections = config.listener.max_connections,
        "Honeypot listening"
    );

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    listener.serve(pipeline, store, shutdown).await;

    info!("Shutdown complete");
    Ok(())
}

/// Load the config file (or defaults) and apply CLI overrides.
fn load_config(args: &Args) -> Result<HoneypotConfig> {
    let mut config = match &args.config {
        Some(path) => HoneypotConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => HoneypotConfig::default(),
    };

    if let Some(listen) = &args.listen {
        config.listener.bind_addr = listen.clone();
    }
    if let Some(db) = &args.db {
        config.store.db_path = db.clone();
    }

    Ok(config)
}

/// Build the generative responder if it is configured and a credential
/// is present. Every disabled path is surfaced at startup.
fn build_responder(config: &HoneypotConfig) -> Option<RemoteResponder> {
    let Some(responder_config) = &config.responder else {
        info!("No [responder] configured; running local-only");
        return None;
    };

    let api_key = match std::env::var(&responder_config.api_key_env) {
        Ok(key) if !key.trim().is_empty() => SecretString::new(key),
        _ => {
            info!(
                env_var = %responder_config.api_key_env,
                "Responder credential not set; running local-only"
            );
            return None;
        },
    };

    match HttpBackend::new(
        responder_config.endpoint.clone(),
        responder_config.model.clone(),
        api_key,
    ) {
        Ok(backend) => {
            info!(
                endpoint = %responder_config.endpoint,
                model = %responder_config.model,
                "Generative responder enabled"
            );
            Some(RemoteResponder::new(
                Box::new(backend),
                responder_config.retry.clone(),
            ))
        },
        Err(error) => {
            warn!(%error, "Responder initialization failed; running local-only");
            None
        },
    }
}

/// Stop accepting on SIGINT/SIGTERM; active sessions then finalize.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sig) => sig,
                Err(error) => {
                    warn!(%error, "Failed to register SIGTERM handler");
                    return;
                },
            };
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(sig) => sig,
                Err(error) => {
                    warn!(%error, "Failed to register SIGINT handler");
                    return;
                },
            };

            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                _ = sigint.recv() => info!("Received SIGINT, shutting down"),
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(%error, "Failed to wait for ctrl-c");
                return;
            }
            info!("Received interrupt, shutting down");
        }

        shutdown.cancel();
    });
}
