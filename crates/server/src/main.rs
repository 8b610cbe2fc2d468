//! granary-server — HTTP front of the canonical commodity-statistics
//! store. Loads the last snapshot, applies the seed file, serves the
//! store API, and flushes a final snapshot on shutdown.

mod api;
mod auth;
mod background;
mod router;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tracing::info;

use granary_core::Config;
use granary_store::{GranaryStore, SeedFile, SnapshotStore};

use crate::auth::AuthTokens;
use crate::state::AppState;

// ── CLI ─────────────────────────────────────────────────────────────

/// Canonical ingestion store for commodity statistics.
#[derive(Parser, Debug)]
#[command(name = "granary-server", version, about)]
struct Cli {
    /// Data directory for snapshots (overrides GRANARY_DATA_DIR).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// TOML seed file applied at startup (overrides GRANARY_SEED_FILE).
    #[arg(long)]
    seed_file: Option<PathBuf>,

    /// Listen port (overrides GRANARY_PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Run fully in memory: no snapshot load or flush.
    #[arg(long)]
    ephemeral: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    granary_core::config::load_dotenv();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(seed_file) = cli.seed_file {
        config.storage.seed_file = Some(seed_file);
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.log_summary();

    let store = Arc::new(GranaryStore::new());

    // Restore the last snapshot before anything writes.
    let snapshots = if cli.ephemeral {
        info!("running ephemeral — snapshots disabled");
        None
    } else {
        let snapshots = SnapshotStore::new(config.storage.data_dir.join("granary"))?;
        match snapshots.load(&store)? {
            Some(manifest) => info!(saved_at = %manifest.saved_at, "restored snapshot"),
            None => info!("no snapshot found, starting fresh"),
        }
        Some(snapshots)
    };

    // Seed dimension reference rows (idempotent over restored data).
    if let Some(seed_path) = &config.storage.seed_file {
        let seed = SeedFile::from_path(seed_path)?;
        seed.apply(&store.dimensions)?;
    }

    let state = Arc::new(AppState {
        store: store.clone(),
        snapshots,
        auth: AuthTokens::from_config(&config.auth),
        started_at: Utc::now(),
    });

    background::spawn_snapshot_flush(state.clone(), config.storage.snapshot_interval_secs);
    background::spawn_run_reaper(state.clone(), config.storage.stale_run_max_age_mins);

    let app = router::build(state.clone());
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("granary-server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Final flush so a clean shutdown never loses writes.
    if let Some(snapshots) = &state.snapshots {
        let manifest = snapshots.save(&state.store)?;
        info!(observations = manifest.observations, "final snapshot flushed");
    }
    info!("granary-server exited cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
