//! # MT5 Sync — Closed-Trade Synchronizer
//!
//! ```text
//!  ┌──────────────┐  deals / balance   ┌─────────────────┐  trades/<ticket>   ┌──────────────────┐
//!  │  MT5 Bridge  │ ─────────────────▶ │   Sync Engine   │ ─────────────────▶ │  Firebase RTDB   │
//!  │  (EA / HTTP) │ ◀── health probe ─ │  (Supervisor)   │ ── mt5Status ────▶ │                  │
//!  └──────────────┘                    └─────────────────┘                    └──────────────────┘
//! ```
//!
//! ## Environment Variables
//!
//! | Variable                        | Default                 | Description                          |
//! |---------------------------------|-------------------------|--------------------------------------|
//! | `MT5_ACCOUNT`                   | `0`                     | Terminal account login               |
//! | `MT5_PASSWORD`                  | (empty)                 | Terminal password                    |
//! | `MT5_SERVER`                    | `MetaQuotes-Demo`       | Terminal server                      |
//! | `MT5_BASE_URL`                  | `http://localhost:8081` | MT5 bridge EA, or `mock`             |
//! | `FIREBASE_DB_URL`               | `memory`                | Realtime Database URL, or `memory`   |
//! | `FIREBASE_AUTH`                 | —                       | Database secret / ID token           |
//! | `SYNC_INTERVAL_SECS`            | `10`                    | Poll interval                        |
//! | `SYNC_LOOKBACK_DAYS`            | `30`                    | Deal history window                  |
//! | `RECONNECT_MAX_RETRIES`         | `3`                     | Logins before the long backoff       |
//! | `RECONNECT_SHORT_BACKOFF_SECS`  | `5`                     | Wait between failed logins           |
//! | `RECONNECT_LONG_BACKOFF_SECS`   | `30`                    | Wait after max retries               |
//! | `HTTP_TIMEOUT_SECS`             | `10`                    | Per-request timeout                  |
//! | `RUST_LOG`                      | `mt5_sync=debug`        | Tracing filter                       |

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod engine;
mod error;
mod models;
mod source;
mod store;

use config::Config;
use engine::{status::StatusPublisher, supervisor::Supervisor, sync::SyncEngine};
use source::{BridgeSource, DealSource, MockTerminal};
use store::{FirebaseStore, MemoryStore, Store, STATUS_PATH};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env ──────────────────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ─────────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("mt5_sync=debug".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    info!(r#"

  ╔═══════════════════════════════════════════════╗
  ║        MT5 SYNC — Closed-Trade Mirror         ║
  ║        MetaTrader 5  ·  Firebase RTDB         ║
  ╚═══════════════════════════════════════════════╝"#);

    let config = Config::from_env().context("Failed to load config")?;

    info!(
        account       = config.credentials.login,
        server        = %config.credentials.server,
        mt5           = %config.mt5_base_url,
        store         = %config.firebase_url,
        interval      = ?config.poll_interval,
        lookback_days = config.lookback_days,
        "MT5 Sync configured"
    );

    // ── 3. Remote store ───────────────────────────────────────────────────────
    let store: Arc<dyn Store> = if config.firebase_url == "memory" {
        warn!("FIREBASE_DB_URL not set — trades are kept IN MEMORY only");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(
            FirebaseStore::new(&config.firebase_url, config.firebase_auth.clone(), config.http_timeout)
                .context("Failed to build Firebase client")?,
        )
    };

    store
        .read_subtree(STATUS_PATH)
        .await
        .context("Remote store unreachable")?;
    info!("✅ Store reachable");

    // ── 4. Terminal ───────────────────────────────────────────────────────────
    let source: Arc<dyn DealSource> = if config.mt5_base_url == "mock" {
        warn!("MT5_BASE_URL=mock — using MOCK terminal history");
        Arc::new(MockTerminal::demo(&config.credentials))
    } else {
        Arc::new(
            BridgeSource::new(&config.mt5_base_url, config.http_timeout)
                .context("Failed to build MT5 bridge client")?,
        )
    };

    // ── 5. Initial login (fatal on failure) ───────────────────────────────────
    let engine = SyncEngine::new(config.lookback_days, StatusPublisher::new(&config.credentials));
    let mut supervisor = Supervisor::new(
        source,
        store,
        config.credentials.clone(),
        engine,
        config.retry,
        config.poll_interval,
    );

    supervisor
        .start()
        .await
        .context("Initial MT5 login failed — make sure the terminal is running and logged in")?;
    info!(state = ?supervisor.state(), "🔄 Performing initial sync...");

    // ── 6. Stop signal ────────────────────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("⏹️  Stop requested by user"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C — stopping"),
        }
        let _ = stop_tx.send(true);
    });

    // ── 7. Monitor loop ───────────────────────────────────────────────────────
    supervisor.run(stop_rx).await;

    info!("👋 MT5 Sync stopped cleanly");
    Ok(())
}
