//! bid-radar daemon entrypoint.
//! Wires the store, listing source, notifier and generator into the engine,
//! starts the poll loop and serves the command bridge over HTTP.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bid_radar::badge::LogIndicator;
use bid_radar::config::DaemonConfig;
use bid_radar::generate::BidGenerator;
use bid_radar::ingest::providers::freelancer::FreelancerProvider;
use bid_radar::ingest::scheduler::spawn_poll_loop;
use bid_radar::metrics::Metrics;
use bid_radar::notify::{DesktopNotifier, SystemOpener};
use bid_radar::store::JsonFileStore;
use bid_radar::{create_router, spawn_bridge, AppState, Bridge, Engine, EngineParts};

/// `BID_RADAR_LOG_FORMAT=json` switches to structured JSON lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bid_radar=info,warn"));

    let json = std::env::var("BID_RADAR_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = DaemonConfig::load_default().context("load daemon config")?;
    let metrics = Metrics::init()?;

    let store = JsonFileStore::open(&cfg.storage.path)
        .await
        .with_context(|| format!("open state file {}", cfg.storage.path.display()))?;
    let source = FreelancerProvider::from_config(&cfg).context("build listing source")?;
    let generator = BidGenerator::from_config(&cfg).context("build generator")?;

    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let engine = Arc::new(
        Engine::new(EngineParts {
            store: Arc::new(store),
            source: Arc::new(source),
            notifier: Arc::new(DesktopNotifier::new("bid-radar", events_tx)),
            opener: Arc::new(SystemOpener),
            generator: Arc::new(generator),
            indicator: Arc::new(LogIndicator),
            retention: cfg.storage.retention,
        })
        .await
        .context("start engine")?,
    );

    engine.scheduler().spawn_event_loop(events_rx);

    // Startup cycle, then the recurring timer.
    engine.run_cycle().await;
    spawn_poll_loop(Arc::clone(&engine));

    let (bridge, _bridge_task) = spawn_bridge(Bridge::new(Arc::clone(&engine)), 64);
    let app = create_router(AppState { engine, bridge }).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.server.listen)
        .await
        .with_context(|| format!("bind {}", cfg.server.listen))?;
    tracing::info!(addr = %cfg.server.listen, "listening");

    axum::serve(listener, app).await.context("http server")?;
    Ok(())
}
