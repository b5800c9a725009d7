//! Process entry point: opens both stores, spawns one task per venue
//! collector, spawns the two scheduler loops, and serves the read-only
//! HTTP API. Structured the same way the teacher's `main.rs` wires
//! together its scraper fan-out, background passes, and axum server.

use anyhow::Result;
use dotenv::dotenv;
use funding_aggregator::api::{router, AppState};
use funding_aggregator::collectors::{
    aster, edgex, extended, flx, hyena, hyperliquid, km, lighter, pacifica, paradex, supervisor,
    variational, vntl, xyz, Command, PollingCollector, StreamingCollector,
};
use funding_aggregator::config::Config;
use funding_aggregator::scheduler;
use funding_aggregator::storage::{PrimaryStore, UnifiedStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Spawns a polling collector on its own task with a command channel,
/// discarding the channel's sender since nothing currently issues
/// `Start`/`Stop`/`Status` commands — wired up for a future admin
/// surface, matching the teacher's `Command`-channel shape in
/// `collectors::supervisor`.
fn spawn_polling(collector: impl PollingCollector + 'static, store: Arc<PrimaryStore>) {
    let (_tx, rx) = mpsc::channel::<Command>(8);
    tokio::spawn(supervisor::run_polling(Arc::new(collector), store, rx));
}

fn spawn_streaming(collector: impl StreamingCollector + 'static, store: Arc<PrimaryStore>) {
    let (_tx, rx) = mpsc::channel::<Command>(8);
    tokio::spawn(supervisor::run_streaming(Arc::new(collector), store, rx));
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let config = Config::from_env();
    init_tracing(&config.log_filter);

    info!(
        primary_db = %config.primary_db_path,
        unified_db = %config.unified_db_path,
        "starting funding-rate aggregator"
    );

    let primary = Arc::new(PrimaryStore::open(&config.primary_db_path)?);
    let unified = Arc::new(UnifiedStore::open(&config.unified_db_path)?);

    spawn_polling(hyperliquid::HyperliquidCollector, primary.clone());
    spawn_polling(hyena::HyenaCollector, primary.clone());
    spawn_polling(xyz::XyzCollector, primary.clone());
    spawn_polling(flx::FlxCollector, primary.clone());
    spawn_polling(vntl::VntlCollector, primary.clone());
    spawn_polling(km::KmCollector, primary.clone());
    spawn_polling(variational::VariationalCollector, primary.clone());
    spawn_polling(extended::ExtendedCollector, primary.clone());
    spawn_polling(aster::AsterCollector, primary.clone());
    spawn_streaming(edgex::EdgeXCollector, primary.clone());
    spawn_streaming(lighter::LighterCollector, primary.clone());
    spawn_streaming(paradex::ParadexCollector, primary.clone());
    spawn_streaming(pacifica::PacificaCollector, primary.clone());

    let _schedule_handles = scheduler::spawn(primary.clone(), unified.clone());

    let state = AppState { primary, unified };
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&config.http_bind_addr).await?;
    info!(addr = %config.http_bind_addr, "http api listening");
    axum::serve(listener, app).await?;

    Ok(())
}
