use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context};
use marinelink_api::{router, AppState};
use marinelink_broker_bridge::BrokerBridge;
use marinelink_command_ledger::{CommandPublisher, NoopPublisher};
use marinelink_core::{logging, Config, Database};
use marinelink_crypto::{CredentialStore, MasterKey};
use marinelink_fleet_status::{FanoutHub, FeedServer};
use marinelink_domain::BoatRepository;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

fn load_config() -> anyhow::Result<Config> {
    let mut args = std::env::args().skip(1);
    let mut config = match (args.next().as_deref(), args.next()) {
        (Some("--config"), Some(path)) => Config::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        (None, _) => Config::default_config(),
        _ => bail!("usage: marinelink-api [--config <path>]"),
    };
    config.apply_env_overrides()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    logging::init_with(config.server.log_format);

    if config.credentials.master_key_hex.is_empty() {
        bail!("master key missing: set credentials.master_key_hex or MARINELINK_MASTER_KEY");
    }
    let master = MasterKey::from_hex(&config.credentials.master_key_hex, config.credentials.key_epoch)
        .context("invalid master key")?;
    let credentials = Arc::new(CredentialStore::new(master));

    let db = Database::open(&config.database.path, config.database.busy_timeout_ms)?;
    let hub = Arc::new(FanoutHub::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut bridge = None;
    let publisher: Arc<dyn CommandPublisher> = if config.broker.enabled {
        let handler = AppState::inbound_handler(&config, &db, &hub);
        let (supervisor, handle) = BrokerBridge::new(config.broker.clone(), handler);
        bridge = Some((supervisor, handle.clone()));
        Arc::new(handle)
    } else {
        warn!("Broker disabled, devices must poll for commands");
        Arc::new(NoopPublisher)
    };

    let mut state = AppState::new(config.clone(), db.clone(), credentials, publisher, hub.clone());

    let mut tasks = Vec::new();
    if let Some((bridge, handle)) = bridge {
        state = state.with_bridge(handle);
        tasks.push(tokio::spawn(bridge.run(shutdown_rx.clone())));
    }

    let ws_addr: SocketAddr = config
        .server
        .ws_addr
        .parse()
        .with_context(|| format!("invalid ws_addr {}", config.server.ws_addr))?;
    let feed = Arc::new(FeedServer::new(ws_addr, hub, BoatRepository::new(db)));
    let feed_shutdown = shutdown_rx.clone();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = feed.run(feed_shutdown).await {
            error!("Realtime feed failed: {}", e);
        }
    }));

    let app = router(Arc::new(state));
    let listener = TcpListener::bind(&config.server.http_addr).await?;
    info!("MarineLink API listening on {}", config.server.http_addr);

    let mut http_shutdown = shutdown_rx.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = http_shutdown.changed().await;
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    for task in tasks {
        if let Err(e) = task.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }
    info!("MarineLink API stopped");
    Ok(())
}
