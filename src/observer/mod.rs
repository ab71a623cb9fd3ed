pub mod http;

#[cfg(test)]
mod tests;

use std::net::{IpAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread::JoinHandle;

use hiro_system_kit::slog;
use rocket::config::{self, Config as RocketConfig, LogLevel};
use rocket::data::{Limits, ToByteUnit};
use rocket::{Build, Rocket, Shutdown};

use crate::config::{Config, EventObserverConfig};
use crate::datastore::DataStore;
use crate::indexer::Indexer;
use crate::ingestion::MessageHandlers;
use crate::monitoring::{start_serving_prometheus_metrics, PrometheusMonitoring};
use crate::utils::Context;
use crate::{try_info, try_warn};

use self::http::ObserverState;

/// Notifications that can be replayed from the archive, and are only
/// archived while the node is still in initial block download
pub const IBD_PRUNABLE_PATHS: [&str; 3] = ["/new_mempool_tx", "/drop_mempool_tx", "/new_microblocks"];

pub struct EventObserver {
    pub shutdown: Shutdown,
    pub server: JoinHandle<()>,
    pub handlers: Arc<MessageHandlers>,
}

impl EventObserver {
    /// Notifies rocket and waits for the server thread
    pub fn terminate(self) {
        self.shutdown.notify();
        let _ = self.server.join();
    }
}

pub fn build_rocket(
    observer_config: &EventObserverConfig,
    address: IpAddr,
    state: ObserverState,
) -> Rocket<Build> {
    let body_limit = observer_config.body_limit_mb.megabytes();
    let limits = Limits::default()
        .limit("string", body_limit)
        .limit("json", body_limit);
    let mut shutdown_config = config::Shutdown::default();
    shutdown_config.ctrlc = false;
    shutdown_config.grace = 1;
    shutdown_config.mercy = 1;

    let rocket_config = RocketConfig {
        port: observer_config.port,
        workers: observer_config.workers,
        address,
        keep_alive: 5,
        temp_dir: std::env::temp_dir().into(),
        log_level: LogLevel::Off,
        cli_colors: false,
        limits,
        shutdown: shutdown_config,
        ..RocketConfig::default()
    };

    let routes = rocket::routes![
        http::handle_ready,
        http::handle_new_block,
        http::handle_new_burn_block,
        http::handle_new_mempool_tx,
        http::handle_drop_mempool_tx,
        http::handle_new_attachments,
        http::handle_new_microblocks,
        http::handle_unknown_path,
    ];

    rocket::custom(rocket_config).manage(state).mount("/", routes)
}

fn resolve_address(host: &str, port: u16) -> Result<IpAddr, String> {
    if let Ok(address) = host.parse::<IpAddr>() {
        return Ok(address);
    }
    (host, port)
        .to_socket_addrs()
        .map_err(|e| format!("unable to resolve {}: {}", host, e))?
        .next()
        .map(|socket| socket.ip())
        .ok_or(format!("unable to resolve {}", host))
}

pub async fn start_event_observer(
    config: &Config,
    datastore: Arc<dyn DataStore>,
    ctx: Context,
) -> Result<EventObserver, String> {
    let prometheus_monitoring = PrometheusMonitoring::new()?;
    if let Some(port) = config.monitoring.prometheus_port {
        let registry_moved = prometheus_monitoring.registry.clone();
        let ctx_cloned = ctx.clone();
        let _ = hiro_system_kit::thread_named("Prometheus monitoring").spawn(move || {
            hiro_system_kit::nestable_block_on(start_serving_prometheus_metrics(
                port,
                registry_moved,
                ctx_cloned,
            ));
        });
    }

    let handlers = Arc::new(MessageHandlers::new(
        Indexer::new(config.indexer_config()),
        datastore,
        prometheus_monitoring,
        ctx.clone(),
    ));

    let observer_config = &config.event_observer;
    let address = resolve_address(&observer_config.host, observer_config.port)?;
    let ibd_mode_until_block = config.ingestion.ibd_mode_until_block.filter(|height| *height > 0);
    if let Some(height) = ibd_mode_until_block {
        try_warn!(
            ctx,
            "IBD mode enabled: mempool and microblock events are only archived until block {}",
            height
        );
    }
    let state = ObserverState {
        handlers: handlers.clone(),
        ibd_mode_until_block,
    };

    let ignite = build_rocket(observer_config, address, state)
        .ignite()
        .await
        .map_err(|e| format!("unable to start event observer: {}", e))?;
    let shutdown = ignite.shutdown();

    let ctx_cloned = ctx.clone();
    let server = hiro_system_kit::thread_named("Event observer")
        .spawn(move || {
            if let Err(e) = hiro_system_kit::nestable_block_on(ignite.launch()) {
                ctx_cloned.try_log(|logger| slog::error!(logger, "Event observer halted: {}", e));
            }
        })
        .map_err(|e| format!("unable to spawn event observer thread: {}", e))?;

    try_info!(
        ctx,
        "Listening for stacks-node events on {}:{}",
        observer_config.host,
        observer_config.port
    );

    Ok(EventObserver {
        shutdown,
        server,
        handlers,
    })
}
