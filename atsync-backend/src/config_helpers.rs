use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use atsync_backend::sync_source::{InMemorySyncSourceStore, StoreError};
use atsync_job_queue::{FallbackOptions, QueueSettings, RedisOptions};

/// Build queue backend settings from application config.
pub fn queue_settings_from_config(cfg: &atsync_config::Config) -> QueueSettings {
    QueueSettings {
        redis_url: cfg.redis_url.clone(),
        fallback: FallbackOptions {
            max_pending: cfg.queue.max_pending,
            max_attempts: cfg.queue.max_attempts,
            retain_finished: cfg.queue.retain_finished,
            ..FallbackOptions::default()
        },
        redis: RedisOptions {
            key_prefix: cfg.queue.key_prefix.clone(),
            max_attempts: cfg.queue.max_attempts,
            retain_finished: cfg.queue.retain_finished,
            poll_interval: Duration::from_millis(500),
        },
    }
}

/// Build the sync-source store, seeded from file when one is configured.
pub fn sync_store_from_config(
    cfg: &atsync_config::Config,
) -> Result<Arc<InMemorySyncSourceStore>, StoreError> {
    match cfg.sync_sources_path.as_deref() {
        Some(path) => {
            let store = InMemorySyncSourceStore::from_json_file(path)?;
            tracing::info!(path, "sync sources loaded");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("no sync sources file configured; every trigger will 404");
            Ok(Arc::new(InMemorySyncSourceStore::new()))
        }
    }
}

/// Parse host:port into a SocketAddr, with fallback to 0.0.0.0.
pub fn parse_bind_address(host: &str, port: u16) -> SocketAddr {
    host.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .or_else(|_| host.parse::<SocketAddr>())
        .or_else(|_| host.parse::<Ipv6Addr>().map(|ip| SocketAddr::new(IpAddr::V6(ip), port)))
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)))
}
