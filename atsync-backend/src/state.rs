use std::sync::Arc;

use crate::dispatch::JobDispatcher;

/// How to work out the site URL a request arrived on.
#[derive(Debug, Clone)]
pub struct SiteSettings {
    /// Configured public URL; wins over request headers.
    pub public_url: Option<String>,
    /// Listening port, used when the request carries no host.
    pub port: u16,
}

impl SiteSettings {
    pub fn from_config(cfg: &atsync_config::Config) -> Self {
        Self {
            public_url: cfg.deployment.public_url.clone(),
            port: cfg.server.port,
        }
    }
}

/// Shared application state passed to every route handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub dispatcher: Arc<JobDispatcher>,
    pub site: SiteSettings,
}

impl AppState {
    pub fn new(dispatcher: JobDispatcher, site: SiteSettings) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            site,
        }
    }
}
