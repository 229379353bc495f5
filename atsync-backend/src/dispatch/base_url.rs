//! Where a worker should call back into this API from.

/// Port assumed for loopback callbacks when none is configured.
pub const DEFAULT_CALLBACK_PORT: u16 = 8080;

/// How the `baseURL` of a sync-triggered job is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseUrlPolicy {
    /// Container deployments: workers reach the API over loopback on `port`,
    /// whatever host the browser used.
    Loopback { port: u16 },
    /// Use the site URL the triggering request arrived on.
    SiteUrl,
}

impl BaseUrlPolicy {
    pub fn new(container: bool, port: Option<u16>) -> Self {
        if container {
            Self::Loopback {
                port: port.unwrap_or(DEFAULT_CALLBACK_PORT),
            }
        } else {
            Self::SiteUrl
        }
    }

    pub fn from_config(cfg: &atsync_config::Config) -> Self {
        Self::new(cfg.deployment.container, Some(cfg.server.port))
    }

    pub fn resolve(&self, site_url: &str) -> String {
        match self {
            Self::Loopback { port } => format!("http://localhost:{port}"),
            Self::SiteUrl => site_url.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_without_port_uses_default() {
        let policy = BaseUrlPolicy::new(true, None);
        assert_eq!(
            policy.resolve("https://app.example.com"),
            "http://localhost:8080"
        );
    }

    #[test]
    fn container_with_port() {
        let policy = BaseUrlPolicy::new(true, Some(4000));
        assert_eq!(
            policy.resolve("https://app.example.com"),
            "http://localhost:4000"
        );
    }

    #[test]
    fn no_container_uses_site_url() {
        let policy = BaseUrlPolicy::new(false, Some(4000));
        assert_eq!(
            policy.resolve("https://app.example.com"),
            "https://app.example.com"
        );
    }

    #[test]
    fn from_default_config_in_container() {
        let mut cfg = atsync_config::Config::default();
        cfg.deployment.container = true;
        assert_eq!(
            BaseUrlPolicy::from_config(&cfg),
            BaseUrlPolicy::Loopback { port: 8080 }
        );
    }
}
