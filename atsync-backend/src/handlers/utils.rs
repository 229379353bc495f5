use axum::http::HeaderMap;
use serde_json::{json, Value};

use atsync_job_queue::JobHandle;

use crate::state::SiteSettings;

/// Response body returned for an accepted job.
pub fn job_handle_to_payload(handle: &JobHandle) -> Value {
    json!({
        "id": handle.id,
        "name": handle.name,
    })
}

/// The site URL the request arrived on.
///
/// A configured public URL wins. Otherwise the scheme comes from
/// `x-forwarded-proto` (default `http`) and the host from `x-forwarded-host`,
/// then `host`; with no host at all, loopback on the listening port.
pub fn site_url_from_headers(headers: &HeaderMap, site: &SiteSettings) -> String {
    if let Some(public_url) = site.public_url.as_deref() {
        return public_url.trim_end_matches('/').to_string();
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let scheme = header("x-forwarded-proto").unwrap_or("http");
    match header("x-forwarded-host").or_else(|| header("host")) {
        Some(host) => format!("{scheme}://{host}"),
        None => format!("http://localhost:{}", site.port),
    }
}
