use std::env;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "yeahyak_gateway=info,tower_http=info";

/// Whether `YEAHYAK_LOG_JSON` asks for JSON log lines.
pub fn json_logs_requested() -> bool {
    env::var("YEAHYAK_LOG_JSON")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json_logs_requested() {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
