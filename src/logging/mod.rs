//! Logging infrastructure for Waymark
//!
//! Structured logging via tracing; `RUST_LOG` overrides the configured
//! level.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber
pub fn init(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("waymark={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
