//! Logging and tracing utilities

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Initialize a human-readable tracing subscriber
///
/// `RUST_LOG` wins over `default_directives` when it is set.
pub fn init_tracing(default_directives: &str) {
    tracing_subscriber::registry()
        .with(filter(default_directives))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Initialize a tracing subscriber that emits one JSON object per event
pub fn init_json_tracing(default_directives: &str) {
    tracing_subscriber::registry()
        .with(filter(default_directives))
        .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
        .init();
}
