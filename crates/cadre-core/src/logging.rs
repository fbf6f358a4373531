//! Structured logging with `tracing`.
//!
//! Context (session ID, task ID, event type) travels as span and event fields
//! rather than being formatted into messages. `RUST_LOG` takes precedence over
//! the configured level when set.

use tracing_subscriber::EnvFilter;

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the global tracing subscriber with compact stderr output.
///
/// Call once at application startup. Subsequent calls are no-ops.
pub fn init_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}

/// Initialize the global tracing subscriber with one JSON object per line.
pub fn init_json_subscriber(level: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .json();

    let _ = subscriber.try_init();
}
