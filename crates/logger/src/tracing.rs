use std::env::var;

use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init() {
    initialize_tracing(LevelFilter::INFO);
}

/// Same as [`init`] but defaults to `debug`, which may include sensitive data
/// such as mail subjects and addresses.
pub fn init_verbose() {
    initialize_tracing(LevelFilter::DEBUG);
}

/// Initialize tracing subscriber. `RUST_LOG` still overrides the default level.
fn initialize_tracing(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        _ => tracing_subscriber::fmt::layer().compact().with_filter(env_filter).boxed(),
    };

    tracing_subscriber::registry().with(log_layer).init();

    if log_format.is_empty() {
        debug!("RUST_LOG_FORMAT not set, using compact output");
    }
}
