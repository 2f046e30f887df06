//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via `RUST_LOG`, defaulting on the server mode

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Mode;

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(mode: Mode) -> &'static str {
    match mode {
        Mode::Prod => "memos=info,tower_http=warn",
        Mode::Dev | Mode::Demo => "memos=debug,tower_http=debug",
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(mode: Mode) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(mode)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match mode {
        Mode::Prod => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        Mode::Dev | Mode::Demo => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Logging already initialized");
    }
}
