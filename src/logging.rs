//! Logging setup using tracing. Embedding applications that already
//! install a subscriber can skip this entirely.

use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Install a stderr tracing subscriber. Called more than once, only the
/// first call installs anything; a subscriber installed by the embedding
/// application beforehand wins silently.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,colloquy=debug"));

        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(true),
        );

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
