//! Log setup
//!
//! Logs go to stderr through `tracing-subscriber`. The level filter sits
//! behind a reload layer so `set_debug` can change it while running.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Handle for changing the log level after start-up
#[derive(Clone)]
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogControl {
    /// Switch between debug and info output
    pub fn set_debug(&self, debug: bool) {
        match self.handle.reload(EnvFilter::new(level_directive(debug))) {
            Ok(()) => tracing::debug!("debug logging enabled"),
            Err(e) => tracing::warn!("Could not change log level: {}", e),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `debug` at start-up.
pub fn init(debug: bool) -> Result<LogControl, tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(debug)));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()?;

    Ok(LogControl { handle })
}

fn level_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "info"
    }
}
