//! Log setup for binaries embedding the host.
//!
//! The library only emits `tracing` events. Whoever owns the process installs a
//! subscriber once, typically through [`init`].

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "FXRUN_LOG";

const DEFAULT_FILTER: &str = "info";

/// Installs a stderr subscriber filtered by `FXRUN_LOG` (default `info`).
///
/// Stdout is left to the transport. Calling this twice is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
