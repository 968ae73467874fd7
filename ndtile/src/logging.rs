use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter directives, e.g.
/// "ndtile=debug". Defaults to [`DEFAULT_LOG_FILTER`].
pub const NDTILE_LOG: &str = "NDTILE_LOG";

pub const DEFAULT_LOG_FILTER: &str = "info";

/// Set up a stderr logging subscriber for this process, filtered by
/// [`NDTILE_LOG`]. Does nothing if a global subscriber is already
/// installed.
pub fn initialize_logging() {
    let (filter, invalid) = match std::env::var(NDTILE_LOG) {
        Ok(directives) => match EnvFilter::try_new(&directives) {
            Ok(filter) => (filter, None),
            Err(err) => (EnvFilter::new(DEFAULT_LOG_FILTER), Some((directives, err))),
        },
        Err(_) => (EnvFilter::new(DEFAULT_LOG_FILTER), None),
    };

    let layer = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_filter(filter);

    if let Err(err) = Registry::default().with(layer).try_init() {
        tracing::debug!("logging already initialized for this process: {}", err);
        return;
    }
    if let Some((directives, err)) = invalid {
        tracing::warn!(
            "ignoring invalid {} {:?}: {}; using {:?}",
            NDTILE_LOG,
            directives,
            err,
            DEFAULT_LOG_FILTER
        );
    }
}
