//! Tracing initialization utilities.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when verbose logging is off.
pub const DEFAULT_FILTER: &str = "sse_sentinel=info,sse_event=info,warn";

/// Filter used when the debug toggle is on.
pub const DEBUG_FILTER: &str = "sse_sentinel=debug,sse_event=info,info";

/// Pick the default filter for the debug toggle.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        DEBUG_FILTER
    } else {
        DEFAULT_FILTER
    }
}

/// Initialize tracing with the given default filter.
///
/// The filter can be overridden by the `RUST_LOG` environment variable.
/// Everything, received events included, goes through one subscriber
/// writing to stderr, so output from the listener and the server never
/// interleaves mid-line.
///
/// # Example
///
/// ```rust,no_run
/// use sse_sentinel::bootstrap::{default_filter, init_tracing};
///
/// init_tracing(default_filter(false));
/// ```
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: tracing can only be initialized once per process, so only the
    // filter selection is covered here.
    #[test]
    fn test_default_filter_follows_debug_toggle() {
        assert_eq!(default_filter(false), DEFAULT_FILTER);
        assert_eq!(default_filter(true), DEBUG_FILTER);
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
        assert!(EnvFilter::try_new(DEBUG_FILTER).is_ok());
    }
}
