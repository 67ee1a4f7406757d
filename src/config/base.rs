//! Process configuration for the listener and the status server.

use super::token::BearerToken;
use std::str::FromStr;
use std::time::Duration;

/// Default event stream endpoint.
pub const DEFAULT_STREAM_URL: &str = "http://localhost:4040/api/stream/penguji?courseId=1";

/// Default body served on `GET /`.
pub const DEFAULT_STATUS_BODY: &str = "Status server running; SSE events are written to the log.";

/// Settings for the background event listener.
#[derive(Clone, Debug)]
pub struct ListenerConfig {
    /// Event stream endpoint.
    pub url: String,
    /// Static bearer credential sent as `Authorization: Bearer <token>`.
    pub token: Option<BearerToken>,
    /// Reconnection attempts allowed before giving up.
    pub max_retries: u32,
    /// First reconnection delay.
    pub backoff_initial: Duration,
    /// Upper bound for reconnection delays.
    pub backoff_max: Duration,
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Longest silence tolerated between body chunks. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Most field-line bytes accepted in one event block, counted from the
    /// last blank line. Exceeding it drops the connection as a malformed frame.
    pub max_frame_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            token: None,
            max_retries: 10,
            backoff_initial: Duration::from_millis(1000),
            backoff_max: Duration::from_millis(60_000),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(60)),
            max_frame_bytes: 1024 * 1024,
        }
    }
}

/// Complete process configuration.
///
/// Reads from environment variables with sensible defaults:
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `SSE_URL` | see [`DEFAULT_STREAM_URL`] | Event stream endpoint |
/// | `SSE_TOKEN` | (none) | Bearer credential |
/// | `SSE_MAX_RETRIES` | `10` | Reconnection attempts |
/// | `SSE_BACKOFF_INITIAL_MS` | `1000` | First reconnection delay |
/// | `SSE_BACKOFF_MAX_MS` | `60000` | Reconnection delay cap |
/// | `SSE_CONNECT_TIMEOUT_SECS` | `10` | Connect timeout |
/// | `SSE_IDLE_TIMEOUT_SECS` | `60` | Read idle timeout, `0` disables |
/// | `SSE_MAX_FRAME_BYTES` | `1048576` | Event block size limit |
/// | `HOST` | `127.0.0.1` | Status server bind address |
/// | `PORT` | `6001` | Status server port |
/// | `STATUS_BODY` | see [`DEFAULT_STATUS_BODY`] | Body served on `/` |
/// | `DEBUG` | `false` | Verbose logging |
///
/// # Example
///
/// ```rust
/// use sse_sentinel::Config;
///
/// let config = Config::from_env();
/// println!("status server on {}", config.socket_addr());
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// Background listener settings.
    pub listener: ListenerConfig,
    /// Status server bind address (default: 127.0.0.1)
    pub host: String,
    /// Status server port (default: 6001)
    pub port: u16,
    /// Constant body for `GET /`.
    pub status_body: String,
    /// Verbose logging toggle.
    pub debug: bool,
}

impl Config {
    /// Create a new config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create a config from an arbitrary key lookup.
    ///
    /// Unset or unparsable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ListenerConfig::default();
        let parsed = |key: &str| -> Option<u64> { lookup(key).and_then(|v| parse_value(&v)) };

        let idle_timeout = match parsed("SSE_IDLE_TIMEOUT_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.idle_timeout,
        };

        let listener = ListenerConfig {
            url: lookup("SSE_URL").unwrap_or(defaults.url),
            token: lookup("SSE_TOKEN")
                .filter(|t| !t.trim().is_empty())
                .map(BearerToken::new),
            max_retries: parsed("SSE_MAX_RETRIES")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.max_retries),
            backoff_initial: parsed("SSE_BACKOFF_INITIAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff_initial),
            backoff_max: parsed("SSE_BACKOFF_MAX_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff_max),
            connect_timeout: parsed("SSE_CONNECT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            idle_timeout,
            max_frame_bytes: parsed("SSE_MAX_FRAME_BYTES")
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_frame_bytes),
        };

        Self {
            listener,
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: lookup("PORT")
                .and_then(|p| parse_value(&p))
                .unwrap_or(6001),
            status_body: lookup("STATUS_BODY").unwrap_or_else(|| DEFAULT_STATUS_BODY.to_string()),
            debug: lookup("DEBUG").map(|v| parse_flag(&v)).unwrap_or(false),
        }
    }

    /// Get the socket address for binding.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_value<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
