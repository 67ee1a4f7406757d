//! Static bearer credential handling.

use base64::Engine;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Pre-issued bearer credential for the event stream.
///
/// The token is never issued or refreshed here. When it is a JWT, its `exp`
/// claim is read so an expired credential can be reported clearly.
///
/// # Example
///
/// ```rust
/// use sse_sentinel::BearerToken;
///
/// let token = BearerToken::new("opaque-token");
/// assert_eq!(token.header_value(), "Bearer opaque-token");
/// assert!(token.expires_at().is_none());
/// assert_eq!(format!("{token:?}"), "BearerToken(***)");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(Arc<str>);

#[derive(serde::Deserialize)]
struct Claims {
    exp: Option<u64>,
}

impl BearerToken {
    /// Wrap a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Arc::from(token.into().trim()))
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Expiry time from the JWT `exp` claim, if the token carries one.
    pub fn expires_at(&self) -> Option<SystemTime> {
        let payload = self.0.split('.').nth(1)?;
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        let claims: Claims = serde_json::from_slice(&decoded).ok()?;
        claims
            .exp
            .and_then(|secs| UNIX_EPOCH.checked_add(Duration::from_secs(secs)))
    }

    /// Whether the token's `exp` claim lies before `now`.
    ///
    /// Tokens without an expiry are never considered expired.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }

    /// Whether the token has already expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Seconds since the Unix epoch, for log fields.
pub fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
