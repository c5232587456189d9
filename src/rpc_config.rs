//! Per-call RPC configuration.
//!
//! This type intentionally contains no transport-specific concepts.
//! It only describes how a single request is stamped: how long the caller
//! waits, at which priority it travels, and which token it carries.

use std::time::Duration;

use crate::{Priority, DEFAULT_PRIORITY};

/// Default time a call waits for its response.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Options for a single `invoke_method` call.
///
/// # Example
///
/// ```
/// use uplink_rpc::{CallOptions, Priority};
/// use std::time::Duration;
///
/// let options = CallOptions::default()
///     .with_timeout(Duration::from_millis(500))
///     .with_priority(Priority::Realtime)
///     .with_token("bearer abc");
///
/// assert_eq!(options.ttl_millis(), 500);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CallOptions {
    /// How long to wait for the response; becomes the request TTL.
    ///
    /// Default: 10 seconds
    pub timeout: Duration,

    /// Priority of the request.
    ///
    /// Default: [`Priority::Interactive`]
    pub priority: Priority,

    /// Authorization token forwarded with the request. Not verified here.
    pub token: Option<String>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CALL_TIMEOUT,
            priority: DEFAULT_PRIORITY,
            token: None,
        }
    }
}

impl CallOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Timeout as a TTL in whole milliseconds, saturating at `u32::MAX`.
    pub fn ttl_millis(&self) -> u32 {
        u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX)
    }
}
