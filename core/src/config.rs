//! Client configuration shared by the builder and the persistent client.

use serde::Deserialize;

/// User-Agent sent when neither the config nor a `User-Agent` header
/// overrides it.
pub const DEFAULT_USER_AGENT: &str = concat!("httplib/", env!("CARGO_PKG_VERSION"));

/// Default upper bound on response header lines.
pub const DEFAULT_MAX_RESPONSE_HEADERS: usize = 64;

/// Settings threaded through [`RequestBuilder`](crate::RequestBuilder) and
/// [`Client`](crate::Client).
///
/// Missing fields fall back to their defaults when deserialized, so an
/// application can embed a partial `[http]` table in its own config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Dump every outgoing request (head and body) to stdout before sending.
    pub debug: bool,

    /// User-Agent for requests that do not carry their own header.
    pub user_agent: String,

    /// Maximum number of response header lines accepted.
    pub max_response_headers: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            debug: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_response_headers: DEFAULT_MAX_RESPONSE_HEADERS,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
