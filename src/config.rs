//! Connection parameters shared read-only by every host task.

use std::fmt;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Credentials and timeouts used to open every device session.
///
/// Built once per invocation and never mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub username: String,
    pub password: String,
    pub port: u16,
    /// Seconds without progress before a session is declared lost.
    pub session_timeout: u64,
    /// Seconds allowed for connection establishment.
    pub connect_timeout: u64,
}

impl ConnectionConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            port: DEFAULT_PORT,
            session_timeout: DEFAULT_SESSION_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_session_timeout(mut self, secs: u64) -> Self {
        self.session_timeout = secs;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout = secs;
        self
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

// Keeps the password out of logs.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("session_timeout", &self.session_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
