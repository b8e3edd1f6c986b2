//! The seam between the dispatcher and whatever speaks to devices.
//!
//! A [`SessionProvider`] opens one [`DeviceSession`] per host. The dispatcher
//! runs exactly one operation on it and always closes it afterwards.

use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::error::SessionError;
use crate::operation::Operation;

/// An open, authenticated session with one device.
#[async_trait]
pub trait DeviceSession: Send {
    /// Runs `operation` and returns its raw output.
    async fn execute(&mut self, operation: &Operation) -> Result<String, SessionError>;

    /// Releases the session. Called on every exit path, including after a
    /// failed `execute`.
    async fn close(&mut self);
}

/// Opens sessions to devices.
#[async_trait]
pub trait SessionProvider: Send + Sync + 'static {
    async fn open(
        &self,
        host: &str,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn DeviceSession>, SessionError>;
}
