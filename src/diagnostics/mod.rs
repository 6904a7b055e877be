//! Diagnostic logging boundary.
//!
//! The registry's collaborators log through this trait rather than a concrete
//! backend. The contract is narrow: calls must not block materially, and
//! messages from one caller arrive in the order they were sent. The shipped
//! implementation forwards to `tracing`, whose subscriber does the buffering.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{RegistryError, Result};

/// Non-blocking diagnostic logging contract.
#[async_trait]
pub trait DiagnosticLogger: Send + Sync {
    fn info(&self, message: &str);

    fn error(&self, message: &str);

    /// Asynchronous variant for callers on a shared pool; completes once the
    /// message is handed to the backend. `Cancelled` if the signal fires
    /// first.
    async fn info_async(&self, message: &str, cancel: &CancellationToken) -> Result<()>;
}

/// [`DiagnosticLogger`] backed by the `tracing` ecosystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

#[async_trait]
impl DiagnosticLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }

    async fn info_async(&self, message: &str, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(RegistryError::cancelled("info_async"));
        }
        tracing::info!("{message}");
        tokio::task::yield_now().await;
        Ok(())
    }
}
