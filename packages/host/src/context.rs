//! The per-call invocation context.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{HostError, Logger, Module};

/// Opaque handle to the runtime's database connection pool.
///
/// Nothing in this workspace issues SQL; the handle is carried so handlers
/// receive everything the runtime offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbHandle {
    dsn: String,
}

impl DbHandle {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self { dsn: dsn.into() }
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }
}

/// Everything the runtime hands a single call.
///
/// A context is created per call and never shared between calls; it is
/// deliberately not `Clone`.
pub struct InvocationContext {
    cancel: CancellationToken,
    logger: Arc<dyn Logger>,
    db: Arc<DbHandle>,
    module: Arc<dyn Module>,
}

impl InvocationContext {
    pub fn new(
        cancel: CancellationToken,
        logger: Arc<dyn Logger>,
        db: Arc<DbHandle>,
        module: Arc<dyn Module>,
    ) -> Self {
        Self {
            cancel,
            logger,
            db,
            module,
        }
    }

    /// The cancellation signal for this call.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub fn db(&self) -> &Arc<DbHandle> {
        &self.db
    }

    pub fn module(&self) -> &Arc<dyn Module> {
        &self.module
    }

    /// Run `fut` unless this call is cancelled first.
    pub async fn run_cancellable<F, T>(&self, fut: F) -> Result<T, HostError>
    where
        F: Future<Output = Result<T, HostError>>,
    {
        cancellable(&self.cancel, fut).await
    }
}

impl std::fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}

/// Race `fut` against `token`.
///
/// An already-cancelled token wins without polling `fut`, so no storage
/// request is issued on behalf of a caller that has gone away.
pub async fn cancellable<F, T>(token: &CancellationToken, fut: F) -> Result<T, HostError>
where
    F: Future<Output = Result<T, HostError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(HostError::Cancelled),
        result = fut => result,
    }
}
