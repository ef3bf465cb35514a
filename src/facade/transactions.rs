use super::Session;
use crate::config::StoreConfig;
use crate::core::{Result, StoreError};
use crate::storage::PersistenceTarget;
use crate::transaction::{ScopeState, TransactionId, TransactionScope};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Snapshot of a transaction's progress
#[derive(Debug, Clone)]
pub struct TransactionInfo {
    pub id: TransactionId,
    pub state: ScopeState,
    pub depth: usize,
    pub operation_count: usize,
    pub flush_count: u64,
    pub opened_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Handle to an open transaction scope.
///
/// Finish it with [`commit`](Transaction::commit) or
/// [`rollback`](Transaction::rollback); both consume the handle. A handle
/// dropped while still open rolls back, which covers early returns, `?`
/// and panics. Sessions obtained from the handle may outlive it: once the
/// scope is finished they get `StoreError::InvalidState`.
pub struct Transaction {
    scope: Arc<TransactionScope>,
    config: Arc<StoreConfig>,
    finished: bool,
}

impl Transaction {
    pub(crate) fn open(outer: Arc<dyn PersistenceTarget>, config: Arc<StoreConfig>) -> Result<Self> {
        config.check_depth(outer.depth() + 1)?;
        let scope = Arc::new(TransactionScope::open(outer));
        Ok(Self {
            scope,
            config,
            finished: false,
        })
    }

    pub fn id(&self) -> TransactionId {
        self.scope.id()
    }

    /// New session bound to this transaction's scope
    pub fn session(&self) -> Session {
        Session::new(self.scope.clone(), self.config.clone())
    }

    pub fn info(&self) -> Result<TransactionInfo> {
        Ok(TransactionInfo {
            id: self.scope.id(),
            state: self.scope.state()?,
            depth: self.scope.depth(),
            operation_count: self.scope.operation_count()?,
            flush_count: self.scope.flush_count()?,
            opened_at: self.scope.opened_at(),
            elapsed: self.scope.elapsed(),
        })
    }

    /// Hand everything flushed into this transaction to the outer target.
    ///
    /// If the outer target refuses, the scope is rolled back as the handle
    /// drops and the error is returned.
    pub fn commit(mut self) -> Result<()> {
        self.scope.commit()?;
        self.finished = true;
        Ok(())
    }

    /// Discard everything flushed into this transaction
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.scope.rollback()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        debug!(
            "{}: {} dropped while open, rolling back",
            self.config.name,
            self.scope.id()
        );
        if let Err(e) = self.scope.rollback() {
            warn!("{}: rollback of {} failed: {}", self.config.name, self.scope.id(), e);
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.scope.id())
            .field("depth", &self.scope.depth())
            .field("finished", &self.finished)
            .finish()
    }
}

/// Open a scope on `outer`, run `work` with a session bound to it, then
/// commit on `Ok` or roll back on `Err`. The error from `work` is returned
/// unchanged.
pub(crate) async fn run_unit_of_work<F, Fut, T, E>(
    outer: Arc<dyn PersistenceTarget>,
    config: Arc<StoreConfig>,
    work: F,
) -> std::result::Result<T, E>
where
    F: FnOnce(Session) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<StoreError>,
{
    let txn = Transaction::open(outer, config)?;
    let id = txn.id();

    match work(txn.session()).await {
        Ok(value) => {
            txn.commit()?;
            Ok(value)
        }
        Err(err) => {
            debug!("{}: unit of work failed, rolling back", id);
            if let Err(e) = txn.rollback() {
                warn!("rollback of {} failed: {}", id, e);
            }
            Err(err)
        }
    }
}
