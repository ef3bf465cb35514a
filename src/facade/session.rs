use super::{Transaction, run_unit_of_work};
use crate::config::StoreConfig;
use crate::core::{Entity, EntityKey, EntityType, Result, StoreError};
use crate::storage::{PersistenceTarget, VersionedStore};
use crate::transaction::OperationLog;
use log::{debug, trace};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl SessionId {
    pub fn new() -> Self {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session_{}", self.0)
    }
}

/// Unit-of-work handle bound to one persistence target
///
/// Writes are staged in a pending [`OperationLog`] and only leave the
/// session on [`Session::flush`]. Every read recomputes the visible world:
/// the target's current view with the pending log replayed on top, so
/// flushes by other sessions on the same target show up immediately.
///
/// Dropping a session loses whatever was not flushed.
pub struct Session {
    id: SessionId,
    target: Arc<dyn PersistenceTarget>,
    config: Arc<StoreConfig>,
    pending: OperationLog,
}

impl Session {
    pub(crate) fn new(target: Arc<dyn PersistenceTarget>, config: Arc<StoreConfig>) -> Self {
        let id = SessionId::new();
        trace!("{}: open {} on {}", config.name, id, target.label());
        Self {
            id,
            target,
            config,
            pending: OperationLog::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Nesting depth of the bound target. 0 for the root.
    pub fn depth(&self) -> usize {
        self.target.depth()
    }

    /// Stage an upsert of `entity` under its declared type and key.
    ///
    /// A frozen copy is taken now; later edits to `entity` are not seen.
    pub fn save<T: Entity>(&mut self, entity: &T) {
        let key = entity.key();
        trace!("{}: save {}[{}]", self.id, T::ENTITY_TYPE, key);
        self.pending.record_upsert(T::ENTITY_TYPE, key, entity);
    }

    /// Stage a removal of `entity`, but only if its key is visible to this
    /// session right now. Returns whether a removal was staged.
    ///
    /// Visibility is checked at call time, not at flush time.
    pub fn delete<T: Entity>(&mut self, entity: &T) -> Result<bool> {
        let key = entity.key();
        if !self.current_view()?.contains(&T::ENTITY_TYPE, &key) {
            trace!(
                "{}: delete {}[{}] ignored, not visible",
                self.id,
                T::ENTITY_TYPE,
                key
            );
            return Ok(false);
        }

        trace!("{}: delete {}[{}]", self.id, T::ENTITY_TYPE, key);
        self.pending.record_remove(T::ENTITY_TYPE, key);
        Ok(true)
    }

    /// Look up an entity by key in its declared partition. `Ok(None)` when absent.
    pub fn find_one<T: Entity>(&self, key: impl Into<EntityKey>) -> Result<Option<T>> {
        self.find_one_in(&T::ENTITY_TYPE, key)
    }

    /// Look up an entity in an explicit partition.
    ///
    /// # Errors
    /// `TypeMismatch` if the stored value is not a `T`
    pub fn find_one_in<T: Entity>(
        &self,
        entity_type: &EntityType,
        key: impl Into<EntityKey>,
    ) -> Result<Option<T>> {
        self.current_view()?.get(entity_type, &key.into())
    }

    /// Target's current view with the pending log replayed on top
    pub fn current_view(&self) -> Result<VersionedStore> {
        let base = self.target.current_view()?;
        Ok(self.pending.replay_onto(&base))
    }

    /// Hand the pending log to the target, then clear it.
    ///
    /// Pending operations are kept if the target refuses them.
    pub fn flush(&mut self) -> Result<()> {
        let (upserts, removes) = self.pending.counts();
        self.target.persist(&self.pending)?;
        debug!(
            "{}: {} flushed {} upserts, {} removes into {}",
            self.config.name,
            self.id,
            upserts,
            removes,
            self.target.label()
        );
        self.pending.clear();
        Ok(())
    }

    pub fn pending(&self) -> &OperationLog {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drop unflushed operations. Returns how many were dropped.
    pub fn discard_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// Open a transaction nested in this session's target.
    ///
    /// The scope sees the target's view, not this session's pending
    /// operations; flush first if the transaction should see them.
    pub fn begin(&self) -> Result<Transaction> {
        Transaction::open(self.target.clone(), self.config.clone())
    }

    /// Run `work` in a transaction nested in this session's target.
    ///
    /// Inside another unit of work this gives true nesting: the inner
    /// commit lands in the enclosing scope and reaches the root only when
    /// every enclosing scope commits.
    pub async fn begin_transaction<F, Fut, T, E>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<StoreError>,
    {
        run_unit_of_work(self.target.clone(), self.config.clone(), work).await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("target", &self.target.label())
            .field("pending", &self.pending.len())
            .finish()
    }
}
