// ============================================================================
// Transaction Scope State
// ============================================================================
//
// A transaction scope is a persistence target that owns no canonical data.
// Flushes into it only grow its accumulated log; its view of the world is
// the outer target's live view with that log replayed on top. Commit hands
// the whole log to the outer target exactly once.
//
// State transitions:
//   Open ──commit──> Committed
//     │
//     └──rollback──> RolledBack
//
// Every operation on a scope that is no longer open is an invalid-state
// error, including reads: after commit its log already lives in the outer
// target and replaying it again would be wrong.
//
// ============================================================================

use super::OperationLog;
use crate::core::{Result, StoreError};
use crate::storage::{PersistenceTarget, VersionedStore};
use chrono::{DateTime, Utc};
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Accepting flushes
    Open,

    /// Accumulated log was handed to the outer target
    Committed,

    /// Accumulated log was discarded
    RolledBack,
}

impl ScopeState {
    pub fn is_open(&self) -> bool {
        matches!(self, ScopeState::Open)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScopeState::Committed | ScopeState::RolledBack)
    }
}

impl std::fmt::Display for ScopeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeState::Open => write!(f, "OPEN"),
            ScopeState::Committed => write!(f, "COMMITTED"),
            ScopeState::RolledBack => write!(f, "ROLLED BACK"),
        }
    }
}

struct ScopeInner {
    state: ScopeState,
    accumulated: OperationLog,
    flush_count: u64,
}

impl ScopeInner {
    fn ensure_open(&self, id: TransactionId, action: &str) -> Result<()> {
        if !self.state.is_open() {
            return Err(StoreError::InvalidState(format!(
                "Cannot {}: transaction {} is already {}",
                action, id, self.state
            )));
        }
        Ok(())
    }
}

/// Persistence target that buffers flushed logs until commit
pub struct TransactionScope {
    id: TransactionId,
    outer: Arc<dyn PersistenceTarget>,
    depth: usize,
    inner: RwLock<ScopeInner>,
    opened_at: DateTime<Utc>,
    start_time: Instant,
}

impl TransactionScope {
    /// Open a scope on top of `outer`
    pub fn open(outer: Arc<dyn PersistenceTarget>) -> Self {
        let id = TransactionId::new();
        let depth = outer.depth() + 1;
        debug!("open {} on {} (depth {})", id, outer.label(), depth);

        Self {
            id,
            outer,
            depth,
            inner: RwLock::new(ScopeInner {
                state: ScopeState::Open,
                accumulated: OperationLog::new(),
                flush_count: 0,
            }),
            opened_at: Utc::now(),
            start_time: Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> Result<ScopeState> {
        Ok(self.inner.read()?.state)
    }

    /// Operations accumulated so far
    pub fn operation_count(&self) -> Result<usize> {
        Ok(self.inner.read()?.accumulated.len())
    }

    /// Number of logs persisted into this scope
    pub fn flush_count(&self) -> Result<u64> {
        Ok(self.inner.read()?.flush_count)
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Hand the accumulated log to the outer target.
    ///
    /// # Errors
    /// Returns `InvalidState` if the scope is not open; the outer target's
    /// own error if it refuses the log, in which case the scope stays open.
    pub fn commit(&self) -> Result<()> {
        let mut inner = self.inner.write()?;
        inner.ensure_open(self.id, "commit")?;

        self.outer.persist(&inner.accumulated)?;

        debug!(
            "commit {} into {}: {} operations from {} flushes",
            self.id,
            self.outer.label(),
            inner.accumulated.len(),
            inner.flush_count
        );
        inner.accumulated.clear();
        inner.state = ScopeState::Committed;
        Ok(())
    }

    /// Discard the accumulated log. The outer target never sees it.
    ///
    /// # Errors
    /// Returns `InvalidState` if the scope is not open
    pub fn rollback(&self) -> Result<()> {
        let mut inner = self.inner.write()?;
        inner.ensure_open(self.id, "rollback")?;

        debug!(
            "rollback {}: discarding {} operations",
            self.id,
            inner.accumulated.len()
        );
        inner.accumulated.clear();
        inner.state = ScopeState::RolledBack;
        Ok(())
    }
}

impl PersistenceTarget for TransactionScope {
    fn current_view(&self) -> Result<VersionedStore> {
        let inner = self.inner.read()?;
        inner.ensure_open(self.id, "read")?;

        let base = self.outer.current_view()?;
        Ok(inner.accumulated.replay_onto(&base))
    }

    fn persist(&self, log: &OperationLog) -> Result<()> {
        let mut inner = self.inner.write()?;
        inner.ensure_open(self.id, "persist")?;

        inner.accumulated = inner.accumulated.concat(log);
        inner.flush_count += 1;
        Ok(())
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn label(&self) -> String {
        self.id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EntityKey;
    use crate::{Entity, StructuralClone};

    #[derive(Debug, Clone, PartialEq, Entity, StructuralClone)]
    #[entity(type = "note")]
    struct Note {
        id: i64,
    }

    /// Bare root: applies logs immediately, counts persists.
    #[derive(Default)]
    struct CountingRoot {
        store: RwLock<VersionedStore>,
        persists: AtomicU64,
    }

    impl PersistenceTarget for CountingRoot {
        fn current_view(&self) -> Result<VersionedStore> {
            Ok(self.store.read()?.copy())
        }

        fn persist(&self, log: &OperationLog) -> Result<()> {
            let mut store = self.store.write()?;
            *store = log.replay_onto(&store);
            self.persists.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn depth(&self) -> usize {
            0
        }

        fn label(&self) -> String {
            "root".into()
        }
    }

    fn log_with_note(id: i64) -> OperationLog {
        let mut log = OperationLog::new();
        log.record_upsert(Note::ENTITY_TYPE, EntityKey::from(id), &Note { id });
        log
    }

    fn has_note(target: &dyn PersistenceTarget, id: i64) -> bool {
        target
            .current_view()
            .unwrap()
            .contains(&Note::ENTITY_TYPE, &EntityKey::from(id))
    }

    #[test]
    fn test_transaction_id_generation() {
        let id1 = TransactionId::new();
        let id2 = TransactionId::new();
        assert!(id2.as_u64() > id1.as_u64());
        assert!(id1.to_string().starts_with("txn_"));
    }

    #[test]
    fn test_scope_lifecycle() {
        let root = Arc::new(CountingRoot::default());
        let scope = TransactionScope::open(root.clone());

        assert_eq!(scope.state().unwrap(), ScopeState::Open);
        assert!(scope.state().unwrap().is_open());
        assert_eq!(scope.depth(), 1);

        scope.commit().unwrap();
        assert_eq!(scope.state().unwrap(), ScopeState::Committed);
        assert!(scope.state().unwrap().is_terminal());
    }

    #[test]
    fn test_persist_accumulates_without_touching_outer() {
        let root = Arc::new(CountingRoot::default());
        let scope = TransactionScope::open(root.clone());

        scope.persist(&log_with_note(1)).unwrap();
        scope.persist(&log_with_note(2)).unwrap();

        assert!(has_note(&scope, 1));
        assert!(has_note(&scope, 2));
        assert!(!has_note(root.as_ref(), 1));
        assert_eq!(root.persists.load(Ordering::SeqCst), 0);
        assert_eq!(scope.operation_count().unwrap(), 2);
        assert_eq!(scope.flush_count().unwrap(), 2);

        scope.commit().unwrap();
        assert!(has_note(root.as_ref(), 1));
        assert!(has_note(root.as_ref(), 2));
        assert_eq!(root.persists.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_view_follows_outer_live() {
        let root = Arc::new(CountingRoot::default());
        let scope = TransactionScope::open(root.clone());

        root.persist(&log_with_note(7)).unwrap();
        assert!(has_note(&scope, 7));
    }

    #[test]
    fn test_cannot_commit_twice() {
        let root = Arc::new(CountingRoot::default());
        let scope = TransactionScope::open(root.clone());
        scope.persist(&log_with_note(1)).unwrap();

        scope.commit().unwrap();
        assert!(matches!(scope.commit(), Err(StoreError::InvalidState(_))));
        assert_eq!(root.persists.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rollback_discards_log() {
        let root = Arc::new(CountingRoot::default());
        let scope = TransactionScope::open(root.clone());
        scope.persist(&log_with_note(1)).unwrap();

        scope.rollback().unwrap();
        assert_eq!(scope.state().unwrap(), ScopeState::RolledBack);
        assert_eq!(scope.operation_count().unwrap(), 0);
        assert!(!has_note(root.as_ref(), 1));
    }

    #[test]
    fn test_spent_scope_rejects_everything() {
        let root = Arc::new(CountingRoot::default());
        let scope = TransactionScope::open(root);
        scope.commit().unwrap();

        assert!(scope.persist(&log_with_note(1)).unwrap_err().is_invalid_state());
        assert!(scope.current_view().unwrap_err().is_invalid_state());
        assert!(scope.rollback().unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_nested_scope_commits_into_parent_only() {
        let root = Arc::new(CountingRoot::default());
        let outer = Arc::new(TransactionScope::open(root.clone()));
        let inner = TransactionScope::open(outer.clone());
        assert_eq!(inner.depth(), 2);

        inner.persist(&log_with_note(1)).unwrap();
        assert!(!has_note(outer.as_ref(), 1));

        inner.commit().unwrap();
        assert!(has_note(outer.as_ref(), 1));
        assert!(!has_note(root.as_ref(), 1));

        outer.commit().unwrap();
        assert!(has_note(root.as_ref(), 1));
    }
}
