use super::{Session, Transaction, run_unit_of_work};
use crate::config::StoreConfig;
use crate::core::{EntityType, Result, StoreError};
use crate::storage::{PersistenceTarget, VersionedStore};
use crate::transaction::OperationLog;
use log::{debug, trace};
use std::future::Future;
use std::sync::{Arc, RwLock};

/// Point-in-time counters for a [`DataStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Bumped on every persist into the root
    pub version: u64,
    pub entity_count: usize,
    pub entity_types: Vec<EntityType>,
    /// Logs persisted into the root, by sessions or committing transactions
    pub flushes: u64,
    pub operations_applied: u64,
}

struct RootState {
    canonical: VersionedStore,
    version: u64,
    flushes: u64,
    operations_applied: u64,
}

/// Owner of the canonical store. All mutation goes through `persist`.
pub(crate) struct RootStore {
    config: Arc<StoreConfig>,
    state: RwLock<RootState>,
}

impl RootStore {
    fn new(config: StoreConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: RwLock::new(RootState {
                canonical: VersionedStore::new(),
                version: 0,
                flushes: 0,
                operations_applied: 0,
            }),
        }
    }
}

impl PersistenceTarget for RootStore {
    fn current_view(&self) -> Result<VersionedStore> {
        Ok(self.state.read()?.canonical.copy())
    }

    fn persist(&self, log: &OperationLog) -> Result<()> {
        let mut state = self.state.write()?;

        if self.config.log_operations {
            for operation in log.iter() {
                trace!("{}: apply {}", self.config.name, operation);
            }
        }

        state.canonical = log.replay_onto(&state.canonical);
        state.version += 1;
        state.flushes += 1;
        state.operations_applied += log.len() as u64;

        debug!(
            "{}: persisted {} operations (version {})",
            self.config.name,
            log.len(),
            state.version
        );
        Ok(())
    }

    fn depth(&self) -> usize {
        0
    }

    fn label(&self) -> String {
        self.config.name.clone()
    }
}

/// Handle to an in-memory root store
///
/// Cheap to clone; all clones share the same canonical state.
///
/// # Examples
///
/// ```
/// use unitstore::{DataStore, Entity, StructuralClone};
///
/// #[derive(Debug, Clone, PartialEq, Entity, StructuralClone)]
/// #[entity(type = "user")]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// # fn main() -> unitstore::Result<()> {
/// let store = DataStore::new();
///
/// let mut writer = store.session();
/// writer.save(&User { id: 1, name: "Alice".into() });
///
/// // Not flushed yet: other sessions cannot see it
/// assert!(store.session().find_one::<User>(1)?.is_none());
///
/// writer.flush()?;
/// assert_eq!(store.session().find_one::<User>(1)?.unwrap().name, "Alice");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DataStore {
    root: Arc<RootStore>,
}

impl DataStore {
    /// Empty store with the default configuration
    pub fn new() -> Self {
        Self {
            root: Arc::new(RootStore::new(StoreConfig::default())),
        }
    }

    /// Empty store with a validated custom configuration
    pub fn with_config(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        debug!("{}: created", config.name);
        Ok(Self {
            root: Arc::new(RootStore::new(config)),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.root.config
    }

    fn target(&self) -> Arc<dyn PersistenceTarget> {
        self.root.clone()
    }

    /// New session bound directly to the root
    pub fn session(&self) -> Session {
        Session::new(self.target(), self.root.config.clone())
    }

    /// Open a transaction on the root and return its handle.
    ///
    /// The handle must be finished with [`Transaction::commit`] or
    /// [`Transaction::rollback`]; dropping it rolls back.
    pub fn begin(&self) -> Result<Transaction> {
        Transaction::open(self.target(), self.root.config.clone())
    }

    /// Run `work` inside a transaction opened on the root.
    ///
    /// Commits when `work` returns `Ok`; otherwise rolls back and returns
    /// the error unchanged. The scope always sits directly on the root,
    /// even when called from inside another unit of work, so its commit is
    /// permanent regardless of what the enclosing work does afterwards.
    /// Use [`Session::begin_transaction`] for a scope nested in the caller's.
    pub async fn begin_transaction<F, Fut, T, E>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<StoreError>,
    {
        run_unit_of_work(self.target(), self.root.config.clone(), work).await
    }

    /// Copy of the canonical store
    pub fn snapshot(&self) -> Result<VersionedStore> {
        self.root.current_view()
    }

    pub fn version(&self) -> Result<u64> {
        Ok(self.root.state.read()?.version)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let state = self.root.state.read()?;
        Ok(StoreStats {
            version: state.version,
            entity_count: state.canonical.len(),
            entity_types: state.canonical.entity_types(),
            flushes: state.flushes,
            operations_applied: state.operations_applied,
        })
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("name", &self.root.config.name)
            .finish_non_exhaustive()
    }
}
