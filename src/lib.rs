// ============================================================================
// UnitStore Library
// ============================================================================
//
// In-memory transactional object store with unit-of-work sessions.
//
//   DataStore ── owns the canonical VersionedStore
//       │
//       ├── Session ── pending OperationLog, flush() hands it to the target
//       │
//       └── Transaction ── TransactionScope accumulates flushed logs,
//                          commit() hands them to its outer target
//
// ============================================================================

//! In-memory, copy-isolated object store with unit-of-work sessions and
//! nestable transactions.
//!
//! ```
//! use unitstore::{DataStore, Entity, StructuralClone};
//!
//! #[derive(Debug, Clone, PartialEq, Entity, StructuralClone)]
//! #[entity(type = "account")]
//! struct Account {
//!     id: i64,
//!     balance: i64,
//! }
//!
//! # async fn run() -> Result<(), unitstore::StoreError> {
//! let store = DataStore::new();
//!
//! store
//!     .begin_transaction(|mut session| async move {
//!         session.save(&Account { id: 1, balance: 100 });
//!         session.flush()?;
//!         Ok::<_, unitstore::StoreError>(())
//!     })
//!     .await?;
//!
//! let account: Option<Account> = store.session().find_one(1)?;
//! assert_eq!(account.map(|a| a.balance), Some(100));
//! # Ok(())
//! # }
//! # tokio_test::block_on(run()).unwrap();
//! ```

extern crate self as unitstore;

pub mod config;
pub mod core;
pub mod facade;
pub mod storage;
pub mod transaction;

pub use config::StoreConfig;
pub use core::{
    Behavior, CloneContext, Entity, EntityKey, EntityType, FreezeContext, Result, Shared,
    StoreError, StructuralClone, deep_clone, deep_freeze,
};
pub use facade::{DataStore, Session, SessionId, StoreStats, Transaction, TransactionInfo};
pub use storage::{FrozenEntity, PersistenceTarget, VersionedStore};
pub use transaction::{Operation, OperationLog, ScopeState, TransactionId, TransactionScope};

pub use unitstore_derive::{Entity, StructuralClone};
