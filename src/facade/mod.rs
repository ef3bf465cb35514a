// ============================================================================
// Facade: the public unit-of-work API
// ============================================================================

pub mod database;
pub mod session;
pub mod transactions;

pub use database::{DataStore, StoreStats};
pub use session::{Session, SessionId};
pub use transactions::{Transaction, TransactionInfo};

pub(crate) use transactions::run_unit_of_work;
