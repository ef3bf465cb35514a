// ============================================================================
// Transaction Module
// ============================================================================
//
// Unit-of-work plumbing below the facade:
// - Operation: one recorded upsert or remove
// - OperationLog: ordered, replayable, concatenable list of operations
// - TransactionScope: persistence target that buffers logs until commit
//
// ============================================================================

pub mod change;
pub mod log;
pub mod state;

pub use change::Operation;
pub use log::OperationLog;
pub use state::{ScopeState, TransactionId, TransactionScope};
