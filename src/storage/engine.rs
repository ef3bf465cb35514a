use super::VersionedStore;
use crate::core::Result;
use crate::transaction::OperationLog;

/// Something a [`Session`](crate::Session) can flush into.
///
/// Two implementations exist: the root store, which applies logs to the
/// canonical state immediately, and a transaction scope, which only
/// accumulates them until it commits into its own outer target.
pub trait PersistenceTarget: Send + Sync {
    /// The world as seen through this target, computed on every call
    fn current_view(&self) -> Result<VersionedStore>;

    /// Take ownership of the effects of `log`
    fn persist(&self, log: &OperationLog) -> Result<()>;

    /// Number of transaction scopes between this target and the root
    fn depth(&self) -> usize;

    /// Short name used in log lines
    fn label(&self) -> String;
}
