pub mod engine;
pub mod frozen;
pub mod memory;

pub use engine::PersistenceTarget;
pub use frozen::FrozenEntity;
pub use memory::VersionedStore;
