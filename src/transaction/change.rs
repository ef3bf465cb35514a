// ============================================================================
// Recorded Operations
// ============================================================================
//
// An Operation is an intended mutation captured at call time and applied
// only when a log is replayed. Upserts carry a frozen copy taken when they
// were recorded, so later edits to the caller's value never leak in.
//
// ============================================================================

use crate::core::{EntityKey, EntityType};
use crate::storage::{FrozenEntity, VersionedStore};

#[derive(Debug, Clone)]
pub enum Operation {
    /// Insert or overwrite the entity at `(entity_type, key)`
    Upsert {
        entity_type: EntityType,
        key: EntityKey,
        entity: FrozenEntity,
    },

    /// Delete the entity at `(entity_type, key)` if present
    Remove {
        entity_type: EntityType,
        key: EntityKey,
    },
}

impl Operation {
    pub fn entity_type(&self) -> &EntityType {
        match self {
            Operation::Upsert { entity_type, .. } => entity_type,
            Operation::Remove { entity_type, .. } => entity_type,
        }
    }

    pub fn key(&self) -> &EntityKey {
        match self {
            Operation::Upsert { key, .. } => key,
            Operation::Remove { key, .. } => key,
        }
    }

    pub fn is_upsert(&self) -> bool {
        matches!(self, Operation::Upsert { .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, Operation::Remove { .. })
    }

    /// Apply this operation to `store` in place
    pub fn apply_to(&self, store: &mut VersionedStore) {
        match self {
            Operation::Upsert {
                entity_type,
                key,
                entity,
            } => store.set_frozen(entity_type.clone(), key.clone(), entity.clone()),
            Operation::Remove { entity_type, key } => {
                store.remove(entity_type, key);
            }
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Upsert {
                entity_type, key, ..
            } => write!(f, "UPSERT {}[{}]", entity_type, key),
            Operation::Remove { entity_type, key } => write!(f, "REMOVE {}[{}]", entity_type, key),
        }
    }
}
