use super::FrozenEntity;
use crate::core::{Entity, EntityKey, EntityType, Result};
use im::HashMap;

type Partition = HashMap<EntityKey, FrozenEntity>;

/// Type-partitioned map from identity key to a frozen entity copy.
///
/// Reads hand out fresh copies, writes capture frozen copies, so nothing
/// outside the store can reach stored state. Partitions are persistent
/// (`im`) maps: [`VersionedStore::copy`] shares structure with the source
/// and the two diverge independently from then on.
#[derive(Debug, Clone, Default)]
pub struct VersionedStore {
    partitions: HashMap<EntityType, Partition>,
}

impl VersionedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh copy of the entity at `key`, or `None`
    pub fn get<T: Entity>(&self, entity_type: &EntityType, key: &EntityKey) -> Result<Option<T>> {
        match self.get_frozen(entity_type, key) {
            Some(frozen) => frozen.thaw().map(Some),
            None => Ok(None),
        }
    }

    pub fn get_frozen(&self, entity_type: &EntityType, key: &EntityKey) -> Option<&FrozenEntity> {
        self.partitions
            .get(entity_type)
            .and_then(|partition| partition.get(key))
    }

    /// Store a frozen copy of `entity`, replacing whatever was at `key`
    pub fn set<T: Entity>(&mut self, entity_type: EntityType, key: EntityKey, entity: &T) {
        self.set_frozen(entity_type, key, FrozenEntity::capture(entity));
    }

    pub fn set_frozen(&mut self, entity_type: EntityType, key: EntityKey, frozen: FrozenEntity) {
        match self.partitions.get_mut(&entity_type) {
            Some(partition) => {
                partition.insert(key, frozen);
            }
            None => {
                self.partitions.insert(entity_type, Partition::unit(key, frozen));
            }
        }
    }

    /// Remove the entity at `key`. Returns false when nothing was there.
    pub fn remove(&mut self, entity_type: &EntityType, key: &EntityKey) -> bool {
        let Some(partition) = self.partitions.get_mut(entity_type) else {
            return false;
        };

        let removed = partition.remove(key).is_some();
        if partition.is_empty() {
            self.partitions.remove(entity_type);
        }
        removed
    }

    /// Independent store with the same contents
    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn contains(&self, entity_type: &EntityType, key: &EntityKey) -> bool {
        self.get_frozen(entity_type, key).is_some()
    }

    /// Total number of entities across all types
    pub fn len(&self) -> usize {
        self.partitions.values().map(|partition| partition.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn partition_len(&self, entity_type: &EntityType) -> usize {
        self.partitions
            .get(entity_type)
            .map(|partition| partition.len())
            .unwrap_or(0)
    }

    /// Entity types currently holding at least one entity, sorted
    pub fn entity_types(&self) -> Vec<EntityType> {
        let mut types: Vec<EntityType> = self.partitions.keys().cloned().collect();
        types.sort();
        types
    }

    /// Keys stored under `entity_type`, sorted
    pub fn keys(&self, entity_type: &EntityType) -> Vec<EntityKey> {
        let mut keys: Vec<EntityKey> = self
            .partitions
            .get(entity_type)
            .map(|partition| partition.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}
