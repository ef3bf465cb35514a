use super::Operation;
use crate::core::{Entity, EntityKey, EntityType};
use crate::storage::{FrozenEntity, VersionedStore};
use im::Vector;

/// Ordered, replayable sequence of [`Operation`]s.
///
/// Replaying applies operations strictly in order, so for repeated
/// operations on the same key the last one decides: an upsert after a
/// remove brings the key back, a remove after an upsert deletes it.
#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    operations: Vector<Operation>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an upsert carrying a frozen copy of `entity`
    pub fn record_upsert<T: Entity>(&mut self, entity_type: EntityType, key: EntityKey, entity: &T) {
        self.push(Operation::Upsert {
            entity_type,
            key,
            entity: FrozenEntity::capture(entity),
        });
    }

    pub fn record_remove(&mut self, entity_type: EntityType, key: EntityKey) {
        self.push(Operation::Remove { entity_type, key });
    }

    pub fn push(&mut self, operation: Operation) {
        self.operations.push_back(operation);
    }

    /// `base` with every operation applied in order. `base` is untouched.
    pub fn replay_onto(&self, base: &VersionedStore) -> VersionedStore {
        let mut store = base.copy();
        for operation in self.operations.iter() {
            operation.apply_to(&mut store);
        }
        store
    }

    /// New log holding `self`'s operations followed by `other`'s
    pub fn concat(&self, other: &OperationLog) -> OperationLog {
        let mut operations = self.operations.clone();
        operations.append(other.operations.clone());
        OperationLog { operations }
    }

    pub fn clear(&mut self) {
        self.operations.clear();
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    /// Number of upserts and removes, in that order
    pub fn counts(&self) -> (usize, usize) {
        self.operations.iter().fold((0, 0), |(upserts, removes), op| {
            if op.is_upsert() {
                (upserts + 1, removes)
            } else {
                (upserts, removes + 1)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Entity, StructuralClone};

    #[derive(Debug, Clone, PartialEq, Entity, StructuralClone)]
    #[entity(type = "item")]
    struct Item {
        id: i64,
        label: String,
    }

    fn item(id: i64, label: &str) -> Item {
        Item {
            id,
            label: label.to_string(),
        }
    }

    fn upsert(log: &mut OperationLog, entity: &Item) {
        log.record_upsert(Item::ENTITY_TYPE, entity.key(), entity);
    }

    fn remove(log: &mut OperationLog, id: i64) {
        log.record_remove(Item::ENTITY_TYPE, EntityKey::from(id));
    }

    fn labels(store: &VersionedStore, id: i64) -> Option<String> {
        store
            .get::<Item>(&Item::ENTITY_TYPE, &EntityKey::from(id))
            .unwrap()
            .map(|item| item.label)
    }

    #[test]
    fn test_replay_does_not_mutate_base() {
        let mut base = VersionedStore::new();
        base.set(Item::ENTITY_TYPE, EntityKey::from(1), &item(1, "base"));

        let mut log = OperationLog::new();
        upsert(&mut log, &item(1, "changed"));
        upsert(&mut log, &item(2, "new"));

        let derived = log.replay_onto(&base);

        assert_eq!(labels(&derived, 1).as_deref(), Some("changed"));
        assert_eq!(labels(&derived, 2).as_deref(), Some("new"));
        assert_eq!(labels(&base, 1).as_deref(), Some("base"));
        assert_eq!(labels(&base, 2), None);
    }

    #[test]
    fn test_last_operation_wins() {
        let base = VersionedStore::new();

        let mut save_then_remove = OperationLog::new();
        upsert(&mut save_then_remove, &item(1, "a"));
        remove(&mut save_then_remove, 1);
        assert_eq!(labels(&save_then_remove.replay_onto(&base), 1), None);

        let mut remove_then_save = OperationLog::new();
        remove(&mut remove_then_save, 1);
        upsert(&mut remove_then_save, &item(1, "back"));
        assert_eq!(
            labels(&remove_then_save.replay_onto(&base), 1).as_deref(),
            Some("back")
        );
    }

    #[test]
    fn test_recorded_upsert_ignores_later_caller_edits() {
        let mut entity = item(1, "before");
        let mut log = OperationLog::new();
        upsert(&mut log, &entity);
        entity.label = "after".into();

        let store = log.replay_onto(&VersionedStore::new());
        assert_eq!(labels(&store, 1).as_deref(), Some("before"));
    }

    #[test]
    fn test_concat_preserves_order_and_sources() {
        let mut first = OperationLog::new();
        upsert(&mut first, &item(1, "first"));
        let mut second = OperationLog::new();
        upsert(&mut second, &item(1, "second"));
        remove(&mut second, 2);

        let combined = first.concat(&second);
        assert_eq!(combined.len(), 3);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
        assert_eq!(combined.counts(), (2, 1));

        let store = combined.replay_onto(&VersionedStore::new());
        assert_eq!(labels(&store, 1).as_deref(), Some("second"));
    }

    #[test]
    fn test_concat_is_associative() {
        let mut a = OperationLog::new();
        upsert(&mut a, &item(1, "a"));
        let mut b = OperationLog::new();
        remove(&mut b, 1);
        let mut c = OperationLog::new();
        upsert(&mut c, &item(1, "c"));

        let left = a.concat(&b).concat(&c);
        let right = a.concat(&b.concat(&c));

        let left_ops: Vec<String> = left.iter().map(|op| op.to_string()).collect();
        let right_ops: Vec<String> = right.iter().map(|op| op.to_string()).collect();
        assert_eq!(left_ops, right_ops);
    }

    #[test]
    fn test_clear() {
        let mut log = OperationLog::new();
        upsert(&mut log, &item(1, "a"));
        assert!(!log.is_empty());
        log.clear();
        assert!(log.is_empty());
    }
}
