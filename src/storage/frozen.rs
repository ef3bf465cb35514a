use crate::core::{Entity, Result, StoreError, deep_clone, deep_freeze};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Store-ready copy of one entity: cloned away from the caller, frozen,
/// and type-erased so different entity types share one map.
///
/// Handles are cheap to clone and all point at the same immutable copy.
#[derive(Clone)]
pub struct FrozenEntity {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl FrozenEntity {
    /// Copy and freeze `entity`. Later changes to `entity` are not seen here.
    pub fn capture<T: Entity>(entity: &T) -> Self {
        let copy = deep_clone(entity);
        deep_freeze(&copy);
        Self {
            value: Arc::new(copy),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Fresh, mutable copy of the stored value
    pub fn thaw<T: Entity>(&self) -> Result<T> {
        self.inspect(|entity: &T| deep_clone(entity))
    }

    /// Read-only access to the stored value without copying it
    pub fn inspect<T: Entity, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let entity = self.value.downcast_ref::<T>().ok_or_else(|| {
            StoreError::TypeMismatch(format!(
                "stored value is {}, requested {}",
                self.type_name,
                std::any::type_name::<T>()
            ))
        })?;
        Ok(f(entity))
    }

    pub fn is<T: Entity>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// True when both handles share the same stored copy
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.value, &b.value)
    }
}

impl fmt::Debug for FrozenEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrozenEntity")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}
