pub mod clone;
pub mod entity;
pub mod error;
pub mod types;

pub use clone::{
    Behavior, CloneContext, FreezeContext, Shared, StructuralClone, deep_clone, deep_freeze,
};
pub use entity::Entity;
pub use error::{Result, StoreError};
pub use types::{EntityKey, EntityType};
