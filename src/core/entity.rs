use super::clone::StructuralClone;
use super::types::{EntityKey, EntityType};

/// An identity-bearing record managed by the store.
///
/// Usually derived:
///
/// ```
/// use unitstore::{Entity, StructuralClone};
///
/// #[derive(Debug, Clone, PartialEq, Entity, StructuralClone)]
/// #[entity(type = "user")]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// let user = User { id: 1, name: "Alice".into() };
/// assert_eq!(user.key(), unitstore::EntityKey::Integer(1));
/// assert_eq!(User::ENTITY_TYPE.name(), "user");
/// ```
pub trait Entity: StructuralClone + Send + Sync + 'static {
    /// Partition this entity is stored under
    const ENTITY_TYPE: EntityType;

    /// Identity key, unique within [`Entity::ENTITY_TYPE`]
    fn key(&self) -> EntityKey;
}
