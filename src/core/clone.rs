// ============================================================================
// Structural Clone & Freeze
// ============================================================================
//
// Every value crossing the store boundary is copied: captured on write,
// copied again on read. Plain data is copied field by field. Shared mutable
// nodes (`Shared<T>`) are copied through a visited map keyed by the source
// cell's address, so aliasing and cycles inside one entity graph come out
// the same shape on the other side. Behavior members (`Behavior<F>`) are
// carried over by reference.
//
// The freeze pass flips the runtime flag on every reachable `Shared` cell
// of a stored copy; `Shared::write` refuses to touch a frozen cell.
//
// ============================================================================

use super::error::{Result, StoreError};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Deep copy with identity preservation, plus an optional freeze pass.
pub trait StructuralClone: Sized {
    fn structural_clone(&self, ctx: &mut CloneContext) -> Self;

    /// Mark every shared node reachable from `self` immutable.
    /// Plain data has nothing to freeze.
    fn freeze(&self, ctx: &mut FreezeContext) {
        let _ = ctx;
    }
}

/// Clone `value` with a fresh visited map
pub fn deep_clone<T: StructuralClone>(value: &T) -> T {
    value.structural_clone(&mut CloneContext::new())
}

/// Freeze `value` with a fresh visited set
pub fn deep_freeze<T: StructuralClone>(value: &T) {
    value.freeze(&mut FreezeContext::new());
}

/// Visited map for one clone pass: source identity -> in-progress clone
#[derive(Default)]
pub struct CloneContext {
    clones: HashMap<usize, Box<dyn Any>>,
}

impl CloneContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone already produced for the node at `source`, if any
    pub fn lookup<T: Clone + 'static>(&self, source: usize) -> Option<T> {
        self.clones
            .get(&source)
            .and_then(|clone| clone.downcast_ref::<T>())
            .cloned()
    }

    /// Register `clone` as the copy of the node at `source`.
    /// Must happen before the node's children are cloned.
    pub fn remember<T: 'static>(&mut self, source: usize, clone: T) {
        self.clones.insert(source, Box::new(clone));
    }
}

/// Visited set for one freeze pass
#[derive(Debug, Default)]
pub struct FreezeContext {
    seen: HashSet<usize>,
}

impl FreezeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when `source` was already frozen in this pass
    pub fn first_visit(&mut self, source: usize) -> bool {
        self.seen.insert(source)
    }
}

/// Implement [`StructuralClone`] for types whose `Clone` already yields an
/// independent copy (no interior mutability, no shared handles).
///
/// ```
/// #[derive(Clone)]
/// struct Money(i64);
///
/// unitstore::plain_data!(Money);
/// ```
#[macro_export]
macro_rules! plain_data {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::StructuralClone for $ty {
                fn structural_clone(&self, _ctx: &mut $crate::CloneContext) -> Self {
                    ::core::clone::Clone::clone(self)
                }
            }
        )*
    };
}

crate::plain_data!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    &'static str,
    std::time::Duration,
    uuid::Uuid,
    chrono::DateTime<chrono::Utc>,
    chrono::NaiveDate,
    chrono::NaiveDateTime,
    serde_json::Value,
    crate::core::EntityKey,
    crate::core::EntityType,
);

impl<T: StructuralClone> StructuralClone for Option<T> {
    fn structural_clone(&self, ctx: &mut CloneContext) -> Self {
        self.as_ref().map(|value| value.structural_clone(ctx))
    }

    fn freeze(&self, ctx: &mut FreezeContext) {
        if let Some(value) = self {
            value.freeze(ctx);
        }
    }
}

impl<T: StructuralClone> StructuralClone for Box<T> {
    fn structural_clone(&self, ctx: &mut CloneContext) -> Self {
        Box::new((**self).structural_clone(ctx))
    }

    fn freeze(&self, ctx: &mut FreezeContext) {
        (**self).freeze(ctx);
    }
}

impl<T: StructuralClone> StructuralClone for Vec<T> {
    fn structural_clone(&self, ctx: &mut CloneContext) -> Self {
        self.iter().map(|item| item.structural_clone(ctx)).collect()
    }

    fn freeze(&self, ctx: &mut FreezeContext) {
        for item in self {
            item.freeze(ctx);
        }
    }
}

impl<T: StructuralClone> StructuralClone for VecDeque<T> {
    fn structural_clone(&self, ctx: &mut CloneContext) -> Self {
        self.iter().map(|item| item.structural_clone(ctx)).collect()
    }

    fn freeze(&self, ctx: &mut FreezeContext) {
        for item in self {
            item.freeze(ctx);
        }
    }
}

impl<T: StructuralClone, const N: usize> StructuralClone for [T; N] {
    fn structural_clone(&self, ctx: &mut CloneContext) -> Self {
        std::array::from_fn(|index| self[index].structural_clone(ctx))
    }

    fn freeze(&self, ctx: &mut FreezeContext) {
        for item in self {
            item.freeze(ctx);
        }
    }
}

// Map keys are never mutated in place, so a plain clone is enough for them.
impl<K: Clone + Eq + Hash, V: StructuralClone> StructuralClone for HashMap<K, V> {
    fn structural_clone(&self, ctx: &mut CloneContext) -> Self {
        self.iter()
            .map(|(key, value)| (key.clone(), value.structural_clone(ctx)))
            .collect()
    }

    fn freeze(&self, ctx: &mut FreezeContext) {
        for value in self.values() {
            value.freeze(ctx);
        }
    }
}

impl<K: Clone + Ord, V: StructuralClone> StructuralClone for BTreeMap<K, V> {
    fn structural_clone(&self, ctx: &mut CloneContext) -> Self {
        self.iter()
            .map(|(key, value)| (key.clone(), value.structural_clone(ctx)))
            .collect()
    }

    fn freeze(&self, ctx: &mut FreezeContext) {
        for value in self.values() {
            value.freeze(ctx);
        }
    }
}

impl<T: Clone + Eq + Hash> StructuralClone for HashSet<T> {
    fn structural_clone(&self, _ctx: &mut CloneContext) -> Self {
        self.clone()
    }
}

impl<T: Clone + Ord> StructuralClone for BTreeSet<T> {
    fn structural_clone(&self, _ctx: &mut CloneContext) -> Self {
        self.clone()
    }
}

macro_rules! tuple_structural_clone {
    ($($name:ident : $index:tt),+) => {
        impl<$($name: StructuralClone),+> StructuralClone for ($($name,)+) {
            fn structural_clone(&self, ctx: &mut CloneContext) -> Self {
                ($(self.$index.structural_clone(ctx),)+)
            }

            fn freeze(&self, ctx: &mut FreezeContext) {
                $(self.$index.freeze(ctx);)+
            }
        }
    };
}

tuple_structural_clone!(A: 0);
tuple_structural_clone!(A: 0, B: 1);
tuple_structural_clone!(A: 0, B: 1, C: 2);
tuple_structural_clone!(A: 0, B: 1, C: 2, D: 3);

// ============================================================================
// Shared<T>
// ============================================================================

struct SharedCell<T> {
    frozen: AtomicBool,
    /// Empty only while a structural clone of this cell is in progress
    slot: RwLock<Option<T>>,
}

/// Mutable node with identity, the one way an entity graph can alias itself.
///
/// `Clone` produces another handle to the same node. `structural_clone`
/// produces a new node, preserving aliasing and cycles within the graph
/// being cloned. Once frozen (stored copies are), writes fail with
/// [`StoreError::Frozen`].
///
/// Cyclic graphs built from `Shared` keep themselves alive; break the cycle
/// with [`Shared::replace`] when it is no longer needed.
pub struct Shared<T> {
    cell: Arc<SharedCell<T>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self::with_slot(Some(value))
    }

    fn with_slot(slot: Option<T>) -> Self {
        Self {
            cell: Arc::new(SharedCell {
                frozen: AtomicBool::new(false),
                slot: RwLock::new(slot),
            }),
        }
    }

    fn address(&self) -> usize {
        Arc::as_ptr(&self.cell) as usize
    }

    /// Run `f` against the current value
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let guard = self.cell.slot.read()?;
        let value = guard.as_ref().ok_or_else(Self::vacant_error)?;
        Ok(f(value))
    }

    /// Run `f` against the current value mutably. Fails on a frozen node.
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        if self.is_frozen() {
            return Err(StoreError::Frozen(format!(
                "Shared<{}> belongs to a stored snapshot",
                std::any::type_name::<T>()
            )));
        }

        let mut guard = self.cell.slot.write()?;
        let value = guard.as_mut().ok_or_else(Self::vacant_error)?;
        Ok(f(value))
    }

    pub fn replace(&self, value: T) -> Result<T> {
        self.write(|current| std::mem::replace(current, value))
    }

    pub fn get(&self) -> Result<T>
    where
        T: Clone,
    {
        self.read(T::clone)
    }

    pub fn is_frozen(&self) -> bool {
        self.cell.frozen.load(Ordering::Acquire)
    }

    /// True when both handles point at the same node
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.cell, &b.cell)
    }

    fn vacant_error() -> StoreError {
        StoreError::InvalidState(format!(
            "Shared<{}> is read while its clone is still being built",
            std::any::type_name::<T>()
        ))
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("frozen", &self.is_frozen())
            .finish_non_exhaustive()
    }
}

/// Compares contents. Do not use on cyclic graphs: it recurses through
/// the cycle.
impl<T: PartialEq> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        if Shared::ptr_eq(self, other) {
            return true;
        }

        let left = self.cell.slot.read().unwrap_or_else(PoisonError::into_inner);
        let right = other.cell.slot.read().unwrap_or_else(PoisonError::into_inner);
        *left == *right
    }
}

impl<T: StructuralClone + 'static> StructuralClone for Shared<T> {
    fn structural_clone(&self, ctx: &mut CloneContext) -> Self {
        let source = self.address();
        if let Some(existing) = ctx.lookup::<Shared<T>>(source) {
            return existing;
        }

        let copy = Shared::with_slot(None);
        ctx.remember(source, copy.clone());

        let value = {
            let guard = self.cell.slot.read().unwrap_or_else(PoisonError::into_inner);
            guard.as_ref().map(|value| value.structural_clone(ctx))
        };
        *copy.cell.slot.write().unwrap_or_else(PoisonError::into_inner) = value;

        copy
    }

    fn freeze(&self, ctx: &mut FreezeContext) {
        if !ctx.first_visit(self.address()) {
            return;
        }

        self.cell.frozen.store(true, Ordering::Release);
        let guard = self.cell.slot.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(value) = guard.as_ref() {
            value.freeze(ctx);
        }
    }
}

// ============================================================================
// Behavior<F>
// ============================================================================

/// Behavior carried by an entity (a closure, a strategy object).
/// Copies keep pointing at the same behavior.
pub struct Behavior<F: ?Sized>(Arc<F>);

impl<F> Behavior<F> {
    pub fn new(behavior: F) -> Self {
        Self(Arc::new(behavior))
    }
}

impl<F: ?Sized> Behavior<F> {
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl<F: ?Sized> From<Arc<F>> for Behavior<F> {
    fn from(behavior: Arc<F>) -> Self {
        Self(behavior)
    }
}

impl<F: ?Sized> Deref for Behavior<F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.0
    }
}

impl<F: ?Sized> Clone for Behavior<F> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<F: ?Sized> fmt::Debug for Behavior<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Behavior(..)")
    }
}

impl<F: ?Sized> PartialEq for Behavior<F> {
    fn eq(&self, other: &Self) -> bool {
        Behavior::ptr_eq(self, other)
    }
}

impl<F: ?Sized> StructuralClone for Behavior<F> {
    fn structural_clone(&self, _ctx: &mut CloneContext) -> Self {
        self.clone()
    }
}
