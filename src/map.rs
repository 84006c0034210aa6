//! Insertion-ordered hash map sharing the set's storage layer.

use core::cell::{Ref, RefCell};
use core::fmt;
use core::hash::BuildHasher;
use std::collections::hash_map::RandomState;
use std::rc::Rc;

use crate::cursor::Cursor;
use crate::key::CanonicalKey;
use crate::protocol::{NativeView, SetLike};
use crate::table::{KeySlots, OrderedTable};

/// Insertion-ordered hash map with shared-handle semantics.
///
/// Same storage discipline as [`OrderedSet`]: canonical-form keys,
/// insertion-order iteration, tombstone deletes, cursor-safe compaction.
/// Updating an existing key's value keeps its position. As a set-algebra
/// operand a map behaves as the set of its keys.
///
/// [`OrderedSet`]: crate::set::OrderedSet
pub struct OrderedMap<K, V, S = RandomState> {
    table: Rc<RefCell<OrderedTable<K, V, S>>>,
}

impl<K, V, S> Clone for OrderedMap<K, V, S> {
    /// Clones the handle; both handles address the same map.
    fn clone(&self) -> Self {
        Self {
            table: Rc::clone(&self.table),
        }
    }
}

impl<K, V> OrderedMap<K, V>
where
    K: CanonicalKey,
{
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K, V, S> OrderedMap<K, V, S>
where
    K: CanonicalKey,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: Rc::new(RefCell::new(OrderedTable::with_hasher(hasher))),
        }
    }

    pub fn len(&self) -> usize {
        self.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.borrow().is_empty()
    }

    /// Maps `key` (in canonical form) to `value`; returns the replaced
    /// value, if any. An existing key keeps its position in the iteration
    /// order.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.table.borrow_mut().insert(key, value)
    }

    /// Removes `key`; returns its value if it was present. The slot is
    /// tombstoned, so in-flight cursors are undisturbed.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.table.borrow_mut().remove(key).map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.table.borrow().contains(key)
    }

    pub fn clear(&self) {
        self.table.borrow_mut().clear();
    }

    /// Compacts tombstoned storage when it dominates live entries.
    pub fn shrink_if_needed(&self) {
        let mut table = self.table.borrow_mut();
        let live = table.len();
        table.shrink_if_needed(live);
    }

    /// Mutation-tolerant iterator over keys in insertion order.
    pub fn keys(&self) -> Cursor<K, V, S> {
        Cursor::over(Rc::clone(&self.table))
    }
}

impl<K, V, S> OrderedMap<K, V, S>
where
    K: CanonicalKey,
    V: Clone,
    S: BuildHasher,
{
    pub fn get(&self, key: &K) -> Option<V> {
        self.table.borrow().get(key).cloned()
    }

    /// Entries in insertion order, snapshotted.
    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.table
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// A map is set-like over its keys.
impl<K, V, S> SetLike<K> for OrderedMap<K, V, S>
where
    K: CanonicalKey,
    S: BuildHasher,
{
    fn size(&self) -> f64 {
        self.len() as f64
    }

    fn has(&self, key: &K) -> bool {
        self.contains_key(key)
    }

    fn keys(&self) -> Box<dyn Iterator<Item = K> + '_> {
        Box::new(OrderedMap::keys(self))
    }

    fn as_native(&self) -> Option<NativeView<'_, K>> {
        Some(NativeView::over(Ref::map(self.table.borrow(), |table| {
            table as &dyn KeySlots<K>
        })))
    }
}

impl<K, V> Default for OrderedMap<K, V>
where
    K: CanonicalKey,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for OrderedMap<K, V>
where
    K: CanonicalKey,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<K, V, S> fmt::Debug for OrderedMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.table.borrow().iter())
            .finish()
    }
}
