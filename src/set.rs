//! Insertion-ordered hash set behind a cheap-to-clone shared handle.

use core::cell::{Ref, RefCell};
use core::fmt;
use core::hash::BuildHasher;
use std::collections::hash_map::RandomState;
use std::rc::Rc;

use crate::cursor::Cursor;
use crate::key::CanonicalKey;
use crate::protocol::{NativeView, SetLike};
use crate::table::{KeySlots, OrderedTable};

/// Insertion-ordered hash set with shared-handle semantics.
///
/// `clone` copies the handle, not the storage: all clones address one set,
/// which is what lets operand callbacks reach (and mutate) a set an
/// operation is working on. Structural copies come from the set algebra,
/// [`FromIterator`], or collecting [`to_vec`].
///
/// Membership is canonical-form membership; see [`CanonicalKey`]. Iteration
/// follows insertion order, and a member deleted then inserted again moves
/// to the back.
///
/// [`to_vec`]: OrderedSet::to_vec
pub struct OrderedSet<K, S = RandomState> {
    table: Rc<RefCell<OrderedTable<K, (), S>>>,
}

impl<K, S> Clone for OrderedSet<K, S> {
    /// Clones the handle; both handles address the same set.
    fn clone(&self) -> Self {
        Self {
            table: Rc::clone(&self.table),
        }
    }
}

impl<K> OrderedSet<K>
where
    K: CanonicalKey,
{
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K, S> OrderedSet<K, S>
where
    K: CanonicalKey,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_table(OrderedTable::with_hasher(hasher))
    }

    pub(crate) fn from_table(table: OrderedTable<K, (), S>) -> Self {
        Self {
            table: Rc::new(RefCell::new(table)),
        }
    }

    pub(crate) fn table(&self) -> &Rc<RefCell<OrderedTable<K, (), S>>> {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.borrow().is_empty()
    }

    /// Adds `key` in canonical form; returns whether it was newly added.
    /// An existing member keeps its position in the iteration order.
    pub fn insert(&self, key: K) -> bool {
        self.table.borrow_mut().insert(key, ()).is_none()
    }

    /// Removes `key`; returns whether it was a member. The slot is
    /// tombstoned, so in-flight cursors are undisturbed; storage is
    /// reclaimed by [`shrink_if_needed`].
    ///
    /// [`shrink_if_needed`]: OrderedSet::shrink_if_needed
    pub fn remove(&self, key: &K) -> bool {
        self.table.borrow_mut().remove(key).is_some()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.table.borrow().contains(key)
    }

    pub fn clear(&self) {
        self.table.borrow_mut().clear();
    }

    /// Compacts tombstoned storage when it dominates live members.
    pub fn shrink_if_needed(&self) {
        let mut table = self.table.borrow_mut();
        let live = table.len();
        table.shrink_if_needed(live);
    }

    /// Mutation-tolerant iterator over members in insertion order; see
    /// [`Cursor`].
    pub fn cursor(&self) -> Cursor<K, (), S> {
        Cursor::over(Rc::clone(&self.table))
    }

    /// Members in insertion order, snapshotted.
    pub fn to_vec(&self) -> Vec<K> {
        self.table.borrow().iter().map(|(k, _)| k.clone()).collect()
    }
}

impl<K, S> SetLike<K> for OrderedSet<K, S>
where
    K: CanonicalKey,
    S: BuildHasher,
{
    fn size(&self) -> f64 {
        self.len() as f64
    }

    fn has(&self, key: &K) -> bool {
        self.contains(key)
    }

    fn keys(&self) -> Box<dyn Iterator<Item = K> + '_> {
        Box::new(self.cursor())
    }

    fn as_native(&self) -> Option<NativeView<'_, K>> {
        Some(NativeView::over(Ref::map(self.table.borrow(), |table| {
            table as &dyn KeySlots<K>
        })))
    }
}

impl<K> Default for OrderedSet<K>
where
    K: CanonicalKey,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> FromIterator<K> for OrderedSet<K>
where
    K: CanonicalKey,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let set = Self::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

impl<K, S> Extend<K> for OrderedSet<K, S>
where
    K: CanonicalKey,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

/// Membership equality: same members, insertion order ignored.
impl<K, S> PartialEq for OrderedSet<K, S>
where
    K: CanonicalKey,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.table, &other.table) {
            return true;
        }
        if self.len() != other.len() {
            return false;
        }
        let mine = self.table.borrow();
        let theirs = other.table.borrow();
        let all_present = mine.iter().all(|(key, _)| theirs.contains(key));
        all_present
    }
}

impl<K, S> Eq for OrderedSet<K, S>
where
    K: CanonicalKey,
    S: BuildHasher,
{
}

impl<K, S> fmt::Debug for OrderedSet<K, S>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.table.borrow().iter().map(|(k, _)| k))
            .finish()
    }
}
