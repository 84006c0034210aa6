//! Insertion-ordered hash table with tombstone deletes and deferred
//! compaction.
//!
//! Two layers:
//! - a slot arena (`Vec<Option<Entry>>`): entries in insertion order, where
//!   deleting leaves a tombstone (`None`) so later slots keep their
//!   positions;
//! - a hash index (`hashbrown::HashTable<usize>`): maps a key's hash to its
//!   slot position for O(1) probes.
//!
//! Each entry stores the `u64` hash it was inserted under. The index can
//! therefore be rebuilt (on growth or compaction) without ever calling
//! `K::hash` again, which matters because keys are user types: hashing runs
//! user code, and rebuilds must not.
//!
//! The arena only grows between compactions. Compaction rewrites it without
//! tombstones and rebases every registered cursor to its equivalent position,
//! so iteration survives arbitrary interleaved mutation.

use core::cell::Cell;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;
use std::rc::{Rc, Weak};

use hashbrown::hash_table::Entry as IndexEntry;
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};

use crate::key::CanonicalKey;
use crate::reentrancy::ReentryCheck;

struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

/// Insertion-ordered hash table, the storage layer under [`OrderedSet`] and
/// [`OrderedMap`].
///
/// Deletion tombstones the slot instead of shifting later entries, so a
/// position handed to a cursor stays meaningful across mutation. Tombstones
/// accumulate until [`shrink_if_needed`] decides they dominate and compacts
/// them away.
///
/// [`OrderedSet`]: crate::set::OrderedSet
/// [`OrderedMap`]: crate::map::OrderedMap
/// [`shrink_if_needed`]: OrderedTable::shrink_if_needed
pub struct OrderedTable<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<usize>,
    slots: Vec<Option<Entry<K, V>>>,
    cursors: SlotMap<DefaultKey, Weak<Cell<usize>>>,
    reentrancy: ReentryCheck,
}

impl<K, V, S> OrderedTable<K, V, S> {
    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Length of the slot arena: live entries plus tombstones. Walking
    /// `0..span()` with [`key_at`] visits every live entry in insertion
    /// order.
    ///
    /// [`key_at`]: OrderedTable::key_at
    pub fn span(&self) -> usize {
        self.slots.len()
    }

    /// Key at slot position `at`; `None` for tombstones and positions past
    /// the arena.
    pub fn key_at(&self, at: usize) -> Option<&K> {
        self.slots.get(at).and_then(|slot| slot.as_ref()).map(|e| &e.key)
    }

    /// Entry at slot position `at`; `None` for tombstones and positions past
    /// the arena.
    pub fn get_at(&self, at: usize) -> Option<(&K, &V)> {
        self.slots
            .get(at)
            .and_then(|slot| slot.as_ref())
            .map(|e| (&e.key, &e.value))
    }

    /// Live entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|e| (&e.key, &e.value)))
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Drops every entry and resets the arena. Registered cursors rebase to
    /// the front, so they observe entries added afterwards.
    pub fn clear(&mut self) {
        let dropped = core::mem::take(&mut self.slots);
        self.index.clear();
        self.cursors.retain(|_, weak| match weak.upgrade() {
            Some(pos) => {
                pos.set(0);
                true
            }
            None => false,
        });
        // Entry drops run last, after the table is consistent again.
        drop(dropped);
    }

    /// Compacts the arena when tombstones dominate live entries.
    ///
    /// `live` is the caller-tracked live count; batch callers (the set
    /// algebra) invoke this once per operation rather than once per delete.
    pub fn shrink_if_needed(&mut self, live: usize) {
        debug_assert_eq!(live, self.index.len(), "tracked live count drifted");
        if live * 2 < self.slots.len() {
            self.compact(live);
        }
    }

    /// Rewrites the arena without tombstones and rebuilds the index from
    /// stored hashes. `K::hash` is not consulted. Every registered cursor is
    /// rebased to the new position of its old one: the number of live slots
    /// that preceded it.
    fn compact(&mut self, live: usize) {
        let old = core::mem::replace(&mut self.slots, Vec::with_capacity(live));
        // live_before[p]: live slots among old positions 0..p.
        let mut live_before = Vec::with_capacity(old.len() + 1);
        live_before.push(0usize);
        for slot in old {
            if let Some(entry) = slot {
                self.slots.push(Some(entry));
            }
            live_before.push(self.slots.len());
        }
        debug_assert_eq!(self.slots.len(), live, "live count does not match survivors");

        self.index = HashTable::with_capacity(self.slots.len());
        for at in 0..self.slots.len() {
            let hash = match self.slots[at].as_ref() {
                Some(entry) => entry.hash,
                None => unreachable!("compacted arena has no tombstones"),
            };
            self.index.insert_unique(hash, at, |&other| {
                self.slots
                    .get(other)
                    .and_then(|slot| slot.as_ref())
                    .map(|e| e.hash)
                    .unwrap_or(0)
            });
        }

        self.cursors.retain(|_, weak| match weak.upgrade() {
            Some(pos) => {
                let clamped = pos.get().min(live_before.len() - 1);
                pos.set(live_before[clamped]);
                true
            }
            None => false,
        });
    }

    /// Registers a cursor position cell for rebasing on compaction and
    /// clear. The registry holds a weak reference; dropped cursors are
    /// pruned on the next rebase.
    pub(crate) fn register_cursor(&mut self, pos: &Rc<Cell<usize>>) -> DefaultKey {
        self.cursors.insert(Rc::downgrade(pos))
    }

    pub(crate) fn deregister_cursor(&mut self, registration: DefaultKey) {
        self.cursors.remove(registration);
    }
}

impl<K, V> OrderedTable<K, V>
where
    K: CanonicalKey,
{
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K, V, S> OrderedTable<K, V, S>
where
    K: CanonicalKey,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: HashTable::new(),
            slots: Vec::new(),
            cursors: SlotMap::with_key(),
            reentrancy: ReentryCheck::new(),
        }
    }

    /// Inserts `key` in canonical form, or updates an existing entry's value
    /// in place.
    ///
    /// A new key is appended to the arena, so a key deleted and inserted
    /// again moves to the back of the iteration order. An existing key keeps
    /// its slot. Returns the replaced value, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let key = key.canonical().unwrap_or(key);
        let _g = self.reentrancy.enter();
        let hash = self.hasher.hash_one(&key);
        match self.index.entry(
            hash,
            |&at| {
                self.slots
                    .get(at)
                    .and_then(|slot| slot.as_ref())
                    .map(|e| e.key == key)
                    .unwrap_or(false)
            },
            |&at| {
                self.slots
                    .get(at)
                    .and_then(|slot| slot.as_ref())
                    .map(|e| e.hash)
                    .unwrap_or(0)
            },
        ) {
            IndexEntry::Occupied(found) => {
                let at = *found.get();
                let slot = self.slots[at].as_mut().expect("indexed slot is live");
                Some(core::mem::replace(&mut slot.value, value))
            }
            IndexEntry::Vacant(vacant) => {
                let at = self.slots.len();
                self.slots.push(Some(Entry { key, value, hash }));
                vacant.insert(at);
                None
            }
        }
    }

    /// Removes `key`, tombstoning its slot. Other slots keep their
    /// positions; in-flight cursors are unaffected.
    pub fn remove(&mut self, key: &K) -> Option<(K, V)> {
        let canonical;
        let key = match key.canonical() {
            Some(form) => {
                canonical = form;
                &canonical
            }
            None => key,
        };
        let _g = self.reentrancy.enter();
        let hash = self.hasher.hash_one(key);
        let at = match self.index.find_entry(hash, |&at| {
            self.slots
                .get(at)
                .and_then(|slot| slot.as_ref())
                .map(|e| e.key == *key)
                .unwrap_or(false)
        }) {
            Ok(found) => {
                let (at, _) = found.remove();
                at
            }
            Err(_) => return None,
        };
        let entry = self.slots[at].take().expect("indexed slot is live");
        Some((entry.key, entry.value))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let at = self.find(key)?;
        self.slots[at].as_ref().map(|e| &e.value)
    }

    /// Slot position of `key`, probing with its canonical form.
    fn find(&self, key: &K) -> Option<usize> {
        let canonical;
        let key = match key.canonical() {
            Some(form) => {
                canonical = form;
                &canonical
            }
            None => key,
        };
        let _g = self.reentrancy.enter();
        let hash = self.hasher.hash_one(key);
        self.index
            .find(hash, |&at| {
                self.slots
                    .get(at)
                    .and_then(|slot| slot.as_ref())
                    .map(|e| e.key == *key)
                    .unwrap_or(false)
            })
            .copied()
    }
}

impl<K, V> Default for OrderedTable<K, V>
where
    K: CanonicalKey,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Structural copy: live entries only, in insertion order, reusing stored
/// hashes. The copy shares no storage with the original and starts with no
/// registered cursors. `K::hash` is not consulted.
impl<K, V, S> Clone for OrderedTable<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        let mut copy = Self {
            hasher: self.hasher.clone(),
            index: HashTable::with_capacity(self.index.len()),
            slots: Vec::with_capacity(self.index.len()),
            cursors: SlotMap::with_key(),
            reentrancy: ReentryCheck::new(),
        };
        for slot in self.slots.iter() {
            if let Some(entry) = slot {
                let at = copy.slots.len();
                copy.slots.push(Some(Entry {
                    key: entry.key.clone(),
                    value: entry.value.clone(),
                    hash: entry.hash,
                }));
                copy.index.insert_unique(entry.hash, at, |&other| {
                    copy.slots
                        .get(other)
                        .and_then(|slot| slot.as_ref())
                        .map(|e| e.hash)
                        .unwrap_or(0)
                });
            }
        }
        copy
    }
}

/// Object-safe slot access, used by the set algebra to walk a native
/// operand's table without going through its capability methods.
pub(crate) trait KeySlots<K> {
    fn live_len(&self) -> usize;
    fn slot_span(&self) -> usize;
    fn slot_key(&self, at: usize) -> Option<&K>;
    fn contains_key(&self, key: &K) -> bool;
}

impl<K, V, S> KeySlots<K> for OrderedTable<K, V, S>
where
    K: CanonicalKey,
    S: BuildHasher,
{
    fn live_len(&self) -> usize {
        self.len()
    }

    fn slot_span(&self) -> usize {
        self.span()
    }

    fn slot_key(&self, at: usize) -> Option<&K> {
        self.key_at(at)
    }

    fn contains_key(&self, key: &K) -> bool {
        self.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Number;
    use core::hash::Hasher;

    /// Build hasher producing a constant hash, forcing every key into one
    /// index bucket so probes exercise the eq closure.
    #[derive(Clone, Default)]
    struct ConstBuildHasher;

    struct ConstHasher;

    impl Hasher for ConstHasher {
        fn finish(&self) -> u64 {
            17
        }
        fn write(&mut self, _bytes: &[u8]) {}
    }

    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> ConstHasher {
            ConstHasher
        }
    }

    fn keys_of<K: Clone, V, S>(table: &OrderedTable<K, V, S>) -> Vec<K> {
        table.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Invariant: iteration yields entries in insertion order.
    #[test]
    fn iteration_follows_insertion_order() {
        let mut table = OrderedTable::new();
        for k in [3, 1, 4, 1, 5, 9, 2, 6] {
            table.insert(k, ());
        }
        assert_eq!(keys_of(&table), vec![3, 1, 4, 5, 9, 2, 6]);
        assert_eq!(table.len(), 7);
    }

    /// Invariant: inserting an existing key keeps its slot and replaces the
    /// value in place.
    #[test]
    fn duplicate_insert_keeps_position() {
        let mut table = OrderedTable::new();
        assert_eq!(table.insert("a", 1), None);
        assert_eq!(table.insert("b", 2), None);
        assert_eq!(table.insert("a", 10), Some(1));
        assert_eq!(keys_of(&table), vec!["a", "b"]);
        assert_eq!(table.get(&"a"), Some(&10));
    }

    /// Invariant: removal tombstones the slot; later entries keep their
    /// positions and iteration order.
    #[test]
    fn remove_leaves_a_tombstone() {
        let mut table = OrderedTable::new();
        for k in [10, 20, 30, 40] {
            table.insert(k, ());
        }
        assert_eq!(table.remove(&20), Some((20, ())));
        assert_eq!(table.remove(&20), None);
        assert_eq!(table.len(), 3);
        assert_eq!(table.span(), 4, "arena keeps the tombstoned slot");
        assert_eq!(keys_of(&table), vec![10, 30, 40]);
        assert_eq!(table.key_at(1), None);
        assert_eq!(table.key_at(2), Some(&30));
        assert_eq!(table.get_at(1), None);
        assert_eq!(table.get_at(2), Some((&30, &())));
    }

    /// Invariant: a key removed and inserted again occupies a fresh slot at
    /// the back of the iteration order.
    #[test]
    fn reinsert_moves_to_the_back() {
        let mut table = OrderedTable::new();
        for k in [1, 2, 3] {
            table.insert(k, ());
        }
        table.remove(&1);
        table.insert(1, ());
        assert_eq!(keys_of(&table), vec![2, 3, 1]);
    }

    /// Invariant: negative zero and NaN payloads canonicalize on entry, so
    /// each family occupies exactly one slot and any form probes it.
    #[test]
    fn numeric_forms_share_a_slot() {
        let mut table = OrderedTable::new();
        assert!(table.insert(Number(0.0), ()).is_none());
        assert!(table.insert(Number(-0.0), ()).is_some(), "same member");
        assert_eq!(table.len(), 1);
        assert!(table.contains(&Number(-0.0)));
        assert!(table.contains(&Number(0.0)));

        let payload = Number(f64::from_bits(f64::NAN.to_bits() | 1));
        assert!(table.insert(Number(f64::NAN), ()).is_none());
        assert!(table.insert(payload, ()).is_some(), "same member");
        assert_eq!(table.len(), 2);
        assert!(table.contains(&payload));

        // The stored forms are the canonical ones.
        let stored: Vec<Number> = keys_of(&table);
        assert!(stored[0].get().is_sign_positive());
        assert_eq!(stored[1].get().to_bits(), f64::NAN.to_bits());
    }

    /// Invariant: shrink compacts only when tombstones strictly dominate
    /// live entries, and compaction preserves order while resetting span.
    #[test]
    fn shrink_threshold_and_compaction() {
        let mut table = OrderedTable::new();
        for k in 0..4 {
            table.insert(k, ());
        }
        table.remove(&1);
        table.remove(&3);

        // live * 2 == span: not yet dominated.
        table.shrink_if_needed(2);
        assert_eq!(table.span(), 4);

        table.remove(&0);
        table.shrink_if_needed(1);
        assert_eq!(table.span(), 1, "compacted");
        assert_eq!(keys_of(&table), vec![2]);
        assert!(table.contains(&2), "index still resolves after rebuild");
    }

    /// Invariant: clearing empties arena and index; lookups and reinsertion
    /// still work.
    #[test]
    fn clear_resets_storage() {
        let mut table = OrderedTable::new();
        for k in 0..8 {
            table.insert(k, k * 10);
        }
        table.clear();
        assert_eq!(table.len(), 0);
        assert_eq!(table.span(), 0);
        assert!(!table.contains(&3));
        table.insert(99, 0);
        assert_eq!(keys_of(&table), vec![99]);
    }

    /// Invariant: a structural copy carries live entries only and is fully
    /// independent of the original.
    #[test]
    fn clone_is_compact_and_independent() {
        let mut table = OrderedTable::new();
        for k in 0..6 {
            table.insert(k, ());
        }
        table.remove(&0);
        table.remove(&4);

        let copy = table.clone();
        assert_eq!(copy.len(), 4);
        assert_eq!(copy.span(), 4, "tombstones are not copied");
        assert_eq!(keys_of(&copy), vec![1, 2, 3, 5]);

        table.remove(&1);
        assert!(copy.contains(&1), "copy unaffected by the original");
    }

    /// Invariant: with every hash colliding, probes still resolve by key
    /// equality through insert, lookup, removal, and compaction.
    #[test]
    fn colliding_hashes_resolve_by_equality() {
        let mut table = OrderedTable::with_hasher(ConstBuildHasher);
        for k in 0..32 {
            table.insert(k, k * 2);
        }
        assert_eq!(table.len(), 32);
        for k in 0..32 {
            assert_eq!(table.get(&k), Some(&(k * 2)));
        }
        for k in 0..24 {
            assert_eq!(table.remove(&k), Some((k, k * 2)));
        }
        table.shrink_if_needed(8);
        assert_eq!(table.span(), 8);
        for k in 24..32 {
            assert!(table.contains(&k));
        }
        assert!(!table.contains(&5));
    }

    mod stored_hash {
        use super::*;
        use std::rc::Rc;

        /// Key that counts how many times it is hashed.
        #[derive(Clone)]
        struct CountingKey {
            id: u32,
            hashes: Rc<Cell<usize>>,
        }

        impl PartialEq for CountingKey {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl Eq for CountingKey {}

        impl Hash for CountingKey {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.hashes.set(self.hashes.get() + 1);
                self.id.hash(state);
            }
        }

        impl CanonicalKey for CountingKey {}

        /// Invariant: each key is hashed exactly once per probing call;
        /// index growth and compaction reuse stored hashes.
        #[test]
        fn growth_and_compaction_reuse_stored_hashes() {
            let hashes = Rc::new(Cell::new(0));
            let key = |id| CountingKey {
                id,
                hashes: Rc::clone(&hashes),
            };

            let mut table = OrderedTable::new();
            for id in 0..64 {
                table.insert(key(id), ());
            }
            // 64 inserts, one hash each, despite index growth in between.
            assert_eq!(hashes.get(), 64);

            for id in 0..60 {
                table.remove(&key(id));
            }
            assert_eq!(hashes.get(), 124, "one hash per removal probe");

            table.shrink_if_needed(4);
            assert_eq!(table.span(), 4);
            assert_eq!(hashes.get(), 124, "compaction does not hash keys");

            assert!(table.contains(&key(63)));
            assert_eq!(hashes.get(), 125);
        }
    }

    #[cfg(debug_assertions)]
    mod reentry {
        use super::*;
        use std::rc::Rc;

        /// Key whose equality re-enters the table that is probing it.
        #[derive(Clone)]
        struct EvilKey {
            id: u32,
            hook: Rc<Cell<*const OrderedTable<EvilKey, (), ConstBuildHasher>>>,
        }

        impl EvilKey {
            fn inert(id: u32) -> Self {
                EvilKey {
                    id,
                    hook: Rc::new(Cell::new(core::ptr::null())),
                }
            }
        }

        impl PartialEq for EvilKey {
            fn eq(&self, other: &Self) -> bool {
                let hook = if self.hook.get().is_null() {
                    other.hook.get()
                } else {
                    self.hook.get()
                };
                if !hook.is_null() {
                    let table = unsafe { &*hook };
                    table.contains(&EvilKey::inert(u32::MAX));
                }
                self.id == other.id
            }
        }

        impl Eq for EvilKey {}

        impl Hash for EvilKey {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }

        impl CanonicalKey for EvilKey {}

        /// Invariant: user equality code calling back into the probing
        /// table trips the debug check instead of corrupting the probe.
        #[test]
        #[should_panic(expected = "re-entered during a probe")]
        fn reentrant_eq_is_detected() {
            let hook = Rc::new(Cell::new(core::ptr::null()));
            let mut table = OrderedTable::with_hasher(ConstBuildHasher);
            table.insert(
                EvilKey {
                    id: 1,
                    hook: Rc::clone(&hook),
                },
                (),
            );
            hook.set(&table as *const _);
            // Probing id 1 runs the stored key's eq, which re-enters.
            table.contains(&EvilKey::inert(1));
        }
    }
}
