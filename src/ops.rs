//! The set algebra: seven operations over a native receiver and a
//! duck-typed operand.
//!
//! Every operation has the same dispatch shape:
//! 1. acquire the operand's [`SetRecord`], which validates the declared
//!    size;
//! 2. if the operand is native, walk its table directly through a
//!    [`NativeView`], interleaving no user code;
//! 3. otherwise drive `has`/`keys`, which may run arbitrary code, including
//!    mutation of the receiver mid-operation.
//!
//! The two paths are observably equivalent for native operands; the fast
//! path just skips the capability indirection.
//!
//! Set-building operations accumulate into a private table (a structural
//! copy of the receiver, or a fresh one) and wrap it in a handle only when
//! finished. An operand capability that panics therefore leaves the
//! receiver exactly as it was and the partial result unreachable. Each one
//! tracks its live count through every insert and delete and ends with a
//! single [`shrink_if_needed`] call on that count; only the deleting
//! operations can actually leave tombstones for it to reclaim.
//!
//! The declared size never bounds a loop and never becomes a result
//! cardinality. It picks which side to walk, and it drives the subset and
//! superset early exits, where trusting it is part of the contract.
//!
//! [`NativeView`]: crate::protocol::NativeView
//! [`shrink_if_needed`]: crate::table::OrderedTable::shrink_if_needed

use core::hash::BuildHasher;

use crate::key::CanonicalKey;
use crate::protocol::{NotSetLike, SetLike, SetRecord};
use crate::set::OrderedSet;
use crate::table::OrderedTable;

impl<K, S> OrderedSet<K, S>
where
    K: CanonicalKey,
    S: BuildHasher + Clone,
{
    /// Members of `self`, then keys of `other` that were absent, in
    /// first-seen order.
    pub fn union(&self, other: &dyn SetLike<K>) -> Result<Self, NotSetLike> {
        let record = SetRecord::acquire(other)?;
        if let Some(view) = record.native() {
            let mut result = self.table().borrow().clone();
            let mut count = result.len();
            for at in 0..view.span() {
                if let Some(key) = view.key_at(at) {
                    if result.insert(key.clone(), ()).is_none() {
                        count += 1;
                    }
                }
            }
            result.shrink_if_needed(count);
            return Ok(Self::from_table(result));
        }
        // The keys iterator is obtained before the receiver is copied, so a
        // `keys` implementation that mutates the receiver runs against the
        // copy already taken.
        let keys = record.keys();
        let mut result = self.table().borrow().clone();
        let mut count = result.len();
        for key in keys {
            if result.insert(key, ()).is_none() {
                count += 1;
            }
        }
        result.shrink_if_needed(count);
        Ok(Self::from_table(result))
    }

    /// Members common to `self` and `other`.
    ///
    /// The smaller side is walked, so the result order follows `self` when
    /// `self` is smaller and the operand's first-seen order otherwise.
    pub fn intersection(&self, other: &dyn SetLike<K>) -> Result<Self, NotSetLike> {
        let record = SetRecord::acquire(other)?;
        let mut result = OrderedTable::with_hasher(self.table().borrow().hasher().clone());
        let mut count = 0;
        if let Some(view) = record.native() {
            let table = self.table().borrow();
            if table.len() <= view.len() {
                for at in 0..table.span() {
                    if let Some(key) = table.key_at(at) {
                        if view.contains(key) && result.insert(key.clone(), ()).is_none() {
                            count += 1;
                        }
                    }
                }
            } else {
                for at in 0..view.span() {
                    if let Some(key) = view.key_at(at) {
                        if table.contains(key) && result.insert(key.clone(), ()).is_none() {
                            count += 1;
                        }
                    }
                }
            }
            result.shrink_if_needed(count);
            return Ok(Self::from_table(result));
        }
        if (self.len() as f64) <= record.size() {
            // `has` may grow the receiver under the cursor; appended members
            // are still visited and tested.
            for key in self.cursor() {
                if record.has(&key) && result.insert(key, ()).is_none() {
                    count += 1;
                }
            }
        } else {
            // Operand keys may repeat; the table insert deduplicates.
            for key in record.keys() {
                if self.contains(&key) && result.insert(key, ()).is_none() {
                    count += 1;
                }
            }
        }
        result.shrink_if_needed(count);
        Ok(Self::from_table(result))
    }

    /// Members of `self` not in `other`, in `self`'s order.
    pub fn difference(&self, other: &dyn SetLike<K>) -> Result<Self, NotSetLike> {
        let record = SetRecord::acquire(other)?;
        if let Some(view) = record.native() {
            let mut result = self.table().borrow().clone();
            let mut count = result.len();
            if count <= view.len() {
                for at in 0..result.span() {
                    let key = match result.key_at(at) {
                        Some(key) => key.clone(),
                        None => continue,
                    };
                    if view.contains(&key) {
                        result.remove(&key).expect("walked key is live in the result");
                        count -= 1;
                    }
                }
            } else {
                for at in 0..view.span() {
                    if let Some(key) = view.key_at(at) {
                        if result.remove(key).is_some() {
                            count -= 1;
                        }
                    }
                }
            }
            result.shrink_if_needed(count);
            return Ok(Self::from_table(result));
        }
        let mut result = self.table().borrow().clone();
        let mut count = result.len();
        if (count as f64) <= record.size() {
            // Walk the private copy and probe the operand per member. The
            // copy is unreachable from user code, so a member observed here
            // is still present when deleted below.
            for at in 0..result.span() {
                let key = match result.key_at(at) {
                    Some(key) => key.clone(),
                    None => continue,
                };
                if record.has(&key) {
                    result.remove(&key).expect("walked key is live in the result");
                    count -= 1;
                }
            }
        } else {
            for key in record.keys() {
                if result.remove(&key).is_some() {
                    count -= 1;
                }
            }
        }
        result.shrink_if_needed(count);
        Ok(Self::from_table(result))
    }

    /// Members in exactly one of the two sides: operand keys found in
    /// `self` leave the result, keys found in neither side join it, at the
    /// back. A repeated operand key settles on its first outcome instead of
    /// toggling.
    pub fn symmetric_difference(&self, other: &dyn SetLike<K>) -> Result<Self, NotSetLike> {
        let record = SetRecord::acquire(other)?;
        if let Some(view) = record.native() {
            let table = self.table().borrow();
            let mut result = table.clone();
            let mut count = result.len();
            for at in 0..view.span() {
                if let Some(key) = view.key_at(at) {
                    if table.contains(key) {
                        if result.remove(key).is_some() {
                            count -= 1;
                        }
                    } else if result.insert(key.clone(), ()).is_none() {
                        count += 1;
                    }
                }
            }
            result.shrink_if_needed(count);
            return Ok(Self::from_table(result));
        }
        let keys = record.keys();
        let mut result = self.table().borrow().clone();
        let mut count = result.len();
        for key in keys {
            // Both membership checks happen before either mutation, and
            // against the live receiver, not its start-of-op snapshot.
            let in_result = result.contains(&key);
            if self.contains(&key) {
                if in_result {
                    result.remove(&key).expect("key is live in the result");
                    count -= 1;
                }
            } else if !in_result {
                result.insert(key, ());
                count += 1;
            }
        }
        result.shrink_if_needed(count);
        Ok(Self::from_table(result))
    }

    /// True when every member of `self` is in `other`.
    ///
    /// Trusts the declared size for the pigeonhole exit: a receiver larger
    /// than the declared size is not a subset and no membership calls are
    /// made. Otherwise the answer comes from per-member `has` calls, bounded
    /// by the receiver walk, never by the declared size.
    pub fn is_subset_of(&self, other: &dyn SetLike<K>) -> Result<bool, NotSetLike> {
        let record = SetRecord::acquire(other)?;
        if self.len() as f64 > record.size() {
            return Ok(false);
        }
        if let Some(view) = record.native() {
            let table = self.table().borrow();
            for at in 0..table.span() {
                if let Some(key) = table.key_at(at) {
                    if !view.contains(key) {
                        return Ok(false);
                    }
                }
            }
            return Ok(true);
        }
        for key in self.cursor() {
            if !record.has(&key) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// True when every key of `other` is in `self`. Drains the operand's
    /// keys; never calls its `has`. A declared size larger than `self` is a
    /// trusted early `false`.
    pub fn is_superset_of(&self, other: &dyn SetLike<K>) -> Result<bool, NotSetLike> {
        let record = SetRecord::acquire(other)?;
        if (self.len() as f64) < record.size() {
            return Ok(false);
        }
        if let Some(view) = record.native() {
            let table = self.table().borrow();
            for at in 0..view.span() {
                if let Some(key) = view.key_at(at) {
                    if !table.contains(key) {
                        return Ok(false);
                    }
                }
            }
            return Ok(true);
        }
        for key in record.keys() {
            if !self.contains(&key) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// True when `self` and `other` share no member. The smaller side is
    /// walked: per declared size for protocol operands, per live count for
    /// native ones.
    pub fn is_disjoint_from(&self, other: &dyn SetLike<K>) -> Result<bool, NotSetLike> {
        let record = SetRecord::acquire(other)?;
        if let Some(view) = record.native() {
            let table = self.table().borrow();
            if table.len() <= view.len() {
                for at in 0..table.span() {
                    if let Some(key) = table.key_at(at) {
                        if view.contains(key) {
                            return Ok(false);
                        }
                    }
                }
            } else {
                for at in 0..view.span() {
                    if let Some(key) = view.key_at(at) {
                        if table.contains(key) {
                            return Ok(false);
                        }
                    }
                }
            }
            return Ok(true);
        }
        if (self.len() as f64) <= record.size() {
            for key in self.cursor() {
                if record.has(&key) {
                    return Ok(false);
                }
            }
        } else {
            for key in record.keys() {
                if self.contains(&key) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}
