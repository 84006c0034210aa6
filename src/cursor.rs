//! Mutation-tolerant iteration over shared tables.
//!
//! A cursor does not borrow the table; it holds a shared handle and a slot
//! position, and re-borrows for each step. Between steps the table is free
//! to mutate. The slot discipline makes that safe to resume from:
//!
//! - inserts only append, so the position stays meaningful and new entries
//!   become visible;
//! - deletes only tombstone, which the cursor skips;
//! - compaction and clear rewrite positions, and the table rebases every
//!   registered cursor cell to the equivalent new position.
//!
//! A cursor that has reported exhaustion stays exhausted, even if entries
//! are appended afterwards.

use core::cell::{Cell, RefCell};
use std::collections::hash_map::RandomState;
use std::rc::Rc;

use slotmap::DefaultKey;

use crate::table::OrderedTable;

/// Iterator over live keys in insertion order that stays valid while the
/// table is mutated between steps.
///
/// Every live key present when the cursor passes its slot is yielded exactly
/// once. Keys deleted before the cursor reaches them are not yielded; keys
/// appended before exhaustion are.
pub struct Cursor<K, V, S = RandomState> {
    table: Rc<RefCell<OrderedTable<K, V, S>>>,
    pos: Rc<Cell<usize>>,
    registration: DefaultKey,
    done: bool,
}

impl<K, V, S> Cursor<K, V, S> {
    pub(crate) fn over(table: Rc<RefCell<OrderedTable<K, V, S>>>) -> Self {
        let pos = Rc::new(Cell::new(0));
        let registration = table.borrow_mut().register_cursor(&pos);
        Self {
            table,
            pos,
            registration,
            done: false,
        }
    }
}

impl<K, V, S> Iterator for Cursor<K, V, S>
where
    K: Clone,
{
    type Item = K;

    fn next(&mut self) -> Option<K> {
        if self.done {
            return None;
        }
        let table = self.table.borrow();
        loop {
            let at = self.pos.get();
            if at >= table.span() {
                self.done = true;
                return None;
            }
            self.pos.set(at + 1);
            if let Some(key) = table.key_at(at) {
                return Some(key.clone());
            }
        }
    }
}

impl<K, V, S> Drop for Cursor<K, V, S> {
    fn drop(&mut self) {
        if let Ok(mut table) = self.table.try_borrow_mut() {
            table.deregister_cursor(self.registration);
        }
        // If the table is borrowed right now, the registry keeps a dead weak
        // entry; the next rebase prunes it.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(keys: &[i32]) -> Rc<RefCell<OrderedTable<i32, ()>>> {
        let mut table = OrderedTable::new();
        for &k in keys {
            table.insert(k, ());
        }
        Rc::new(RefCell::new(table))
    }

    /// Invariant: a cursor yields live keys in insertion order and then
    /// reports exhaustion.
    #[test]
    fn yields_in_insertion_order() {
        let table = shared(&[5, 3, 8]);
        let mut cursor = Cursor::over(Rc::clone(&table));
        assert_eq!(cursor.next(), Some(5));
        assert_eq!(cursor.next(), Some(3));
        assert_eq!(cursor.next(), Some(8));
        assert_eq!(cursor.next(), None);
    }

    /// Invariant: keys appended mid-iteration are visible; once the cursor
    /// reports exhaustion it stays exhausted.
    #[test]
    fn appends_are_visible_until_exhaustion() {
        let table = shared(&[1, 2]);
        let mut cursor = Cursor::over(Rc::clone(&table));
        assert_eq!(cursor.next(), Some(1));
        assert_eq!(cursor.next(), Some(2));

        table.borrow_mut().insert(3, ());
        assert_eq!(cursor.next(), Some(3), "append before exhaustion is seen");
        assert_eq!(cursor.next(), None);

        table.borrow_mut().insert(4, ());
        assert_eq!(cursor.next(), None, "exhaustion latches");
    }

    /// Invariant: deleting a key the cursor has not reached skips it;
    /// deleting an already-yielded key changes nothing.
    #[test]
    fn deletions_ahead_are_skipped() {
        let table = shared(&[1, 2, 3]);
        let mut cursor = Cursor::over(Rc::clone(&table));
        assert_eq!(cursor.next(), Some(1));
        {
            let mut t = table.borrow_mut();
            t.remove(&1);
            t.remove(&2);
        }
        assert_eq!(cursor.next(), Some(3));
        assert_eq!(cursor.next(), None);
    }

    /// Invariant: compaction mid-iteration rebases the cursor so remaining
    /// live keys are yielded exactly once, in order, with no revisits.
    #[test]
    fn survives_compaction() {
        let table = shared(&[0, 1, 2, 3, 4, 5, 6, 7]);
        let mut cursor = Cursor::over(Rc::clone(&table));
        assert_eq!(cursor.next(), Some(0));
        assert_eq!(cursor.next(), Some(1));
        assert_eq!(cursor.next(), Some(2));
        {
            let mut t = table.borrow_mut();
            for k in [0, 1, 4, 5, 6] {
                t.remove(&k);
            }
            let live = t.len();
            assert_eq!(live, 3);
            t.shrink_if_needed(live);
            assert_eq!(t.span(), 3, "compacted under the cursor");
        }
        assert_eq!(cursor.next(), Some(3));
        assert_eq!(cursor.next(), Some(7));
        assert_eq!(cursor.next(), None);
    }

    /// Invariant: clearing rebases an unexhausted cursor to the front, so it
    /// observes keys added after the clear.
    #[test]
    fn clear_rebases_to_front() {
        let table = shared(&[1, 2, 3]);
        let mut cursor = Cursor::over(Rc::clone(&table));
        assert_eq!(cursor.next(), Some(1));

        table.borrow_mut().clear();
        {
            let mut t = table.borrow_mut();
            t.insert(9, ());
            t.insert(10, ());
        }
        assert_eq!(cursor.next(), Some(9));
        assert_eq!(cursor.next(), Some(10));
        assert_eq!(cursor.next(), None);
    }

    /// Invariant: cursors are independent; dropping one leaves the rest and
    /// later compactions undisturbed.
    #[test]
    fn cursors_are_independent() {
        let table = shared(&[1, 2, 3, 4]);
        let mut first = Cursor::over(Rc::clone(&table));
        let mut second = Cursor::over(Rc::clone(&table));
        assert_eq!(first.next(), Some(1));
        assert_eq!(first.next(), Some(2));
        assert_eq!(second.next(), Some(1));
        drop(first);

        {
            let mut t = table.borrow_mut();
            t.remove(&1);
            t.remove(&3);
            t.remove(&4);
            t.shrink_if_needed(1);
        }
        assert_eq!(second.next(), Some(2));
        assert_eq!(second.next(), None);
    }
}
