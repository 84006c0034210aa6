#![cfg(test)]
//! Model-based tests for the table and its cursors.
//!
//! A random op stream runs against the real table and a reference model
//! (`HashMap` for membership and values, an ordered `Vec` for iteration
//! order). The model also predicts every cursor step exactly: removals
//! behind the cursor shift its index, appends land ahead of it, clear
//! rebases it to the front. Compaction needs no model adjustment at all,
//! which is precisely the property it must have.

use core::cell::RefCell;
use core::hash::{BuildHasher, Hasher};
use std::collections::HashMap;
use std::rc::Rc;

use proptest::prelude::*;

use crate::cursor::Cursor;
use crate::table::OrderedTable;

/// Forces every key into one index bucket.
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

#[derive(Clone, Debug)]
enum Op {
    Insert(u8),
    Remove(u8),
    Contains(u8),
    Shrink,
    Clear,
    NewCursor,
    CursorStep,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<u8>().prop_map(Op::Insert),
        3 => any::<u8>().prop_map(Op::Remove),
        2 => any::<u8>().prop_map(Op::Contains),
        1 => Just(Op::Shrink),
        1 => Just(Op::Clear),
        1 => Just(Op::NewCursor),
        4 => Just(Op::CursorStep),
    ]
}

/// Small pool so streams revisit keys, hit tombstones, and re-add.
fn key(raw: u8) -> i32 {
    (raw % 16) as i32
}

fn run<S: BuildHasher>(table: OrderedTable<i32, i32, S>, ops: Vec<Op>) {
    let table = Rc::new(RefCell::new(table));
    let mut values: HashMap<i32, i32> = HashMap::new();
    let mut order: Vec<i32> = Vec::new();

    let mut cursor: Option<Cursor<i32, i32, S>> = None;
    let mut cursor_ix = 0usize;
    let mut cursor_done = false;

    for (serial, op) in ops.into_iter().enumerate() {
        match op {
            Op::Insert(raw) => {
                let k = key(raw);
                let val = serial as i32;
                let got = table.borrow_mut().insert(k, val);
                let expected = values.insert(k, val);
                assert_eq!(got, expected, "insert result for {k}");
                if expected.is_none() {
                    order.push(k);
                }
            }
            Op::Remove(raw) => {
                let k = key(raw);
                let got = table.borrow_mut().remove(&k);
                let expected = values.remove(&k).map(|val| (k, val));
                assert_eq!(got, expected, "remove result for {k}");
                if got.is_some() {
                    let i = order.iter().position(|&o| o == k).unwrap();
                    order.remove(i);
                    if i < cursor_ix {
                        cursor_ix -= 1;
                    }
                }
            }
            Op::Contains(raw) => {
                let k = key(raw);
                assert_eq!(table.borrow().contains(&k), values.contains_key(&k));
            }
            Op::Shrink => {
                let mut t = table.borrow_mut();
                let live = t.len();
                t.shrink_if_needed(live);
                assert!(t.span() <= 2 * live.max(1), "shrink left tombstones dominating");
            }
            Op::Clear => {
                table.borrow_mut().clear();
                values.clear();
                order.clear();
                cursor_ix = 0;
            }
            Op::NewCursor => {
                cursor = Some(Cursor::over(Rc::clone(&table)));
                cursor_ix = 0;
                cursor_done = false;
            }
            Op::CursorStep => {
                if let Some(active) = cursor.as_mut() {
                    let got = active.next();
                    let expected = if cursor_done {
                        None
                    } else if cursor_ix < order.len() {
                        let k = order[cursor_ix];
                        cursor_ix += 1;
                        Some(k)
                    } else {
                        cursor_done = true;
                        None
                    };
                    assert_eq!(got, expected, "cursor step");
                }
            }
        }

        assert_eq!(table.borrow().len(), values.len());
    }

    let final_keys: Vec<i32> = table.borrow().iter().map(|(k, _)| *k).collect();
    assert_eq!(final_keys, order, "final iteration order");
    for k in 0..16 {
        assert_eq!(
            table.borrow().get(&k).copied(),
            values.get(&k).copied(),
            "final value for {k}"
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// Invariant: under a random op stream, the table agrees with the
    /// model on membership, values, iteration order, and every cursor
    /// step, through tombstones, compactions, and clears.
    #[test]
    fn table_matches_model(ops in proptest::collection::vec(arb_op(), 1..120)) {
        run(OrderedTable::new(), ops);
    }

    /// Invariant: the same holds when every hash collides, exercising the
    /// equality-resolution path of every probe.
    #[test]
    fn table_matches_model_under_collisions(ops in proptest::collection::vec(arb_op(), 1..120)) {
        run(OrderedTable::with_hasher(ConstBuildHasher), ops);
    }
}
