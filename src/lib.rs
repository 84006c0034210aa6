//! ordset: single-threaded, insertion-ordered sets and maps whose set
//! algebra accepts duck-typed operands and stays correct when operand
//! callbacks mutate the receiver mid-operation.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build the containers and their algebra in safe, verifiable
//!   layers so each piece can be reasoned about independently.
//! - Layers:
//!   - OrderedTable<K, V, S>: insertion-ordered storage. A slot arena
//!     (appends only, deletes tombstone) plus a hash index over slot
//!     positions; each entry stores its `u64` hash. Compaction is
//!     deferred and rebases registered cursors. Includes a debug-only
//!     reentrancy check around probes.
//!   - Cursor<K, V, S>: iteration as a position into the arena behind a
//!     shared handle; re-borrows per step, so the table may mutate
//!     between steps.
//!   - OrderedSet / OrderedMap: shared-handle containers over an
//!     `Rc<RefCell<OrderedTable>>`, giving clones object identity.
//!   - protocol + ops: `SetRecord` resolves an operand's `size`/`has`/
//!     `keys` capabilities once; seven algebra operations then run a
//!     direct-table fast path for native operands or drive the
//!     capabilities for everything else, with observably equivalent
//!     results.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` by design (no atomics).
//! - Iteration order is insertion order; a delete leaves later elements'
//!   slots untouched, and a re-add goes to the back.
//! - Cursors survive arbitrary interleaved mutation: appends become
//!   visible, deletes are skipped, compaction and clear rebase, and
//!   exhaustion latches.
//! - The declared size of an operand is validated once, then used only
//!   to pick sides and drive the standardized subset/superset early
//!   exits; it never bounds a loop or sizes a result.
//! - Keys canonicalize on entry (`CanonicalKey`): negative zero and NaN
//!   payloads collapse to one member.
//!
//! Why this split?
//! - Localize invariants: the arena/index discipline lives entirely in
//!   OrderedTable; cursor rebasing is a two-party contract between table
//!   and cursor; the algebra never touches slots directly except through
//!   a read-only view.
//! - No unsafe anywhere: shared mutation goes through `Rc<RefCell<..>>`,
//!   and cursor positions are plain `Cell<usize>` cells the table can
//!   rebase.
//! - Clear failure boundaries: set-building operations accumulate into a
//!   private table and attach it to a handle only when complete, so a
//!   panicking operand capability leaves the receiver unchanged.
//!
//! Reentrancy policy and interior mutability
//! - OrderedTable guards its probing methods with a debug-only check;
//!   only `K: Eq/Hash` user code runs inside a probe, and it must not
//!   call back into the same table.
//! - Everything else is reentrancy-tolerant by construction: operand
//!   `has`/`keys` implementations may insert into, delete from, or clear
//!   the receiver between cursor steps, and each algebra operation's
//!   result is built where user code cannot reach it.
//! - `RefCell` enforces the remaining discipline at runtime: no user
//!   callback runs while a table borrow is held.
//!
//! Hasher and rehashing invariants
//! - Each entry stores a precomputed `u64` hash and the index always
//!   uses stored hashes; `K: Hash` is never invoked after insertion.
//!   Index growth and compaction rebuild from stored hashes without
//!   calling into user code.
//!
//! Notes and non-goals
//! - Still single-threaded; `Rc` handles keep the containers `!Send`.
//! - The algebra's receiver is always a native set; maps participate as
//!   operands (the set of their keys), as does any `SetLike` type.
//! - No frozen/immutable table variant.
//! - Public surface is the containers, the cursor, the capability
//!   protocol, and the key traits; `OrderedTable` is exposed for direct
//!   single-owner use but the algebra is defined on `OrderedSet`.

pub mod cursor;
pub mod key;
pub mod map;
mod ops;
pub mod protocol;
mod reentrancy;
pub mod set;
pub mod table;

mod table_proptest;

// Public surface
pub use cursor::Cursor;
pub use key::{CanonicalKey, Number};
pub use map::OrderedMap;
pub use protocol::{fast_path_eligible, NativeView, NotSetLike, SetLike, SetRecord};
pub use set::OrderedSet;
pub use table::OrderedTable;
