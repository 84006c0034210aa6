//! Duck-typed capability protocol for set-like operands.
//!
//! The set algebra accepts any operand exposing three capabilities: a
//! declared `size`, a membership test `has`, and a key iterator `keys`.
//! Capabilities are resolved once per operation into a [`SetRecord`];
//! afterwards the operand's methods are looked up through the record, so an
//! operand cannot swap behavior mid-operation.
//!
//! The declared size is validated on acquisition and then trusted only as a
//! heuristic: it picks which side to walk and enables early exits that are
//! correct even when the size lies. Result cardinality always comes from
//! what `keys` and `has` actually report.

use core::cell::Ref;
use core::fmt;
use std::error::Error;

use crate::table::KeySlots;

/// Minimal capability surface of a set-algebra operand.
///
/// Implementations may run arbitrary code in `has` and in the iterator
/// returned by `keys`, including code that mutates the receiver of the
/// operation in progress; the algebra is written to stay correct under
/// that.
pub trait SetLike<K> {
    /// Declared cardinality. Read exactly once per operation and validated:
    /// NaN and negative values are rejected, `+inf` is accepted. It may
    /// disagree with what `keys` yields.
    fn size(&self) -> f64;

    /// Membership test for `key`.
    fn has(&self, key: &K) -> bool;

    /// Fresh iterator over the operand's keys. Duplicates are allowed; the
    /// algebra deduplicates.
    fn keys(&self) -> Box<dyn Iterator<Item = K> + '_>;

    /// Direct view of a native container's table, or `None` to force the
    /// capability path. Only this crate can construct a [`NativeView`], so
    /// external operands always answer through `size`/`has`/`keys`.
    fn as_native(&self) -> Option<NativeView<'_, K>> {
        None
    }
}

/// Operand rejected during capability acquisition: its declared size is not
/// a non-negative number.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NotSetLike {
    /// `size()` returned NaN.
    NanSize,
    /// `size()` returned a negative number.
    NegativeSize,
}

impl fmt::Display for NotSetLike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotSetLike::NanSize => f.write_str("operand is not set-like: declared size is NaN"),
            NotSetLike::NegativeSize => {
                f.write_str("operand is not set-like: declared size is negative")
            }
        }
    }
}

impl Error for NotSetLike {}

/// Capabilities of one operand, resolved once at the start of an operation.
pub struct SetRecord<'a, K> {
    source: &'a dyn SetLike<K>,
    size: f64,
}

impl<'a, K> SetRecord<'a, K> {
    /// Resolves `source`'s capabilities, reading and validating its declared
    /// size exactly once. No other operand code runs here.
    pub fn acquire(source: &'a dyn SetLike<K>) -> Result<Self, NotSetLike> {
        let size = source.size();
        if size.is_nan() {
            return Err(NotSetLike::NanSize);
        }
        if size < 0.0 {
            return Err(NotSetLike::NegativeSize);
        }
        Ok(SetRecord { source, size })
    }

    /// The size captured at acquisition. A heuristic: never bounds a loop,
    /// never becomes a result cardinality.
    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn has(&self, key: &K) -> bool {
        self.source.has(key)
    }

    pub fn keys(&self) -> Box<dyn Iterator<Item = K> + 'a> {
        self.source.keys()
    }

    /// Re-queries fast-path eligibility at dispatch time.
    pub fn native(&self) -> Option<NativeView<'a, K>> {
        self.source.as_native()
    }
}

/// Read-only view of a native container's internal table.
///
/// Holding the view keeps the container borrowed, so no user code can shift
/// the storage under a fast path that walks it.
pub struct NativeView<'a, K> {
    table: Ref<'a, dyn KeySlots<K> + 'a>,
}

impl<'a, K> NativeView<'a, K> {
    pub(crate) fn over(table: Ref<'a, dyn KeySlots<K> + 'a>) -> Self {
        NativeView { table }
    }

    /// Live element count.
    pub fn len(&self) -> usize {
        self.table.live_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slot arena length; walking `0..span()` with [`key_at`] visits every
    /// live element in insertion order.
    ///
    /// [`key_at`]: NativeView::key_at
    pub fn span(&self) -> usize {
        self.table.slot_span()
    }

    /// Key at slot `at`, or `None` for tombstones.
    pub fn key_at(&self, at: usize) -> Option<&K> {
        self.table.slot_key(at)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.table.contains_key(key)
    }
}

/// True when `operand` is a native container whose capability methods are
/// the built-in ones, making direct table traversal observably equivalent
/// to the protocol path.
pub fn fast_path_eligible<K>(operand: &dyn SetLike<K>) -> bool {
    operand.as_native().is_some()
}
