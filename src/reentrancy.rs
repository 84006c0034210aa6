//! Debug-only reentrancy detection for table probe sections.
//!
//! Probing runs user `Hash`/`Eq` code while the index is mid-update. If that
//! user code calls back into the same table, it observes a half-applied
//! mutation. Debug builds trip an explicit panic at the entry point instead
//! of letting the corruption propagate; release builds compile the check to
//! nothing.

use core::cell::Cell;
use core::marker::PhantomData;

/// Per-table flag; probe methods hold an [`EnterGuard`] for the duration of
/// their critical section.
#[derive(Debug)]
pub(crate) struct ReentryCheck {
    #[cfg(debug_assertions)]
    entered: Cell<bool>,
    // Tables are single-threaded; keep the marker !Send + !Sync so the flag
    // never needs atomics.
    _single_thread: PhantomData<*mut ()>,
}

impl ReentryCheck {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            entered: Cell::new(false),
            _single_thread: PhantomData,
        }
    }

    /// Marks the table as mid-probe until the returned guard drops.
    ///
    /// Panics in debug builds when the table is already mid-probe, which
    /// means user `Hash`/`Eq` code re-entered the table that invoked it.
    #[inline]
    pub(crate) fn enter(&self) -> EnterGuard<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.entered.replace(true),
                "table re-entered during a probe: user Hash/Eq must not call back into the table that invoked it"
            );
            return EnterGuard { check: self };
        }

        #[cfg(not(debug_assertions))]
        {
            return EnterGuard { _check: PhantomData };
        }
    }
}

impl Default for ReentryCheck {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII token for one probe section. Dropping it re-opens the table.
pub(crate) struct EnterGuard<'a> {
    #[cfg(debug_assertions)]
    check: &'a ReentryCheck,
    #[cfg(not(debug_assertions))]
    _check: PhantomData<&'a ReentryCheck>,
}

impl Drop for EnterGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.check.entered.set(false);
    }
}
