//! Key canonicalization: the narrow seam between the engine and its key types.
//!
//! Tables never store or probe a raw key directly; they ask the key for its
//! canonical form first. For most types canonicalization is the identity and
//! costs nothing. Numeric keys use it to collapse representations that must
//! compare equal as set members: negative zero folds into positive zero, and
//! every NaN bit pattern folds into the canonical NaN.

use core::fmt;
use core::hash::{Hash, Hasher};

/// A key the engine can store: equality, hashing, and a canonicalization
/// hook.
///
/// `canonical` returns `Some(form)` only when `self` is not already in
/// canonical form, so lookups with canonical keys never clone. `Eq` and
/// `Hash` are consulted only on canonical forms.
pub trait CanonicalKey: Eq + Hash + Clone {
    /// The canonical form of this key, or `None` when it already is one.
    fn canonical(&self) -> Option<Self> {
        None
    }
}

macro_rules! identity_keys {
    ($($t:ty),* $(,)?) => {
        $(impl CanonicalKey for $t {})*
    };
}

identity_keys!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool, char, String,
    &'static str,
);

/// An `f64` set member with total, bit-level identity.
///
/// Raw bit patterns are distinct keys until canonicalized; the engine
/// canonicalizes at every table entry point, which gives the usual
/// same-value-zero behavior: `-0.0` and `+0.0` are one member, and so are
/// all NaNs.
#[derive(Copy, Clone)]
pub struct Number(pub f64);

impl Number {
    /// The underlying float.
    pub fn get(self) -> f64 {
        self.0
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Number {}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Debug for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl From<f64> for Number {
    fn from(raw: f64) -> Self {
        Number(raw)
    }
}

impl CanonicalKey for Number {
    fn canonical(&self) -> Option<Self> {
        if self.0 == 0.0 && self.0.is_sign_negative() {
            return Some(Number(0.0));
        }
        if self.0.is_nan() && self.0.to_bits() != f64::NAN.to_bits() {
            return Some(Number(f64::NAN));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: identity keys report themselves as already canonical.
    #[test]
    fn primitive_keys_are_canonical() {
        assert!(42i32.canonical().is_none());
        assert!("abc".to_string().canonical().is_none());
        assert!(true.canonical().is_none());
    }

    /// Invariant: negative zero canonicalizes to positive zero; positive zero
    /// is already canonical.
    #[test]
    fn negative_zero_folds_to_positive_zero() {
        let minus = Number(-0.0);
        let plus = Number(0.0);
        assert_ne!(minus, plus, "raw bit patterns differ");

        let folded = minus.canonical().expect("negative zero is not canonical");
        assert_eq!(folded, plus);
        assert!(folded.get().is_sign_positive());
        assert!(plus.canonical().is_none());
    }

    /// Invariant: every NaN bit pattern folds into the canonical NaN, so two
    /// distinct NaNs become one key after canonicalization.
    #[test]
    fn nan_payloads_fold_together() {
        let canonical = Number(f64::NAN);
        let payload = Number(f64::from_bits(f64::NAN.to_bits() | 1));
        assert_ne!(canonical, payload);

        let folded = payload.canonical().expect("payload NaN is not canonical");
        assert_eq!(folded, canonical);
        assert!(canonical.canonical().is_none());
    }

    /// Invariant: ordinary finite values are canonical and keep bit identity.
    #[test]
    fn finite_values_are_canonical() {
        for raw in [1.5, -7.25, f64::INFINITY, f64::NEG_INFINITY, 0.0] {
            assert!(Number(raw).canonical().is_none(), "{raw} should be canonical");
        }
    }
}
