//! Runtime value representation.
//!
//! Two interchangeable forms sit behind one API: a tagged union (default) and
//! a NaN-boxed 64-bit word (`--features nanbox`). The rest of the runtime
//! only uses the shared constructors, predicates and accessors, so the two
//! are observationally identical — including the equality law: numbers
//! compare numerically (NaN is never equal to itself), everything else by
//! identity, which for interned strings is content equality.

#[cfg(not(feature = "nanbox"))]
mod tagged;
#[cfg(not(feature = "nanbox"))]
pub use tagged::Value;

#[cfg(feature = "nanbox")]
mod nanbox;
#[cfg(feature = "nanbox")]
pub use nanbox::Value;

impl Value {
    /// `nil` and `false` are falsey; every other value is truthy.
    pub fn is_falsey(self) -> bool {
        self.is_nil() || (self.is_bool() && !self.as_bool())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjRef;
    use proptest::prelude::*;

    #[test]
    fn predicates_partition_the_kinds() {
        let cases = [
            Value::nil(),
            Value::boolean(true),
            Value::boolean(false),
            Value::number(1.5),
            Value::number(0.0),
            Value::object(ObjRef(7)),
        ];
        for value in cases {
            let kinds = [
                value.is_nil(),
                value.is_bool(),
                value.is_number(),
                value.is_object(),
            ];
            assert_eq!(kinds.iter().filter(|&&k| k).count(), 1, "{value:?}");
        }
    }

    #[test]
    fn equality_law() {
        assert_eq!(Value::nil(), Value::nil());
        assert_eq!(Value::boolean(true), Value::boolean(true));
        assert_ne!(Value::boolean(true), Value::boolean(false));
        assert_eq!(Value::number(2.0), Value::number(2.0));
        assert_ne!(Value::number(2.0), Value::number(3.0));
        assert_eq!(Value::object(ObjRef(4)), Value::object(ObjRef(4)));
        assert_ne!(Value::object(ObjRef(4)), Value::object(ObjRef(5)));
        // Across kinds, never equal.
        assert_ne!(Value::nil(), Value::boolean(false));
        assert_ne!(Value::number(0.0), Value::boolean(false));
    }

    #[test]
    fn nan_is_not_equal_to_itself() {
        let nan = Value::number(f64::NAN);
        assert!(nan.is_number());
        assert_ne!(nan, nan);
    }

    #[test]
    fn negative_zero_equals_zero() {
        assert_eq!(Value::number(0.0), Value::number(-0.0));
    }

    #[test]
    fn falsiness() {
        assert!(Value::nil().is_falsey());
        assert!(Value::boolean(false).is_falsey());
        assert!(!Value::boolean(true).is_falsey());
        assert!(!Value::number(0.0).is_falsey());
        assert!(!Value::object(ObjRef(0)).is_falsey());
    }

    #[test]
    fn infinities_are_numbers() {
        assert!(Value::number(f64::INFINITY).is_number());
        assert!(Value::number(f64::NEG_INFINITY).is_number());
        assert_eq!(
            Value::number(f64::INFINITY).as_number(),
            f64::INFINITY
        );
    }

    proptest! {
        #[test]
        fn finite_numbers_round_trip(
            n in proptest::num::f64::POSITIVE
                | proptest::num::f64::NEGATIVE
                | proptest::num::f64::NORMAL
                | proptest::num::f64::SUBNORMAL
                | proptest::num::f64::ZERO,
        ) {
            let value = Value::number(n);
            prop_assert!(value.is_number());
            prop_assert_eq!(value.as_number().to_bits(), n.to_bits());
        }

        #[test]
        fn object_handles_round_trip(index in 0u32..=u32::MAX) {
            let value = Value::object(ObjRef(index));
            prop_assert!(value.is_object());
            prop_assert_eq!(value.as_object(), ObjRef(index));
        }
    }
}
