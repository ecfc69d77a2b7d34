//! Type transfer functions for number operations.
//!
//! The [`OperationTyper`] computes the type of an operation's result from
//! the types of its inputs. Representation selection uses it to refine
//! feedback types during RETYPE.

use super::types::{Type, TypeBits};

/// Range bounds a growing phi type is snapped to on weakening.
const WEAKEN_MIN_LIMITS: [f64; 22] = [
    0.0,
    -1073741824.0,
    -2147483648.0,
    -4294967296.0,
    -8589934592.0,
    -17179869184.0,
    -34359738368.0,
    -68719476736.0,
    -137438953472.0,
    -274877906944.0,
    -549755813888.0,
    -1099511627776.0,
    -2199023255552.0,
    -4398046511104.0,
    -8796093022208.0,
    -17592186044416.0,
    -35184372088832.0,
    -70368744177664.0,
    -140737488355328.0,
    -281474976710656.0,
    -562949953421312.0,
    -1125899906842624.0,
];

const WEAKEN_MAX_LIMITS: [f64; 22] = [
    0.0,
    1073741823.0,
    2147483647.0,
    4294967295.0,
    8589934591.0,
    17179869183.0,
    34359738367.0,
    68719476735.0,
    137438953471.0,
    274877906943.0,
    549755813887.0,
    1099511627775.0,
    2199023255551.0,
    4398046511103.0,
    8796093022207.0,
    17592186044415.0,
    35184372088831.0,
    70368744177663.0,
    140737488355327.0,
    281474976710655.0,
    562949953421311.0,
    1125899906842623.0,
];

/// Stateless collection of number type rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct OperationTyper;

impl OperationTyper {
    pub fn new() -> Self {
        OperationTyper
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    /// Type of `ToNumber(t)`.
    pub fn to_number(&self, t: Type) -> Type {
        if t.is(Type::NUMBER) {
            return t;
        }
        let mut result = Type::intersect(t, Type::NUMBER);
        if t.maybe(Type::BOOLEAN) {
            result = Type::union(result, Type::range(0.0, 1.0));
        }
        if t.maybe(Type::NULL) {
            result = Type::union(result, Type::SINGLETON_ZERO);
        }
        if t.maybe(Type::UNDEFINED) || t.maybe(Type::HOLE) {
            result = Type::union(result, Type::NAN);
        }
        if t.maybe(Type::STRING) || t.maybe(Type::RECEIVER) {
            result = Type::union(result, Type::NUMBER);
        }
        result
    }

    /// Number part of `t`, with `-0` replaced by `0`.
    fn plain_number_part(t: Type) -> Type {
        let mut part = Type::intersect(t, Type::PLAIN_NUMBER);
        if t.maybe(Type::MINUS_ZERO) {
            part = Type::union(part, Type::SINGLETON_ZERO);
        }
        part
    }

    fn finish(mut result: Type, maybe_nan: bool, maybe_minus_zero: bool) -> Type {
        if maybe_nan {
            result = Type::union(result, Type::NAN);
        }
        if maybe_minus_zero {
            result = Type::union(result, Type::MINUS_ZERO);
        }
        result
    }

    fn range_or_integer(min: f64, max: f64) -> (Type, bool) {
        if min.is_nan() || max.is_nan() {
            (Type::INTEGER, true)
        } else {
            (Type::range(min, max), false)
        }
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    pub fn number_add(&self, lhs: Type, rhs: Type) -> Type {
        if lhs.is_none() || rhs.is_none() {
            return Type::NONE;
        }
        let mut maybe_nan = lhs.maybe(Type::NAN) || rhs.maybe(Type::NAN);
        let maybe_minus_zero = lhs.maybe(Type::MINUS_ZERO) && rhs.maybe(Type::MINUS_ZERO);
        let l = Self::plain_number_part(lhs);
        let r = Self::plain_number_part(rhs);

        let mut result = Type::NONE;
        if !l.is_none() && !r.is_none() {
            if l.is(Type::INTEGER) && r.is(Type::INTEGER) {
                let (ty, nan) = Self::range_or_integer(l.min() + r.min(), l.max() + r.max());
                result = ty;
                maybe_nan |= nan;
            } else {
                // Infinity plus negative infinity.
                maybe_nan |= l.maybe(Type::from_bits(TypeBits::OTHER_NUMBER))
                    && r.maybe(Type::from_bits(TypeBits::OTHER_NUMBER));
                result = Type::PLAIN_NUMBER;
            }
        }
        Self::finish(result, maybe_nan, maybe_minus_zero)
    }

    pub fn number_subtract(&self, lhs: Type, rhs: Type) -> Type {
        if lhs.is_none() || rhs.is_none() {
            return Type::NONE;
        }
        let mut maybe_nan = lhs.maybe(Type::NAN) || rhs.maybe(Type::NAN);
        let maybe_minus_zero = lhs.maybe(Type::MINUS_ZERO) && rhs.maybe(Type::SINGLETON_ZERO);
        let l = Self::plain_number_part(lhs);
        let r = Self::plain_number_part(rhs);

        let mut result = Type::NONE;
        if !l.is_none() && !r.is_none() {
            if l.is(Type::INTEGER) && r.is(Type::INTEGER) {
                let (ty, nan) = Self::range_or_integer(l.min() - r.max(), l.max() - r.min());
                result = ty;
                maybe_nan |= nan;
            } else {
                maybe_nan |= !l.is(Type::INTEGER) && !r.is(Type::INTEGER);
                result = Type::PLAIN_NUMBER;
            }
        }
        Self::finish(result, maybe_nan, maybe_minus_zero)
    }

    pub fn number_multiply(&self, lhs: Type, rhs: Type) -> Type {
        if lhs.is_none() || rhs.is_none() {
            return Type::NONE;
        }
        let mut maybe_nan = lhs.maybe(Type::NAN) || rhs.maybe(Type::NAN);
        let l = Self::plain_number_part(lhs);
        let r = Self::plain_number_part(rhs);
        let lhs_zero = lhs.maybe(Type::ZEROISH);
        let rhs_zero = rhs.maybe(Type::ZEROISH);
        let maybe_minus_zero = lhs.maybe(Type::MINUS_ZERO)
            || rhs.maybe(Type::MINUS_ZERO)
            || (lhs_zero && r.min() < 0.0)
            || (rhs_zero && l.min() < 0.0);

        let mut result = Type::NONE;
        if !l.is_none() && !r.is_none() {
            if l.is(Type::INTEGER) && r.is(Type::INTEGER) {
                let products = [
                    l.min() * r.min(),
                    l.min() * r.max(),
                    l.max() * r.min(),
                    l.max() * r.max(),
                ];
                if products.iter().any(|p| p.is_nan()) {
                    maybe_nan = true;
                    result = Type::INTEGER;
                } else {
                    let min = products.iter().copied().fold(f64::INFINITY, f64::min);
                    let max = products.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    result = Type::range(min, max);
                }
            } else {
                maybe_nan |= (lhs_zero && !r.is(Type::INTEGER)) || (rhs_zero && !l.is(Type::INTEGER));
                result = Type::PLAIN_NUMBER;
            }
        }
        Self::finish(result, maybe_nan, maybe_minus_zero)
    }

    pub fn number_divide(&self, lhs: Type, rhs: Type) -> Type {
        if lhs.is_none() || rhs.is_none() {
            return Type::NONE;
        }
        let maybe_nan = lhs.maybe(Type::NAN)
            || rhs.maybe(Type::NAN)
            || (lhs.maybe(Type::ZEROISH) && rhs.maybe(Type::ZEROISH))
            || !lhs.is(Type::INTEGER_OR_MINUS_ZERO_OR_NAN)
            || !rhs.is(Type::INTEGER_OR_MINUS_ZERO_OR_NAN);
        let maybe_minus_zero = lhs.min() <= 0.0 || rhs.min() < 0.0 || lhs.maybe(Type::MINUS_ZERO);
        Self::finish(Type::PLAIN_NUMBER, maybe_nan, maybe_minus_zero)
    }

    pub fn number_modulus(&self, lhs: Type, rhs: Type) -> Type {
        if lhs.is_none() || rhs.is_none() {
            return Type::NONE;
        }
        let mut maybe_nan =
            lhs.maybe(Type::NAN) || rhs.maybe(Type::NAN) || rhs.maybe(Type::ZEROISH);
        let maybe_minus_zero = lhs.maybe(Type::MINUS_ZERO) || lhs.min() < 0.0;
        let l = Self::plain_number_part(lhs);
        let r = Self::plain_number_part(rhs);

        let mut result = Type::NONE;
        if !l.is_none() && !r.is_none() {
            if l.is(Type::INTEGER) && r.is(Type::INTEGER) {
                let labs = l.min().abs().max(l.max().abs());
                let rabs = r.min().abs().max(r.max().abs()) - 1.0;
                let abs = labs.min(rabs);
                if abs.is_infinite() {
                    maybe_nan = true;
                }
                let min = if l.min() < 0.0 { -abs } else { 0.0 };
                let max = if l.max() > 0.0 { abs } else { 0.0 };
                result = if min <= max { Type::range(min, max) } else { Type::SINGLETON_ZERO };
            } else {
                maybe_nan = true;
                result = Type::PLAIN_NUMBER;
            }
        }
        Self::finish(result, maybe_nan, maybe_minus_zero)
    }

    // =========================================================================
    // Bitwise
    // =========================================================================

    pub fn number_bitwise(&self, lhs: Type, rhs: Type) -> Type {
        if lhs.is_none() || rhs.is_none() {
            return Type::NONE;
        }
        Type::SIGNED32
    }

    pub fn number_shift_right_logical(&self, lhs: Type, rhs: Type) -> Type {
        if lhs.is_none() || rhs.is_none() {
            return Type::NONE;
        }
        if lhs.is(Type::UNSIGNED32) && rhs.is(Type::SINGLETON_ZERO) {
            return lhs;
        }
        Type::UNSIGNED32
    }

    // =========================================================================
    // Unary
    // =========================================================================

    pub fn number_abs(&self, t: Type) -> Type {
        if t.is_none() {
            return Type::NONE;
        }
        let maybe_nan = t.maybe(Type::NAN);
        let p = Self::plain_number_part(t);
        let result = if p.is_none() {
            Type::NONE
        } else if p.is(Type::INTEGER) {
            let (min, max) = (p.min(), p.max());
            if min >= 0.0 {
                p
            } else if max <= 0.0 {
                Type::range(-max, -min)
            } else {
                Type::range(0.0, max.max(-min))
            }
        } else {
            Type::PLAIN_NUMBER
        };
        Self::finish(result, maybe_nan, false)
    }

    /// Type of `Ceil`, `Floor`, `Round` and `Trunc`.
    pub fn number_round(&self, t: Type) -> Type {
        if t.is(Type::INTEGER_OR_MINUS_ZERO_OR_NAN) {
            return t;
        }
        Self::finish(
            Type::INTEGER,
            t.maybe(Type::NAN),
            t.maybe(Type::MINUS_ZERO) || t.min() < 1.0,
        )
    }

    pub fn number_sign(&self, t: Type) -> Type {
        if t.is_none() {
            return Type::NONE;
        }
        let p = Self::plain_number_part(t);
        let min = if p.min() < 0.0 { -1.0 } else if p.min() > 0.0 { 1.0 } else { 0.0 };
        let max = if p.max() > 0.0 { 1.0 } else if p.max() < 0.0 { -1.0 } else { 0.0 };
        let result = if p.is_none() { Type::NONE } else { Type::range(min, max) };
        Self::finish(result, t.maybe(Type::NAN), t.maybe(Type::MINUS_ZERO))
    }

    /// Type of `Max` (`is_max`) or `Min`.
    pub fn number_max_min(&self, lhs: Type, rhs: Type, is_max: bool) -> Type {
        if lhs.is_none() || rhs.is_none() {
            return Type::NONE;
        }
        let maybe_nan = lhs.maybe(Type::NAN) || rhs.maybe(Type::NAN);
        let maybe_minus_zero = lhs.maybe(Type::MINUS_ZERO) || rhs.maybe(Type::MINUS_ZERO);
        let l = Self::plain_number_part(lhs);
        let r = Self::plain_number_part(rhs);
        let result = if l.is_none() || r.is_none() {
            Type::NONE
        } else if l.is(Type::INTEGER) && r.is(Type::INTEGER) {
            if is_max {
                Type::range(l.min().max(r.min()), l.max().max(r.max()))
            } else {
                Type::range(l.min().min(r.min()), l.max().min(r.max()))
            }
        } else {
            Type::PLAIN_NUMBER
        };
        Self::finish(result, maybe_nan, maybe_minus_zero)
    }

    pub fn number_to_int32(&self, t: Type) -> Type {
        if t.is(Type::SIGNED32) {
            t
        } else if t.is(Type::ZEROISH) {
            Type::SINGLETON_ZERO
        } else {
            Type::SIGNED32
        }
    }

    pub fn number_to_uint32(&self, t: Type) -> Type {
        if t.is(Type::UNSIGNED32) {
            t
        } else if t.is(Type::ZEROISH) {
            Type::SINGLETON_ZERO
        } else {
            Type::UNSIGNED32
        }
    }

    pub fn number_silence_nan(&self, t: Type) -> Type {
        t
    }

    // =========================================================================
    // Checks
    // =========================================================================

    /// Type of a checked bounds access `index` against `length`.
    pub fn check_bounds(&self, index: Type, length: Type) -> Type {
        if length.is(Type::SINGLETON_ZERO) || length.max() < 1.0 {
            return Type::NONE;
        }
        let upper = Type::range(0.0, length.max() - 1.0);
        if index.maybe(Type::STRING) {
            return upper;
        }
        let mut index = index;
        if index.maybe(Type::MINUS_ZERO) {
            index = Type::union(index, Type::SINGLETON_ZERO);
        }
        Type::intersect(index, upper)
    }

    pub fn check_number(&self, t: Type) -> Type {
        Type::intersect(t, Type::NUMBER)
    }

    // =========================================================================
    // Weakening
    // =========================================================================

    /// Widen a growing range so repeated growth terminates.
    ///
    /// `previous` is the type before this round and `current` the freshly
    /// computed one. Bounds of the integer part that moved are snapped
    /// outward to the next limit; unmatched bounds become infinite. Once a
    /// node has been weakened (`weakened` is set) it is always weakened.
    pub fn weaken(&self, current: Type, previous: Type, weakened: &mut bool) -> Type {
        if !previous.maybe(Type::INTEGER) {
            return current;
        }
        let current_integer = Type::intersect(current, Type::INTEGER);
        let previous_integer = Type::intersect(previous, Type::INTEGER);
        if !*weakened {
            if current_integer.get_range().is_none() || previous_integer.get_range().is_none() {
                return current;
            }
            *weakened = true;
        }

        let (cur_min, cur_max) = (current_integer.min(), current_integer.max());
        let mut new_min = cur_min;
        if cur_min != previous_integer.min() {
            new_min = WEAKEN_MIN_LIMITS
                .iter()
                .copied()
                .find(|&limit| limit <= cur_min)
                .unwrap_or(f64::NEG_INFINITY);
        }
        let mut new_max = cur_max;
        if cur_max != previous_integer.max() {
            new_max = WEAKEN_MAX_LIMITS
                .iter()
                .copied()
                .find(|&limit| limit >= cur_max)
                .unwrap_or(f64::INFINITY);
        }
        Type::union(current, Type::range(new_min, new_max))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_ranges() {
        let t = OperationTyper::new();
        let r = t.number_add(Type::range(0.0, 10.0), Type::range(1.0, 1.0));
        assert_eq!(r, Type::range(1.0, 11.0));
        let r = t.number_add(Type::SIGNED32, Type::SIGNED32);
        assert!(r.is(Type::SAFE_INTEGER));
        assert!(!r.maybe(Type::NAN));
    }

    #[test]
    fn test_add_nan_and_minus_zero() {
        let t = OperationTyper::new();
        let r = t.number_add(Type::union(Type::range(0.0, 1.0), Type::NAN), Type::SINGLETON_ONE);
        assert!(r.maybe(Type::NAN));
        let r = t.number_add(Type::MINUS_ZERO, Type::MINUS_ZERO);
        assert!(r.maybe(Type::MINUS_ZERO));
        assert!(t.number_add(Type::NONE, Type::SIGNED32).is_none());
    }

    #[test]
    fn test_subtract_and_multiply() {
        let t = OperationTyper::new();
        assert_eq!(
            t.number_subtract(Type::range(0.0, 10.0), Type::range(0.0, 5.0)),
            Type::range(-5.0, 10.0)
        );
        let r = t.number_multiply(Type::range(-2.0, 3.0), Type::range(4.0, 5.0));
        assert_eq!(r.min(), -10.0);
        assert_eq!(r.max(), 15.0);
        assert!(!r.maybe(Type::MINUS_ZERO));
        let r = t.number_multiply(Type::range(0.0, 3.0), Type::range(-5.0, -4.0));
        assert!(r.maybe(Type::MINUS_ZERO));
    }

    #[test]
    fn test_modulus() {
        let t = OperationTyper::new();
        let r = t.number_modulus(Type::range(0.0, 100.0), Type::range(1.0, 8.0));
        assert!(r.is(Type::range(0.0, 7.0)));
        let r = t.number_modulus(Type::range(-5.0, 5.0), Type::range(3.0, 3.0));
        assert!(r.maybe(Type::MINUS_ZERO));
        assert!(Type::intersect(r, Type::PLAIN_NUMBER).is(Type::range(-2.0, 2.0)));
    }

    #[test]
    fn test_to_number() {
        let t = OperationTyper::new();
        assert!(t.to_number(Type::BOOLEAN).is(Type::range(0.0, 1.0)));
        assert!(t.to_number(Type::UNDEFINED).is(Type::NAN));
        assert!(t.to_number(Type::NULL).is(Type::SINGLETON_ZERO));
        assert_eq!(t.to_number(Type::SIGNED32), Type::SIGNED32);
    }

    #[test]
    fn test_check_bounds() {
        let t = OperationTyper::new();
        let r = t.check_bounds(Type::SIGNED32, Type::range(0.0, 100.0));
        assert!(r.is(Type::range(0.0, 99.0)));
        assert!(t.check_bounds(Type::SIGNED32, Type::SINGLETON_ZERO).is_none());
    }

    #[test]
    fn test_weaken_snaps_to_limits() {
        let t = OperationTyper::new();
        let mut weakened = false;
        let w = t.weaken(Type::range(0.0, 11.0), Type::range(0.0, 10.0), &mut weakened);
        assert!(weakened);
        assert_eq!(w.get_range().map(|r| (r.min, r.max)), Some((0.0, 1073741823.0)));

        let mut weakened = false;
        let w = t.weaken(Type::range(-3.0, 10.0), Type::range(0.0, 10.0), &mut weakened);
        assert_eq!(w.min(), -1073741824.0);

        let mut weakened = false;
        let w = t.weaken(Type::range(0.0, 1e300), Type::range(0.0, 10.0), &mut weakened);
        assert_eq!(w.max(), f64::INFINITY);
    }

    #[test]
    fn test_weaken_ignores_non_integers() {
        let t = OperationTyper::new();
        let mut weakened = false;
        assert_eq!(t.weaken(Type::STRING, Type::STRING, &mut weakened), Type::STRING);
        assert!(!weakened);
    }
}
