//! Truncations: how much of a value its uses actually observe.
//!
//! The kinds form a lattice:
//!
//! ```text
//!                     Any
//!                    /   \
//!   OddballAndBigIntToNumber  Bool
//!                  |          |
//!               Word64        |
//!                  |          |
//!               Word32        |
//!                    \       /
//!                      None
//! ```
//!
//! Independently, a truncation records whether uses identify `0` and `-0`.
//! Identifying zeros is the less general choice.

use std::fmt;

// =============================================================================
// Truncation Kind
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum TruncationKind {
    None,
    Bool,
    Word32,
    Word64,
    OddballAndBigIntToNumber,
    Any,
}

impl TruncationKind {
    fn less_general(self, other: TruncationKind) -> bool {
        use TruncationKind::*;
        match self {
            None => true,
            Bool => matches!(other, Bool | Any),
            Word32 => matches!(other, Word32 | Word64 | OddballAndBigIntToNumber | Any),
            Word64 => matches!(other, Word64 | OddballAndBigIntToNumber | Any),
            OddballAndBigIntToNumber => matches!(other, OddballAndBigIntToNumber | Any),
            Any => other == Any,
        }
    }

    fn generalize(a: TruncationKind, b: TruncationKind) -> TruncationKind {
        if a.less_general(b) {
            b
        } else if b.less_general(a) {
            a
        } else if a.less_general(TruncationKind::OddballAndBigIntToNumber)
            && b.less_general(TruncationKind::OddballAndBigIntToNumber)
        {
            TruncationKind::OddballAndBigIntToNumber
        } else {
            TruncationKind::Any
        }
    }
}

// =============================================================================
// Identify Zeros
// =============================================================================

/// Whether uses treat `0` and `-0` as the same value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdentifyZeros {
    IdentifyZeros,
    DistinguishZeros,
}

impl IdentifyZeros {
    #[inline]
    fn generalize(a: IdentifyZeros, b: IdentifyZeros) -> IdentifyZeros {
        if a == b { a } else { IdentifyZeros::DistinguishZeros }
    }

    #[inline]
    fn less_general(self, other: IdentifyZeros) -> bool {
        self == other || self == IdentifyZeros::IdentifyZeros
    }
}

// =============================================================================
// Truncation
// =============================================================================

/// Accumulated use demand on a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Truncation {
    kind: TruncationKind,
    identify_zeros: IdentifyZeros,
}

impl Truncation {
    const fn new(kind: TruncationKind, identify_zeros: IdentifyZeros) -> Self {
        Self {
            kind,
            identify_zeros,
        }
    }

    /// The value is not used.
    pub const fn none() -> Self {
        Self::new(TruncationKind::None, IdentifyZeros::IdentifyZeros)
    }

    /// Only truthiness is observed.
    pub const fn bool() -> Self {
        Self::new(TruncationKind::Bool, IdentifyZeros::IdentifyZeros)
    }

    /// Only the low 32 bits are observed.
    pub const fn word32() -> Self {
        Self::new(TruncationKind::Word32, IdentifyZeros::IdentifyZeros)
    }

    /// Low 32 bits, with `-0` kept apart from `0` by other uses.
    pub const fn word32_distinguishing_zeros() -> Self {
        Self::new(TruncationKind::Word32, IdentifyZeros::DistinguishZeros)
    }

    /// Only the low 64 bits are observed.
    pub const fn word64() -> Self {
        Self::new(TruncationKind::Word64, IdentifyZeros::IdentifyZeros)
    }

    /// Oddballs and BigInts may be converted to numbers.
    pub const fn oddball_and_bigint_to_number(identify_zeros: IdentifyZeros) -> Self {
        Self::new(TruncationKind::OddballAndBigIntToNumber, identify_zeros)
    }

    /// A float64 use: the numeric value, oddballs and BigInts converted.
    pub const fn float64(identify_zeros: IdentifyZeros) -> Self {
        Self::oddball_and_bigint_to_number(identify_zeros)
    }

    /// Full fidelity.
    pub const fn any(identify_zeros: IdentifyZeros) -> Self {
        Self::new(TruncationKind::Any, identify_zeros)
    }

    /// Least upper bound.
    pub fn generalize(a: Truncation, b: Truncation) -> Truncation {
        Truncation::new(
            TruncationKind::generalize(a.kind, b.kind),
            IdentifyZeros::generalize(a.identify_zeros, b.identify_zeros),
        )
    }

    /// Partial order of the lattice.
    pub fn is_less_general_than(&self, other: Truncation) -> bool {
        self.kind.less_general(other.kind) && self.identify_zeros.less_general(other.identify_zeros)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[inline]
    pub fn is_unused(&self) -> bool {
        self.kind == TruncationKind::None
    }

    #[inline]
    pub fn is_used_as_bool(&self) -> bool {
        self.kind.less_general(TruncationKind::Bool)
    }

    #[inline]
    pub fn is_used_as_word32(&self) -> bool {
        self.kind.less_general(TruncationKind::Word32)
    }

    #[inline]
    pub fn is_used_as_word64(&self) -> bool {
        self.kind.less_general(TruncationKind::Word64)
    }

    #[inline]
    pub fn truncates_oddball_and_bigint_to_number(&self) -> bool {
        self.kind.less_general(TruncationKind::OddballAndBigIntToNumber)
    }

    /// Uses treat `undefined` like `0` (word32 or boolean uses).
    #[inline]
    pub fn identifies_undefined_and_zero(&self) -> bool {
        self.is_used_as_word32() || self.is_used_as_bool()
    }

    #[inline]
    pub fn identifies_zero_and_minus_zero(&self) -> bool {
        self.identify_zeros == IdentifyZeros::IdentifyZeros
    }

    #[inline]
    pub fn identify_zeros(&self) -> IdentifyZeros {
        self.identify_zeros
    }

    pub fn description(&self) -> &'static str {
        match (self.kind, self.identify_zeros) {
            (TruncationKind::None, _) => "no-value-use",
            (TruncationKind::Bool, _) => "truncate-to-bool",
            (TruncationKind::Word32, _) => "truncate-to-word32",
            (TruncationKind::Word64, _) => "truncate-to-word64",
            (TruncationKind::OddballAndBigIntToNumber, IdentifyZeros::IdentifyZeros) => {
                "truncate-oddball&bigint-to-number (identify zeros)"
            }
            (TruncationKind::OddballAndBigIntToNumber, IdentifyZeros::DistinguishZeros) => {
                "truncate-oddball&bigint-to-number (distinguish zeros)"
            }
            (TruncationKind::Any, IdentifyZeros::IdentifyZeros) => {
                "no-truncation (but identify zeros)"
            }
            (TruncationKind::Any, IdentifyZeros::DistinguishZeros) => {
                "no-truncation (but distinguish zeros)"
            }
        }
    }
}

impl Default for Truncation {
    fn default() -> Self {
        Truncation::none()
    }
}

impl fmt::Display for Truncation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Truncation; 9] = [
        Truncation::none(),
        Truncation::bool(),
        Truncation::word32(),
        Truncation::word64(),
        Truncation::oddball_and_bigint_to_number(IdentifyZeros::IdentifyZeros),
        Truncation::oddball_and_bigint_to_number(IdentifyZeros::DistinguishZeros),
        Truncation::any(IdentifyZeros::IdentifyZeros),
        Truncation::any(IdentifyZeros::DistinguishZeros),
        Truncation::word32_distinguishing_zeros(),
    ];

    #[test]
    fn test_generalize_is_upper_bound() {
        for a in ALL {
            for b in ALL {
                let g = Truncation::generalize(a, b);
                assert!(a.is_less_general_than(g), "{a} !<= {g}");
                assert!(b.is_less_general_than(g), "{b} !<= {g}");
                assert_eq!(g, Truncation::generalize(b, a));
            }
        }
    }

    #[test]
    fn test_generalize_examples() {
        assert_eq!(
            Truncation::generalize(Truncation::word32(), Truncation::bool()),
            Truncation::any(IdentifyZeros::IdentifyZeros)
        );
        assert_eq!(
            Truncation::generalize(Truncation::word32(), Truncation::word64()),
            Truncation::word64()
        );
        assert_eq!(
            Truncation::generalize(
                Truncation::word32(),
                Truncation::any(IdentifyZeros::DistinguishZeros)
            ),
            Truncation::any(IdentifyZeros::DistinguishZeros)
        );
        assert_eq!(
            Truncation::generalize(Truncation::none(), Truncation::bool()),
            Truncation::bool()
        );
    }

    #[test]
    fn test_queries() {
        assert!(Truncation::none().is_unused());
        assert!(Truncation::none().is_used_as_word32());
        assert!(Truncation::word32().is_used_as_word64());
        assert!(!Truncation::word64().is_used_as_word32());
        assert!(!Truncation::bool().is_used_as_word32());
        assert!(Truncation::bool().identifies_undefined_and_zero());
        assert!(Truncation::word64().truncates_oddball_and_bigint_to_number());
        assert!(!Truncation::any(IdentifyZeros::IdentifyZeros).truncates_oddball_and_bigint_to_number());
        assert!(!Truncation::any(IdentifyZeros::DistinguishZeros).identifies_zero_and_minus_zero());
    }

    #[test]
    fn test_named_variants() {
        let word32 = Truncation::word32_distinguishing_zeros();
        assert!(word32.is_used_as_word32());
        assert!(!word32.identifies_zero_and_minus_zero());
        assert!(Truncation::word32().is_less_general_than(word32));
        assert!(!word32.is_less_general_than(Truncation::word32()));

        let float64 = Truncation::float64(IdentifyZeros::IdentifyZeros);
        assert!(float64.truncates_oddball_and_bigint_to_number());
        assert!(!float64.is_used_as_word64());
        assert!(float64.identifies_zero_and_minus_zero());
        assert_eq!(
            Truncation::generalize(Truncation::word32(), Truncation::float64(IdentifyZeros::DistinguishZeros)),
            Truncation::float64(IdentifyZeros::DistinguishZeros)
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Truncation::word32().to_string(), "truncate-to-word32");
        assert_eq!(
            Truncation::any(IdentifyZeros::DistinguishZeros).to_string(),
            "no-truncation (but distinguish zeros)"
        );
    }
}
