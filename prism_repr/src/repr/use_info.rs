//! Use requirements attached to value inputs.

use std::fmt;

use super::representation::MachineRepresentation;
use super::truncation::{IdentifyZeros, Truncation};

// =============================================================================
// Type Check Kind
// =============================================================================

/// Runtime check that accompanies a conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TypeCheckKind {
    #[default]
    None,
    SignedSmall,
    Signed32,
    Signed64,
    Number,
    NumberOrBoolean,
    NumberOrOddball,
    HeapObject,
    BigInt,
    SignedBigInt64,
    ArrayIndex,
}

/// Whether a checked conversion must deoptimize on `-0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CheckForMinusZeroMode {
    CheckForMinusZero,
    DontCheckForMinusZero,
}

// =============================================================================
// Use Info
// =============================================================================

/// Required representation, truncation and check for one input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UseInfo {
    representation: MachineRepresentation,
    truncation: Truncation,
    type_check: TypeCheckKind,
}

impl UseInfo {
    pub const fn new(
        representation: MachineRepresentation,
        truncation: Truncation,
        type_check: TypeCheckKind,
    ) -> Self {
        Self {
            representation,
            truncation,
            type_check,
        }
    }

    const fn plain(representation: MachineRepresentation, truncation: Truncation) -> Self {
        Self::new(representation, truncation, TypeCheckKind::None)
    }

    // =========================================================================
    // Unchecked Uses
    // =========================================================================

    pub const fn truncating_word32() -> Self {
        Self::plain(MachineRepresentation::Word32, Truncation::word32())
    }

    pub const fn truncating_word64() -> Self {
        Self::plain(MachineRepresentation::Word64, Truncation::word64())
    }

    pub const fn word64(identify_zeros: IdentifyZeros) -> Self {
        Self::plain(MachineRepresentation::Word64, Truncation::any(identify_zeros))
    }

    /// Pointer-sized raw word.
    pub const fn word(pointer: MachineRepresentation) -> Self {
        Self::plain(pointer, Truncation::any(IdentifyZeros::DistinguishZeros))
    }

    pub const fn bool() -> Self {
        Self::plain(MachineRepresentation::Bit, Truncation::bool())
    }

    pub const fn float32() -> Self {
        Self::plain(
            MachineRepresentation::Float32,
            Truncation::any(IdentifyZeros::DistinguishZeros),
        )
    }

    pub const fn float64() -> Self {
        Self::plain(
            MachineRepresentation::Float64,
            Truncation::any(IdentifyZeros::DistinguishZeros),
        )
    }

    pub const fn truncating_float64(identify_zeros: IdentifyZeros) -> Self {
        Self::plain(
            MachineRepresentation::Float64,
            Truncation::oddball_and_bigint_to_number(identify_zeros),
        )
    }

    pub const fn any_tagged() -> Self {
        Self::plain(
            MachineRepresentation::Tagged,
            Truncation::any(IdentifyZeros::DistinguishZeros),
        )
    }

    pub const fn tagged_signed() -> Self {
        Self::plain(
            MachineRepresentation::TaggedSigned,
            Truncation::any(IdentifyZeros::DistinguishZeros),
        )
    }

    pub const fn tagged_pointer() -> Self {
        Self::plain(
            MachineRepresentation::TaggedPointer,
            Truncation::any(IdentifyZeros::DistinguishZeros),
        )
    }

    /// Any representation, full fidelity.
    pub const fn any() -> Self {
        Self::plain(
            MachineRepresentation::None,
            Truncation::any(IdentifyZeros::DistinguishZeros),
        )
    }

    /// Any representation, only truthiness observed.
    pub const fn any_truncating_to_bool() -> Self {
        Self::plain(MachineRepresentation::None, Truncation::bool())
    }

    /// The input is not used as a value.
    pub const fn none() -> Self {
        Self::plain(MachineRepresentation::None, Truncation::none())
    }

    // =========================================================================
    // Checked Uses
    // =========================================================================

    pub const fn checked_heap_object_as_tagged_pointer() -> Self {
        Self::new(
            MachineRepresentation::TaggedPointer,
            Truncation::any(IdentifyZeros::DistinguishZeros),
            TypeCheckKind::HeapObject,
        )
    }

    pub const fn checked_bigint_as_tagged_pointer() -> Self {
        Self::new(
            MachineRepresentation::TaggedPointer,
            Truncation::any(IdentifyZeros::DistinguishZeros),
            TypeCheckKind::BigInt,
        )
    }

    pub const fn checked_bigint_truncating_word64() -> Self {
        Self::new(
            MachineRepresentation::Word64,
            Truncation::word64(),
            TypeCheckKind::BigInt,
        )
    }

    pub const fn checked_signed_small_as_tagged_signed(identify_zeros: IdentifyZeros) -> Self {
        Self::new(
            MachineRepresentation::TaggedSigned,
            Truncation::any(identify_zeros),
            TypeCheckKind::SignedSmall,
        )
    }

    pub const fn checked_signed_small_as_word32(identify_zeros: IdentifyZeros) -> Self {
        Self::new(
            MachineRepresentation::Word32,
            Truncation::any(identify_zeros),
            TypeCheckKind::SignedSmall,
        )
    }

    pub const fn checked_signed32_as_word32(identify_zeros: IdentifyZeros) -> Self {
        Self::new(
            MachineRepresentation::Word32,
            Truncation::any(identify_zeros),
            TypeCheckKind::Signed32,
        )
    }

    pub const fn checked_signed64_as_word64(identify_zeros: IdentifyZeros) -> Self {
        Self::new(
            MachineRepresentation::Word64,
            Truncation::any(identify_zeros),
            TypeCheckKind::Signed64,
        )
    }

    pub const fn checked_tagged_as_array_index(pointer: MachineRepresentation) -> Self {
        Self::new(
            pointer,
            Truncation::any(IdentifyZeros::IdentifyZeros),
            TypeCheckKind::ArrayIndex,
        )
    }

    pub const fn checked_number_as_float64(identify_zeros: IdentifyZeros) -> Self {
        Self::new(
            MachineRepresentation::Float64,
            Truncation::any(identify_zeros),
            TypeCheckKind::Number,
        )
    }

    pub const fn checked_number_as_word32() -> Self {
        Self::new(
            MachineRepresentation::Word32,
            Truncation::word32(),
            TypeCheckKind::Number,
        )
    }

    pub const fn checked_number_or_boolean_as_float64(identify_zeros: IdentifyZeros) -> Self {
        Self::new(
            MachineRepresentation::Float64,
            Truncation::any(identify_zeros),
            TypeCheckKind::NumberOrBoolean,
        )
    }

    pub const fn checked_number_or_oddball_as_float64(identify_zeros: IdentifyZeros) -> Self {
        Self::new(
            MachineRepresentation::Float64,
            Truncation::any(identify_zeros),
            TypeCheckKind::NumberOrOddball,
        )
    }

    pub const fn checked_number_or_oddball_as_word32() -> Self {
        Self::new(
            MachineRepresentation::Word32,
            Truncation::word32(),
            TypeCheckKind::NumberOrOddball,
        )
    }

    /// Truncating use matching a stored or passed representation.
    ///
    /// Returns `None` for representations no value use can demand.
    pub const fn truncating_from_representation(rep: MachineRepresentation) -> Option<Self> {
        match rep {
            MachineRepresentation::TaggedSigned => Some(Self::tagged_signed()),
            MachineRepresentation::TaggedPointer | MachineRepresentation::Tagged => {
                Some(Self::any_tagged())
            }
            MachineRepresentation::Float64 => {
                Some(Self::truncating_float64(IdentifyZeros::DistinguishZeros))
            }
            MachineRepresentation::Float32 => Some(Self::float32()),
            MachineRepresentation::Word8
            | MachineRepresentation::Word16
            | MachineRepresentation::Word32 => Some(Self::truncating_word32()),
            MachineRepresentation::Word64 => {
                Some(Self::word64(IdentifyZeros::DistinguishZeros))
            }
            MachineRepresentation::Bit => Some(Self::bool()),
            MachineRepresentation::CompressedPointer
            | MachineRepresentation::Compressed
            | MachineRepresentation::Simd128
            | MachineRepresentation::None => None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn representation(&self) -> MachineRepresentation {
        self.representation
    }

    #[inline]
    pub fn truncation(&self) -> Truncation {
        self.truncation
    }

    #[inline]
    pub fn type_check(&self) -> TypeCheckKind {
        self.type_check
    }

    #[inline]
    pub fn minus_zero_check(&self) -> CheckForMinusZeroMode {
        if self.truncation.identifies_zero_and_minus_zero() {
            CheckForMinusZeroMode::DontCheckForMinusZero
        } else {
            CheckForMinusZeroMode::CheckForMinusZero
        }
    }
}

impl fmt::Display for UseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.representation, self.truncation)?;
        if self.type_check != TypeCheckKind::None {
            write!(f, ", check {:?}", self.type_check)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncating_from_representation() {
        assert_eq!(
            UseInfo::truncating_from_representation(MachineRepresentation::Word16),
            Some(UseInfo::truncating_word32())
        );
        assert_eq!(
            UseInfo::truncating_from_representation(MachineRepresentation::TaggedPointer),
            Some(UseInfo::any_tagged())
        );
        assert_eq!(
            UseInfo::truncating_from_representation(MachineRepresentation::Simd128),
            None
        );
    }

    #[test]
    fn test_minus_zero_check() {
        assert_eq!(
            UseInfo::checked_signed_small_as_word32(IdentifyZeros::IdentifyZeros).minus_zero_check(),
            CheckForMinusZeroMode::DontCheckForMinusZero
        );
        assert_eq!(
            UseInfo::checked_signed32_as_word32(IdentifyZeros::DistinguishZeros).minus_zero_check(),
            CheckForMinusZeroMode::CheckForMinusZero
        );
        assert_eq!(UseInfo::none().type_check(), TypeCheckKind::None);
    }
}
