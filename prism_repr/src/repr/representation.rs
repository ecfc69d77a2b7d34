//! Machine representations and machine types.
//!
//! A [`MachineRepresentation`] is the bit layout a value occupies at the
//! machine level. A [`MachineType`] pairs it with a [`MachineSemantic`]
//! describing how the bits are interpreted (signedness, boolean, tagged).

use std::fmt;

// =============================================================================
// Machine Representation
// =============================================================================

/// Bit layout of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum MachineRepresentation {
    /// No value (unused or unreachable).
    #[default]
    None,
    /// A single bit (0 or 1) in a word register.
    Bit,
    Word8,
    Word16,
    Word32,
    Word64,
    Float32,
    Float64,
    Simd128,
    /// Small integer with the tag bit clear.
    TaggedSigned,
    /// Pointer to a heap object with the tag bit set.
    TaggedPointer,
    /// Either of the above.
    Tagged,
    CompressedPointer,
    Compressed,
}

impl MachineRepresentation {
    /// Word8, Word16 or Word32.
    #[inline]
    pub const fn is_word32_like(self) -> bool {
        matches!(
            self,
            MachineRepresentation::Word8
                | MachineRepresentation::Word16
                | MachineRepresentation::Word32
        )
    }

    #[inline]
    pub const fn is_any_tagged(self) -> bool {
        matches!(
            self,
            MachineRepresentation::TaggedSigned
                | MachineRepresentation::TaggedPointer
                | MachineRepresentation::Tagged
        )
    }

    #[inline]
    pub const fn is_compressed(self) -> bool {
        matches!(
            self,
            MachineRepresentation::CompressedPointer | MachineRepresentation::Compressed
        )
    }

    #[inline]
    pub const fn is_floating_point(self) -> bool {
        matches!(
            self,
            MachineRepresentation::Float32 | MachineRepresentation::Float64
        )
    }

    /// Whether a value of this representation may hold a heap pointer.
    #[inline]
    pub const fn can_be_tagged_pointer(self) -> bool {
        matches!(
            self,
            MachineRepresentation::TaggedPointer
                | MachineRepresentation::Tagged
                | MachineRepresentation::CompressedPointer
                | MachineRepresentation::Compressed
        )
    }

    /// Size in bytes, as a power of two.
    pub const fn element_size_log2(self) -> u32 {
        match self {
            MachineRepresentation::None
            | MachineRepresentation::Bit
            | MachineRepresentation::Word8 => 0,
            MachineRepresentation::Word16 => 1,
            MachineRepresentation::Word32
            | MachineRepresentation::Float32
            | MachineRepresentation::CompressedPointer
            | MachineRepresentation::Compressed => 2,
            MachineRepresentation::Word64
            | MachineRepresentation::Float64
            | MachineRepresentation::TaggedSigned
            | MachineRepresentation::TaggedPointer
            | MachineRepresentation::Tagged => 3,
            MachineRepresentation::Simd128 => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            MachineRepresentation::None => "kRepNone",
            MachineRepresentation::Bit => "kRepBit",
            MachineRepresentation::Word8 => "kRepWord8",
            MachineRepresentation::Word16 => "kRepWord16",
            MachineRepresentation::Word32 => "kRepWord32",
            MachineRepresentation::Word64 => "kRepWord64",
            MachineRepresentation::Float32 => "kRepFloat32",
            MachineRepresentation::Float64 => "kRepFloat64",
            MachineRepresentation::Simd128 => "kRepSimd128",
            MachineRepresentation::TaggedSigned => "kRepTaggedSigned",
            MachineRepresentation::TaggedPointer => "kRepTaggedPointer",
            MachineRepresentation::Tagged => "kRepTagged",
            MachineRepresentation::CompressedPointer => "kRepCompressedPointer",
            MachineRepresentation::Compressed => "kRepCompressed",
        }
    }
}

impl fmt::Display for MachineRepresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Machine Semantic
// =============================================================================

/// Interpretation of the bits of a machine value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum MachineSemantic {
    #[default]
    None,
    Bool,
    Int32,
    Uint32,
    Int64,
    Uint64,
    SignedBigInt64,
    UnsignedBigInt64,
    Number,
    Any,
}

// =============================================================================
// Machine Type
// =============================================================================

/// A representation together with its semantic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct MachineType {
    pub representation: MachineRepresentation,
    pub semantic: MachineSemantic,
}

macro_rules! machine_types {
    ($($name:ident => ($rep:ident, $sem:ident);)*) => {
        $(
            #[inline]
            pub const fn $name() -> Self {
                Self::new(MachineRepresentation::$rep, MachineSemantic::$sem)
            }
        )*
    };
}

impl MachineType {
    #[inline]
    pub const fn new(representation: MachineRepresentation, semantic: MachineSemantic) -> Self {
        Self {
            representation,
            semantic,
        }
    }

    machine_types! {
        none => (None, None);
        bool => (Bit, Bool);
        int8 => (Word8, Int32);
        uint8 => (Word8, Uint32);
        int16 => (Word16, Int32);
        uint16 => (Word16, Uint32);
        int32 => (Word32, Int32);
        uint32 => (Word32, Uint32);
        int64 => (Word64, Int64);
        uint64 => (Word64, Uint64);
        signed_bigint64 => (Word64, SignedBigInt64);
        unsigned_bigint64 => (Word64, UnsignedBigInt64);
        float32 => (Float32, Number);
        float64 => (Float64, Number);
        simd128 => (Simd128, None);
        tagged_signed => (TaggedSigned, Int32);
        tagged_pointer => (TaggedPointer, Any);
        any_tagged => (Tagged, Any);
    }

    /// Raw pointer of the given word representation.
    #[inline]
    pub const fn pointer(word: MachineRepresentation) -> Self {
        Self::new(word, MachineSemantic::None)
    }

    /// Canonical machine type for a representation.
    pub const fn for_representation(rep: MachineRepresentation, is_signed: bool) -> Self {
        match rep {
            MachineRepresentation::Word8 if is_signed => Self::int8(),
            MachineRepresentation::Word8 => Self::uint8(),
            MachineRepresentation::Word16 if is_signed => Self::int16(),
            MachineRepresentation::Word16 => Self::uint16(),
            MachineRepresentation::Word32 if is_signed => Self::int32(),
            MachineRepresentation::Word32 => Self::uint32(),
            MachineRepresentation::Word64 if is_signed => Self::int64(),
            MachineRepresentation::Word64 => Self::uint64(),
            MachineRepresentation::Float32 => Self::float32(),
            MachineRepresentation::Float64 => Self::float64(),
            MachineRepresentation::Bit => Self::bool(),
            MachineRepresentation::TaggedSigned => Self::tagged_signed(),
            MachineRepresentation::TaggedPointer => Self::tagged_pointer(),
            MachineRepresentation::Tagged => Self::any_tagged(),
            MachineRepresentation::Simd128 => Self::simd128(),
            MachineRepresentation::CompressedPointer
            | MachineRepresentation::Compressed
            | MachineRepresentation::None => Self::new(rep, MachineSemantic::None),
        }
    }

    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(
            self.semantic,
            MachineSemantic::Int32 | MachineSemantic::Int64 | MachineSemantic::SignedBigInt64
        )
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{:?}", self.representation, self.semantic)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_representation_predicates() {
        assert!(MachineRepresentation::Word16.is_word32_like());
        assert!(!MachineRepresentation::Word64.is_word32_like());
        assert!(MachineRepresentation::TaggedSigned.is_any_tagged());
        assert!(!MachineRepresentation::TaggedSigned.can_be_tagged_pointer());
        assert!(MachineRepresentation::Tagged.can_be_tagged_pointer());
        assert_eq!(MachineRepresentation::Float64.element_size_log2(), 3);
    }

    #[test]
    fn test_machine_type_for_representation() {
        assert_eq!(
            MachineType::for_representation(MachineRepresentation::Word32, false),
            MachineType::uint32()
        );
        assert_eq!(
            MachineType::for_representation(MachineRepresentation::Tagged, true),
            MachineType::any_tagged()
        );
        assert!(MachineType::int8().is_signed());
        assert!(!MachineType::uint64().is_signed());
    }

    #[test]
    fn test_display() {
        assert_eq!(MachineRepresentation::Float32.to_string(), "kRepFloat32");
        assert_eq!(MachineType::int32().to_string(), "kRepWord32|Int32");
    }
}
