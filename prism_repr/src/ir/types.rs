//! Static type lattice for representation selection.
//!
//! A [`Type`] is a union of three parts:
//! - **Bits**: a [`TypeBits`] bitset of disjoint value classes
//! - **Range**: an optional integer interval `[min, max]`
//! - **Constant**: an optional single heap object
//!
//! The number line is split into bitset classes at fixed boundaries so that
//! an integer range can be over-approximated by bits (its *lub*) or
//! under-approximated by bits (its *glb*):
//!
//! ```text
//!   OtherNumber | OtherSigned32 | Negative31 | Unsigned30 | OtherUnsigned31 | OtherUnsigned32 | OtherNumber
//!  -inf       -2^31          -2^30          0          2^30              2^31              2^32        +inf
//! ```
//!
//! `OtherNumber` also covers every non-integral number, so it never
//! appears in the glb of an integer range.
//!
//! All operations are sound over-approximations: `is` may answer `false`
//! for a true subtyping and `intersect` may return a superset.

use std::fmt;

// =============================================================================
// Type Bits
// =============================================================================

bitflags::bitflags! {
    /// Disjoint value classes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TypeBits: u32 {
        /// Integers in `[-2^30, -1]`.
        const NEGATIVE31 = 1 << 0;
        /// Integers in `[-2^31, -2^30 - 1]`.
        const OTHER_SIGNED32 = 1 << 1;
        /// Integers in `[0, 2^30 - 1]`.
        const UNSIGNED30 = 1 << 2;
        /// Integers in `[2^30, 2^31 - 1]`.
        const OTHER_UNSIGNED31 = 1 << 3;
        /// Integers in `[2^31, 2^32 - 1]`.
        const OTHER_UNSIGNED32 = 1 << 4;
        /// Every other number except -0 and NaN.
        const OTHER_NUMBER = 1 << 5;
        const MINUS_ZERO = 1 << 6;
        const NAN = 1 << 7;
        const BOOLEAN = 1 << 8;
        const NULL = 1 << 9;
        const UNDEFINED = 1 << 10;
        const HOLE = 1 << 11;
        const STRING = 1 << 12;
        const SYMBOL = 1 << 13;
        const SIGNED_BIGINT64 = 1 << 14;
        const OTHER_BIGINT = 1 << 15;
        const RECEIVER = 1 << 16;
        /// Engine-internal heap objects (maps, fixed arrays).
        const OTHER_INTERNAL = 1 << 17;
        /// Raw off-heap pointers.
        const EXTERNAL_POINTER = 1 << 18;

        const SIGNED31 = Self::NEGATIVE31.bits() | Self::UNSIGNED30.bits();
        const UNSIGNED31 = Self::UNSIGNED30.bits() | Self::OTHER_UNSIGNED31.bits();
        const SIGNED32 = Self::SIGNED31.bits()
            | Self::OTHER_UNSIGNED31.bits()
            | Self::OTHER_SIGNED32.bits();
        const UNSIGNED32 = Self::UNSIGNED31.bits() | Self::OTHER_UNSIGNED32.bits();
        const INTEGRAL32 = Self::SIGNED32.bits() | Self::UNSIGNED32.bits();
        const PLAIN_NUMBER = Self::INTEGRAL32.bits() | Self::OTHER_NUMBER.bits();
        const ORDERED_NUMBER = Self::PLAIN_NUMBER.bits() | Self::MINUS_ZERO.bits();
        const NUMBER = Self::ORDERED_NUMBER.bits() | Self::NAN.bits();
        const ODDBALL = Self::BOOLEAN.bits()
            | Self::NULL.bits()
            | Self::UNDEFINED.bits()
            | Self::HOLE.bits();
        const BIGINT = Self::SIGNED_BIGINT64.bits() | Self::OTHER_BIGINT.bits();
        const INTERNAL = Self::HOLE.bits()
            | Self::OTHER_INTERNAL.bits()
            | Self::EXTERNAL_POINTER.bits();
        const ANY = (1 << 19) - 1;
    }
}

/// Lower boundary of each number class, in ascending order.
const NUMBER_BOUNDARIES: [(TypeBits, f64); 7] = [
    (TypeBits::OTHER_NUMBER, f64::NEG_INFINITY),
    (TypeBits::OTHER_SIGNED32, -2147483648.0),
    (TypeBits::NEGATIVE31, -1073741824.0),
    (TypeBits::UNSIGNED30, 0.0),
    (TypeBits::OTHER_UNSIGNED31, 1073741824.0),
    (TypeBits::OTHER_UNSIGNED32, 2147483648.0),
    (TypeBits::OTHER_NUMBER, 4294967296.0),
];

/// Integer interval `[lo, hi]` of boundary class `i`.
#[inline]
fn boundary_interval(i: usize) -> (f64, f64) {
    let lo = NUMBER_BOUNDARIES[i].1;
    let hi = if i + 1 < NUMBER_BOUNDARIES.len() {
        NUMBER_BOUNDARIES[i + 1].1 - 1.0
    } else {
        f64::INFINITY
    };
    (lo, hi)
}

impl TypeBits {
    /// Smallest bitset containing every integer in `[min, max]`.
    pub fn lub_of_range(min: f64, max: f64) -> TypeBits {
        let mut bits = TypeBits::empty();
        for (i, (class, _)) in NUMBER_BOUNDARIES.iter().enumerate() {
            let (lo, hi) = boundary_interval(i);
            if lo <= max && min <= hi {
                bits |= *class;
            }
        }
        bits
    }

    /// Largest bitset whose values all lie in `[min, max]`.
    pub fn glb_of_range(min: f64, max: f64) -> TypeBits {
        let mut bits = TypeBits::empty();
        for (i, (class, _)) in NUMBER_BOUNDARIES.iter().enumerate() {
            if *class == TypeBits::OTHER_NUMBER {
                continue;
            }
            let (lo, hi) = boundary_interval(i);
            if min <= lo && hi <= max {
                bits |= *class;
            }
        }
        bits
    }

    /// Minimum of the numeric part, treating -0 as 0. `+inf` if none.
    fn number_min(self) -> f64 {
        let mut min = f64::INFINITY;
        for (class, lo) in NUMBER_BOUNDARIES {
            if self.contains(class) {
                min = lo;
                break;
            }
        }
        if self.contains(TypeBits::MINUS_ZERO) {
            min = min.min(0.0);
        }
        min
    }

    /// Maximum of the numeric part, treating -0 as 0. `-inf` if none.
    fn number_max(self) -> f64 {
        let mut max = f64::NEG_INFINITY;
        for i in (0..NUMBER_BOUNDARIES.len()).rev() {
            if self.contains(NUMBER_BOUNDARIES[i].0) {
                max = boundary_interval(i).1;
                break;
            }
        }
        if self.contains(TypeBits::MINUS_ZERO) {
            max = max.max(0.0);
        }
        max
    }

    /// Hull of the integral number classes, if any.
    fn integer_hull(self) -> Option<RangeType> {
        let ints = self & TypeBits::PLAIN_NUMBER;
        if ints.is_empty() {
            return None;
        }
        Some(RangeType {
            min: ints.number_min(),
            max: ints.number_max(),
        })
    }
}

// =============================================================================
// Range
// =============================================================================

/// An integer interval. Bounds may be infinite.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RangeType {
    pub min: f64,
    pub max: f64,
}

impl RangeType {
    #[inline]
    fn contains_range(&self, other: &RangeType) -> bool {
        self.min <= other.min && other.max <= self.max
    }

    #[inline]
    fn intersect(&self, other: &RangeType) -> Option<RangeType> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min <= max).then_some(RangeType { min, max })
    }

    #[inline]
    fn hull(&self, other: &RangeType) -> RangeType {
        RangeType {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

// =============================================================================
// Heap Constants
// =============================================================================

/// Roots of the heap that the collector always knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RootIndex {
    UndefinedValue,
    NullValue,
    TrueValue,
    FalseValue,
    TheHoleValue,
    EmptyString,
    EmptyFixedArray,
    FixedArrayMap,
    HeapNumberMap,
    /// Mutable root replaced at runtime.
    NumberStringCache,
}

impl RootIndex {
    /// Roots that never move and are never collected.
    #[inline]
    pub const fn is_immortal_immovable(self) -> bool {
        !matches!(self, RootIndex::NumberStringCache)
    }
}

/// Value class of a heap constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeapObjectClass {
    Boolean(bool),
    Null,
    Undefined,
    Hole,
    String,
    Symbol,
    BigInt,
    Receiver,
    Internal,
}

impl HeapObjectClass {
    /// Bitset class containing objects of this kind.
    pub const fn bits(self) -> TypeBits {
        match self {
            HeapObjectClass::Boolean(_) => TypeBits::BOOLEAN,
            HeapObjectClass::Null => TypeBits::NULL,
            HeapObjectClass::Undefined => TypeBits::UNDEFINED,
            HeapObjectClass::Hole => TypeBits::HOLE,
            HeapObjectClass::String => TypeBits::STRING,
            HeapObjectClass::Symbol => TypeBits::SYMBOL,
            HeapObjectClass::BigInt => TypeBits::OTHER_BIGINT,
            HeapObjectClass::Receiver => TypeBits::RECEIVER,
            HeapObjectClass::Internal => TypeBits::OTHER_INTERNAL,
        }
    }
}

/// A compile-time known heap object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HeapConstant {
    /// Identity of the object (handle index).
    pub id: u32,
    pub class: HeapObjectClass,
    /// Root table entry, if the object is a root.
    pub root: Option<RootIndex>,
}

impl HeapConstant {
    pub const TRUE: Self = Self::root(0, HeapObjectClass::Boolean(true), RootIndex::TrueValue);
    pub const FALSE: Self = Self::root(1, HeapObjectClass::Boolean(false), RootIndex::FalseValue);
    pub const NULL: Self = Self::root(2, HeapObjectClass::Null, RootIndex::NullValue);
    pub const UNDEFINED: Self =
        Self::root(3, HeapObjectClass::Undefined, RootIndex::UndefinedValue);
    pub const THE_HOLE: Self = Self::root(4, HeapObjectClass::Hole, RootIndex::TheHoleValue);
    pub const EMPTY_STRING: Self =
        Self::root(5, HeapObjectClass::String, RootIndex::EmptyString);
    pub const EMPTY_FIXED_ARRAY: Self =
        Self::root(6, HeapObjectClass::Internal, RootIndex::EmptyFixedArray);
    pub const FIXED_ARRAY_MAP: Self =
        Self::root(7, HeapObjectClass::Internal, RootIndex::FixedArrayMap);
    pub const HEAP_NUMBER_MAP: Self =
        Self::root(8, HeapObjectClass::Internal, RootIndex::HeapNumberMap);
    pub const NUMBER_STRING_CACHE: Self =
        Self::root(9, HeapObjectClass::Internal, RootIndex::NumberStringCache);

    /// First id available for non-root objects.
    pub const FIRST_USER_ID: u32 = 64;

    const fn root(id: u32, class: HeapObjectClass, root: RootIndex) -> Self {
        Self {
            id,
            class,
            root: Some(root),
        }
    }

    /// A non-root heap object.
    pub const fn object(id: u32, class: HeapObjectClass) -> Self {
        Self {
            id,
            class,
            root: None,
        }
    }

    /// Whether stores of this object may skip the write barrier.
    #[inline]
    pub fn is_immortal_immovable_root(&self) -> bool {
        self.root.is_some_and(RootIndex::is_immortal_immovable)
    }

    /// Boolean value, for `true`/`false` constants.
    #[inline]
    pub fn as_boolean(&self) -> Option<bool> {
        match self.class {
            HeapObjectClass::Boolean(v) => Some(v),
            _ => None,
        }
    }
}

// =============================================================================
// Type
// =============================================================================

/// A static type: bits ∪ range ∪ constant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Type {
    bits: TypeBits,
    range: Option<RangeType>,
    constant: Option<HeapConstant>,
}

macro_rules! bits_type {
    ($($name:ident = $bits:expr;)*) => {
        $(pub const $name: Type = Type::from_bits($bits);)*
    };
}

const fn range_type(min: f64, max: f64) -> Type {
    Type {
        bits: TypeBits::empty(),
        range: Some(RangeType { min, max }),
        constant: None,
    }
}

const fn range_with_bits(min: f64, max: f64, bits: TypeBits) -> Type {
    Type {
        bits,
        range: Some(RangeType { min, max }),
        constant: None,
    }
}

/// Largest integer `n` such that all integers up to `n` are doubles.
pub const MAX_SAFE_INTEGER: f64 = 9007199254740991.0;

impl Type {
    bits_type! {
        NONE = TypeBits::empty();
        ANY = TypeBits::ANY;
        SIGNED31 = TypeBits::SIGNED31;
        SIGNED_SMALL = TypeBits::SIGNED31;
        SIGNED32 = TypeBits::SIGNED32;
        SIGNED32_OR_MINUS_ZERO = TypeBits::SIGNED32.union(TypeBits::MINUS_ZERO);
        SIGNED32_OR_MINUS_ZERO_OR_NAN =
            TypeBits::SIGNED32.union(TypeBits::MINUS_ZERO).union(TypeBits::NAN);
        UNSIGNED31 = TypeBits::UNSIGNED31;
        UNSIGNED32 = TypeBits::UNSIGNED32;
        UNSIGNED32_OR_MINUS_ZERO = TypeBits::UNSIGNED32.union(TypeBits::MINUS_ZERO);
        UNSIGNED32_OR_MINUS_ZERO_OR_NAN =
            TypeBits::UNSIGNED32.union(TypeBits::MINUS_ZERO).union(TypeBits::NAN);
        INTEGRAL32 = TypeBits::INTEGRAL32;
        INTEGRAL32_OR_MINUS_ZERO = TypeBits::INTEGRAL32.union(TypeBits::MINUS_ZERO);
        INTEGRAL32_OR_MINUS_ZERO_OR_NAN =
            TypeBits::INTEGRAL32.union(TypeBits::MINUS_ZERO).union(TypeBits::NAN);
        PLAIN_NUMBER = TypeBits::PLAIN_NUMBER;
        ORDERED_NUMBER = TypeBits::ORDERED_NUMBER;
        NUMBER = TypeBits::NUMBER;
        MINUS_ZERO = TypeBits::MINUS_ZERO;
        NAN = TypeBits::NAN;
        MINUS_ZERO_OR_NAN = TypeBits::MINUS_ZERO.union(TypeBits::NAN);
        BOOLEAN = TypeBits::BOOLEAN;
        NULL = TypeBits::NULL;
        UNDEFINED = TypeBits::UNDEFINED;
        HOLE = TypeBits::HOLE;
        NULL_OR_UNDEFINED = TypeBits::NULL.union(TypeBits::UNDEFINED);
        BOOLEAN_OR_NULL_OR_UNDEFINED =
            TypeBits::BOOLEAN.union(TypeBits::NULL).union(TypeBits::UNDEFINED);
        BOOLEAN_OR_NULL_OR_NUMBER =
            TypeBits::BOOLEAN.union(TypeBits::NULL).union(TypeBits::NUMBER);
        ODDBALL = TypeBits::ODDBALL;
        NUMBER_OR_ODDBALL = TypeBits::NUMBER.union(TypeBits::ODDBALL);
        NUMBER_OR_BOOLEAN = TypeBits::NUMBER.union(TypeBits::BOOLEAN);
        NUMBER_OR_HOLE = TypeBits::NUMBER.union(TypeBits::HOLE);
        STRING = TypeBits::STRING;
        SYMBOL = TypeBits::SYMBOL;
        RECEIVER = TypeBits::RECEIVER;
        BIGINT = TypeBits::BIGINT;
        SIGNED_BIGINT64 = TypeBits::SIGNED_BIGINT64;
        INTERNAL = TypeBits::INTERNAL;
        EXTERNAL_POINTER = TypeBits::EXTERNAL_POINTER;
    }

    /// All integers, including the non-32-bit ones.
    pub const INTEGER: Type = range_type(f64::NEG_INFINITY, f64::INFINITY);
    pub const INTEGER_OR_MINUS_ZERO: Type =
        range_with_bits(f64::NEG_INFINITY, f64::INFINITY, TypeBits::MINUS_ZERO);
    pub const INTEGER_OR_MINUS_ZERO_OR_NAN: Type = range_with_bits(
        f64::NEG_INFINITY,
        f64::INFINITY,
        TypeBits::MINUS_ZERO.union(TypeBits::NAN),
    );
    pub const SAFE_INTEGER: Type = range_type(-MAX_SAFE_INTEGER, MAX_SAFE_INTEGER);
    pub const SAFE_INTEGER_OR_MINUS_ZERO: Type =
        range_with_bits(-MAX_SAFE_INTEGER, MAX_SAFE_INTEGER, TypeBits::MINUS_ZERO);
    pub const POSITIVE_SAFE_INTEGER: Type = range_type(0.0, MAX_SAFE_INTEGER);
    /// Integers whose sum or difference is still exact in a double.
    pub const ADDITIVE_SAFE_INTEGER: Type = range_type(-4503599627370496.0, 4503599627370496.0);
    pub const ADDITIVE_SAFE_INTEGER_OR_MINUS_ZERO: Type = range_with_bits(
        -4503599627370496.0,
        4503599627370496.0,
        TypeBits::MINUS_ZERO,
    );
    pub const SINGLETON_ZERO: Type = range_type(0.0, 0.0);
    pub const SINGLETON_ONE: Type = range_type(1.0, 1.0);
    pub const ZEROISH: Type = range_with_bits(
        0.0,
        0.0,
        TypeBits::MINUS_ZERO.union(TypeBits::NAN),
    );
    pub const UINT8: Type = range_type(0.0, 255.0);
    pub const INT8: Type = range_type(-128.0, 127.0);
    pub const UINT16: Type = range_type(0.0, 65535.0);
    pub const INT16: Type = range_type(-32768.0, 32767.0);
    pub const FLOAT32: Type = Type::from_bits(TypeBits::NUMBER);
    /// Valid shift counts.
    pub const SHIFT_COUNT: Type = range_type(0.0, 31.0);

    /// Type from bits only.
    #[inline]
    pub const fn from_bits(bits: TypeBits) -> Self {
        Type {
            bits,
            range: None,
            constant: None,
        }
    }

    /// Integer range `[min, max]`.
    pub fn range(min: f64, max: f64) -> Self {
        debug_assert!(min <= max, "empty range [{min}, {max}]");
        Type {
            bits: TypeBits::empty(),
            range: Some(RangeType { min, max }),
            constant: None,
        }
        .normalize()
    }

    /// Singleton type of a number constant.
    pub fn constant(value: f64) -> Self {
        if value.is_nan() {
            Type::NAN
        } else if value == 0.0 && value.is_sign_negative() {
            Type::MINUS_ZERO
        } else if value.is_finite() && value.fract() == 0.0 {
            Type::range(value, value)
        } else {
            Type::from_bits(TypeBits::OTHER_NUMBER)
        }
    }

    /// Singleton type of a heap constant.
    pub const fn heap_constant(constant: HeapConstant) -> Self {
        Type {
            bits: TypeBits::empty(),
            range: None,
            constant: Some(constant),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn bits(&self) -> TypeBits {
        self.bits
    }

    /// Range part, if any.
    #[inline]
    pub fn get_range(&self) -> Option<RangeType> {
        self.range
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.bits.is_empty() && self.range.is_none() && self.constant.is_none()
    }

    #[inline]
    pub fn is_heap_constant(&self) -> bool {
        self.bits.is_empty() && self.range.is_none() && self.constant.is_some()
    }

    #[inline]
    pub fn as_heap_constant(&self) -> Option<HeapConstant> {
        if self.is_heap_constant() { self.constant } else { None }
    }

    /// Smallest bitset containing this type.
    pub fn lub_bits(&self) -> TypeBits {
        let mut bits = self.bits;
        if let Some(r) = self.range {
            bits |= TypeBits::lub_of_range(r.min, r.max);
        }
        if let Some(c) = self.constant {
            bits |= c.class.bits();
        }
        bits
    }

    /// Minimum of the numeric part (`-0` counts as `0`).
    pub fn min(&self) -> f64 {
        let from_range = self.range.map_or(f64::INFINITY, |r| r.min);
        from_range.min(self.bits.number_min())
    }

    /// Maximum of the numeric part (`-0` counts as `0`).
    pub fn max(&self) -> f64 {
        let from_range = self.range.map_or(f64::NEG_INFINITY, |r| r.max);
        from_range.max(self.bits.number_max())
    }

    // =========================================================================
    // Lattice Operations
    // =========================================================================

    /// Subtyping: every value of `self` is a value of `other`.
    pub fn is(&self, other: Type) -> bool {
        let cover = other.bits
            | other
                .range
                .map_or(TypeBits::empty(), |r| TypeBits::glb_of_range(r.min, r.max));
        if !cover.contains(self.bits) {
            return false;
        }
        if let Some(r) = self.range {
            let in_range = other.range.is_some_and(|o| o.contains_range(&r));
            if !in_range && !other.bits.contains(TypeBits::lub_of_range(r.min, r.max)) {
                return false;
            }
        }
        if let Some(c) = self.constant {
            if other.constant != Some(c) && !other.bits.contains(c.class.bits()) {
                return false;
            }
        }
        true
    }

    /// Whether the two types may share a value.
    #[inline]
    pub fn maybe(&self, other: Type) -> bool {
        !Type::intersect(*self, other).is_none()
    }

    /// Least upper bound.
    pub fn union(a: Type, b: Type) -> Type {
        let mut bits = a.bits | b.bits;
        let range = match (a.range, b.range) {
            (Some(x), Some(y)) => Some(x.hull(&y)),
            (x, None) => x,
            (None, y) => y,
        };
        let constant = match (a.constant, b.constant) {
            (Some(x), Some(y)) if x == y => Some(x),
            (Some(x), Some(y)) => {
                bits |= x.class.bits() | y.class.bits();
                None
            }
            (x, None) => x,
            (None, y) => y,
        };
        Type {
            bits,
            range,
            constant,
        }
        .normalize()
    }

    /// Greatest lower bound (over-approximated).
    pub fn intersect(a: Type, b: Type) -> Type {
        let bits = a.bits & b.bits;

        let mut range: Option<RangeType> = None;
        let mut add = |r: Option<RangeType>| {
            if let Some(r) = r {
                range = Some(range.map_or(r, |acc| acc.hull(&r)));
            }
        };
        if let (Some(x), Some(y)) = (a.range, b.range) {
            add(x.intersect(&y));
        }
        if let (Some(x), Some(hull)) = (a.range, b.bits.integer_hull()) {
            add(x.intersect(&hull));
        }
        if let (Some(y), Some(hull)) = (b.range, a.bits.integer_hull()) {
            add(y.intersect(&hull));
        }

        let keeps = |c: HeapConstant, other: &Type| {
            other.constant == Some(c) || other.bits.contains(c.class.bits())
        };
        let constant = match (a.constant, b.constant) {
            (Some(x), _) if keeps(x, &b) => Some(x),
            (_, Some(y)) if keeps(y, &a) => Some(y),
            _ => None,
        };

        Type {
            bits,
            range,
            constant,
        }
        .normalize()
    }

    /// Drop parts already covered by the bitset.
    fn normalize(mut self) -> Type {
        if let Some(r) = self.range {
            if r.min > r.max || self.bits.contains(TypeBits::lub_of_range(r.min, r.max)) {
                self.range = None;
            }
        }
        if let Some(c) = self.constant {
            if self.bits.contains(c.class.bits()) {
                self.constant = None;
            }
        }
        self
    }
}

impl Default for Type {
    fn default() -> Self {
        Type::ANY
    }
}

// =============================================================================
// Display
// =============================================================================

/// Named bit groups, largest first, for printing.
const BIT_NAMES: &[(TypeBits, &str)] = &[
    (TypeBits::ANY, "Any"),
    (TypeBits::NUMBER, "Number"),
    (TypeBits::ORDERED_NUMBER, "OrderedNumber"),
    (TypeBits::PLAIN_NUMBER, "PlainNumber"),
    (TypeBits::INTEGRAL32, "Integral32"),
    (TypeBits::SIGNED32, "Signed32"),
    (TypeBits::UNSIGNED32, "Unsigned32"),
    (TypeBits::UNSIGNED31, "Unsigned31"),
    (TypeBits::SIGNED31, "Signed31"),
    (TypeBits::NEGATIVE31, "Negative31"),
    (TypeBits::OTHER_SIGNED32, "OtherSigned32"),
    (TypeBits::UNSIGNED30, "Unsigned30"),
    (TypeBits::OTHER_UNSIGNED31, "OtherUnsigned31"),
    (TypeBits::OTHER_UNSIGNED32, "OtherUnsigned32"),
    (TypeBits::OTHER_NUMBER, "OtherNumber"),
    (TypeBits::MINUS_ZERO, "MinusZero"),
    (TypeBits::NAN, "NaN"),
    (TypeBits::ODDBALL, "Oddball"),
    (TypeBits::BOOLEAN, "Boolean"),
    (TypeBits::NULL, "Null"),
    (TypeBits::UNDEFINED, "Undefined"),
    (TypeBits::HOLE, "Hole"),
    (TypeBits::STRING, "String"),
    (TypeBits::SYMBOL, "Symbol"),
    (TypeBits::BIGINT, "BigInt"),
    (TypeBits::SIGNED_BIGINT64, "SignedBigInt64"),
    (TypeBits::OTHER_BIGINT, "OtherBigInt"),
    (TypeBits::RECEIVER, "Receiver"),
    (TypeBits::OTHER_INTERNAL, "OtherInternal"),
    (TypeBits::EXTERNAL_POINTER, "ExternalPointer"),
];

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return write!(f, "None");
        }
        let mut parts: Vec<String> = Vec::new();
        let mut rest = self.bits;
        for (bits, name) in BIT_NAMES {
            if !rest.is_empty() && rest.contains(*bits) {
                parts.push((*name).to_string());
                rest.remove(*bits);
            }
        }
        if let Some(r) = self.range {
            parts.push(format!("Range({}, {})", r.min, r.max));
        }
        if let Some(c) = self.constant {
            parts.push(format!("HeapConstant({}:{:?})", c.id, c.class));
        }
        if parts.len() == 1 {
            write!(f, "{}", parts[0])
        } else {
            write!(f, "({})", parts.join(" | "))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_lub_and_glb() {
        assert_eq!(TypeBits::lub_of_range(0.0, 10.0), TypeBits::UNSIGNED30);
        assert_eq!(
            TypeBits::lub_of_range(-1.0, 1.0),
            TypeBits::NEGATIVE31 | TypeBits::UNSIGNED30
        );
        assert_eq!(
            TypeBits::glb_of_range(-2147483648.0, 2147483647.0),
            TypeBits::SIGNED32
        );
        assert!(TypeBits::glb_of_range(0.0, 10.0).is_empty());
    }

    #[test]
    fn test_range_is_bits() {
        let r = Type::range(0.0, 1000000.0);
        assert!(r.is(Type::UNSIGNED31));
        assert!(r.is(Type::SIGNED32));
        assert!(!r.is(Type::range(0.0, 10.0)));
        assert!(Type::range(0.0, 10.0).is(r));
        assert!(Type::SIGNED32.is(Type::INTEGER));
        assert!(!Type::NUMBER.is(Type::INTEGER));
    }

    #[test]
    fn test_reflexive() {
        for ty in [
            Type::NONE,
            Type::ANY,
            Type::range(-5.0, 5.0),
            Type::heap_constant(HeapConstant::TRUE),
            Type::union(Type::range(0.0, 3.0), Type::NAN),
            Type::INTEGER,
        ] {
            assert!(ty.is(ty), "{} is not itself", ty);
        }
    }

    #[test]
    fn test_union_normalizes() {
        let u = Type::union(Type::range(0.0, 5.0), Type::SIGNED32);
        assert_eq!(u, Type::SIGNED32);
        let u = Type::union(Type::range(0.0, 5.0), Type::range(10.0, 20.0));
        assert_eq!(u.get_range(), Some(RangeType { min: 0.0, max: 20.0 }));
    }

    #[test]
    fn test_intersect_range_with_bits() {
        let r = Type::intersect(Type::range(0.0, 4294967296.0), Type::SIGNED32);
        assert_eq!(r.min(), 0.0);
        assert_eq!(r.max(), 2147483647.0);
        assert!(Type::intersect(Type::range(0.0, 10.0), Type::STRING).is_none());
        assert!(!Type::STRING.maybe(Type::NUMBER));
        assert!(Type::NUMBER.maybe(Type::range(3.0, 3.0)));
    }

    #[test]
    fn test_min_max() {
        assert_eq!(Type::UNSIGNED32.min(), 0.0);
        assert_eq!(Type::UNSIGNED32.max(), 4294967295.0);
        assert_eq!(Type::SIGNED32.min(), -2147483648.0);
        assert_eq!(Type::MINUS_ZERO.min(), 0.0);
        assert_eq!(Type::NUMBER.max(), f64::INFINITY);
    }

    #[test]
    fn test_number_constants() {
        assert_eq!(Type::constant(5.0), Type::range(5.0, 5.0));
        assert_eq!(Type::constant(-0.0), Type::MINUS_ZERO);
        assert_eq!(Type::constant(f64::NAN), Type::NAN);
        assert!(Type::constant(1.5).is(Type::PLAIN_NUMBER));
        assert!(!Type::constant(1.5).is(Type::INTEGER));
        assert!(Type::constant(5.0).is(Type::SIGNED_SMALL));
    }

    #[test]
    fn test_heap_constants() {
        let t = Type::heap_constant(HeapConstant::TRUE);
        assert!(t.is(Type::BOOLEAN));
        assert!(t.is(Type::BOOLEAN_OR_NULL_OR_UNDEFINED));
        assert!(!t.is(Type::NUMBER));
        assert!(HeapConstant::TRUE.is_immortal_immovable_root());
        assert!(!HeapConstant::NUMBER_STRING_CACHE.is_immortal_immovable_root());
        let both = Type::union(t, Type::heap_constant(HeapConstant::FALSE));
        assert_eq!(both, Type::BOOLEAN);
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::SIGNED32.to_string(), "Signed32");
        assert_eq!(Type::range(0.0, 10.0).to_string(), "Range(0, 10)");
        assert_eq!(Type::NONE.to_string(), "None");
        assert_eq!(
            Type::union(Type::BOOLEAN, Type::NAN).to_string(),
            "(NaN | Boolean)"
        );
    }
}
