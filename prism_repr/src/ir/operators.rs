//! Operator catalogue.
//!
//! Operators fall into four layers:
//! - **Common**: control flow, constants, phis, frame states, sentinels
//! - **Simplified**: number arithmetic, speculative arithmetic, memory
//!   accesses, checks and calls, as produced by graph building
//! - **Machine**: representation-concrete arithmetic produced by lowering
//! - **Conversions**: representation changes, optionally checked
//!
//! Every operator fixes the layout of its inputs by category (see
//! [`InputShape`]): value inputs first, then context, frame state, effect
//! and control.

use std::fmt;

use super::linkage::{CallDescriptorId, FastApiCallId};
use super::types::{HeapConstant, Type};
use crate::repr::{CheckForMinusZeroMode, MachineRepresentation, MachineType};

// =============================================================================
// Input Shape
// =============================================================================

/// Number of inputs in each edge category, in input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputShape {
    pub value: usize,
    pub context: usize,
    pub frame_state: usize,
    pub effect: usize,
    pub control: usize,
}

impl InputShape {
    const fn new(value: usize, effect: usize, control: usize) -> Self {
        Self {
            value,
            context: 0,
            frame_state: 0,
            effect,
            control,
        }
    }

    #[inline]
    pub const fn first_context(&self) -> usize {
        self.value
    }

    #[inline]
    pub const fn first_frame_state(&self) -> usize {
        self.value + self.context
    }

    #[inline]
    pub const fn first_effect(&self) -> usize {
        self.first_frame_state() + self.frame_state
    }

    #[inline]
    pub const fn first_control(&self) -> usize {
        self.first_effect() + self.effect
    }

    #[inline]
    pub const fn total(&self) -> usize {
        self.first_control() + self.control
    }
}

// =============================================================================
// Deoptimization Reasons
// =============================================================================

/// Why a speculative guard bails out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeoptimizeReason {
    #[default]
    Unknown,
    Overflow,
    LostPrecision,
    LostPrecisionOrNaN,
    MinusZero,
    DivisionByZero,
    NotASmi,
    Smi,
    NotAHeapNumber,
    NotANumber,
    NotANumberOrBoolean,
    NotANumberOrOddball,
    NotAString,
    NotASymbol,
    NotAJavaScriptObject,
    NotABigInt,
    NotABigInt64,
    NotAnArrayIndex,
    WrongMap,
    OutOfBounds,
}

// =============================================================================
// Number Operators
// =============================================================================

/// Pure operations on numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    ShiftLeft,
    ShiftRight,
    ShiftRightLogical,
    Imul,
    Equal,
    LessThan,
    LessThanOrEqual,
    Max,
    Min,
    Abs,
    Ceil,
    Floor,
    Round,
    Trunc,
    Sign,
    SilenceNaN,
    ToInt32,
    ToUint32,
    ToBoolean,
}

impl NumberOp {
    pub const fn arity(self) -> usize {
        match self {
            NumberOp::Abs
            | NumberOp::Ceil
            | NumberOp::Floor
            | NumberOp::Round
            | NumberOp::Trunc
            | NumberOp::Sign
            | NumberOp::SilenceNaN
            | NumberOp::ToInt32
            | NumberOp::ToUint32
            | NumberOp::ToBoolean => 1,
            _ => 2,
        }
    }

    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            NumberOp::Equal | NumberOp::LessThan | NumberOp::LessThanOrEqual
        )
    }
}

/// Operations that speculate on their input types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeculativeOp {
    NumberAdd,
    NumberSubtract,
    NumberMultiply,
    NumberDivide,
    NumberModulus,
    SafeIntegerAdd,
    SafeIntegerSubtract,
    NumberBitwiseAnd,
    NumberBitwiseOr,
    NumberBitwiseXor,
    NumberShiftLeft,
    NumberShiftRight,
    NumberShiftRightLogical,
    NumberEqual,
    NumberLessThan,
    NumberLessThanOrEqual,
    ToNumber,
}

impl SpeculativeOp {
    pub const fn arity(self) -> usize {
        match self {
            SpeculativeOp::ToNumber => 1,
            _ => 2,
        }
    }

    /// Pure counterpart, used once speculation is unnecessary.
    pub const fn number_op(self) -> Option<NumberOp> {
        Some(match self {
            SpeculativeOp::NumberAdd | SpeculativeOp::SafeIntegerAdd => NumberOp::Add,
            SpeculativeOp::NumberSubtract | SpeculativeOp::SafeIntegerSubtract => {
                NumberOp::Subtract
            }
            SpeculativeOp::NumberMultiply => NumberOp::Multiply,
            SpeculativeOp::NumberDivide => NumberOp::Divide,
            SpeculativeOp::NumberModulus => NumberOp::Modulus,
            SpeculativeOp::NumberBitwiseAnd => NumberOp::BitwiseAnd,
            SpeculativeOp::NumberBitwiseOr => NumberOp::BitwiseOr,
            SpeculativeOp::NumberBitwiseXor => NumberOp::BitwiseXor,
            SpeculativeOp::NumberShiftLeft => NumberOp::ShiftLeft,
            SpeculativeOp::NumberShiftRight => NumberOp::ShiftRight,
            SpeculativeOp::NumberShiftRightLogical => NumberOp::ShiftRightLogical,
            SpeculativeOp::NumberEqual => NumberOp::Equal,
            SpeculativeOp::NumberLessThan => NumberOp::LessThan,
            SpeculativeOp::NumberLessThanOrEqual => NumberOp::LessThanOrEqual,
            SpeculativeOp::ToNumber => return None,
        })
    }
}

/// Runtime type feedback attached to a speculative operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberOperationHint {
    /// Inputs and output were small integers.
    SignedSmall,
    /// Inputs were small integers; the output may not be.
    SignedSmallInputs,
    Signed32,
    Number,
    NumberOrBoolean,
    NumberOrOddball,
}

// =============================================================================
// Memory Access Descriptors
// =============================================================================

/// Whether the base of an access is a tagged heap pointer or a raw address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseTaggedness {
    TaggedBase,
    UntaggedBase,
}

/// Write barrier required by a store. Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WriteBarrierKind {
    NoWriteBarrier,
    PointerWriteBarrier,
    MapWriteBarrier,
    FullWriteBarrier,
}

/// Offset of the map word in every heap object.
pub const MAP_OFFSET: u32 = 0;

/// A field of a heap object or raw structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldAccess {
    pub base_is_tagged: BaseTaggedness,
    pub offset: u32,
    /// Static type of the field contents.
    pub ty: Type,
    pub machine_type: MachineType,
    pub write_barrier: WriteBarrierKind,
}

impl FieldAccess {
    /// A tagged field of a heap object with a full barrier.
    pub fn tagged(offset: u32, ty: Type) -> Self {
        Self {
            base_is_tagged: BaseTaggedness::TaggedBase,
            offset,
            ty,
            machine_type: MachineType::any_tagged(),
            write_barrier: WriteBarrierKind::FullWriteBarrier,
        }
    }

    /// The map word of a heap object.
    pub fn map() -> Self {
        Self {
            base_is_tagged: BaseTaggedness::TaggedBase,
            offset: MAP_OFFSET,
            ty: Type::INTERNAL,
            machine_type: MachineType::tagged_pointer(),
            write_barrier: WriteBarrierKind::MapWriteBarrier,
        }
    }
}

/// An element of a heap array or raw buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementAccess {
    pub base_is_tagged: BaseTaggedness,
    pub header_size: u32,
    pub ty: Type,
    pub machine_type: MachineType,
    pub write_barrier: WriteBarrierKind,
}

impl ElementAccess {
    /// Tagged elements of a fixed array.
    pub fn fixed_array(ty: Type) -> Self {
        Self {
            base_is_tagged: BaseTaggedness::TaggedBase,
            header_size: 16,
            ty,
            machine_type: MachineType::any_tagged(),
            write_barrier: WriteBarrierKind::FullWriteBarrier,
        }
    }

    /// Unboxed double elements.
    pub fn fixed_double_array() -> Self {
        Self {
            base_is_tagged: BaseTaggedness::TaggedBase,
            header_size: 16,
            ty: Type::NUMBER,
            machine_type: MachineType::float64(),
            write_barrier: WriteBarrierKind::NoWriteBarrier,
        }
    }
}

/// Element kind of a typed array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalArrayType {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    BigInt64,
    BigUint64,
}

impl ExternalArrayType {
    pub const fn machine_type(self) -> MachineType {
        match self {
            ExternalArrayType::Int8 => MachineType::int8(),
            ExternalArrayType::Uint8 | ExternalArrayType::Uint8Clamped => MachineType::uint8(),
            ExternalArrayType::Int16 => MachineType::int16(),
            ExternalArrayType::Uint16 => MachineType::uint16(),
            ExternalArrayType::Int32 => MachineType::int32(),
            ExternalArrayType::Uint32 => MachineType::uint32(),
            ExternalArrayType::Float32 => MachineType::float32(),
            ExternalArrayType::Float64 => MachineType::float64(),
            ExternalArrayType::BigInt64 => MachineType::int64(),
            ExternalArrayType::BigUint64 => MachineType::uint64(),
        }
    }
}

// =============================================================================
// Checks
// =============================================================================

bitflags::bitflags! {
    /// Options of a bounds check.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CheckBoundsFlags: u8 {
        /// Index may be a string or -0 and is converted first.
        const CONVERT_STRING_AND_MINUS_ZERO = 1 << 0;
        /// Index may exceed the 32-bit range.
        const ALLOW_LARGE_INTEGER = 1 << 1;
        /// Out-of-bounds cannot happen; abort instead of deoptimizing.
        const ABORT_ON_OUT_OF_BOUNDS = 1 << 2;
    }
}

/// Simplified guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckOp {
    HeapObject,
    Smi,
    Number,
    String,
    Receiver,
    Symbol,
    Maps,
    /// Deoptimize unless the condition holds.
    If(DeoptimizeReason),
    /// `index < length`, unsigned.
    Bounds(CheckBoundsFlags),
}

impl CheckOp {
    pub const fn deopt_reason(self) -> DeoptimizeReason {
        match self {
            CheckOp::HeapObject => DeoptimizeReason::Smi,
            CheckOp::Smi => DeoptimizeReason::NotASmi,
            CheckOp::Number => DeoptimizeReason::NotANumber,
            CheckOp::String => DeoptimizeReason::NotAString,
            CheckOp::Receiver => DeoptimizeReason::NotAJavaScriptObject,
            CheckOp::Symbol => DeoptimizeReason::NotASymbol,
            CheckOp::Maps => DeoptimizeReason::WrongMap,
            CheckOp::If(reason) => reason,
            CheckOp::Bounds(_) => DeoptimizeReason::OutOfBounds,
        }
    }

    /// Whether the check produces its (refined) input as a value.
    pub const fn has_value_output(self) -> bool {
        !matches!(self, CheckOp::Maps | CheckOp::If(_))
    }
}

// =============================================================================
// Machine Operators
// =============================================================================

/// Representation-concrete pure operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineOp {
    Word32And,
    Word32Or,
    Word32Xor,
    Word32Shl,
    Word32Sar,
    Word32Shr,
    Word32Equal,
    Int32Add,
    Int32Sub,
    Int32Mul,
    Int32Div,
    Int32Mod,
    Uint32Div,
    Uint32Mod,
    Int32LessThan,
    Int32LessThanOrEqual,
    Uint32LessThan,
    Uint32LessThanOrEqual,
    Int64Add,
    Int64Sub,
    Int64Mul,
    Int64LessThan,
    Int64LessThanOrEqual,
    Word64Equal,
    Float64Add,
    Float64Sub,
    Float64Mul,
    Float64Div,
    Float64Mod,
    Float64Abs,
    Float64Max,
    Float64Min,
    Float64Equal,
    Float64LessThan,
    Float64LessThanOrEqual,
    Float64RoundUp,
    Float64RoundDown,
    Float64RoundTruncate,
    /// JavaScript `Math.round`.
    Float64Round,
    Float64SilenceNaN,
    /// Compare two tagged words for identity.
    TaggedEqual,
}

impl MachineOp {
    pub const fn arity(self) -> usize {
        match self {
            MachineOp::Float64Abs
            | MachineOp::Float64RoundUp
            | MachineOp::Float64RoundDown
            | MachineOp::Float64RoundTruncate
            | MachineOp::Float64Round
            | MachineOp::Float64SilenceNaN => 1,
            _ => 2,
        }
    }
}

/// Overflow- or precision-checked arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckedOp {
    Int32Add,
    Int32Sub,
    Int32Mul(CheckForMinusZeroMode),
    Int32Div,
    Int32Mod,
    Uint32Div,
    Uint32Mod,
    Int64Add,
    Int64Sub,
    Uint32Bounds(CheckBoundsFlags),
    Uint64Bounds(CheckBoundsFlags),
}

impl CheckedOp {
    pub const fn deopt_reason(self) -> DeoptimizeReason {
        match self {
            CheckedOp::Int32Add
            | CheckedOp::Int32Sub
            | CheckedOp::Int32Mul(_)
            | CheckedOp::Int64Add
            | CheckedOp::Int64Sub => DeoptimizeReason::Overflow,
            CheckedOp::Int32Div | CheckedOp::Uint32Div => DeoptimizeReason::LostPrecision,
            CheckedOp::Int32Mod | CheckedOp::Uint32Mod => DeoptimizeReason::DivisionByZero,
            CheckedOp::Uint32Bounds(_) | CheckedOp::Uint64Bounds(_) => {
                DeoptimizeReason::OutOfBounds
            }
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

/// Input classes accepted by checked tagged-to-number conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckTaggedInputMode {
    Number,
    NumberOrBoolean,
    NumberOrOddball,
}

/// Representation changes. `Checked*` variants may deoptimize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionOp {
    // Tagged to untagged.
    ChangeTaggedSignedToInt32,
    ChangeTaggedSignedToInt64,
    ChangeTaggedToInt32,
    ChangeTaggedToUint32,
    ChangeTaggedToInt64,
    ChangeTaggedToFloat64,
    ChangeTaggedToBit,
    ChangeTaggedToTaggedSigned,
    TruncateTaggedToWord32,
    TruncateTaggedToFloat64,
    TruncateTaggedToBit,
    TruncateTaggedPointerToBit,
    TruncateBigIntToWord64,
    // Untagged to tagged.
    ChangeInt31ToTaggedSigned,
    ChangeInt32ToTagged,
    ChangeUint32ToTagged,
    ChangeInt64ToTagged,
    ChangeUint64ToTagged,
    ChangeFloat64ToTagged(CheckForMinusZeroMode),
    ChangeFloat64ToTaggedPointer,
    ChangeBitToTagged,
    // Between untagged representations.
    ChangeInt32ToFloat64,
    ChangeUint32ToFloat64,
    ChangeInt64ToFloat64,
    ChangeFloat32ToFloat64,
    TruncateFloat64ToFloat32,
    ChangeFloat64ToInt32,
    ChangeFloat64ToUint32,
    ChangeFloat64ToInt64,
    TruncateFloat64ToWord32,
    ChangeInt32ToInt64,
    ChangeUint32ToUint64,
    TruncateInt64ToInt32,
    TruncateWord32ToBit,
    TruncateWord64ToBit,
    TruncateFloat64ToBit,
    // Checked.
    CheckedInt32ToTaggedSigned,
    CheckedUint32ToTaggedSigned,
    CheckedInt64ToTaggedSigned,
    CheckedUint64ToTaggedSigned,
    CheckedTaggedToTaggedSigned,
    CheckedTaggedToTaggedPointer,
    CheckedTaggedSignedToInt32,
    CheckedTaggedToInt32(CheckForMinusZeroMode),
    CheckedTaggedToInt64(CheckForMinusZeroMode),
    CheckedTaggedToFloat64(CheckTaggedInputMode),
    CheckedTruncateTaggedToWord32(CheckTaggedInputMode),
    CheckedFloat64ToInt32(CheckForMinusZeroMode),
    CheckedFloat64ToInt64(CheckForMinusZeroMode),
    CheckedUint32ToInt32,
    CheckedInt64ToInt32,
    CheckedUint64ToInt32,
    CheckedUint64ToInt64,
    CheckedTaggedToArrayIndex,
    CheckedTaggedToBigInt,
    CheckedBigIntToBigInt64,
}

impl ConversionOp {
    /// Deoptimization reason of a checked conversion, `None` if unchecked.
    pub const fn deopt_reason(self) -> Option<DeoptimizeReason> {
        use ConversionOp::*;
        Some(match self {
            CheckedInt32ToTaggedSigned
            | CheckedUint32ToTaggedSigned
            | CheckedInt64ToTaggedSigned
            | CheckedUint64ToTaggedSigned
            | CheckedUint32ToInt32
            | CheckedInt64ToInt32
            | CheckedUint64ToInt32
            | CheckedUint64ToInt64 => DeoptimizeReason::LostPrecision,
            CheckedTaggedToTaggedSigned | CheckedTaggedSignedToInt32 => DeoptimizeReason::NotASmi,
            CheckedTaggedToTaggedPointer => DeoptimizeReason::Smi,
            CheckedTaggedToInt32(_) | CheckedTaggedToInt64(_) => DeoptimizeReason::NotAHeapNumber,
            CheckedTaggedToFloat64(CheckTaggedInputMode::Number) => {
                DeoptimizeReason::NotAHeapNumber
            }
            CheckedTaggedToFloat64(CheckTaggedInputMode::NumberOrBoolean) => {
                DeoptimizeReason::NotANumberOrBoolean
            }
            CheckedTaggedToFloat64(CheckTaggedInputMode::NumberOrOddball)
            | CheckedTruncateTaggedToWord32(CheckTaggedInputMode::NumberOrOddball) => {
                DeoptimizeReason::NotANumberOrOddball
            }
            CheckedTruncateTaggedToWord32(_) => DeoptimizeReason::NotANumber,
            CheckedFloat64ToInt32(_) | CheckedFloat64ToInt64(_) => {
                DeoptimizeReason::LostPrecisionOrNaN
            }
            CheckedTaggedToArrayIndex => DeoptimizeReason::NotAnArrayIndex,
            CheckedTaggedToBigInt => DeoptimizeReason::NotABigInt,
            CheckedBigIntToBigInt64 => DeoptimizeReason::NotABigInt64,
            _ => return None,
        })
    }

    #[inline]
    pub const fn is_checked(self) -> bool {
        self.deopt_reason().is_some()
    }
}

// =============================================================================
// Operator (Unified)
// =============================================================================

/// Identifies a list of machine types in the graph's type-list table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeListId(pub u32);

/// Unified operator representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operator {
    // Control
    Start,
    End,
    Merge,
    Loop,
    Branch,
    IfTrue,
    IfFalse,
    /// Inputs: values, effect, control.
    Return,
    Terminate,

    // Leaves
    Parameter(u16),
    Int32Constant(i32),
    Int64Constant(i64),
    /// Stored as bits.
    Float32Constant(u32),
    /// Stored as bits.
    Float64Constant(u64),
    /// A tagged number constant, stored as bits.
    NumberConstant(u64),
    HeapConstant(HeapConstant),

    // Merges
    Phi(MachineRepresentation),
    EffectPhi,
    /// Inputs: condition, true value, false value.
    Select(MachineRepresentation),

    // Frame states
    /// Inputs: frame state, effect, control.
    Checkpoint,
    /// Inputs: parameters, locals, accumulator, context, closure, outer.
    FrameState,
    StateValues,
    TypedStateValues(TypeListId),

    // Sentinels
    TypeGuard,
    Dead,
    DeadValue(MachineRepresentation),
    Unreachable,

    // Simplified
    Number(NumberOp),
    Speculative(SpeculativeOp, NumberOperationHint),
    BooleanNot,
    ReferenceEqual,
    LoadField(FieldAccess),
    StoreField(FieldAccess),
    LoadElement(ElementAccess),
    StoreElement(ElementAccess),
    /// Inputs: buffer, base, external pointer, index.
    LoadTypedElement(ExternalArrayType),
    /// Inputs: buffer, base, external pointer, index, value.
    StoreTypedElement(ExternalArrayType),
    Check(CheckOp),
    /// Inputs: target, arguments, context, effect, control.
    Call(CallDescriptorId),
    /// Inputs: C arguments, slow target and arguments, context, frame state,
    /// effect, control.
    FastApiCall(FastApiCallId),

    // Lowered
    Machine(MachineOp),
    Checked(CheckedOp),
    Convert(ConversionOp),
}

impl Operator {
    /// Constant helpers that store floats as bits.
    #[inline]
    pub fn number_constant(value: f64) -> Self {
        Operator::NumberConstant(value.to_bits())
    }

    #[inline]
    pub fn float64_constant(value: f64) -> Self {
        Operator::Float64Constant(value.to_bits())
    }

    #[inline]
    pub fn float32_constant(value: f32) -> Self {
        Operator::Float32Constant(value.to_bits())
    }

    /// Value of a `NumberConstant`.
    #[inline]
    pub fn number_value(&self) -> Option<f64> {
        match self {
            Operator::NumberConstant(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    /// Layout of `input_count` inputs.
    pub fn input_shape(&self, input_count: usize) -> InputShape {
        let n = input_count;
        let rest = |fixed: usize| n.saturating_sub(fixed);
        match self {
            Operator::Start | Operator::Dead => InputShape::new(0, 0, 0),
            Operator::End | Operator::Merge | Operator::Loop => InputShape::new(0, 0, n),
            Operator::Branch => InputShape::new(1, 0, 1),
            Operator::IfTrue | Operator::IfFalse => InputShape::new(0, 0, 1),
            Operator::Return => InputShape::new(rest(2), 1, 1),
            Operator::Terminate | Operator::Unreachable => InputShape::new(0, 1, 1),

            Operator::Parameter(_)
            | Operator::Int32Constant(_)
            | Operator::Int64Constant(_)
            | Operator::Float32Constant(_)
            | Operator::Float64Constant(_)
            | Operator::NumberConstant(_)
            | Operator::HeapConstant(_) => InputShape::new(0, 0, 0),

            Operator::Phi(_) => InputShape::new(rest(1), 0, 1),
            Operator::EffectPhi => InputShape::new(0, rest(1), 1),
            Operator::Select(_) => InputShape::new(3, 0, 0),

            Operator::Checkpoint => InputShape {
                frame_state: 1,
                ..InputShape::new(0, 1, 1)
            },
            Operator::FrameState => InputShape {
                frame_state: rest(5),
                ..InputShape::new(n.min(5), 0, 0)
            },
            Operator::StateValues | Operator::TypedStateValues(_) => InputShape::new(n, 0, 0),

            Operator::TypeGuard => InputShape::new(1, 1, 1),
            Operator::DeadValue(_) => InputShape::new(1, 0, 0),

            Operator::Number(op) => InputShape::new(op.arity(), 0, 0),
            Operator::Speculative(op, _) => InputShape::new(op.arity(), 1, 1),
            Operator::BooleanNot => InputShape::new(1, 0, 0),
            Operator::ReferenceEqual => InputShape::new(2, 0, 0),

            Operator::LoadField(_) => InputShape::new(1, 1, 1),
            Operator::StoreField(_) | Operator::LoadElement(_) => InputShape::new(2, 1, 1),
            Operator::StoreElement(_) => InputShape::new(3, 1, 1),
            Operator::LoadTypedElement(_) => InputShape::new(4, 1, 1),
            Operator::StoreTypedElement(_) => InputShape::new(5, 1, 1),

            Operator::Check(CheckOp::Bounds(_)) => InputShape::new(2, 1, 1),
            Operator::Check(_) => InputShape::new(1, 1, 1),

            Operator::Call(_) => InputShape {
                context: 1,
                ..InputShape::new(rest(3), 1, 1)
            },
            Operator::FastApiCall(_) => InputShape {
                context: 1,
                frame_state: 1,
                ..InputShape::new(rest(4), 1, 1)
            },

            Operator::Machine(op) => InputShape::new(op.arity(), 0, 0),
            Operator::Checked(_) => InputShape::new(2, 1, 1),
            Operator::Convert(op) if op.is_checked() => InputShape::new(1, 1, 1),
            Operator::Convert(_) => InputShape::new(1, 0, 0),
        }
    }

    /// Whether nodes of this operator produce a value.
    pub const fn has_value_output(&self) -> bool {
        match self {
            Operator::Start
            | Operator::End
            | Operator::Merge
            | Operator::Loop
            | Operator::Branch
            | Operator::IfTrue
            | Operator::IfFalse
            | Operator::Return
            | Operator::Terminate
            | Operator::EffectPhi
            | Operator::Checkpoint
            | Operator::Unreachable
            | Operator::StoreField(_)
            | Operator::StoreElement(_)
            | Operator::StoreTypedElement(_) => false,
            Operator::Check(op) => op.has_value_output(),
            _ => true,
        }
    }

    /// Whether nodes of this operator produce an effect.
    pub fn has_effect_output(&self) -> bool {
        match self {
            Operator::Start | Operator::Dead | Operator::EffectPhi => true,
            Operator::Return | Operator::Terminate | Operator::End => false,
            _ => self.input_shape(8).effect > 0,
        }
    }

    /// Whether nodes of this operator produce control.
    pub const fn has_control_output(&self) -> bool {
        matches!(
            self,
            Operator::Start
                | Operator::Merge
                | Operator::Loop
                | Operator::Branch
                | Operator::IfTrue
                | Operator::IfFalse
                | Operator::Call(_)
                | Operator::FastApiCall(_)
                | Operator::Unreachable
                | Operator::Dead
        )
    }

    /// Pure value operations: no effect, control or frame-state inputs.
    pub fn is_pure(&self) -> bool {
        if !self.has_value_output() {
            return false;
        }
        let shape = self.input_shape(4);
        shape.effect == 0 && shape.control == 0 && shape.frame_state == 0
            && !matches!(self, Operator::Phi(_) | Operator::Dead)
    }

    /// Control-flow operators.
    pub const fn is_control(&self) -> bool {
        matches!(
            self,
            Operator::Start
                | Operator::End
                | Operator::Merge
                | Operator::Loop
                | Operator::Branch
                | Operator::IfTrue
                | Operator::IfFalse
                | Operator::Return
                | Operator::Terminate
        )
    }

    /// Deoptimization reason if this operator is a guard.
    pub const fn deopt_reason(&self) -> Option<DeoptimizeReason> {
        match self {
            Operator::Check(op) => Some(op.deopt_reason()),
            Operator::Checked(op) => Some(op.deopt_reason()),
            Operator::Convert(op) => op.deopt_reason(),
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Float32Constant(bits) => {
                write!(f, "Float32Constant[{}]", f32::from_bits(*bits))
            }
            Operator::Float64Constant(bits) => {
                write!(f, "Float64Constant[{}]", f64::from_bits(*bits))
            }
            Operator::NumberConstant(bits) => {
                write!(f, "NumberConstant[{}]", f64::from_bits(*bits))
            }
            Operator::Int32Constant(v) => write!(f, "Int32Constant[{v}]"),
            Operator::Int64Constant(v) => write!(f, "Int64Constant[{v}]"),
            Operator::HeapConstant(c) => write!(f, "HeapConstant[{}]", c.id),
            Operator::Parameter(i) => write!(f, "Parameter[{i}]"),
            Operator::Phi(rep) => write!(f, "Phi[{rep}]"),
            Operator::Select(rep) => write!(f, "Select[{rep}]"),
            Operator::DeadValue(rep) => write!(f, "DeadValue[{rep}]"),
            Operator::Number(op) => write!(f, "Number{op:?}"),
            Operator::Speculative(op, hint) => write!(f, "Speculative{op:?}[{hint:?}]"),
            Operator::Check(op) => write!(f, "Check{op:?}"),
            Operator::Machine(op) => write!(f, "{op:?}"),
            Operator::Checked(op) => write!(f, "Checked{op:?}"),
            Operator::Convert(op) => write!(f, "{op:?}"),
            Operator::LoadField(_) => write!(f, "LoadField"),
            Operator::StoreField(_) => write!(f, "StoreField"),
            Operator::LoadElement(_) => write!(f, "LoadElement"),
            Operator::StoreElement(_) => write!(f, "StoreElement"),
            Operator::LoadTypedElement(t) => write!(f, "LoadTypedElement[{t:?}]"),
            Operator::StoreTypedElement(t) => write!(f, "StoreTypedElement[{t:?}]"),
            other => write!(f, "{other:?}"),
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
    fn test_input_shapes() {
        let add = Operator::Speculative(SpeculativeOp::NumberAdd, NumberOperationHint::SignedSmall);
        let shape = add.input_shape(4);
        assert_eq!(shape.value, 2);
        assert_eq!(shape.first_effect(), 2);
        assert_eq!(shape.first_control(), 3);

        let phi = Operator::Phi(MachineRepresentation::Tagged).input_shape(3);
        assert_eq!(phi.value, 2);
        assert_eq!(phi.control, 1);

        let call = Operator::Call(CallDescriptorId(0)).input_shape(6);
        assert_eq!(call.value, 3);
        assert_eq!(call.first_context(), 3);
        assert_eq!(call.first_effect(), 4);

        let fs = Operator::FrameState.input_shape(6);
        assert_eq!(fs.value, 5);
        assert_eq!(fs.frame_state, 1);
    }

    #[test]
    fn test_output_properties() {
        assert!(Operator::Number(NumberOp::Add).is_pure());
        assert!(!Operator::Phi(MachineRepresentation::Word32).is_pure());
        assert!(Operator::Check(CheckOp::Smi).has_effect_output());
        assert!(!Operator::Check(CheckOp::If(DeoptimizeReason::Overflow)).has_value_output());
        assert!(!Operator::Return.has_effect_output());
        assert!(Operator::Start.has_effect_output());
        assert!(Operator::Unreachable.has_control_output());
        assert!(!Operator::StoreField(FieldAccess::map()).has_value_output());
    }

    #[test]
    fn test_deopt_reasons() {
        assert_eq!(
            Operator::Checked(CheckedOp::Int32Add).deopt_reason(),
            Some(DeoptimizeReason::Overflow)
        );
        assert_eq!(
            Operator::Convert(ConversionOp::ChangeInt32ToFloat64).deopt_reason(),
            None
        );
        assert!(ConversionOp::CheckedTaggedSignedToInt32.is_checked());
        assert_eq!(
            Operator::Check(CheckOp::HeapObject).deopt_reason(),
            Some(DeoptimizeReason::Smi)
        );
    }

    #[test]
    fn test_write_barrier_ordering() {
        assert!(WriteBarrierKind::NoWriteBarrier < WriteBarrierKind::PointerWriteBarrier);
        assert!(WriteBarrierKind::PointerWriteBarrier < WriteBarrierKind::MapWriteBarrier);
        assert!(WriteBarrierKind::MapWriteBarrier < WriteBarrierKind::FullWriteBarrier);
    }

    #[test]
    fn test_display() {
        assert_eq!(Operator::Machine(MachineOp::Int32Add).to_string(), "Int32Add");
        assert_eq!(Operator::Checked(CheckedOp::Int32Div).to_string(), "CheckedInt32Div");
        assert_eq!(Operator::number_constant(5.0).to_string(), "NumberConstant[5]");
        assert_eq!(Operator::Number(NumberOp::Add).to_string(), "NumberAdd");
    }
}
