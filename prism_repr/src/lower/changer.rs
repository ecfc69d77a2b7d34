//! Representation changes.
//!
//! Given a producer with a settled representation and static type, and a
//! consumer's [`UseInfo`], the [`RepresentationChanger`] returns a node that
//! yields the value in the requested representation. Conversions are
//! created as needed; checked conversions are threaded into the consumer's
//! effect chain so they can deoptimize. Constants are folded eagerly.
//!
//! A request with no valid conversion path is a fatal
//! [`LoweringError::ImpossibleConversion`].

use crate::error::{LoweringError, LoweringResult};
use crate::ir::{
    CheckOp, CheckTaggedInputMode, CheckedOp, ConversionOp, DeoptimizeReason, Graph, MachineOp,
    NodeId, NumberOp, Operator, Type,
};
use crate::repr::{CheckForMinusZeroMode, MachineRepresentation, TypeCheckKind, UseInfo};

use MachineRepresentation as Rep;

// =============================================================================
// Numeric Helpers
// =============================================================================

/// ECMAScript `ToInt32` of a double.
pub fn double_to_int32(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    value.trunc().rem_euclid(4294967296.0) as u32 as i32
}

/// Whether `value` is exactly representable as an `i32` (`-0` excluded).
pub fn is_int32_double(value: f64) -> bool {
    value.fract() == 0.0
        && value >= f64::from(i32::MIN)
        && value <= f64::from(i32::MAX)
        && !(value == 0.0 && value.is_sign_negative())
}

/// Integers that survive a round trip through `i64`.
fn double_representable_int64() -> Type {
    Type::range(-9223372036854775808.0, 9223372036854774784.0)
}

fn double_representable_int64_or_minus_zero() -> Type {
    Type::union(double_representable_int64(), Type::MINUS_ZERO)
}

fn minus_zero_mode(ty: Type, use_info: UseInfo) -> CheckForMinusZeroMode {
    if ty.maybe(Type::MINUS_ZERO) {
        use_info.minus_zero_check()
    } else {
        CheckForMinusZeroMode::DontCheckForMinusZero
    }
}

fn minus_zero_mode_of(ty: Type) -> CheckForMinusZeroMode {
    if ty.maybe(Type::MINUS_ZERO) {
        CheckForMinusZeroMode::CheckForMinusZero
    } else {
        CheckForMinusZeroMode::DontCheckForMinusZero
    }
}

// =============================================================================
// Change Request
// =============================================================================

/// One producer/consumer mismatch.
#[derive(Debug, Clone, Copy)]
struct Request {
    node: NodeId,
    from: MachineRepresentation,
    ty: Type,
    user: NodeId,
    use_info: UseInfo,
}

impl Request {
    #[inline]
    fn check(&self) -> TypeCheckKind {
        self.use_info.type_check()
    }

    fn error(&self, graph: &Graph, to: MachineRepresentation) -> LoweringError {
        LoweringError::ImpossibleConversion {
            node: self.node,
            op: graph.op(self.node).to_string(),
            from: self.from,
            ty: self.ty.to_string(),
            to,
        }
    }
}

// =============================================================================
// Representation Changer
// =============================================================================

/// Inserts conversions between representations.
#[derive(Debug, Clone)]
pub struct RepresentationChanger {
    is_64bit: bool,
}

impl RepresentationChanger {
    pub fn new(pointer_representation: MachineRepresentation) -> Self {
        Self {
            is_64bit: pointer_representation == Rep::Word64,
        }
    }

    /// Produce `node` (of representation `from` and type `ty`) in the form
    /// demanded by `use_info` for a use by `user`.
    pub fn get_representation_for(
        &self,
        graph: &mut Graph,
        node: NodeId,
        from: MachineRepresentation,
        ty: Type,
        user: NodeId,
        use_info: UseInfo,
    ) -> LoweringResult<NodeId> {
        let req = Request {
            node,
            from,
            ty,
            user,
            use_info,
        };
        let to = use_info.representation();
        if from == Rep::None && !ty.is_none() {
            return Err(req.error(graph, to));
        }

        let check = use_info.type_check();
        let is_bigint_check = matches!(check, TypeCheckKind::BigInt | TypeCheckKind::SignedBigInt64);
        if check == TypeCheckKind::None || (from != Rep::Word32 && !is_bigint_check) {
            if to == from {
                return Ok(node);
            }
            if to.is_word32_like() && from.is_word32_like() {
                // Narrow loads extend and narrow stores truncate implicitly.
                return Ok(node);
            }
        }

        match to {
            Rep::TaggedSigned => self.tagged_signed_for(graph, req),
            Rep::TaggedPointer => self.tagged_pointer_for(graph, req),
            Rep::Tagged => self.tagged_for(graph, req),
            Rep::Float32 => self.float32_for(graph, req),
            Rep::Float64 => self.float64_for(graph, req),
            Rep::Bit => self.bit_for(graph, req),
            Rep::Word8 | Rep::Word16 | Rep::Word32 => self.word32_for(graph, req),
            Rep::Word64 => self.word64_for(graph, req),
            Rep::Simd128 | Rep::None => Ok(node),
            Rep::CompressedPointer | Rep::Compressed => Err(req.error(graph, to)),
        }
    }

    // =========================================================================
    // Tagged Targets
    // =========================================================================

    fn tagged_signed_for(&self, graph: &mut Graph, req: Request) -> LoweringResult<NodeId> {
        let to = Rep::TaggedSigned;
        if matches!(graph.op(req.node), Operator::NumberConstant(_)) && req.ty.is(Type::SIGNED_SMALL)
        {
            return Ok(req.node);
        }
        if req.ty.is_none() {
            return Ok(dead_value(graph, to, req.node));
        }

        let signed_small_check = req.check() == TypeCheckKind::SignedSmall;
        let mut node = req.node;
        let op = if req.from.is_word32_like() {
            if req.ty.is(Type::SIGNED31) {
                ConversionOp::ChangeInt31ToTaggedSigned
            } else if req.ty.is(Type::SIGNED32) && signed_small_check {
                ConversionOp::CheckedInt32ToTaggedSigned
            } else if req.ty.is(Type::UNSIGNED32) && signed_small_check {
                ConversionOp::CheckedUint32ToTaggedSigned
            } else {
                return Err(req.error(graph, to));
            }
        } else if req.from == Rep::Word64 {
            if req.ty.is(Type::SIGNED31) {
                node = unchecked(graph, ConversionOp::TruncateInt64ToInt32, node, req.ty);
                ConversionOp::ChangeInt31ToTaggedSigned
            } else if signed_small_check && req.ty.is(Type::POSITIVE_SAFE_INTEGER) {
                ConversionOp::CheckedUint64ToTaggedSigned
            } else if signed_small_check && req.ty.is(Type::SAFE_INTEGER) {
                ConversionOp::CheckedInt64ToTaggedSigned
            } else {
                return Err(req.error(graph, to));
            }
        } else if req.from == Rep::Float64 || req.from == Rep::Float32 {
            if req.from == Rep::Float32 {
                if !signed_small_check {
                    return Err(req.error(graph, to));
                }
                node = unchecked(graph, ConversionOp::ChangeFloat32ToFloat64, node, req.ty);
            }
            if req.ty.is(Type::SIGNED31) {
                node = unchecked(graph, ConversionOp::ChangeFloat64ToInt32, node, req.ty);
                ConversionOp::ChangeInt31ToTaggedSigned
            } else if req.ty.is(Type::SIGNED32) && signed_small_check {
                node = unchecked(graph, ConversionOp::ChangeFloat64ToInt32, node, req.ty);
                ConversionOp::CheckedInt32ToTaggedSigned
            } else if req.ty.is(Type::UNSIGNED32) && signed_small_check {
                node = unchecked(graph, ConversionOp::ChangeFloat64ToUint32, node, req.ty);
                ConversionOp::CheckedUint32ToTaggedSigned
            } else if signed_small_check {
                let mode = minus_zero_mode_of(req.ty);
                node = insert_conversion(
                    graph,
                    node,
                    ConversionOp::CheckedFloat64ToInt32(mode),
                    req.user,
                    req.ty,
                )?;
                ConversionOp::CheckedInt32ToTaggedSigned
            } else {
                return Err(req.error(graph, to));
            }
        } else if req.from.can_be_tagged_pointer() {
            if signed_small_check {
                ConversionOp::CheckedTaggedToTaggedSigned
            } else if req.ty.is(Type::SIGNED_SMALL) {
                ConversionOp::ChangeTaggedToTaggedSigned
            } else {
                return Err(req.error(graph, to));
            }
        } else if req.from == Rep::Bit && signed_small_check {
            node = unchecked(graph, ConversionOp::ChangeBitToTagged, node, req.ty);
            ConversionOp::CheckedTaggedToTaggedSigned
        } else {
            return Err(req.error(graph, to));
        };
        insert_conversion(graph, node, op, req.user, req.ty)
    }

    fn tagged_pointer_for(&self, graph: &mut Graph, req: Request) -> LoweringResult<NodeId> {
        let to = Rep::TaggedPointer;
        let check = req.check();
        if matches!(graph.op(req.node), Operator::HeapConstant(_)) && check != TypeCheckKind::BigInt
        {
            return Ok(req.node);
        }
        if req.ty.is_none() {
            return Ok(dead_value(graph, to, req.node));
        }
        if check == TypeCheckKind::BigInt
            && !req.ty.is(Type::BIGINT)
            && !req.from.can_be_tagged_pointer()
        {
            return unconditional_deopt(graph, req.user, DeoptimizeReason::NotABigInt, to);
        }

        let mut node = req.node;
        let op = if req.from == Rep::Bit {
            if !req.ty.is(Type::BOOLEAN) {
                return Err(req.error(graph, to));
            }
            ConversionOp::ChangeBitToTagged
        } else if req.from.is_word32_like() {
            node = if req.ty.is(Type::UNSIGNED32) {
                unchecked(graph, ConversionOp::ChangeUint32ToFloat64, node, req.ty)
            } else if req.ty.is(Type::SIGNED32) {
                unchecked(graph, ConversionOp::ChangeInt32ToFloat64, node, req.ty)
            } else {
                return Err(req.error(graph, to));
            };
            ConversionOp::ChangeFloat64ToTaggedPointer
        } else if req.from == Rep::Word64 {
            if !req.ty.is(Type::SAFE_INTEGER) {
                return Err(req.error(graph, to));
            }
            node = unchecked(graph, ConversionOp::ChangeInt64ToFloat64, node, req.ty);
            ConversionOp::ChangeFloat64ToTaggedPointer
        } else if req.from == Rep::Float32 || req.from == Rep::Float64 {
            if !req.ty.is(Type::NUMBER) {
                return Err(req.error(graph, to));
            }
            if req.from == Rep::Float32 {
                node = unchecked(graph, ConversionOp::ChangeFloat32ToFloat64, node, req.ty);
            }
            ConversionOp::ChangeFloat64ToTaggedPointer
        } else if matches!(req.from, Rep::TaggedSigned | Rep::Tagged)
            && check == TypeCheckKind::HeapObject
        {
            if !req.ty.maybe(Type::SIGNED_SMALL) {
                return Ok(node);
            }
            ConversionOp::CheckedTaggedToTaggedPointer
        } else if req.from.is_any_tagged() {
            if check == TypeCheckKind::BigInt {
                if req.ty.is(Type::BIGINT) {
                    return Ok(node);
                }
                ConversionOp::CheckedTaggedToBigInt
            } else if req.from == Rep::TaggedPointer || !req.ty.maybe(Type::SIGNED_SMALL) {
                return Ok(node);
            } else {
                return Err(req.error(graph, to));
            }
        } else {
            return Err(req.error(graph, to));
        };
        insert_conversion(graph, node, op, req.user, req.ty)
    }

    fn tagged_for(&self, graph: &mut Graph, req: Request) -> LoweringResult<NodeId> {
        let to = Rep::Tagged;
        let truncation = req.use_info.truncation();
        match graph.op(req.node) {
            Operator::NumberConstant(_) | Operator::HeapConstant(_) => return Ok(req.node),
            Operator::Int32Constant(v) => return Ok(graph.number_constant(f64::from(v))),
            Operator::Float64Constant(bits) => {
                return Ok(graph.number_constant(f64::from_bits(bits)));
            }
            _ => {}
        }
        if matches!(req.from, Rep::TaggedSigned | Rep::TaggedPointer) {
            return Ok(req.node);
        }
        if req.ty.is_none() {
            return Ok(dead_value(graph, to, req.node));
        }

        let identify_zeros = truncation.identifies_zero_and_minus_zero();
        let mut node = req.node;
        let op = if req.from == Rep::Bit {
            if !req.ty.is(Type::BOOLEAN) {
                return Err(req.error(graph, to));
            }
            ConversionOp::ChangeBitToTagged
        } else if req.from.is_word32_like() {
            if req.ty.is(Type::SIGNED31) {
                ConversionOp::ChangeInt31ToTaggedSigned
            } else if req.ty.is(Type::SIGNED32)
                || (identify_zeros && req.ty.is(Type::SIGNED32_OR_MINUS_ZERO))
            {
                ConversionOp::ChangeInt32ToTagged
            } else if req.ty.is(Type::UNSIGNED32)
                || (identify_zeros && req.ty.is(Type::UNSIGNED32_OR_MINUS_ZERO))
                || truncation.is_used_as_word32()
            {
                ConversionOp::ChangeUint32ToTagged
            } else {
                return Err(req.error(graph, to));
            }
        } else if req.from == Rep::Word64 {
            if req.ty.is(Type::SIGNED31) {
                node = unchecked(graph, ConversionOp::TruncateInt64ToInt32, node, req.ty);
                ConversionOp::ChangeInt31ToTaggedSigned
            } else if req.ty.is(Type::SIGNED32) {
                node = unchecked(graph, ConversionOp::TruncateInt64ToInt32, node, req.ty);
                ConversionOp::ChangeInt32ToTagged
            } else if req.ty.is(Type::UNSIGNED32) {
                node = unchecked(graph, ConversionOp::TruncateInt64ToInt32, node, req.ty);
                ConversionOp::ChangeUint32ToTagged
            } else if req.ty.is(Type::POSITIVE_SAFE_INTEGER) {
                ConversionOp::ChangeUint64ToTagged
            } else if req.ty.is(Type::SAFE_INTEGER) {
                ConversionOp::ChangeInt64ToTagged
            } else {
                return Err(req.error(graph, to));
            }
        } else if req.from == Rep::Float32 {
            node = unchecked(graph, ConversionOp::ChangeFloat32ToFloat64, node, req.ty);
            ConversionOp::ChangeFloat64ToTagged(minus_zero_mode_of(req.ty))
        } else if req.from == Rep::Float64 {
            if req.ty.is(Type::SIGNED31) {
                node = unchecked(graph, ConversionOp::ChangeFloat64ToInt32, node, req.ty);
                ConversionOp::ChangeInt31ToTaggedSigned
            } else if req.ty.is(Type::SIGNED32) {
                node = unchecked(graph, ConversionOp::ChangeFloat64ToInt32, node, req.ty);
                ConversionOp::ChangeInt32ToTagged
            } else if req.ty.is(Type::UNSIGNED32) {
                node = unchecked(graph, ConversionOp::ChangeFloat64ToUint32, node, req.ty);
                ConversionOp::ChangeUint32ToTagged
            } else if req.ty.is(Type::NUMBER)
                || (req.ty.is(Type::NUMBER_OR_ODDBALL)
                    && truncation.truncates_oddball_and_bigint_to_number())
            {
                ConversionOp::ChangeFloat64ToTagged(minus_zero_mode_of(req.ty))
            } else {
                return Err(req.error(graph, to));
            }
        } else {
            return Err(req.error(graph, to));
        };
        Ok(unchecked(graph, op, node, req.ty))
    }

    // =========================================================================
    // Floating-Point Targets
    // =========================================================================

    fn float32_for(&self, graph: &mut Graph, req: Request) -> LoweringResult<NodeId> {
        let to = Rep::Float32;
        if let Some(value) = graph.op(req.node).number_value() {
            return Ok(graph.float32_constant(value as f32));
        }
        if req.ty.is_none() {
            return Ok(dead_value(graph, to, req.node));
        }

        let truncation = req.use_info.truncation();
        let widened = if req.from.is_word32_like() {
            if req.ty.is(Type::SIGNED32) {
                Some(ConversionOp::ChangeInt32ToFloat64)
            } else if req.ty.is(Type::UNSIGNED32) || truncation.is_used_as_word32() {
                Some(ConversionOp::ChangeUint32ToFloat64)
            } else {
                None
            }
        } else if req.from.is_any_tagged() {
            if req.ty.is(Type::NUMBER) {
                Some(ConversionOp::ChangeTaggedToFloat64)
            } else if req.ty.is(Type::NUMBER_OR_ODDBALL) {
                Some(ConversionOp::TruncateTaggedToFloat64)
            } else {
                None
            }
        } else if req.from == Rep::Word64 && req.ty.is(Type::SAFE_INTEGER) {
            Some(ConversionOp::ChangeInt64ToFloat64)
        } else {
            None
        };

        let node = match (req.from, widened) {
            (Rep::Float64, _) => req.node,
            (_, Some(op)) => unchecked(graph, op, req.node, req.ty),
            (_, None) => return Err(req.error(graph, to)),
        };
        Ok(unchecked(graph, ConversionOp::TruncateFloat64ToFloat32, node, req.ty))
    }

    fn float64_for(&self, graph: &mut Graph, req: Request) -> LoweringResult<NodeId> {
        let to = Rep::Float64;
        let check = req.check();
        if let Some(value) = graph.op(req.node).number_value() {
            if matches!(
                check,
                TypeCheckKind::None
                    | TypeCheckKind::Number
                    | TypeCheckKind::NumberOrBoolean
                    | TypeCheckKind::NumberOrOddball
            ) {
                return Ok(graph.float64_constant(value));
            }
        }
        if req.ty.is_none() {
            return Ok(dead_value(graph, to, req.node));
        }

        let truncation = req.use_info.truncation();
        let identify_zeros = truncation.identifies_zero_and_minus_zero();
        let mut node = req.node;
        let op = if req.from.is_word32_like() {
            if req.ty.is(Type::SIGNED32)
                || (identify_zeros && req.ty.is(Type::SIGNED32_OR_MINUS_ZERO))
            {
                Some(ConversionOp::ChangeInt32ToFloat64)
            } else if req.ty.is(Type::UNSIGNED32)
                || (identify_zeros && req.ty.is(Type::UNSIGNED32_OR_MINUS_ZERO))
                || truncation.is_used_as_word32()
            {
                Some(ConversionOp::ChangeUint32ToFloat64)
            } else {
                None
            }
        } else if req.from == Rep::Bit {
            if truncation.truncates_oddball_and_bigint_to_number()
                || matches!(
                    check,
                    TypeCheckKind::NumberOrBoolean | TypeCheckKind::NumberOrOddball
                )
            {
                Some(ConversionOp::ChangeUint32ToFloat64)
            } else if check != TypeCheckKind::None {
                return unconditional_deopt(graph, req.user, DeoptimizeReason::NotAHeapNumber, to);
            } else {
                None
            }
        } else if req.from.is_any_tagged() {
            if req.ty.is(Type::UNDEFINED) {
                if check == TypeCheckKind::NumberOrBoolean {
                    return unconditional_deopt(
                        graph,
                        req.user,
                        DeoptimizeReason::NotANumberOrBoolean,
                        to,
                    );
                }
                return Ok(graph.float64_constant(f64::NAN));
            } else if req.from == Rep::TaggedSigned {
                node = unchecked(graph, ConversionOp::ChangeTaggedSignedToInt32, node, req.ty);
                Some(ConversionOp::ChangeInt32ToFloat64)
            } else if req.ty.is(Type::NUMBER) {
                Some(ConversionOp::ChangeTaggedToFloat64)
            } else if (req.ty.is(Type::NUMBER_OR_ODDBALL)
                && truncation.truncates_oddball_and_bigint_to_number())
                || req.ty.is(Type::NUMBER_OR_HOLE)
            {
                // `null` truncates to +0, so this is only sound for uses
                // that asked for the truncation.
                Some(ConversionOp::TruncateTaggedToFloat64)
            } else if check == TypeCheckKind::Number
                || (check == TypeCheckKind::NumberOrOddball
                    && !req.ty.maybe(Type::BOOLEAN_OR_NULL_OR_NUMBER))
            {
                Some(ConversionOp::CheckedTaggedToFloat64(CheckTaggedInputMode::Number))
            } else if check == TypeCheckKind::NumberOrBoolean {
                Some(ConversionOp::CheckedTaggedToFloat64(
                    CheckTaggedInputMode::NumberOrBoolean,
                ))
            } else if check == TypeCheckKind::NumberOrOddball {
                Some(ConversionOp::CheckedTaggedToFloat64(
                    CheckTaggedInputMode::NumberOrOddball,
                ))
            } else {
                None
            }
        } else if req.from == Rep::Float32 {
            Some(ConversionOp::ChangeFloat32ToFloat64)
        } else if req.from == Rep::Word64 && req.ty.is(Type::SAFE_INTEGER) {
            Some(ConversionOp::ChangeInt64ToFloat64)
        } else {
            None
        };

        match op {
            Some(op) => insert_conversion(graph, node, op, req.user, req.ty),
            None => Err(req.error(graph, to)),
        }
    }

    // =========================================================================
    // Bit Target
    // =========================================================================

    fn bit_for(&self, graph: &mut Graph, req: Request) -> LoweringResult<NodeId> {
        let to = Rep::Bit;
        if let Operator::HeapConstant(constant) = graph.op(req.node) {
            if let Some(value) = constant.as_boolean() {
                return Ok(graph.int32_constant(i32::from(value)));
            }
        }
        if req.ty.is_none() {
            return Ok(dead_value(graph, to, req.node));
        }

        let node = req.node;
        let converted = match req.from {
            Rep::Tagged | Rep::TaggedPointer => {
                let op = if req.ty.is(Type::BOOLEAN_OR_NULL_OR_UNDEFINED) {
                    // `true` is the only truthy oddball.
                    ConversionOp::ChangeTaggedToBit
                } else if req.from == Rep::Tagged && req.ty.maybe(Type::SIGNED_SMALL) {
                    ConversionOp::TruncateTaggedToBit
                } else {
                    ConversionOp::TruncateTaggedPointerToBit
                };
                unchecked(graph, op, node, req.ty)
            }
            Rep::TaggedSigned => {
                let word = unchecked(graph, ConversionOp::ChangeTaggedSignedToInt32, node, req.ty);
                unchecked(graph, ConversionOp::TruncateWord32ToBit, word, req.ty)
            }
            Rep::Word8 | Rep::Word16 | Rep::Word32 => {
                unchecked(graph, ConversionOp::TruncateWord32ToBit, node, req.ty)
            }
            Rep::Word64 => unchecked(graph, ConversionOp::TruncateWord64ToBit, node, req.ty),
            Rep::Float32 => {
                let wide = unchecked(graph, ConversionOp::ChangeFloat32ToFloat64, node, req.ty);
                unchecked(graph, ConversionOp::TruncateFloat64ToBit, wide, req.ty)
            }
            Rep::Float64 => unchecked(graph, ConversionOp::TruncateFloat64ToBit, node, req.ty),
            _ => return Err(req.error(graph, to)),
        };
        Ok(converted)
    }

    // =========================================================================
    // Word Targets
    // =========================================================================

    fn word32_for(&self, graph: &mut Graph, req: Request) -> LoweringResult<NodeId> {
        let to = Rep::Word32;
        let check = req.check();
        let truncation = req.use_info.truncation();
        let int32_check = matches!(
            check,
            TypeCheckKind::SignedSmall | TypeCheckKind::Signed32 | TypeCheckKind::ArrayIndex
        );

        if let Some(value) = graph.op(req.node).number_value() {
            let foldable = check == TypeCheckKind::None
                || (matches!(
                    check,
                    TypeCheckKind::SignedSmall
                        | TypeCheckKind::Signed32
                        | TypeCheckKind::Number
                        | TypeCheckKind::NumberOrOddball
                        | TypeCheckKind::ArrayIndex
                ) && is_int32_double(value));
            if foldable {
                return Ok(graph.int32_constant(double_to_int32(value)));
            }
        }
        if req.ty.is_none() {
            return Ok(dead_value(graph, to, req.node));
        }

        let mut node = req.node;
        let op = match req.from {
            Rep::Bit => {
                if truncation.is_used_as_word32() {
                    return Ok(node);
                }
                let reason = if check == TypeCheckKind::Number {
                    DeoptimizeReason::NotANumber
                } else {
                    DeoptimizeReason::NotASmi
                };
                return unconditional_deopt(graph, req.user, reason, to);
            }
            Rep::Float64 | Rep::Float32 => {
                if req.from == Rep::Float32 {
                    node = unchecked(graph, ConversionOp::ChangeFloat32ToFloat64, node, req.ty);
                }
                if req.ty.is(Type::SIGNED32) {
                    ConversionOp::ChangeFloat64ToInt32
                } else if int32_check {
                    ConversionOp::CheckedFloat64ToInt32(minus_zero_mode(req.ty, req.use_info))
                } else if req.ty.is(Type::UNSIGNED32) {
                    ConversionOp::ChangeFloat64ToUint32
                } else if truncation.is_used_as_word32() {
                    ConversionOp::TruncateFloat64ToWord32
                } else {
                    return Err(req.error(graph, to));
                }
            }
            Rep::TaggedSigned | Rep::TaggedPointer | Rep::Tagged => {
                if req.from == Rep::TaggedSigned && req.ty.is(Type::SIGNED_SMALL) {
                    ConversionOp::ChangeTaggedSignedToInt32
                } else if req.ty.is(Type::SIGNED32) {
                    ConversionOp::ChangeTaggedToInt32
                } else if check == TypeCheckKind::SignedSmall {
                    ConversionOp::CheckedTaggedSignedToInt32
                } else if check == TypeCheckKind::Signed32 {
                    ConversionOp::CheckedTaggedToInt32(minus_zero_mode(req.ty, req.use_info))
                } else if check == TypeCheckKind::ArrayIndex {
                    ConversionOp::CheckedTaggedToArrayIndex
                } else if req.ty.is(Type::UNSIGNED32) {
                    ConversionOp::ChangeTaggedToUint32
                } else if truncation.is_used_as_word32() {
                    if req.ty.is(Type::NUMBER_OR_ODDBALL) {
                        ConversionOp::TruncateTaggedToWord32
                    } else if check == TypeCheckKind::Number {
                        ConversionOp::CheckedTruncateTaggedToWord32(CheckTaggedInputMode::Number)
                    } else if check == TypeCheckKind::NumberOrOddball {
                        ConversionOp::CheckedTruncateTaggedToWord32(
                            CheckTaggedInputMode::NumberOrOddball,
                        )
                    } else {
                        return Err(req.error(graph, to));
                    }
                } else {
                    return Err(req.error(graph, to));
                }
            }
            Rep::Word32 => {
                // Unchecked word32 uses were answered before dispatch.
                if int32_check {
                    let identify_zeros = truncation.identifies_zero_and_minus_zero();
                    if req.ty.is(Type::SIGNED32)
                        || (identify_zeros && req.ty.is(Type::SIGNED32_OR_MINUS_ZERO))
                    {
                        return Ok(node);
                    } else if req.ty.is(Type::UNSIGNED32)
                        || (identify_zeros && req.ty.is(Type::UNSIGNED32_OR_MINUS_ZERO))
                    {
                        ConversionOp::CheckedUint32ToInt32
                    } else {
                        return Err(req.error(graph, to));
                    }
                } else if matches!(check, TypeCheckKind::Number | TypeCheckKind::NumberOrOddball) {
                    return Ok(node);
                } else {
                    return Err(req.error(graph, to));
                }
            }
            Rep::Word8 | Rep::Word16 => return Ok(node),
            Rep::Word64 => {
                if req.ty.is(Type::SIGNED32)
                    || (req.ty.is(Type::UNSIGNED32) && check == TypeCheckKind::None)
                    || (req.ty.is(Type::SAFE_INTEGER) && truncation.is_used_as_word32())
                {
                    ConversionOp::TruncateInt64ToInt32
                } else if int32_check && req.ty.is(Type::POSITIVE_SAFE_INTEGER) {
                    ConversionOp::CheckedUint64ToInt32
                } else if int32_check && req.ty.is(Type::SAFE_INTEGER) {
                    ConversionOp::CheckedInt64ToInt32
                } else {
                    return Err(req.error(graph, to));
                }
            }
            _ => return Err(req.error(graph, to)),
        };
        insert_conversion(graph, node, op, req.user, req.ty)
    }

    fn word64_for(&self, graph: &mut Graph, req: Request) -> LoweringResult<NodeId> {
        let to = Rep::Word64;
        let check = req.check();
        let truncation = req.use_info.truncation();
        let identify_zeros = truncation.identifies_zero_and_minus_zero();

        if let Some(value) = graph.op(req.node).number_value() {
            if !matches!(check, TypeCheckKind::BigInt | TypeCheckKind::SignedBigInt64)
                && value.fract() == 0.0
                && value >= -9223372036854775808.0
                && value < 9223372036854775808.0
            {
                return Ok(graph.int64_constant(value as i64));
            }
        }
        if matches!(check, TypeCheckKind::BigInt | TypeCheckKind::SignedBigInt64)
            && !req.from.can_be_tagged_pointer()
            && req.from != Rep::Word64
        {
            return unconditional_deopt(graph, req.user, DeoptimizeReason::NotABigInt, to);
        }
        if req.ty.is_none() {
            return Ok(dead_value(graph, to, req.node));
        }

        let int64_exact = req.ty.is(double_representable_int64())
            || (identify_zeros && req.ty.is(double_representable_int64_or_minus_zero()));
        let int64_check = matches!(check, TypeCheckKind::Signed64 | TypeCheckKind::ArrayIndex);
        let mut node = req.node;
        let op = match req.from {
            Rep::Bit => {
                return unconditional_deopt(graph, req.user, DeoptimizeReason::NotASmi, to);
            }
            Rep::Word8 | Rep::Word16 | Rep::Word32 => {
                if req.ty.is(Type::UNSIGNED32_OR_MINUS_ZERO) {
                    ConversionOp::ChangeUint32ToUint64
                } else if req.ty.is(Type::SIGNED32_OR_MINUS_ZERO) {
                    ConversionOp::ChangeInt32ToInt64
                } else {
                    return Err(req.error(graph, to));
                }
            }
            Rep::Float32 | Rep::Float64 => {
                if req.from == Rep::Float32 {
                    node = unchecked(graph, ConversionOp::ChangeFloat32ToFloat64, node, req.ty);
                }
                if int64_exact {
                    ConversionOp::ChangeFloat64ToInt64
                } else if int64_check {
                    ConversionOp::CheckedFloat64ToInt64(minus_zero_mode(req.ty, req.use_info))
                } else {
                    return Err(req.error(graph, to));
                }
            }
            Rep::TaggedSigned => {
                if req.ty.is(Type::SIGNED_SMALL) {
                    ConversionOp::ChangeTaggedSignedToInt64
                } else {
                    return Err(req.error(graph, to));
                }
            }
            Rep::Tagged | Rep::TaggedPointer
                if (self.is_64bit && check == TypeCheckKind::BigInt)
                    || check == TypeCheckKind::SignedBigInt64 =>
            {
                if check == TypeCheckKind::SignedBigInt64 {
                    ConversionOp::CheckedBigIntToBigInt64
                } else if req.ty.is(Type::BIGINT) {
                    ConversionOp::TruncateBigIntToWord64
                } else {
                    node = insert_conversion(
                        graph,
                        node,
                        ConversionOp::CheckedTaggedToBigInt,
                        req.user,
                        req.ty,
                    )?;
                    ConversionOp::TruncateBigIntToWord64
                }
            }
            Rep::Tagged | Rep::TaggedPointer => {
                if int64_exact {
                    ConversionOp::ChangeTaggedToInt64
                } else if check == TypeCheckKind::Signed64 {
                    ConversionOp::CheckedTaggedToInt64(minus_zero_mode(req.ty, req.use_info))
                } else if check == TypeCheckKind::ArrayIndex {
                    ConversionOp::CheckedTaggedToArrayIndex
                } else {
                    return Err(req.error(graph, to));
                }
            }
            Rep::Word64 => {
                if check == TypeCheckKind::BigInt && req.ty.is(Type::BIGINT) {
                    return Ok(node);
                } else if check == TypeCheckKind::SignedBigInt64 && req.ty.is(Type::SIGNED_BIGINT64)
                {
                    return Ok(node);
                } else if check == TypeCheckKind::SignedBigInt64 && req.ty.is(Type::BIGINT) {
                    ConversionOp::CheckedUint64ToInt64
                } else {
                    return Err(req.error(graph, to));
                }
            }
            _ => return Err(req.error(graph, to)),
        };
        insert_conversion(graph, node, op, req.user, req.ty)
    }

    // =========================================================================
    // Operator Selection
    // =========================================================================

    /// Signed 32-bit machine operator for a number operation.
    pub fn int32_operator_for(op: NumberOp) -> Option<MachineOp> {
        Some(match op {
            NumberOp::Add => MachineOp::Int32Add,
            NumberOp::Subtract => MachineOp::Int32Sub,
            NumberOp::Multiply | NumberOp::Imul => MachineOp::Int32Mul,
            NumberOp::Divide => MachineOp::Int32Div,
            NumberOp::Modulus => MachineOp::Int32Mod,
            NumberOp::BitwiseAnd => MachineOp::Word32And,
            NumberOp::BitwiseOr => MachineOp::Word32Or,
            NumberOp::BitwiseXor => MachineOp::Word32Xor,
            NumberOp::ShiftLeft => MachineOp::Word32Shl,
            NumberOp::ShiftRight => MachineOp::Word32Sar,
            NumberOp::ShiftRightLogical => MachineOp::Word32Shr,
            NumberOp::Equal => MachineOp::Word32Equal,
            NumberOp::LessThan => MachineOp::Int32LessThan,
            NumberOp::LessThanOrEqual => MachineOp::Int32LessThanOrEqual,
            _ => return None,
        })
    }

    /// Unsigned 32-bit machine operator for a number operation.
    pub fn uint32_operator_for(op: NumberOp) -> Option<MachineOp> {
        Some(match op {
            NumberOp::Add => MachineOp::Int32Add,
            NumberOp::Subtract => MachineOp::Int32Sub,
            NumberOp::Multiply | NumberOp::Imul => MachineOp::Int32Mul,
            NumberOp::Divide => MachineOp::Uint32Div,
            NumberOp::Modulus => MachineOp::Uint32Mod,
            NumberOp::Equal => MachineOp::Word32Equal,
            NumberOp::LessThan => MachineOp::Uint32LessThan,
            NumberOp::LessThanOrEqual => MachineOp::Uint32LessThanOrEqual,
            _ => return None,
        })
    }

    /// Signed 64-bit machine operator for a number operation.
    pub fn int64_operator_for(op: NumberOp) -> Option<MachineOp> {
        Some(match op {
            NumberOp::Add => MachineOp::Int64Add,
            NumberOp::Subtract => MachineOp::Int64Sub,
            NumberOp::Multiply => MachineOp::Int64Mul,
            NumberOp::Equal => MachineOp::Word64Equal,
            _ => return None,
        })
    }

    /// Float64 machine operator for a number operation.
    pub fn float64_operator_for(op: NumberOp) -> Option<MachineOp> {
        Some(match op {
            NumberOp::Add => MachineOp::Float64Add,
            NumberOp::Subtract => MachineOp::Float64Sub,
            NumberOp::Multiply => MachineOp::Float64Mul,
            NumberOp::Divide => MachineOp::Float64Div,
            NumberOp::Modulus => MachineOp::Float64Mod,
            NumberOp::Equal => MachineOp::Float64Equal,
            NumberOp::LessThan => MachineOp::Float64LessThan,
            NumberOp::LessThanOrEqual => MachineOp::Float64LessThanOrEqual,
            NumberOp::Abs => MachineOp::Float64Abs,
            NumberOp::Max => MachineOp::Float64Max,
            NumberOp::Min => MachineOp::Float64Min,
            NumberOp::Ceil => MachineOp::Float64RoundUp,
            NumberOp::Floor => MachineOp::Float64RoundDown,
            NumberOp::Trunc => MachineOp::Float64RoundTruncate,
            NumberOp::Round => MachineOp::Float64Round,
            NumberOp::SilenceNaN => MachineOp::Float64SilenceNaN,
            _ => return None,
        })
    }

    /// Comparison of two Smis without untagging them.
    pub fn tagged_signed_operator_for(&self, op: NumberOp) -> Option<MachineOp> {
        Some(match (op, self.is_64bit) {
            (NumberOp::Equal, true) => MachineOp::Word64Equal,
            (NumberOp::LessThan, true) => MachineOp::Int64LessThan,
            (NumberOp::LessThanOrEqual, true) => MachineOp::Int64LessThanOrEqual,
            (NumberOp::Equal, false) => MachineOp::Word32Equal,
            (NumberOp::LessThan, false) => MachineOp::Int32LessThan,
            (NumberOp::LessThanOrEqual, false) => MachineOp::Int32LessThanOrEqual,
            _ => return None,
        })
    }

    /// Overflow-checked signed 32-bit operator.
    pub fn int32_overflow_operator_for(op: NumberOp) -> Option<CheckedOp> {
        Some(match op {
            NumberOp::Add => CheckedOp::Int32Add,
            NumberOp::Subtract => CheckedOp::Int32Sub,
            NumberOp::Divide => CheckedOp::Int32Div,
            NumberOp::Modulus => CheckedOp::Int32Mod,
            _ => return None,
        })
    }

    /// Overflow-checked unsigned 32-bit operator.
    pub fn uint32_overflow_operator_for(op: NumberOp) -> Option<CheckedOp> {
        Some(match op {
            NumberOp::Divide => CheckedOp::Uint32Div,
            NumberOp::Modulus => CheckedOp::Uint32Mod,
            _ => return None,
        })
    }

    /// Overflow-checked signed 64-bit operator.
    pub fn int64_overflow_operator_for(op: NumberOp) -> Option<CheckedOp> {
        Some(match op {
            NumberOp::Add => CheckedOp::Int64Add,
            NumberOp::Subtract => CheckedOp::Int64Sub,
            _ => return None,
        })
    }
}

// =============================================================================
// Node Construction
// =============================================================================

fn unchecked(graph: &mut Graph, op: ConversionOp, input: NodeId, ty: Type) -> NodeId {
    debug_assert!(!op.is_checked());
    graph.add_typed_node(Operator::Convert(op), &[input], ty)
}

fn dead_value(graph: &mut Graph, rep: MachineRepresentation, input: NodeId) -> NodeId {
    graph.add_node(Operator::DeadValue(rep), &[input])
}

/// Effect input index, effect and control of a node on the effect chain.
fn effect_and_control(graph: &Graph, user: NodeId) -> Option<(usize, NodeId, NodeId)> {
    let node = graph.node(user);
    let index = node.shape().first_effect();
    Some((index, node.effect_input(0)?, node.control_input(0)?))
}

/// Add a conversion; checked ones are spliced before `user` on its effect chain.
fn insert_conversion(
    graph: &mut Graph,
    input: NodeId,
    op: ConversionOp,
    user: NodeId,
    ty: Type,
) -> LoweringResult<NodeId> {
    if !op.is_checked() {
        return Ok(unchecked(graph, op, input, ty));
    }
    let Some((index, effect, control)) = effect_and_control(graph, user) else {
        return Err(LoweringError::invariant(
            user,
            format!("checked conversion {op:?} needs an effect chain"),
        ));
    };
    let conversion = graph.add_typed_node(Operator::Convert(op), &[input, effect, control], ty);
    graph.replace_input(user, index, conversion);
    Ok(conversion)
}

/// Deoptimize unconditionally before `user` and return a dead value.
fn unconditional_deopt(
    graph: &mut Graph,
    user: NodeId,
    reason: DeoptimizeReason,
    rep: MachineRepresentation,
) -> LoweringResult<NodeId> {
    let Some((index, effect, control)) = effect_and_control(graph, user) else {
        return Err(LoweringError::invariant(
            user,
            format!("deoptimization {reason:?} needs an effect chain"),
        ));
    };
    let never = graph.int32_constant(0);
    let check = graph.add_node(Operator::Check(CheckOp::If(reason)), &[never, effect, control]);
    let unreachable = graph.add_node(Operator::Unreachable, &[check, control]);
    graph.replace_input(user, index, unreachable);
    Ok(dead_value(graph, rep, unreachable))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{HeapConstant, NumberOperationHint, SpeculativeOp};
    use crate::repr::IdentifyZeros;

    fn speculative_user(graph: &mut Graph, input: NodeId) -> NodeId {
        let start = graph.start;
        graph.add_node(
            Operator::Speculative(SpeculativeOp::NumberAdd, NumberOperationHint::SignedSmall),
            &[input, input, start, start],
        )
    }

    fn pure_user(graph: &mut Graph, input: NodeId) -> NodeId {
        graph.add_node(Operator::Number(NumberOp::Abs), &[input])
    }

    fn changer() -> RepresentationChanger {
        RepresentationChanger::new(Rep::Word64)
    }

    #[test]
    fn test_double_to_int32() {
        assert_eq!(double_to_int32(1.9), 1);
        assert_eq!(double_to_int32(-1.9), -1);
        assert_eq!(double_to_int32(4294967296.0 + 5.0), 5);
        assert_eq!(double_to_int32(2147483648.0), i32::MIN);
        assert_eq!(double_to_int32(f64::NAN), 0);
        assert_eq!(double_to_int32(f64::INFINITY), 0);
    }

    #[test]
    fn test_is_int32_double() {
        assert!(is_int32_double(-7.0));
        assert!(!is_int32_double(0.5));
        assert!(!is_int32_double(-0.0));
        assert!(!is_int32_double(2147483648.0));
    }

    #[test]
    fn test_same_representation_is_no_op() {
        let mut graph = Graph::new();
        let p = graph.parameter(0, Type::SIGNED32);
        let user = pure_user(&mut graph, p);
        let result = changer()
            .get_representation_for(&mut graph, p, Rep::Word32, Type::SIGNED32, user, UseInfo::truncating_word32())
            .unwrap();
        assert_eq!(result, p);
    }

    #[test]
    fn test_word32_to_tagged_signed31() {
        let mut graph = Graph::new();
        let p = graph.parameter(0, Type::SIGNED31);
        let user = pure_user(&mut graph, p);
        let result = changer()
            .get_representation_for(&mut graph, p, Rep::Word32, Type::SIGNED31, user, UseInfo::any_tagged())
            .unwrap();
        assert_eq!(
            graph.op(result),
            Operator::Convert(ConversionOp::ChangeInt31ToTaggedSigned)
        );
        assert_eq!(graph.node(result).value_input(0), Some(p));
    }

    #[test]
    fn test_checked_conversion_joins_effect_chain() {
        let mut graph = Graph::new();
        let p = graph.parameter(0, Type::NUMBER);
        let user = speculative_user(&mut graph, p);
        let use_info = UseInfo::checked_signed_small_as_word32(IdentifyZeros::DistinguishZeros);
        let result = changer()
            .get_representation_for(&mut graph, p, Rep::Tagged, Type::NUMBER, user, use_info)
            .unwrap();
        assert_eq!(
            graph.op(result),
            Operator::Convert(ConversionOp::CheckedTaggedSignedToInt32)
        );
        assert_eq!(graph.node(user).effect_input(0), Some(result));
        assert_eq!(graph.node(result).effect_input(0), Some(graph.start));
    }

    #[test]
    fn test_checked_conversion_without_effect_chain_fails() {
        let mut graph = Graph::new();
        let p = graph.parameter(0, Type::NUMBER);
        let user = pure_user(&mut graph, p);
        let use_info = UseInfo::checked_signed_small_as_word32(IdentifyZeros::DistinguishZeros);
        let result =
            changer().get_representation_for(&mut graph, p, Rep::Tagged, Type::NUMBER, user, use_info);
        assert!(matches!(result, Err(LoweringError::InvariantViolation { .. })));
    }

    #[test]
    fn test_number_constant_folds_to_word32() {
        let mut graph = Graph::new();
        let c = graph.number_constant(42.0);
        let user = pure_user(&mut graph, c);
        let result = changer()
            .get_representation_for(
                &mut graph,
                c,
                Rep::TaggedSigned,
                Type::constant(42.0),
                user,
                UseInfo::truncating_word32(),
            )
            .unwrap();
        assert_eq!(graph.op(result), Operator::Int32Constant(42));
    }

    #[test]
    fn test_boolean_constant_folds_to_bit() {
        let mut graph = Graph::new();
        let c = graph.heap_constant(HeapConstant::TRUE);
        let user = pure_user(&mut graph, c);
        let result = changer()
            .get_representation_for(
                &mut graph,
                c,
                Rep::TaggedPointer,
                Type::heap_constant(HeapConstant::TRUE),
                user,
                UseInfo::bool(),
            )
            .unwrap();
        assert_eq!(graph.op(result), Operator::Int32Constant(1));
    }

    #[test]
    fn test_impossible_conversion() {
        let mut graph = Graph::new();
        let p = graph.parameter(0, Type::STRING);
        let user = pure_user(&mut graph, p);
        let result = changer().get_representation_for(
            &mut graph,
            p,
            Rep::Tagged,
            Type::STRING,
            user,
            UseInfo::float64(),
        );
        assert!(matches!(result, Err(LoweringError::ImpossibleConversion { .. })));
    }

    #[test]
    fn test_bit_with_number_check_deopts() {
        let mut graph = Graph::new();
        let p = graph.parameter(0, Type::BOOLEAN);
        let user = speculative_user(&mut graph, p);
        let result = changer()
            .get_representation_for(
                &mut graph,
                p,
                Rep::Bit,
                Type::BOOLEAN,
                user,
                UseInfo::checked_number_as_float64(IdentifyZeros::DistinguishZeros),
            )
            .unwrap();
        assert_eq!(graph.op(result), Operator::DeadValue(Rep::Float64));
        let unreachable = graph.node(user).effect_input(0).unwrap();
        assert_eq!(graph.op(unreachable), Operator::Unreachable);
        let check = graph.node(unreachable).effect_input(0).unwrap();
        assert_eq!(
            graph.op(check),
            Operator::Check(CheckOp::If(DeoptimizeReason::NotAHeapNumber))
        );
    }

    #[test]
    fn test_none_type_becomes_dead_value() {
        let mut graph = Graph::new();
        let p = graph.parameter(0, Type::NONE);
        let user = pure_user(&mut graph, p);
        let result = changer()
            .get_representation_for(&mut graph, p, Rep::Tagged, Type::NONE, user, UseInfo::float64())
            .unwrap();
        assert_eq!(graph.op(result), Operator::DeadValue(Rep::Float64));
    }

    #[test]
    fn test_operator_tables() {
        assert_eq!(
            RepresentationChanger::int32_operator_for(NumberOp::ShiftRight),
            Some(MachineOp::Word32Sar)
        );
        assert_eq!(
            RepresentationChanger::uint32_operator_for(NumberOp::LessThan),
            Some(MachineOp::Uint32LessThan)
        );
        assert_eq!(
            RepresentationChanger::float64_operator_for(NumberOp::Floor),
            Some(MachineOp::Float64RoundDown)
        );
        assert_eq!(RepresentationChanger::int32_overflow_operator_for(NumberOp::Multiply), None);
    }
}
