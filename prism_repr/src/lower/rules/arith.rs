//! Add, subtract, multiply, divide and modulus.
//!
//! Each operation prefers a word32 form when the operand types and the
//! truncation make the 32-bit result exact (or make the high bits
//! unobservable), falls back to the feedback hint for a checked word32
//! form, and otherwise computes in float64.

use super::super::machine_lowering::DivisionLowering;
use super::super::selector::RepresentationSelector;
use super::{
    checked_use_as_float64_from_hint, checked_use_as_word32_from_hint, is_word32_type, Rep,
};
use crate::error::{LoweringError, LoweringResult};
use crate::ir::{
    CheckedOp, MachineOp, NodeId, NumberOp, NumberOperationHint, Operator, SpeculativeOp, Type,
};
use crate::lower::changer::RepresentationChanger;
use crate::repr::{CheckForMinusZeroMode, IdentifyZeros, Truncation, UseInfo};

impl RepresentationSelector<'_> {
    // =========================================================================
    // Rewrites
    // =========================================================================

    fn change_to_int32_op(&mut self, node: NodeId, op: NumberOp) -> LoweringResult<()> {
        let machine = RepresentationChanger::int32_operator_for(op)
            .ok_or_else(|| LoweringError::invariant(node, format!("no int32 form of {op:?}")))?;
        self.change_to_pure_op(node, Operator::Machine(machine))
    }

    fn change_to_int64_op(&mut self, node: NodeId, op: NumberOp) -> LoweringResult<()> {
        let machine = RepresentationChanger::int64_operator_for(op)
            .ok_or_else(|| LoweringError::invariant(node, format!("no int64 form of {op:?}")))?;
        self.change_to_pure_op(node, Operator::Machine(machine))
    }

    pub(super) fn change_to_float64_op(&mut self, node: NodeId, op: NumberOp) -> LoweringResult<()> {
        let machine = RepresentationChanger::float64_operator_for(op)
            .ok_or_else(|| LoweringError::invariant(node, format!("no float64 form of {op:?}")))?;
        self.change_to_pure_op(node, Operator::Machine(machine))
    }

    /// Keep the effect and control inputs: the checked op deoptimizes.
    fn change_to_int32_overflow_op(&mut self, node: NodeId, op: NumberOp) -> LoweringResult<()> {
        let checked = RepresentationChanger::int32_overflow_operator_for(op)
            .ok_or_else(|| LoweringError::invariant(node, format!("no checked int32 form of {op:?}")))?;
        self.change_op(node, Operator::Checked(checked));
        Ok(())
    }

    fn change_to_uint32_overflow_op(&mut self, node: NodeId, op: NumberOp) -> LoweringResult<()> {
        let checked = RepresentationChanger::uint32_overflow_operator_for(op)
            .ok_or_else(|| LoweringError::invariant(node, format!("no checked uint32 form of {op:?}")))?;
        self.change_op(node, Operator::Checked(checked));
        Ok(())
    }

    /// Lower to truncated machine division, expanded into its guarded form
    /// when integer division lowering is enabled.
    fn lower_integer_division(&mut self, node: NodeId, op: MachineOp) -> LoweringResult<()> {
        if !self.config.lower_integer_division {
            return self.change_to_pure_op(node, Operator::Machine(op));
        }
        let lhs = self.input(node, 0)?;
        let rhs = self.input(node, 1)?;
        let mut lowering = DivisionLowering::new(&mut *self.graph);
        let replacement = match op {
            MachineOp::Int32Div => lowering.int32_div(lhs, rhs),
            MachineOp::Int32Mod => lowering.int32_mod(lhs, rhs),
            MachineOp::Uint32Div => lowering.uint32_div(lhs, rhs),
            MachineOp::Uint32Mod => lowering.uint32_mod(lhs, rhs),
            _ => {
                return Err(LoweringError::invariant(
                    node,
                    format!("{op:?} is not an integer division"),
                ))
            }
        };
        self.defer_replacement(node, replacement);
        Ok(())
    }

    // =========================================================================
    // Add / Subtract
    // =========================================================================

    pub(super) fn visit_number_additive(
        &mut self,
        node: NodeId,
        op: NumberOp,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        if self.both_inputs_are(node, Type::ADDITIVE_SAFE_INTEGER_OR_MINUS_ZERO)
            && (is_word32_type(self.type_of(node)) || truncation.is_used_as_word32())
        {
            self.visit_word32_truncating_binop(node)?;
            if self.lower() {
                self.change_to_int32_op(node, op)?;
            }
        } else if self.config.is_64bit()
            && self.both_inputs_are(node, Type::SAFE_INTEGER)
            && self.graph.ty(node).is(Type::SAFE_INTEGER)
        {
            self.visit_int64_binop(node)?;
            if self.lower() {
                self.change_to_int64_op(node, op)?;
            }
        } else {
            self.visit_float64_binop(node)?;
            if self.lower() {
                self.change_to_float64_op(node, op)?;
            }
        }
        Ok(())
    }

    /// `SpeculativeNumberAdd` / `SpeculativeNumberSubtract`.
    pub(super) fn visit_speculative_additive(
        &mut self,
        node: NodeId,
        op: SpeculativeOp,
        hint: NumberOperationHint,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        if matches!(
            hint,
            NumberOperationHint::SignedSmall | NumberOperationHint::Signed32
        ) {
            return self.visit_speculative_integer_additive(node, op, hint, truncation);
        }

        let number_op = additive_number_op(op);
        if self.both_inputs_are(node, Type::ADDITIVE_SAFE_INTEGER_OR_MINUS_ZERO)
            && (is_word32_type(self.graph.ty(node)) || truncation.is_used_as_word32())
        {
            self.visit_word32_truncating_binop(node)?;
            if self.lower() {
                self.change_to_int32_op(node, number_op)?;
            }
            return Ok(());
        }

        let input = checked_use_as_float64_from_hint(hint, IdentifyZeros::DistinguishZeros);
        self.visit_binop(node, input, input, Rep::Float64, Type::NUMBER)?;
        if self.lower() {
            self.change_to_float64_op(node, number_op)?;
        }
        Ok(())
    }

    /// Integer addition with signed-small feedback.
    pub(super) fn visit_speculative_integer_additive(
        &mut self,
        node: NodeId,
        op: SpeculativeOp,
        hint: NumberOperationHint,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        let number_op = additive_number_op(op);
        let is_add = number_op == NumberOp::Add;
        let left_upper = self.input_upper_bound(node, 0);
        let right_upper = self.input_upper_bound(node, 1);

        if left_upper.is(Type::ADDITIVE_SAFE_INTEGER_OR_MINUS_ZERO)
            && right_upper.is(Type::ADDITIVE_SAFE_INTEGER_OR_MINUS_ZERO)
        {
            // The typing rule only holds for safe integers, so only then may
            // the node disappear.
            if truncation.is_unused() {
                return self.visit_unused(node);
            }
            if is_word32_type(self.graph.ty(node)) || truncation.is_used_as_word32() {
                self.visit_word32_truncating_binop(node)?;
                if self.lower() {
                    self.change_to_int32_op(node, number_op)?;
                }
                return Ok(());
            }
        }

        let hint = match hint {
            NumberOperationHint::Signed32 => NumberOperationHint::Signed32,
            _ => NumberOperationHint::SignedSmall,
        };
        let left_feedback = self.input_type(node, 0);
        let right_feedback = self.input_type(node, 1);

        // A Signed32 restriction promises no overflow, which a word32
        // truncation cannot keep; -0 stays in unless the uses drop it.
        let restriction = if truncation.is_used_as_word32() {
            Type::ANY
        } else if truncation.identifies_zero_and_minus_zero() {
            Type::SIGNED32_OR_MINUS_ZERO
        } else {
            Type::SIGNED32
        };

        // -0 - 0 is -0, so subtraction needs a Signed32 left operand.
        let left_constraint = if is_add {
            Type::SIGNED32_OR_MINUS_ZERO
        } else {
            Type::SIGNED32
        };
        if left_upper.is(left_constraint)
            && right_upper.is(Type::SIGNED32_OR_MINUS_ZERO)
            && (left_upper.is(Type::SIGNED32) || right_upper.is(Type::SIGNED32))
        {
            let input = UseInfo::truncating_word32();
            self.visit_binop(node, input, input, Rep::Word32, restriction)?;
        } else {
            let left_identify_zeros = if is_add && !right_feedback.maybe(Type::MINUS_ZERO) {
                IdentifyZeros::IdentifyZeros
            } else {
                truncation.identify_zeros()
            };
            let left = checked_use_as_word32_from_hint(hint, left_identify_zeros);
            let right = checked_use_as_word32_from_hint(hint, IdentifyZeros::IdentifyZeros);
            self.visit_binop(node, left, right, Rep::Word32, restriction)?;
        }

        if self.lower() {
            if truncation.is_used_as_word32()
                || !can_overflow_signed32(number_op, left_feedback, right_feedback)
            {
                self.change_to_int32_op(node, number_op)?;
            } else {
                self.change_to_int32_overflow_op(node, number_op)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Multiply
    // =========================================================================

    /// Integral inputs whose product is exact in, or truncated to, 32 bits.
    fn is_word32_multiply(&self, node: NodeId, node_type: Type, truncation: Truncation) -> bool {
        self.both_inputs_are(node, Type::INTEGRAL32)
            && (is_word32_type(node_type)
                || (truncation.is_used_as_word32()
                    && node_type.is(Type::SAFE_INTEGER_OR_MINUS_ZERO)))
    }

    pub(super) fn visit_number_multiply(
        &mut self,
        node: NodeId,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        if self.is_word32_multiply(node, self.type_of(node), truncation) {
            self.visit_word32_truncating_binop(node)?;
            if self.lower() {
                self.change_to_int32_op(node, NumberOp::Multiply)?;
            }
            return Ok(());
        }
        self.visit_float64_binop(node)?;
        if self.lower() {
            self.change_to_float64_op(node, NumberOp::Multiply)?;
        }
        Ok(())
    }

    pub(super) fn visit_speculative_multiply(
        &mut self,
        node: NodeId,
        hint: NumberOperationHint,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        if self.is_word32_multiply(node, self.graph.ty(node), truncation) {
            self.visit_word32_truncating_binop(node)?;
            if self.lower() {
                self.change_to_int32_op(node, NumberOp::Multiply)?;
            }
            return Ok(());
        }

        if matches!(
            hint,
            NumberOperationHint::SignedSmall | NumberOperationHint::Signed32
        ) {
            let input = if self.both_inputs_are(node, Type::SIGNED32) {
                UseInfo::truncating_word32()
            } else {
                checked_use_as_word32_from_hint(hint, IdentifyZeros::DistinguishZeros)
            };
            return self.visit_checked_int32_mul(node, truncation, input);
        }

        let input = checked_use_as_float64_from_hint(hint, IdentifyZeros::DistinguishZeros);
        self.visit_binop(node, input, input, Rep::Float64, Type::NUMBER)?;
        if self.lower() {
            self.change_to_float64_op(node, NumberOp::Multiply)?;
        }
        Ok(())
    }

    fn visit_checked_int32_mul(
        &mut self,
        node: NodeId,
        truncation: Truncation,
        input: UseInfo,
    ) -> LoweringResult<()> {
        // A positive factor cannot produce -0.
        let (mode, restriction) = if is_some_positive_ordered_number(self.input_type(node, 0))
            || is_some_positive_ordered_number(self.input_type(node, 1))
        {
            (CheckForMinusZeroMode::DontCheckForMinusZero, Type::SIGNED32)
        } else if truncation.identifies_zero_and_minus_zero() {
            (CheckForMinusZeroMode::DontCheckForMinusZero, Type::SIGNED32_OR_MINUS_ZERO)
        } else {
            (CheckForMinusZeroMode::CheckForMinusZero, Type::SIGNED32)
        };
        self.visit_binop(node, input, input, Rep::Word32, restriction)?;
        if self.lower() {
            self.change_op(node, Operator::Checked(CheckedOp::Int32Mul(mode)));
        }
        Ok(())
    }

    // =========================================================================
    // Divide
    // =========================================================================

    pub(super) fn visit_number_divide(
        &mut self,
        node: NodeId,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        let node_type = self.type_of(node);
        if self.both_inputs_are(node, Type::UNSIGNED32)
            && (truncation.is_used_as_word32() || node_type.is(Type::UNSIGNED32))
        {
            self.visit_word32_truncating_binop(node)?;
            if self.lower() {
                self.lower_integer_division(node, MachineOp::Uint32Div)?;
            }
            return Ok(());
        }
        if self.both_inputs_are(node, Type::SIGNED32)
            && (truncation.is_used_as_word32() || node_type.is(Type::SIGNED32))
        {
            self.visit_word32_truncating_binop(node)?;
            if self.lower() {
                self.lower_integer_division(node, MachineOp::Int32Div)?;
            }
            return Ok(());
        }
        self.visit_float64_binop(node)?;
        if self.lower() {
            self.change_to_float64_op(node, NumberOp::Divide)?;
        }
        Ok(())
    }

    pub(super) fn visit_speculative_divide(
        &mut self,
        node: NodeId,
        hint: NumberOperationHint,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        let unsigned_inputs = self.both_inputs_are(node, Type::UNSIGNED32);
        let signed_inputs = self.both_inputs_are(node, Type::SIGNED32);

        if unsigned_inputs && truncation.is_used_as_word32() {
            self.visit_word32_truncating_binop(node)?;
            if self.lower() {
                self.lower_integer_division(node, MachineOp::Uint32Div)?;
            }
            return Ok(());
        }
        if signed_inputs
            && (self.graph.ty(node).is(Type::SIGNED32) || truncation.is_used_as_word32())
        {
            self.visit_word32_truncating_binop(node)?;
            if self.lower() {
                self.lower_integer_division(node, MachineOp::Int32Div)?;
            }
            return Ok(());
        }

        // Inputs already integral: only the result needs a check.
        if hint == NumberOperationHint::SignedSmall && (unsigned_inputs || signed_inputs) {
            let input = UseInfo::truncating_word32();
            let restriction = if unsigned_inputs {
                Type::UNSIGNED32
            } else {
                Type::SIGNED32
            };
            self.visit_binop(node, input, input, Rep::Word32, restriction)?;
            if self.lower() {
                if unsigned_inputs {
                    self.change_to_uint32_overflow_op(node, NumberOp::Divide)?;
                } else {
                    self.change_to_int32_overflow_op(node, NumberOp::Divide)?;
                }
            }
            return Ok(());
        }

        if matches!(
            hint,
            NumberOperationHint::SignedSmall | NumberOperationHint::SignedSmallInputs
        ) {
            let input = checked_use_as_word32_from_hint(hint, IdentifyZeros::DistinguishZeros);
            if truncation.is_used_as_word32() {
                // Truncated: only the inputs need checking.
                self.visit_binop(node, input, input, Rep::Word32, Type::ANY)?;
                if self.lower() {
                    self.lower_integer_division(node, MachineOp::Int32Div)?;
                }
                return Ok(());
            }
            if hint == NumberOperationHint::SignedSmall {
                self.visit_binop(node, input, input, Rep::Word32, Type::SIGNED32)?;
                if self.lower() {
                    self.change_to_int32_overflow_op(node, NumberOp::Divide)?;
                }
                return Ok(());
            }
        }

        let input = UseInfo::checked_number_or_oddball_as_float64(IdentifyZeros::DistinguishZeros);
        self.visit_binop(node, input, input, Rep::Float64, Type::NUMBER)?;
        if self.lower() {
            self.change_to_float64_op(node, NumberOp::Divide)?;
        }
        Ok(())
    }

    // =========================================================================
    // Modulus
    // =========================================================================

    pub(super) fn visit_number_modulus(
        &mut self,
        node: NodeId,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        let node_type = self.type_of(node);
        if self.both_inputs_are(node, Type::UNSIGNED32_OR_MINUS_ZERO_OR_NAN)
            && (truncation.is_used_as_word32() || node_type.is(Type::UNSIGNED32))
        {
            self.visit_word32_truncating_binop(node)?;
            if self.lower() {
                self.lower_integer_division(node, MachineOp::Uint32Mod)?;
            }
            return Ok(());
        }
        if self.both_inputs_are(node, Type::SIGNED32_OR_MINUS_ZERO_OR_NAN)
            && (truncation.is_used_as_word32()
                || node_type.is(Type::SIGNED32)
                || (truncation.identifies_zero_and_minus_zero()
                    && node_type.is(Type::SIGNED32_OR_MINUS_ZERO)))
        {
            self.visit_word32_truncating_binop(node)?;
            if self.lower() {
                self.lower_integer_division(node, MachineOp::Int32Mod)?;
            }
            return Ok(());
        }

        // The sign of the divisor never shows in the result.
        let left = UseInfo::truncating_float64(truncation.identify_zeros());
        let right = UseInfo::truncating_float64(IdentifyZeros::IdentifyZeros);
        self.visit_binop(node, left, right, Rep::Float64, Type::ANY)?;
        if self.lower() {
            self.change_to_float64_op(node, NumberOp::Modulus)?;
        }
        Ok(())
    }

    pub(super) fn visit_speculative_modulus(
        &mut self,
        node: NodeId,
        hint: NumberOperationHint,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        let node_type = self.graph.ty(node);
        if self.both_inputs_are(node, Type::UNSIGNED32_OR_MINUS_ZERO_OR_NAN)
            && (truncation.is_used_as_word32() || node_type.is(Type::UNSIGNED32))
        {
            self.visit_word32_truncating_binop(node)?;
            if self.lower() {
                self.lower_integer_division(node, MachineOp::Uint32Mod)?;
            }
            return Ok(());
        }
        if self.both_inputs_are(node, Type::SIGNED32_OR_MINUS_ZERO_OR_NAN)
            && (truncation.is_used_as_word32() || node_type.is(Type::SIGNED32))
        {
            self.visit_word32_truncating_binop(node)?;
            if self.lower() {
                self.lower_integer_division(node, MachineOp::Int32Mod)?;
            }
            return Ok(());
        }

        let unsigned_inputs = self.both_inputs_are(node, Type::UNSIGNED32);
        let signed_inputs = self.both_inputs_are(node, Type::SIGNED32);
        if hint == NumberOperationHint::SignedSmall && (unsigned_inputs || signed_inputs) {
            let input = UseInfo::truncating_word32();
            let restriction = if unsigned_inputs {
                Type::UNSIGNED32
            } else {
                Type::SIGNED32
            };
            self.visit_binop(node, input, input, Rep::Word32, restriction)?;
            if self.lower() {
                if unsigned_inputs {
                    self.change_to_uint32_overflow_op(node, NumberOp::Modulus)?;
                } else {
                    self.change_to_int32_overflow_op(node, NumberOp::Modulus)?;
                }
            }
            return Ok(());
        }

        if hint == NumberOperationHint::SignedSmall {
            let left = checked_use_as_word32_from_hint(hint, truncation.identify_zeros());
            let right = checked_use_as_word32_from_hint(hint, IdentifyZeros::IdentifyZeros);
            let identifies_zeros = truncation.identifies_zero_and_minus_zero();
            if truncation.is_used_as_word32() {
                self.visit_binop(node, left, right, Rep::Word32, Type::ANY)?;
                if self.lower() {
                    self.lower_integer_division(node, MachineOp::Int32Mod)?;
                }
            } else if self.both_inputs_are(node, Type::UNSIGNED32_OR_MINUS_ZERO_OR_NAN) {
                let restriction = if identifies_zeros {
                    Type::UNSIGNED32_OR_MINUS_ZERO
                } else {
                    Type::UNSIGNED32
                };
                self.visit_binop(node, left, right, Rep::Word32, restriction)?;
                if self.lower() {
                    self.change_to_uint32_overflow_op(node, NumberOp::Modulus)?;
                }
            } else {
                let restriction = if identifies_zeros {
                    Type::SIGNED32_OR_MINUS_ZERO
                } else {
                    Type::SIGNED32
                };
                self.visit_binop(node, left, right, Rep::Word32, restriction)?;
                if self.lower() {
                    self.change_to_int32_overflow_op(node, NumberOp::Modulus)?;
                }
            }
            return Ok(());
        }

        let left = UseInfo::checked_number_or_oddball_as_float64(truncation.identify_zeros());
        let right = UseInfo::checked_number_or_oddball_as_float64(IdentifyZeros::IdentifyZeros);
        self.visit_binop(node, left, right, Rep::Float64, Type::NUMBER)?;
        if self.lower() {
            self.change_to_float64_op(node, NumberOp::Modulus)?;
        }
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn additive_number_op(op: SpeculativeOp) -> NumberOp {
    match op {
        SpeculativeOp::NumberSubtract | SpeculativeOp::SafeIntegerSubtract => NumberOp::Subtract,
        _ => NumberOp::Add,
    }
}

fn is_some_positive_ordered_number(ty: Type) -> bool {
    ty.is(Type::ORDERED_NUMBER) && (ty.is_none() || ty.min() > 0.0)
}

/// Whether a 32-bit add or subtract of operands typed `left` and `right`
/// may leave the Signed32 range. `-0` operands count as `0`.
pub(super) fn can_overflow_signed32(op: NumberOp, left: Type, right: Type) -> bool {
    let normalize = |ty: Type| {
        let ty = if ty.maybe(Type::MINUS_ZERO) {
            Type::union(ty, Type::SINGLETON_ZERO)
        } else {
            ty
        };
        Type::intersect(ty, Type::SIGNED32)
    };
    let left = normalize(left);
    let right = normalize(right);
    if left.is_none() || right.is_none() {
        return false;
    }
    let (max, min) = (f64::from(i32::MAX), f64::from(i32::MIN));
    match op {
        NumberOp::Add => left.max() + right.max() > max || left.min() + right.min() < min,
        NumberOp::Subtract => left.max() - right.min() > max || left.min() - right.max() < min,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_overflow_signed32() {
        let small = Type::range(0.0, 100.0);
        assert!(!can_overflow_signed32(NumberOp::Add, small, small));
        assert!(can_overflow_signed32(NumberOp::Add, Type::SIGNED32, small));
        assert!(can_overflow_signed32(NumberOp::Subtract, small, Type::SIGNED32));
        assert!(!can_overflow_signed32(NumberOp::Subtract, small, small));
    }

    #[test]
    fn test_minus_zero_counts_as_zero() {
        let with_minus_zero = Type::union(Type::range(1.0, 5.0), Type::MINUS_ZERO);
        assert!(!can_overflow_signed32(NumberOp::Add, with_minus_zero, Type::range(0.0, 7.0)));
    }

    #[test]
    fn test_positive_ordered_number() {
        assert!(is_some_positive_ordered_number(Type::range(1.0, 9.0)));
        assert!(!is_some_positive_ordered_number(Type::range(0.0, 9.0)));
        assert!(!is_some_positive_ordered_number(Type::NUMBER));
    }
}
