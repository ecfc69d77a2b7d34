//! Per-operator visitation rules.
//!
//! Every rule runs unchanged in all three phases. It declares the use of
//! each input through `process_input`, settles its output through
//! `set_output` and, in LOWER, rewrites the node. Rules decide with
//! `type_of`, which is the static type during PROPAGATE and the feedback
//! type afterwards, so PROPAGATE may pick a more general path than the
//! phases that follow; truncations only ever over-approximate.
//!
//! The families:
//!
//! | Module      | Operators                                              |
//! |-------------|--------------------------------------------------------|
//! | `arith`     | add, subtract, multiply, divide, modulus               |
//! | `bitwise`   | bitwise and/or/xor, shifts, imul                       |
//! | `compare`   | number comparisons, reference equality, boolean ops    |
//! | `unary`     | abs, rounding, sign, min/max, int conversions          |
//! | `memory`    | field, element and typed-array loads and stores        |
//! | `phi`       | phi, select, type guard                                |
//! | `checks`    | guards                                                 |
//! | `calls`     | calls and fast API calls                               |
//! | `state`     | checkpoints, frame states, state values                 |
//! | `control`   | control flow, leaves, constants, dead values           |

mod arith;
mod bitwise;
mod calls;
mod checks;
mod compare;
mod control;
mod memory;
mod phi;
mod state;
mod unary;

pub use memory::write_barrier_kind_for;
pub use phi::output_representation_for_phi;

use super::selector::RepresentationSelector;
use crate::error::{LoweringError, LoweringResult};
use crate::ir::{NodeId, NumberOp, NumberOperationHint, Operator, SpeculativeOp, Type};
use crate::repr::{IdentifyZeros, MachineRepresentation, Truncation, TypeCheckKind, UseInfo};

type Rep = MachineRepresentation;

impl RepresentationSelector<'_> {
    /// Visit `node` in the current phase.
    pub(in crate::lower) fn visit_node(
        &mut self,
        node: NodeId,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        let op = self.graph.op(node);

        if self.lower() {
            if !op.has_effect_output()
                && !op.has_control_output()
                && !op.is_control()
                && !matches!(
                    op,
                    Operator::DeadValue(_)
                        | Operator::StateValues
                        | Operator::FrameState
                        | Operator::Phi(_)
                )
            {
                if self.kill_if_input_is_none(node) {
                    return Ok(());
                }
            } else {
                self.insert_unreachable_if_necessary(node);
            }
        }

        // Unused pure computations go away regardless of their operator.
        if op.is_pure()
            && truncation.is_unused()
            && self.graph.node(node).value_input_count() > 0
        {
            return self.visit_unused(node);
        }

        match op {
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
            | Operator::Unreachable
            | Operator::Dead
            | Operator::DeadValue(_) => self.visit_control(node, op),

            Operator::Parameter(_)
            | Operator::Int32Constant(_)
            | Operator::Int64Constant(_)
            | Operator::Float32Constant(_)
            | Operator::Float64Constant(_)
            | Operator::NumberConstant(_)
            | Operator::HeapConstant(_) => self.visit_leaf_op(node, op),

            Operator::Phi(_) => self.visit_phi(node, truncation),
            Operator::Select(_) => self.visit_select(node, truncation),
            Operator::TypeGuard => self.visit_type_guard(node, truncation),

            Operator::Checkpoint => self.visit_checkpoint(node),
            Operator::FrameState => self.visit_frame_state(node),
            Operator::StateValues => self.visit_state_values(node),

            Operator::Number(number_op) => self.visit_number_op(node, number_op, truncation),
            Operator::Speculative(spec_op, hint) => {
                self.visit_speculative_op(node, spec_op, hint, truncation)
            }
            Operator::BooleanNot => self.visit_boolean_not(node),
            Operator::ReferenceEqual => self.visit_reference_equal(node),

            Operator::LoadField(access) => self.visit_load_field(node, access),
            Operator::StoreField(access) => self.visit_store_field(node, access),
            Operator::LoadElement(access) => self.visit_load_element(node, access),
            Operator::StoreElement(access) => self.visit_store_element(node, access),
            Operator::LoadTypedElement(array) => self.visit_load_typed_element(node, array),
            Operator::StoreTypedElement(array) => self.visit_store_typed_element(node, array),

            Operator::Check(check) => self.visit_check(node, check, truncation),
            Operator::Call(descriptor) => self.visit_call(node, descriptor),
            Operator::FastApiCall(info) => self.visit_fast_api_call(node, info),

            Operator::TypedStateValues(_)
            | Operator::Machine(_)
            | Operator::Checked(_)
            | Operator::Convert(_) => Err(LoweringError::UnsupportedOpcode {
                node,
                op: op.to_string(),
            }),
        }
    }

    fn visit_number_op(
        &mut self,
        node: NodeId,
        op: NumberOp,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        match op {
            NumberOp::Add | NumberOp::Subtract => self.visit_number_additive(node, op, truncation),
            NumberOp::Multiply => self.visit_number_multiply(node, truncation),
            NumberOp::Divide => self.visit_number_divide(node, truncation),
            NumberOp::Modulus => self.visit_number_modulus(node, truncation),
            NumberOp::BitwiseAnd | NumberOp::BitwiseOr | NumberOp::BitwiseXor => {
                self.visit_number_bitwise(node, op)
            }
            NumberOp::ShiftLeft | NumberOp::ShiftRight | NumberOp::ShiftRightLogical => {
                self.visit_number_shift(node, op)
            }
            NumberOp::Imul => self.visit_number_imul(node),
            NumberOp::Equal | NumberOp::LessThan | NumberOp::LessThanOrEqual => {
                self.visit_number_comparison(node, op)
            }
            NumberOp::ToBoolean => self.visit_number_to_boolean(node),
            NumberOp::Abs => self.visit_number_abs(node),
            NumberOp::Ceil | NumberOp::Floor | NumberOp::Round | NumberOp::Trunc => {
                self.visit_number_rounding(node, op, truncation)
            }
            NumberOp::Sign => self.visit_number_sign(node),
            NumberOp::SilenceNaN => self.visit_number_silence_nan(node),
            NumberOp::Max | NumberOp::Min => self.visit_number_max_min(node, op, truncation),
            NumberOp::ToInt32 | NumberOp::ToUint32 => self.visit_number_to_word32(node),
        }
    }

    fn visit_speculative_op(
        &mut self,
        node: NodeId,
        op: SpeculativeOp,
        hint: NumberOperationHint,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        match op {
            SpeculativeOp::NumberAdd | SpeculativeOp::NumberSubtract => {
                self.visit_speculative_additive(node, op, hint, truncation)
            }
            SpeculativeOp::SafeIntegerAdd | SpeculativeOp::SafeIntegerSubtract => {
                self.visit_speculative_integer_additive(node, op, hint, truncation)
            }
            SpeculativeOp::NumberMultiply => {
                self.visit_speculative_multiply(node, hint, truncation)
            }
            SpeculativeOp::NumberDivide => self.visit_speculative_divide(node, hint, truncation),
            SpeculativeOp::NumberModulus => {
                self.visit_speculative_modulus(node, hint, truncation)
            }
            SpeculativeOp::NumberBitwiseAnd
            | SpeculativeOp::NumberBitwiseOr
            | SpeculativeOp::NumberBitwiseXor => self.visit_speculative_bitwise(node, op, hint),
            SpeculativeOp::NumberShiftLeft | SpeculativeOp::NumberShiftRight => {
                self.visit_speculative_shift(node, op, hint)
            }
            SpeculativeOp::NumberShiftRightLogical => {
                self.visit_speculative_shift_right_logical(node, hint, truncation)
            }
            SpeculativeOp::NumberEqual
            | SpeculativeOp::NumberLessThan
            | SpeculativeOp::NumberLessThanOrEqual => {
                self.visit_speculative_comparison(node, op, hint)
            }
            SpeculativeOp::ToNumber => self.visit_speculative_to_number(node, hint, truncation),
        }
    }

    // =========================================================================
    // Shared Shapes
    // =========================================================================

    /// Two value inputs, then the remaining inputs, then the output.
    fn visit_binop(
        &mut self,
        node: NodeId,
        left: UseInfo,
        right: UseInfo,
        output: Rep,
        restriction: Type,
    ) -> LoweringResult<()> {
        self.process_input(node, 0, left)?;
        self.process_input(node, 1, right)?;
        self.process_remaining_inputs(node, 2)?;
        self.set_output(node, output, restriction)
    }

    #[inline]
    fn visit_binop_same(&mut self, node: NodeId, input: UseInfo, output: Rep) -> LoweringResult<()> {
        self.visit_binop(node, input, input, output, Type::ANY)
    }

    fn visit_unop(
        &mut self,
        node: NodeId,
        input: UseInfo,
        output: Rep,
        restriction: Type,
    ) -> LoweringResult<()> {
        self.process_input(node, 0, input)?;
        self.process_remaining_inputs(node, 1)?;
        self.set_output(node, output, restriction)
    }

    fn visit_leaf(&mut self, node: NodeId, output: Rep) -> LoweringResult<()> {
        debug_assert_eq!(self.graph.node(node).value_input_count(), 0);
        self.process_remaining_inputs(node, 0)?;
        self.set_output_rep(node, output)
    }

    /// Nobody observes the value: inputs carry no demand and LOWER kills
    /// the node.
    fn visit_unused(&mut self, node: NodeId) -> LoweringResult<()> {
        let (first_effect, count) = {
            let n = self.graph.node(node);
            (n.shape().first_effect(), n.input_count())
        };
        for i in 0..first_effect.min(count) {
            self.process_input(node, i, UseInfo::none())?;
        }
        self.process_remaining_inputs(node, first_effect)?;
        if self.lower() {
            self.kill(node);
        }
        Ok(())
    }

    fn visit_word32_truncating_binop(&mut self, node: NodeId) -> LoweringResult<()> {
        self.visit_binop_same(node, UseInfo::truncating_word32(), Rep::Word32)
    }

    fn visit_float64_binop(&mut self, node: NodeId) -> LoweringResult<()> {
        self.visit_binop_same(
            node,
            UseInfo::truncating_float64(IdentifyZeros::DistinguishZeros),
            Rep::Float64,
        )
    }

    fn visit_int64_binop(&mut self, node: NodeId) -> LoweringResult<()> {
        self.visit_binop_same(node, UseInfo::word64(IdentifyZeros::DistinguishZeros), Rep::Word64)
    }

    /// Keep the input as the result; the output follows the node's type.
    fn visit_noop(&mut self, node: NodeId, truncation: Truncation) -> LoweringResult<()> {
        if truncation.is_unused() {
            return self.visit_unused(node);
        }
        let rep = output_representation_for_phi(self.type_of(node), truncation, self.config.is_64bit());
        self.visit_unop(node, UseInfo::new(rep, truncation, TypeCheckKind::None), rep, Type::ANY)?;
        if self.lower() {
            let input = self.input(node, 0)?;
            self.defer_replacement(node, input);
        }
        Ok(())
    }

    // =========================================================================
    // Type Queries
    // =========================================================================

    /// Type of value input `index`; `NONE` when absent.
    fn input_type(&self, node: NodeId, index: usize) -> Type {
        self.graph
            .node(node)
            .value_input(index)
            .map_or(Type::NONE, |input| self.type_of(input))
    }

    #[inline]
    fn input_is(&self, node: NodeId, ty: Type) -> bool {
        self.input_type(node, 0).is(ty)
    }

    #[inline]
    fn input_cannot_be(&self, node: NodeId, ty: Type) -> bool {
        !self.input_type(node, 0).maybe(ty)
    }

    #[inline]
    fn both_inputs_are(&self, node: NodeId, ty: Type) -> bool {
        self.input_type(node, 0).is(ty) && self.input_type(node, 1).is(ty)
    }

    #[inline]
    fn one_input_cannot_be(&self, node: NodeId, ty: Type) -> bool {
        !self.input_type(node, 0).maybe(ty) || !self.input_type(node, 1).maybe(ty)
    }

    /// Static type of value input `index`, ignoring feedback.
    fn input_upper_bound(&self, node: NodeId, index: usize) -> Type {
        self.graph
            .node(node)
            .value_input(index)
            .map_or(Type::NONE, |input| self.graph.ty(input))
    }
}

// =============================================================================
// Hint Conversions
// =============================================================================

#[inline]
fn is_word32_type(ty: Type) -> bool {
    ty.is(Type::SIGNED32) || ty.is(Type::UNSIGNED32)
}

/// Checked word32 use matching the feedback of a speculative operation.
fn checked_use_as_word32_from_hint(hint: NumberOperationHint, identify_zeros: IdentifyZeros) -> UseInfo {
    match hint {
        NumberOperationHint::SignedSmall | NumberOperationHint::SignedSmallInputs => {
            UseInfo::checked_signed_small_as_word32(identify_zeros)
        }
        NumberOperationHint::Signed32 => UseInfo::checked_signed32_as_word32(identify_zeros),
        NumberOperationHint::Number | NumberOperationHint::NumberOrBoolean => {
            UseInfo::checked_number_as_word32()
        }
        NumberOperationHint::NumberOrOddball => UseInfo::checked_number_or_oddball_as_word32(),
    }
}

/// Checked float64 use matching the feedback of a speculative operation.
fn checked_use_as_float64_from_hint(hint: NumberOperationHint, identify_zeros: IdentifyZeros) -> UseInfo {
    match hint {
        NumberOperationHint::NumberOrBoolean => {
            UseInfo::checked_number_or_boolean_as_float64(identify_zeros)
        }
        NumberOperationHint::NumberOrOddball => {
            UseInfo::checked_number_or_oddball_as_float64(identify_zeros)
        }
        NumberOperationHint::SignedSmall
        | NumberOperationHint::SignedSmallInputs
        | NumberOperationHint::Signed32
        | NumberOperationHint::Number => UseInfo::checked_number_as_float64(identify_zeros),
    }
}

/// Truncating use for a value passed or stored as `rep`.
fn truncating_use_for(node: NodeId, rep: Rep) -> LoweringResult<UseInfo> {
    UseInfo::truncating_from_representation(rep).ok_or_else(|| {
        LoweringError::invariant(node, format!("no value use can demand {rep}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word32_hint_uses() {
        let iz = IdentifyZeros::DistinguishZeros;
        assert_eq!(
            checked_use_as_word32_from_hint(NumberOperationHint::SignedSmallInputs, iz),
            UseInfo::checked_signed_small_as_word32(iz)
        );
        assert_eq!(
            checked_use_as_word32_from_hint(NumberOperationHint::NumberOrBoolean, iz),
            UseInfo::checked_number_as_word32()
        );
    }

    #[test]
    fn test_float64_hint_uses() {
        let iz = IdentifyZeros::IdentifyZeros;
        assert_eq!(
            checked_use_as_float64_from_hint(NumberOperationHint::Signed32, iz),
            UseInfo::checked_number_as_float64(iz)
        );
        assert_eq!(
            checked_use_as_float64_from_hint(NumberOperationHint::NumberOrOddball, iz),
            UseInfo::checked_number_or_oddball_as_float64(iz)
        );
    }

    #[test]
    fn test_truncating_use_rejects_none() {
        assert!(truncating_use_for(NodeId::new(1), Rep::None).is_err());
        assert_eq!(
            truncating_use_for(NodeId::new(1), Rep::Word8).unwrap(),
            UseInfo::truncating_word32()
        );
    }
}
