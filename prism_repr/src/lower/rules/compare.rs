//! Comparisons and boolean operators.
//!
//! Number comparisons identify `0` and `-0`, so inputs always take an
//! identify-zeros use and `-0` may be truncated to `0` for integer inputs.

use super::super::selector::RepresentationSelector;
use super::{checked_use_as_float64_from_hint, checked_use_as_word32_from_hint, Rep};
use crate::error::{LoweringError, LoweringResult};
use crate::ir::{HeapConstant, MachineOp, NodeId, NumberOp, NumberOperationHint, Operator, SpeculativeOp, Type};
use crate::lower::changer::RepresentationChanger;
use crate::lower::Phase;
use crate::repr::{IdentifyZeros, UseInfo};

/// Which machine comparison fits both operand types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareKind {
    Unsigned32,
    Signed32,
    Float64,
}

impl RepresentationSelector<'_> {
    pub(super) fn visit_number_comparison(&mut self, node: NodeId, op: NumberOp) -> LoweringResult<()> {
        let lhs = self.input_type(node, 0);
        let rhs = self.input_type(node, 1);

        // For equality a NaN may be truncated to 0 if the other side is
        // never zero.
        let nan_is_harmless = op == NumberOp::Equal && self.one_input_cannot_be(node, Type::ZEROISH);

        let kind = if (lhs.is(Type::UNSIGNED32_OR_MINUS_ZERO) && rhs.is(Type::UNSIGNED32_OR_MINUS_ZERO))
            || (nan_is_harmless
                && lhs.is(Type::UNSIGNED32_OR_MINUS_ZERO_OR_NAN)
                && rhs.is(Type::UNSIGNED32_OR_MINUS_ZERO_OR_NAN))
        {
            CompareKind::Unsigned32
        } else if (lhs.is(Type::SIGNED32_OR_MINUS_ZERO) && rhs.is(Type::SIGNED32_OR_MINUS_ZERO))
            || (nan_is_harmless
                && lhs.is(Type::SIGNED32_OR_MINUS_ZERO_OR_NAN)
                && rhs.is(Type::SIGNED32_OR_MINUS_ZERO_OR_NAN))
        {
            CompareKind::Signed32
        } else if op == NumberOp::Equal && lhs.is(Type::BOOLEAN) && rhs.is(Type::BOOLEAN) {
            self.visit_binop_same(node, UseInfo::bool(), Rep::Bit)?;
            if self.lower() {
                self.change_op(node, Operator::Machine(MachineOp::Word32Equal));
            }
            return Ok(());
        } else {
            CompareKind::Float64
        };

        self.visit_comparison_of_kind(node, op, kind)?;
        if self.lower() {
            self.change_to_comparison(node, op, kind)?;
        }
        Ok(())
    }

    pub(super) fn visit_speculative_comparison(
        &mut self,
        node: NodeId,
        op: SpeculativeOp,
        hint: NumberOperationHint,
    ) -> LoweringResult<()> {
        let number_op = op
            .number_op()
            .ok_or_else(|| LoweringError::invariant(node, "comparison without number form"))?;
        let lhs = self.input_type(node, 0);
        let rhs = self.input_type(node, 1);

        for kind in [CompareKind::Unsigned32, CompareKind::Signed32] {
            let bound = match kind {
                CompareKind::Unsigned32 => Type::UNSIGNED32_OR_MINUS_ZERO,
                _ => Type::SIGNED32_OR_MINUS_ZERO,
            };
            if lhs.is(bound) && rhs.is(bound) {
                self.visit_comparison_of_kind(node, number_op, kind)?;
                if self.lower() {
                    self.change_to_comparison(node, number_op, kind)?;
                }
                return Ok(());
            }
        }

        match hint {
            NumberOperationHint::SignedSmall | NumberOperationHint::Signed32 => {
                self.visit_signed_small_comparison(node, number_op, hint)
            }
            NumberOperationHint::SignedSmallInputs => Err(LoweringError::invariant(
                node,
                "signed-small-inputs feedback on a comparison",
            )),
            NumberOperationHint::Number
            | NumberOperationHint::NumberOrBoolean
            | NumberOperationHint::NumberOrOddball => {
                // Equality never converts oddballs.
                if op == SpeculativeOp::NumberEqual && hint == NumberOperationHint::NumberOrOddball {
                    return Err(LoweringError::invariant(node, "oddball feedback on equality"));
                }
                let input = checked_use_as_float64_from_hint(hint, IdentifyZeros::IdentifyZeros);
                self.visit_binop_same(node, input, Rep::Bit)?;
                if self.lower() {
                    self.change_to_comparison(node, number_op, CompareKind::Float64)?;
                }
                Ok(())
            }
        }
    }

    /// Smi feedback: compare the tagged words directly when both operands
    /// stay tagged, otherwise untag with checks.
    fn visit_signed_small_comparison(
        &mut self,
        node: NodeId,
        op: NumberOp,
        hint: NumberOperationHint,
    ) -> LoweringResult<()> {
        let word32 = checked_use_as_word32_from_hint(hint, IdentifyZeros::IdentifyZeros);
        match self.phase {
            Phase::Propagate => self.visit_binop_same(node, word32, Rep::Bit),
            Phase::Retype => self.set_output(node, Rep::Bit, Type::ANY),
            Phase::Lower => {
                let lhs = self.input(node, 0)?;
                let rhs = self.input(node, 1)?;
                let both_tagged = self.info(lhs).representation().is_any_tagged()
                    && self.info(rhs).representation().is_any_tagged();
                if both_tagged {
                    let tagged =
                        UseInfo::checked_signed_small_as_tagged_signed(IdentifyZeros::IdentifyZeros);
                    self.visit_binop_same(node, tagged, Rep::Bit)?;
                    let machine = self.changer.tagged_signed_operator_for(op).ok_or_else(|| {
                        LoweringError::invariant(node, format!("no tagged-signed form of {op:?}"))
                    })?;
                    self.change_to_pure_op(node, Operator::Machine(machine))
                } else {
                    self.visit_binop_same(node, word32, Rep::Bit)?;
                    self.change_to_comparison(node, op, CompareKind::Signed32)
                }
            }
        }
    }

    fn visit_comparison_of_kind(&mut self, node: NodeId, op: NumberOp, kind: CompareKind) -> LoweringResult<()> {
        debug_assert!(op.is_comparison());
        let input = match kind {
            CompareKind::Unsigned32 | CompareKind::Signed32 => UseInfo::truncating_word32(),
            CompareKind::Float64 => UseInfo::truncating_float64(IdentifyZeros::IdentifyZeros),
        };
        self.visit_binop_same(node, input, Rep::Bit)
    }

    fn change_to_comparison(&mut self, node: NodeId, op: NumberOp, kind: CompareKind) -> LoweringResult<()> {
        let machine = match kind {
            CompareKind::Unsigned32 => RepresentationChanger::uint32_operator_for(op),
            CompareKind::Signed32 => RepresentationChanger::int32_operator_for(op),
            CompareKind::Float64 => RepresentationChanger::float64_operator_for(op),
        }
        .ok_or_else(|| LoweringError::invariant(node, format!("no {kind:?} form of {op:?}")))?;
        self.change_to_pure_op(node, Operator::Machine(machine))
    }

    // =========================================================================
    // Booleans and References
    // =========================================================================

    pub(super) fn visit_reference_equal(&mut self, node: NodeId) -> LoweringResult<()> {
        self.visit_binop_same(node, UseInfo::any_tagged(), Rep::Bit)?;
        if self.lower() {
            self.change_op(node, Operator::Machine(MachineOp::TaggedEqual));
        }
        Ok(())
    }

    /// The input keeps whatever representation it settled on; LOWER picks
    /// the matching negation.
    pub(super) fn visit_boolean_not(&mut self, node: NodeId) -> LoweringResult<()> {
        if !self.lower() {
            self.process_input(node, 0, UseInfo::any_truncating_to_bool())?;
            return self.set_output_rep(node, Rep::Bit);
        }

        let input = self.input(node, 0)?;
        let rep = self.info(input).representation();
        if rep == Rep::Bit {
            let zero = self.graph.int32_constant(0);
            self.graph.append_input(node, zero);
            self.change_op(node, Operator::Machine(MachineOp::Word32Equal));
        } else if rep.can_be_tagged_pointer() {
            let false_value = self.graph.heap_constant(HeapConstant::FALSE);
            self.graph.append_input(node, false_value);
            self.change_op(node, Operator::Machine(MachineOp::TaggedEqual));
        } else {
            debug_assert!(self.type_of(input).is_none());
            let zero = self.graph.int32_constant(0);
            self.defer_replacement(node, zero);
        }
        Ok(())
    }

    pub(super) fn visit_number_to_boolean(&mut self, node: NodeId) -> LoweringResult<()> {
        let input_type = self.input_type(node, 0);
        if input_type.is(Type::INTEGRAL32_OR_MINUS_ZERO_OR_NAN) {
            // 0, -0 and NaN are all false and truncate to 0.
            self.visit_unop(node, UseInfo::truncating_word32(), Rep::Bit, Type::ANY)?;
            if self.lower() {
                // x != 0 as (x == 0) == 0.
                let input = self.input(node, 0)?;
                let zero = self.graph.int32_constant(0);
                let is_zero = self.graph.add_typed_node(
                    Operator::Machine(MachineOp::Word32Equal),
                    &[input, zero],
                    Type::BOOLEAN,
                );
                self.graph.replace_input(node, 0, is_zero);
                self.graph.append_input(node, zero);
                self.change_op(node, Operator::Machine(MachineOp::Word32Equal));
            }
            return Ok(());
        }

        let input = UseInfo::truncating_float64(IdentifyZeros::IdentifyZeros);
        self.visit_unop(node, input, Rep::Bit, Type::ANY)?;
        if !self.lower() {
            return Ok(());
        }
        let value = self.input(node, 0)?;
        let zero = self.graph.float64_constant(0.0);
        if input_type.is(Type::ORDERED_NUMBER) {
            // x != 0 as (x == 0.0) == 0.
            let is_zero = self.graph.add_typed_node(
                Operator::Machine(MachineOp::Float64Equal),
                &[value, zero],
                Type::BOOLEAN,
            );
            let word_zero = self.graph.int32_constant(0);
            self.graph.replace_input(node, 0, is_zero);
            self.graph.append_input(node, word_zero);
            self.change_op(node, Operator::Machine(MachineOp::Word32Equal));
        } else {
            // NaN compares false: 0.0 < |x|.
            let abs = self.graph.add_typed_node(
                Operator::Machine(MachineOp::Float64Abs),
                &[value],
                Type::NUMBER,
            );
            self.graph.replace_input(node, 0, zero);
            self.graph.append_input(node, abs);
            self.change_op(node, Operator::Machine(MachineOp::Float64LessThan));
        }
        Ok(())
    }
}
