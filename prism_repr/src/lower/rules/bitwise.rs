//! Bitwise operators, shifts and `Math.imul`.
//!
//! All of them observe only the low 32 bits of their inputs.

use super::super::selector::RepresentationSelector;
use super::{checked_use_as_word32_from_hint, Rep};
use crate::error::{LoweringError, LoweringResult};
use crate::ir::{ConversionOp, MachineOp, NodeId, NumberOp, NumberOperationHint, Operator, SpeculativeOp, Type};
use crate::lower::changer::RepresentationChanger;
use crate::repr::{IdentifyZeros, Truncation, UseInfo};

impl RepresentationSelector<'_> {
    pub(super) fn visit_number_bitwise(&mut self, node: NodeId, op: NumberOp) -> LoweringResult<()> {
        self.visit_word32_truncating_binop(node)?;
        if self.lower() {
            self.change_to_word32_op(node, op)?;
        }
        Ok(())
    }

    pub(super) fn visit_speculative_bitwise(
        &mut self,
        node: NodeId,
        op: SpeculativeOp,
        hint: NumberOperationHint,
    ) -> LoweringResult<()> {
        self.visit_speculative_int32_binop(node, hint, Type::ANY)?;
        if self.lower() {
            let number_op = op
                .number_op()
                .ok_or_else(|| LoweringError::invariant(node, "bitwise op without number form"))?;
            self.change_to_word32_op(node, number_op)?;
        }
        Ok(())
    }

    pub(super) fn visit_number_imul(&mut self, node: NodeId) -> LoweringResult<()> {
        self.visit_word32_truncating_binop(node)?;
        if self.lower() {
            self.change_op(node, Operator::Machine(MachineOp::Int32Mul));
        }
        Ok(())
    }

    // =========================================================================
    // Shifts
    // =========================================================================

    pub(super) fn visit_number_shift(&mut self, node: NodeId, op: NumberOp) -> LoweringResult<()> {
        let count_type = self.input_upper_bound(node, 1);
        self.visit_word32_truncating_binop(node)?;
        if self.lower() {
            self.mask_shift_count(node, count_type)?;
            self.change_to_word32_op(node, op)?;
        }
        Ok(())
    }

    /// `SpeculativeNumberShiftLeft` / `SpeculativeNumberShiftRight`.
    pub(super) fn visit_speculative_shift(
        &mut self,
        node: NodeId,
        op: SpeculativeOp,
        hint: NumberOperationHint,
    ) -> LoweringResult<()> {
        let count_type = self.input_upper_bound(node, 1);
        self.visit_speculative_int32_binop(node, hint, Type::SIGNED32)?;
        if self.lower() {
            let number_op = op
                .number_op()
                .ok_or_else(|| LoweringError::invariant(node, "shift without number form"))?;
            self.mask_shift_count(node, count_type)?;
            self.change_to_word32_op(node, number_op)?;
        }
        Ok(())
    }

    pub(super) fn visit_speculative_shift_right_logical(
        &mut self,
        node: NodeId,
        hint: NumberOperationHint,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        let count_type = self.input_upper_bound(node, 1);

        // `x >>> 0` with Smi feedback: the results seen so far were
        // Unsigned31, so the shift is just a checked reinterpretation.
        if count_type.is(Type::ZEROISH)
            && hint == NumberOperationHint::SignedSmall
            && !truncation.is_used_as_word32()
        {
            let input = checked_use_as_word32_from_hint(hint, IdentifyZeros::DistinguishZeros);
            self.visit_binop(node, input, input, Rep::Word32, Type::UNSIGNED31)?;
            if self.lower() {
                self.remove_shift_count(node)?;
                self.change_op(node, Operator::Convert(ConversionOp::CheckedUint32ToInt32));
            }
            return Ok(());
        }

        self.visit_speculative_int32_binop(node, hint, Type::UNSIGNED32)?;
        if self.lower() {
            self.mask_shift_count(node, count_type)?;
            self.change_to_word32_op(node, NumberOp::ShiftRightLogical)?;
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Number-or-oddball inputs truncate without checks; anything else is
    /// checked according to the feedback.
    fn visit_speculative_int32_binop(
        &mut self,
        node: NodeId,
        hint: NumberOperationHint,
        restriction: Type,
    ) -> LoweringResult<()> {
        if self.both_inputs_are(node, Type::NUMBER_OR_ODDBALL) {
            return self.visit_binop_same(node, UseInfo::truncating_word32(), Rep::Word32);
        }
        let input = checked_use_as_word32_from_hint(hint, IdentifyZeros::DistinguishZeros);
        self.visit_binop(node, input, input, Rep::Word32, restriction)
    }

    fn change_to_word32_op(&mut self, node: NodeId, op: NumberOp) -> LoweringResult<()> {
        let machine = RepresentationChanger::int32_operator_for(op)
            .ok_or_else(|| LoweringError::invariant(node, format!("no word32 form of {op:?}")))?;
        self.change_to_pure_op(node, Operator::Machine(machine))
    }

    /// Machine shifts only look at the low five bits of the count on some
    /// targets; make that explicit unless the count is already in range.
    fn mask_shift_count(&mut self, node: NodeId, count_type: Type) -> LoweringResult<()> {
        if count_type.is(Type::SHIFT_COUNT) {
            return Ok(());
        }
        let count = self.input(node, 1)?;
        let mask = self.graph.int32_constant(0x1F);
        let masked = self.graph.add_typed_node(
            Operator::Machine(MachineOp::Word32And),
            &[count, mask],
            Type::SHIFT_COUNT,
        );
        self.graph.replace_input(node, 1, masked);
        Ok(())
    }

    /// Drop value input 1, keeping the effect and control inputs.
    fn remove_shift_count(&mut self, node: NodeId) -> LoweringResult<()> {
        let (effect, control) = self
            .effect_and_control(node)
            .ok_or_else(|| LoweringError::invariant(node, "shift without effect chain"))?;
        self.graph.replace_input(node, 1, effect);
        self.graph.replace_input(node, 2, control);
        self.graph.trim_inputs(node, 3);
        Ok(())
    }
}
