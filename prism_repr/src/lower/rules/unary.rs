//! Single-input math, min/max and integer conversions.

use super::super::selector::RepresentationSelector;
use super::{checked_use_as_float64_from_hint, checked_use_as_word32_from_hint, Rep};
use crate::error::{LoweringError, LoweringResult};
use crate::ir::{MachineOp, NodeId, NumberOp, NumberOperationHint, Operator, Type};
use crate::repr::{IdentifyZeros, Truncation, UseInfo};

impl RepresentationSelector<'_> {
    pub(super) fn visit_number_abs(&mut self, node: NodeId) -> LoweringResult<()> {
        let input_type = self.input_type(node, 0);
        if input_type.is(Type::UNSIGNED32_OR_MINUS_ZERO) {
            self.visit_unop(node, UseInfo::truncating_word32(), Rep::Word32, Type::ANY)?;
            if self.lower() {
                let input = self.input(node, 0)?;
                self.defer_replacement(node, input);
            }
        } else if input_type.is(Type::SIGNED32_OR_MINUS_ZERO) {
            self.visit_unop(node, UseInfo::truncating_word32(), Rep::Word32, Type::ANY)?;
            if self.lower() {
                let input = self.input(node, 0)?;
                let abs = self.int32_abs(input);
                self.defer_replacement(node, abs);
            }
        } else {
            let input = UseInfo::truncating_float64(IdentifyZeros::IdentifyZeros);
            self.visit_unop(node, input, Rep::Float64, Type::ANY)?;
            if self.lower() {
                self.change_to_float64_op(node, NumberOp::Abs)?;
            }
        }
        Ok(())
    }

    /// `Math.ceil`, `Math.floor`, `Math.round`, `Math.trunc`.
    pub(super) fn visit_number_rounding(
        &mut self,
        node: NodeId,
        op: NumberOp,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        let input = UseInfo::truncating_float64(truncation.identify_zeros());
        self.visit_unop(node, input, Rep::Float64, Type::ANY)?;
        if self.lower() {
            if self.input_is(node, Type::INTEGER_OR_MINUS_ZERO_OR_NAN) {
                let input = self.input(node, 0)?;
                self.defer_replacement(node, input);
            } else {
                self.change_to_float64_op(node, op)?;
            }
        }
        Ok(())
    }

    pub(super) fn visit_number_sign(&mut self, node: NodeId) -> LoweringResult<()> {
        if self.input_is(node, Type::SIGNED32) {
            self.visit_unop(node, UseInfo::truncating_word32(), Rep::Word32, Type::ANY)?;
            if self.lower() {
                let input = self.input(node, 0)?;
                let sign = self.int32_sign(input);
                self.defer_replacement(node, sign);
            }
        } else {
            let input = UseInfo::truncating_float64(IdentifyZeros::DistinguishZeros);
            self.visit_unop(node, input, Rep::Float64, Type::ANY)?;
            if self.lower() {
                let input = self.input(node, 0)?;
                let sign = self.float64_sign(input);
                self.defer_replacement(node, sign);
            }
        }
        Ok(())
    }

    pub(super) fn visit_number_silence_nan(&mut self, node: NodeId) -> LoweringResult<()> {
        let input = UseInfo::truncating_float64(IdentifyZeros::DistinguishZeros);
        self.visit_unop(node, input, Rep::Float64, Type::ANY)?;
        if self.lower() {
            if self.input_is(node, Type::ORDERED_NUMBER) {
                let input = self.input(node, 0)?;
                self.defer_replacement(node, input);
            } else {
                self.change_to_float64_op(node, NumberOp::SilenceNaN)?;
            }
        }
        Ok(())
    }

    /// `NumberToInt32` / `NumberToUint32`: the truncated word is the result.
    pub(super) fn visit_number_to_word32(&mut self, node: NodeId) -> LoweringResult<()> {
        self.visit_unop(node, UseInfo::truncating_word32(), Rep::Word32, Type::ANY)?;
        if self.lower() {
            let input = self.input(node, 0)?;
            self.defer_replacement(node, input);
        }
        Ok(())
    }

    // =========================================================================
    // Min / Max
    // =========================================================================

    pub(super) fn visit_number_max_min(
        &mut self,
        node: NodeId,
        op: NumberOp,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        let identifies_zeros = truncation.identifies_zero_and_minus_zero();
        let lhs = self.input_type(node, 0);
        let rhs = self.input_type(node, 1);
        let both = |ty: Type| lhs.is(ty) && rhs.is(ty);

        if both(Type::UNSIGNED32) || (identifies_zeros && both(Type::UNSIGNED32_OR_MINUS_ZERO)) {
            self.visit_word32_truncating_binop(node)?;
            if self.lower() {
                self.lower_to_select(node, op, MachineOp::Uint32LessThan, Rep::Word32)?;
            }
        } else if both(Type::SIGNED32) || (identifies_zeros && both(Type::SIGNED32_OR_MINUS_ZERO)) {
            self.visit_word32_truncating_binop(node)?;
            if self.lower() {
                self.lower_to_select(node, op, MachineOp::Int32LessThan, Rep::Word32)?;
            }
        } else if self.config.is_64bit() && both(Type::SAFE_INTEGER) {
            self.visit_int64_binop(node)?;
            if self.lower() {
                self.lower_to_select(node, op, MachineOp::Int64LessThan, Rep::Word64)?;
            }
        } else {
            let input = UseInfo::truncating_float64(truncation.identify_zeros());
            self.visit_binop_same(node, input, Rep::Float64)?;
            if self.lower() {
                // Without NaN (and -0, unless identified) a plain compare
                // and select gives the same answer as the IEEE operator.
                let lhs_bound = if identifies_zeros {
                    Type::ORDERED_NUMBER
                } else {
                    Type::PLAIN_NUMBER
                };
                if lhs.is(lhs_bound) && rhs.is(Type::ORDERED_NUMBER) {
                    self.lower_to_select(node, op, MachineOp::Float64LessThan, Rep::Float64)?;
                } else {
                    self.change_to_float64_op(node, op)?;
                }
            }
        }
        Ok(())
    }

    /// `max(l, r)` as `l < r ? r : l`, `min(l, r)` as `l < r ? l : r`.
    fn lower_to_select(
        &mut self,
        node: NodeId,
        op: NumberOp,
        less_than: MachineOp,
        rep: Rep,
    ) -> LoweringResult<()> {
        let lhs = self.input(node, 0)?;
        let rhs = self.input(node, 1)?;
        let compare = self
            .graph
            .add_typed_node(Operator::Machine(less_than), &[lhs, rhs], Type::BOOLEAN);
        match op {
            NumberOp::Max => {
                self.graph.replace_input(node, 0, compare);
                self.graph.append_input(node, lhs);
            }
            NumberOp::Min => self.graph.insert_input(node, 0, compare),
            _ => {
                return Err(LoweringError::invariant(node, format!("{op:?} is not min or max")));
            }
        }
        self.change_op(node, Operator::Select(rep));
        Ok(())
    }

    // =========================================================================
    // Speculative ToNumber
    // =========================================================================

    pub(super) fn visit_speculative_to_number(
        &mut self,
        node: NodeId,
        hint: NumberOperationHint,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        if self.input_is(node, Type::NUMBER) {
            return self.visit_noop(node, truncation);
        }
        match hint {
            NumberOperationHint::SignedSmall | NumberOperationHint::SignedSmallInputs => {
                let input = checked_use_as_word32_from_hint(hint, IdentifyZeros::DistinguishZeros);
                self.visit_unop(node, input, Rep::Word32, Type::SIGNED32)?;
            }
            NumberOperationHint::Signed32
            | NumberOperationHint::Number
            | NumberOperationHint::NumberOrBoolean
            | NumberOperationHint::NumberOrOddball => {
                let input = checked_use_as_float64_from_hint(hint, IdentifyZeros::DistinguishZeros);
                self.visit_unop(node, input, Rep::Float64, Type::ANY)?;
            }
        }
        if self.lower() {
            let input = self.input(node, 0)?;
            self.defer_replacement(node, input);
        }
        Ok(())
    }

    // =========================================================================
    // Expansions
    // =========================================================================

    /// `(x ^ s) - s` with `s = x >> 31`.
    fn int32_abs(&mut self, input: NodeId) -> NodeId {
        let shift = self.graph.int32_constant(31);
        let sign = self.graph.add_typed_node(
            Operator::Machine(MachineOp::Word32Sar),
            &[input, shift],
            Type::range(-1.0, 0.0),
        );
        let flipped = self.graph.add_typed_node(
            Operator::Machine(MachineOp::Word32Xor),
            &[input, sign],
            Type::SIGNED32,
        );
        self.graph.add_typed_node(
            Operator::Machine(MachineOp::Int32Sub),
            &[flipped, sign],
            Type::UNSIGNED32,
        )
    }

    /// `x < 0 ? -1 : (x == 0 ? 0 : 1)`.
    fn int32_sign(&mut self, input: NodeId) -> NodeId {
        let zero = self.graph.int32_constant(0);
        let one = self.graph.int32_constant(1);
        let minus_one = self.graph.int32_constant(-1);
        let is_negative = self.graph.add_typed_node(
            Operator::Machine(MachineOp::Int32LessThan),
            &[input, zero],
            Type::BOOLEAN,
        );
        let is_zero = self.graph.add_typed_node(
            Operator::Machine(MachineOp::Word32Equal),
            &[input, zero],
            Type::BOOLEAN,
        );
        let non_negative = self.graph.add_typed_node(
            Operator::Select(Rep::Word32),
            &[is_zero, zero, one],
            Type::range(0.0, 1.0),
        );
        self.graph.add_typed_node(
            Operator::Select(Rep::Word32),
            &[is_negative, minus_one, non_negative],
            Type::range(-1.0, 1.0),
        )
    }

    /// `x < 0 ? -1 : (0 < x ? 1 : x)`, which keeps `-0` and NaN.
    fn float64_sign(&mut self, input: NodeId) -> NodeId {
        let zero = self.graph.float64_constant(0.0);
        let one = self.graph.float64_constant(1.0);
        let minus_one = self.graph.float64_constant(-1.0);
        let is_negative = self.graph.add_typed_node(
            Operator::Machine(MachineOp::Float64LessThan),
            &[input, zero],
            Type::BOOLEAN,
        );
        let is_positive = self.graph.add_typed_node(
            Operator::Machine(MachineOp::Float64LessThan),
            &[zero, input],
            Type::BOOLEAN,
        );
        let non_negative = self.graph.add_typed_node(
            Operator::Select(Rep::Float64),
            &[is_positive, one, input],
            Type::NUMBER,
        );
        self.graph.add_typed_node(
            Operator::Select(Rep::Float64),
            &[is_negative, minus_one, non_negative],
            Type::NUMBER,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LoweringConfig;
    use crate::ir::{Graph, MachineOp, NumberOp, Operator, Type};
    use crate::lower::RepresentationSelector;
    use crate::repr::MachineRepresentation;

    fn lower_unary(op: NumberOp, input_type: Type) -> (Graph, crate::ir::NodeId) {
        let mut graph = Graph::new();
        let start = graph.start;
        let x = graph.parameter(0, input_type);
        let node = graph.add_node(Operator::Number(op), &[x]);
        let ret = graph.add_node(Operator::Return, &[node, start, start]);
        graph.add_end_input(ret);
        RepresentationSelector::new(&mut graph, LoweringConfig::default())
            .run()
            .unwrap();
        let value = graph.node(ret).input(0).unwrap();
        (graph, value)
    }

    #[test]
    fn test_abs_of_unsigned_is_identity() {
        let (graph, value) = lower_unary(NumberOp::Abs, Type::UNSIGNED31);
        assert!(matches!(graph.op(value), Operator::Convert(_)));
        let word = graph.node(value).input(0).unwrap();
        assert!(matches!(graph.op(word), Operator::Convert(_) | Operator::Parameter(0)));
    }

    #[test]
    fn test_floor_of_number_uses_float64() {
        let (graph, value) = lower_unary(NumberOp::Floor, Type::NUMBER);
        let float = graph.node(value).input(0).unwrap();
        assert_eq!(graph.op(float), Operator::Machine(MachineOp::Float64RoundDown));
    }

    #[test]
    fn test_sign_of_signed32_selects() {
        let (graph, value) = lower_unary(NumberOp::Sign, Type::SIGNED32);
        let word = graph.node(value).input(0).unwrap();
        assert_eq!(graph.op(word), Operator::Select(MachineRepresentation::Word32));
    }
}
