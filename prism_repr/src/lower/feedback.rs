//! Feedback typing for the RETYPE phase.
//!
//! Recomputes a node's refined type from the feedback types of its inputs
//! through the [`OperationTyper`](crate::ir::OperationTyper) transfer
//! functions. Loop phis are weakened so that growing ranges converge.

use super::selector::RepresentationSelector;
use crate::ir::{CheckOp, NodeId, NumberOp, Operator, SpeculativeOp, Type};

impl RepresentationSelector<'_> {
    /// Recompute the feedback type of `node`. Returns whether it changed.
    pub(super) fn update_feedback_type(&mut self, node: NodeId) -> bool {
        let op = self.graph.op(node);
        if !op.has_value_output() {
            return false;
        }

        // Only phis may break cycles; everything else waits for typed inputs.
        let value_inputs = self.graph.node(node).value_input_count();
        if !matches!(op, Operator::Phi(_)) {
            let all_typed = self.graph.node(node).inputs.as_slice()[..value_inputs]
                .iter()
                .all(|&input| self.info(input).feedback_type().is_some());
            if !all_typed {
                return false;
            }
        }

        let previous = self.info(node).feedback_type();
        let restriction = self.info(node).restriction_type();
        let input0 = self.input_feedback(node, 0);
        let input1 = self.input_feedback(node, 1);

        let new_type = match op {
            Operator::Number(number_op) => self.number_op_type(number_op, input0, input1),
            Operator::Speculative(SpeculativeOp::ToNumber, _) => {
                Type::intersect(self.typer.to_number(input0), restriction)
            }
            Operator::Speculative(spec_op, _) => {
                let Some(number_op) = spec_op.number_op() else {
                    return false;
                };
                let lhs = self.typer.to_number(input0);
                let rhs = self.typer.to_number(input1);
                Type::intersect(self.number_op_type(number_op, lhs, rhs), restriction)
            }
            Operator::Check(CheckOp::Bounds(_)) => {
                Type::intersect(self.typer.check_bounds(input0, input1), restriction)
            }
            Operator::Check(CheckOp::Number) => {
                Type::intersect(self.typer.check_number(input0), restriction)
            }
            Operator::Phi(_) => {
                let current = self.type_phi(node);
                match previous {
                    Some(previous) => self.weaken_phi(node, previous, current),
                    None => current,
                }
            }
            Operator::TypeGuard => Type::intersect(input0, self.graph.ty(node)),
            Operator::Select(_) => self.type_select(node),
            _ => {
                if previous.is_some() {
                    return false;
                }
                let ty = self.graph.ty(node);
                self.info_mut(node).set_feedback_type(ty);
                return true;
            }
        };

        // Weakening may overshoot the static bound.
        let new_type = Type::intersect(self.graph.ty(node), new_type);
        if previous.is_some_and(|previous| new_type.is(previous)) {
            return false;
        }
        self.info_mut(node).set_feedback_type(new_type);
        true
    }

    fn input_feedback(&self, node: NodeId, index: usize) -> Type {
        match self.graph.node(node).input(index) {
            Some(input) => self.feedback_type_of(input),
            None => Type::NONE,
        }
    }

    fn number_op_type(&self, op: NumberOp, lhs: Type, rhs: Type) -> Type {
        let typer = &self.typer;
        match op {
            NumberOp::Add => typer.number_add(lhs, rhs),
            NumberOp::Subtract => typer.number_subtract(lhs, rhs),
            NumberOp::Multiply => typer.number_multiply(lhs, rhs),
            NumberOp::Divide => typer.number_divide(lhs, rhs),
            NumberOp::Modulus => typer.number_modulus(lhs, rhs),
            NumberOp::BitwiseAnd
            | NumberOp::BitwiseOr
            | NumberOp::BitwiseXor
            | NumberOp::ShiftLeft
            | NumberOp::ShiftRight
            | NumberOp::Imul => typer.number_bitwise(lhs, rhs),
            NumberOp::ShiftRightLogical => typer.number_shift_right_logical(lhs, rhs),
            NumberOp::Max => typer.number_max_min(lhs, rhs, true),
            NumberOp::Min => typer.number_max_min(lhs, rhs, false),
            NumberOp::Abs => typer.number_abs(lhs),
            NumberOp::Ceil | NumberOp::Floor | NumberOp::Round | NumberOp::Trunc => {
                typer.number_round(lhs)
            }
            NumberOp::Sign => typer.number_sign(lhs),
            NumberOp::SilenceNaN => typer.number_silence_nan(lhs),
            NumberOp::ToInt32 => typer.number_to_int32(lhs),
            NumberOp::ToUint32 => typer.number_to_uint32(lhs),
            NumberOp::Equal | NumberOp::LessThan | NumberOp::LessThanOrEqual | NumberOp::ToBoolean => {
                if lhs.is_none() {
                    Type::NONE
                } else {
                    Type::BOOLEAN
                }
            }
        }
    }

    /// Union of the value inputs; untyped inputs count as empty.
    fn type_phi(&self, node: NodeId) -> Type {
        let n = self.graph.node(node);
        (0..n.value_input_count())
            .filter_map(|i| n.value_input(i))
            .fold(Type::NONE, |acc, input| {
                Type::union(acc, self.feedback_type_of(input))
            })
    }

    fn type_select(&self, node: NodeId) -> Type {
        Type::union(self.input_feedback(node, 1), self.input_feedback(node, 2))
    }

    /// Widen a growing phi type.
    ///
    /// The first `phi_refinement_rounds` growths are kept precise; after
    /// that the range is snapped outward and the phi stays weakened.
    fn weaken_phi(&mut self, node: NodeId, previous: Type, current: Type) -> Type {
        let info = self.info(node);
        let mut weakened = info.weakened();
        if !weakened
            && !current.is(previous)
            && info.refinements() < self.config.phi_refinement_rounds
        {
            self.info_mut(node).add_refinement();
            return current;
        }
        let result = self.typer.weaken(current, previous, &mut weakened);
        if weakened {
            self.info_mut(node).set_weakened();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LoweringConfig;
    use crate::ir::{Graph, NumberOp, Operator, Type};
    use crate::lower::RepresentationSelector;

    #[test]
    fn test_number_add_refines_type() {
        let mut graph = Graph::new();
        let a = graph.parameter(0, Type::range(0.0, 10.0));
        let b = graph.parameter(1, Type::range(0.0, 5.0));
        let sum = graph.add_typed_node(Operator::Number(NumberOp::Add), &[a, b], Type::NUMBER);
        let start = graph.start;
        let ret = graph.add_node(Operator::Return, &[sum, start, start]);
        graph.add_end_input(ret);

        let mut selector = RepresentationSelector::new(&mut graph, LoweringConfig::default());
        selector.run().unwrap();
        assert_eq!(selector.feedback_type(sum), Some(Type::range(0.0, 15.0)));
        assert_eq!(selector.feedback_type(a), Some(Type::range(0.0, 10.0)));
    }

    #[test]
    fn test_comparison_is_boolean() {
        let mut graph = Graph::new();
        let a = graph.parameter(0, Type::SIGNED32);
        let cmp = graph.add_typed_node(Operator::Number(NumberOp::LessThan), &[a, a], Type::BOOLEAN);
        let start = graph.start;
        let ret = graph.add_node(Operator::Return, &[cmp, start, start]);
        graph.add_end_input(ret);

        let mut selector = RepresentationSelector::new(&mut graph, LoweringConfig::default());
        selector.run().unwrap();
        assert_eq!(selector.feedback_type(cmp), Some(Type::BOOLEAN));
    }
}
