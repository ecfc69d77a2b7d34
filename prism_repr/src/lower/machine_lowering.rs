//! Machine lowering of integer division and modulus.
//!
//! Machine division traps on a zero divisor and on `i32::MIN / -1`, while
//! truncated JavaScript division yields `0` for both. These helpers build the
//! guarded form out of `Branch`/`Merge` diamonds and word32 phis. Constant
//! divisors are folded or left to the plain machine operator.
//!
//! The diamonds float: they hang off the graph's start control and are only
//! reachable through their phi, so the scheduler is free to place them.

use crate::ir::{Graph, MachineOp, NodeId, Operator, Type};
use crate::repr::MachineRepresentation;

/// Builds guarded integer division and modulus in a graph.
pub struct DivisionLowering<'g> {
    graph: &'g mut Graph,
    ty: Type,
}

impl<'g> DivisionLowering<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        Self {
            graph,
            ty: Type::SIGNED32,
        }
    }

    /// Signed `lhs / rhs`, truncated.
    ///
    /// ```text
    /// if 0 < rhs then lhs / rhs
    /// else if rhs < -1 then lhs / rhs
    /// else if rhs == 0 then 0
    /// else 0 - lhs
    /// ```
    pub fn int32_div(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.ty = Type::SIGNED32;
        match self.int32_value(rhs) {
            Some(-1) => {
                let zero = self.graph.int32_constant(0);
                return self.machine(MachineOp::Int32Sub, zero, lhs);
            }
            Some(0) => return rhs,
            Some(_) => return self.machine(MachineOp::Int32Div, lhs, rhs),
            None => {}
        }

        let zero = self.graph.int32_constant(0);
        let minus_one = self.graph.int32_constant(-1);
        let start = self.graph.start;

        let check0 = self.machine(MachineOp::Int32LessThan, zero, rhs);
        let (if_true0, if_false0) = self.branch(check0, start);
        let true0 = self.machine(MachineOp::Int32Div, lhs, rhs);

        let check1 = self.machine(MachineOp::Int32LessThan, rhs, minus_one);
        let (if_true1, if_false1) = self.branch(check1, if_false0);
        let true1 = self.machine(MachineOp::Int32Div, lhs, rhs);

        let check2 = self.machine(MachineOp::Word32Equal, rhs, zero);
        let (if_true2, if_false2) = self.branch(check2, if_false1);
        let false2 = self.machine(MachineOp::Int32Sub, zero, lhs);
        let (merge2, false1) = self.merge(if_true2, zero, if_false2, false2);

        let (merge1, false0) = self.merge(if_true1, true1, merge2, false1);
        let (_, result) = self.merge(if_true0, true0, merge1, false0);
        result
    }

    /// Signed `lhs % rhs`, truncated, with a mask for power-of-two divisors.
    ///
    /// ```text
    /// if 0 < rhs then
    ///   msk = rhs - 1
    ///   if rhs & msk != 0 then lhs % rhs
    ///   else if lhs < 0 then -(-lhs & msk)
    ///   else lhs & msk
    /// else if rhs < -1 then lhs % rhs
    /// else 0
    /// ```
    pub fn int32_mod(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.ty = Type::SIGNED32;
        match self.int32_value(rhs) {
            Some(-1 | 0) => return self.graph.int32_constant(0),
            Some(_) => return self.machine(MachineOp::Int32Mod, lhs, rhs),
            None => {}
        }

        let zero = self.graph.int32_constant(0);
        let minus_one = self.graph.int32_constant(-1);
        let start = self.graph.start;

        let check0 = self.machine(MachineOp::Int32LessThan, zero, rhs);
        let (if_true0, if_false0) = self.branch(check0, start);

        let true0 = {
            let msk = self.machine(MachineOp::Int32Add, rhs, minus_one);
            let check1 = self.machine(MachineOp::Word32And, rhs, msk);
            let (if_true1, if_false1) = self.branch(check1, if_true0);
            let true1 = self.machine(MachineOp::Int32Mod, lhs, rhs);

            let check2 = self.machine(MachineOp::Int32LessThan, lhs, zero);
            let (if_true2, if_false2) = self.branch(check2, if_false1);
            let negated = self.machine(MachineOp::Int32Sub, zero, lhs);
            let masked = self.machine(MachineOp::Word32And, negated, msk);
            let true2 = self.machine(MachineOp::Int32Sub, zero, masked);
            let false2 = self.machine(MachineOp::Word32And, lhs, msk);
            let (merge2, false1) = self.merge(if_true2, true2, if_false2, false2);

            self.merge(if_true1, true1, merge2, false1)
        };

        let false0 = {
            let check1 = self.machine(MachineOp::Int32LessThan, rhs, minus_one);
            let (if_true1, if_false1) = self.branch(check1, if_false0);
            let true1 = self.machine(MachineOp::Int32Mod, lhs, rhs);
            self.merge(if_true1, true1, if_false1, zero)
        };

        let (_, result) = self.merge(true0.0, true0.1, false0.0, false0.1);
        result
    }

    /// Unsigned `lhs / rhs`, `0` for a zero divisor.
    pub fn uint32_div(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.ty = Type::UNSIGNED32;
        match self.int32_value(rhs) {
            Some(0) => return self.graph.int32_constant(0),
            Some(_) => return self.machine(MachineOp::Uint32Div, lhs, rhs),
            None => {}
        }

        let zero = self.graph.int32_constant(0);
        let start = self.graph.start;
        let check = self.machine(MachineOp::Word32Equal, rhs, zero);
        let (if_true, if_false) = self.branch(check, start);
        let div = self.machine(MachineOp::Uint32Div, lhs, rhs);
        let (_, result) = self.merge(if_true, zero, if_false, div);
        result
    }

    /// Unsigned `lhs % rhs`, `0` for a zero divisor.
    ///
    /// ```text
    /// if rhs == 0 then 0
    /// else
    ///   msk = rhs - 1
    ///   if rhs & msk != 0 then lhs % rhs
    ///   else lhs & msk
    /// ```
    pub fn uint32_mod(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.ty = Type::UNSIGNED32;
        match self.int32_value(rhs) {
            Some(0) => return self.graph.int32_constant(0),
            Some(_) => return self.machine(MachineOp::Uint32Mod, lhs, rhs),
            None => {}
        }

        let zero = self.graph.int32_constant(0);
        let minus_one = self.graph.int32_constant(-1);
        let start = self.graph.start;

        let check0 = self.machine(MachineOp::Word32Equal, rhs, zero);
        let (if_true0, if_false0) = self.branch(check0, start);

        let msk = self.machine(MachineOp::Int32Add, rhs, minus_one);
        let check1 = self.machine(MachineOp::Word32And, rhs, msk);
        let (if_true1, if_false1) = self.branch(check1, if_false0);
        let true1 = self.machine(MachineOp::Uint32Mod, lhs, rhs);
        let false1 = self.machine(MachineOp::Word32And, lhs, msk);
        let (merge1, false0) = self.merge(if_true1, true1, if_false1, false1);

        let (_, result) = self.merge(if_true0, zero, merge1, false0);
        result
    }

    // =========================================================================
    // Builders
    // =========================================================================

    fn int32_value(&self, node: NodeId) -> Option<i32> {
        match self.graph.op(node) {
            Operator::Int32Constant(value) => Some(value),
            _ => None,
        }
    }

    fn machine(&mut self, op: MachineOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.graph
            .add_typed_node(Operator::Machine(op), &[lhs, rhs], self.ty)
    }

    /// Branch on `condition`; returns the `IfTrue` and `IfFalse` projections.
    fn branch(&mut self, condition: NodeId, control: NodeId) -> (NodeId, NodeId) {
        let branch = self.graph.add_node(Operator::Branch, &[condition, control]);
        let if_true = self.graph.add_node(Operator::IfTrue, &[branch]);
        let if_false = self.graph.add_node(Operator::IfFalse, &[branch]);
        (if_true, if_false)
    }

    /// Merge two control paths and their word32 values.
    fn merge(
        &mut self,
        if_true: NodeId,
        true_value: NodeId,
        if_false: NodeId,
        false_value: NodeId,
    ) -> (NodeId, NodeId) {
        let merge = self.graph.add_node(Operator::Merge, &[if_true, if_false]);
        let phi = self.graph.add_typed_node(
            Operator::Phi(MachineRepresentation::Word32),
            &[true_value, false_value, merge],
            self.ty,
        );
        (merge, phi)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn operands(graph: &mut Graph) -> (NodeId, NodeId) {
        (
            graph.parameter(0, Type::SIGNED32),
            graph.parameter(1, Type::SIGNED32),
        )
    }

    #[test]
    fn test_div_by_minus_one_negates() {
        let mut graph = Graph::new();
        let (lhs, _) = operands(&mut graph);
        let minus_one = graph.int32_constant(-1);
        let result = DivisionLowering::new(&mut graph).int32_div(lhs, minus_one);
        assert_eq!(graph.op(result), Operator::Machine(MachineOp::Int32Sub));
        let node = graph.node(result);
        assert_eq!(graph.op(node.inputs.as_slice()[0]), Operator::Int32Constant(0));
        assert_eq!(node.inputs.as_slice()[1], lhs);
    }

    #[test]
    fn test_div_by_zero_is_zero() {
        let mut graph = Graph::new();
        let (lhs, _) = operands(&mut graph);
        let zero = graph.int32_constant(0);
        assert_eq!(DivisionLowering::new(&mut graph).int32_div(lhs, zero), zero);
    }

    #[test]
    fn test_div_by_other_constant_is_plain() {
        let mut graph = Graph::new();
        let (lhs, _) = operands(&mut graph);
        let seven = graph.int32_constant(7);
        let result = DivisionLowering::new(&mut graph).int32_div(lhs, seven);
        assert_eq!(graph.op(result), Operator::Machine(MachineOp::Int32Div));
    }

    #[test]
    fn test_general_div_is_guarded() {
        let mut graph = Graph::new();
        let (lhs, rhs) = operands(&mut graph);
        let result = DivisionLowering::new(&mut graph).int32_div(lhs, rhs);
        assert_eq!(graph.op(result), Operator::Phi(MachineRepresentation::Word32));

        let node = graph.node(result);
        assert_eq!(node.value_input_count(), 2);
        let merge = node.control_input(0).unwrap();
        assert_eq!(graph.op(merge), Operator::Merge);
        let true_value = node.value_input(0).unwrap();
        assert_eq!(graph.op(true_value), Operator::Machine(MachineOp::Int32Div));

        let branches = graph
            .iter()
            .filter(|(_, n)| n.op == Operator::Branch)
            .count();
        assert_eq!(branches, 3);
        graph.verify().unwrap();
    }

    #[test]
    fn test_mod_by_zero_or_minus_one_is_zero() {
        let mut graph = Graph::new();
        let (lhs, _) = operands(&mut graph);
        for divisor in [0, -1] {
            let rhs = graph.int32_constant(divisor);
            let result = DivisionLowering::new(&mut graph).int32_mod(lhs, rhs);
            assert_eq!(graph.op(result), Operator::Int32Constant(0));
        }
    }

    #[test]
    fn test_general_mod_masks_powers_of_two() {
        let mut graph = Graph::new();
        let (lhs, rhs) = operands(&mut graph);
        let result = DivisionLowering::new(&mut graph).int32_mod(lhs, rhs);
        assert_eq!(graph.op(result), Operator::Phi(MachineRepresentation::Word32));
        let ands = graph
            .iter()
            .filter(|(_, n)| n.op == Operator::Machine(MachineOp::Word32And))
            .count();
        assert_eq!(ands, 3);
        let mods = graph
            .iter()
            .filter(|(_, n)| n.op == Operator::Machine(MachineOp::Int32Mod))
            .count();
        assert_eq!(mods, 2);
    }

    #[test]
    fn test_uint32_div_guards_zero() {
        let mut graph = Graph::new();
        let lhs = graph.parameter(0, Type::UNSIGNED32);
        let rhs = graph.parameter(1, Type::UNSIGNED32);
        let result = DivisionLowering::new(&mut graph).uint32_div(lhs, rhs);
        let node = graph.node(result);
        assert_eq!(graph.op(node.value_input(0).unwrap()), Operator::Int32Constant(0));
        assert_eq!(
            graph.op(node.value_input(1).unwrap()),
            Operator::Machine(MachineOp::Uint32Div)
        );
        assert_eq!(graph.ty(result), Type::UNSIGNED32);
    }

    #[test]
    fn test_uint32_mod_constant_is_plain() {
        let mut graph = Graph::new();
        let lhs = graph.parameter(0, Type::UNSIGNED32);
        let eight = graph.int32_constant(8);
        let result = DivisionLowering::new(&mut graph).uint32_mod(lhs, eight);
        assert_eq!(graph.op(result), Operator::Machine(MachineOp::Uint32Mod));
    }
}
