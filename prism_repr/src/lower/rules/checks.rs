//! Guards.
//!
//! A guard whose input type already proves it is replaced by its input.
//! Otherwise the check travels on the input use, so the representation
//! changer splices in the checked conversion, or the guard stays as a
//! checked machine operation.

use super::super::selector::RepresentationSelector;
use super::Rep;
use crate::error::{LoweringError, LoweringResult};
use crate::ir::{CheckBoundsFlags, CheckOp, CheckedOp, NodeId, Operator, Type};
use crate::repr::{IdentifyZeros, Truncation, UseInfo};

impl RepresentationSelector<'_> {
    pub(super) fn visit_check(
        &mut self,
        node: NodeId,
        check: CheckOp,
        truncation: Truncation,
    ) -> LoweringResult<()> {
        match check {
            CheckOp::HeapObject => self.visit_check_heap_object(node),
            CheckOp::Smi => self.visit_check_smi(node),
            CheckOp::Number => self.visit_check_number(node, truncation),
            CheckOp::String => self.visit_check_type(node, Type::STRING),
            CheckOp::Receiver => self.visit_check_type(node, Type::RECEIVER),
            CheckOp::Symbol => self.visit_check_type(node, Type::SYMBOL),
            CheckOp::Maps => {
                self.process_input(node, 0, UseInfo::any_tagged())?;
                self.process_remaining_inputs(node, 1)?;
                self.set_output_rep(node, Rep::None)
            }
            CheckOp::If(_) => self.visit_check_if(node),
            CheckOp::Bounds(flags) => self.visit_check_bounds(node, flags),
        }
    }

    fn visit_check_heap_object(&mut self, node: NodeId) -> LoweringResult<()> {
        let proven = self.input_cannot_be(node, Type::SIGNED_SMALL);
        let input = if proven {
            UseInfo::any_tagged()
        } else {
            UseInfo::checked_heap_object_as_tagged_pointer()
        };
        self.visit_unop(node, input, Rep::TaggedPointer, Type::ANY)?;
        self.replace_by_input(node, proven)
    }

    /// Smis are 31 bits wide, so the checked value stays tagged.
    fn visit_check_smi(&mut self, node: NodeId) -> LoweringResult<()> {
        let proven = self.input_is(node, Type::SIGNED_SMALL);
        let input = UseInfo::checked_signed_small_as_tagged_signed(IdentifyZeros::DistinguishZeros);
        self.visit_unop(node, input, Rep::TaggedSigned, Type::ANY)?;
        self.replace_by_input(node, proven)
    }

    fn visit_check_number(&mut self, node: NodeId, truncation: Truncation) -> LoweringResult<()> {
        if self.input_is(node, Type::NUMBER) {
            if self.lower() {
                self.stats.checks_elided += 1;
            }
            return self.visit_noop(node, truncation);
        }
        self.visit_unop(node, UseInfo::any_tagged(), Rep::Tagged, Type::ANY)
    }

    /// `CheckString`, `CheckReceiver` and `CheckSymbol`: a heap object of
    /// one class.
    fn visit_check_type(&mut self, node: NodeId, ty: Type) -> LoweringResult<()> {
        if self.input_is(node, ty) {
            self.visit_unop(node, UseInfo::any_tagged(), Rep::TaggedPointer, Type::ANY)?;
            return self.replace_by_input(node, true);
        }
        let input = UseInfo::checked_heap_object_as_tagged_pointer();
        self.visit_unop(node, input, Rep::TaggedPointer, Type::ANY)
    }

    fn visit_check_if(&mut self, node: NodeId) -> LoweringResult<()> {
        self.process_input(node, 0, UseInfo::bool())?;
        self.process_remaining_inputs(node, 1)?;
        self.set_output_rep(node, Rep::None)?;
        if self.lower() {
            let condition = self.input(node, 0)?;
            if self.is_constant_true(condition) {
                self.disconnect_from_effect_and_control(node);
                self.graph.clear_inputs(node);
                self.stats.checks_elided += 1;
            }
        }
        Ok(())
    }

    /// `CheckBounds(index, length)`, an unsigned `index < length`.
    ///
    /// An index range inside the length range is kept as an aborting check
    /// unless `elide_proven_bounds_checks` is set, in which case the check is
    /// replaced by its index.
    fn visit_check_bounds(&mut self, node: NodeId, flags: CheckBoundsFlags) -> LoweringResult<()> {
        let index_type = self.input_type(node, 0);
        let length_type = self.input_type(node, 1);
        let converts = flags.contains(CheckBoundsFlags::CONVERT_STRING_AND_MINUS_ZERO);
        // Conversions are the changer's job, not the bounds check's.
        let mut new_flags = flags.difference(CheckBoundsFlags::CONVERT_STRING_AND_MINUS_ZERO);

        if !length_type.is(Type::UNSIGNED31) {
            if !length_type.is(Type::POSITIVE_SAFE_INTEGER) {
                return Err(LoweringError::invariant(
                    node,
                    format!("bounds check against a length of type {length_type}"),
                ));
            }
            let zeros = if converts {
                IdentifyZeros::IdentifyZeros
            } else {
                IdentifyZeros::DistinguishZeros
            };
            let index = UseInfo::checked_signed64_as_word64(zeros);
            self.visit_binop(node, index, UseInfo::word64(zeros), Rep::Word64, Type::ANY)?;
            if self.lower() {
                self.change_op(node, Operator::Checked(CheckedOp::Uint64Bounds(new_flags)));
            }
            return Ok(());
        }

        if index_type.is(Type::INTEGRAL32)
            || (converts && index_type.is(Type::INTEGRAL32_OR_MINUS_ZERO))
        {
            // Negative indices wrap to at least 2^31, which no Unsigned31
            // length admits.
            self.visit_word32_truncating_binop(node)?;
            if self.lower() {
                let proven = index_type.is_none()
                    || length_type.is_none()
                    || (index_type.min() >= 0.0 && index_type.max() < length_type.min());
                if proven && self.config.elide_proven_bounds_checks {
                    return self.replace_by_input(node, true);
                }
                if proven {
                    new_flags |= CheckBoundsFlags::ABORT_ON_OUT_OF_BOUNDS;
                }
                self.change_op(node, Operator::Checked(CheckedOp::Uint32Bounds(new_flags)));
            }
        } else if converts {
            let pointer = self.config.pointer_representation;
            self.visit_binop(
                node,
                UseInfo::checked_tagged_as_array_index(pointer),
                UseInfo::word(pointer),
                pointer,
                Type::ANY,
            )?;
            if self.lower() {
                let op = if self.config.is_64bit() {
                    CheckedOp::Uint64Bounds(new_flags)
                } else {
                    CheckedOp::Uint32Bounds(new_flags)
                };
                self.change_op(node, Operator::Checked(op));
            }
        } else {
            let index = UseInfo::checked_signed32_as_word32(IdentifyZeros::DistinguishZeros);
            self.visit_binop(node, index, UseInfo::truncating_word32(), Rep::Word32, Type::ANY)?;
            if self.lower() {
                self.change_op(node, Operator::Checked(CheckedOp::Uint32Bounds(new_flags)));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// In LOWER, replace the guard by its (converted) input.
    fn replace_by_input(&mut self, node: NodeId, proven: bool) -> LoweringResult<()> {
        if self.lower() {
            if proven {
                self.stats.checks_elided += 1;
            }
            let input = self.input(node, 0)?;
            self.defer_replacement(node, input);
        }
        Ok(())
    }

    fn is_constant_true(&self, node: NodeId) -> bool {
        match self.graph.op(node) {
            Operator::Int32Constant(value) => value != 0,
            Operator::HeapConstant(constant) => constant.as_boolean() == Some(true),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LoweringConfig;
    use crate::ir::{CheckBoundsFlags, CheckOp, CheckedOp, Graph, HeapConstant, NodeId, Operator, Type};
    use crate::lower::RepresentationSelector;

    /// `Return(Check(x))` with the check on the effect chain.
    fn guarded(graph: &mut Graph, check: CheckOp, inputs: &[NodeId]) -> (NodeId, NodeId) {
        let start = graph.start;
        let mut all = inputs.to_vec();
        all.extend([start, start]);
        let node = graph.add_node(Operator::Check(check), &all);
        let ret = graph.add_node(Operator::Return, &[node, node, start]);
        graph.add_end_input(ret);
        (node, ret)
    }

    fn lower(graph: &mut Graph) -> crate::lower::LoweringStats {
        lower_with(graph, LoweringConfig::default())
    }

    fn lower_with(graph: &mut Graph, config: LoweringConfig) -> crate::lower::LoweringStats {
        RepresentationSelector::new(graph, config).run().unwrap()
    }

    #[test]
    fn test_proven_string_check_is_removed() {
        let mut graph = Graph::new();
        let s = graph.parameter(0, Type::STRING);
        let (_, ret) = guarded(&mut graph, CheckOp::String, &[s]);
        let stats = lower(&mut graph);
        assert_eq!(graph.node(ret).input(0), Some(s));
        assert_eq!(stats.checks_elided, 1);
    }

    #[test]
    fn test_heap_object_check_converts_its_input() {
        let mut graph = Graph::new();
        let x = graph.parameter(0, Type::ANY);
        let (_, ret) = guarded(&mut graph, CheckOp::HeapObject, &[x]);
        let stats = lower(&mut graph);
        let value = graph.node(ret).input(0).unwrap();
        assert!(matches!(graph.op(value), Operator::Convert(op) if op.is_checked()));
        assert_eq!(stats.checks_elided, 0);
    }

    #[test]
    fn test_check_if_true_is_removed() {
        let mut graph = Graph::new();
        let start = graph.start;
        let yes = graph.heap_constant(HeapConstant::TRUE);
        let check = graph.add_node(
            Operator::Check(CheckOp::If(crate::ir::DeoptimizeReason::Overflow)),
            &[yes, start, start],
        );
        let value = graph.parameter(0, Type::ANY);
        let ret = graph.add_node(Operator::Return, &[value, check, start]);
        graph.add_end_input(ret);
        let stats = lower(&mut graph);
        assert_eq!(graph.node(ret).effect_input(0), Some(start));
        assert_eq!(stats.checks_elided, 1);
    }

    #[test]
    fn test_bounds_check_inside_length_aborts() {
        let mut graph = Graph::new();
        let index = graph.parameter(0, Type::range(0.0, 9.0));
        let length = graph.parameter(1, Type::range(10.0, 20.0));
        let (node, _) = guarded(&mut graph, CheckOp::Bounds(CheckBoundsFlags::empty()), &[index, length]);
        lower(&mut graph);
        assert_eq!(
            graph.op(node),
            Operator::Checked(CheckedOp::Uint32Bounds(CheckBoundsFlags::ABORT_ON_OUT_OF_BOUNDS))
        );
    }

    #[test]
    fn test_proven_bounds_check_can_be_removed() {
        let mut graph = Graph::new();
        let index = graph.parameter(0, Type::range(0.0, 9.0));
        let length = graph.parameter(1, Type::range(10.0, 20.0));
        let (node, ret) = guarded(&mut graph, CheckOp::Bounds(CheckBoundsFlags::empty()), &[index, length]);
        let stats = lower_with(&mut graph, LoweringConfig::default().with_bounds_check_elision(true));

        assert_eq!(stats.checks_elided, 1);
        assert_eq!(graph.use_count(node), 0);
        assert_eq!(graph.op(node), Operator::Check(CheckOp::Bounds(CheckBoundsFlags::empty())));
        assert_eq!(graph.node(ret).effect_input(0), Some(graph.start));
    }

    #[test]
    fn test_bounds_check_of_unknown_index_deopts() {
        let mut graph = Graph::new();
        let index = graph.parameter(0, Type::NUMBER);
        let length = graph.parameter(1, Type::range(0.0, 100.0));
        let (node, _) = guarded(&mut graph, CheckOp::Bounds(CheckBoundsFlags::empty()), &[index, length]);
        lower(&mut graph);
        assert_eq!(
            graph.op(node),
            Operator::Checked(CheckedOp::Uint32Bounds(CheckBoundsFlags::empty()))
        );
        let converted = graph.node(node).input(0).unwrap();
        assert!(matches!(graph.op(converted), Operator::Convert(op) if op.is_checked()));
    }
}
