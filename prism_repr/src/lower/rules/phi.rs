//! Merges: phi, select and type guard.
//!
//! A merge has no representation of its own; it picks one from its type
//! and the truncation of its uses, and all value inputs are brought into
//! that representation.

use super::super::selector::RepresentationSelector;
use super::Rep;
use crate::error::LoweringResult;
use crate::ir::{NodeId, Operator, Type};
use crate::repr::{Truncation, TypeCheckKind, UseInfo};

/// Representation a merge of values of type `ty` should produce for uses
/// with `truncation`.
pub fn output_representation_for_phi(ty: Type, truncation: Truncation, is_64bit: bool) -> Rep {
    if ty.is_none() {
        Rep::None
    } else if ty.is(Type::SIGNED32) || ty.is(Type::UNSIGNED32) {
        Rep::Word32
    } else if ty.is(Type::NUMBER_OR_ODDBALL) && truncation.is_used_as_word32() {
        Rep::Word32
    } else if ty.is(Type::BOOLEAN) {
        Rep::Bit
    } else if ty.is(Type::NUMBER_OR_ODDBALL) && truncation.truncates_oddball_and_bigint_to_number() {
        Rep::Float64
    } else if ty.is(Type::union(Type::SIGNED_SMALL, Type::NAN)) {
        // NaN keeps this tagged; small integers stay Smis.
        Rep::Tagged
    } else if ty.is(Type::NUMBER) {
        Rep::Float64
    } else if is_64bit && ty.is(Type::BIGINT) && truncation.is_used_as_word64() {
        Rep::Word64
    } else if ty.is(Type::EXTERNAL_POINTER) {
        if is_64bit {
            Rep::Word64
        } else {
            Rep::Word32
        }
    } else {
        Rep::Tagged
    }
}

impl RepresentationSelector<'_> {
    /// A phi built with an untagged representation keeps it; tagged phis
    /// are reselected.
    pub(super) fn visit_phi(&mut self, node: NodeId, truncation: Truncation) -> LoweringResult<()> {
        let rep = match self.graph.op(node) {
            Operator::Phi(preset) if preset != Rep::Tagged => preset,
            _ => self.phi_representation(node, truncation),
        };
        if self.lower() {
            self.change_op(node, Operator::Phi(rep));
        }

        let value_inputs = self.graph.node(node).value_input_count();
        let input_use = UseInfo::new(rep, truncation, TypeCheckKind::None);
        for i in 0..value_inputs {
            self.process_input(node, i, input_use)?;
        }
        self.process_remaining_inputs(node, value_inputs)?;
        self.set_output_rep(node, rep)
    }

    /// `Select(condition, if_true, if_false)`.
    pub(super) fn visit_select(&mut self, node: NodeId, truncation: Truncation) -> LoweringResult<()> {
        self.process_input(node, 0, UseInfo::bool())?;

        let rep = self.phi_representation(node, truncation);
        if self.lower() {
            self.change_op(node, Operator::Select(rep));
        }

        let input_use = UseInfo::new(rep, truncation, TypeCheckKind::None);
        self.process_input(node, 1, input_use)?;
        self.process_input(node, 2, input_use)?;
        self.set_output_rep(node, rep)
    }

    /// A type annotation on its input. LOWER replaces it with the input,
    /// converted so that the narrower type is usable downstream.
    pub(super) fn visit_type_guard(&mut self, node: NodeId, truncation: Truncation) -> LoweringResult<()> {
        if truncation.is_unused() {
            return self.visit_unused(node);
        }
        let ty = self.type_of(node);
        let rep = self.phi_representation(node, truncation);
        let input_use = UseInfo::new(rep, truncation, TypeCheckKind::None);
        if self.lower() {
            // Convert under the guard's type, not the input's.
            self.convert_input(node, 0, input_use, Some(ty))?;
        } else {
            self.process_input(node, 0, input_use)?;
        }
        self.process_remaining_inputs(node, 1)?;
        self.set_output_rep(node, rep)?;
        if self.lower() {
            let input = self.input(node, 0)?;
            self.defer_replacement(node, input);
        }
        Ok(())
    }

    fn phi_representation(&self, node: NodeId, truncation: Truncation) -> Rep {
        output_representation_for_phi(self.type_of(node), truncation, self.config.is_64bit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoweringConfig;
    use crate::ir::Graph;
    use crate::lower::RepresentationSelector;
    use crate::repr::IdentifyZeros;

    const IS_64: bool = true;

    #[test]
    fn test_integer_phis_are_word32() {
        let any = Truncation::any(IdentifyZeros::DistinguishZeros);
        assert_eq!(output_representation_for_phi(Type::SIGNED32, any, IS_64), Rep::Word32);
        assert_eq!(output_representation_for_phi(Type::UNSIGNED32, any, IS_64), Rep::Word32);
        assert_eq!(
            output_representation_for_phi(Type::NUMBER, Truncation::word32(), IS_64),
            Rep::Word32
        );
    }

    #[test]
    fn test_number_phis() {
        let any = Truncation::any(IdentifyZeros::DistinguishZeros);
        assert_eq!(output_representation_for_phi(Type::NUMBER, any, IS_64), Rep::Float64);
        assert_eq!(
            output_representation_for_phi(Type::union(Type::SIGNED_SMALL, Type::NAN), any, IS_64),
            Rep::Tagged
        );
        assert_eq!(
            output_representation_for_phi(
                Type::NUMBER_OR_ODDBALL,
                Truncation::oddball_and_bigint_to_number(IdentifyZeros::DistinguishZeros),
                IS_64
            ),
            Rep::Float64
        );
    }

    #[test]
    fn test_other_phis() {
        let any = Truncation::any(IdentifyZeros::DistinguishZeros);
        assert_eq!(output_representation_for_phi(Type::NONE, any, IS_64), Rep::None);
        assert_eq!(output_representation_for_phi(Type::BOOLEAN, any, IS_64), Rep::Bit);
        assert_eq!(output_representation_for_phi(Type::STRING, any, IS_64), Rep::Tagged);
        assert_eq!(
            output_representation_for_phi(Type::BIGINT, Truncation::word64(), IS_64),
            Rep::Word64
        );
        assert_eq!(
            output_representation_for_phi(Type::BIGINT, Truncation::word64(), false),
            Rep::Tagged
        );
        assert_eq!(
            output_representation_for_phi(Type::EXTERNAL_POINTER, any, false),
            Rep::Word32
        );
    }

    /// `Phi(rep)(a, b)` over two Signed32 parameters, returned.
    fn merged_phi(graph: &mut Graph, rep: Rep) -> NodeId {
        let start = graph.start;
        let merge = graph.add_node(Operator::Merge, &[start, start]);
        let a = graph.parameter(0, Type::SIGNED32);
        let b = graph.parameter(1, Type::SIGNED32);
        let phi = graph.add_typed_node(Operator::Phi(rep), &[a, b, merge], Type::SIGNED32);
        let ret = graph.add_node(Operator::Return, &[phi, start, merge]);
        graph.add_end_input(ret);
        phi
    }

    #[test]
    fn test_untagged_phi_keeps_its_representation() {
        let mut graph = Graph::new();
        let phi = merged_phi(&mut graph, Rep::Float64);
        let mut selector = RepresentationSelector::new(&mut graph, LoweringConfig::default());
        selector.run().unwrap();
        assert_eq!(selector.representation(phi), Rep::Float64);
        drop(selector);

        assert_eq!(graph.op(phi), Operator::Phi(Rep::Float64));
        let input = graph.node(phi).value_input(0).unwrap();
        assert!(matches!(graph.op(input), Operator::Convert(_)));
    }

    #[test]
    fn test_tagged_phi_is_reselected() {
        let mut graph = Graph::new();
        let phi = merged_phi(&mut graph, Rep::Tagged);
        RepresentationSelector::new(&mut graph, LoweringConfig::default())
            .run()
            .unwrap();
        assert_eq!(graph.op(phi), Operator::Phi(Rep::Word32));
    }
}
