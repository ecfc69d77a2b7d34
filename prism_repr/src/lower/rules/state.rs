//! Deoptimization state: checkpoints, frame states and state values.
//!
//! State inputs never force a representation. LOWER records the
//! representation each value ended up in, so the deoptimizer can
//! rematerialize it.

use super::super::selector::RepresentationSelector;
use super::Rep;
use crate::error::LoweringResult;
use crate::ir::{NodeId, Operator, Type};
use crate::repr::{MachineSemantic, MachineType, UseInfo};

/// Frame-state input layout.
const PARAMETERS: usize = 0;
const LOCALS: usize = 1;
const ACCUMULATOR: usize = 2;
const CONTEXT: usize = 3;
const CLOSURE: usize = 4;
const OUTER_STATE: usize = 5;

/// Machine type the deoptimizer reads a value of `rep` and `ty` as.
pub(crate) fn deopt_machine_type_of(rep: Rep, ty: Type) -> MachineType {
    if ty.is_none() {
        return MachineType::none();
    }
    if rep.is_any_tagged() {
        return MachineType::any_tagged();
    }
    if rep == Rep::Word64 {
        return if ty.is(Type::SIGNED_BIGINT64) {
            MachineType::signed_bigint64()
        } else if ty.is(Type::BIGINT) {
            MachineType::any_tagged()
        } else {
            MachineType::new(Rep::Word64, MachineSemantic::Int64)
        };
    }
    let semantic = if ty.is(Type::SIGNED32) {
        MachineSemantic::Int32
    } else if ty.is(Type::UNSIGNED32) {
        MachineSemantic::Uint32
    } else {
        MachineSemantic::Any
    };
    MachineType::new(rep, semantic)
}

/// BigInts outside the signed 64-bit range only exist as heap objects.
fn is_large_bigint(ty: Type) -> bool {
    ty.is(Type::BIGINT) && !ty.is(Type::SIGNED_BIGINT64)
}

impl RepresentationSelector<'_> {
    pub(super) fn visit_checkpoint(&mut self, node: NodeId) -> LoweringResult<()> {
        self.visit_inputs(node)?;
        self.set_output_rep(node, Rep::None)
    }

    pub(super) fn visit_state_values(&mut self, node: NodeId) -> LoweringResult<()> {
        let count = self.graph.node(node).input_count();
        let mut types = Vec::with_capacity(count);
        for i in 0..count {
            let ty = self.input_type(node, i);
            self.process_input(node, i, self.state_value_use(ty))?;
            if self.lower() {
                let input = self.input(node, i)?;
                let rep = self.info(input).representation();
                let rep = if is_large_bigint(ty) { Rep::Tagged } else { rep };
                types.push(deopt_machine_type_of(rep, ty));
            }
        }
        if self.lower() {
            let list = self.graph.add_type_list(types);
            self.change_op(node, Operator::TypedStateValues(list));
        }
        self.set_output_rep(node, Rep::Tagged)
    }

    pub(super) fn visit_frame_state(&mut self, node: NodeId) -> LoweringResult<()> {
        self.process_input(node, PARAMETERS, UseInfo::any_tagged())?;
        self.process_input(node, LOCALS, UseInfo::any_tagged())?;

        let accumulator_type = self.input_type(node, ACCUMULATOR);
        self.process_input(node, ACCUMULATOR, self.state_value_use(accumulator_type))?;
        if self.lower() {
            // The accumulator is a lone value; give it a one-element list.
            let accumulator = self.input(node, ACCUMULATOR)?;
            let rep = if is_large_bigint(accumulator_type) {
                Rep::Tagged
            } else {
                self.info(accumulator).representation()
            };
            let list = self
                .graph
                .add_type_list(vec![deopt_machine_type_of(rep, accumulator_type)]);
            let wrapped = self.graph.add_typed_node(
                Operator::TypedStateValues(list),
                &[accumulator],
                Type::ANY,
            );
            self.graph.replace_input(node, ACCUMULATOR, wrapped);
        }

        self.process_input(node, CONTEXT, UseInfo::any_tagged())?;
        self.process_input(node, CLOSURE, UseInfo::any_tagged())?;
        self.process_remaining_inputs(node, OUTER_STATE)?;
        self.set_output_rep(node, Rep::Tagged)
    }

    fn state_value_use(&self, ty: Type) -> UseInfo {
        if is_large_bigint(ty) {
            UseInfo::any_tagged()
        } else {
            UseInfo::any()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deopt_types_keep_signedness() {
        assert_eq!(
            deopt_machine_type_of(Rep::Word32, Type::SIGNED32),
            MachineType::int32()
        );
        assert_eq!(
            deopt_machine_type_of(Rep::Word32, Type::UNSIGNED32),
            MachineType::uint32()
        );
        assert_eq!(
            deopt_machine_type_of(Rep::Float64, Type::NUMBER),
            MachineType::new(Rep::Float64, MachineSemantic::Any)
        );
    }

    #[test]
    fn test_deopt_types_of_tagged_and_wide_values() {
        assert_eq!(deopt_machine_type_of(Rep::TaggedSigned, Type::SIGNED31), MachineType::any_tagged());
        assert_eq!(deopt_machine_type_of(Rep::Word32, Type::NONE), MachineType::none());
        assert_eq!(
            deopt_machine_type_of(Rep::Word64, Type::SIGNED_BIGINT64),
            MachineType::signed_bigint64()
        );
        assert_eq!(deopt_machine_type_of(Rep::Word64, Type::BIGINT), MachineType::any_tagged());
        assert_eq!(deopt_machine_type_of(Rep::Word64, Type::SAFE_INTEGER), MachineType::int64());
    }

    #[test]
    fn test_large_bigints() {
        assert!(is_large_bigint(Type::BIGINT));
        assert!(!is_large_bigint(Type::SIGNED_BIGINT64));
        assert!(!is_large_bigint(Type::NUMBER));
    }
}
