//! Control flow, leaves and dead values.

use super::super::selector::RepresentationSelector;
use super::Rep;
use crate::error::{LoweringError, LoweringResult};
use crate::ir::{NodeId, Operator};
use crate::lower::changer::is_int32_double;
use crate::repr::UseInfo;

/// Smallest and largest 31-bit small integers.
const SMI_MIN: f64 = -1073741824.0;
const SMI_MAX: f64 = 1073741823.0;

/// Whether `value` fits a tagged small integer.
pub(crate) fn is_smi_double(value: f64) -> bool {
    is_int32_double(value) && (SMI_MIN..=SMI_MAX).contains(&value)
}

impl RepresentationSelector<'_> {
    pub(super) fn visit_control(&mut self, node: NodeId, op: Operator) -> LoweringResult<()> {
        match op {
            Operator::Start => self.visit_leaf(node, Rep::Tagged),
            Operator::Dead => self.visit_leaf(node, Rep::None),
            Operator::DeadValue(_) => {
                self.process_input(node, 0, UseInfo::any())?;
                self.set_output_rep(node, Rep::None)
            }
            Operator::Branch => {
                self.process_input(node, 0, UseInfo::bool())?;
                self.process_remaining_inputs(node, 1)?;
                self.set_output_rep(node, Rep::None)
            }
            Operator::End
            | Operator::Merge
            | Operator::Loop
            | Operator::IfTrue
            | Operator::IfFalse
            | Operator::Return
            | Operator::Terminate
            | Operator::EffectPhi
            | Operator::Unreachable => {
                self.visit_inputs(node)?;
                self.set_output_rep(node, Rep::None)
            }
            _ => Err(LoweringError::invariant(node, format!("{op} is not a control node"))),
        }
    }

    pub(super) fn visit_leaf_op(&mut self, node: NodeId, op: Operator) -> LoweringResult<()> {
        match op {
            Operator::Parameter(_) => self.visit_leaf(node, Rep::Tagged),
            Operator::Int32Constant(_) => self.visit_leaf(node, Rep::Word32),
            Operator::Int64Constant(_) => self.visit_leaf(node, Rep::Word64),
            Operator::Float32Constant(_) => self.visit_leaf(node, Rep::Float32),
            Operator::Float64Constant(_) => self.visit_leaf(node, Rep::Float64),
            Operator::HeapConstant(_) => self.visit_leaf(node, Rep::TaggedPointer),
            Operator::NumberConstant(_) => self.visit_number_constant(node, op),
            _ => Err(LoweringError::invariant(node, format!("{op} is not a leaf"))),
        }
    }

    /// Small integers are tagged words; LOWER materializes the tagged bit
    /// pattern so that users reading TaggedSigned get a plain constant.
    fn visit_number_constant(&mut self, node: NodeId, op: Operator) -> LoweringResult<()> {
        let value = op
            .number_value()
            .ok_or_else(|| LoweringError::invariant(node, "number constant without a value"))?;
        if !is_smi_double(value) {
            return self.visit_leaf(node, Rep::Tagged);
        }
        self.visit_leaf(node, Rep::TaggedSigned)?;
        if self.lower() {
            let ty = self.graph.ty(node);
            // Shift-by-one Smi tagging: the low bit is clear.
            let tagged = (value as i64) << 1;
            let word = if self.config.is_64bit() {
                self.graph.add_typed_node(Operator::Int64Constant(tagged), &[], ty)
            } else {
                self.graph
                    .add_typed_node(Operator::Int32Constant(tagged as i32), &[], ty)
            };
            self.defer_replacement(node, word);
        }
        Ok(())
    }
}
