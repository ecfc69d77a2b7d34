//! Calls and fast API calls.
//!
//! Argument uses come from the linkage metadata; anything past the
//! declared parameters is passed tagged.

use super::super::selector::RepresentationSelector;
use super::{truncating_use_for, Rep};
use crate::error::{LoweringError, LoweringResult};
use crate::ir::{CType, CTypeFlags, CTypeInfo, CallDescriptorId, FastApiCallId, NodeId};
use crate::repr::{IdentifyZeros, UseInfo};

/// Use of a C argument of the given type.
fn fast_api_argument_use(node: NodeId, arg: CTypeInfo, int64_as_bigint: bool) -> LoweringResult<UseInfo> {
    // Range enforcement and clamping are done on the double.
    if arg.flags != CTypeFlags::None {
        return Ok(UseInfo::checked_number_as_float64(IdentifyZeros::IdentifyZeros));
    }
    Ok(match arg.ty {
        CType::Void => {
            return Err(LoweringError::invariant(node, "void fast API argument"));
        }
        CType::Bool => UseInfo::bool(),
        CType::Int32 | CType::Uint32 => UseInfo::checked_number_as_word32(),
        CType::Int64 | CType::Uint64 if int64_as_bigint => UseInfo::checked_bigint_truncating_word64(),
        CType::Int64 | CType::Uint64 => UseInfo::checked_signed64_as_word64(IdentifyZeros::IdentifyZeros),
        CType::Float32 | CType::Float64 => {
            UseInfo::checked_number_as_float64(IdentifyZeros::DistinguishZeros)
        }
        CType::Pointer | CType::V8Value | CType::SeqOneByteString => UseInfo::any_tagged(),
    })
}

/// Representation of a C return value.
fn fast_api_return_representation(ret: CTypeInfo, int64_as_bigint: bool) -> Rep {
    match ret.ty {
        CType::Bool => Rep::Bit,
        CType::Int32 | CType::Uint32 => Rep::Word32,
        CType::Int64 | CType::Uint64 if int64_as_bigint => Rep::Word64,
        CType::Int64 | CType::Uint64 => Rep::Float64,
        CType::Float32 => Rep::Float32,
        CType::Float64 => Rep::Float64,
        CType::Void | CType::Pointer | CType::V8Value | CType::SeqOneByteString => Rep::Tagged,
    }
}

impl RepresentationSelector<'_> {
    /// `Call(target, args.., context, effect, control)`.
    pub(super) fn visit_call(&mut self, node: NodeId, id: CallDescriptorId) -> LoweringResult<()> {
        let (parameters, output) = {
            let descriptor = self
                .graph
                .call_descriptor(id)
                .ok_or_else(|| LoweringError::invariant(node, format!("unknown call descriptor {}", id.0)))?;
            let parameters: Vec<Rep> = descriptor.parameters.iter().map(|p| p.representation).collect();
            let output = descriptor
                .returns
                .first()
                .map_or(Rep::Tagged, |ret| ret.representation);
            (parameters, output)
        };
        let value_inputs = self.graph.node(node).value_input_count();
        if value_inputs <= parameters.len() {
            return Err(LoweringError::invariant(
                node,
                format!("call with {value_inputs} value inputs for {} parameters", parameters.len()),
            ));
        }

        self.process_input(node, 0, UseInfo::any())?;
        for (i, &rep) in parameters.iter().enumerate() {
            self.process_input(node, i + 1, truncating_use_for(node, rep)?)?;
        }
        for i in parameters.len() + 1..value_inputs {
            self.process_input(node, i, UseInfo::any_tagged())?;
        }
        self.process_remaining_inputs(node, value_inputs)?;
        self.set_output_rep(node, output)
    }

    /// `FastApiCall(c_args.., slow_target, slow_args.., context, frame_state,
    /// effect, control)`.
    pub(super) fn visit_fast_api_call(&mut self, node: NodeId, id: FastApiCallId) -> LoweringResult<()> {
        let info = self
            .graph
            .fast_api_call(id)
            .cloned()
            .ok_or_else(|| LoweringError::invariant(node, format!("unknown fast API call {}", id.0)))?;
        let value_inputs = self.graph.node(node).value_input_count();
        let c_args = info.argument_count();
        if value_inputs <= c_args {
            return Err(LoweringError::invariant(node, "fast API call without a slow call target"));
        }

        for (i, &arg) in info.arguments.iter().enumerate() {
            let use_info = fast_api_argument_use(node, arg, info.int64_as_bigint)?;
            self.process_input(node, i, use_info)?;
        }
        for i in c_args..value_inputs {
            self.process_input(node, i, UseInfo::any_tagged())?;
        }
        self.process_remaining_inputs(node, value_inputs)?;
        self.set_output_rep(
            node,
            fast_api_return_representation(info.return_info, info.int64_as_bigint),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoweringConfig;
    use crate::ir::{CallDescriptor, FastApiCallInfo, Graph, Operator, Type};
    use crate::lower::RepresentationSelector;
    use crate::repr::MachineType;

    #[test]
    fn test_argument_uses() {
        let node = NodeId::new(1);
        let use_of = |arg| fast_api_argument_use(node, arg, false).unwrap();
        assert_eq!(use_of(CTypeInfo::new(CType::Bool)), UseInfo::bool());
        assert_eq!(use_of(CTypeInfo::new(CType::Uint32)), UseInfo::checked_number_as_word32());
        assert_eq!(
            use_of(CTypeInfo::with_flags(CType::Int32, CTypeFlags::Clamp)),
            UseInfo::checked_number_as_float64(IdentifyZeros::IdentifyZeros)
        );
        assert_eq!(
            fast_api_argument_use(node, CTypeInfo::new(CType::Int64), true).unwrap(),
            UseInfo::checked_bigint_truncating_word64()
        );
        assert!(fast_api_argument_use(node, CTypeInfo::new(CType::Void), false).is_err());
    }

    #[test]
    fn test_return_representations() {
        assert_eq!(fast_api_return_representation(CTypeInfo::new(CType::Int64), false), Rep::Float64);
        assert_eq!(fast_api_return_representation(CTypeInfo::new(CType::Int64), true), Rep::Word64);
        assert_eq!(fast_api_return_representation(CTypeInfo::new(CType::Void), false), Rep::Tagged);
    }

    #[test]
    fn test_call_arguments_follow_descriptor() {
        let mut graph = Graph::new();
        let start = graph.start;
        let descriptor = graph.add_call_descriptor(CallDescriptor::new(
            vec![MachineType::float64()],
            vec![MachineType::int32()],
        ));
        let target = graph.parameter(0, Type::ANY);
        let arg = graph.parameter(1, Type::NUMBER);
        let extra = graph.int32_constant(7);
        let context = graph.parameter(2, Type::ANY);
        let call = graph.add_typed_node(
            Operator::Call(descriptor),
            &[target, arg, extra, context, start, start],
            Type::SIGNED32,
        );
        let ret = graph.add_node(Operator::Return, &[call, call, start]);
        graph.add_end_input(ret);

        let mut selector = RepresentationSelector::new(&mut graph, LoweringConfig::default());
        selector.run().unwrap();
        assert_eq!(selector.representation(call), Rep::Word32);
        drop(selector);

        let node = graph.node(call);
        assert_eq!(node.input(0), Some(target));
        let float_arg = node.input(1).unwrap();
        assert!(matches!(graph.op(float_arg), Operator::Convert(_)));
        // The extra argument is passed tagged.
        let tagged_extra = node.input(2).unwrap();
        assert!(matches!(graph.op(tagged_extra), Operator::NumberConstant(_)));
    }

    #[test]
    fn test_fast_api_call_output() {
        let mut graph = Graph::new();
        let start = graph.start;
        let info = graph.add_fast_api_call(FastApiCallInfo::new(
            vec![CTypeInfo::new(CType::Int32)],
            CTypeInfo::new(CType::Bool),
        ));
        let arg = graph.parameter(0, Type::SIGNED32);
        let slow_target = graph.parameter(1, Type::ANY);
        let context = graph.parameter(2, Type::ANY);
        let frame_state = graph.parameter(3, Type::ANY);
        let call = graph.add_typed_node(
            Operator::FastApiCall(info),
            &[arg, slow_target, context, frame_state, start, start],
            Type::BOOLEAN,
        );
        let ret = graph.add_node(Operator::Return, &[call, call, start]);
        graph.add_end_input(ret);

        let mut selector = RepresentationSelector::new(&mut graph, LoweringConfig::default());
        selector.run().unwrap();
        assert_eq!(selector.representation(call), Rep::Bit);
    }
}
