//! Representation changes through the public changer API.

use pretty_assertions::assert_eq;
use prism_repr::ir::{
    CheckOp, ConversionOp, DeoptimizeReason, Graph, NodeId, NumberOp, NumberOperationHint,
    Operator, SpeculativeOp, Type,
};
use prism_repr::lower::changer::{double_to_int32, is_int32_double};
use prism_repr::repr::IdentifyZeros;
use prism_repr::{MachineRepresentation as Rep, RepresentationChanger, UseInfo};

fn changer() -> RepresentationChanger {
    RepresentationChanger::new(Rep::Word64)
}

/// A pure consumer of `input`.
fn pure_user(graph: &mut Graph, input: NodeId) -> NodeId {
    graph.add_node(Operator::Number(NumberOp::Abs), &[input])
}

/// An effectful consumer of `input`, hanging off the start node.
fn effectful_user(graph: &mut Graph, input: NodeId) -> NodeId {
    let start = graph.start;
    graph.add_node(
        Operator::Speculative(SpeculativeOp::NumberAdd, NumberOperationHint::SignedSmall),
        &[input, input, start, start],
    )
}

#[test]
fn test_smi_round_trip() {
    let mut graph = Graph::new();
    let p = graph.parameter(0, Type::SIGNED31);
    let user = pure_user(&mut graph, p);

    let word = changer()
        .get_representation_for(
            &mut graph,
            p,
            Rep::TaggedSigned,
            Type::SIGNED31,
            user,
            UseInfo::truncating_word32(),
        )
        .unwrap();
    assert_eq!(
        graph.op(word),
        Operator::Convert(ConversionOp::ChangeTaggedSignedToInt32)
    );
    assert_eq!(graph.ty(word), Type::SIGNED31);

    let tagged = changer()
        .get_representation_for(
            &mut graph,
            word,
            Rep::Word32,
            Type::SIGNED31,
            user,
            UseInfo::tagged_signed(),
        )
        .unwrap();
    assert_eq!(
        graph.op(tagged),
        Operator::Convert(ConversionOp::ChangeInt31ToTaggedSigned)
    );
    assert_eq!(graph.node(tagged).value_input(0), Some(word));
}

#[test]
fn test_float64_truncates_to_word32() {
    let mut graph = Graph::new();
    let p = graph.parameter(0, Type::NUMBER);
    let user = pure_user(&mut graph, p);

    let word = changer()
        .get_representation_for(
            &mut graph,
            p,
            Rep::Float64,
            Type::NUMBER,
            user,
            UseInfo::truncating_word32(),
        )
        .unwrap();
    assert_eq!(
        graph.op(word),
        Operator::Convert(ConversionOp::TruncateFloat64ToWord32)
    );
    // Unchecked conversions stay off the effect chain.
    assert_eq!(graph.node(word).effect_input(0), None);
}

#[test]
fn test_signed32_float64_changes_without_check() {
    let mut graph = Graph::new();
    let p = graph.parameter(0, Type::SIGNED32);
    let user = effectful_user(&mut graph, p);
    let use_info = UseInfo::checked_signed_small_as_word32(IdentifyZeros::DistinguishZeros);

    let word = changer()
        .get_representation_for(&mut graph, p, Rep::Float64, Type::SIGNED32, user, use_info)
        .unwrap();
    assert_eq!(graph.op(word), Operator::Convert(ConversionOp::ChangeFloat64ToInt32));
    assert_eq!(graph.node(user).effect_input(0), Some(graph.start));
}

#[test]
fn test_integral_constants_fold() {
    let mut graph = Graph::new();
    let seven = graph.number_constant(7.0);
    let user = pure_user(&mut graph, seven);

    let word = changer()
        .get_representation_for(
            &mut graph,
            seven,
            Rep::Tagged,
            Type::range(7.0, 7.0),
            user,
            UseInfo::truncating_word32(),
        )
        .unwrap();
    assert_eq!(graph.op(word), Operator::Int32Constant(7));
}

#[test]
fn test_bit_to_checked_word32_deopts_unconditionally() {
    let mut graph = Graph::new();
    let start = graph.start;
    let flag = graph.parameter(0, Type::BOOLEAN);
    let user = effectful_user(&mut graph, flag);
    let use_info = UseInfo::checked_signed_small_as_word32(IdentifyZeros::DistinguishZeros);

    let result = changer()
        .get_representation_for(&mut graph, flag, Rep::Bit, Type::BOOLEAN, user, use_info)
        .unwrap();
    assert_eq!(graph.op(result), Operator::DeadValue(Rep::Word32));

    // DeadValue <- Unreachable <- CheckIf(false), with the user behind it.
    let unreachable = graph.node(result).input(0).unwrap();
    assert_eq!(graph.op(unreachable), Operator::Unreachable);
    assert_eq!(graph.node(user).effect_input(0), Some(unreachable));
    let check = graph.node(unreachable).input(0).unwrap();
    assert_eq!(
        graph.op(check),
        Operator::Check(CheckOp::If(DeoptimizeReason::NotASmi))
    );
    let never = graph.node(check).input(0).unwrap();
    assert_eq!(graph.op(never), Operator::Int32Constant(0));
    assert_eq!(graph.node(check).effect_input(0), Some(start));
}

#[test]
fn test_double_to_int32_wraps() {
    assert_eq!(double_to_int32(-0.0), 0);
    assert_eq!(double_to_int32(3.7), 3);
    assert_eq!(double_to_int32(-2147483649.0), i32::MAX);
    assert_eq!(double_to_int32(f64::NEG_INFINITY), 0);
    assert!(is_int32_double(f64::from(i32::MIN)));
    assert!(!is_int32_double(f64::NAN));
}
