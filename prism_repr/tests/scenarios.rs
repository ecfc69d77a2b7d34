//! End-to-end lowering of small graphs.
//!
//! Each test builds a graph the way a bytecode graph builder would, runs the
//! full three-phase selector and inspects the machine-level result.

use pretty_assertions::assert_eq;
use prism_repr::ir::{
    ConversionOp, DeoptimizeReason, ElementAccess, FieldAccess, Graph, MachineOp, NodeId,
    NumberOp, NumberOperationHint, Operator, SpeculativeOp, WriteBarrierKind,
};
use prism_repr::ir::{CheckedOp, Type};
use prism_repr::{LoweringConfig, LoweringStats, MachineRepresentation, RepresentationSelector};

// =============================================================================
// Helpers
// =============================================================================

fn lower(graph: &mut Graph, config: LoweringConfig) -> LoweringStats {
    let stats = RepresentationSelector::new(graph, config)
        .run()
        .expect("lowering succeeds");
    graph.verify().expect("lowered graph is well formed");
    stats
}

fn ret(graph: &mut Graph, value: NodeId, effect: NodeId) -> NodeId {
    let start = graph.start;
    let node = graph.add_node(Operator::Return, &[value, effect, start]);
    graph.add_end_input(node);
    node
}

fn contains_op(graph: &Graph, pred: impl Fn(Operator) -> bool) -> bool {
    graph.iter().any(|(_, node)| pred(node.op))
}

fn is_checked_conversion(op: Operator) -> bool {
    matches!(op, Operator::Convert(conversion) if conversion.is_checked())
}

// =============================================================================
// Arithmetic
// =============================================================================

#[test]
fn test_truncated_small_integer_add_becomes_int32_add() {
    // (a + b) | 0 with a, b in Signed31.
    let mut graph = Graph::new();
    let start = graph.start;
    let a = graph.parameter(0, Type::SIGNED31);
    let b = graph.parameter(1, Type::SIGNED31);
    let sum = graph.add_node(
        Operator::Speculative(SpeculativeOp::NumberAdd, NumberOperationHint::SignedSmall),
        &[a, b, start, start],
    );
    let zero = graph.int32_constant(0);
    let or = graph.add_node(Operator::Number(NumberOp::BitwiseOr), &[sum, zero]);
    let ret = ret(&mut graph, or, sum);

    lower(&mut graph, LoweringConfig::default());

    assert_eq!(graph.op(sum), Operator::Machine(MachineOp::Int32Add));
    assert_eq!(graph.op(or), Operator::Machine(MachineOp::Word32Or));
    assert!(!contains_op(&graph, |op| matches!(op, Operator::Checked(_))));
    assert!(!contains_op(&graph, is_checked_conversion));
    // The add left the effect chain.
    assert_eq!(graph.node(ret).effect_input(0), Some(start));
}

#[test]
fn test_untruncated_small_integer_divide_is_checked() {
    let mut graph = Graph::new();
    let start = graph.start;
    let a = graph.parameter(0, Type::NUMBER);
    let b = graph.parameter(1, Type::NUMBER);
    let div = graph.add_typed_node(
        Operator::Speculative(SpeculativeOp::NumberDivide, NumberOperationHint::SignedSmall),
        &[a, b, start, start],
        Type::NUMBER,
    );
    ret(&mut graph, div, div);

    lower(&mut graph, LoweringConfig::default());

    assert_eq!(graph.op(div), Operator::Checked(CheckedOp::Int32Div));
    for i in 0..2 {
        let input = graph.node(div).input(i).expect("divide has two inputs");
        assert_eq!(
            graph.op(input),
            Operator::Convert(ConversionOp::CheckedTaggedSignedToInt32)
        );
        assert_eq!(
            ConversionOp::CheckedTaggedSignedToInt32.deopt_reason(),
            Some(DeoptimizeReason::NotASmi)
        );
    }
    // The input checks run before the division.
    let effect = graph.node(div).effect_input(0).expect("divide stays effectful");
    assert!(is_checked_conversion(graph.op(effect)));
}

#[test]
fn test_modulus_of_unsigned_inputs() {
    fn build(graph: &mut Graph) -> (NodeId, NodeId) {
        let a = graph.parameter(0, Type::UNSIGNED32_OR_MINUS_ZERO_OR_NAN);
        let b = graph.parameter(1, Type::UNSIGNED32_OR_MINUS_ZERO_OR_NAN);
        let rem = graph.add_node(Operator::Number(NumberOp::Modulus), &[a, b]);
        let zero = graph.int32_constant(0);
        let or = graph.add_node(Operator::Number(NumberOp::BitwiseOr), &[rem, zero]);
        let start = graph.start;
        ret(graph, or, start);
        (rem, or)
    }

    let mut graph = Graph::new();
    let (rem, _) = build(&mut graph);
    lower(
        &mut graph,
        LoweringConfig::default().with_integer_division_lowering(false),
    );
    assert_eq!(graph.op(rem), Operator::Machine(MachineOp::Uint32Mod));

    // With division lowering the zero and power-of-two divisors branch off.
    let mut graph = Graph::new();
    let (_, or) = build(&mut graph);
    lower(&mut graph, LoweringConfig::default());
    let result = graph.node(or).input(0).expect("or has a left input");
    assert_eq!(graph.op(result), Operator::Phi(MachineRepresentation::Word32));
    assert!(contains_op(&graph, |op| op == Operator::Machine(MachineOp::Uint32Mod)));
    assert!(contains_op(&graph, |op| op == Operator::Branch));
}

// =============================================================================
// Memory
// =============================================================================

#[test]
fn test_smi_store_needs_no_write_barrier() {
    let mut graph = Graph::new();
    let start = graph.start;
    let array = graph.parameter(0, Type::RECEIVER);
    let index = graph.int32_constant(0);
    let five = graph.number_constant(5.0);
    let store = graph.add_node(
        Operator::StoreElement(ElementAccess::fixed_array(Type::ANY)),
        &[array, index, five, start, start],
    );
    ret(&mut graph, array, store);

    let stats = lower(&mut graph, LoweringConfig::default());

    let Operator::StoreElement(access) = graph.op(store) else {
        panic!("store changed kind: {}", graph.op(store));
    };
    assert_eq!(access.machine_type.representation, MachineRepresentation::TaggedSigned);
    assert_eq!(access.write_barrier, WriteBarrierKind::NoWriteBarrier);
    assert_eq!(stats.write_barriers_elided, 1);

    // The stored constant is the tagged bit pattern of 5.
    let value = graph.node(store).input(2).expect("store has a value");
    assert_eq!(graph.op(value), Operator::Int64Constant(10));
}

#[test]
fn test_impossible_load_ends_the_effect_chain() {
    let mut graph = Graph::new();
    let start = graph.start;
    let object = graph.parameter(0, Type::RECEIVER);
    let load = graph.add_typed_node(
        Operator::LoadField(FieldAccess::tagged(8, Type::ANY)),
        &[object, start, start],
        Type::NONE,
    );
    let abs = graph.add_typed_node(Operator::Number(NumberOp::Abs), &[load], Type::NUMBER);
    let ret = ret(&mut graph, abs, load);

    let stats = lower(&mut graph, LoweringConfig::default());

    let effect = graph.node(ret).effect_input(0).expect("return has an effect");
    assert_eq!(graph.op(effect), Operator::Unreachable);
    assert_eq!(graph.node(effect).input(0), Some(load));
    assert!(matches!(graph.op(abs), Operator::DeadValue(_)));
    assert!(stats.unreachable_inserted >= 1);
}

// =============================================================================
// Loops
// =============================================================================

/// `for (i = init; i + 1 < 1e6; i = i + 1) {}` with the phi typed `Number`.
fn counting_loop(graph: &mut Graph, increment_type: Type) -> NodeId {
    let start = graph.start;
    let lp = graph.add_node(Operator::Loop, &[start, start]);
    let init = graph.parameter(0, Type::range(0.0, 10.0));
    let phi = graph.add_typed_node(
        Operator::Phi(MachineRepresentation::Tagged),
        &[init, init, lp],
        Type::NUMBER,
    );
    let one = graph.int32_constant(1);
    let inc = graph.add_typed_node(
        Operator::Number(NumberOp::Add),
        &[phi, one],
        increment_type,
    );
    graph.replace_input(phi, 1, inc);
    let limit = graph.int32_constant(1_000_000);
    let cmp = graph.add_node(Operator::Number(NumberOp::LessThan), &[inc, limit]);
    let branch = graph.add_node(Operator::Branch, &[cmp, lp]);
    let if_true = graph.add_node(Operator::IfTrue, &[branch]);
    let if_false = graph.add_node(Operator::IfFalse, &[branch]);
    graph.replace_input(lp, 1, if_true);
    let node = graph.add_node(Operator::Return, &[phi, start, if_false]);
    graph.add_end_input(node);
    phi
}

#[test]
fn test_loop_phi_type_converges() {
    for rounds in [0, 3] {
        let mut graph = Graph::new();
        let phi = counting_loop(&mut graph, Type::range(0.0, 1_000_000.0));
        let config = LoweringConfig::default().with_phi_refinement_rounds(rounds);

        let mut selector = RepresentationSelector::new(&mut graph, config);
        selector.run().expect("lowering terminates");
        let feedback = selector.feedback_type(phi).expect("phi is typed");

        assert!(
            Type::range(0.0, 1_000_000.0).is(feedback),
            "rounds {rounds}: {feedback} misses loop values"
        );
        assert!(feedback.is(Type::SIGNED32), "rounds {rounds}: {feedback}");
    }
}

#[test]
fn test_unbounded_loop_phi_is_weakened() {
    for rounds in [0, 5, 50] {
        let mut graph = Graph::new();
        let phi = counting_loop(&mut graph, Type::NUMBER);
        let config = LoweringConfig::default().with_phi_refinement_rounds(rounds);

        let mut selector = RepresentationSelector::new(&mut graph, config);
        let stats = selector.run().expect("lowering terminates");
        let feedback = selector.feedback_type(phi).expect("phi is typed");

        assert!(
            Type::range(0.0, 1_000_000.0).is(feedback),
            "rounds {rounds}: {feedback} misses loop values"
        );
        assert_eq!(feedback.min(), 0.0, "rounds {rounds}: {feedback}");
        assert!(feedback.max() > 1_000_000.0, "rounds {rounds}: {feedback} not widened");
        // Each refinement round revisits the loop at most once more.
        let bound = (rounds as usize + 8) * stats.nodes;
        assert!(
            stats.retype_visits <= bound,
            "rounds {rounds}: {} retype visits over {} nodes",
            stats.retype_visits,
            stats.nodes
        );
    }
}
