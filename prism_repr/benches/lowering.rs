//! Representation Selection Benchmarks
//!
//! Measures the full PROPAGATE, RETYPE and LOWER pipeline on synthetic
//! graphs shaped like the output of a bytecode graph builder.
//!
//! # Benchmark Categories
//!
//! 1. **Straight-line Arithmetic**: chains of speculative adds with and
//!    without a word32 truncation at the end
//! 2. **Loops**: counting loops whose phis need retyping and weakening
//! 3. **Integer Division**: modulus chains with diamond lowering on and off

use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use prism_repr::ir::{
    Graph, NodeId, NumberOp, NumberOperationHint, Operator, SpeculativeOp, Type,
};
use prism_repr::{LoweringConfig, MachineRepresentation, RepresentationSelector};

const SIZES: [usize; 3] = [16, 128, 1024];

// =============================================================================
// Graph Builders
// =============================================================================

fn finish(graph: &mut Graph, value: NodeId, effect: NodeId) {
    let start = graph.start;
    let ret = graph.add_node(Operator::Return, &[value, effect, start]);
    graph.add_end_input(ret);
}

/// `((p0 + p1) + p2) + ...` on the effect chain, optionally `| 0` at the end.
fn add_chain(n: usize, truncate: bool) -> Graph {
    let mut graph = Graph::new();
    let start = graph.start;
    let mut acc = graph.parameter(0, Type::SIGNED31);
    let mut effect = start;
    for i in 1..n {
        let p = graph.parameter((i % 8) as u16, Type::SIGNED31);
        acc = graph.add_typed_node(
            Operator::Speculative(SpeculativeOp::NumberAdd, NumberOperationHint::SignedSmall),
            &[acc, p, effect, start],
            Type::NUMBER,
        );
        effect = acc;
    }
    if truncate {
        let zero = graph.int32_constant(0);
        acc = graph.add_node(Operator::Number(NumberOp::BitwiseOr), &[acc, zero]);
    }
    finish(&mut graph, acc, effect);
    graph
}

/// `n` sequential counting loops, each feeding its exit value to the next.
fn loops(n: usize) -> Graph {
    let mut graph = Graph::new();
    let start = graph.start;
    let mut control = start;
    let mut value = graph.parameter(0, Type::range(0.0, 10.0));
    for _ in 0..n {
        let lp = graph.add_node(Operator::Loop, &[control, control]);
        let phi = graph.add_typed_node(
            Operator::Phi(MachineRepresentation::Tagged),
            &[value, value, lp],
            Type::NUMBER,
        );
        let one = graph.int32_constant(1);
        let inc = graph.add_typed_node(
            Operator::Number(NumberOp::Add),
            &[phi, one],
            Type::range(0.0, 1_000_000.0),
        );
        graph.replace_input(phi, 1, inc);
        let limit = graph.int32_constant(1_000_000);
        let cmp = graph.add_node(Operator::Number(NumberOp::LessThan), &[inc, limit]);
        let branch = graph.add_node(Operator::Branch, &[cmp, lp]);
        let if_true = graph.add_node(Operator::IfTrue, &[branch]);
        graph.replace_input(lp, 1, if_true);
        control = graph.add_node(Operator::IfFalse, &[branch]);
        value = phi;
    }
    let ret = graph.add_node(Operator::Return, &[value, start, control]);
    graph.add_end_input(ret);
    graph
}

/// `(((p0 % p1) % p2) ...) | 0` over unsigned inputs.
fn modulus_chain(n: usize) -> Graph {
    let mut graph = Graph::new();
    let start = graph.start;
    let mut acc = graph.parameter(0, Type::UNSIGNED32);
    for i in 1..n {
        let p = graph.parameter((i % 8) as u16, Type::UNSIGNED32);
        acc = graph.add_node(Operator::Number(NumberOp::Modulus), &[acc, p]);
    }
    let zero = graph.int32_constant(0);
    let or = graph.add_node(Operator::Number(NumberOp::BitwiseOr), &[acc, zero]);
    finish(&mut graph, or, start);
    graph
}

fn run(mut graph: Graph, config: LoweringConfig) -> usize {
    let stats = RepresentationSelector::new(&mut graph, config)
        .run()
        .expect("benchmark graph lowers");
    black_box(stats.nodes)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_arithmetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("arithmetic");

    for &n in &SIZES {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("checked_add_chain", n), &n, |b, &n| {
            b.iter_batched(
                || add_chain(n, false),
                |graph| run(graph, LoweringConfig::default()),
                BatchSize::SmallInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("truncated_add_chain", n), &n, |b, &n| {
            b.iter_batched(
                || add_chain(n, true),
                |graph| run(graph, LoweringConfig::default()),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_loops(c: &mut Criterion) {
    let mut group = c.benchmark_group("loops");

    for &n in &SIZES {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("weaken_immediately", n), &n, |b, &n| {
            b.iter_batched(
                || loops(n),
                |graph| run(graph, LoweringConfig::default()),
                BatchSize::SmallInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("refine_three_rounds", n), &n, |b, &n| {
            b.iter_batched(
                || loops(n),
                |graph| run(graph, LoweringConfig::default().with_phi_refinement_rounds(3)),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_division(c: &mut Criterion) {
    let mut group = c.benchmark_group("division");

    for &n in &SIZES {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("diamonds", n), &n, |b, &n| {
            b.iter_batched(
                || modulus_chain(n),
                |graph| run(graph, LoweringConfig::default()),
                BatchSize::SmallInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("machine_ops", n), &n, |b, &n| {
            b.iter_batched(
                || modulus_chain(n),
                |graph| {
                    run(
                        graph,
                        LoweringConfig::default().with_integer_division_lowering(false),
                    )
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

// =============================================================================
// Criterion Groups
// =============================================================================

criterion_group!(lowering_benches, bench_arithmetic, bench_loops, bench_division);

criterion_main!(lowering_benches);
