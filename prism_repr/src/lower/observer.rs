//! Observation hooks for representation selection.
//!
//! The selector reports its decisions through a [`LoweringObserver`]. The
//! observer is purely diagnostic: nothing it sees feeds back into the pass.
//!
//! Two observers ship with the crate:
//! - [`NullObserver`]: discards everything
//! - [`TracingObserver`]: forwards every event to `tracing` at `TRACE`

use tracing::trace;

use super::selector::Phase;
use crate::ir::{NodeId, Operator, Type};
use crate::repr::{MachineRepresentation, Truncation, UseInfo};

// =============================================================================
// Observer Trait
// =============================================================================

/// Receiver of per-node lowering decisions.
///
/// All methods default to doing nothing.
pub trait LoweringObserver {
    /// A phase is about to start over `nodes` traversal entries.
    fn on_phase_start(&mut self, _phase: Phase, _nodes: usize) {}

    /// A node was visited.
    fn on_visit(
        &mut self,
        _phase: Phase,
        _node: NodeId,
        _op: Operator,
        _truncation: Truncation,
        _representation: MachineRepresentation,
        _feedback_type: Option<Type>,
    ) {
    }

    /// A conversion was spliced between `input` and input `index` of `user`.
    fn on_conversion(
        &mut self,
        _user: NodeId,
        _index: usize,
        _input: NodeId,
        _from: MachineRepresentation,
        _use_info: UseInfo,
        _conversion: NodeId,
    ) {
    }

    /// `node` will be replaced by `replacement` once LOWER finishes.
    fn on_replacement(&mut self, _node: NodeId, _replacement: NodeId) {}

    /// `node` was proven dead and disconnected.
    fn on_kill(&mut self, _node: NodeId) {}
}

// =============================================================================
// Null Observer
// =============================================================================

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl LoweringObserver for NullObserver {}

// =============================================================================
// Tracing Observer
// =============================================================================

/// Observer that emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl LoweringObserver for TracingObserver {
    fn on_phase_start(&mut self, phase: Phase, nodes: usize) {
        trace!(?phase, nodes, "--{{{} phase}}--", phase.name());
    }

    fn on_visit(
        &mut self,
        phase: Phase,
        node: NodeId,
        op: Operator,
        truncation: Truncation,
        representation: MachineRepresentation,
        feedback_type: Option<Type>,
    ) {
        match feedback_type {
            Some(ty) => trace!(
                ?phase,
                "visit {node}: {op} ({truncation}) -> {representation} [{ty}]"
            ),
            None => trace!(?phase, "visit {node}: {op} ({truncation}) -> {representation}"),
        }
    }

    fn on_conversion(
        &mut self,
        user: NodeId,
        index: usize,
        input: NodeId,
        from: MachineRepresentation,
        use_info: UseInfo,
        conversion: NodeId,
    ) {
        trace!("  change: {user}:{index} from {input} {from} to {use_info} via {conversion}");
    }

    fn on_replacement(&mut self, node: NodeId, replacement: NodeId) {
        trace!("defer replacement {node} with {replacement}");
    }

    fn on_kill(&mut self, node: NodeId) {
        trace!("killing {node}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        visits: usize,
        kills: usize,
    }

    impl LoweringObserver for Counting {
        fn on_visit(
            &mut self,
            _phase: Phase,
            _node: NodeId,
            _op: Operator,
            _truncation: Truncation,
            _representation: MachineRepresentation,
            _feedback_type: Option<Type>,
        ) {
            self.visits += 1;
        }

        fn on_kill(&mut self, _node: NodeId) {
            self.kills += 1;
        }
    }

    #[test]
    fn test_default_methods_are_no_ops() {
        let mut observer = Counting::default();
        observer.on_phase_start(Phase::Propagate, 3);
        observer.on_replacement(NodeId::new(1), NodeId::new(2));
        observer.on_kill(NodeId::new(1));
        observer.on_visit(
            Phase::Lower,
            NodeId::new(1),
            Operator::Start,
            Truncation::none(),
            MachineRepresentation::None,
            None,
        );
        assert_eq!(observer.visits, 1);
        assert_eq!(observer.kills, 1);
    }

    #[test]
    fn test_tracing_observer_accepts_events() {
        let mut observer = TracingObserver;
        observer.on_phase_start(Phase::Retype, 0);
        observer.on_kill(NodeId::new(4));
    }
}
