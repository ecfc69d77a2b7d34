//! The representation selection driver.
//!
//! Owns the per-node [`NodeInfo`] table, the traversal order, the revisit
//! queue and the might-need-revisit map, and runs the three phases over a
//! borrowed [`Graph`]. Per-opcode rules live in [`super::rules`] and reach
//! the driver through the helpers defined here.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use rustc_hash::FxHashMap;
use tracing::debug;

use super::changer::RepresentationChanger;
use super::node_info::{InputUseLedger, NodeInfo};
use super::observer::{LoweringObserver, NullObserver, TracingObserver};
use crate::config::LoweringConfig;
use crate::error::{LoweringError, LoweringResult};
use crate::ir::{Graph, Node, NodeId, OperationTyper, SecondaryMap, Type};
use crate::repr::{MachineRepresentation, Truncation, TypeCheckKind, UseInfo};
use crate::tick::TickCounter;

// =============================================================================
// Phase
// =============================================================================

/// The three phases of representation selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Backward propagation of truncations.
    Propagate,
    /// Forward recomputation of feedback types and representations.
    Retype,
    /// Conversion insertion and operator rewriting.
    Lower,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Propagate => "PROPAGATE",
            Phase::Retype => "RETYPE",
            Phase::Lower => "LOWER",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Counters collected during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoweringStats {
    /// Nodes in the traversal order.
    pub nodes: usize,
    /// PROPAGATE visits, revisits included.
    pub propagate_visits: usize,
    /// RETYPE visits, revisits included.
    pub retype_visits: usize,
    /// Nodes visited in LOWER.
    pub lowered: usize,
    /// Conversions spliced onto inputs.
    pub conversions_inserted: usize,
    /// Deferred replacements applied after LOWER.
    pub replacements: usize,
    /// Nodes killed as unused or unreachable.
    pub kills: usize,
    /// Unreachable markers spliced into effect chains.
    pub unreachable_inserted: usize,
    /// Stores whose write barrier was weakened.
    pub write_barriers_elided: usize,
    /// Guards removed because the input type already satisfies them.
    pub checks_elided: usize,
    /// Total node visits observed by the tick counter.
    pub ticks: u64,
}

// =============================================================================
// Representation Selector
// =============================================================================

/// Three-phase representation selection over one graph.
pub struct RepresentationSelector<'g> {
    pub(super) graph: &'g mut Graph,
    pub(super) config: LoweringConfig,
    pub(super) phase: Phase,
    infos: SecondaryMap<Node, NodeInfo>,
    traversal: Vec<NodeId>,
    revisit_queue: VecDeque<NodeId>,
    might_need_revisit: FxHashMap<NodeId, Vec<NodeId>>,
    pub(super) replacements: Vec<(NodeId, NodeId)>,
    pub(super) changer: RepresentationChanger,
    pub(super) typer: OperationTyper,
    pub(super) observer: Box<dyn LoweringObserver + 'g>,
    ticks: TickCounter,
    ledgers: FxHashMap<NodeId, InputUseLedger>,
    pub(super) stats: LoweringStats,
}

impl<'g> RepresentationSelector<'g> {
    /// Create a selector for `graph`.
    pub fn new(graph: &'g mut Graph, config: LoweringConfig) -> Self {
        let observer: Box<dyn LoweringObserver + 'g> = if config.trace {
            Box::new(TracingObserver)
        } else {
            Box::new(NullObserver)
        };
        let capacity = graph.len();
        Self {
            changer: RepresentationChanger::new(config.pointer_representation),
            graph,
            config,
            phase: Phase::Propagate,
            infos: SecondaryMap::with_capacity(capacity),
            traversal: Vec::with_capacity(capacity),
            revisit_queue: VecDeque::new(),
            might_need_revisit: FxHashMap::default(),
            replacements: Vec::new(),
            typer: OperationTyper::new(),
            observer,
            ticks: TickCounter::new(),
            ledgers: FxHashMap::default(),
            stats: LoweringStats::default(),
        }
    }

    /// Replace the observer selected from the configuration.
    pub fn with_observer(mut self, observer: impl LoweringObserver + 'g) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Abort with [`LoweringError::Aborted`] once `flag` is set.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.ticks = TickCounter::with_cancellation(flag);
        self
    }

    /// Run all three phases.
    pub fn run(&mut self) -> LoweringResult<LoweringStats> {
        self.generate_traversal();
        self.run_propagate_phase()?;
        self.run_retype_phase()?;
        self.run_lower_phase()?;
        self.stats.ticks = self.ticks.ticks();
        Ok(self.stats.clone())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Settled output representation of `node`.
    #[inline]
    pub fn representation(&self, node: NodeId) -> MachineRepresentation {
        self.infos.get(node).representation()
    }

    /// Accumulated truncation of `node`.
    #[inline]
    pub fn truncation(&self, node: NodeId) -> Truncation {
        self.infos.get(node).truncation()
    }

    /// Feedback type of `node`, if RETYPE computed one.
    #[inline]
    pub fn feedback_type(&self, node: NodeId) -> Option<Type> {
        self.infos.get(node).feedback_type()
    }

    /// Post-order of the nodes reachable from the end node.
    #[inline]
    pub fn traversal(&self) -> &[NodeId] {
        &self.traversal
    }

    #[inline]
    pub(super) fn info(&self, node: NodeId) -> &NodeInfo {
        self.infos.get(node)
    }

    #[inline]
    pub(super) fn info_mut(&mut self, node: NodeId) -> &mut NodeInfo {
        self.infos.get_mut(node)
    }

    /// Feedback type when known, static type otherwise.
    #[inline]
    pub(super) fn type_of(&self, node: NodeId) -> Type {
        self.infos
            .get(node)
            .feedback_type()
            .unwrap_or_else(|| self.graph.ty(node))
    }

    /// Feedback type, `NONE` while unset.
    #[inline]
    pub(super) fn feedback_type_of(&self, node: NodeId) -> Type {
        self.infos.get(node).feedback_type().unwrap_or(Type::NONE)
    }

    #[inline]
    pub(super) fn propagate(&self) -> bool {
        self.phase == Phase::Propagate
    }

    #[inline]
    pub(super) fn lower(&self) -> bool {
        self.phase == Phase::Lower
    }

    /// Value input `index` of `node`.
    pub(super) fn input(&self, node: NodeId, index: usize) -> LoweringResult<NodeId> {
        self.graph
            .node(node)
            .input(index)
            .ok_or_else(|| LoweringError::invariant(node, format!("missing input {index}")))
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    fn reset_node_info_state(&mut self) {
        for info in self.infos.values_mut() {
            info.reset_state();
        }
    }

    /// Iterative post-order walk from the end node.
    fn generate_traversal(&mut self) {
        self.reset_node_info_state();
        self.traversal.clear();
        self.infos.resize(self.graph.len());

        let end = self.graph.end;
        let mut stack: Vec<(NodeId, usize)> = vec![(end, 0)];
        self.infos.get_mut(end).set_pushed();

        while let Some(&(node, _)) = stack.last() {
            let mut pushed_unvisited = false;
            loop {
                let top = stack.len() - 1;
                let index = stack[top].1;
                let Some(input) = self.graph.node(node).input(index) else {
                    break;
                };
                stack[top].1 += 1;
                let input_info = self.infos.get_mut(input);
                if input_info.unvisited() {
                    input_info.set_pushed();
                    stack.push((input, 0));
                    pushed_unvisited = true;
                    break;
                } else if input_info.pushed() {
                    // The input is on a cycle and will be retyped after
                    // `node`; revisit `node` once it is.
                    self.might_need_revisit.entry(input).or_default().push(node);
                }
            }
            if pushed_unvisited {
                continue;
            }
            stack.pop();
            self.infos.get_mut(node).set_visited();
            self.traversal.push(node);
        }

        self.stats.nodes = self.traversal.len();
        debug!(
            nodes = self.traversal.len(),
            cycles = self.might_need_revisit.len(),
            "generated traversal"
        );
    }

    fn begin_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.reset_node_info_state();
        debug_assert!(self.revisit_queue.is_empty());
        self.observer.on_phase_start(phase, self.traversal.len());
    }

    fn notify_visit(&mut self, node: NodeId) {
        let info = self.infos.get(node);
        let (truncation, representation, feedback) =
            (info.truncation(), info.representation(), info.feedback_type());
        let op = self.graph.op(node);
        self.observer
            .on_visit(self.phase, node, op, truncation, representation, feedback);
    }

    // =========================================================================
    // PROPAGATE
    // =========================================================================

    fn run_propagate_phase(&mut self) -> LoweringResult<()> {
        self.begin_phase(Phase::Propagate);
        if self.config.verify_truncation_monotonicity {
            self.ledgers.clear();
        }

        for i in (0..self.traversal.len()).rev() {
            let node = self.traversal[i];
            self.propagate_truncation(node)?;
            while let Some(revisit) = self.revisit_queue.pop_front() {
                self.propagate_truncation(revisit)?;
            }
        }

        debug!(
            visits = self.stats.propagate_visits,
            revisits = self.stats.propagate_visits.saturating_sub(self.traversal.len()),
            "propagate phase finished"
        );
        Ok(())
    }

    fn propagate_truncation(&mut self, node: NodeId) -> LoweringResult<()> {
        self.ticks.tick()?;
        self.stats.propagate_visits += 1;
        self.infos.get_mut(node).set_visited();
        self.notify_visit(node);
        let truncation = self.infos.get(node).truncation();
        self.visit_node(node, truncation)
    }

    /// Register `use_info` on input `index` of `node` (PROPAGATE only).
    fn enqueue_input(&mut self, node: NodeId, index: usize, use_info: UseInfo) -> LoweringResult<()> {
        debug_assert!(self.propagate());
        let input = self.input(node, index)?;
        if self.config.verify_truncation_monotonicity {
            self.ledgers
                .entry(node)
                .or_default()
                .set_and_check(node, index, use_info)?;
        }

        let info = self.infos.get_mut(input);
        if info.unvisited() {
            info.add_use(use_info);
            return Ok(());
        }
        if info.add_use(use_info) && !info.queued() {
            debug_assert!(info.visited());
            info.set_queued();
            self.revisit_queue.push_back(input);
        }
        Ok(())
    }

    // =========================================================================
    // RETYPE
    // =========================================================================

    fn run_retype_phase(&mut self) -> LoweringResult<()> {
        self.begin_phase(Phase::Retype);

        for i in 0..self.traversal.len() {
            let node = self.traversal[i];
            if !self.retype_node(node)? {
                continue;
            }
            let Some(users) = self.might_need_revisit.get(&node) else {
                continue;
            };
            for user in users.clone() {
                self.push_node_to_revisit_if_visited(user);
            }

            while let Some(revisit) = self.revisit_queue.pop_front() {
                if !self.retype_node(revisit)? {
                    continue;
                }
                // Inputs changed mid-phase; every user may now be stale.
                let users = self.graph.uses(revisit).to_vec();
                for user in users {
                    self.push_node_to_revisit_if_visited(user);
                }
            }
        }

        debug!(
            visits = self.stats.retype_visits,
            revisits = self.stats.retype_visits.saturating_sub(self.traversal.len()),
            "retype phase finished"
        );
        Ok(())
    }

    fn push_node_to_revisit_if_visited(&mut self, node: NodeId) {
        let info = self.infos.get_mut(node);
        if info.visited() {
            info.set_queued();
            self.revisit_queue.push_back(node);
        }
    }

    /// Recompute the feedback type and settle the representation.
    /// Returns whether the feedback type changed.
    fn retype_node(&mut self, node: NodeId) -> LoweringResult<bool> {
        self.ticks.tick()?;
        self.stats.retype_visits += 1;
        self.infos.get_mut(node).set_visited();
        let updated = self.update_feedback_type(node);
        self.notify_visit(node);
        let truncation = self.infos.get(node).truncation();
        self.visit_node(node, truncation)?;
        Ok(updated)
    }

    // =========================================================================
    // LOWER
    // =========================================================================

    fn run_lower_phase(&mut self) -> LoweringResult<()> {
        self.begin_phase(Phase::Lower);

        for i in 0..self.traversal.len() {
            let node = self.traversal[i];
            self.ticks.tick()?;
            self.stats.lowered += 1;
            self.notify_visit(node);
            let truncation = self.infos.get(node).truncation();
            self.visit_node(node, truncation)?;
        }

        self.apply_replacements();
        debug!(
            lowered = self.stats.lowered,
            conversions = self.stats.conversions_inserted,
            replacements = self.stats.replacements,
            kills = self.stats.kills,
            "lower phase finished"
        );
        Ok(())
    }

    /// Splice the conversion demanded by `use_info` onto input `index`.
    pub(super) fn convert_input(
        &mut self,
        node: NodeId,
        index: usize,
        use_info: UseInfo,
        input_type: Option<Type>,
    ) -> LoweringResult<()> {
        if use_info.representation() == MachineRepresentation::None {
            return Ok(());
        }
        let input = self.input(node, index)?;
        let input_rep = self.infos.get(input).representation();
        if input_rep == use_info.representation() && use_info.type_check() == TypeCheckKind::None {
            return Ok(());
        }

        let ty = input_type.unwrap_or_else(|| self.type_of(input));
        let converted =
            self.changer
                .get_representation_for(self.graph, input, input_rep, ty, node, use_info)?;
        if converted != input {
            self.graph.replace_input(node, index, converted);
            self.stats.conversions_inserted += 1;
            self.observer
                .on_conversion(node, index, input, input_rep, use_info, converted);
        }
        Ok(())
    }

    // =========================================================================
    // Rule Helpers
    // =========================================================================

    /// Declare (PROPAGATE) or satisfy (LOWER) the use of input `index`.
    pub(super) fn process_input(
        &mut self,
        node: NodeId,
        index: usize,
        use_info: UseInfo,
    ) -> LoweringResult<()> {
        match self.phase {
            Phase::Propagate => self.enqueue_input(node, index, use_info),
            Phase::Retype => Ok(()),
            Phase::Lower => self.convert_input(node, index, use_info, None),
        }
    }

    /// Context and frame-state inputs from `index` on are tagged uses;
    /// effect and control inputs carry no demand.
    pub(super) fn process_remaining_inputs(&mut self, node: NodeId, index: usize) -> LoweringResult<()> {
        let (first_effect, count) = {
            let n = self.graph.node(node);
            (n.shape().first_effect(), n.input_count())
        };
        for i in index..first_effect.min(count) {
            self.process_input(node, i, UseInfo::any_tagged())?;
        }
        if self.propagate() {
            for i in index.max(first_effect)..count {
                self.enqueue_input(node, i, UseInfo::none())?;
            }
        }
        Ok(())
    }

    /// Every value, context and frame-state input is tagged.
    pub(super) fn visit_inputs(&mut self, node: NodeId) -> LoweringResult<()> {
        self.process_remaining_inputs(node, 0)
    }

    /// Record the output of `node` for the current phase.
    ///
    /// PROPAGATE stores `restriction` as the upper bound of the feedback
    /// type, RETYPE settles `rep`, LOWER checks that `rep` did not change.
    pub(super) fn set_output(
        &mut self,
        node: NodeId,
        rep: MachineRepresentation,
        restriction: Type,
    ) -> LoweringResult<()> {
        let info = self.infos.get_mut(node);
        match self.phase {
            Phase::Propagate => info.set_restriction_type(restriction),
            Phase::Retype => info.set_output(rep),
            Phase::Lower => {
                if info.representation() != rep {
                    return Err(LoweringError::invariant(
                        node,
                        format!(
                            "representation changed from {} to {rep} after RETYPE",
                            info.representation()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// [`Self::set_output`] without a restriction.
    #[inline]
    pub(super) fn set_output_rep(&mut self, node: NodeId, rep: MachineRepresentation) -> LoweringResult<()> {
        self.set_output(node, rep, Type::ANY)
    }
}

impl fmt::Debug for RepresentationSelector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepresentationSelector")
            .field("phase", &self.phase)
            .field("nodes", &self.traversal.len())
            .field("replacements", &self.replacements.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{MachineOp, NumberOp, Operator};

    fn add_graph() -> (Graph, NodeId, NodeId) {
        let mut graph = Graph::new();
        let a = graph.parameter(0, Type::SIGNED31);
        let b = graph.parameter(1, Type::SIGNED31);
        let sum = graph.add_typed_node(
            Operator::Number(NumberOp::Add),
            &[a, b],
            Type::range(-2147483648.0, 2147483646.0),
        );
        let start = graph.start;
        let ret = graph.add_node(Operator::Return, &[sum, start, start]);
        graph.add_end_input(ret);
        (graph, sum, ret)
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::Propagate.name(), "PROPAGATE");
        assert_eq!(Phase::Retype.to_string(), "RETYPE");
        assert_eq!(Phase::Lower.name(), "LOWER");
    }

    #[test]
    fn test_traversal_is_post_order() {
        let (mut graph, sum, ret) = add_graph();
        let end = graph.end;
        let mut selector = RepresentationSelector::new(&mut graph, LoweringConfig::default());
        selector.generate_traversal();
        let order = selector.traversal().to_vec();
        let pos = |id: NodeId| order.iter().position(|&n| n == id);
        assert_eq!(order.last(), Some(&end));
        assert!(pos(sum) < pos(ret));
        assert!(pos(ret) < pos(end));
    }

    #[test]
    fn test_unreachable_nodes_are_not_traversed() {
        let (mut graph, _, _) = add_graph();
        let orphan = graph.parameter(7, Type::NUMBER);
        let mut selector = RepresentationSelector::new(&mut graph, LoweringConfig::default());
        selector.generate_traversal();
        assert!(!selector.traversal().contains(&orphan));
    }

    #[test]
    fn test_run_collects_stats() {
        let (mut graph, sum, _) = add_graph();
        let stats = RepresentationSelector::new(&mut graph, LoweringConfig::default())
            .run()
            .unwrap();
        assert_eq!(stats.nodes, 6);
        assert!(stats.propagate_visits >= stats.nodes);
        assert!(stats.retype_visits >= stats.nodes);
        assert_eq!(stats.lowered, stats.nodes);
        assert_eq!(stats.ticks as usize, stats.propagate_visits + stats.retype_visits + stats.lowered);
        assert_eq!(graph.op(sum), Operator::Machine(MachineOp::Int32Add));
    }

    #[test]
    fn test_cancellation_aborts() {
        let (mut graph, _, _) = add_graph();
        let flag = Arc::new(AtomicBool::new(true));
        let result = RepresentationSelector::new(&mut graph, LoweringConfig::default())
            .with_cancellation(flag)
            .run();
        assert!(matches!(result, Err(ref e) if e.is_abort()));
    }
}
