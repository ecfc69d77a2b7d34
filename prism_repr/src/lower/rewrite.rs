//! Graph rewriting used by LOWER.
//!
//! Nodes leave LOWER in one of three ways: rewritten in place (operator
//! change, possibly dropping effect and control inputs), replaced by another
//! node once the phase is over, or killed. Whatever is removed from the
//! middle of an effect chain is spliced out so the chain stays connected.

use super::selector::RepresentationSelector;
use crate::error::{LoweringError, LoweringResult};
use crate::ir::{NodeId, Operator};

impl RepresentationSelector<'_> {
    /// First effect and control input of `node`, if it is on the chains.
    pub(super) fn effect_and_control(&self, node: NodeId) -> Option<(NodeId, NodeId)> {
        let n = self.graph.node(node);
        Some((n.effect_input(0)?, n.control_input(0)?))
    }

    /// Redirect effect uses of `node` to `effect` and control uses to `control`.
    fn replace_effect_control_uses(&mut self, node: NodeId, effect: NodeId, control: NodeId) {
        self.graph
            .replace_uses_by_kind(node, None, Some(effect), Some(control));
    }

    /// Take `node` off the effect and control chains.
    pub(super) fn disconnect_from_effect_and_control(&mut self, node: NodeId) {
        if let Some((effect, control)) = self.effect_and_control(node) {
            self.replace_effect_control_uses(node, effect, control);
        }
    }

    #[inline]
    pub(super) fn change_op(&mut self, node: NodeId, op: Operator) {
        self.graph.set_op(node, op);
    }

    /// Rewrite `node` to the pure operator `op`.
    ///
    /// Effect and control inputs are dropped and their uses bypass `node`.
    /// A node typed `NONE` becomes a dead value behind an `Unreachable`.
    pub(super) fn change_to_pure_op(&mut self, node: NodeId, op: Operator) -> LoweringResult<()> {
        debug_assert!(op.is_pure());
        if self.graph.node(node).effect_input_count() > 0 {
            let Some((effect, control)) = self.effect_and_control(node) else {
                return Err(LoweringError::invariant(node, "effect input without control input"));
            };
            if self.type_of(node).is_none() {
                self.change_to_dead_value(node, effect, control);
                return Ok(());
            }
            let value_inputs = self.graph.node(node).value_input_count();
            self.graph.trim_inputs(node, value_inputs);
            self.replace_effect_control_uses(node, effect, control);
        }
        self.change_op(node, op);
        Ok(())
    }

    /// Turn an impossible value into `DeadValue(Unreachable(effect, control))`.
    pub(super) fn change_to_dead_value(&mut self, node: NodeId, effect: NodeId, control: NodeId) {
        debug_assert!(self.type_of(node).is_none());
        let unreachable = self.graph.add_node(Operator::Unreachable, &[effect, control]);
        self.stats.unreachable_inserted += 1;
        let rep = self.info(node).representation();
        self.graph.replace_input(node, 0, unreachable);
        self.graph.trim_inputs(node, 1);
        self.replace_effect_control_uses(node, unreachable, control);
        self.change_op(node, Operator::DeadValue(rep));
    }

    /// Pure nodes fed by an impossible value are dead themselves.
    /// Returns whether `node` was rewritten.
    pub(super) fn kill_if_input_is_none(&mut self, node: NodeId) -> bool {
        let n = self.graph.node(node);
        let dead_input = (0..n.value_input_count())
            .filter_map(|i| n.value_input(i))
            .find(|&input| self.type_of(input).is_none());
        let Some(input) = dead_input else {
            return false;
        };
        let rep = self.info(node).representation();
        self.graph.replace_input(node, 0, input);
        self.graph.trim_inputs(node, 1);
        self.change_op(node, Operator::DeadValue(rep));
        true
    }

    /// Splice an `Unreachable` after an effectful node that cannot produce
    /// a value, so nothing downstream assumes normal fall-through.
    pub(super) fn insert_unreachable_if_necessary(&mut self, node: NodeId) {
        let op = self.graph.op(node);
        if !op.has_value_output()
            || !op.has_effect_output()
            || op == Operator::Unreachable
            || !self.type_of(node).is_none()
        {
            return;
        }
        let Some(control) = self.graph.node(node).control_input(0) else {
            return;
        };

        let effect_uses: Vec<(NodeId, usize)> = self
            .graph
            .use_edges(node)
            .into_iter()
            .filter(|&(user, index)| {
                self.graph.edge_kind(user, index) == crate::ir::EdgeKind::Effect
            })
            .collect();
        let unreachable = self.graph.add_node(Operator::Unreachable, &[node, control]);
        for (user, index) in effect_uses {
            self.graph.replace_input(user, index, unreachable);
        }
        self.stats.unreachable_inserted += 1;
    }

    /// Disconnect an unused node and redirect its leftover uses to `Dead`.
    pub(super) fn kill(&mut self, node: NodeId) {
        self.disconnect_from_effect_and_control(node);
        let dead = self.graph.dead();
        self.graph.replace_uses(node, dead);
        self.graph.clear_inputs(node);
        self.stats.kills += 1;
        self.observer.on_kill(node);
    }

    /// Replace `node` by `replacement` once LOWER is over.
    ///
    /// `node` leaves the effect and control chains now; value uses keep
    /// reading it (and its settled representation) until the batch runs.
    pub(super) fn defer_replacement(&mut self, node: NodeId, replacement: NodeId) {
        self.disconnect_from_effect_and_control(node);
        self.replacements.push((node, replacement));
        self.graph.clear_inputs(node);
        self.observer.on_replacement(node, replacement);
    }

    /// Apply every deferred replacement in order.
    ///
    /// An entry whose replacement was itself replaced earlier in the batch
    /// is forwarded to the final node.
    pub(super) fn apply_replacements(&mut self) {
        let mut pending = std::mem::take(&mut self.replacements);
        for i in 0..pending.len() {
            let (node, replacement) = pending[i];
            self.graph.replace_uses(node, replacement);
            for entry in &mut pending[i + 1..] {
                if entry.1 == node {
                    entry.1 = replacement;
                }
            }
            self.stats.replacements += 1;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::config::LoweringConfig;
    use crate::ir::{Graph, NumberOp, NumberOperationHint, Operator, SpeculativeOp, Type};
    use crate::lower::RepresentationSelector;

    #[test]
    fn test_replacement_chains_are_forwarded() {
        let mut graph = Graph::new();
        let a = graph.parameter(0, Type::NUMBER);
        let b = graph.add_node(Operator::Number(NumberOp::Abs), &[a]);
        let c = graph.add_node(Operator::Number(NumberOp::Abs), &[a]);
        let user = graph.add_node(Operator::Number(NumberOp::Abs), &[b]);
        let d = graph.parameter(1, Type::NUMBER);

        let mut selector = RepresentationSelector::new(&mut graph, LoweringConfig::default());
        selector.defer_replacement(c, d);
        selector.defer_replacement(b, c);
        selector.apply_replacements();
        assert_eq!(selector.stats.replacements, 2);
        drop(selector);

        assert_eq!(graph.node(user).value_input(0), Some(d));
        assert!(graph.uses(b).is_empty());
        assert!(graph.uses(c).is_empty());
    }

    #[test]
    fn test_change_to_pure_op_bypasses_effects() {
        let mut graph = Graph::new();
        let start = graph.start;
        let a = graph.parameter(0, Type::SIGNED31);
        let add = graph.add_typed_node(
            Operator::Speculative(SpeculativeOp::NumberAdd, NumberOperationHint::SignedSmall),
            &[a, a, start, start],
            Type::SIGNED32,
        );
        let ret = graph.add_node(Operator::Return, &[add, add, start]);

        let mut selector = RepresentationSelector::new(&mut graph, LoweringConfig::default());
        selector
            .change_to_pure_op(add, Operator::Machine(crate::ir::MachineOp::Int32Add))
            .unwrap();
        drop(selector);

        assert_eq!(graph.node(add).input_count(), 2);
        assert_eq!(graph.node(ret).effect_input(0), Some(start));
        assert_eq!(graph.node(ret).value_input(0), Some(add));
    }

    #[test]
    fn test_kill_redirects_to_dead() {
        let mut graph = Graph::new();
        let a = graph.parameter(0, Type::NUMBER);
        let abs = graph.add_node(Operator::Number(NumberOp::Abs), &[a]);
        let user = graph.add_node(Operator::Number(NumberOp::Abs), &[abs]);

        let mut selector = RepresentationSelector::new(&mut graph, LoweringConfig::default());
        selector.kill(abs);
        drop(selector);

        let input = graph.node(user).value_input(0).unwrap();
        assert!(graph.is_dead(input));
        assert_eq!(graph.node(abs).input_count(), 0);
    }
}
