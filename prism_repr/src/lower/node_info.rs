//! Per-node analysis records.
//!
//! The selector keeps one [`NodeInfo`] per node in a side table indexed by
//! node id. Nothing here is stored on the nodes themselves, so resetting a
//! phase only touches the side table.

use crate::error::{LoweringError, LoweringResult};
use crate::ir::{NodeId, Type};
use crate::repr::{MachineRepresentation, Truncation, UseInfo};

// =============================================================================
// Traversal State
// =============================================================================

/// Traversal marker of a node within one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    /// Not reached yet.
    #[default]
    Unvisited,
    /// On the traversal stack, inputs not finished.
    Pushed,
    /// Processed at least once.
    Visited,
    /// Waiting in the revisit queue.
    Queued,
}

// =============================================================================
// Node Info
// =============================================================================

/// Analysis record of one node.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    state: NodeState,
    /// Accumulated demand of all uses.
    truncation: Truncation,
    /// Settled output representation.
    representation: MachineRepresentation,
    /// Refined type, `None` until first computed in RETYPE.
    feedback_type: Option<Type>,
    /// Upper bound applied to speculative results.
    restriction_type: Type,
    /// Set once a phi type has been widened.
    weakened: bool,
    /// Precise growths taken before weakening.
    refinements: u32,
}

impl Default for NodeInfo {
    fn default() -> Self {
        Self {
            state: NodeState::Unvisited,
            truncation: Truncation::none(),
            representation: MachineRepresentation::None,
            feedback_type: None,
            restriction_type: Type::ANY,
            weakened: false,
            refinements: 0,
        }
    }
}

impl NodeInfo {
    /// Forget the traversal marker. Everything else survives the phase change.
    #[inline]
    pub fn reset_state(&mut self) {
        self.state = NodeState::Unvisited;
    }

    #[inline]
    pub fn state(&self) -> NodeState {
        self.state
    }

    #[inline]
    pub fn unvisited(&self) -> bool {
        self.state == NodeState::Unvisited
    }

    #[inline]
    pub fn pushed(&self) -> bool {
        self.state == NodeState::Pushed
    }

    #[inline]
    pub fn visited(&self) -> bool {
        self.state == NodeState::Visited
    }

    #[inline]
    pub fn queued(&self) -> bool {
        self.state == NodeState::Queued
    }

    #[inline]
    pub fn set_pushed(&mut self) {
        debug_assert!(self.unvisited());
        self.state = NodeState::Pushed;
    }

    #[inline]
    pub fn set_visited(&mut self) {
        self.state = NodeState::Visited;
    }

    #[inline]
    pub fn set_queued(&mut self) {
        self.state = NodeState::Queued;
    }

    /// Merge the truncation of a use. Returns whether it grew.
    pub fn add_use(&mut self, info: UseInfo) -> bool {
        let old = self.truncation;
        self.truncation = Truncation::generalize(old, info.truncation());
        self.truncation != old
    }

    #[inline]
    pub fn truncation(&self) -> Truncation {
        self.truncation
    }

    #[inline]
    pub fn representation(&self) -> MachineRepresentation {
        self.representation
    }

    #[inline]
    pub fn set_output(&mut self, representation: MachineRepresentation) {
        self.representation = representation;
    }

    #[inline]
    pub fn feedback_type(&self) -> Option<Type> {
        self.feedback_type
    }

    #[inline]
    pub fn set_feedback_type(&mut self, ty: Type) {
        self.feedback_type = Some(ty);
    }

    #[inline]
    pub fn restriction_type(&self) -> Type {
        self.restriction_type
    }

    #[inline]
    pub fn set_restriction_type(&mut self, ty: Type) {
        self.restriction_type = ty;
    }

    #[inline]
    pub fn weakened(&self) -> bool {
        self.weakened
    }

    #[inline]
    pub fn set_weakened(&mut self) {
        self.weakened = true;
    }

    #[inline]
    pub fn refinements(&self) -> u32 {
        self.refinements
    }

    #[inline]
    pub fn add_refinement(&mut self) {
        self.refinements += 1;
    }
}

// =============================================================================
// Input Use Ledger
// =============================================================================

/// Last use registered on each input of one node.
///
/// Within PROPAGATE a node may be revisited many times; every revisit must
/// demand at least as much of each input as the one before.
#[derive(Debug, Clone, Default)]
pub struct InputUseLedger {
    uses: Vec<Option<UseInfo>>,
}

impl InputUseLedger {
    /// Record `info` for input `index` of `node`, checking monotonicity.
    pub fn set_and_check(&mut self, node: NodeId, index: usize, info: UseInfo) -> LoweringResult<()> {
        if self.uses.len() <= index {
            self.uses.resize(index + 1, None);
        }
        if let Some(previous) = self.uses[index] {
            if !previous.truncation().is_less_general_than(info.truncation()) {
                return Err(LoweringError::invariant(
                    node,
                    format!(
                        "use of input {index} shrank from {} to {}",
                        previous.truncation(),
                        info.truncation()
                    ),
                ));
            }
        }
        self.uses[index] = Some(info);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
