//! IR nodes.
//!
//! A node carries an [`Operator`], an ordered input list and a static type
//! bound. Inputs are laid out by category as described by the operator's
//! [`InputShape`]:
//!
//! ```text
//! [ value.. | context | frame state | effect.. | control.. ]
//! ```

use smallvec::SmallVec;

use super::arena::Id;
use super::operators::{InputShape, Operator};
use super::types::Type;

// =============================================================================
// Node ID Type Alias
// =============================================================================

/// Unique identifier for a node in the graph.
pub type NodeId = Id<Node>;

// =============================================================================
// Input List
// =============================================================================

/// Maximum number of inline inputs before spilling to heap.
const INLINE_INPUTS: usize = 4;

/// Compact input list optimized for small node arity.
///
/// Most nodes have 0-4 inputs, so they are stored inline. Phis with many
/// predecessors, calls and state values spill to the heap.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct InputList(SmallVec<[NodeId; INLINE_INPUTS]>);

impl InputList {
    /// Create empty input list.
    pub fn empty() -> Self {
        InputList(SmallVec::new())
    }

    /// Create from a slice.
    pub fn from_slice(inputs: &[NodeId]) -> Self {
        InputList(SmallVec::from_slice(inputs))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get input at index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.0.get(index).copied()
    }

    /// Set input at index. Out-of-range indices are ignored.
    #[inline]
    pub fn set(&mut self, index: usize, value: NodeId) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = value;
        }
    }

    pub fn push(&mut self, value: NodeId) {
        self.0.push(value);
    }

    pub fn insert(&mut self, index: usize, value: NodeId) {
        self.0.insert(index, value);
    }

    /// Drop every input at or past `len`.
    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = NodeId> + '_ {
        self.0.iter().copied()
    }

    #[inline]
    pub fn as_slice(&self) -> &[NodeId] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<NodeId> {
        self.0.to_vec()
    }
}

impl From<&[NodeId]> for InputList {
    fn from(inputs: &[NodeId]) -> Self {
        InputList::from_slice(inputs)
    }
}

impl std::fmt::Debug for InputList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

// =============================================================================
// Node
// =============================================================================

/// A node in the IR graph.
#[derive(Clone, Debug)]
pub struct Node {
    /// The operation this node performs.
    pub op: Operator,

    /// Input nodes (dependencies).
    pub inputs: InputList,

    /// Static type bound from type inference.
    pub ty: Type,
}

impl Node {
    pub fn new(op: Operator, inputs: InputList, ty: Type) -> Self {
        Node { op, inputs, ty }
    }

    /// Input layout for the current input count.
    #[inline]
    pub fn shape(&self) -> InputShape {
        self.op.input_shape(self.inputs.len())
    }

    #[inline]
    pub fn input(&self, index: usize) -> Option<NodeId> {
        self.inputs.get(index)
    }

    #[inline]
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn value_input_count(&self) -> usize {
        self.shape().value
    }

    pub fn value_input(&self, index: usize) -> Option<NodeId> {
        (index < self.shape().value)
            .then(|| self.inputs.get(index))
            .flatten()
    }

    pub fn context_input(&self) -> Option<NodeId> {
        let shape = self.shape();
        (shape.context > 0)
            .then(|| self.inputs.get(shape.first_context()))
            .flatten()
    }

    pub fn frame_state_input(&self) -> Option<NodeId> {
        let shape = self.shape();
        (shape.frame_state > 0)
            .then(|| self.inputs.get(shape.first_frame_state()))
            .flatten()
    }

    pub fn effect_input(&self, index: usize) -> Option<NodeId> {
        let shape = self.shape();
        (index < shape.effect)
            .then(|| self.inputs.get(shape.first_effect() + index))
            .flatten()
    }

    pub fn control_input(&self, index: usize) -> Option<NodeId> {
        let shape = self.shape();
        (index < shape.control)
            .then(|| self.inputs.get(shape.first_control() + index))
            .flatten()
    }

    #[inline]
    pub fn effect_input_count(&self) -> usize {
        self.shape().effect
    }

    #[inline]
    pub fn control_input_count(&self) -> usize {
        self.shape().control
    }
}
