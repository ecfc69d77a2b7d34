//! Mutable IR graph.
//!
//! The graph provides:
//! - **Arena-based storage**: nodes addressed by dense [`NodeId`]
//! - **Use lists**: one entry per input edge, for fast use iteration
//! - **Edge categories**: value, context, frame state, effect, control
//! - **Linkage tables**: call descriptors, fast API signatures and
//!   machine-type lists referenced by operators
//!
//! Removing a node is done by disconnecting it: a node with no inputs and no
//! uses is simply never reached from `end` again.

use super::arena::{Arena, SecondaryMap};
use super::linkage::{CallDescriptor, CallDescriptorId, FastApiCallId, FastApiCallInfo};
use super::node::{InputList, Node, NodeId};
use super::operators::{Operator, TypeListId};
use super::types::Type;
use crate::repr::MachineType;

// =============================================================================
// Edge Kind
// =============================================================================

/// Category of an input edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Value,
    Context,
    FrameState,
    Effect,
    Control,
}

// =============================================================================
// Graph Structure
// =============================================================================

/// A mutable graph of typed nodes.
#[derive(Clone)]
pub struct Graph {
    /// Arena for node storage.
    nodes: Arena<Node>,

    /// Use lists, one entry per input edge.
    uses: SecondaryMap<Node, Vec<NodeId>>,

    /// The start node (control and effect entry).
    pub start: NodeId,

    /// The end node (control exit).
    pub end: NodeId,

    /// Shared `Dead` sentinel, created on demand.
    dead: Option<NodeId>,

    call_descriptors: Vec<CallDescriptor>,
    fast_api_calls: Vec<FastApiCallInfo>,
    type_lists: Vec<Vec<MachineType>>,
}

impl Graph {
    /// Create a new graph with start and end nodes.
    pub fn new() -> Self {
        let mut nodes = Arena::with_capacity(256);
        let start = nodes.alloc(Node::new(Operator::Start, InputList::empty(), Type::ANY));
        let end = nodes.alloc(Node::new(Operator::End, InputList::empty(), Type::ANY));
        Graph {
            nodes,
            uses: SecondaryMap::new(),
            start,
            end,
            dead: None,
            call_descriptors: Vec::new(),
            fast_api_calls: Vec::new(),
            type_lists: Vec::new(),
        }
    }

    // =========================================================================
    // Node Access
    // =========================================================================

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[inline]
    pub fn op(&self, id: NodeId) -> Operator {
        self.nodes[id].op
    }

    /// Static type of a node.
    #[inline]
    pub fn ty(&self, id: NodeId) -> Type {
        self.nodes[id].ty
    }

    #[inline]
    pub fn set_type(&mut self, id: NodeId, ty: Type) {
        self.nodes[id].ty = ty;
    }

    /// Number of nodes ever allocated.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check whether only start and end exist.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 2
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        self.nodes.ids()
    }

    // =========================================================================
    // Node Creation
    // =========================================================================

    /// Add a node with the operator's default type.
    pub fn add_node(&mut self, op: Operator, inputs: &[NodeId]) -> NodeId {
        let ty = Self::default_type(&op);
        self.add_typed_node(op, inputs, ty)
    }

    /// Add a node with an explicit static type.
    pub fn add_typed_node(&mut self, op: Operator, inputs: &[NodeId], ty: Type) -> NodeId {
        let id = self.nodes.alloc(Node::new(op, InputList::from_slice(inputs), ty));
        for &input in inputs {
            self.add_use(input, id);
        }
        id
    }

    fn default_type(op: &Operator) -> Type {
        match op {
            Operator::NumberConstant(bits) => Type::constant(f64::from_bits(*bits)),
            Operator::Int32Constant(v) => Type::constant(f64::from(*v)),
            Operator::HeapConstant(c) => Type::heap_constant(*c),
            Operator::Dead | Operator::DeadValue(_) | Operator::Unreachable => Type::NONE,
            _ => Type::ANY,
        }
    }

    /// The shared `Dead` sentinel.
    pub fn dead(&mut self) -> NodeId {
        match self.dead {
            Some(dead) => dead,
            None => {
                let dead = self.add_node(Operator::Dead, &[]);
                self.dead = Some(dead);
                dead
            }
        }
    }

    #[inline]
    pub fn is_dead(&self, id: NodeId) -> bool {
        matches!(self.nodes[id].op, Operator::Dead)
    }

    // =========================================================================
    // Constants
    // =========================================================================

    pub fn int32_constant(&mut self, value: i32) -> NodeId {
        self.add_node(Operator::Int32Constant(value), &[])
    }

    pub fn int64_constant(&mut self, value: i64) -> NodeId {
        self.add_node(Operator::Int64Constant(value), &[])
    }

    pub fn float64_constant(&mut self, value: f64) -> NodeId {
        self.add_node(Operator::float64_constant(value), &[])
    }

    pub fn float32_constant(&mut self, value: f32) -> NodeId {
        self.add_node(Operator::float32_constant(value), &[])
    }

    pub fn number_constant(&mut self, value: f64) -> NodeId {
        self.add_node(Operator::number_constant(value), &[])
    }

    pub fn heap_constant(&mut self, constant: super::types::HeapConstant) -> NodeId {
        self.add_node(Operator::HeapConstant(constant), &[])
    }

    pub fn parameter(&mut self, index: u16, ty: Type) -> NodeId {
        self.add_typed_node(Operator::Parameter(index), &[], ty)
    }

    // =========================================================================
    // Linkage Tables
    // =========================================================================

    pub fn add_call_descriptor(&mut self, descriptor: CallDescriptor) -> CallDescriptorId {
        self.call_descriptors.push(descriptor);
        CallDescriptorId(self.call_descriptors.len() as u32 - 1)
    }

    pub fn call_descriptor(&self, id: CallDescriptorId) -> Option<&CallDescriptor> {
        self.call_descriptors.get(id.0 as usize)
    }

    pub fn add_fast_api_call(&mut self, info: FastApiCallInfo) -> FastApiCallId {
        self.fast_api_calls.push(info);
        FastApiCallId(self.fast_api_calls.len() as u32 - 1)
    }

    pub fn fast_api_call(&self, id: FastApiCallId) -> Option<&FastApiCallInfo> {
        self.fast_api_calls.get(id.0 as usize)
    }

    pub fn add_type_list(&mut self, types: Vec<MachineType>) -> TypeListId {
        self.type_lists.push(types);
        TypeListId(self.type_lists.len() as u32 - 1)
    }

    pub fn type_list(&self, id: TypeListId) -> &[MachineType] {
        self.type_lists
            .get(id.0 as usize)
            .map_or(&[], |types| types.as_slice())
    }

    // =========================================================================
    // Use Lists
    // =========================================================================

    /// Users of a node, one entry per edge.
    #[inline]
    pub fn uses(&self, id: NodeId) -> &[NodeId] {
        self.uses.get(id).as_slice()
    }

    #[inline]
    pub fn use_count(&self, id: NodeId) -> usize {
        self.uses.get(id).len()
    }

    /// Every `(user, input index)` edge pointing at `id`.
    pub fn use_edges(&self, id: NodeId) -> Vec<(NodeId, usize)> {
        let mut users = self.uses(id).to_vec();
        users.sort_unstable();
        users.dedup();
        let mut edges = Vec::with_capacity(users.len());
        for user in users {
            for (index, input) in self.nodes[user].inputs.iter().enumerate() {
                if input == id {
                    edges.push((user, index));
                }
            }
        }
        edges
    }

    /// Category of input `index` of `node`.
    pub fn edge_kind(&self, node: NodeId, index: usize) -> EdgeKind {
        let shape = self.nodes[node].shape();
        if index < shape.first_context() {
            EdgeKind::Value
        } else if index < shape.first_frame_state() {
            EdgeKind::Context
        } else if index < shape.first_effect() {
            EdgeKind::FrameState
        } else if index < shape.first_control() {
            EdgeKind::Effect
        } else {
            EdgeKind::Control
        }
    }

    fn add_use(&mut self, def: NodeId, user: NodeId) {
        self.uses.get_mut(def).push(user);
    }

    fn remove_use(&mut self, def: NodeId, user: NodeId) {
        let uses = self.uses.get_mut(def);
        if let Some(pos) = uses.iter().position(|&u| u == user) {
            uses.swap_remove(pos);
        }
    }

    // =========================================================================
    // Node Modification
    // =========================================================================

    /// Replace input `index` of `node`.
    pub fn replace_input(&mut self, node: NodeId, index: usize, new_input: NodeId) {
        let Some(old) = self.nodes[node].inputs.get(index) else {
            return;
        };
        if old == new_input {
            return;
        }
        self.remove_use(old, node);
        self.nodes[node].inputs.set(index, new_input);
        self.add_use(new_input, node);
    }

    pub fn append_input(&mut self, node: NodeId, input: NodeId) {
        self.nodes[node].inputs.push(input);
        self.add_use(input, node);
    }

    pub fn insert_input(&mut self, node: NodeId, index: usize, input: NodeId) {
        self.nodes[node].inputs.insert(index, input);
        self.add_use(input, node);
    }

    /// Drop inputs at or past `len`.
    pub fn trim_inputs(&mut self, node: NodeId, len: usize) {
        let removed: Vec<NodeId> = self.nodes[node].inputs.iter().skip(len).collect();
        for input in removed {
            self.remove_use(input, node);
        }
        self.nodes[node].inputs.truncate(len);
    }

    /// Disconnect every input of `node`.
    pub fn clear_inputs(&mut self, node: NodeId) {
        self.trim_inputs(node, 0);
    }

    /// Replace the operator of `node`, keeping its inputs.
    #[inline]
    pub fn set_op(&mut self, node: NodeId, op: Operator) {
        self.nodes[node].op = op;
    }

    /// Redirect every use of `old` to `new`.
    pub fn replace_uses(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        for (user, index) in self.use_edges(old) {
            self.nodes[user].inputs.set(index, new);
            self.add_use(new, user);
        }
        self.uses.get_mut(old).clear();
    }

    /// Redirect uses of `old` by edge category.
    ///
    /// Value, context and frame-state uses go to `value`, effect uses to
    /// `effect` and control uses to `control`. A `None` target leaves that
    /// category untouched.
    pub fn replace_uses_by_kind(
        &mut self,
        old: NodeId,
        value: Option<NodeId>,
        effect: Option<NodeId>,
        control: Option<NodeId>,
    ) {
        for (user, index) in self.use_edges(old) {
            let target = match self.edge_kind(user, index) {
                EdgeKind::Effect => effect,
                EdgeKind::Control => control,
                EdgeKind::Value | EdgeKind::Context | EdgeKind::FrameState => value,
            };
            if let Some(target) = target {
                self.replace_input(user, index, target);
            }
        }
    }

    /// Connect a control exit to `end`.
    pub fn add_end_input(&mut self, exit: NodeId) {
        let end = self.end;
        self.append_input(end, exit);
    }

    // =========================================================================
    // Utilities
    // =========================================================================

    /// Verify that use lists mirror input lists.
    pub fn verify(&self) -> Result<(), String> {
        for (id, node) in self.iter() {
            for input in node.inputs.iter() {
                if input.as_usize() >= self.nodes.len() {
                    return Err(format!("Node {id} has invalid input {input}"));
                }
                let edges = node.inputs.iter().filter(|&i| i == input).count();
                let uses = self.uses(input).iter().filter(|&&u| u == id).count();
                if edges != uses {
                    return Err(format!(
                        "Node {id} uses {input} {edges} times but the use list has {uses}"
                    ));
                }
            }
        }
        if !self.nodes[self.start].inputs.is_empty() {
            return Err("Start node should have no inputs".into());
        }
        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Graph ({} nodes):", self.nodes.len())?;
        for (id, node) in self.iter() {
            writeln!(f, "  {id}: {} {:?} : {}", node.op, node.inputs, node.ty)?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
