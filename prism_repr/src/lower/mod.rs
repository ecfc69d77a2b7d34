//! Representation selection.
//!
//! Decides the machine representation of every value in a simplified graph
//! and lowers each operation to its machine-level form.
//!
//! # Algorithm
//!
//! A single post-order traversal from the graph's end node is computed once
//! and shared by three phases:
//! 1. **PROPAGATE** walks the traversal backwards. Each rule declares a
//!    [`UseInfo`](crate::repr::UseInfo) per input; truncations accumulate on
//!    the inputs and a grown truncation requeues the input.
//! 2. **RETYPE** walks forwards. Feedback types are recomputed from the
//!    inputs and each node settles its output representation. Changes
//!    requeue the dependents recorded during traversal and the direct uses.
//! 3. **LOWER** walks forwards once. Conversions are spliced onto inputs,
//!    operators are rewritten and replacements are applied as a batch.
//!
//! # Lattices
//!
//! ```text
//!   Truncation                 NodeState
//!
//!      Any(dz)                 Unvisited ──► Pushed ──► Visited ◄─► Queued
//!        |
//!      Any(iz)
//!        |
//!   OddballAndBigIntToNumber
//!      /    \
//!   Word64  Bool
//!      |
//!   Word32
//!      \    /
//!       None
//! ```

pub mod changer;
pub mod feedback;
pub mod machine_lowering;
pub mod node_info;
pub mod observer;
pub mod rewrite;
pub mod rules;
pub mod selector;

pub use changer::RepresentationChanger;
pub use node_info::{InputUseLedger, NodeInfo, NodeState};
pub use observer::{LoweringObserver, NullObserver, TracingObserver};
pub use selector::{LoweringStats, Phase, RepresentationSelector};
