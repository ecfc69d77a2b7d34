//! Graph substrate consumed by representation selection.
//!
//! # Core Components
//!
//! - **Arena** (`arena.rs`): dense ids and side tables
//! - **Types** (`types.rs`): static type lattice
//! - **Operators** (`operators.rs`): common, simplified and machine operators
//! - **Node** (`node.rs`): operator, inputs and static type
//! - **Graph** (`graph.rs`): node storage, use lists and rewriting
//! - **Linkage** (`linkage.rs`): call descriptors and fast API signatures
//! - **Typer** (`typer.rs`): type transfer functions for number operations

pub mod arena;
pub mod graph;
pub mod linkage;
pub mod node;
pub mod operators;
pub mod typer;
pub mod types;

pub use arena::{Arena, Id, SecondaryMap};
pub use graph::{EdgeKind, Graph};
pub use linkage::{
    CType, CTypeFlags, CTypeInfo, CallDescriptor, CallDescriptorId, FastApiCallId,
    FastApiCallInfo,
};
pub use node::{InputList, Node, NodeId};
pub use operators::{
    BaseTaggedness, CheckBoundsFlags, CheckOp, CheckTaggedInputMode, CheckedOp, ConversionOp,
    DeoptimizeReason, ElementAccess, ExternalArrayType, FieldAccess, InputShape, MachineOp,
    NumberOp, NumberOperationHint, Operator, SpeculativeOp, TypeListId, WriteBarrierKind,
    MAP_OFFSET,
};
pub use typer::OperationTyper;
pub use types::{HeapConstant, HeapObjectClass, RangeType, RootIndex, Type, TypeBits};
