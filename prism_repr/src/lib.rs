//! Representation selection and machine lowering for the Prism optimizing JIT.
//!
//! This crate takes a sea-of-nodes graph of type-annotated, platform
//! independent operations and decides the machine representation of every
//! value (tagged, word32, word64, float32, float64, bit). Wherever a
//! producer's representation disagrees with what a consumer needs, an
//! explicit conversion is spliced in, checked conversions included.
//!
//! # Pipeline
//!
//! ```text
//! Graph ──► PROPAGATE (backward, truncations)
//!       ──► RETYPE    (forward, feedback types, representations)
//!       ──► LOWER     (conversions, machine operators, replacements)
//!       ──► machine-level Graph
//! ```
//!
//! # Modules
//!
//! - [`ir`]: graph substrate, operators, types and the operation typer
//! - [`repr`]: representations, truncations and use requirements
//! - [`lower`]: the representation selector and its per-opcode rules
//! - [`config`], [`error`], [`tick`]: configuration, errors, preemption
//!
//! # Example
//!
//! ```
//! use prism_repr::ir::{Graph, NumberOp, Operator, Type};
//! use prism_repr::{LoweringConfig, RepresentationSelector};
//!
//! let mut graph = Graph::new();
//! let a = graph.parameter(0, Type::SIGNED31);
//! let b = graph.parameter(1, Type::SIGNED31);
//! let sum = graph.add_typed_node(Operator::Number(NumberOp::Add), &[a, b], Type::range(-2147483648.0, 2147483646.0));
//! let start = graph.start;
//! let ret = graph.add_node(Operator::Return, &[sum, start, start]);
//! graph.add_end_input(ret);
//!
//! let stats = RepresentationSelector::new(&mut graph, LoweringConfig::default())
//!     .run()
//!     .expect("lowering succeeds");
//! assert!(stats.nodes > 0);
//! ```

pub mod config;
pub mod error;
pub mod ir;
pub mod lower;
pub mod repr;
pub mod tick;

pub use config::LoweringConfig;
pub use error::{LoweringError, LoweringResult};
pub use lower::{
    LoweringObserver, LoweringStats, NullObserver, Phase, RepresentationChanger,
    RepresentationSelector, TracingObserver,
};
pub use repr::{MachineRepresentation, MachineType, Truncation, UseInfo};
