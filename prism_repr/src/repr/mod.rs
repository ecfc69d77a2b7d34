//! Representation vocabulary of the lowering pass.
//!
//! - [`MachineRepresentation`], [`MachineType`]: what a value looks like
//! - [`Truncation`]: how much of a value its uses observe
//! - [`UseInfo`]: what a single use demands of its input

mod representation;
mod truncation;
mod use_info;

pub use representation::{MachineRepresentation, MachineSemantic, MachineType};
pub use truncation::{IdentifyZeros, Truncation};
pub use use_info::{CheckForMinusZeroMode, TypeCheckKind, UseInfo};
