//! Error types for representation selection.
//!
//! Every error here is fatal for the compilation unit being lowered: the
//! surrounding pipeline discards the graph and falls back to a lower tier.
//! Speculative deoptimization is not an error; it is modelled in the IR.

use crate::ir::NodeId;
use crate::repr::MachineRepresentation;
use thiserror::Error;

/// Result type used throughout the lowering pass.
pub type LoweringResult<T> = Result<T, LoweringError>;

/// Unrecoverable lowering failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoweringError {
    /// A node whose opcode has no visitation rule.
    #[error("Representation inference: unsupported opcode {op} at node {node}")]
    UnsupportedOpcode {
        /// Offending node.
        node: NodeId,
        /// Operator mnemonic.
        op: String,
    },

    /// No conversion exists between the producer and consumer representation.
    #[error("RepresentationChangerError: node {node}:{op} of {from} ({ty}) cannot be changed to {to}")]
    ImpossibleConversion {
        /// Producer node.
        node: NodeId,
        /// Producer operator mnemonic.
        op: String,
        /// Settled output representation of the producer.
        from: MachineRepresentation,
        /// Static or feedback type of the producer.
        ty: String,
        /// Representation requested by the consumer.
        to: MachineRepresentation,
    },

    /// An internal consistency check failed.
    #[error("Invariant violated at node {node}: {message}")]
    InvariantViolation {
        /// Node at which the check failed.
        node: NodeId,
        /// Description of the violated invariant.
        message: String,
    },

    /// The surrounding job asked the pass to stop.
    #[error("Lowering aborted after {ticks} ticks")]
    Aborted {
        /// Node visits performed before the abort was observed.
        ticks: u64,
    },
}

impl LoweringError {
    /// Shorthand for an invariant violation.
    pub fn invariant(node: NodeId, message: impl Into<String>) -> Self {
        LoweringError::InvariantViolation {
            node,
            message: message.into(),
        }
    }

    /// Check whether the error came from cooperative cancellation.
    #[inline]
    pub fn is_abort(&self) -> bool {
        matches!(self, LoweringError::Aborted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_opcode_message() {
        let err = LoweringError::UnsupportedOpcode {
            node: NodeId::new(7),
            op: "Merge".into(),
        };
        assert_eq!(
            err.to_string(),
            "Representation inference: unsupported opcode Merge at node #7"
        );
    }

    #[test]
    fn test_impossible_conversion_message() {
        let err = LoweringError::ImpossibleConversion {
            node: NodeId::new(3),
            op: "Parameter".into(),
            from: MachineRepresentation::Bit,
            ty: "Boolean".into(),
            to: MachineRepresentation::Word64,
        };
        assert_eq!(
            err.to_string(),
            "RepresentationChangerError: node #3:Parameter of kRepBit (Boolean) cannot be changed to kRepWord64"
        );
    }

    #[test]
    fn test_is_abort() {
        assert!(LoweringError::Aborted { ticks: 4 }.is_abort());
        assert!(!LoweringError::invariant(NodeId::new(1), "x").is_abort());
    }
}
