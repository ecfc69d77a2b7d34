//! Lowering pass configuration.

use crate::repr::MachineRepresentation;

// =============================================================================
// Lowering Configuration
// =============================================================================

/// Configuration for one run of representation selection.
#[derive(Debug, Clone)]
pub struct LoweringConfig {
    /// Route per-node decisions to `tracing` when no observer is injected.
    pub trace: bool,

    /// Precise range growths allowed on a phi before it is weakened.
    pub phi_refinement_rounds: u32,

    /// Keep the per-use ledger that checks truncation monotonicity.
    pub verify_truncation_monotonicity: bool,

    /// Representation of a raw machine word (pointer-sized).
    pub pointer_representation: MachineRepresentation,

    /// Expand integer division and modulus into guarded diamonds.
    pub lower_integer_division: bool,

    /// Remove bounds checks whose index range lies inside the length range
    /// instead of keeping them as aborting checks.
    pub elide_proven_bounds_checks: bool,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        Self {
            trace: false,
            phi_refinement_rounds: 0,
            verify_truncation_monotonicity: cfg!(debug_assertions),
            pointer_representation: MachineRepresentation::Word64,
            lower_integer_division: true,
            elide_proven_bounds_checks: false,
        }
    }
}

impl LoweringConfig {
    /// Configuration for 32-bit targets.
    pub fn target_32bit() -> Self {
        Self {
            pointer_representation: MachineRepresentation::Word32,
            ..Default::default()
        }
    }

    /// Configuration with every diagnostic enabled.
    pub fn diagnostic() -> Self {
        Self {
            trace: true,
            verify_truncation_monotonicity: true,
            ..Default::default()
        }
    }

    /// Set the number of precise phi refinements.
    pub fn with_phi_refinement_rounds(mut self, rounds: u32) -> Self {
        self.phi_refinement_rounds = rounds;
        self
    }

    /// Enable or disable tracing.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Enable or disable division lowering.
    pub fn with_integer_division_lowering(mut self, enabled: bool) -> Self {
        self.lower_integer_division = enabled;
        self
    }

    /// Enable or disable removal of provably in-range bounds checks.
    pub fn with_bounds_check_elision(mut self, enabled: bool) -> Self {
        self.elide_proven_bounds_checks = enabled;
        self
    }

    /// Check whether the target uses 64-bit machine words.
    #[inline]
    pub fn is_64bit(&self) -> bool {
        self.pointer_representation == MachineRepresentation::Word64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoweringConfig::default();
        assert!(!config.trace);
        assert_eq!(config.phi_refinement_rounds, 0);
        assert!(config.is_64bit());
        assert!(config.lower_integer_division);
        assert!(!config.elide_proven_bounds_checks);
    }

    #[test]
    fn test_target_32bit() {
        let config = LoweringConfig::target_32bit();
        assert!(!config.is_64bit());
        assert_eq!(config.pointer_representation, MachineRepresentation::Word32);
    }

    #[test]
    fn test_builders() {
        let config = LoweringConfig::default()
            .with_phi_refinement_rounds(3)
            .with_trace(true)
            .with_integer_division_lowering(false)
            .with_bounds_check_elision(true);
        assert_eq!(config.phi_refinement_rounds, 3);
        assert!(config.trace);
        assert!(!config.lower_integer_division);
        assert!(config.elide_proven_bounds_checks);
    }
}
