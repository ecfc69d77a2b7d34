//! Cooperative preemption for long-running lowering jobs.
//!
//! The driver ticks once per node visit. A surrounding scheduler may raise
//! the shared cancellation flag; the next tick then fails with
//! [`LoweringError::Aborted`] and the pass is simply not resumed.

use crate::error::{LoweringError, LoweringResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Per-run tick counter.
#[derive(Debug, Default)]
pub struct TickCounter {
    ticks: u64,
    cancel: Option<Arc<AtomicBool>>,
}

impl TickCounter {
    /// Create a counter with no cancellation source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a counter polling the given flag.
    pub fn with_cancellation(flag: Arc<AtomicBool>) -> Self {
        Self {
            ticks: 0,
            cancel: Some(flag),
        }
    }

    /// Record one unit of work and poll for cancellation.
    #[inline]
    pub fn tick(&mut self) -> LoweringResult<()> {
        self.ticks += 1;
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => {
                Err(LoweringError::Aborted { ticks: self.ticks })
            }
            _ => Ok(()),
        }
    }

    /// Number of ticks so far.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
