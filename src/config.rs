//! Tunable scan parameters.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::genomics::{MAX_ANCHOR_DISTANCE, MAX_MOTIF_DISTANCE};

/// Reads held in each half of the double buffer by default.
pub const DEFAULT_BATCH_SIZE: usize = 50_000;

/// Rejected scan parameters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Anchor distance above the supported maximum.
    #[error("anchor distance must be in 0..={MAX_ANCHOR_DISTANCE}, got {0}")]
    AnchorDistance(u8),
    /// Motif distance above the supported maximum.
    #[error("motif distance must be in 0..={MAX_MOTIF_DISTANCE}, got {0}")]
    MotifDistance(u8),
    /// Zero workers requested.
    #[error("at least one worker is required")]
    NoWorkers,
    /// Zero-sized batches requested.
    #[error("batch size must be greater than zero")]
    EmptyBatch,
}

/// Parameters consumed by the index, classifier and pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScanConfig {
    /// Maximum substitutions tolerated in an anchor (0-2).
    pub anchor_distance: u8,

    /// Maximum substitutions tolerated in a motif (0-1).
    pub motif_distance: u8,

    /// Number of classifier workers; 1 runs without threads.
    pub workers: usize,

    /// Stop scanning a read once one strand has both anchor counts.
    pub short_circuit: bool,

    /// Report negative-strand haplotypes as their reverse complement.
    pub reverse_complement: bool,

    /// Reads per buffer.
    pub batch_size: usize,

    /// Scan whole reads and count partial anchor pairs per locus.
    pub diagnostics: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            anchor_distance: 1,
            motif_distance: 0,
            workers: 1,
            short_circuit: false,
            reverse_complement: true,
            batch_size: DEFAULT_BATCH_SIZE,
            diagnostics: false,
        }
    }
}

impl ScanConfig {
    /// Set the anchor Hamming distance.
    pub fn with_anchor_distance(mut self, distance: u8) -> Self {
        self.anchor_distance = distance;
        self
    }

    /// Set the motif Hamming distance.
    pub fn with_motif_distance(mut self, distance: u8) -> Self {
        self.motif_distance = distance;
        self
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the number of reads per buffer.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Toggle short-circuit scanning.
    pub fn with_short_circuit(mut self, enabled: bool) -> Self {
        self.short_circuit = enabled;
        self
    }

    /// Toggle negative-strand canonicalisation.
    pub fn with_reverse_complement(mut self, enabled: bool) -> Self {
        self.reverse_complement = enabled;
        self
    }

    /// Toggle diagnostic counters.
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    /// Check every field is within its supported range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.anchor_distance > MAX_ANCHOR_DISTANCE {
            return Err(ConfigError::AnchorDistance(self.anchor_distance));
        }
        if self.motif_distance > MAX_MOTIF_DISTANCE {
            return Err(ConfigError::MotifDistance(self.motif_distance));
        }
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::EmptyBatch);
        }
        Ok(())
    }
}
