//! # strscan: short tandem repeat genotyping from sequencing reads
//!
//! Each locus is described by a pair of anchors flanking a repeat motif. All
//! anchors and motifs, their reverse complements, and every variant within a
//! small Hamming distance are folded into one trie, so a read is classified
//! in a single left-to-right pass. The bases between two anchors that are
//! found in the right order and count become a haplotype call.
//!
//! ## Usage Example
//!
//! ```
//! use strscan::genomics::Locus;
//! use strscan::pipeline::{run_pipeline, VecSource};
//! use strscan::{build_index, ScanConfig};
//!
//! let loci = vec![Locus::new("L1", "AACCG", "TTGGC", "AT", 2, 0)?];
//! let config = ScanConfig::default().with_anchor_distance(0);
//! let index = build_index(&loci, &config)?;
//!
//! let mut reads = VecSource::new(["AACCGATATTTTGGC"]);
//! let output = run_pipeline(&index, &loci, &config, &mut reads)?;
//! assert_eq!(output.merged.get(0, b"ATATT").map(|c| c.positive), Some(1));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod config;     // Scan parameters
pub mod genomics;   // Codec, loci, index, classifier, tallies, report
pub mod pipeline;   // Batched and multi-worker scanning

pub use config::{ConfigError, ScanConfig, DEFAULT_BATCH_SIZE};
pub use genomics::{Classifier, Locus, Tally, TrieIndex};
pub use pipeline::{run_pipeline, PipelineError, ScanOutput};

/// Validate `config` and build the variant index for `loci`.
pub fn build_index(loci: &[Locus], config: &ScanConfig) -> Result<TrieIndex, PipelineError> {
    config.validate()?;
    Ok(TrieIndex::build(loci, config.anchor_distance, config.motif_distance)?)
}
