//! Repeat-marker genotyping from raw reads.
//!
//! Loci are described by two anchors bracketing a tandem repeat. Every anchor
//! and motif is expanded into its Hamming-distance variants and stored in a
//! single [`TrieIndex`]; the [`Classifier`] walks each read once against that
//! index and records the bases between matching anchors into a [`Tally`].

pub mod packed_dna;
mod locus;
mod locus_table;
mod trie;
mod classifier;
mod haplotype;
mod report;

pub use packed_dna::{CodecError, PackedSequence, BASES_PER_WORD};
pub use locus::{ambiguity_resolutions, Anchor, AnchorKind, Locus, LocusError, Strand, MAX_ANCHOR_COUNT};
pub use locus_table::parse_locus_table;
pub use trie::{
    variant_node_bound, IndexEntry, IndexError, IndexStats, TrieIndex, MAX_ANCHOR_DISTANCE,
    MAX_MOTIF_DISTANCE,
};
pub use classifier::{Classifier, ScanError, ScanGeometry};
pub use haplotype::{HaplotypeKey, LocusStats, StrandCounts, Tally};
pub use report::{render_report, write_report, ReportOptions, BIAS_HEADER};
