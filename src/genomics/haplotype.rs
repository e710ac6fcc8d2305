use std::collections::btree_map::{self, BTreeMap};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::genomics::locus::Strand;
use crate::genomics::packed_dna::PackedSequence;

/// Identity of one observed haplotype: locus, then length, then packed bases.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HaplotypeKey {
    /// Locus index in the table the index was built from.
    pub locus_id: u32,
    /// Haplotype length in bases.
    pub len: u32,
    /// Packed bases; trailing bits past `len` are zero.
    pub words: Box<[u64]>,
}

impl HaplotypeKey {
    /// Unpack the haplotype bases.
    pub fn sequence(&self) -> PackedSequence {
        PackedSequence::from_parts(self.words.clone(), self.len as usize)
    }
}

/// Per-strand observation counts for one haplotype.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StrandCounts {
    /// Calls resolved to the negative strand.
    pub negative: u32,
    /// Calls resolved to the positive strand.
    pub positive: u32,
}

impl StrandCounts {
    /// Calls on either strand.
    pub fn total(&self) -> u32 {
        self.negative + self.positive
    }
}

/// Diagnostic counters for a single locus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocusStats {
    /// Reads where one anchor met its count but the opposite one fell short.
    pub missing_anchor: u32,
    /// Haplotypes tallied.
    pub calls: u32,
    /// Sum of haplotype start offsets over all calls.
    pub left_pos_sum: u64,
    /// Sum of haplotype end offsets over all calls.
    pub right_pos_sum: u64,
    /// Calls dropped because the span held a base outside A/C/G/T.
    pub unencodable: u32,
}

impl LocusStats {
    fn merge(&mut self, other: &Self) {
        self.missing_anchor += other.missing_anchor;
        self.calls += other.calls;
        self.left_pos_sum += other.left_pos_sum;
        self.right_pos_sum += other.right_pos_sum;
        self.unencodable += other.unencodable;
    }
}

/// Haplotype counts and diagnostics accumulated by one worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    counts: BTreeMap<HaplotypeKey, StrandCounts>,
    stats: Vec<LocusStats>,
}

impl Tally {
    /// Empty tally sized for `num_loci` loci.
    pub fn new(num_loci: usize) -> Self {
        Self {
            counts: BTreeMap::new(),
            stats: vec![LocusStats::default(); num_loci],
        }
    }

    /// Record the haplotype `read[left..right)` for `locus_id`.
    ///
    /// Negative-strand haplotypes are stored as their reverse complement when
    /// `canonicalize` is set, so both strands report the same sequence.
    pub fn record(
        &mut self,
        read: &[u8],
        left: usize,
        right: usize,
        strand: Strand,
        locus_id: u32,
        canonicalize: bool,
    ) {
        let stats = self.stats_mut(locus_id);
        let packed = match PackedSequence::pack(&read[left..right]) {
            Ok(packed) => packed,
            Err(err) => {
                trace!(locus_id, left, right, %err, "skipping unencodable haplotype");
                stats.unencodable += 1;
                return;
            }
        };
        stats.calls += 1;
        stats.left_pos_sum += left as u64;
        stats.right_pos_sum += right as u64;

        let packed = if strand == Strand::Negative && canonicalize {
            packed.reverse_complement()
        } else {
            packed
        };
        let (words, len) = packed.into_parts();
        let key = HaplotypeKey {
            locus_id,
            len: len as u32,
            words,
        };
        let slot = self.counts.entry(key).or_default();
        match strand {
            Strand::Negative => slot.negative += 1,
            Strand::Positive => slot.positive += 1,
        }
    }

    /// Count a read whose anchors were only partially found.
    pub fn record_missing_anchor(&mut self, locus_id: u32) {
        self.stats_mut(locus_id).missing_anchor += 1;
    }

    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: &Tally) {
        for (key, counts) in &other.counts {
            let slot = self.counts.entry(key.clone()).or_default();
            slot.negative += counts.negative;
            slot.positive += counts.positive;
        }
        if self.stats.len() < other.stats.len() {
            self.stats.resize(other.stats.len(), LocusStats::default());
        }
        for (mine, theirs) in self.stats.iter_mut().zip(&other.stats) {
            mine.merge(theirs);
        }
    }

    /// Counts in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, HaplotypeKey, StrandCounts> {
        self.counts.iter()
    }

    /// Counts for one haplotype.
    pub fn get(&self, locus_id: u32, sequence: &[u8]) -> Option<StrandCounts> {
        let packed = PackedSequence::pack(sequence).ok()?;
        let (words, len) = packed.into_parts();
        self.counts
            .get(&HaplotypeKey {
                locus_id,
                len: len as u32,
                words,
            })
            .copied()
    }

    /// Number of distinct haplotypes.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// `true` when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Per-locus diagnostics.
    pub fn stats(&self) -> &[LocusStats] {
        &self.stats
    }

    /// Digest of the ordered counts and diagnostics.
    pub fn fingerprint(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for (key, counts) in &self.counts {
            hasher.update(&key.locus_id.to_le_bytes());
            hasher.update(&key.len.to_le_bytes());
            for word in key.words.iter() {
                hasher.update(&word.to_le_bytes());
            }
            hasher.update(&counts.negative.to_le_bytes());
            hasher.update(&counts.positive.to_le_bytes());
        }
        for stats in &self.stats {
            hasher.update(&stats.missing_anchor.to_le_bytes());
            hasher.update(&stats.calls.to_le_bytes());
            hasher.update(&stats.left_pos_sum.to_le_bytes());
            hasher.update(&stats.right_pos_sum.to_le_bytes());
            hasher.update(&stats.unencodable.to_le_bytes());
        }
        hasher.finalize()
    }

    fn stats_mut(&mut self, locus_id: u32) -> &mut LocusStats {
        let idx = locus_id as usize;
        if idx >= self.stats.len() {
            self.stats.resize(idx + 1, LocusStats::default());
        }
        &mut self.stats[idx]
    }
}
