//! Per-read anchor classification.
//!
//! A read is scanned one offset at a time. Every index hit updates the
//! candidate state of its locus; once the read is exhausted, loci with a
//! complete, ordered, motif-confirmed anchor pair are handed to the tally.

use bitvec::prelude::*;
use thiserror::Error;

use crate::config::ScanConfig;
use crate::genomics::haplotype::Tally;
use crate::genomics::locus::{AnchorKind, Locus, Strand};
use crate::genomics::trie::{IndexEntry, IndexError, TrieIndex};

/// Fatal problems found while scanning a read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// The read held a character that is not a sequencing base.
    #[error("illegal character '{base}' at offset {position} of read '{read}'")]
    IllegalBase {
        /// Offending character.
        base: char,
        /// Offset within the read.
        position: usize,
        /// The read, lossily decoded.
        read: String,
    },
}

/// Bases accepted in reads. `N` never matches an index edge.
#[inline]
fn is_read_base(ch: u8) -> bool {
    matches!(ch, b'A' | b'C' | b'G' | b'T' | b'N')
}

/// Length limits derived from the locus table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanGeometry {
    /// Shortest anchor; no hit can start closer than this to the read end.
    pub min_len: usize,
    /// Longest anchor or motif; the trie walk depth.
    pub max_len: usize,
    /// Shortest read that can hold any locus.
    pub min_fragment: usize,
}

impl ScanGeometry {
    /// Compute limits for `loci`, or `None` for an empty table.
    pub fn from_loci(loci: &[Locus]) -> Option<Self> {
        let min_len = loci
            .iter()
            .map(|l| l.forward().len().min(l.reverse().len()))
            .min()?;
        let max_len = loci
            .iter()
            .map(|l| l.forward().len().max(l.reverse().len()).max(l.motif().len()))
            .max()?;
        let min_fragment = loci.iter().map(Locus::min_fragment).min()?;
        Some(Self {
            min_len,
            max_len,
            min_fragment,
        })
    }
}

/// Anchor hit positions for one locus within the current read.
#[derive(Debug, Clone, Default)]
struct CandidateState {
    /// Serial of the read these lists belong to; 0 means never touched.
    read_serial: u64,
    /// Forward anchor, positive strand: first base after the anchor.
    fp: Vec<usize>,
    /// Reverse anchor, positive strand: first base of the anchor.
    rp: Vec<usize>,
    /// Forward anchor RC, negative strand: first base of the anchor.
    fr: Vec<usize>,
    /// Reverse anchor RC, negative strand: first base after the anchor.
    rr: Vec<usize>,
}

impl CandidateState {
    fn reset(&mut self, serial: u64) {
        self.read_serial = serial;
        self.fp.clear();
        self.rp.clear();
        self.fr.clear();
        self.rr.clear();
    }
}

enum Hit {
    Ignored,
    Leading,
    StrandComplete,
}

/// Scans reads against a shared index; one instance per worker.
#[derive(Debug)]
pub struct Classifier<'a> {
    index: &'a TrieIndex,
    loci: &'a [Locus],
    geometry: Option<ScanGeometry>,
    short_circuit: bool,
    canonicalize: bool,
    diagnostics: bool,
    states: Vec<CandidateState>,
    motif_confirmed: BitVec,
    touched: Vec<u32>,
    hits: Vec<IndexEntry>,
    serial: u64,
}

impl<'a> Classifier<'a> {
    /// Create a classifier for `loci`, which must be the table `index` was built from.
    pub fn new(index: &'a TrieIndex, loci: &'a [Locus], config: &ScanConfig) -> Result<Self, IndexError> {
        index.check_table(loci)?;
        Ok(Self {
            index,
            loci,
            geometry: ScanGeometry::from_loci(loci),
            short_circuit: config.short_circuit,
            canonicalize: config.reverse_complement,
            diagnostics: config.diagnostics,
            states: vec![CandidateState::default(); loci.len()],
            motif_confirmed: bitvec![0; loci.len()],
            touched: Vec::new(),
            hits: Vec::with_capacity(loci.len() * 4),
            serial: 0,
        })
    }

    /// Length limits in use, if any loci are configured.
    pub fn geometry(&self) -> Option<ScanGeometry> {
        self.geometry
    }

    /// Scan one read and record every locus call into `tally`.
    ///
    /// Returns the number of haplotypes emitted.
    pub fn classify(&mut self, read: &[u8], tally: &mut Tally) -> Result<usize, ScanError> {
        let Some(geometry) = self.geometry else {
            return Ok(0);
        };
        if read.len() < geometry.min_fragment {
            return Ok(0);
        }
        if let Some(position) = read.iter().position(|&ch| !is_read_base(ch)) {
            return Err(ScanError::IllegalBase {
                base: read[position] as char,
                position,
                read: String::from_utf8_lossy(read).into_owned(),
            });
        }

        self.serial += 1;
        let serial = self.serial;
        self.touched.clear();

        let mut hits = std::mem::take(&mut self.hits);
        let mut leading_seen = false;
        let stop = read.len() - geometry.min_len + 1;
        'scan: for j in 0..stop {
            if !self.diagnostics && !leading_seen && read.len() - j < geometry.min_fragment {
                break;
            }
            self.index.find_all(&read[j..], geometry.max_len, &mut hits);
            for &entry in &hits {
                match self.observe(entry, j, serial) {
                    Hit::Leading => leading_seen = true,
                    Hit::StrandComplete if self.short_circuit => break 'scan,
                    _ => {}
                }
            }
        }
        self.hits = hits;

        Ok(self.finish(read, tally))
    }

    fn observe(&mut self, entry: IndexEntry, j: usize, serial: u64) -> Hit {
        let id = entry.locus_id as usize;
        let locus = &self.loci[id];
        let (fc, rc) = (locus.forward().count(), locus.reverse().count());
        let state = &mut self.states[id];

        if !entry.kind.is_motif() && state.read_serial != serial {
            state.reset(serial);
            self.motif_confirmed.set(id, false);
            self.touched.push(entry.locus_id);
        }

        match entry.kind {
            AnchorKind::Motif | AnchorKind::MotifRc => {
                if state.read_serial == serial
                    && !self.motif_confirmed[id]
                    && ((!state.fp.is_empty() && state.rp.len() < rc)
                        || (!state.rr.is_empty() && state.fr.len() < fc))
                {
                    self.motif_confirmed.set(id, true);
                }
                Hit::Ignored
            }
            AnchorKind::ForwardAnchor => {
                let len = locus.forward().len();
                if overlaps(state.fr.last(), j.checked_sub(len)) {
                    return Hit::Ignored;
                }
                state.fp.push(j + len);
                Hit::Leading
            }
            AnchorKind::ReverseAnchor => {
                if overlaps(state.fp.last(), Some(j)) {
                    return Hit::Ignored;
                }
                state.rp.push(j);
                if state.rp.len() == rc && state.fp.len() == fc {
                    Hit::StrandComplete
                } else {
                    Hit::Ignored
                }
            }
            AnchorKind::ForwardAnchorRc => {
                if overlaps(state.rr.last(), Some(j)) {
                    return Hit::Ignored;
                }
                state.fr.push(j);
                if state.rr.len() == rc && state.fr.len() == fc {
                    Hit::StrandComplete
                } else {
                    Hit::Ignored
                }
            }
            AnchorKind::ReverseAnchorRc => {
                let len = locus.reverse().len();
                if overlaps(state.fr.last(), j.checked_sub(len)) {
                    return Hit::Ignored;
                }
                state.rr.push(j + len);
                Hit::Leading
            }
        }
    }

    fn finish(&self, read: &[u8], tally: &mut Tally) -> usize {
        let mut emitted = 0;
        for &locus_id in &self.touched {
            let id = locus_id as usize;
            let locus = &self.loci[id];
            let state = &self.states[id];
            let (fc, rc) = (locus.forward().count(), locus.reverse().count());

            let pos_forward = state.fp.len() == fc;
            let pos_reverse = state.rp.len() == rc;
            let neg_forward = state.fr.len() == fc;
            let neg_reverse = state.rr.len() == rc;
            let positive = pos_forward && pos_reverse;
            let negative = neg_forward && neg_reverse;

            // A read satisfying both strands cannot be assigned one; drop it.
            if self.motif_confirmed[id] && positive != negative {
                let call = if positive {
                    span(&state.fp, &state.rp).map(|(l, r)| (l, r, Strand::Positive))
                } else {
                    span(&state.rr, &state.fr).map(|(l, r)| (l, r, Strand::Negative))
                };
                if let Some((left, right, strand)) = call {
                    tally.record(read, left, right, strand, locus_id, self.canonicalize);
                    emitted += 1;
                }
            }

            let lopsided = (pos_forward && state.rp.len() < rc)
                || (pos_reverse && state.fp.len() < fc)
                || (neg_reverse && state.fr.len() < fc)
                || (neg_forward && state.rr.len() < rc);
            if self.diagnostics && lopsided {
                tally.record_missing_anchor(locus_id);
            }
        }
        emitted
    }
}

/// `true` when the previous opposite-kind hit reaches `floor` or beyond.
#[inline]
fn overlaps(previous: Option<&usize>, floor: Option<usize>) -> bool {
    matches!((previous, floor), (Some(&last), Some(floor)) if last >= floor)
}

/// Haplotype interval between a leading and trailing anchor list, if ordered.
#[inline]
fn span(leading: &[usize], trailing: &[usize]) -> Option<(usize, usize)> {
    match (leading.first(), leading.last(), trailing.first(), trailing.last()) {
        (Some(&left), Some(&lead_last), Some(&trail_first), Some(&right)) if lead_last < trail_first => {
            Some((left, right))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l1() -> Vec<Locus> {
        vec![Locus::new("L1", "AACCG", "TTGGC", "AT", 2, 0).unwrap()]
    }

    fn run(loci: &[Locus], config: &ScanConfig, read: &[u8]) -> (usize, Tally) {
        let index = TrieIndex::build(loci, config.anchor_distance, config.motif_distance).unwrap();
        let mut classifier = Classifier::new(&index, loci, config).unwrap();
        let mut tally = Tally::new(loci.len());
        let emitted = classifier.classify(read, &mut tally).unwrap();
        (emitted, tally)
    }

    #[test]
    fn positive_strand_call_extracts_bases_between_anchors() {
        let config = ScanConfig::default().with_anchor_distance(0);
        let (emitted, tally) = run(&l1(), &config, b"AACCGATATTTTGGC");
        assert_eq!(emitted, 1);
        let counts = tally.get(0, b"ATATT").expect("haplotype tallied");
        assert_eq!((counts.positive, counts.negative), (1, 0));
    }

    #[test]
    fn negative_strand_call_is_canonicalized() {
        // Reverse complement of AACCG ATATT TTGGC.
        let config = ScanConfig::default().with_anchor_distance(0);
        let (emitted, tally) = run(&l1(), &config, b"GCCAAAATATCGGTT");
        assert_eq!(emitted, 1);
        let counts = tally.get(0, b"ATATT").expect("canonical haplotype tallied");
        assert_eq!((counts.positive, counts.negative), (0, 1));
    }

    #[test]
    fn missing_motif_blocks_the_call() {
        let config = ScanConfig::default().with_anchor_distance(0);
        let (emitted, tally) = run(&l1(), &config, b"AACCGCCCCCTTGGC");
        assert_eq!(emitted, 0);
        assert!(tally.is_empty());
    }

    #[test]
    fn crossed_anchors_are_not_emitted() {
        let config = ScanConfig::default().with_anchor_distance(0);
        let (emitted, _) = run(&l1(), &config, b"TTGGCATATAACCGA");
        assert_eq!(emitted, 0);
    }

    #[test]
    fn illegal_read_characters_are_fatal() {
        let loci = l1();
        let index = TrieIndex::build(&loci, 0, 0).unwrap();
        let mut classifier = Classifier::new(&index, &loci, &ScanConfig::default()).unwrap();
        let mut tally = Tally::new(1);
        let err = classifier.classify(b"AACCGATAT-TTTGGC", &mut tally).unwrap_err();
        assert!(matches!(err, ScanError::IllegalBase { base: '-', position: 9, .. }));
    }

    #[test]
    fn short_reads_are_skipped() {
        let config = ScanConfig::default();
        let (emitted, tally) = run(&l1(), &config, b"AACCGTTGG");
        assert_eq!(emitted, 0);
        assert!(tally.is_empty());
    }

    #[test]
    fn state_does_not_leak_between_reads() {
        let loci = l1();
        let config = ScanConfig::default()
            .with_anchor_distance(0)
            .with_diagnostics(true);
        let index = TrieIndex::build(&loci, 0, 0).unwrap();
        let mut classifier = Classifier::new(&index, &loci, &config).unwrap();
        let mut tally = Tally::new(1);
        assert_eq!(classifier.classify(b"AACCGATATCCCCCC", &mut tally).unwrap(), 0);
        assert_eq!(classifier.classify(b"CCCCCCCCCCTTGGC", &mut tally).unwrap(), 0);
        assert!(tally.is_empty());
        assert_eq!(tally.stats()[0].missing_anchor, 2);
    }

    #[test]
    fn table_other_than_the_indexed_one_is_rejected() {
        let loci = vec![
            Locus::new("L1", "AACCG", "TTGGC", "AT", 2, 0).unwrap(),
            Locus::new("D2", "GGGAA", "CCCTT", "GATA", 4, 1).unwrap(),
        ];
        let index = TrieIndex::build(&loci, 0, 0).unwrap();
        let err = Classifier::new(&index, &loci[..1], &ScanConfig::default()).unwrap_err();
        assert_eq!(err, IndexError::TableMismatch { indexed: 2, given: 1 });
    }

    #[test]
    fn required_counts_are_exact() {
        let loci = vec![
            Locus::with_counts("L2", "", ("AACCG", 2), ("TTGGC", 1), "AT", 2, 0).unwrap(),
        ];
        let config = ScanConfig::default().with_anchor_distance(0);
        let (single, _) = run(&loci, &config, b"AACCGATATTTTGGC");
        assert_eq!(single, 0);
        let (double, tally) = run(&loci, &config, b"AACCGGGAACCGATATTTGGC");
        assert_eq!(double, 1);
        assert!(tally.get(0, b"GGAACCGATAT").is_some());
    }
}
