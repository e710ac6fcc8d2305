//! Prefix trie over every Hamming-bounded variant of each anchor and motif.
//!
//! All nodes live in a single arena sized up front from a closed-form bound,
//! children are arena indices, and entry lists are kept in a side table so
//! that nodes stay plain `Copy` data.

use tracing::debug;

use crate::genomics::locus::{Anchor, AnchorKind, Locus};
use crate::genomics::packed_dna::base_code;
use thiserror::Error;

/// Largest supported anchor Hamming distance.
pub const MAX_ANCHOR_DISTANCE: u8 = 2;
/// Largest supported motif Hamming distance.
pub const MAX_MOTIF_DISTANCE: u8 = 1;

const ROOT: u32 = 0;
const NO_CHILD: u32 = 0;
const NO_ENTRIES: u32 = u32::MAX;
const LETTERS: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Errors raised while building the index.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Anchor distance outside `0..=2`.
    #[error("the max anchor distance supported is {MAX_ANCHOR_DISTANCE}; {0} is too big")]
    AnchorDistance(u8),

    /// Motif distance outside `0..=1`.
    #[error("the max motif distance supported is {MAX_MOTIF_DISTANCE}; {0} is too big")]
    MotifDistance(u8),

    /// An anchor carried more than one IUPAC ambiguity code.
    #[error("locus '{locus}' has {found} ambiguity codes in '{anchor}'; at most one is supported")]
    TooManyAmbiguityCodes {
        /// Locus name.
        locus: String,
        /// The anchor text.
        anchor: String,
        /// Number of ambiguity codes seen.
        found: usize,
    },

    /// A locus table of a different size than the index was built from.
    #[error("index was built from {indexed} loci but {given} were supplied")]
    TableMismatch {
        /// Loci in the table the index was built from.
        indexed: usize,
        /// Loci supplied alongside the index.
        given: usize,
    },

    /// Node accounting disagreed with the precomputed bound.
    #[error("trie arena exhausted: bound of {capacity} nodes is too small")]
    ArenaExhausted {
        /// Precomputed node bound.
        capacity: usize,
    },
}

/// A `(locus, kind)` tag attached to the terminal node of an indexed word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    /// Position of the locus in the table the index was built from.
    pub locus_id: u32,
    /// Role of the matched word.
    pub kind: AnchorKind,
}

#[derive(Debug, Clone, Copy)]
struct TrieNode {
    children: [u32; 4],
    entries: u32,
}

impl TrieNode {
    const EMPTY: TrieNode = TrieNode {
        children: [NO_CHILD; 4],
        entries: NO_ENTRIES,
    };
}

/// Summary of a finished build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    /// Nodes allocated, including the root.
    pub nodes: usize,
    /// Precomputed arena bound.
    pub capacity: usize,
    /// Total tags across all nodes.
    pub entries: usize,
}

/// Read-only, thread-safe index of anchor and motif variants.
#[derive(Debug, Clone)]
pub struct TrieIndex {
    nodes: Vec<TrieNode>,
    entry_lists: Vec<Vec<IndexEntry>>,
    capacity: usize,
    locus_count: usize,
    anchor_distance: u8,
    motif_distance: u8,
}

/// Worst-case nodes needed to insert one word of length `len` and all of its
/// substitution variants up to `distance`, in one orientation.
///
/// A variant whose first substitution is at position `i` shares `i` letters
/// with an earlier insertion, so it adds at most `len - i` nodes.
pub fn variant_node_bound(len: usize, distance: u8) -> usize {
    let mut nodes = len;
    if distance >= 1 {
        nodes += 3 * len * (len + 1) / 2;
    }
    if distance >= 2 {
        nodes += 3 * len.saturating_sub(1) * len * (len + 1);
    }
    nodes
}

impl TrieIndex {
    /// Build the index over `loci`.
    ///
    /// Both orientations of every anchor and motif are inserted, together
    /// with all of their substitution variants up to the given distances.
    pub fn build(loci: &[Locus], anchor_distance: u8, motif_distance: u8) -> Result<Self, IndexError> {
        if anchor_distance > MAX_ANCHOR_DISTANCE {
            return Err(IndexError::AnchorDistance(anchor_distance));
        }
        if motif_distance > MAX_MOTIF_DISTANCE {
            return Err(IndexError::MotifDistance(motif_distance));
        }

        let mut capacity = 1usize;
        let mut resolved = Vec::with_capacity(loci.len());
        for locus in loci {
            let forward = resolve_ambiguity(locus, locus.forward())?;
            let reverse = resolve_ambiguity(locus, locus.reverse())?;
            for word in forward.iter().chain(reverse.iter()) {
                capacity += 2 * variant_node_bound(word.len(), anchor_distance);
            }
            capacity += 2 * variant_node_bound(locus.motif().len(), motif_distance);
            resolved.push((forward, reverse));
        }

        let mut index = Self {
            nodes: Vec::with_capacity(capacity),
            entry_lists: Vec::new(),
            capacity,
            locus_count: loci.len(),
            anchor_distance,
            motif_distance,
        };
        index.nodes.push(TrieNode::EMPTY);

        for (id, (locus, (forward, reverse))) in loci.iter().zip(resolved).enumerate() {
            let id = id as u32;
            for word in forward {
                index.add_variants(word, id, AnchorKind::ForwardAnchor, anchor_distance)?;
            }
            for word in reverse {
                index.add_variants(word, id, AnchorKind::ReverseAnchor, anchor_distance)?;
            }
            index.add_variants(locus.motif().to_vec(), id, AnchorKind::Motif, motif_distance)?;
        }

        let stats = index.stats();
        debug!(
            loci = loci.len(),
            anchor_distance,
            motif_distance,
            nodes = stats.nodes,
            capacity = stats.capacity,
            entries = stats.entries,
            "built anchor trie"
        );
        Ok(index)
    }

    /// Anchor distance the index was built with.
    pub fn anchor_distance(&self) -> u8 {
        self.anchor_distance
    }

    /// Motif distance the index was built with.
    pub fn motif_distance(&self) -> u8 {
        self.motif_distance
    }

    /// Number of loci the index was built from.
    pub fn locus_count(&self) -> usize {
        self.locus_count
    }

    /// Reject a locus table that cannot be the one the index was built from.
    pub fn check_table(&self, loci: &[Locus]) -> Result<(), IndexError> {
        if loci.len() != self.locus_count {
            return Err(IndexError::TableMismatch {
                indexed: self.locus_count,
                given: loci.len(),
            });
        }
        Ok(())
    }

    /// Node and entry counts.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            nodes: self.nodes.len(),
            capacity: self.capacity,
            entries: self.entry_lists.iter().map(Vec::len).sum(),
        }
    }

    /// Collect every tag whose word is a prefix of `text[..max_len]`.
    ///
    /// Tags are appended to `out` (which is cleared first) from the shallowest
    /// node to the deepest. Returns the number of tags found.
    pub fn find_all(&self, text: &[u8], max_len: usize, out: &mut Vec<IndexEntry>) -> usize {
        out.clear();
        let mut node = ROOT;
        for &ch in text.iter().take(max_len) {
            self.push_entries(node, out);
            match self.child(node, ch) {
                Some(next) => node = next,
                None => return out.len(),
            }
        }
        self.push_entries(node, out);
        out.len()
    }

    /// `true` when a word tagged `(locus_id, kind)` is a prefix of `text[..len]`.
    pub fn exists_match(&self, text: &[u8], len: usize, locus_id: u32, kind: AnchorKind) -> bool {
        let wanted = IndexEntry { locus_id, kind };
        let mut node = ROOT;
        for &ch in text.iter().take(len) {
            if self.entries(node).contains(&wanted) {
                return true;
            }
            match self.child(node, ch) {
                Some(next) => node = next,
                None => return false,
            }
        }
        self.entries(node).contains(&wanted)
    }

    #[inline]
    fn child(&self, node: u32, ch: u8) -> Option<u32> {
        let code = base_code(ch)?;
        match self.nodes[node as usize].children[code as usize] {
            NO_CHILD => None,
            next => Some(next),
        }
    }

    #[inline]
    fn entries(&self, node: u32) -> &[IndexEntry] {
        match self.nodes[node as usize].entries {
            NO_ENTRIES => &[],
            slot => &self.entry_lists[slot as usize],
        }
    }

    #[inline]
    fn push_entries(&self, node: u32, out: &mut Vec<IndexEntry>) {
        out.extend_from_slice(self.entries(node));
    }

    fn add_variants(&mut self, mut word: Vec<u8>, id: u32, kind: AnchorKind, distance: u8) -> Result<(), IndexError> {
        let rc_kind = kind.paired();
        self.add_word(&word, id, kind)?;
        self.add_word_rc(&word, id, rc_kind)?;

        if distance >= 1 {
            for i in 0..word.len() {
                let original = word[i];
                for letter in LETTERS.into_iter().filter(|&l| l != original) {
                    word[i] = letter;
                    self.add_word(&word, id, kind)?;
                    self.add_word_rc(&word, id, rc_kind)?;
                }
                word[i] = original;
            }
        }

        if distance >= 2 {
            for i in 0..word.len() {
                let first = word[i];
                for j in (i + 1)..word.len() {
                    let second = word[j];
                    for a in LETTERS.into_iter().filter(|&l| l != first) {
                        for b in LETTERS.into_iter().filter(|&l| l != second) {
                            word[i] = a;
                            word[j] = b;
                            self.add_word(&word, id, kind)?;
                            self.add_word_rc(&word, id, rc_kind)?;
                        }
                    }
                    word[i] = first;
                    word[j] = second;
                }
            }
        }
        Ok(())
    }

    fn add_word(&mut self, word: &[u8], id: u32, kind: AnchorKind) -> Result<(), IndexError> {
        let mut node = ROOT;
        for &ch in word {
            node = self.child_or_insert(node, letter_slot(ch))?;
        }
        self.tag(node, IndexEntry { locus_id: id, kind });
        Ok(())
    }

    fn add_word_rc(&mut self, word: &[u8], id: u32, kind: AnchorKind) -> Result<(), IndexError> {
        let mut node = ROOT;
        for &ch in word.iter().rev() {
            node = self.child_or_insert(node, 3 - letter_slot(ch))?;
        }
        self.tag(node, IndexEntry { locus_id: id, kind });
        Ok(())
    }

    fn child_or_insert(&mut self, node: u32, slot: usize) -> Result<u32, IndexError> {
        let existing = self.nodes[node as usize].children[slot];
        if existing != NO_CHILD {
            return Ok(existing);
        }
        if self.nodes.len() >= self.capacity {
            return Err(IndexError::ArenaExhausted {
                capacity: self.capacity,
            });
        }
        let next = self.nodes.len() as u32;
        self.nodes.push(TrieNode::EMPTY);
        self.nodes[node as usize].children[slot] = next;
        Ok(next)
    }

    fn tag(&mut self, node: u32, entry: IndexEntry) {
        let slot = self.nodes[node as usize].entries;
        if slot == NO_ENTRIES {
            self.nodes[node as usize].entries = self.entry_lists.len() as u32;
            self.entry_lists.push(vec![entry]);
            return;
        }
        let list = &mut self.entry_lists[slot as usize];
        if !list.contains(&entry) {
            list.push(entry);
        }
    }
}

/// Child slot for an uppercase base; sequences reaching the trie are
/// validated, so anything unexpected is a bug.
#[inline]
fn letter_slot(ch: u8) -> usize {
    match base_code(ch) {
        Some(code) => code as usize,
        None => unreachable!("unvalidated base '{}' reached the trie", ch as char),
    }
}

/// Expand a single ambiguity code into its two concrete anchors.
fn resolve_ambiguity(locus: &Locus, anchor: &Anchor) -> Result<Vec<Vec<u8>>, IndexError> {
    let ambiguous = anchor.ambiguous_positions();
    let anchor = anchor.sequence();
    match ambiguous.as_slice() {
        [] => Ok(vec![anchor.to_vec()]),
        &[(pos, bases)] => Ok(bases
            .iter()
            .map(|&base| {
                let mut word = anchor.to_vec();
                word[pos] = base;
                word
            })
            .collect()),
        _ => Err(IndexError::TooManyAmbiguityCodes {
            locus: locus.name().to_string(),
            anchor: String::from_utf8_lossy(anchor).into_owned(),
            found: ambiguous.len(),
        }),
    }
}
