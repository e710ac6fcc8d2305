#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest repeat count that can be attached to an anchor.
pub const MAX_ANCHOR_COUNT: u8 = 9;

/// Errors raised while validating locus definitions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocusError {
    /// A required column was absent.
    #[error("line {line}: missing field '{field}'")]
    MissingField {
        /// 1-based line number in the locus table.
        line: usize,
        /// Name of the absent column.
        field: &'static str,
    },

    /// An anchor or motif contained a character outside its alphabet.
    #[error("locus '{locus}' has illegal character '{ch}' in {field} '{sequence}'")]
    IllegalCharacter {
        /// Locus name.
        locus: String,
        /// Which sequence was rejected.
        field: &'static str,
        /// The sequence itself.
        sequence: String,
        /// First offending character.
        ch: char,
    },

    /// Anchor or motif was empty.
    #[error("locus '{locus}' has an empty {field}")]
    EmptySequence {
        /// Locus name.
        locus: String,
        /// Which sequence was empty.
        field: &'static str,
    },

    /// Required count outside 1..=9.
    #[error("locus '{locus}' has invalid {field} count {count}")]
    InvalidCount {
        /// Locus name.
        locus: String,
        /// Which anchor carried the count.
        field: &'static str,
        /// Parsed count.
        count: u8,
    },

    /// Motif period was zero or unparsable.
    #[error("locus '{locus}' has illegal spacing characteristics '{period}' '{offset}'")]
    InvalidSpacing {
        /// Locus name.
        locus: String,
        /// Period column as written.
        period: String,
        /// Offset column as written.
        offset: String,
    },

    /// A table row failed validation.
    #[error("line {line}: {source}")]
    AtLine {
        /// 1-based line number in the locus table.
        line: usize,
        /// What was wrong with the row.
        source: Box<LocusError>,
    },

    /// Failure reading the table.
    #[error("failed to read locus table: {0}")]
    Io(String),
}

/// Which role an indexed word plays for its locus.
///
/// Flank codes are chosen so that a literal kind and its reverse complement
/// sum to [`AnchorKind::FLANK_PAIR_SUM`]; the motif pair sums to
/// [`AnchorKind::MOTIF_PAIR_SUM`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum AnchorKind {
    /// Left anchor on the positive strand.
    ForwardAnchor = 0,
    /// Right anchor on the positive strand.
    ReverseAnchor = 1,
    /// Reverse complement of the right anchor.
    ReverseAnchorRc = 2,
    /// Reverse complement of the left anchor.
    ForwardAnchorRc = 3,
    /// Repeat motif.
    Motif = 4,
    /// Reverse complement of the repeat motif.
    MotifRc = 5,
}

impl AnchorKind {
    /// Sum of the codes of a flank kind and its reverse complement.
    pub const FLANK_PAIR_SUM: u8 = 3;
    /// Sum of the codes of the motif kind and its reverse complement.
    pub const MOTIF_PAIR_SUM: u8 = 9;

    /// Every kind, in code order.
    pub const ALL: [AnchorKind; 6] = [
        AnchorKind::ForwardAnchor,
        AnchorKind::ReverseAnchor,
        AnchorKind::ReverseAnchorRc,
        AnchorKind::ForwardAnchorRc,
        AnchorKind::Motif,
        AnchorKind::MotifRc,
    ];

    /// Numeric code.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Kind with the given code, if any.
    #[inline]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Kind for the opposite orientation of the same sequence.
    #[inline]
    pub fn paired(self) -> Self {
        let sum = if self.is_motif() {
            Self::MOTIF_PAIR_SUM
        } else {
            Self::FLANK_PAIR_SUM
        };
        Self::ALL[(sum - self.code()) as usize]
    }

    /// `true` for the two motif kinds.
    #[inline]
    pub fn is_motif(self) -> bool {
        matches!(self, AnchorKind::Motif | AnchorKind::MotifRc)
    }
}

/// Strand a locus call was resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    /// Anchors read forward-then-reverse.
    Positive,
    /// Anchors read as reverse complements, reverse-then-forward.
    Negative,
}

/// Resolve an IUPAC two-base ambiguity code.
pub fn ambiguity_resolutions(code: u8) -> Option<[u8; 2]> {
    match code {
        b'R' => Some([b'A', b'G']),
        b'Y' => Some([b'C', b'T']),
        b'S' => Some([b'C', b'G']),
        b'W' => Some([b'A', b'T']),
        b'K' => Some([b'G', b'T']),
        b'M' => Some([b'A', b'C']),
        _ => None,
    }
}

fn is_plain_base(ch: u8) -> bool {
    matches!(ch, b'A' | b'C' | b'G' | b'T')
}

/// One flanking sequence of a locus and how many times it must be seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    sequence: Vec<u8>,
    count: u8,
}

impl Anchor {
    /// Anchor sequence, possibly containing ambiguity codes.
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Anchor length in bases.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Always `false` for a validated anchor.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Required number of hits in a read.
    pub fn count(&self) -> usize {
        self.count as usize
    }

    /// Ambiguity codes in the anchor as `(position, resolutions)`.
    pub fn ambiguous_positions(&self) -> Vec<(usize, [u8; 2])> {
        self.sequence
            .iter()
            .enumerate()
            .filter_map(|(idx, &ch)| ambiguity_resolutions(ch).map(|bases| (idx, bases)))
            .collect()
    }
}

/// A repeat-marker locus: two anchors bracketing a tandem repeat.
///
/// With the `serde` feature, deserialized loci pass the same validation as
/// [`Locus::with_counts`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "LocusRecord", into = "LocusRecord")
)]
pub struct Locus {
    name: String,
    marker_type: String,
    forward: Anchor,
    reverse: Anchor,
    motif: Vec<u8>,
    period: u16,
    offset: u16,
}

impl Locus {
    /// Build a locus with single-count anchors.
    pub fn new(
        name: impl Into<String>,
        forward: &str,
        reverse: &str,
        motif: &str,
        period: u16,
        offset: u16,
    ) -> Result<Self, LocusError> {
        Self::with_counts(name, "", (forward, 1), (reverse, 1), motif, period, offset)
    }

    /// Build a locus with explicit anchor counts and marker type.
    pub fn with_counts(
        name: impl Into<String>,
        marker_type: impl Into<String>,
        forward: (&str, u8),
        reverse: (&str, u8),
        motif: &str,
        period: u16,
        offset: u16,
    ) -> Result<Self, LocusError> {
        let name = name.into();
        let forward = validate_anchor(&name, "forward anchor", forward.0, forward.1)?;
        let reverse = validate_anchor(&name, "reverse anchor", reverse.0, reverse.1)?;
        let motif = validate_motif(&name, motif)?;
        if period == 0 {
            return Err(LocusError::InvalidSpacing {
                locus: name,
                period: period.to_string(),
                offset: offset.to_string(),
            });
        }
        Ok(Self {
            name,
            marker_type: marker_type.into(),
            forward,
            reverse,
            motif,
            period,
            offset,
        })
    }

    /// Locus name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Marker type column (e.g. `AUTOSOMES`).
    pub fn marker_type(&self) -> &str {
        &self.marker_type
    }

    /// Left anchor.
    pub fn forward(&self) -> &Anchor {
        &self.forward
    }

    /// Right anchor.
    pub fn reverse(&self) -> &Anchor {
        &self.reverse
    }

    /// Repeat motif.
    pub fn motif(&self) -> &[u8] {
        &self.motif
    }

    /// Motif period used for nomenclature.
    pub fn period(&self) -> u16 {
        self.period
    }

    /// Motif offset used for nomenclature.
    pub fn offset(&self) -> u16 {
        self.offset
    }

    /// Shortest read that could hold both anchors of this locus.
    pub fn min_fragment(&self) -> usize {
        self.forward.len() + self.reverse.len() + self.offset as usize
    }

    /// Repeat-unit designation for a haplotype of `len` bases, e.g. `12` or `9.3`.
    pub fn allele_name(&self, len: usize) -> String {
        let shifted = len as i64 - self.offset as i64;
        let period = self.period as i64;
        let (units, rest) = (shifted / period, shifted % period);
        if rest != 0 {
            format!("{units}.{rest}")
        } else {
            format!("{units}")
        }
    }
}

/// Flat, text-only form of a [`Locus`] used on the wire.
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocusRecord {
    name: String,
    #[serde(default)]
    marker_type: String,
    forward: String,
    #[serde(default = "single_copy")]
    forward_count: u8,
    reverse: String,
    #[serde(default = "single_copy")]
    reverse_count: u8,
    motif: String,
    period: u16,
    offset: u16,
}

#[cfg(feature = "serde")]
fn single_copy() -> u8 {
    1
}

#[cfg(feature = "serde")]
impl TryFrom<LocusRecord> for Locus {
    type Error = LocusError;

    fn try_from(record: LocusRecord) -> Result<Self, Self::Error> {
        Locus::with_counts(
            record.name,
            record.marker_type,
            (record.forward.as_str(), record.forward_count),
            (record.reverse.as_str(), record.reverse_count),
            record.motif.as_str(),
            record.period,
            record.offset,
        )
    }
}

#[cfg(feature = "serde")]
impl From<Locus> for LocusRecord {
    fn from(locus: Locus) -> Self {
        let text = |bytes: Vec<u8>| String::from_utf8_lossy(&bytes).into_owned();
        Self {
            name: locus.name,
            marker_type: locus.marker_type,
            forward: text(locus.forward.sequence),
            forward_count: locus.forward.count,
            reverse: text(locus.reverse.sequence),
            reverse_count: locus.reverse.count,
            motif: text(locus.motif),
            period: locus.period,
            offset: locus.offset,
        }
    }
}

fn validate_anchor(locus: &str, field: &'static str, seq: &str, count: u8) -> Result<Anchor, LocusError> {
    if seq.is_empty() {
        return Err(LocusError::EmptySequence {
            locus: locus.to_string(),
            field,
        });
    }
    if let Some(&ch) = seq
        .as_bytes()
        .iter()
        .find(|&&ch| !is_plain_base(ch) && ambiguity_resolutions(ch).is_none())
    {
        return Err(LocusError::IllegalCharacter {
            locus: locus.to_string(),
            field,
            sequence: seq.to_string(),
            ch: ch as char,
        });
    }
    if count == 0 || count > MAX_ANCHOR_COUNT {
        return Err(LocusError::InvalidCount {
            locus: locus.to_string(),
            field,
            count,
        });
    }
    Ok(Anchor {
        sequence: seq.as_bytes().to_vec(),
        count,
    })
}

fn validate_motif(locus: &str, seq: &str) -> Result<Vec<u8>, LocusError> {
    if seq.is_empty() {
        return Err(LocusError::EmptySequence {
            locus: locus.to_string(),
            field: "motif",
        });
    }
    if let Some(&ch) = seq.as_bytes().iter().find(|&&ch| !is_plain_base(ch)) {
        return Err(LocusError::IllegalCharacter {
            locus: locus.to_string(),
            field: "motif",
            sequence: seq.to_string(),
            ch: ch as char,
        });
    }
    Ok(seq.as_bytes().to_vec())
}
