//! Two-bit DNA packing, 32 bases per word with the first base in the high bits.

use std::fmt;

use thiserror::Error;

/// Number of bases encoded per `u64` word.
pub const BASES_PER_WORD: usize = 32;
/// Bits used to encode a single DNA base (A/C/G/T).
const BITS_PER_BASE: usize = 2;
const WORD_BITS: usize = BASES_PER_WORD * BITS_PER_BASE;

/// Errors that can occur while packing or complementing DNA.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Encountered a base that cannot be represented in the 2-bit alphabet.
    #[error("invalid base '{base}' at position {position}")]
    InvalidBase {
        /// Offending character.
        base: char,
        /// 0-based position in the original text.
        position: usize,
    },
}

/// Two-bit code of an uppercase base, or `None` outside A/C/G/T.
#[inline]
pub fn base_code(base: u8) -> Option<u8> {
    match base {
        b'A' => Some(0b00),
        b'C' => Some(0b01),
        b'G' => Some(0b10),
        b'T' => Some(0b11),
        _ => None,
    }
}

/// Uppercase base for a two-bit code.
#[inline]
pub fn code_base(code: u8) -> u8 {
    match code & 0b11 {
        0b00 => b'A',
        0b01 => b'C',
        0b10 => b'G',
        _ => b'T',
    }
}

/// Watson-Crick complement of an uppercase base.
#[inline]
pub fn complement(base: u8) -> Option<u8> {
    match base {
        b'A' => Some(b'T'),
        b'C' => Some(b'G'),
        b'G' => Some(b'C'),
        b'T' => Some(b'A'),
        _ => None,
    }
}

#[inline]
fn shift_for(pos: usize) -> usize {
    WORD_BITS - BITS_PER_BASE - pos * BITS_PER_BASE
}

/// Read the base at `pos` (0..32) of a single packed word.
#[inline]
pub fn get_base(word: u64, pos: usize) -> u8 {
    debug_assert!(pos < BASES_PER_WORD);
    code_base(((word >> shift_for(pos)) & 0b11) as u8)
}

/// Overwrite the base at `pos` (0..32) of a single packed word.
pub fn set_base(word: u64, base: u8, pos: usize) -> Result<u64, CodecError> {
    debug_assert!(pos < BASES_PER_WORD);
    let code = base_code(base).ok_or(CodecError::InvalidBase {
        base: base as char,
        position: pos,
    })?;
    let shift = shift_for(pos);
    Ok((word & !(0b11u64 << shift)) | ((code as u64) << shift))
}

/// Number of words needed to hold `len` bases.
#[inline]
pub fn words_for_len(len: usize) -> usize {
    (len + BASES_PER_WORD - 1) / BASES_PER_WORD
}

/// Pack `text` into 2-bit words, first base in the most significant bits.
///
/// Unused trailing bits of the last word are zero.
pub fn encode(text: &[u8]) -> Result<Vec<u64>, CodecError> {
    let mut words = vec![0u64; words_for_len(text.len())];
    for (idx, &base) in text.iter().enumerate() {
        let code = base_code(base).ok_or(CodecError::InvalidBase {
            base: base as char,
            position: idx,
        })?;
        words[idx / BASES_PER_WORD] |= (code as u64) << shift_for(idx % BASES_PER_WORD);
    }
    Ok(words)
}

/// Decode the first `len` bases of `words` back into ASCII.
///
/// # Panics
/// Panics if `len` exceeds the capacity of `words`.
pub fn decode(words: &[u64], len: usize) -> Vec<u8> {
    assert!(
        len <= words.len() * BASES_PER_WORD,
        "length {} exceeds backing capacity {} ({} words)",
        len,
        words.len() * BASES_PER_WORD,
        words.len()
    );
    (0..len)
        .map(|idx| get_base(words[idx / BASES_PER_WORD], idx % BASES_PER_WORD))
        .collect()
}

/// Reverse complement of the first `total_bases` bases of `words`.
///
/// The result is a fresh buffer; base `i` of the output is the complement of
/// base `total_bases - 1 - i` of the input.
pub fn reverse_complement(words: &[u64], total_bases: usize) -> Vec<u64> {
    assert!(total_bases <= words.len() * BASES_PER_WORD);
    let mut out = vec![0u64; words_for_len(total_bases)];
    for j in 0..total_bases {
        let i = total_bases - 1 - j;
        let shift_in = shift_for(i % BASES_PER_WORD);
        // Complement in code space is bitwise NOT (A=00 <-> T=11, C=01 <-> G=10).
        let code = !(words[i / BASES_PER_WORD] >> shift_in) & 0b11;
        out[j / BASES_PER_WORD] |= code << shift_for(j % BASES_PER_WORD);
    }
    out
}

/// Reverse complement of ASCII text, rejecting anything outside A/C/G/T.
pub fn reverse_complement_text(text: &[u8]) -> Result<Vec<u8>, CodecError> {
    text.iter()
        .enumerate()
        .rev()
        .map(|(idx, &base)| {
            complement(base).ok_or(CodecError::InvalidBase {
                base: base as char,
                position: idx,
            })
        })
        .collect()
}

/// A DNA sequence packed 32 bases per word.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackedSequence {
    len: usize,
    words: Box<[u64]>,
}

impl PackedSequence {
    /// Pack an ASCII sequence.
    pub fn pack(text: &[u8]) -> Result<Self, CodecError> {
        Ok(Self {
            len: text.len(),
            words: encode(text)?.into_boxed_slice(),
        })
    }

    /// Wrap already packed words.
    ///
    /// # Panics
    /// Panics if `len` exceeds the capacity implied by `words`.
    pub fn from_parts(words: Box<[u64]>, len: usize) -> Self {
        assert!(
            len <= words.len() * BASES_PER_WORD,
            "length {} exceeds backing capacity {} ({} words)",
            len,
            words.len() * BASES_PER_WORD,
            words.len()
        );
        Self { len, words }
    }

    /// Number of bases in the sequence.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Access the packed words.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Base at `idx` as an uppercase ASCII byte.
    pub fn base_at(&self, idx: usize) -> Option<u8> {
        if idx >= self.len {
            return None;
        }
        Some(get_base(
            self.words[idx / BASES_PER_WORD],
            idx % BASES_PER_WORD,
        ))
    }

    /// Decode into a newly allocated vector of uppercase ASCII bases.
    pub fn to_vec(&self) -> Vec<u8> {
        decode(&self.words, self.len)
    }

    /// Reverse complement as a new sequence.
    pub fn reverse_complement(&self) -> Self {
        Self {
            len: self.len,
            words: reverse_complement(&self.words, self.len).into_boxed_slice(),
        }
    }

    pub(crate) fn into_parts(self) -> (Box<[u64]>, usize) {
        (self.words, self.len)
    }
}

impl fmt::Display for PackedSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decoded = self.to_vec();
        write!(f, "{}", String::from_utf8_lossy(&decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_and_decode_roundtrip() {
        let seq = b"ACGTACGTTTGCA";
        let words = encode(seq).expect("encoding should succeed");
        assert_eq!(words.len(), 1);
        assert_eq!(decode(&words, seq.len()), seq);
    }

    #[test]
    fn first_base_occupies_high_bits() {
        let words = encode(b"C").unwrap();
        assert_eq!(words[0], 0b01u64 << 62);
        let words = encode(b"CT").unwrap();
        assert_eq!(words[0], (0b01u64 << 62) | (0b11u64 << 60));
    }

    #[test]
    fn positions_span_word_boundaries() {
        let seq: Vec<u8> = b"ACGT".iter().cycle().take(70).copied().collect();
        let packed = PackedSequence::pack(&seq).unwrap();
        assert_eq!(packed.words().len(), 3);
        assert_eq!(packed.base_at(32), Some(b'A'));
        assert_eq!(packed.base_at(33), Some(b'C'));
        assert_eq!(packed.base_at(69), Some(b'C'));
        assert_eq!(packed.base_at(70), None);
        assert_eq!(packed.to_vec(), seq);
    }

    #[test]
    fn set_base_overwrites_single_position() {
        let word = encode(b"AAAA").unwrap()[0];
        let word = set_base(word, b'G', 2).unwrap();
        assert_eq!(decode(&[word], 4), b"AAGA");
        let word = set_base(word, b'A', 2).unwrap();
        assert_eq!(decode(&[word], 4), b"AAAA");
    }

    #[test]
    fn reverse_complement_multiword() {
        let seq: Vec<u8> = b"AACGTTTG".iter().cycle().take(45).copied().collect();
        let words = encode(&seq).unwrap();
        let rc = reverse_complement(&words, seq.len());
        let expected = reverse_complement_text(&seq).unwrap();
        assert_eq!(decode(&rc, seq.len()), expected);
    }

    #[test]
    fn reverse_complement_keeps_padding_clear() {
        let words = encode(b"TTTAC").unwrap();
        let rc = reverse_complement(&words, 5);
        assert_eq!(rc, encode(b"GTAAA").unwrap());
    }

    #[test]
    fn invalid_base_returns_error() {
        assert_eq!(
            encode(b"ACNG"),
            Err(CodecError::InvalidBase {
                base: 'N',
                position: 2
            })
        );
        assert!(matches!(
            reverse_complement_text(b"AXA"),
            Err(CodecError::InvalidBase { base: 'X', .. })
        ));
        assert!(set_base(0, b'U', 0).is_err());
    }

    #[test]
    fn display_decodes_sequence() {
        let packed = PackedSequence::pack(b"GATTACA").unwrap();
        assert_eq!(packed.to_string(), "GATTACA");
    }
}
