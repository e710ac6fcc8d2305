use proptest::prelude::*;
use strscan::genomics::packed_dna::{
    decode, encode, get_base, reverse_complement, reverse_complement_text, set_base,
    BASES_PER_WORD,
};
use strscan::genomics::{CodecError, PackedSequence};

fn dna(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(
        prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')],
        0..=max_len,
    )
}

proptest! {
    #[test]
    fn single_word_round_trip(seq in dna(BASES_PER_WORD)) {
        let words = encode(&seq).expect("ACGT encodes");
        prop_assert!(words.len() <= 1);
        prop_assert_eq!(decode(&words, seq.len()), seq);
    }

    #[test]
    fn multi_word_round_trip(seq in dna(200)) {
        let packed = PackedSequence::pack(&seq).expect("ACGT encodes");
        prop_assert_eq!(packed.len(), seq.len());
        prop_assert_eq!(packed.to_vec(), seq);
    }

    #[test]
    fn reverse_complement_is_an_involution(seq in dna(150)) {
        let words = encode(&seq).expect("ACGT encodes");
        let once = reverse_complement(&words, seq.len());
        let twice = reverse_complement(&once, seq.len());
        prop_assert_eq!(&twice, &words);

        let text = reverse_complement_text(&seq).expect("ACGT complements");
        prop_assert_eq!(decode(&once, seq.len()), text);
    }

    #[test]
    fn set_then_get_returns_the_base(
        word in any::<u64>(),
        pos in 0usize..BASES_PER_WORD,
        base in prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')],
    ) {
        let updated = set_base(word, base, pos).expect("valid base");
        prop_assert_eq!(get_base(updated, pos), base);
        for other in (0..BASES_PER_WORD).filter(|&p| p != pos) {
            prop_assert_eq!(get_base(updated, other), get_base(word, other));
        }
    }
}

#[test]
fn non_acgt_input_is_rejected_with_position() {
    assert_eq!(
        encode(b"ACGNT"),
        Err(CodecError::InvalidBase {
            base: 'N',
            position: 3
        })
    );
    assert!(reverse_complement_text(b"AC-T").is_err());
    assert!(set_base(0, b'x', 0).is_err());
}
