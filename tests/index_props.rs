use proptest::prelude::*;
use strscan::genomics::packed_dna::reverse_complement_text;
use strscan::genomics::{variant_node_bound, AnchorKind, IndexError, Locus, TrieIndex};

const LETTERS: [u8; 4] = [b'A', b'C', b'G', b'T'];

fn anchor() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')], 4..=12)
}

/// Apply up to `distance` substitutions, each to a different letter.
fn mutate(word: &[u8], distance: u8, edits: &[(usize, u8)]) -> Vec<u8> {
    let mut out = word.to_vec();
    for &(pos, shift) in edits.iter().take(distance as usize) {
        let pos = pos % out.len();
        let code = LETTERS.iter().position(|&l| l == word[pos]).unwrap_or(0) as u8;
        out[pos] = LETTERS[((code + shift) % 4) as usize];
    }
    out
}

proptest! {
    #[test]
    fn every_anchor_variant_within_distance_is_found(
        forward in anchor(),
        distance in 0u8..=2,
        edits in proptest::collection::vec((0usize..64, 1u8..4), 0..=2),
    ) {
        let forward_text = String::from_utf8(forward.clone()).unwrap();
        let locus = Locus::new("P", &forward_text, "TTGGCA", "AT", 2, 0).unwrap();
        let index = TrieIndex::build(&[locus], distance, 0).expect("index builds within bound");

        let variant = mutate(&forward, distance, &edits);
        prop_assert!(index.exists_match(&variant, variant.len(), 0, AnchorKind::ForwardAnchor));

        let variant_rc = reverse_complement_text(&variant).unwrap();
        prop_assert!(index.exists_match(&variant_rc, variant_rc.len(), 0, AnchorKind::ForwardAnchorRc));

        let stats = index.stats();
        prop_assert!(stats.nodes <= stats.capacity);
    }

    #[test]
    fn motif_variants_follow_motif_distance(
        motif in proptest::collection::vec(prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')], 2..=6),
        pos in 0usize..6,
        shift in 1u8..4,
    ) {
        let motif_text = String::from_utf8(motif.clone()).unwrap();
        let locus = Locus::new("P", "AACCGT", "TTGGCA", &motif_text, 2, 0).unwrap();
        let variant = mutate(&motif, 1, &[(pos, shift)]);

        let exact = TrieIndex::build(std::slice::from_ref(&locus), 0, 0).unwrap();
        prop_assert!(exact.exists_match(&motif, motif.len(), 0, AnchorKind::Motif));

        let fuzzy = TrieIndex::build(&[locus], 0, 1).unwrap();
        prop_assert!(fuzzy.exists_match(&variant, variant.len(), 0, AnchorKind::Motif));
    }

    #[test]
    fn node_bound_is_monotonic_in_distance(len in 1usize..40) {
        prop_assert!(variant_node_bound(len, 0) <= variant_node_bound(len, 1));
        prop_assert!(variant_node_bound(len, 1) <= variant_node_bound(len, 2));
    }
}

#[test]
fn literal_and_complement_kinds_pair_to_fixed_sums() {
    for kind in AnchorKind::ALL {
        let sum = kind.code() + kind.paired().code();
        if kind.is_motif() {
            assert_eq!(sum, AnchorKind::MOTIF_PAIR_SUM, "{kind:?}");
        } else {
            assert_eq!(sum, AnchorKind::FLANK_PAIR_SUM, "{kind:?}");
        }
        assert_eq!(kind.paired().paired(), kind);
    }
}

#[test]
fn reverse_complement_words_carry_the_paired_code() {
    let locus = Locus::new("L1", "AACCG", "TTGGC", "AT", 2, 0).unwrap();
    let index = TrieIndex::build(std::slice::from_ref(&locus), 0, 0).unwrap();
    for (kind, word) in [
        (AnchorKind::ForwardAnchor, b"AACCG"),
        (AnchorKind::ReverseAnchor, b"TTGGC"),
    ] {
        let rc = reverse_complement_text(word).unwrap();
        let paired = AnchorKind::from_code(AnchorKind::FLANK_PAIR_SUM - kind.code()).unwrap();
        assert!(index.exists_match(word, 5, 0, kind));
        assert!(index.exists_match(&rc, 5, 0, paired), "{kind:?}");
        assert!(!index.exists_match(&rc, 5, 0, kind));
    }
}

#[test]
fn distances_outside_supported_range_are_rejected() {
    let locus = Locus::new("P", "AACCG", "TTGGC", "AT", 2, 0).unwrap();
    assert!(matches!(
        TrieIndex::build(std::slice::from_ref(&locus), 3, 0),
        Err(IndexError::AnchorDistance(3))
    ));
    assert!(matches!(
        TrieIndex::build(&[locus], 1, 2),
        Err(IndexError::MotifDistance(2))
    ));
}

#[test]
fn ambiguity_code_expands_to_both_bases() {
    let locus = Locus::new("P", "AACRG", "TTGGC", "AT", 2, 0).unwrap();
    let index = TrieIndex::build(&[locus], 0, 0).unwrap();
    assert!(index.exists_match(b"AACAG", 5, 0, AnchorKind::ForwardAnchor));
    assert!(index.exists_match(b"AACGG", 5, 0, AnchorKind::ForwardAnchor));
    assert!(!index.exists_match(b"AACCG", 5, 0, AnchorKind::ForwardAnchor));
}

#[test]
fn two_ambiguity_codes_in_one_anchor_are_rejected() {
    let locus = Locus::new("P", "ARCYG", "TTGGC", "AT", 2, 0).unwrap();
    assert!(matches!(
        TrieIndex::build(&[locus], 0, 0),
        Err(IndexError::TooManyAmbiguityCodes { found: 2, .. })
    ));
}
