//! Property-based tests using proptest.
//!
//! These verify invariants the specification calls out explicitly: jump
//! symmetry, the correction budget ceiling, and packed-sequence edit
//! round trips, across randomly generated inputs rather than hand-picked
//! examples.

use pollux_rs::discontinuity::is_jump;
use pollux_rs::packed::{Base, PackedSequence};
use pollux_rs::record::max_corrections;
use proptest::prelude::*;

fn base() -> impl Strategy<Value = Base> {
    prop_oneof![
        Just(Base::A),
        Just(Base::G),
        Just(Base::C),
        Just(Base::T),
    ]
}

fn bases(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<Base>> {
    proptest::collection::vec(base(), min_len..=max_len)
}

proptest! {
    /// `is_jump` is symmetric in its two arguments.
    #[test]
    fn is_jump_is_symmetric(a in 0u32..10_000, b in 0u32..10_000) {
        prop_assert_eq!(is_jump(a, b), is_jump(b, a));
    }

    /// Packing a sequence of bases and reading each position back gives
    /// the original base, regardless of length.
    #[test]
    fn pack_then_get_base_round_trips(bs in bases(1, 200)) {
        let seq = PackedSequence::from_bases(&bs);
        for (pos, &b) in bs.iter().enumerate() {
            prop_assert_eq!(seq.get_base(pos), b);
        }
    }

    /// Reverse-complementing twice returns the original sequence.
    #[test]
    fn reverse_complement_is_involutive(bs in bases(1, 200)) {
        let seq = PackedSequence::from_bases(&bs);
        let rc = seq.reverse_complement();
        let rc_rc = rc.reverse_complement();
        prop_assert_eq!(seq.len(), rc_rc.len());
        for pos in 0..seq.len() {
            prop_assert_eq!(seq.get_base(pos), rc_rc.get_base(pos));
        }
    }

    /// Inserting a base then deleting it at the same position restores the
    /// original sequence.
    #[test]
    fn insert_then_delete_is_identity(bs in bases(1, 100), pos_seed in 0u32..1000, new_base in base()) {
        let mut seq = PackedSequence::from_bases(&bs);
        let pos = (pos_seed as usize) % (seq.len() + 1);
        seq.insert(pos, new_base);
        prop_assert_eq!(seq.len(), bs.len() + 1);
        seq.delete(pos);
        prop_assert_eq!(seq.len(), bs.len());
        for (p, &b) in bs.iter().enumerate() {
            prop_assert_eq!(seq.get_base(p), b);
        }
    }

    /// Deleting then re-inserting the same base at the same position
    /// restores the original sequence.
    #[test]
    fn delete_then_insert_is_identity(bs in bases(2, 100), pos_seed in 0u32..1000) {
        let mut seq = PackedSequence::from_bases(&bs);
        let pos = (pos_seed as usize) % seq.len();
        let removed = seq.get_base(pos);
        seq.delete(pos);
        prop_assert_eq!(seq.len(), bs.len() - 1);
        seq.insert(pos, removed);
        prop_assert_eq!(seq.len(), bs.len());
        for (p, &b) in bs.iter().enumerate() {
            prop_assert_eq!(seq.get_base(p), b);
        }
    }

    /// The correction budget is always at least 30 and grows linearly
    /// with read length past that floor, for any read length.
    #[test]
    fn max_corrections_never_below_floor(length in 0usize..100_000) {
        prop_assert!(max_corrections(length) >= 30);
    }

    /// A k-mer extracted from a packed sequence, then unpacked back to a
    /// string, reproduces the original bases at that window.
    #[test]
    fn get_kmer_then_unpack_round_trips(bs in bases(4, 64)) {
        let seq = PackedSequence::from_bases(&bs);
        let k = 4.min(bs.len());
        prop_assume!(k >= 1 && seq.len() >= k);
        for start in 0..=(seq.len() - k) {
            let kmer = seq.get_kmer(start, start + k);
            let k_len = pollux_rs::kmer::KmerLength::new(k).unwrap();
            let unpacked = pollux_rs::kmer::unpack_to_string(kmer, k_len);
            let expected: String = bs[start..start + k].iter().map(|b| b.to_ascii() as char).collect();
            prop_assert_eq!(unpacked, expected);
        }
    }
}
