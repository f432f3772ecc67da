//! Small utility arithmetic shared by the attack and locking engines:
//! bit-vector <-> integer conversions, literal negation (see
//! [`crate::tseytin::Literal::negate`]), and success-rate scoring.

use bitvec::prelude::*;

/// `val` as a big-endian bit vector of exactly `val_len` bits.
pub fn binlist(val: u64, val_len: usize) -> Vec<bool> {
    let bits = val.view_bits::<Msb0>();
    let start = bits.len() - val_len;
    bits[start..].iter().by_vals().collect()
}

/// Every bit vector of length `val_len`, in ascending numeric order.
pub fn generate_binlist(val_len: usize) -> impl Iterator<Item = Vec<bool>> {
    let total = 1u64 << val_len;
    (0..total).map(move |v| binlist(v, val_len))
}

/// Bitwise agreement between `correct_key` and `estimated_key`, as a
/// percentage in `[0.0, 100.0]`.
pub fn success_rate(correct_key: &[bool], estimated_key: &[bool]) -> f64 {
    debug_assert_eq!(correct_key.len(), estimated_key.len());
    let matches = correct_key
        .iter()
        .zip(estimated_key.iter())
        .filter(|(a, b)| a == b)
        .count();
    matches as f64 / correct_key.len() as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binlist_matches_binary_expansion() {
        assert_eq!(binlist(0, 3), vec![false, false, false]);
        assert_eq!(binlist(5, 3), vec![true, false, true]);
        assert_eq!(binlist(1, 4), vec![false, false, false, true]);
    }

    #[test]
    fn generate_binlist_covers_every_combination() {
        let all: Vec<Vec<bool>> = generate_binlist(3).collect();
        assert_eq!(all.len(), 8);
        assert_eq!(all[0], vec![false, false, false]);
        assert_eq!(all[7], vec![true, true, true]);
    }

    #[test]
    fn success_rate_counts_bitwise_matches() {
        let correct = vec![true, false, true, true];
        let estimated = vec![true, true, true, false];
        assert_eq!(success_rate(&correct, &estimated), 50.0);
        assert_eq!(success_rate(&correct, &correct), 100.0);
    }
}
