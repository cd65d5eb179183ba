//! Sliding-window fragment matching between two fingerprint sequences.
//!
//! A shorter sequence is slid across every contiguous window of the longer
//! one; the best window's share of matching frames is the similarity. This
//! catches clips cut from a longer source as well as full re-encodes.

use crate::core::perceptual::PerceptualHash;

/// Maximum share of frames in `short` that match the best-aligned window of
/// `long`.
///
/// Two frames match when their Hamming distance is strictly below
/// `threshold`. The arguments may be passed in either order; the longer
/// sequence is picked internally. Returns 0.0 when either side is empty.
pub fn max_similarity(long: &[PerceptualHash], short: &[PerceptualHash], threshold: u32) -> f64 {
    if long.is_empty() || short.is_empty() {
        return 0.0;
    }

    let (long, short) = if long.len() >= short.len() {
        (long, short)
    } else {
        (short, long)
    };

    let short_len = short.len();
    let mut max_rate = 0.0;

    for offset in 0..=long.len() - short_len {
        let window = &long[offset..offset + short_len];
        let matched = window
            .iter()
            .zip(short)
            .filter(|(a, b)| a.distance(b) < threshold)
            .count();

        let rate = matched as f64 / short_len as f64;
        if rate > max_rate {
            max_rate = rate;
        }
        if max_rate >= 1.0 {
            break;
        }
    }

    max_rate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(bits: &[u64]) -> Vec<PerceptualHash> {
        bits.iter().copied().map(PerceptualHash::new).collect()
    }

    #[test]
    fn test_empty_sequences_score_zero() {
        let a = seq(&[1, 2, 3]);
        assert_eq!(max_similarity(&a, &[], 5), 0.0);
        assert_eq!(max_similarity(&[], &a, 5), 0.0);
        assert_eq!(max_similarity(&[], &[], 5), 0.0);
    }

    #[test]
    fn test_self_similarity_is_perfect() {
        let a = seq(&[0xff, 0xff00, 0xff_0000, 0x1234_5678]);
        assert_eq!(max_similarity(&a, &a, 1), 1.0);
        assert_eq!(max_similarity(&a, &a, 5), 1.0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let a = seq(&[0b0000]);
        let b = seq(&[0b0111]);
        assert_eq!(max_similarity(&a, &b, 3), 0.0);
        assert_eq!(max_similarity(&a, &b, 4), 1.0);
        assert_eq!(max_similarity(&a, &a, 0), 0.0);
    }

    #[test]
    fn test_argument_order_does_not_matter() {
        let long = seq(&[10, 20, 30, 40, 50, 60]);
        let short = seq(&[30, 41, 0xffff_0000]);
        let forward = max_similarity(&long, &short, 2);
        let backward = max_similarity(&short, &long, 2);
        assert_eq!(forward, backward);
        assert!((forward - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_clip_matches_inside_longer_sequence() {
        let source: Vec<PerceptualHash> = (0..12u64)
            .map(|i| PerceptualHash::new(0xf0f0_f0f0_u64.rotate_left(i as u32 * 5)))
            .collect();
        let clip = source[4..8].to_vec();
        assert_eq!(max_similarity(&source, &clip, 1), 1.0);
    }

    #[test]
    fn test_equal_lengths_compare_pairwise() {
        let a = seq(&[0, 0, 0, 0]);
        let b = seq(&[0, u64::MAX, 0, u64::MAX]);
        assert_eq!(max_similarity(&a, &b, 5), 0.5);
    }

    #[test]
    fn test_best_window_wins() {
        let long = seq(&[u64::MAX, 1, 2, u64::MAX, 7, 8, 9]);
        let short = seq(&[7, 8, 9]);
        assert_eq!(max_similarity(&long, &short, 1), 1.0);

        let partial = seq(&[1, 2, 0xffff]);
        assert!((max_similarity(&long, &partial, 1) - 2.0 / 3.0).abs() < 1e-12);
    }
}
