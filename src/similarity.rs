//! Column-name similarity.
//!
//! Names are normalized (lower-cased, punctuation treated as a separator,
//! whitespace collapsed) and compared with a Levenshtein ratio:
//! `1 - distance / max(len_a, len_b)`, measured in characters.
//!
//! Abbreviated headers ("Dept" for "Department") lose most of their ratio to
//! the length difference alone, so when one name is at least
//! [`PARTIAL_LENGTH_RATIO`] times longer than the other the shorter one is
//! also compared against every equally long window of the longer one. That
//! partial score is discounted by [`PARTIAL_WEIGHT`] and the higher of the
//! two scores wins.

use rapidfuzz::distance::levenshtein;

pub const PARTIAL_LENGTH_RATIO: f64 = 1.5;
pub const PARTIAL_WEIGHT: f64 = 0.9;

/// Similarity of two column names in `[0, 1]`.
///
/// Symmetric, and `score(a, a) == 1.0` for every `a` (including the empty
/// string). A blank name scores `0.0` against any non-blank one.
pub fn score(a: &str, b: &str) -> f64 {
    let left = normalize(a).chars().collect::<Vec<_>>();
    let right = normalize(b).chars().collect::<Vec<_>>();
    let (shorter, longer) = if left.len() <= right.len() {
        (&left, &right)
    } else {
        (&right, &left)
    };
    if longer.is_empty() {
        return 1.0;
    }
    if shorter.is_empty() {
        return 0.0;
    }

    let full = ratio(shorter, longer);
    if (longer.len() as f64) < shorter.len() as f64 * PARTIAL_LENGTH_RATIO {
        return full;
    }
    let partial = longer
        .windows(shorter.len())
        .map(|window| ratio(shorter, window))
        .fold(0.0_f64, f64::max);
    full.max(partial * PARTIAL_WEIGHT)
}

fn ratio(a: &[char], b: &[char]) -> f64 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    let distance = levenshtein::distance(a.iter().copied(), b.iter().copied());
    1.0 - distance as f64 / longest as f64
}

/// Lower-cases, replaces punctuation with spaces and collapses whitespace.
pub fn normalize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalize_collapses_separators() {
        assert_eq!(normalize("  Order_ID "), "order id");
        assert_eq!(normalize("first-name.v2"), "first name v2");
        assert_eq!(normalize("Dept / Team"), "dept team");
    }

    #[test]
    fn identical_after_normalization_scores_one() {
        assert_eq!(score("Order ID", "order_id"), 1.0);
        assert_eq!(score("", ""), 1.0);
    }

    #[test]
    fn empty_against_non_empty_scores_zero() {
        assert_eq!(score("", "x"), 0.0);
        assert_eq!(score("x", ""), 0.0);
        assert_eq!(score("---", "id"), 0.0);
    }

    #[test]
    fn similar_lengths_use_plain_ratio() {
        // "cust name" -> "customer name": four insertions over thirteen characters.
        let value = score("Cust Name", "Customer Name");
        assert!((value - (1.0 - 4.0 / 13.0)).abs() < 1e-9, "got {value}");
    }

    #[test]
    fn abbreviations_use_discounted_window_match() {
        // Plain ratio is 0.4; the best window "depa" is one edit away.
        let value = score("Dept", "Department");
        assert!((value - 0.75 * PARTIAL_WEIGHT).abs() < 1e-9, "got {value}");
        assert!(value >= 0.6);
    }

    #[test]
    fn unrelated_names_score_low() {
        assert!(score("Phone", "Address") < 0.3);
        assert!(score("Dept", "ID") < 0.3);
    }

    proptest! {
        #[test]
        fn score_is_symmetric(a in "[A-Za-z _-]{0,12}", b in "[A-Za-z _-]{0,12}") {
            prop_assert_eq!(score(&a, &b), score(&b, &a));
        }

        #[test]
        fn score_is_reflexive_and_bounded(a in "\\PC{0,16}", b in "\\PC{0,16}") {
            prop_assert_eq!(score(&a, &a), 1.0);
            let value = score(&a, &b);
            prop_assert!((0.0..=1.0).contains(&value));
        }
    }
}
