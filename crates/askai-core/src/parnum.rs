//! Compact paragraph-number lists, e.g. `"1-7,10-12,15"`.
//!
//! Grammar: `^([0-9]+(-[0-9]+)?)(,[0-9]+(-[0-9]+)?)*$`. The empty string is the
//! packed form of the empty set.

use crate::{Error, Result};
use std::collections::BTreeSet;

/// Upper bound on how many indices a single range string may expand to.
pub const MAX_UNPACKED_INDICES: usize = 100_000;

/// Expand a range string into paragraph numbers, in the order written.
///
/// Ranges expand low to high; a descending range like `"5-3"` is grammatical and
/// expands to nothing. Duplicates are kept. Any token that is not `N` or `N-M`
/// (digits only) is rejected with [`Error::InvalidRange`].
pub fn unpack(packed: &str) -> Result<Vec<usize>> {
    if packed.is_empty() {
        return Ok(Vec::new());
    }

    let mut out = Vec::new();
    for token in packed.split(',') {
        let (start, end) = match token.split_once('-') {
            Some((a, b)) => (parse_index(a, packed)?, parse_index(b, packed)?),
            None => {
                let n = parse_index(token, packed)?;
                (n, n)
            }
        };
        // `end - start + 1` indices must fit in what is left of the budget.
        let remaining = MAX_UNPACKED_INDICES.saturating_sub(out.len());
        if end >= start && end - start >= remaining {
            return Err(Error::InvalidRange(format!(
                "{packed:?} expands to more than {MAX_UNPACKED_INDICES} paragraphs"
            )));
        }
        out.extend(start..=end);
    }
    Ok(out)
}

fn parse_index(digits: &str, whole: &str) -> Result<usize> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidRange(format!(
            "{whole:?}: expected a paragraph number, got {digits:?}"
        )));
    }
    digits
        .parse::<usize>()
        .map_err(|e| Error::InvalidRange(format!("{whole:?}: {e}")))
}

/// Compress paragraph numbers into the shortest range string.
///
/// Consecutive runs are coalesced greedily in input order: a run of one is written
/// as `N`, a run of two as `N,N+1`, and longer runs as `start-end`. Callers that
/// want set semantics should go through [`pack_set`].
pub fn pack(indices: &[usize]) -> String {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for &n in indices {
        match runs.last_mut() {
            Some((_, end)) if end.checked_add(1) == Some(n) => *end = n,
            _ => runs.push((n, n)),
        }
    }

    runs.iter()
        .map(|&(start, end)| match end - start {
            0 => start.to_string(),
            1 => format!("{start},{end}"),
            _ => format!("{start}-{end}"),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Sort, dedupe and pack.
pub fn pack_set(indices: impl IntoIterator<Item = usize>) -> String {
    let sorted: Vec<usize> = indices.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
    pack(&sorted)
}

/// True if `s` only uses the characters a range string can contain.
///
/// This is the loose predicate used to recognize paragraph fragments in page
/// references; [`unpack`] still validates the structure.
pub fn looks_like_range(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().any(|b| b.is_ascii_digit())
        && s.bytes().all(|b| b.is_ascii_digit() || b == b',' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pack_writes_singles_pairs_and_ranges() {
        assert_eq!(pack(&[]), "");
        assert_eq!(pack(&[5]), "5");
        assert_eq!(pack(&[5, 6]), "5,6");
        assert_eq!(pack(&[5, 6, 7]), "5-7");
        assert_eq!(pack(&[1, 2, 3, 5, 7, 8, 9]), "1-3,5,7-9");
        assert_eq!(pack(&[1, 2, 3, 4, 5, 6, 7, 10, 11, 12, 15]), "1-7,10-12,15");
    }

    #[test]
    fn pack_does_not_reorder_unsorted_input() {
        assert_eq!(pack(&[3, 1, 2]), "3,1,2");
        assert_eq!(pack_set([3, 1, 2, 2]), "1-3");
    }

    #[test]
    fn unpack_expands_ranges_in_written_order() {
        assert_eq!(
            unpack("1-7,10-12,15").unwrap(),
            vec![1, 2, 3, 4, 5, 6, 7, 10, 11, 12, 15]
        );
        assert_eq!(unpack("4,2,4").unwrap(), vec![4, 2, 4]);
        assert_eq!(unpack("0").unwrap(), vec![0]);
        assert!(unpack("").unwrap().is_empty());
    }

    #[test]
    fn unpack_descending_range_expands_to_nothing() {
        assert_eq!(unpack("5-3,8").unwrap(), vec![8]);
    }

    #[test]
    fn unpack_rejects_malformed_tokens_instead_of_reading_zero() {
        for bad in ["abc", "1,,2", "1-", "-3", "1-2-3", " 1", "1,x", "p1", "1.5"] {
            let err = unpack(bad).unwrap_err();
            assert!(
                matches!(err, Error::InvalidRange(_)),
                "expected InvalidRange for {bad:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn unpack_bounds_huge_ranges() {
        assert!(matches!(
            unpack("0-18446744073709551615"),
            Err(Error::InvalidRange(_))
        ));
    }

    #[test]
    fn unpack_bounds_huge_ranges_after_the_first_token() {
        for packed in ["1,0-18446744073709551615", "5,7,3-18446744073709551615"] {
            assert!(
                matches!(unpack(packed), Err(Error::InvalidRange(_))),
                "expected InvalidRange for {packed:?}"
            );
        }
    }

    #[test]
    fn unpack_budget_is_exact() {
        let fits = format!("0-{}", MAX_UNPACKED_INDICES - 1);
        assert_eq!(unpack(&fits).unwrap().len(), MAX_UNPACKED_INDICES);
        let over = format!("0,1-{}", MAX_UNPACKED_INDICES);
        assert!(matches!(unpack(&over), Err(Error::InvalidRange(_))));
    }

    #[test]
    fn looks_like_range_accepts_only_range_characters() {
        assert!(looks_like_range("1-7,10"));
        assert!(!looks_like_range(""));
        assert!(!looks_like_range("-,"));
        assert!(!looks_like_range("intro"));
    }

    proptest! {
        #[test]
        fn unpack_of_pack_is_sorted_unique_set(
            set in prop::collection::vec(0usize..500, 1..80),
        ) {
            let packed = pack_set(set.iter().copied());
            let mut expected = set.clone();
            expected.sort_unstable();
            expected.dedup();
            prop_assert_eq!(unpack(&packed).unwrap(), expected);
        }

        #[test]
        fn packed_ranges_are_maximal(
            set in prop::collection::btree_set(0usize..200, 1..60),
        ) {
            let packed = pack_set(set.iter().copied());
            // Adjacent tokens never describe touching runs.
            let mut prev_end: Option<usize> = None;
            let mut prev_was_pair_head = false;
            for token in packed.split(',') {
                let (start, end) = match token.split_once('-') {
                    Some((a, b)) => (a.parse::<usize>().unwrap(), b.parse::<usize>().unwrap()),
                    None => {
                        let n = token.parse::<usize>().unwrap();
                        (n, n)
                    }
                };
                if let Some(pe) = prev_end {
                    // "a,b" pairs are the one place where neighbours are consecutive.
                    if start == pe + 1 {
                        prop_assert!(prev_was_pair_head, "non-maximal run in {}", packed);
                        prev_was_pair_head = false;
                    } else {
                        prev_was_pair_head = start == end && set.contains(&(start + 1))
                            && !token.contains('-');
                    }
                } else {
                    prev_was_pair_head = start == end && set.contains(&(start + 1));
                }
                prev_end = Some(end);
            }
        }
    }
}
