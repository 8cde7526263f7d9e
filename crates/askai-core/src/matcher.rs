//! Longest contiguous word-run search over a set of paragraphs.
//!
//! Starting at the first word of `words`, the query grows one word at a time while
//! at least one candidate paragraph still contains it as a literal substring. Each
//! extension can only narrow the candidate set. The result is the longest query
//! reached, the paragraphs containing it, and the words that were not consumed.
//!
//! This is the iterative form of a "consume a word, filter, recurse, fall back to
//! the current level" search; every step strictly shrinks the remaining words, so
//! the loop is bounded by `words.len()`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult<'w> {
    /// Contiguous words that were found, joined by single spaces.
    pub query: String,
    /// Indices (into the paragraph slice) of the paragraphs containing `query`, ascending.
    pub paragraphs: Vec<usize>,
    /// Words after the matched run.
    pub leftover: &'w [String],
}

/// Find the longest run of words, starting at `words[0]`, that some paragraph contains.
///
/// `paragraphs` must already be normalized. With `skip_unmatched`, leading words
/// that no paragraph contains are dropped until one matches; otherwise the first
/// such word ends the search with `None`.
pub fn find_longest_match<'w>(
    words: &'w [String],
    paragraphs: &[String],
    skip_unmatched: bool,
) -> Option<MatchResult<'w>> {
    let all: Vec<usize> = (0..paragraphs.len()).collect();
    find_longest_match_from(words, paragraphs, &all, "", skip_unmatched)
}

/// Continue a match: extend `prior_query` with `words`, searching only `candidates`.
///
/// When `prior_query` is non-empty and the very first extension fails, there is
/// nothing to fall back to at this level and the result is `None`; word skipping
/// only applies to a fresh search.
pub fn find_longest_match_from<'w>(
    words: &'w [String],
    paragraphs: &[String],
    candidates: &[usize],
    prior_query: &str,
    skip_unmatched: bool,
) -> Option<MatchResult<'w>> {
    let mut start = 0usize;
    loop {
        let word = words.get(start)?;
        let query = join_query(prior_query, word);
        let found = containing(paragraphs, candidates, &query);
        if !found.is_empty() {
            return Some(extend(words, start + 1, paragraphs, query, found));
        }
        if !prior_query.is_empty() || !skip_unmatched {
            return None;
        }
        start += 1;
    }
}

fn extend<'w>(
    words: &'w [String],
    mut next: usize,
    paragraphs: &[String],
    mut query: String,
    mut found: Vec<usize>,
) -> MatchResult<'w> {
    while let Some(word) = words.get(next) {
        let longer = join_query(&query, word);
        let narrowed = containing(paragraphs, &found, &longer);
        if narrowed.is_empty() {
            break;
        }
        query = longer;
        found = narrowed;
        next += 1;
    }
    MatchResult {
        query,
        paragraphs: found,
        leftover: &words[next..],
    }
}

fn join_query(prior: &str, word: &str) -> String {
    if prior.is_empty() {
        word.to_string()
    } else {
        format!("{prior} {word}")
    }
}

fn containing(paragraphs: &[String], candidates: &[usize], query: &str) -> Vec<usize> {
    candidates
        .iter()
        .copied()
        .filter(|&i| paragraphs.get(i).is_some_and(|p| p.contains(query)))
        .collect()
}
