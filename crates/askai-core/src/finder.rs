//! Map a free-text snippet back to the paragraphs it most likely came from.
//!
//! The snippet is matched greedily: find the longest contiguous run of its words
//! that some paragraph contains, record where it was found, then continue with the
//! words after that run. Search-engine snippets are often several sentence
//! fragments glued together, and each fragment lands in its own round.
//!
//! Two guards keep common phrases from producing noise:
//! - a single round that matches more than `part_in_too_many_paragraphs`
//!   paragraphs is dropped, except that it may extend the previous round by the one
//!   paragraph directly following it;
//! - a final result spanning more than `discard_if_paragraph_count_above`
//!   paragraphs is discarded as a whole (likely a list or table, not prose).

use crate::matcher::find_longest_match;
use crate::normalize::{normalize, words};
use crate::parnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const WARN_TOO_MANY_PARAGRAPHS: &str = "too_many_paragraphs";
pub const WARN_RESULT_DISCARDED: &str = "result_discarded_too_many_paragraphs";
pub const WARN_ITERATION_LIMIT: &str = "iteration_limit_reached";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindParagraphLimits {
    /// Maximum number of matcher rounds per snippet.
    pub max_rounds: usize,
    /// A round found in more paragraphs than this is treated as a common phrase.
    pub part_in_too_many_paragraphs: usize,
    /// Final results with more paragraphs than this are returned with a warning.
    pub warn_if_paragraph_count_above: usize,
    /// Final results with more paragraphs than this are discarded.
    pub discard_if_paragraph_count_above: usize,
    /// Drop leading snippet words that no paragraph contains instead of stopping.
    pub skip_unmatched_words: bool,
}

impl Default for FindParagraphLimits {
    fn default() -> Self {
        Self {
            max_rounds: 50,
            part_in_too_many_paragraphs: 5,
            warn_if_paragraph_count_above: 7,
            discard_if_paragraph_count_above: 12,
            skip_unmatched_words: false,
        }
    }
}

/// One accepted round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchPart {
    pub query: String,
    pub par_numbers: Vec<usize>,
    /// Paragraphs appended from later, over-broad rounds (adjacency rescue), in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rescued: Vec<usize>,
    pub leftover_words: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FindOutcome {
    /// Final paragraph numbers, sorted and unique. Empty when discarded.
    pub par_numbers: Vec<usize>,
    /// `par_numbers` as a range string, e.g. `"1-3,7"`.
    pub packed: String,
    /// Distinct paragraphs matched before the discard check.
    pub matched_count: usize,
    pub discarded: bool,
    pub rounds: usize,
    pub parts: Vec<MatchPart>,
    pub warnings: Vec<&'static str>,
}

impl FindOutcome {
    pub fn is_found(&self) -> bool {
        !self.packed.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SnippetFinder {
    limits: FindParagraphLimits,
}

impl SnippetFinder {
    pub fn new(limits: FindParagraphLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &FindParagraphLimits {
        &self.limits
    }

    pub fn find(&self, text_to_find: &str, paragraphs: &[String]) -> FindOutcome {
        self.find_on_page("", text_to_find, paragraphs)
    }

    /// Like [`SnippetFinder::find`], with `page` attached to the emitted log events.
    pub fn find_on_page(&self, page: &str, text_to_find: &str, paragraphs: &[String]) -> FindOutcome {
        if text_to_find.is_empty() || paragraphs.is_empty() {
            return FindOutcome::default();
        }

        let snippet = normalize(text_to_find);
        let normalized: Vec<String> = paragraphs.iter().map(|p| normalize(p)).collect();
        let all_words = words(&snippet);

        let mut out = FindOutcome::default();
        let mut leftover: &[String] = &all_words;
        while !leftover.is_empty() {
            if out.rounds >= self.limits.max_rounds {
                out.warnings.push(WARN_ITERATION_LIMIT);
                break;
            }
            out.rounds += 1;

            let Some(m) =
                find_longest_match(leftover, &normalized, self.limits.skip_unmatched_words)
            else {
                break;
            };

            if m.paragraphs.len() <= self.limits.part_in_too_many_paragraphs {
                out.parts.push(MatchPart {
                    query: m.query,
                    par_numbers: m.paragraphs,
                    rescued: Vec::new(),
                    leftover_words: m.leftover.len(),
                });
            } else if let Some(prev) = out.parts.last_mut() {
                // Too broad to be useful on its own, but a continuation into the
                // next paragraph is still a good signal.
                if let Some(&last) = prev.par_numbers.last() {
                    let next = last + 1;
                    if m.paragraphs.binary_search(&next).is_ok() {
                        prev.par_numbers.push(next);
                        prev.rescued.push(next);
                    }
                }
            }

            leftover = m.leftover;
        }

        let unique: BTreeSet<usize> = out
            .parts
            .iter()
            .flat_map(|p| p.par_numbers.iter().copied())
            .collect();
        out.matched_count = unique.len();
        out.par_numbers = unique.into_iter().collect();
        out.packed = parnum::pack(&out.par_numbers);

        let debug_info = out
            .parts
            .iter()
            .map(|p| {
                format!(
                    "query={:?} par_numbers=[{}] leftover_words={}",
                    p.query,
                    parnum::pack(&p.par_numbers),
                    p.leftover_words
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        tracing::info!(
            target: "findpar",
            page,
            snippet = %snippet,
            count = out.matched_count,
            par_numbers = %out.packed,
            rounds = out.rounds,
            parts = %debug_info,
            "findpar: snippet matched"
        );

        if out.matched_count > self.limits.discard_if_paragraph_count_above {
            tracing::error!(
                target: "findpar",
                page,
                snippet = %snippet,
                count = out.matched_count,
                "findpar: too many paragraphs found; result discarded"
            );
            out.warnings.push(WARN_RESULT_DISCARDED);
            out.discarded = true;
            out.par_numbers.clear();
            out.packed.clear();
        } else if out.matched_count > self.limits.warn_if_paragraph_count_above {
            tracing::warn!(
                target: "findpar",
                page,
                snippet = %snippet,
                count = out.matched_count,
                "findpar: too many paragraphs found"
            );
            out.warnings.push(WARN_TOO_MANY_PARAGRAPHS);
        }

        out
    }
}

/// Range string of the paragraphs that likely contain `text_to_find`, or `""`.
pub fn find_snippet(text_to_find: &str, paragraphs: &[String]) -> String {
    SnippetFinder::default().find(text_to_find, paragraphs).packed
}
