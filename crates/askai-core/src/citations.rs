//! Turn `(Source #N)` citations in an AI response back into page references.
//!
//! Context extracts are numbered by their position in the caller's page list, so a
//! response citing `(Source #2)` or just `(2)` refers to the second entry of that
//! list. Numbers outside the list are left as they are.

use crate::SourceReference;
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn citation_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((?:Source #)?([0-9]+)\)").ok())
        .as_ref()
}

/// Anchors a citation expands to: one `Page#par<start>` per range token, or the
/// bare page name for whole-page references.
pub fn citation_targets(reference: &SourceReference) -> Vec<String> {
    let Some(range) = reference.range_string().filter(|r| !r.is_empty()) else {
        return vec![reference.page.clone()];
    };
    range
        .split(',')
        .map(|token| {
            let start = token.split('-').next().unwrap_or(token);
            format!("{}#par{start}", reference.page)
        })
        .collect()
}

pub fn link_citations(response: &str, sources: &[SourceReference]) -> String {
    link_citations_with(response, |i| sources.get(i))
}

/// Like [`link_citations`], with `lookup(i)` giving the source at zero-based position `i`.
pub fn link_citations_with<'s, F>(response: &str, lookup: F) -> String
where
    F: Fn(usize) -> Option<&'s SourceReference>,
{
    let Some(re) = citation_re() else {
        return response.to_string();
    };
    re.replace_all(response, |caps: &Captures<'_>| {
        let target = caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(&lookup);
        match target {
            Some(r) => format!("({})", citation_targets(r).join(", ")),
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}
