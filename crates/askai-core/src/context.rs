//! Assembling context extracts for AI instructions.

use crate::SourceReference;

/// Paragraphs selected by `reference` from a page's full paragraph list.
///
/// A whole-page reference selects everything. Paragraph numbers past the end of
/// the page are skipped; the rest keep ascending order.
pub fn select_paragraphs(all: &[String], reference: &SourceReference) -> Vec<String> {
    match &reference.paragraphs {
        None => all.to_vec(),
        Some(indices) => indices.iter().filter_map(|&i| all.get(i).cloned()).collect(),
    }
}

/// `"Source #<number>: <label>"` followed by the paragraphs, blank-line separated.
pub fn format_extract(number: usize, label: &str, paragraphs: &[String]) -> String {
    format!("Source #{number}: {label}\n\n{}", paragraphs.join("\n\n"))
}

/// Instructions followed by every extract, blank-line separated.
pub fn compose_instructions(instructions: &str, extracts: &[String]) -> String {
    if extracts.is_empty() {
        return instructions.to_string();
    }
    format!("{instructions}\n\n{}", extracts.join("\n\n"))
}
