//! Text normalization applied to both snippets and paragraphs before matching.
//!
//! Search engines drop or re-quote quotation marks in their snippets, and rendered
//! paragraphs carry arbitrary line breaks. Both sides go through [`normalize`] so
//! neither difference causes a miss.

/// Remove `"` and `'`, then collapse every whitespace run to a single space.
///
/// Leading/trailing whitespace is collapsed, not trimmed.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch == '"' || ch == '\'' {
            continue;
        }
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
            continue;
        }
        out.push(ch);
        in_space = false;
    }
    out
}

/// Split normalized text into the word sequence the matcher consumes.
pub fn words(normalized: &str) -> Vec<String> {
    normalized.split_whitespace().map(str::to_string).collect()
}
