/// Plain text of every `<p>` element, in document order.
///
/// Each entry is the element's text content (inline markup dropped), trimmed.
/// Empty paragraphs are kept so that index `n` always refers to the `n`-th `<p>`
/// of the rendered page, which is what paragraph anchors point at.
pub fn paragraphs_from_html(html: &str) -> Vec<String> {
    let doc = html_scraper::Html::parse_document(html);
    let Ok(sel) = html_scraper::Selector::parse("p") else {
        return Vec::new();
    };
    doc.select(&sel)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .collect()
}
