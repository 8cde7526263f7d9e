use askai_core::{
    Error, FindParagraphLimits, FindParagraphsRequest, FindParagraphsResponse, ParagraphSource,
    Result, SnippetFinder,
};
use futures_util::future::try_join_all;

/// Look up each page's snippet on that page.
///
/// Pages are fetched concurrently; any retrieval failure fails the whole batch.
/// `found` holds `"<page>#p<range>"`, `notfound` the page names with no usable
/// match, both in page-name order.
pub async fn find_paragraphs(
    source: &dyn ParagraphSource,
    request: &FindParagraphsRequest,
    limits: FindParagraphLimits,
) -> Result<FindParagraphsResponse> {
    if let Some(bad) = request.pages.keys().find(|p| p.trim().is_empty()) {
        return Err(Error::InvalidPage(format!("{bad:?}: empty page name")));
    }

    let fetches = request.pages.keys().map(|page| source.paragraphs(page));
    let pages = try_join_all(fetches).await?;

    let finder = SnippetFinder::new(limits);
    let mut out = FindParagraphsResponse::default();
    for ((page, snippet), paragraphs) in request.pages.iter().zip(pages) {
        let outcome = finder.find_on_page(page, snippet, &paragraphs);
        if !outcome.warnings.is_empty() {
            out.warnings.insert(
                page.clone(),
                outcome.warnings.iter().map(|w| w.to_string()).collect(),
            );
        }
        if outcome.is_found() {
            out.found.push(format!("{page}#p{}", outcome.packed));
        } else {
            out.notfound.push(page.clone());
        }
    }
    Ok(out)
}
