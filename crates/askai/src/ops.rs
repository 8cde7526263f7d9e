//! Operations shared by the CLI and the MCP server. Each returns a JSON payload
//! (without envelope fields) or a domain error.

use crate::envelope::warning_hints_from;
use askai_core::{
    parnum, AiBackend, FindParagraphLimits, FindParagraphsRequest, ParagraphSource, Result,
    SnippetFinder,
};
use askai_local::query::ContextExtracts;
use askai_local::AiQuery;
use std::sync::Arc;

pub(crate) async fn find_paragraph(
    source: &dyn ParagraphSource,
    page: &str,
    snippet: &str,
    limits: FindParagraphLimits,
) -> Result<serde_json::Value> {
    if page.trim().is_empty() {
        return Err(askai_core::Error::InvalidPage("empty page name".to_string()));
    }
    let paragraphs = source.paragraphs(page).await?;
    let outcome = SnippetFinder::new(limits).find_on_page(page, snippet, &paragraphs);
    let parts: Vec<serde_json::Value> = outcome
        .parts
        .iter()
        .map(|p| {
            serde_json::json!({
                "query": p.query,
                "par_numbers": p.par_numbers,
                "rescued": p.rescued,
                "leftover_words": p.leftover_words,
            })
        })
        .collect();
    let reference = outcome
        .is_found()
        .then(|| format!("{page}#p{}", outcome.packed));
    Ok(serde_json::json!({
        "ok": true,
        "page": page,
        "found": outcome.is_found(),
        "reference": reference,
        "par_numbers": outcome.packed,
        "matched_count": outcome.matched_count,
        "discarded": outcome.discarded,
        "rounds": outcome.rounds,
        "paragraph_count": paragraphs.len(),
        "parts": parts,
        "warnings": outcome.warnings,
        "warning_hints": warning_hints_from(&outcome.warnings),
    }))
}

pub(crate) async fn find_paragraphs(
    source: &dyn ParagraphSource,
    request: &FindParagraphsRequest,
    limits: FindParagraphLimits,
) -> Result<serde_json::Value> {
    let resp = askai_local::find_paragraphs(source, request, limits).await?;
    let all_warnings: Vec<&String> = resp.warnings.values().flatten().collect();
    Ok(serde_json::json!({
        "ok": true,
        "found": resp.found,
        "notfound": resp.notfound,
        "warnings": resp.warnings,
        "warning_hints": warning_hints_from(&all_warnings),
    }))
}

pub(crate) async fn extract(
    source: &dyn ParagraphSource,
    refs: &[String],
) -> Result<serde_json::Value> {
    let ctx = ContextExtracts::load(source, refs).await?;
    Ok(serde_json::json!({
        "ok": true,
        "pages": refs,
        "extract_count": ctx.extracts.len(),
        "text": ctx.joined(),
        "warnings": ctx.warnings,
        "warning_hints": warning_hints_from(&ctx.warnings),
    }))
}

pub(crate) struct AskRequest<'a> {
    pub prompt: &'a str,
    pub pages: &'a [String],
    pub instructions: String,
    pub link_citations: bool,
}

/// `source` is only consulted when pages are given.
pub(crate) async fn ask(
    backend: Option<Arc<dyn AiBackend>>,
    source: Option<&dyn ParagraphSource>,
    req: AskRequest<'_>,
) -> Result<serde_json::Value> {
    let mut q = AiQuery::new(backend);
    q.set_instructions(req.instructions);
    if !req.pages.is_empty() {
        let source = source.ok_or_else(|| {
            askai_core::Error::NotConfigured(
                "context pages need a paragraph source (set ASKAI_PAGES_DIR or ASKAI_WIKI_URL)"
                    .to_string(),
            )
        })?;
        q.set_context_pages(source, req.pages).await?;
    }
    let raw = q.send(req.prompt).await?;
    let response = if req.link_citations {
        q.context().link_citations(&raw)
    } else {
        raw
    };
    let warnings = &q.context().warnings;
    Ok(serde_json::json!({
        "ok": true,
        "service": q.service_name(),
        "response": response,
        "pages": req.pages,
        "extract_count": q.context().extracts.len(),
        "warnings": warnings,
        "warning_hints": warning_hints_from(warnings),
    }))
}

pub(crate) fn pack(indices: &[usize]) -> serde_json::Value {
    let packed = parnum::pack_set(indices.iter().copied());
    serde_json::json!({ "ok": true, "packed": packed })
}

pub(crate) fn unpack(range: &str) -> Result<serde_json::Value> {
    let indices = parnum::unpack(range)?;
    Ok(serde_json::json!({ "ok": true, "range": range, "indices": indices }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use askai_local::{DebugService, MemoryParagraphSource};

    fn wiki() -> MemoryParagraphSource {
        MemoryParagraphSource::new()
            .with_page(
                "Elephant",
                [
                    "Elephants are the largest living land animals.",
                    "Their trunks are used for breathing and grasping.",
                ],
            )
            .with_page("Mouse", ["Mice are small rodents."])
    }

    #[tokio::test]
    async fn find_paragraph_reports_reference_and_parts() {
        let v = find_paragraph(
            &wiki(),
            "Elephant",
            "Their trunks are used for breathing",
            FindParagraphLimits::default(),
        )
        .await
        .unwrap();
        assert_eq!(v["found"], true);
        assert_eq!(v["reference"], "Elephant#p1");
        assert_eq!(v["parts"][0]["query"], "Their trunks are used for breathing");
        assert_eq!(v["paragraph_count"], 2);
    }

    #[tokio::test]
    async fn find_paragraph_parts_list_every_rescued_paragraph() {
        let mut paragraphs = vec!["Unique alpha words here.".to_string()];
        paragraphs.extend((1..7).map(|i| format!("the filler {i}")));
        let src = MemoryParagraphSource::new().with_page("Fillers", paragraphs);
        let v = find_paragraph(
            &src,
            "Fillers",
            "Unique alpha words the the",
            FindParagraphLimits::default(),
        )
        .await
        .unwrap();
        assert_eq!(v["reference"], "Fillers#p0-2");
        assert_eq!(v["parts"][0]["rescued"], serde_json::json!([1, 2]));
    }

    #[tokio::test]
    async fn find_paragraph_on_missing_page_is_not_found() {
        let v = find_paragraph(&wiki(), "Nope", "anything", FindParagraphLimits::default())
            .await
            .unwrap();
        assert_eq!(v["found"], false);
        assert!(v["reference"].is_null());
    }

    #[tokio::test]
    async fn ask_links_citations_back_to_pages() {
        struct Cites;
        #[async_trait::async_trait]
        impl AiBackend for Cites {
            fn name(&self) -> &'static str {
                "cites"
            }
            async fn query(&self, _prompt: &str, _instructions: &str) -> Result<String> {
                Ok("Mice are small (Source #2).".to_string())
            }
        }

        let pages = vec!["Elephant#p0".to_string(), "Mouse".to_string()];
        let src = wiki();
        let v = ask(
            Some(Arc::new(Cites)),
            Some(&src),
            AskRequest {
                prompt: "How big are mice?",
                pages: &pages,
                instructions: "Be brief.".to_string(),
                link_citations: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(v["response"], "Mice are small (Mouse).");
        assert_eq!(v["extract_count"], 2);
        assert_eq!(v["service"], "cites");
    }

    #[tokio::test]
    async fn ask_with_pages_but_no_source_is_not_configured() {
        let pages = vec!["Mouse".to_string()];
        let err = ask(
            Some(Arc::new(DebugService)),
            None,
            AskRequest {
                prompt: "p",
                pages: &pages,
                instructions: String::new(),
                link_citations: false,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, askai_core::Error::NotConfigured(_)));
    }

    #[test]
    fn pack_sorts_and_dedups() {
        assert_eq!(pack(&[7, 1, 2, 3, 3])["packed"], "1-3,7");
        assert_eq!(unpack("1-3,7").unwrap()["indices"], serde_json::json!([1, 2, 3, 7]));
        assert!(unpack("1-x").is_err());
    }
}
