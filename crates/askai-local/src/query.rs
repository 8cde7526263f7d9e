use crate::env;
use askai_core::citations::link_citations_with;
use askai_core::context::{compose_instructions, format_extract, select_paragraphs};
use askai_core::{AiBackend, Error, ParagraphSource, Result, SourceReference};
use futures_util::future::try_join_all;
use std::sync::Arc;

pub const ENV_INSTRUCTIONS: &str = "ASKAI_INSTRUCTIONS";

pub const DEFAULT_INSTRUCTIONS: &str = "You are a research assistant. Answer the question using \
only the sources quoted below. After each statement, cite the source it came from as \
(Source #N). If the sources do not contain the answer, say so.";

pub const WARN_INVALID_REFERENCE: &str = "invalid_reference";
pub const WARN_EMPTY_SOURCE: &str = "empty_source";

/// `ASKAI_INSTRUCTIONS`, or the built-in instructions.
pub fn default_instructions() -> String {
    env(ENV_INSTRUCTIONS).unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string())
}

/// Context extracts for a list of page references.
///
/// `sources[i]` is the parsed form of the `i`-th input reference (`None` if it did
/// not parse), so `Source #<i+1>` in an AI response always refers back to the
/// caller's `i`-th entry.
#[derive(Debug, Clone, Default)]
pub struct ContextExtracts {
    pub extracts: Vec<String>,
    pub sources: Vec<Option<SourceReference>>,
    pub warnings: Vec<String>,
}

impl ContextExtracts {
    pub async fn load<S: AsRef<str>>(source: &dyn ParagraphSource, refs: &[S]) -> Result<Self> {
        let mut out = Self::default();
        for raw in refs {
            let raw = raw.as_ref();
            match SourceReference::parse(raw) {
                Ok(r) => out.sources.push(Some(r)),
                Err(e) => {
                    tracing::warn!(target: "askai", reference = raw, error = %e, "skipping context page");
                    out.warnings.push(format!("{WARN_INVALID_REFERENCE}: {raw}"));
                    out.sources.push(None);
                }
            }
        }

        let fetches = out.sources.iter().map(|r| async move {
            match r {
                Some(r) => source.paragraphs(&r.page).await.map(Some),
                None => Ok(None),
            }
        });
        let pages = try_join_all(fetches).await?;

        for (idx, (raw, (r, all))) in refs
            .iter()
            .zip(out.sources.iter().zip(pages))
            .enumerate()
        {
            let (Some(r), Some(all)) = (r, all) else {
                continue;
            };
            let selected = select_paragraphs(&all, r);
            if selected.is_empty() {
                out.warnings.push(format!("{WARN_EMPTY_SOURCE}: {}", raw.as_ref()));
                continue;
            }
            out.extracts
                .push(format_extract(idx + 1, raw.as_ref().trim(), &selected));
        }
        Ok(out)
    }

    pub fn joined(&self) -> String {
        self.extracts.join("\n\n")
    }

    pub fn link_citations(&self, response: &str) -> String {
        link_citations_with(response, |i| self.sources.get(i).and_then(Option::as_ref))
    }
}

/// Text of the referenced paragraphs as it would be quoted to the AI.
pub async fn extract_context<S: AsRef<str>>(
    source: &dyn ParagraphSource,
    refs: &[S],
) -> Result<String> {
    Ok(ContextExtracts::load(source, refs).await?.joined())
}

/// Instructions plus quoted wiki pages, sent to an AI backend.
pub struct AiQuery {
    backend: Option<Arc<dyn AiBackend>>,
    instructions: String,
    context: ContextExtracts,
}

impl AiQuery {
    pub fn new(backend: Option<Arc<dyn AiBackend>>) -> Self {
        Self {
            backend,
            instructions: String::new(),
            context: ContextExtracts::default(),
        }
    }

    pub fn service_name(&self) -> &'static str {
        self.backend.as_ref().map_or("none", |b| b.name())
    }

    pub fn set_instructions(&mut self, instructions: impl Into<String>) {
        self.instructions = instructions.into();
    }

    /// Quote these pages after the instructions, e.g.
    /// `["First page#p1-7,10-12,15", "Another page#p5", "Page 3"]`.
    pub async fn set_context_pages<S: AsRef<str>>(
        &mut self,
        source: &dyn ParagraphSource,
        refs: &[S],
    ) -> Result<()> {
        self.context = ContextExtracts::load(source, refs).await?;
        Ok(())
    }

    pub fn context(&self) -> &ContextExtracts {
        &self.context
    }

    pub fn full_instructions(&self) -> String {
        compose_instructions(&self.instructions, &self.context.extracts)
    }

    pub async fn send(&self, prompt: &str) -> Result<String> {
        let Some(backend) = &self.backend else {
            return Err(Error::NotConfigured("no AI service".to_string()));
        };
        let instructions = self.full_instructions();
        let res = backend.query(prompt, &instructions).await;
        match &res {
            Ok(response) => tracing::info!(
                target: "askai",
                service = backend.name(),
                prompt,
                response_len = response.len(),
                instructions_len = instructions.len(),
                "query"
            ),
            Err(e) => tracing::warn!(
                target: "askai",
                service = backend.name(),
                prompt,
                error = %e,
                instructions_len = instructions.len(),
                "query failed"
            ),
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DebugService, MemoryParagraphSource};

    fn wiki() -> MemoryParagraphSource {
        MemoryParagraphSource::new()
            .with_page("Elephant", ["Elephants are large.", "They eat grass.", "They live long."])
            .with_page("Mouse", ["Mice are small."])
    }

    struct Failing;

    #[async_trait::async_trait]
    impl ParagraphSource for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        async fn paragraphs(&self, _page: &str) -> Result<Vec<String>> {
            Err(Error::Fetch("down".to_string()))
        }
    }

    #[tokio::test]
    async fn extracts_are_numbered_by_input_position() {
        let refs = ["Nowhere", "Elephant#p0,2", "Mouse"];
        let ctx = ContextExtracts::load(&wiki(), &refs).await.unwrap();
        assert_eq!(
            ctx.extracts,
            vec![
                "Source #2: Elephant#p0,2\n\nElephants are large.\n\nThey live long.".to_string(),
                "Source #3: Mouse\n\nMice are small.".to_string(),
            ]
        );
        assert_eq!(ctx.warnings, vec!["empty_source: Nowhere"]);
    }

    #[tokio::test]
    async fn invalid_references_are_skipped_without_renumbering() {
        let refs = ["Elephant#p1--2", "Mouse"];
        let ctx = ContextExtracts::load(&wiki(), &refs).await.unwrap();
        assert_eq!(ctx.extracts, vec!["Source #2: Mouse\n\nMice are small."]);
        assert_eq!(ctx.warnings.len(), 1);
        assert!(ctx.warnings[0].starts_with(WARN_INVALID_REFERENCE));
        assert_eq!(ctx.link_citations("(1) (2)"), "(1) (Mouse)");
    }

    #[tokio::test]
    async fn send_appends_extracts_to_instructions() {
        let mut q = AiQuery::new(Some(Arc::new(DebugService)));
        q.set_instructions("Be brief.");
        q.set_context_pages(&wiki(), &["Mouse"]).await.unwrap();
        assert_eq!(
            q.full_instructions(),
            "Be brief.\n\nSource #1: Mouse\n\nMice are small."
        );
        let out = q.send("How big are mice?").await.unwrap();
        assert!(out.contains("How big are mice?"));
        assert!(out.contains("Source #1: Mouse"));
        assert_eq!(q.service_name(), "debug");
    }

    #[tokio::test]
    async fn send_without_service_is_not_configured() {
        let q = AiQuery::new(None);
        assert_eq!(q.service_name(), "none");
        assert!(matches!(q.send("hi").await, Err(Error::NotConfigured(_))));
    }

    #[tokio::test]
    async fn retrieval_failure_propagates() {
        let err = extract_context(&Failing, &["Elephant"]).await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }

    #[tokio::test]
    async fn extract_context_joins_extracts() {
        let text = extract_context(&wiki(), &["Elephant#p1", "Mouse"]).await.unwrap();
        assert_eq!(
            text,
            "Source #1: Elephant#p1\n\nThey eat grass.\n\nSource #2: Mouse\n\nMice are small."
        );
    }
}
