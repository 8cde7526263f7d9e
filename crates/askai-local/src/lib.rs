use askai_core::{Error, ParagraphSource, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub mod debug_service;
pub mod extract;
pub mod findpar;
pub mod openai_compat;
pub mod query;
pub mod service;

pub use debug_service::DebugService;
pub use findpar::find_paragraphs;
pub use openai_compat::OpenAiCompatClient;
pub use query::{extract_context, AiQuery};
pub use service::{ai_backend_from_env, ServiceKind};

pub const ENV_PAGES_DIR: &str = "ASKAI_PAGES_DIR";
pub const ENV_WIKI_URL: &str = "ASKAI_WIKI_URL";

// Env vars are process-global; serialize tests that mutate them.
#[cfg(test)]
pub(crate) static TEST_ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Trimmed env var; empty counts as unset.
pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("askai-local/0.1")
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Fetch(e.to_string()))
}

/// Paragraphs of pages rendered by a MediaWiki-style endpoint
/// (`<endpoint>?title=<page>&action=render`).
#[derive(Debug, Clone)]
pub struct WikiParagraphSource {
    client: reqwest::Client,
    endpoint: url::Url,
}

impl WikiParagraphSource {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Result<Self> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| Error::NotConfigured(format!("invalid wiki url {endpoint:?}: {e}")))?;
        Ok(Self { client, endpoint })
    }

    pub fn render_url(&self, page: &str) -> url::Url {
        let mut u = self.endpoint.clone();
        u.query_pairs_mut()
            .append_pair("title", page)
            .append_pair("action", "render");
        u
    }
}

#[async_trait::async_trait]
impl ParagraphSource for WikiParagraphSource {
    fn name(&self) -> &'static str {
        "wiki"
    }

    async fn paragraphs(&self, page: &str) -> Result<Vec<String>> {
        let url = self.render_url(page);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(target: "askai", page, "page not found");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(Error::Fetch(format!("render {page:?}: HTTP {status}")));
        }
        let html = resp.text().await.map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(extract::paragraphs_from_html(&html))
    }
}

/// Offline pages: `<dir>/<Page_name>.html`, spaces in the page name stored as underscores.
#[derive(Debug, Clone)]
pub struct DirParagraphSource {
    root: PathBuf,
}

impl DirParagraphSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, page: &str) -> Result<PathBuf> {
        let name = page.trim();
        if name.is_empty() {
            return Err(Error::InvalidPage("empty page name".to_string()));
        }
        if name.contains(&['/', '\\', '\0'][..]) || name.contains("..") {
            return Err(Error::InvalidPage(format!(
                "{page:?}: path separators are not allowed"
            )));
        }
        Ok(self.root.join(format!("{}.html", name.replace(' ', "_"))))
    }
}

#[async_trait::async_trait]
impl ParagraphSource for DirParagraphSource {
    fn name(&self) -> &'static str {
        "dir"
    }

    async fn paragraphs(&self, page: &str) -> Result<Vec<String>> {
        let path = self.path_for(page)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(html) => Ok(extract::paragraphs_from_html(&html)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(target: "askai", page, path = %path.display(), "page not found");
                Ok(Vec::new())
            }
            Err(e) => Err(Error::Fetch(format!("{}: {e}", path.display()))),
        }
    }
}

/// Pages held in memory, keyed by exact page name.
#[derive(Debug, Clone, Default)]
pub struct MemoryParagraphSource {
    pages: BTreeMap<String, Vec<String>>,
}

impl MemoryParagraphSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page<I, S>(mut self, page: impl Into<String>, paragraphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(page, paragraphs);
        self
    }

    pub fn insert<I, S>(&mut self, page: impl Into<String>, paragraphs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pages
            .insert(page.into(), paragraphs.into_iter().map(Into::into).collect());
    }

    pub fn insert_html(&mut self, page: impl Into<String>, html: &str) {
        self.insert(page, extract::paragraphs_from_html(html));
    }
}

#[async_trait::async_trait]
impl ParagraphSource for MemoryParagraphSource {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn paragraphs(&self, page: &str) -> Result<Vec<String>> {
        Ok(self.pages.get(page).cloned().unwrap_or_default())
    }
}

/// Where paragraphs come from. A pages directory wins over a wiki URL.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub pages_dir: Option<PathBuf>,
    pub wiki_url: Option<String>,
    pub timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            pages_dir: None,
            wiki_url: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl SourceConfig {
    pub fn from_env() -> Self {
        Self {
            pages_dir: env(ENV_PAGES_DIR).map(PathBuf::from),
            wiki_url: env(ENV_WIKI_URL),
            ..Self::default()
        }
    }

    pub fn build(&self) -> Result<Arc<dyn ParagraphSource>> {
        if let Some(dir) = &self.pages_dir {
            return Ok(Arc::new(DirParagraphSource::new(dir.clone())));
        }
        if let Some(u) = &self.wiki_url {
            let client = http_client(self.timeout)?;
            return Ok(Arc::new(WikiParagraphSource::new(client, u)?));
        }
        Err(Error::NotConfigured(format!(
            "no paragraph source (set {ENV_PAGES_DIR} or {ENV_WIKI_URL})"
        )))
    }
}

pub fn paragraph_source_from_env() -> Result<Arc<dyn ParagraphSource>> {
    SourceConfig::from_env().build()
}
