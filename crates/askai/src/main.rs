use anyhow::Result;
use askai_core::{FindParagraphLimits, FindParagraphsRequest, ParagraphSource};
use askai_local::SourceConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod envelope;
mod ops;

use envelope::{add_envelope_fields, error_obj, error_payload, ErrorCode};

#[derive(Parser, Debug)]
#[command(name = "askai")]
#[command(
    about = "Ask an AI about wiki pages; map search snippets back to paragraphs",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
struct SourceArgs {
    /// Directory of `<Page_name>.html` files (wins over --wiki-url).
    #[arg(long, global = true, env = "ASKAI_PAGES_DIR")]
    pages_dir: Option<PathBuf>,
    /// Wiki entry point; pages are read from `<url>?title=<page>&action=render`.
    #[arg(long, global = true, env = "ASKAI_WIKI_URL")]
    wiki_url: Option<String>,
    /// Page fetch timeout (ms).
    #[arg(long, global = true, default_value_t = 30_000)]
    timeout_ms: u64,
}

impl SourceArgs {
    fn config(&self) -> SourceConfig {
        SourceConfig {
            pages_dir: self
                .pages_dir
                .clone()
                .filter(|p| !p.as_os_str().is_empty()),
            wiki_url: self
                .wiki_url
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find the paragraphs of a page that likely contain a snippet (json).
    FindParagraph(FindParagraphCmd),
    /// Batch form: a JSON object of page name -> snippet (json).
    FindParagraphs(FindParagraphsCmd),
    /// Print the context extracts that would be quoted to the AI.
    Extract(ExtractCmd),
    /// Ask the configured AI service, quoting wiki pages as context.
    Ask(AskCmd),
    /// Compress paragraph numbers into a range string ("1-7,10-12,15").
    Pack(PackCmd),
    /// Expand a range string into paragraph numbers.
    Unpack(UnpackCmd),
    /// Run as an MCP stdio server (for Cursor / MCP clients).
    #[cfg(feature = "stdio")]
    McpStdio,
    /// Diagnose configuration (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct FindParagraphCmd {
    #[arg(long)]
    page: String,
    /// Search-result snippet or any text fragment from the page.
    #[arg(long)]
    snippet: String,
    /// Drop leading snippet words that appear in no paragraph instead of giving up.
    #[arg(long)]
    skip_unmatched_words: bool,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct FindParagraphsCmd {
    /// Inline JSON object, e.g. '{"Page one":"snippet"}'.
    #[arg(long, conflicts_with = "json_file", required_unless_present = "json_file")]
    json: Option<String>,
    /// Path to a file holding the JSON object.
    #[arg(long)]
    json_file: Option<PathBuf>,
    #[arg(long)]
    skip_unmatched_words: bool,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct ExtractCmd {
    /// Page reference, e.g. "Page" or "Page#p1-3,7". Repeatable.
    #[arg(long = "page", required = true)]
    pages: Vec<String>,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "text")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct AskCmd {
    #[arg(long)]
    prompt: String,
    /// Page reference to quote as context. Repeatable.
    #[arg(long = "page")]
    pages: Vec<String>,
    /// Instructions for the AI (default: ASKAI_INSTRUCTIONS or built-in text).
    #[arg(long)]
    instructions: Option<String>,
    /// Rewrite "(Source #N)" citations into page references.
    #[arg(long)]
    link_citations: bool,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "text")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct PackCmd {
    #[arg(required = true)]
    indices: Vec<usize>,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "text")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct UnpackCmd {
    range: String,
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "text")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn limits(skip_unmatched_words: bool) -> FindParagraphLimits {
    FindParagraphLimits {
        skip_unmatched_words,
        ..FindParagraphLimits::default()
    }
}

fn is_text(output: &str) -> bool {
    output.eq_ignore_ascii_case("text")
}

/// Print a payload (json: enveloped; text: rendered). Failures exit with status 1.
fn emit(
    kind: &str,
    t0: Instant,
    output: &str,
    res: std::result::Result<serde_json::Value, serde_json::Value>,
    render: impl FnOnce(&serde_json::Value) -> String,
) {
    match res {
        Ok(mut v) => {
            if is_text(output) {
                println!("{}", render(&v));
            } else {
                add_envelope_fields(&mut v, kind, t0.elapsed().as_millis());
                println!("{v}");
            }
        }
        Err(mut v) => {
            if is_text(output) {
                eprintln!(
                    "askai: {}: {}",
                    v["error"]["code"].as_str().unwrap_or("error"),
                    v["error"]["message"].as_str().unwrap_or("")
                );
            } else {
                add_envelope_fields(&mut v, kind, t0.elapsed().as_millis());
                println!("{v}");
            }
            std::process::exit(1);
        }
    }
}

fn invalid_params(message: impl ToString, hint: &str) -> serde_json::Value {
    serde_json::json!({
        "ok": false,
        "error": error_obj(ErrorCode::InvalidParams, message, hint),
    })
}

fn has_env(k: &str) -> bool {
    std::env::var(k).ok().is_some_and(|v| !v.trim().is_empty())
}

/// Booleans and names only; never secret values.
fn configured_report(source: &SourceConfig) -> serde_json::Value {
    let service = askai_local::service::ServiceKind::from_env();
    serde_json::json!({
        "pages_dir": source.pages_dir.is_some(),
        "wiki_url": source.wiki_url.is_some(),
        "source": if source.pages_dir.is_some() {
            Some("dir")
        } else if source.wiki_url.is_some() {
            Some("wiki")
        } else {
            None
        },
        "service": service.as_ref().ok().copied().flatten().map(|k| k.as_str()),
        "service_valid": service.is_ok(),
        "openai": {
            "api_url": has_env(askai_local::openai_compat::ENV_API_URL),
            "api_key": has_env(askai_local::openai_compat::ENV_API_KEY),
            "model": has_env(askai_local::openai_compat::ENV_MODEL),
        },
        "instructions": has_env(askai_local::query::ENV_INSTRUCTIONS),
    })
}

fn load_env_file() {
    // Opt-in only (ASKAI_ENV_FILE). Sets vars only if not already set; never logs values.
    let Ok(p) = std::env::var("ASKAI_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim();
        if k.is_empty() {
            continue;
        }
        // Don't override explicit process env.
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_env("ASKAI_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    // stderr only: stdout carries JSON payloads and MCP frames.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_source(args: &SourceArgs) -> std::result::Result<Arc<dyn ParagraphSource>, serde_json::Value> {
    args.config().build().map_err(|e| error_payload(&e))
}

#[cfg(feature = "stdio")]
mod mcp {
    use super::*;
    use askai_core::AiBackend;
    use rmcp::{
        handler::server::router::tool::ToolRouter as RmcpToolRouter,
        handler::server::wrapper::Parameters,
        model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
        tool, tool_handler, tool_router,
        transport::stdio,
        ErrorData as McpError, ServiceExt,
    };
    use schemars::JsonSchema;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    fn tool_result(payload: serde_json::Value) -> CallToolResult {
        // Structured content for machine consumers, plus a text copy for clients
        // that only read `content[0].text`.
        let mut r = CallToolResult::structured(payload.clone());
        r.content = vec![Content::text(payload.to_string())];
        r
    }

    fn finish(
        kind: &str,
        t0: Instant,
        res: std::result::Result<serde_json::Value, serde_json::Value>,
    ) -> CallToolResult {
        let mut payload = res.unwrap_or_else(|e| e);
        add_envelope_fields(&mut payload, kind, t0.elapsed().as_millis());
        tool_result(payload)
    }

    #[derive(Debug, Deserialize, JsonSchema, Default)]
    struct FindParagraphsArgs {
        /// Page name -> snippet to locate on that page.
        pages: Option<BTreeMap<String, String>>,
        /// Drop leading snippet words that appear in no paragraph (default false).
        skip_unmatched_words: Option<bool>,
    }

    #[derive(Debug, Deserialize, JsonSchema, Default)]
    struct ExtractContextArgs {
        /// Page references like "Page" or "Page#p1-3,7".
        pages: Option<Vec<String>>,
    }

    #[derive(Debug, Deserialize, JsonSchema, Default)]
    struct AskAiArgs {
        prompt: Option<String>,
        /// Page references quoted as numbered sources after the instructions.
        pages: Option<Vec<String>>,
        /// Defaults to ASKAI_INSTRUCTIONS or built-in text.
        instructions: Option<String>,
        /// Rewrite "(Source #N)" citations into page references (default false).
        link_citations: Option<bool>,
    }

    #[derive(Clone)]
    pub(crate) struct AskaiMcp {
        tool_router: RmcpToolRouter<Self>,
        source_config: SourceConfig,
        source: Option<Arc<dyn ParagraphSource>>,
        backend: Option<Arc<dyn AiBackend>>,
    }

    fn not_configured(what: &str) -> serde_json::Value {
        error_payload(&askai_core::Error::NotConfigured(what.to_string()))
    }

    #[tool_router]
    impl AskaiMcp {
        pub(crate) fn new(
            source_config: SourceConfig,
            source: Option<Arc<dyn ParagraphSource>>,
            backend: Option<Arc<dyn AiBackend>>,
        ) -> Self {
            Self {
                tool_router: Self::tool_router(),
                source_config,
                source,
                backend,
            }
        }

        pub(crate) fn from_env(source_config: SourceConfig) -> Self {
            let source = match source_config.build() {
                Ok(s) => Some(s),
                Err(e) => {
                    tracing::warn!(target: "askai", error = %e, "no paragraph source");
                    None
                }
            };
            let backend = match askai_local::ai_backend_from_env() {
                Ok(b) => Some(b),
                Err(e) => {
                    tracing::warn!(target: "askai", error = %e, "no AI service");
                    None
                }
            };
            Self::new(source_config, source, backend)
        }

        fn source(&self) -> std::result::Result<&dyn ParagraphSource, serde_json::Value> {
            self.source
                .as_deref()
                .ok_or_else(|| not_configured("no paragraph source (set ASKAI_PAGES_DIR or ASKAI_WIKI_URL)"))
        }

        #[tool(description = "Report askai configuration + version (no secrets)")]
        async fn askai_meta(&self) -> Result<CallToolResult, McpError> {
            let t0 = Instant::now();
            let l = FindParagraphLimits::default();
            let payload = serde_json::json!({
                "ok": true,
                "name": "askai",
                "version": env!("CARGO_PKG_VERSION"),
                "configured": configured_report(&self.source_config),
                "source_ready": self.source.is_some(),
                "service_ready": self.backend.is_some(),
                "limits": {
                    "max_rounds": l.max_rounds,
                    "part_in_too_many_paragraphs": l.part_in_too_many_paragraphs,
                    "warn_if_paragraph_count_above": l.warn_if_paragraph_count_above,
                    "discard_if_paragraph_count_above": l.discard_if_paragraph_count_above,
                },
            });
            Ok(finish("askai_meta", t0, Ok(payload)))
        }

        #[tool(
            description = "Map search snippets back to paragraph numbers: pages is an object of page name -> snippet; returns found [\"Page#p1-3\"] and notfound [\"Page\"]"
        )]
        async fn find_paragraphs(
            &self,
            params: Parameters<Option<FindParagraphsArgs>>,
        ) -> Result<CallToolResult, McpError> {
            let t0 = Instant::now();
            let args = params.0.unwrap_or_default();
            let res = async {
                let Some(pages) = args.pages.filter(|p| !p.is_empty()) else {
                    return Err(invalid_params(
                        "pages must be a non-empty object",
                        "Pass pages={\"Page name\": \"snippet text\"}.",
                    ));
                };
                let source = self.source()?;
                let request = FindParagraphsRequest { pages };
                let limits = limits(args.skip_unmatched_words.unwrap_or(false));
                ops::find_paragraphs(source, &request, limits)
                    .await
                    .map_err(|e| error_payload(&e))
            }
            .await;
            Ok(finish("find_paragraphs", t0, res))
        }

        #[tool(
            description = "Return the context extracts (\"Source #N: Page\" + paragraph text) for page references like \"Page#p1-3,7\""
        )]
        async fn extract_context(
            &self,
            params: Parameters<Option<ExtractContextArgs>>,
        ) -> Result<CallToolResult, McpError> {
            let t0 = Instant::now();
            let args = params.0.unwrap_or_default();
            let res = async {
                let pages = args.pages.unwrap_or_default();
                if pages.is_empty() {
                    return Err(invalid_params(
                        "pages must be non-empty",
                        "Pass pages=[\"Page name#p1-3\"].",
                    ));
                }
                let source = self.source()?;
                ops::extract(source, &pages)
                    .await
                    .map_err(|e| error_payload(&e))
            }
            .await;
            Ok(finish("extract_context", t0, res))
        }

        #[tool(
            description = "Ask the configured AI service a question, quoting the given wiki pages as numbered sources"
        )]
        async fn ask_ai(
            &self,
            params: Parameters<Option<AskAiArgs>>,
        ) -> Result<CallToolResult, McpError> {
            let t0 = Instant::now();
            let args = params.0.unwrap_or_default();
            let res = async {
                let prompt = args.prompt.unwrap_or_default();
                if prompt.trim().is_empty() {
                    return Err(invalid_params(
                        "prompt must be non-empty",
                        "Pass prompt=\"your question\".",
                    ));
                }
                let Some(backend) = self.backend.clone() else {
                    return Err(not_configured(
                        "no AI service (set ASKAI_SERVICE=openai|debug)",
                    ));
                };
                let pages = args.pages.unwrap_or_default();
                let req = ops::AskRequest {
                    prompt: &prompt,
                    pages: &pages,
                    instructions: args
                        .instructions
                        .unwrap_or_else(askai_local::query::default_instructions),
                    link_citations: args.link_citations.unwrap_or(false),
                };
                ops::ask(Some(backend), self.source.as_deref(), req)
                    .await
                    .map_err(|e| error_payload(&e))
            }
            .await;
            Ok(finish("ask_ai", t0, res))
        }
    }

    #[tool_handler]
    impl rmcp::ServerHandler for AskaiMcp {
        fn get_info(&self) -> ServerInfo {
            ServerInfo {
                instructions: Some(
                    "Wiki paragraph lookup and AI questions over wiki pages. Outputs are JSON and schema-versioned."
                        .to_string(),
                ),
                capabilities: ServerCapabilities::builder().enable_tools().build(),
                ..Default::default()
            }
        }
    }

    pub(crate) async fn serve_stdio(source_config: SourceConfig) -> Result<(), McpError> {
        let svc = AskaiMcp::from_env(source_config);
        let running = svc
            .serve(stdio())
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        // Keep the stdio server alive until the client closes.
        running
            .waiting()
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(())
    }

}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    init_logging();

    let cli = Cli::parse();
    let t0 = Instant::now();

    match cli.command {
        Commands::FindParagraph(args) => {
            let res = match build_source(&cli.source) {
                Ok(source) => ops::find_paragraph(
                    source.as_ref(),
                    &args.page,
                    &args.snippet,
                    limits(args.skip_unmatched_words),
                )
                .await
                .map_err(|e| error_payload(&e)),
                Err(e) => Err(e),
            };
            emit("find_paragraph", t0, &args.output, res, |v| {
                v["reference"].as_str().unwrap_or("").to_string()
            });
        }
        Commands::FindParagraphs(args) => {
            let raw = match (&args.json, &args.json_file) {
                (Some(s), _) => Ok(s.clone()),
                (None, Some(p)) => std::fs::read_to_string(p).map_err(|e| {
                    invalid_params(
                        format!("{}: {e}", p.display()),
                        "Pass a readable --json-file path.",
                    )
                }),
                (None, None) => Err(invalid_params(
                    "missing --json or --json-file",
                    "Pass a JSON object of page name -> snippet.",
                )),
            };
            let request = raw.and_then(|s| {
                serde_json::from_str::<FindParagraphsRequest>(&s).map_err(|e| {
                    invalid_params(
                        format!("invalid JSON: {e}"),
                        "Expected an object of page name -> snippet, e.g. {\"Page\":\"text\"}.",
                    )
                })
            });
            let res = match (request, build_source(&cli.source)) {
                (Ok(request), Ok(source)) => ops::find_paragraphs(
                    source.as_ref(),
                    &request,
                    limits(args.skip_unmatched_words),
                )
                .await
                .map_err(|e| error_payload(&e)),
                (Err(e), _) | (_, Err(e)) => Err(e),
            };
            emit("find_paragraphs", t0, &args.output, res, |v| {
                let mut lines = Vec::new();
                for r in v["found"].as_array().into_iter().flatten() {
                    lines.push(format!("found\t{}", r.as_str().unwrap_or("")));
                }
                for r in v["notfound"].as_array().into_iter().flatten() {
                    lines.push(format!("notfound\t{}", r.as_str().unwrap_or("")));
                }
                lines.join("\n")
            });
        }
        Commands::Extract(args) => {
            let res = match build_source(&cli.source) {
                Ok(source) => ops::extract(source.as_ref(), &args.pages)
                    .await
                    .map_err(|e| error_payload(&e)),
                Err(e) => Err(e),
            };
            emit("extract", t0, &args.output, res, |v| {
                v["text"].as_str().unwrap_or("").to_string()
            });
        }
        Commands::Ask(args) => {
            let instructions = args
                .instructions
                .clone()
                .unwrap_or_else(askai_local::query::default_instructions);
            let res = async {
                let backend = askai_local::ai_backend_from_env().map_err(|e| error_payload(&e))?;
                let source = if args.pages.is_empty() {
                    None
                } else {
                    Some(build_source(&cli.source)?)
                };
                let req = ops::AskRequest {
                    prompt: &args.prompt,
                    pages: &args.pages,
                    instructions,
                    link_citations: args.link_citations,
                };
                ops::ask(Some(backend), source.as_deref(), req)
                    .await
                    .map_err(|e| error_payload(&e))
            }
            .await;
            emit("ask", t0, &args.output, res, |v| {
                v["response"].as_str().unwrap_or("").to_string()
            });
        }
        Commands::Pack(args) => {
            emit("pack", t0, &args.output, Ok(ops::pack(&args.indices)), |v| {
                v["packed"].as_str().unwrap_or("").to_string()
            });
        }
        Commands::Unpack(args) => {
            let res = ops::unpack(&args.range).map_err(|e| error_payload(&e));
            emit("unpack", t0, &args.output, res, |v| {
                v["indices"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            });
        }
        #[cfg(feature = "stdio")]
        Commands::McpStdio => {
            mcp::serve_stdio(cli.source.config())
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        }
        Commands::Doctor(args) => {
            let config = cli.source.config();
            let mut checks: Vec<serde_json::Value> = Vec::new();
            if let Some(dir) = &config.pages_dir {
                let ok = dir.is_dir();
                checks.push(serde_json::json!({
                    "name": "pages_dir_exists",
                    "ok": ok,
                    "hint": if ok { "" } else { "ASKAI_PAGES_DIR must point at a directory of <Page_name>.html files." },
                }));
            }
            let source_ok = config.build().is_ok();
            checks.push(serde_json::json!({
                "name": "paragraph_source_ready",
                "ok": source_ok,
                "hint": if source_ok { "" } else { "Set ASKAI_PAGES_DIR to a directory of <Page_name>.html files, or ASKAI_WIKI_URL to an absolute wiki URL." },
            }));
            let service_ok = askai_local::ai_backend_from_env().is_ok();
            checks.push(serde_json::json!({
                "name": "ai_service_ready",
                "ok": service_ok,
                "hint": if service_ok { "" } else { "Set ASKAI_SERVICE=debug, or ASKAI_SERVICE=openai with ASKAI_OPENAI_API_URL, ASKAI_OPENAI_API_KEY and ASKAI_OPENAI_MODEL." },
            }));

            let v = serde_json::json!({
                "ok": true,
                "name": "askai",
                "version": env!("CARGO_PKG_VERSION"),
                "features": { "stdio": cfg!(feature = "stdio") },
                "configured": configured_report(&config),
                "checks": checks,
            });
            emit("doctor", t0, &args.output, Ok(v), |v| {
                let mut lines = vec![format!("askai {}", env!("CARGO_PKG_VERSION"))];
                for c in v["checks"].as_array().into_iter().flatten() {
                    lines.push(format!(
                        "{}: {}",
                        c["name"].as_str().unwrap_or(""),
                        if c["ok"].as_bool() == Some(true) { "ok" } else { "FAIL" }
                    ));
                }
                lines.join("\n")
            });
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "ok": true,
                "name": "askai",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("askai {}", env!("CARGO_PKG_VERSION")),
                _ => emit("version", t0, &args.output, Ok(v), |_| String::new()),
            }
        }
    }

    Ok(())
}
