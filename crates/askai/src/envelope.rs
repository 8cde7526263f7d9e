use askai_core::Error;
use serde::Serialize;

pub(crate) const SCHEMA_VERSION: u64 = 1;

pub(crate) fn warning_hint(code: &str) -> Option<&'static str> {
    match code {
        "too_many_paragraphs" => Some(
            "The snippet matched more paragraphs than the warning threshold (see limits in askai_meta). The result is kept but may be imprecise (common words, list or table content).",
        ),
        "result_discarded_too_many_paragraphs" => Some(
            "The snippet matched more paragraphs than the discard threshold, so the result was discarded as uncertain. It was probably generated from a list or table; try a longer, more specific snippet.",
        ),
        "iteration_limit_reached" => Some(
            "The snippet was too fragmented to search completely; paragraphs were only collected until the round limit was reached.",
        ),
        "invalid_reference" => Some(
            "A page reference could not be parsed and was skipped. Use \"Page name\" or \"Page name#p1-3,7\".",
        ),
        "empty_source" => Some(
            "A referenced page has no matching paragraphs (missing page, or paragraph numbers past its end), so it was not quoted.",
        ),
        _ => None,
    }
}

/// Hints keyed by warning code. Warnings may carry a detail after `": "`.
pub(crate) fn warning_hints_from<S: AsRef<str>>(warnings: &[S]) -> serde_json::Value {
    let mut m = serde_json::Map::new();
    for w in warnings {
        let code = w.as_ref().split_once(": ").map_or(w.as_ref(), |(c, _)| c);
        if let Some(h) = warning_hint(code) {
            m.insert(code.to_string(), serde_json::json!(h));
        }
    }
    serde_json::Value::Object(m)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    InvalidParams,
    InvalidRange,
    InvalidPage,
    NotConfigured,
    NotSupported,
    FetchFailed,
    LlmFailed,
}

impl ErrorCode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParams => "invalid_params",
            Self::InvalidRange => "invalid_range",
            Self::InvalidPage => "invalid_page",
            Self::NotConfigured => "not_configured",
            Self::NotSupported => "not_supported",
            Self::FetchFailed => "fetch_failed",
            Self::LlmFailed => "llm_failed",
        }
    }

    pub(crate) fn retryable(self) -> bool {
        match self {
            Self::FetchFailed | Self::LlmFailed => true,
            // Configuration + invalid input are not retryable without changing something.
            Self::NotConfigured
            | Self::NotSupported
            | Self::InvalidParams
            | Self::InvalidRange
            | Self::InvalidPage => false,
        }
    }

    pub(crate) fn from_error(e: &Error) -> Self {
        match e {
            Error::InvalidRange(_) => Self::InvalidRange,
            Error::InvalidPage(_) => Self::InvalidPage,
            Error::Fetch(_) => Self::FetchFailed,
            Error::Llm(_) => Self::LlmFailed,
            Error::NotConfigured(_) => Self::NotConfigured,
            Error::NotSupported(_) => Self::NotSupported,
        }
    }

    fn default_hint(self) -> &'static str {
        match self {
            Self::InvalidParams => "Check the tool arguments.",
            Self::InvalidRange => "Paragraph ranges look like \"1-7,10-12,15\".",
            Self::InvalidPage => "Pass a non-empty page name without path separators.",
            Self::NotConfigured => {
                "Set ASKAI_PAGES_DIR or ASKAI_WIKI_URL for pages, and ASKAI_SERVICE (openai|debug) for AI queries."
            }
            Self::NotSupported => "ASKAI_SERVICE must be one of: openai, debug.",
            Self::FetchFailed => "The page source failed; check ASKAI_WIKI_URL is reachable and retry.",
            Self::LlmFailed => "The AI service failed; check ASKAI_OPENAI_* settings and retry.",
        }
    }
}

pub(crate) fn add_envelope_fields(payload: &mut serde_json::Value, kind: &str, elapsed_ms: u128) {
    payload["schema_version"] = serde_json::json!(SCHEMA_VERSION);
    payload["kind"] = serde_json::json!(kind);
    payload["elapsed_ms"] = serde_json::json!(elapsed_ms);
    if payload.get("request").is_none() {
        payload["request"] = serde_json::Value::Null;
    }
}

pub(crate) fn error_obj(
    code: ErrorCode,
    message: impl ToString,
    hint: impl ToString,
) -> serde_json::Value {
    #[derive(Serialize)]
    struct ErrorObject {
        code: &'static str,
        message: String,
        hint: String,
        retryable: bool,
    }

    let e = ErrorObject {
        code: code.as_str(),
        message: message.to_string(),
        hint: hint.to_string(),
        retryable: code.retryable(),
    };
    match serde_json::to_value(e) {
        Ok(v) => v,
        Err(_) => serde_json::json!({
            "code": code.as_str(),
            "message": message.to_string(),
            "hint": hint.to_string(),
            "retryable": code.retryable()
        }),
    }
}

/// `{ok:false, error:{...}}` for a domain error.
pub(crate) fn error_payload(e: &Error) -> serde_json::Value {
    let code = ErrorCode::from_error(e);
    serde_json::json!({
        "ok": false,
        "error": error_obj(code, e, code.default_hint()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_fields_are_added_without_clobbering_request() {
        let mut v = serde_json::json!({"ok": true, "request": {"page": "P"}});
        add_envelope_fields(&mut v, "find_paragraphs", 7);
        assert_eq!(v["schema_version"], SCHEMA_VERSION);
        assert_eq!(v["kind"], "find_paragraphs");
        assert_eq!(v["elapsed_ms"], 7);
        assert_eq!(v["request"]["page"], "P");
    }

    #[test]
    fn domain_errors_map_to_stable_codes() {
        let v = error_payload(&Error::NotConfigured("ASKAI_SERVICE is not set".to_string()));
        assert_eq!(v["ok"], false);
        assert_eq!(v["error"]["code"], "not_configured");
        assert_eq!(v["error"]["retryable"], false);
        assert!(v["error"]["message"]
            .as_str()
            .unwrap()
            .contains("ASKAI_SERVICE"));

        let v = error_payload(&Error::Fetch("HTTP 503".to_string()));
        assert_eq!(v["error"]["code"], "fetch_failed");
        assert_eq!(v["error"]["retryable"], true);
    }

    #[test]
    fn hints_strip_warning_details() {
        let h = warning_hints_from(&["invalid_reference: Page#p1--2", "unknown_code"]);
        let m = h.as_object().unwrap();
        assert_eq!(m.len(), 1);
        assert!(m.contains_key("invalid_reference"));
    }

    #[test]
    fn finder_hints_do_not_hardcode_thresholds() {
        for code in [
            askai_core::finder::WARN_TOO_MANY_PARAGRAPHS,
            askai_core::finder::WARN_RESULT_DISCARDED,
            askai_core::finder::WARN_ITERATION_LIMIT,
        ] {
            let h = warning_hint(code).unwrap();
            assert!(
                !h.bytes().any(|b| b.is_ascii_digit()),
                "{code}: limits are configurable, hint should not name numbers: {h}"
            );
        }
    }
}
