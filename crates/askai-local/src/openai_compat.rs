use crate::env;
use askai_core::{AiBackend, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_API_URL: &str = "ASKAI_OPENAI_API_URL";
pub const ENV_API_KEY: &str = "ASKAI_OPENAI_API_KEY";
pub const ENV_MODEL: &str = "ASKAI_OPENAI_MODEL";

/// Chat-completions client for OpenAI and API-compatible servers.
///
/// `api_url` is the full endpoint (e.g. `https://api.openai.com/v1/chat/completions`),
/// not a base URL.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiCompatClient {
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_url = env(ENV_API_URL)
            .ok_or_else(|| Error::NotConfigured(format!("missing {ENV_API_URL}")))?;
        let api_key = env(ENV_API_KEY)
            .ok_or_else(|| Error::NotConfigured(format!("missing {ENV_API_KEY}")))?;
        let model =
            env(ENV_MODEL).ok_or_else(|| Error::NotConfigured(format!("missing {ENV_MODEL}")))?;
        Ok(Self::new(client, api_url, api_key, model))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let req = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
        };

        let resp = self
            .client
            .post(&self.api_url)
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!("openai chat.completions HTTP {status}")));
        }

        let parsed: ChatCompletionsResponse =
            resp.json().await.map_err(|e| Error::Llm(e.to_string()))?;
        Ok(parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl AiBackend for OpenAiCompatClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn query(&self, prompt: &str, instructions: &str) -> Result<String> {
        self.chat(instructions, prompt).await
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn sends_system_and_user_messages_with_bearer_key() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(
                |headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    let system = body["messages"][0]["content"].as_str().unwrap_or_default();
                    let user = body["messages"][1]["content"].as_str().unwrap_or_default();
                    let reply = format!(
                        "model={} auth={auth} system={system} user={user}",
                        body["model"].as_str().unwrap_or_default()
                    );
                    Json(serde_json::json!({
                        "choices": [{"message": {"role": "assistant", "content": reply}}]
                    }))
                },
            ),
        );
        let addr = serve(app).await;

        let c = OpenAiCompatClient::new(
            reqwest::Client::new(),
            format!("http://{addr}/v1/chat/completions"),
            "sk-test",
            "gpt-test",
        );
        let out = c.query("How big are elephants?", "Be brief.").await.unwrap();
        assert_eq!(
            out,
            "model=gpt-test auth=Bearer sk-test system=Be brief. user=How big are elephants?"
        );
    }

    #[tokio::test]
    async fn missing_choices_yield_empty_text() {
        let app = Router::new().route(
            "/chat",
            post(|| async { Json(serde_json::json!({"choices": []})) }),
        );
        let addr = serve(app).await;
        let c = OpenAiCompatClient::new(reqwest::Client::new(), format!("http://{addr}/chat"), "k", "m");
        assert_eq!(c.query("p", "i").await.unwrap(), "");
    }

    #[tokio::test]
    async fn http_error_status_is_an_llm_error() {
        let app = Router::new().route(
            "/chat",
            post(|| async { (StatusCode::UNAUTHORIZED, "nope") }),
        );
        let addr = serve(app).await;
        let c = OpenAiCompatClient::new(reqwest::Client::new(), format!("http://{addr}/chat"), "k", "m");
        let err = c.query("p", "i").await.unwrap_err();
        assert!(matches!(err, Error::Llm(ref m) if m.contains("401")), "got {err:?}");
    }
}
