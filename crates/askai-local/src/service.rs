use crate::{env, http_client, DebugService, OpenAiCompatClient};
use askai_core::{AiBackend, Error, Result};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const ENV_SERVICE: &str = "ASKAI_SERVICE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    OpenAi,
    Debug,
}

impl ServiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Debug => "debug",
        }
    }

    /// `ASKAI_SERVICE`, or `None` when unset.
    pub fn from_env() -> Result<Option<Self>> {
        env(ENV_SERVICE).map(|s| s.parse()).transpose()
    }
}

impl FromStr for ServiceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "debug" => Ok(Self::Debug),
            other => Err(Error::NotSupported(format!(
                "unknown {ENV_SERVICE}={other:?} (expected openai|debug)"
            ))),
        }
    }
}

pub fn ai_backend(kind: ServiceKind, timeout: Duration) -> Result<Arc<dyn AiBackend>> {
    match kind {
        ServiceKind::Debug => Ok(Arc::new(DebugService)),
        ServiceKind::OpenAi => {
            let client = http_client(timeout)?;
            Ok(Arc::new(
                OpenAiCompatClient::from_env(client)?.with_timeout(timeout),
            ))
        }
    }
}

/// Backend selected by `ASKAI_SERVICE`. Unset means no AI service is available.
pub fn ai_backend_from_env() -> Result<Arc<dyn AiBackend>> {
    let kind = ServiceKind::from_env()?
        .ok_or_else(|| Error::NotConfigured(format!("{ENV_SERVICE} is not set")))?;
    ai_backend(kind, Duration::from_secs(120))
}
