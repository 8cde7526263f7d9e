use askai_core::{AiBackend, Result};

/// Backend that never contacts an AI: it answers every query with a report of
/// what it was asked.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugService;

impl DebugService {
    pub fn report(prompt: &str, instructions: &str) -> String {
        let delim = "-".repeat(80);
        format!(
            "Debug service: no AI was queried.\n\n\
             Prompt:\n{delim}\n{prompt}\n{delim}\n\n\
             Instructions:\n{delim}\n{instructions}\n{delim}"
        )
    }
}

#[async_trait::async_trait]
impl AiBackend for DebugService {
    fn name(&self) -> &'static str {
        "debug"
    }

    async fn query(&self, prompt: &str, instructions: &str) -> Result<String> {
        Ok(Self::report(prompt, instructions))
    }
}
