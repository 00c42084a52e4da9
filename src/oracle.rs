//! The correction oracle: something that takes the document text and
//! returns a corrected version with the same lines. [OpenAiOracle]
//! asks a chat-completion endpoint in JSON mode.

use crate::config_man::OracleConfig;
use crate::error::{FixError, FixResult};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[async_trait]
pub trait CorrectionOracle: Send + Sync {
    /// Return the corrected version of `text`.
    async fn correct(&self, text: &str) -> FixResult<String>;
}

/// The payload exchanged with the oracle, both ways.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPayload {
    pub text: String,
}

const PROMPT: &str = r#"
This is a text structure in JSON:

{"text": <TEXT> }

You will respond with corrected text based on parameters.

# Parameters

## Elementary Rules of Usage
* Use active voice (e.g., “The cat chased the mouse,” not “The mouse was chased by the cat”).
* Use definite, specific, and concrete language (avoid vague or abstract words).
* Omit needless words (e.g., “He is a man who” → “He”).
* Use parallel structure (e.g., “She likes reading, writing, and painting,” not “She likes reading, writing, and to paint”).
* Use a comma before conjunctions in compound sentences (“I went home, and I slept”).
* Do not join independent clauses with a comma (use a semicolon, conjunction, or separate sentences).
* Avoid passive voice unless necessary (e.g., “Mistakes were made” is vague; say who made them).

Principles of Composition
* Use the positive form (say what is, not what is not).
* Put the most important idea at the end of the sentence for emphasis.
* Avoid overuse of qualifiers (“rather,” “very,” “little,” “pretty” often weaken writing).
* Revise and rewrite (good writing is concise and refined).
* Keep related words together (e.g., “He only found three errors” → “He found only three errors”).
* Express coordinate ideas in similar form (parallelism makes writing stronger).

Matters of Form
* Prefer simple, familiar words (don’t use jargon or pretentious language).
* Avoid fancy words (“utilize” → “use,” “facilitate” → “help”).
* Use figures of speech sparingly (metaphors should be fresh and appropriate).
* Do not over-explain (assume the reader is intelligent).

Approach to Style
* Write naturally but not casually (formal yet readable).
* Avoid overuse of adverbs (e.g., “He shouted angrily” → “He shouted”).
* Use orthodox spelling and grammar (avoid trendy, incorrect usages).
* Do not affect a breezy style (overly casual writing can sound insincere).
* Be clear (if the reader struggles, the writing has failed).

In short: Be clear, be concise, and respect the reader's time.


Important:
- Preserve newlines and number of lines, never change them!

---
%%text%%
---

Respond with the same structure in JSON.
"#;

/// Build the prompt for `text`.
pub fn build_prompt(text: &str) -> FixResult<String> {
    let payload = serde_json::to_string(&TextPayload {
        text: text.to_string(),
    })?;
    Ok(PROMPT.replace("%%text%%", &payload))
}

/// Extract the corrected text from a chat-completion response body.
pub fn parse_completion(body: &serde_json::Value) -> FixResult<String> {
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| {
            FixError::OracleFailure("Completion has no message content".to_string())
        })?;
    let payload: TextPayload = serde_json::from_str(content).map_err(|err| {
        FixError::OracleFailure(format!("Malformed corrected text: {:#}", err))
    })?;
    Ok(payload.text)
}

#[derive(Debug, Clone)]
pub struct OpenAiOracle {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiOracle {
    pub fn new(config: &OracleConfig, api_key: String) -> FixResult<OpenAiOracle> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| FixError::Fatal(format!("Can't build HTTP client: {}", err)))?;
        Ok(OpenAiOracle {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// Create an oracle that reads its API key from the environment
    /// variable named in `config`.
    pub fn from_env(config: &OracleConfig) -> anyhow::Result<OpenAiOracle> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!("Environment variable {} is not set", config.api_key_env)
        })?;
        Ok(OpenAiOracle::new(config, api_key)?)
    }
}

#[async_trait]
impl CorrectionOracle for OpenAiOracle {
    #[tracing::instrument(skip_all, fields(model = %self.model))]
    async fn correct(&self, text: &str) -> FixResult<String> {
        let request = serde_json::json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "developer", "content": build_prompt(text)? },
            ],
        });
        tracing::debug!("Requesting correction of {} chars", text.chars().count());

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|err| FixError::OracleFailure(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FixError::OracleFailure(format!("status {status}: {body}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| FixError::OracleFailure(format!("Invalid response: {}", err)))?;
        let corrected = parse_completion(&body)?;
        tracing::debug!("Received correction of {} chars", corrected.chars().count());
        Ok(corrected)
    }
}
