use std::time::Duration;

use serde_json::{json, Value};

use crate::{config::LlmConfig, error::LlmError, types::ChatTurn};

/// How many prior turns are replayed to the model: the last exchange.
const CONTEXT_TURNS: usize = 2;

pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }

    pub async fn complete(
        &self,
        system: &str,
        history: &[ChatTurn],
        question: &str,
    ) -> Result<String, LlmError> {
        if !self.is_configured() {
            return Err(LlmError::NotConfigured);
        }

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .timeout(self.timeout)
            .json(&json!({
                "model": self.config.model,
                "messages": build_messages(system, history, question),
                "temperature": 0.3
            }))
            .send()
            .await
            .map_err(|err| LlmError::Request(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Rejected { status, body });
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|err| LlmError::Request(format!("parse failed: {err}")))?;
        let text = payload
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or("")
            .to_string();
        if text.is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(text)
    }
}

fn build_messages(system: &str, history: &[ChatTurn], question: &str) -> Vec<Value> {
    let start = history.len().saturating_sub(CONTEXT_TURNS);
    let mut messages = vec![json!({ "role": "system", "content": system })];
    messages.extend(
        history[start..]
            .iter()
            .map(|turn| json!({ "role": turn.role, "content": turn.content })),
    );
    messages.push(json!({ "role": "user", "content": question }));
    messages
}
