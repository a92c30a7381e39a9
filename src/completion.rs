//! Answer synthesis via the OpenAI chat completions API.
//!
//! Stuffs the retrieved chunks into the prompt as context and asks the model
//! to answer from that context only. Requests run at temperature 0 so the
//! same question and context reproduce the same answer.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::{CompletionConfig, Config, Secrets};
use crate::traits::Completer;

const SYSTEM_PROMPT: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Create the configured [`Completer`].
pub fn create_completer(config: &Config, secrets: &Secrets) -> Result<Box<dyn Completer>> {
    Ok(Box::new(OpenAiCompleter::new(
        &config.completion,
        secrets.require_openai()?.to_string(),
    )))
}

pub struct OpenAiCompleter {
    model: String,
    api_key: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl OpenAiCompleter {
    pub fn new(config: &CompletionConfig, api_key: String) -> Self {
        Self {
            model: config.model.clone(),
            api_key,
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
        }
    }
}

/// Assemble the extractive-QA prompt from retrieved chunks and the question.
fn build_user_prompt(question: &str, context: &[String]) -> String {
    let mut prompt = String::from("Context:\n");
    for chunk in context {
        prompt.push_str(chunk);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Question: ");
    prompt.push_str(question);
    prompt
}

#[async_trait]
impl Completer for OpenAiCompleter {
    async fn complete(&self, question: &str, context: &[String]) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_user_prompt(question, context) },
            ],
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post("https://api.openai.com/v1/chat/completions")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_completion_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Completion failed after retries")))
    }
}

fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing completion content"))
}
