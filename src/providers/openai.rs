use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::cli::ProviderArgs;

use super::{CompletionProvider, EmbeddingProvider};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Option<Duration>,
}

impl OpenAiConfig {
    pub fn from_args(args: &ProviderArgs) -> Result<Self> {
        let api_key = std::env::var(OPENAI_API_KEY_ENV).unwrap_or_default();
        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            bail!("OpenAI backend requires {OPENAI_API_KEY_ENV} to be set in the environment");
        }

        Ok(Self {
            base_url: normalize_base_url(&args.openai_base_url),
            api_key,
            timeout: args.request_timeout_secs.map(Duration::from_secs),
        })
    }

    fn build_client(&self) -> Result<Client> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().context("failed to build http client")
    }
}

fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix("/v1").unwrap_or(trimmed);
    if trimmed.is_empty() {
        DEFAULT_OPENAI_BASE_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

fn post_json(
    client: &Client,
    config: &OpenAiConfig,
    url: &str,
    body: &serde_json::Value,
) -> Result<reqwest::blocking::Response> {
    let response = client
        .post(url)
        .bearer_auth(&config.api_key)
        .json(body)
        .send()
        .with_context(|| format!("failed to reach OpenAI at {url}"))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().unwrap_or_default();
        bail!("openai http error {status}: {}", text.trim());
    }

    Ok(response)
}

pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiConfig,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiConfig, model: String) -> Result<Self> {
        Ok(Self {
            client: config.build_client()?,
            config,
            model,
        })
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsRow {
    embedding: Vec<f32>,
    index: usize,
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.config.base_url);
        let body = json!({
            "model": self.model,
            "input": texts,
            "encoding_format": "float"
        });

        debug!(model = %self.model, inputs = texts.len(), "requesting embeddings");
        let response = post_json(&self.client, &self.config, &url, &body)?;
        let parsed: EmbeddingsResponse = response
            .json()
            .context("openai embeddings returned invalid JSON")?;

        rows_in_input_order(parsed.data, texts.len())
    }
}

fn rows_in_input_order(rows: Vec<EmbeddingsRow>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if rows.len() != expected {
        bail!(
            "openai embeddings returned {} vectors for {} inputs",
            rows.len(),
            expected
        );
    }

    let mut out = vec![Vec::<f32>::new(); expected];
    for row in rows {
        let slot = out
            .get_mut(row.index)
            .ok_or_else(|| anyhow!("openai embeddings returned out-of-range index {}", row.index))?;
        *slot = row.embedding;
    }

    if out.iter().any(Vec::is_empty) {
        bail!("openai embeddings returned empty vector(s)");
    }
    Ok(out)
}

pub struct OpenAiChat {
    client: Client,
    config: OpenAiConfig,
    model: String,
}

impl OpenAiChat {
    pub fn new(config: OpenAiConfig, model: String) -> Result<Self> {
        Ok(Self {
            client: config.build_client()?,
            config,
            model,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl CompletionProvider for OpenAiChat {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt }
            ]
        });

        debug!(model = %self.model, prompt_chars = prompt.len(), "requesting chat completion");
        let response = post_json(&self.client, &self.config, &url, &body)?;
        let parsed: ChatResponse = response
            .json()
            .context("openai chat completion returned invalid JSON")?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| anyhow!("openai chat completion returned no message content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_strips_trailing_slash_and_version() {
        assert_eq!(
            normalize_base_url("https://api.openai.com/"),
            "https://api.openai.com"
        );
        assert_eq!(
            normalize_base_url("http://localhost:8080/v1/"),
            "http://localhost:8080"
        );
        assert_eq!(normalize_base_url("  "), DEFAULT_OPENAI_BASE_URL);
    }

    #[test]
    fn embedding_rows_are_reordered_by_index() {
        let rows = vec![
            EmbeddingsRow {
                embedding: vec![2.0],
                index: 1,
            },
            EmbeddingsRow {
                embedding: vec![1.0],
                index: 0,
            },
        ];

        let ordered = rows_in_input_order(rows, 2).expect("rows should reorder");
        assert_eq!(ordered, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn embedding_row_count_mismatch_is_an_error() {
        let rows = vec![EmbeddingsRow {
            embedding: vec![1.0],
            index: 0,
        }];
        assert!(rows_in_input_order(rows, 2).is_err());
    }

    #[test]
    fn chat_response_parses_first_choice() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"  {\"a\":1} "}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).expect("chat response should parse");
        assert_eq!(
            parsed.choices[0].message.content.as_deref().map(str::trim),
            Some("{\"a\":1}")
        );
    }
}
