use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::PathBuf;
use anyhow::{Result, anyhow};
use chrono::Utc;

use crate::providers::{CompletionProvider, EmbeddingProvider};

/// Embeds text as keyword counts over a fixed vocabulary, one dimension per keyword.
pub struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&'static str]) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
        }
    }
}

impl EmbeddingProvider for KeywordEmbedder {
    fn model_id(&self) -> &str {
        "keyword-test"
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lowered = text.to_lowercase();
                self.vocabulary
                    .iter()
                    .map(|keyword| lowered.matches(keyword).count() as f32)
                    .collect()
            })
            .collect())
    }
}

pub struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn model_id(&self) -> &str {
        "failing-test"
    }

    fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(anyhow!("embedding service unavailable"))
    }
}

/// Replays canned responses in order and records every prompt it receives.
pub struct ScriptedCompletion {
    responses: RefCell<VecDeque<Result<String, String>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: RefCell::new(
                responses
                    .into_iter()
                    .map(|response| Ok(response.to_string()))
                    .collect(),
            ),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn with_failure(message: &str) -> Self {
        Self {
            responses: RefCell::new(VecDeque::from([Err(message.to_string())])),
            prompts: RefCell::new(Vec::new()),
        }
    }

    pub fn push_response(&self, response: &str) {
        self.responses
            .borrow_mut()
            .push_back(Ok(response.to_string()));
    }

    pub fn push_failure(&self, message: &str) {
        self.responses
            .borrow_mut()
            .push_back(Err(message.to_string()));
    }

    pub fn call_count(&self) -> usize {
        self.prompts.borrow().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.borrow().last().cloned()
    }
}

impl CompletionProvider for ScriptedCompletion {
    fn model_id(&self) -> &str {
        "scripted-test"
    }

    fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        match self.responses.borrow_mut().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted response left")),
        }
    }
}

pub fn unique_temp_dir(label: &str) -> PathBuf {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let dir = std::env::temp_dir().join(format!(
        "contract_audit_{label}_{}_{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).expect("create temp test directory");
    dir
}
