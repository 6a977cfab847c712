mod local;
mod openai;

pub use local::{DEFAULT_LOCAL_DIMENSIONS, LocalHashEmbedder};
pub use openai::{DEFAULT_OPENAI_BASE_URL, OpenAiChat, OpenAiConfig, OpenAiEmbedder};

use anyhow::{Context, Result, ensure};
use tracing::info;

use crate::cli::{EmbeddingBackend, ProviderArgs};

pub trait EmbeddingProvider {
    fn model_id(&self) -> &str;

    /// One vector per input, in input order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

pub trait CompletionProvider {
    fn model_id(&self) -> &str;

    fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

pub fn embed_one(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let mut vectors = provider
        .embed(&[text.to_string()])
        .with_context(|| format!("embedding request failed for model {}", provider.model_id()))?;
    ensure!(
        vectors.len() == 1,
        "embedding model {} returned {} vectors for 1 input",
        provider.model_id(),
        vectors.len()
    );
    Ok(vectors.remove(0))
}

pub fn build_embedding_provider(args: &ProviderArgs) -> Result<Box<dyn EmbeddingProvider>> {
    match args.embedding_backend {
        EmbeddingBackend::Local => {
            info!(dimensions = args.local_dimensions, "using local hash embeddings");
            Ok(Box::new(LocalHashEmbedder::new(args.local_dimensions)))
        }
        EmbeddingBackend::Openai => {
            let config = OpenAiConfig::from_args(args)?;
            info!(
                model = %args.embedding_model,
                base_url = %config.base_url,
                "using OpenAI embeddings"
            );
            Ok(Box::new(OpenAiEmbedder::new(
                config,
                args.embedding_model.clone(),
            )?))
        }
    }
}

pub fn build_completion_provider(args: &ProviderArgs) -> Result<Box<dyn CompletionProvider>> {
    let config = OpenAiConfig::from_args(args)?;
    info!(model = %args.chat_model, base_url = %config.base_url, "using OpenAI chat completions");
    Ok(Box::new(OpenAiChat::new(config, args.chat_model.clone())?))
}
