use anyhow::{Context, Result, bail, ensure};
use tracing::info;

use crate::chunking::{Chunker, ChunkingConfig, SectionTagger, label_chunks};
use crate::model::{ChatMessage, ChatRole, Chunk, ChunkMetadata};
use crate::providers::EmbeddingProvider;
use crate::util::{sha256_text, short_hash};
use crate::vector_store::VectorStore;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IndexStatus {
    Built,
    Reused,
}

pub struct ContractIndex {
    pub content_hash: String,
    pub text: String,
    pub chunks: Vec<Chunk>,
    pub metadata: Vec<ChunkMetadata>,
    pub discarded_fragments: usize,
    pub embedding_model: String,
    pub store: VectorStore,
}

/// One loaded contract plus its chat history. Reloading the same text keeps the index.
pub struct ContractSession {
    chunker: Chunker,
    tagger: SectionTagger,
    index: Option<ContractIndex>,
    history: Vec<ChatMessage>,
}

impl ContractSession {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        Ok(Self {
            chunker: Chunker::new(config)?,
            tagger: SectionTagger::new()?,
            index: None,
            history: Vec::new(),
        })
    }

    pub fn load_contract(
        &mut self,
        text: &str,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<IndexStatus> {
        let content_hash = sha256_text(text);
        if let Some(index) = &self.index {
            if index.content_hash == content_hash {
                info!(
                    hash = short_hash(&content_hash),
                    chunks = index.chunks.len(),
                    "contract unchanged; reusing index"
                );
                return Ok(IndexStatus::Reused);
            }
        }

        let index = self.build_index(text, content_hash, embedder)?;
        info!(
            hash = short_hash(&index.content_hash),
            chunks = index.store.len(),
            dimension = index.store.dim(),
            discarded = index.discarded_fragments,
            "index built"
        );
        self.index = Some(index);
        self.history.clear();
        Ok(IndexStatus::Built)
    }

    fn build_index(
        &self,
        text: &str,
        content_hash: String,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<ContractIndex> {
        let outcome = self.chunker.chunk(text);
        if outcome.chunks.is_empty() {
            bail!(
                "contract produced no chunks of at least {} characters; nothing to index",
                self.chunker.config().min_chars
            );
        }

        let metadata = label_chunks(&outcome.chunks, &self.tagger);
        let texts = outcome
            .chunks
            .iter()
            .map(|chunk| chunk.text.clone())
            .collect::<Vec<String>>();
        let embeddings = embedder.embed(&texts).with_context(|| {
            format!(
                "failed to embed {} chunks with model {}",
                texts.len(),
                embedder.model_id()
            )
        })?;
        ensure!(
            embeddings.len() == texts.len(),
            "embedding model {} returned {} vectors for {} chunks",
            embedder.model_id(),
            embeddings.len(),
            texts.len()
        );

        let dimension = embeddings.first().map(Vec::len).unwrap_or_default();
        let mut store = VectorStore::new(dimension)
            .with_context(|| {
                format!("embedding model {} returned empty vectors", embedder.model_id())
            })?;
        store.add(&embeddings, &texts, &metadata)?;

        Ok(ContractIndex {
            content_hash,
            text: text.to_string(),
            chunks: outcome.chunks,
            metadata,
            discarded_fragments: outcome.discarded_fragments,
            embedding_model: embedder.model_id().to_string(),
            store,
        })
    }

    pub fn require_index(&self) -> Result<&ContractIndex> {
        self.index
            .as_ref()
            .context("no contract has been loaded into this session")
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn record_exchange(&mut self, question: &str, answer: &str) {
        self.history.push(ChatMessage {
            role: ChatRole::User,
            content: question.to_string(),
        });
        self.history.push(ChatMessage {
            role: ChatRole::Assistant,
            content: answer.to_string(),
        });
    }
}
