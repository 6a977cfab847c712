use anyhow::{Context, Result};
use tracing::debug;

use crate::model::{Requirement, RetrievedEvidence};
use crate::providers::{EmbeddingProvider, embed_one};
use crate::vector_store::VectorStore;


#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub min_score: f64,
}

impl RetrievalConfig {
    pub fn requirements() -> Self {
        Self {
            top_k: 12,
            min_score: 0.25,
        }
    }

    pub fn chat() -> Self {
        Self {
            top_k: 15,
            min_score: 0.0,
        }
    }
}

pub struct Retriever<'a> {
    embedder: &'a dyn EmbeddingProvider,
}

impl<'a> Retriever<'a> {
    pub fn new(embedder: &'a dyn EmbeddingProvider) -> Self {
        Self { embedder }
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model_id()
    }

    pub fn retrieve(
        &self,
        store: &VectorStore,
        requirement: &Requirement,
        config: RetrievalConfig,
    ) -> Result<Vec<RetrievedEvidence>> {
        let query = requirement_query(
            &requirement.name,
            &requirement.description,
            &requirement.controls,
        );
        self.search_filtered(store, &query, config)
            .with_context(|| format!("retrieval failed for requirement '{}'", requirement.name))
    }

    pub fn retrieve_for_question(
        &self,
        store: &VectorStore,
        question: &str,
        config: RetrievalConfig,
    ) -> Result<Vec<RetrievedEvidence>> {
        self.search_filtered(store, question.trim(), config)
            .context("retrieval failed for chat question")
    }

    fn search_filtered(
        &self,
        store: &VectorStore,
        query: &str,
        config: RetrievalConfig,
    ) -> Result<Vec<RetrievedEvidence>> {
        let query_embedding = embed_one(self.embedder, query)?;
        let hits = store.search(&query_embedding, config.top_k)?;
        let hit_count = hits.len();

        let evidence = hits
            .into_iter()
            .filter(|hit| hit.score >= config.min_score)
            .map(|hit| RetrievedEvidence {
                chunk_id: hit.id,
                label: hit.meta.label.clone(),
                score: hit.score,
                text: hit.text.to_string(),
            })
            .collect::<Vec<RetrievedEvidence>>();

        debug!(
            top_k = config.top_k,
            min_score = config.min_score,
            hits = hit_count,
            kept = evidence.len(),
            "retrieval completed"
        );

        Ok(evidence)
    }
}

pub fn requirement_query(name: &str, description: &str, controls: &[String]) -> String {
    format!(
        "Requirement: {name}\nDescription: {description}\nControls: {}",
        controls.join(", ")
    )
}
