use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use anyhow::Result;

use super::EmbeddingProvider;

pub const DEFAULT_LOCAL_DIMENSIONS: usize = 384;
const LOCAL_MODEL_PREFIX: &str = "local-hash-v1";
const MIN_LOCAL_DIMENSIONS: usize = 8;
const BIGRAM_WEIGHT: f32 = 0.5;

/// Offline embedder: signed feature hashing of contract terms and adjacent term pairs,
/// L2-normalised. Deterministic for a given dimension count.
pub struct LocalHashEmbedder {
    model_id: String,
    dimensions: usize,
}

impl LocalHashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(MIN_LOCAL_DIMENSIONS);
        Self {
            model_id: format!("{LOCAL_MODEL_PREFIX}-{dimensions}d"),
            dimensions,
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0_f32; self.dimensions];
        let terms = contract_terms(text);

        for (position, term) in terms.iter().enumerate() {
            self.accumulate(&mut vector, term, 1.0);
            if let Some(next) = terms.get(position + 1) {
                self.accumulate(&mut vector, &format!("{term} {next}"), BIGRAM_WEIGHT);
            }
        }

        let norm = vector
            .iter()
            .map(|value| f64::from(*value) * f64::from(*value))
            .sum::<f64>()
            .sqrt() as f32;
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        let hash = hasher.finish();

        let slot = (hash % self.dimensions as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[slot] += sign * weight;
    }
}

fn contract_terms(text: &str) -> Vec<String> {
    text.split(|character: char| !character.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl EmbeddingProvider for LocalHashEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
