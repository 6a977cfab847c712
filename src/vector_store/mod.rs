use std::cmp::Ordering;

use anyhow::{Result, bail, ensure};

use crate::model::ChunkMetadata;


const NORM_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit<'a> {
    pub id: usize,
    pub score: f64,
    pub text: &'a str,
    pub meta: &'a ChunkMetadata,
}

#[derive(Debug, Clone)]
struct IndexedVector {
    embedding: Vec<f32>,
    text: String,
    meta: ChunkMetadata,
}

/// Append-only exact inner-product index over unit-normalised embeddings.
///
/// Ids are assigned by insertion order and every inserted `ChunkMetadata::chunk_id` must equal
/// the id it receives, so search results can be resolved back to chunks without a lookup table.
#[derive(Debug, Clone)]
pub struct VectorStore {
    dim: usize,
    entries: Vec<IndexedVector>,
}

impl VectorStore {
    pub fn new(dim: usize) -> Result<Self> {
        ensure!(dim > 0, "vector store dimension must be positive");
        Ok(Self {
            dim,
            entries: Vec::new(),
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add(
        &mut self,
        embeddings: &[Vec<f32>],
        texts: &[String],
        metas: &[ChunkMetadata],
    ) -> Result<Vec<usize>> {
        ensure!(
            embeddings.len() == texts.len() && texts.len() == metas.len(),
            "vector store add requires equal batch lengths: embeddings={} texts={} metas={}",
            embeddings.len(),
            texts.len(),
            metas.len()
        );

        let start_id = self.entries.len();
        for (offset, (embedding, meta)) in embeddings.iter().zip(metas).enumerate() {
            if embedding.len() != self.dim {
                bail!(
                    "embedding {} has dimension {}, store expects {}",
                    offset,
                    embedding.len(),
                    self.dim
                );
            }

            let expected_id = start_id + offset;
            if meta.chunk_id != expected_id {
                bail!(
                    "chunk_id {} would be stored under insertion id {}; chunks must be added in id order without gaps",
                    meta.chunk_id,
                    expected_id
                );
            }
        }

        let mut ids = Vec::<usize>::with_capacity(embeddings.len());
        for ((embedding, text), meta) in embeddings.iter().zip(texts).zip(metas) {
            ids.push(self.entries.len());
            self.entries.push(IndexedVector {
                embedding: normalize(embedding),
                text: text.clone(),
                meta: meta.clone(),
            });
        }

        Ok(ids)
    }

    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<SearchHit<'_>>> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        ensure!(
            query_embedding.len() == self.dim,
            "query embedding has dimension {}, store expects {}",
            query_embedding.len(),
            self.dim
        );

        let query = normalize(query_embedding);
        let mut scored = self
            .entries
            .iter()
            .enumerate()
            .map(|(id, entry)| (id, inner_product(&query, &entry.embedding)))
            .collect::<Vec<(usize, f64)>>();

        scored.sort_by(|left, right| {
            right
                .1
                .partial_cmp(&left.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.0.cmp(&right.0))
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(id, score)| {
                let entry = &self.entries[id];
                SearchHit {
                    id,
                    score,
                    text: &entry.text,
                    meta: &entry.meta,
                }
            })
            .collect())
    }
}

fn normalize(values: &[f32]) -> Vec<f32> {
    let norm = values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>()
        .sqrt()
        + NORM_EPSILON;

    values
        .iter()
        .map(|value| (f64::from(*value) / norm) as f32)
        .collect()
}

fn inner_product(left: &[f32], right: &[f32]) -> f64 {
    left.iter()
        .zip(right)
        .map(|(left_value, right_value)| f64::from(*left_value) * f64::from(*right_value))
        .sum()
}
