mod blocks;
mod chunker;
mod section_tag;

pub use chunker::{Chunker, ChunkingConfig};
pub use section_tag::SectionTagger;

use crate::model::{Chunk, ChunkMetadata};

pub fn label_chunks(chunks: &[Chunk], tagger: &SectionTagger) -> Vec<ChunkMetadata> {
    chunks
        .iter()
        .map(|chunk| ChunkMetadata {
            chunk_id: chunk.id,
            label: tagger.label_or_unlabeled(&chunk.text),
            start_char: chunk.start_char,
            end_char: chunk.end_char,
        })
        .collect()
}
