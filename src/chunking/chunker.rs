use anyhow::{Result, ensure};
use tracing::debug;

use crate::model::Chunk;

use super::blocks::{BlockSplitter, char_len, normalize_line_endings, split_oversized_paragraph};

const PARAGRAPH_SEPARATOR_CHARS: usize = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub min_chars: usize,
    pub overlap_paragraphs: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 3000,
            min_chars: 400,
            overlap_paragraphs: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChunkingOutcome {
    pub chunks: Vec<Chunk>,
    pub discarded_fragments: usize,
}

pub struct Chunker {
    config: ChunkingConfig,
    splitter: BlockSplitter,
}

struct ParagraphBuffer {
    paragraphs: Vec<String>,
    len: usize,
    start_char: usize,
}

impl ParagraphBuffer {
    fn empty(start_char: usize) -> Self {
        Self {
            paragraphs: Vec::new(),
            len: 0,
            start_char,
        }
    }
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        ensure!(
            config.max_chars > PARAGRAPH_SEPARATOR_CHARS,
            "max_chars must be greater than {PARAGRAPH_SEPARATOR_CHARS}, got {}",
            config.max_chars
        );
        ensure!(
            config.min_chars <= config.max_chars,
            "min_chars ({}) must not exceed max_chars ({})",
            config.min_chars,
            config.max_chars
        );

        Ok(Self {
            config,
            splitter: BlockSplitter::new()?,
        })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn chunk(&self, text: &str) -> ChunkingOutcome {
        let normalized = normalize_line_endings(text);
        let blocks = self.splitter.split_blocks(&normalized);
        let mut outcome = ChunkingOutcome::default();
        let max_piece_chars = self.config.max_chars - PARAGRAPH_SEPARATOR_CHARS;

        for block in blocks {
            let paragraphs = self
                .splitter
                .split_paragraphs(&block.text)
                .iter()
                .flat_map(|paragraph| split_oversized_paragraph(paragraph, max_piece_chars))
                .collect::<Vec<String>>();

            let mut buffer = ParagraphBuffer::empty(block.start_char);
            let mut running = block.start_char;

            for paragraph in paragraphs {
                let paragraph_len = char_len(&paragraph) + PARAGRAPH_SEPARATOR_CHARS;

                if buffer.paragraphs.is_empty() {
                    buffer.paragraphs.push(paragraph);
                    buffer.len = paragraph_len;
                    buffer.start_char = running;
                } else if buffer.len + paragraph_len <= self.config.max_chars {
                    buffer.paragraphs.push(paragraph);
                    buffer.len += paragraph_len;
                } else {
                    let emitted =
                        self.flush(&buffer, block.heading.as_deref(), running, &mut outcome);
                    let overlap = if emitted {
                        self.overlap_tail(&buffer.paragraphs)
                    } else {
                        Vec::new()
                    };
                    let overlap_len = overlap
                        .iter()
                        .map(|value| char_len(value) + PARAGRAPH_SEPARATOR_CHARS)
                        .sum::<usize>();

                    buffer.start_char = if overlap.is_empty() {
                        running
                    } else {
                        running.saturating_sub(overlap_len).max(block.start_char)
                    };
                    buffer.paragraphs = overlap;
                    buffer.paragraphs.push(paragraph);
                    buffer.len = overlap_len + paragraph_len;
                }

                running += paragraph_len;
            }

            self.flush(&buffer, block.heading.as_deref(), running, &mut outcome);
        }

        debug!(
            chunks = outcome.chunks.len(),
            discarded_fragments = outcome.discarded_fragments,
            max_chars = self.config.max_chars,
            min_chars = self.config.min_chars,
            "chunking completed"
        );

        outcome
    }

    /// Last `overlap_paragraphs` of a flushed buffer. The seeded buffer may exceed
    /// `max_chars` by the overlap length.
    fn overlap_tail(&self, flushed: &[String]) -> Vec<String> {
        let keep = self.config.overlap_paragraphs.min(flushed.len());
        flushed[flushed.len() - keep..].to_vec()
    }

    fn flush(
        &self,
        buffer: &ParagraphBuffer,
        heading: Option<&str>,
        end_char: usize,
        outcome: &mut ChunkingOutcome,
    ) -> bool {
        if buffer.paragraphs.is_empty() {
            return false;
        }

        let text = buffer.paragraphs.join("\n\n").trim().to_string();
        let text_len = char_len(&text);
        if text_len < self.config.min_chars {
            outcome.discarded_fragments += 1;
            debug!(
                heading = heading.unwrap_or(""),
                start_char = buffer.start_char,
                text_len,
                min_chars = self.config.min_chars,
                "discarding undersized chunk buffer"
            );
            return false;
        }

        outcome.chunks.push(Chunk {
            id: outcome.chunks.len(),
            text,
            section_heading: heading.map(ToOwned::to_owned),
            start_char: buffer.start_char,
            end_char: end_char.max(buffer.start_char),
        });
        true
    }
}
