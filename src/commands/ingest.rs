use std::collections::BTreeMap;
use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

use crate::cli::IngestArgs;
use crate::extract::ExtractedText;
use crate::model::{IngestChunkEntry, IngestManifest};
use crate::providers::build_embedding_provider;
use crate::session::ContractIndex;
use crate::util::{now_utc_string, short_hash, truncate_chars, write_json_pretty};

use super::prepare_contract;

const PREVIEW_CHARS: usize = 120;

pub fn run(args: IngestArgs) -> Result<()> {
    let embedder = build_embedding_provider(&args.providers)?;
    let prepared = prepare_contract(
        &args.contract,
        &args.extraction,
        &args.chunking,
        embedder.as_ref(),
    )?;
    let index = prepared.session.require_index()?;

    let manifest = build_manifest(&args, &prepared.extracted, index);
    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.cache_root
            .join("manifests")
            .join(format!("ingest_{}.json", short_hash(&index.content_hash)))
    });
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), chunks = manifest.chunk_count, "wrote ingest manifest");

    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Contract: {}", args.contract.display())?;
    writeln!(output, "Hash: {}", index.content_hash)?;
    writeln!(
        output,
        "Extraction: backend={} chars={}",
        manifest.extraction_backend, manifest.text_char_count
    )?;
    writeln!(
        output,
        "Chunks: {} (discarded fragments: {}) embedding={} dim={}",
        manifest.chunk_count,
        manifest.discarded_fragments,
        manifest.embedding_model,
        manifest.embedding_dim
    )?;
    writeln!(output, "Labels:")?;
    for (label, count) in label_distribution(&manifest.chunks) {
        writeln!(output, "\t{label}\t{count}")?;
    }
    writeln!(output, "Manifest: {}", manifest_path.display())?;
    output.flush()?;
    Ok(())
}

fn build_manifest(
    args: &IngestArgs,
    extracted: &ExtractedText,
    index: &ContractIndex,
) -> IngestManifest {
    let chunks = index
        .chunks
        .iter()
        .zip(&index.metadata)
        .map(|(chunk, meta)| IngestChunkEntry {
            chunk_id: chunk.id,
            label: meta.label.clone(),
            section_heading: chunk.section_heading.clone(),
            start_char: chunk.start_char,
            end_char: chunk.end_char,
            char_count: chunk.text.chars().count(),
            preview: truncate_chars(
                &chunk.text.split_whitespace().collect::<Vec<&str>>().join(" "),
                PREVIEW_CHARS,
            ),
        })
        .collect::<Vec<IngestChunkEntry>>();

    IngestManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_path: args.contract.display().to_string(),
        contract_hash: index.content_hash.clone(),
        extraction_backend: extracted.backend.as_str().to_string(),
        text_char_count: index.text.chars().count(),
        embedding_model: index.embedding_model.clone(),
        embedding_dim: index.store.dim(),
        max_chars: args.chunking.max_chars,
        min_chars: args.chunking.min_chars,
        overlap_paragraphs: args.chunking.overlap_paragraphs,
        chunk_count: chunks.len(),
        discarded_fragments: index.discarded_fragments,
        chunks,
    }
}

/// Most frequent label first; ties broken alphabetically.
fn label_distribution(chunks: &[IngestChunkEntry]) -> Vec<(String, usize)> {
    let mut counts = BTreeMap::<String, usize>::new();
    for chunk in chunks {
        *counts.entry(chunk.label.clone()).or_insert(0) += 1;
    }

    let mut distribution = counts.into_iter().collect::<Vec<(String, usize)>>();
    distribution.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
    distribution
}
