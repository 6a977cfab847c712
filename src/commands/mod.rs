pub mod ask;
pub mod check;
pub mod ingest;

use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::{ChunkingArgs, ExtractionArgs};
use crate::extract::{ExtractedText, extract_contract_text};
use crate::providers::EmbeddingProvider;
use crate::session::ContractSession;

struct PreparedContract {
    extracted: ExtractedText,
    session: ContractSession,
}

fn prepare_contract(
    contract: &Path,
    extraction: &ExtractionArgs,
    chunking: &ChunkingArgs,
    embedder: &dyn EmbeddingProvider,
) -> Result<PreparedContract> {
    let extracted = extract_contract_text(contract, extraction)?;
    let mut session = ContractSession::new(chunking.config())?;
    session
        .load_contract(&extracted.text, embedder)
        .with_context(|| format!("failed to index contract {}", contract.display()))?;
    Ok(PreparedContract { extracted, session })
}
