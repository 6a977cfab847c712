use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::chunking::ChunkingConfig;
use crate::providers::{DEFAULT_LOCAL_DIMENSIONS, DEFAULT_OPENAI_BASE_URL};
use crate::retrieval::RetrievalConfig;

#[derive(Parser, Debug)]
#[command(
    name = "contract-audit",
    version,
    about = "Contract compliance checks and grounded Q&A over retrieved contract language"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Ingest(IngestArgs),
    Check(CheckArgs),
    Ask(AskArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long)]
    pub contract: PathBuf,

    #[arg(long, default_value = ".cache/contract-audit")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[command(flatten)]
    pub extraction: ExtractionArgs,

    #[command(flatten)]
    pub chunking: ChunkingArgs,

    #[command(flatten)]
    pub providers: ProviderArgs,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[arg(long)]
    pub contract: PathBuf,

    #[arg(long)]
    pub requirements: PathBuf,

    #[arg(long, default_value = ".cache/contract-audit")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = RetrievalConfig::requirements().top_k)]
    pub top_k: usize,

    #[arg(long, default_value_t = RetrievalConfig::requirements().min_score)]
    pub min_score: f64,

    #[arg(long, default_value_t = false)]
    pub fail_fast: bool,

    #[arg(long, default_value_t = false)]
    pub debug_retrieval: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(flatten)]
    pub extraction: ExtractionArgs,

    #[command(flatten)]
    pub chunking: ChunkingArgs,

    #[command(flatten)]
    pub providers: ProviderArgs,
}

impl CheckArgs {
    pub fn retrieval(&self) -> RetrievalConfig {
        RetrievalConfig {
            top_k: self.top_k,
            min_score: self.min_score,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AskArgs {
    #[arg(long)]
    pub contract: PathBuf,

    #[arg(long)]
    pub question: Option<String>,

    #[arg(long, default_value_t = RetrievalConfig::chat().top_k)]
    pub chat_top_k: usize,

    #[arg(long, default_value_t = RetrievalConfig::chat().min_score)]
    pub chat_min_score: f64,

    #[arg(long, default_value_t = false)]
    pub show_evidence: bool,

    #[command(flatten)]
    pub extraction: ExtractionArgs,

    #[command(flatten)]
    pub chunking: ChunkingArgs,

    #[command(flatten)]
    pub providers: ProviderArgs,
}

impl AskArgs {
    pub fn retrieval(&self) -> RetrievalConfig {
        RetrievalConfig {
            top_k: self.chat_top_k,
            min_score: self.chat_min_score,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ExtractionArgs {
    #[arg(long, value_enum, default_value_t = OcrMode::Auto)]
    pub ocr_mode: OcrMode,

    #[arg(long, default_value = "eng")]
    pub ocr_lang: String,

    #[arg(long, default_value_t = 200)]
    pub min_text_chars: usize,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OcrMode {
    Off,
    Auto,
}

#[derive(Args, Debug, Clone)]
pub struct ChunkingArgs {
    #[arg(long, default_value_t = ChunkingConfig::default().max_chars)]
    pub max_chars: usize,

    #[arg(long, default_value_t = ChunkingConfig::default().min_chars)]
    pub min_chars: usize,

    #[arg(long, default_value_t = ChunkingConfig::default().overlap_paragraphs)]
    pub overlap_paragraphs: usize,
}

impl ChunkingArgs {
    pub fn config(&self) -> ChunkingConfig {
        ChunkingConfig {
            max_chars: self.max_chars,
            min_chars: self.min_chars,
            overlap_paragraphs: self.overlap_paragraphs,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    #[arg(long, value_enum, default_value_t = EmbeddingBackend::Local)]
    pub embedding_backend: EmbeddingBackend,

    #[arg(long, default_value_t = DEFAULT_LOCAL_DIMENSIONS)]
    pub local_dimensions: usize,

    #[arg(long, default_value = "text-embedding-3-small")]
    pub embedding_model: String,

    #[arg(long, default_value = "gpt-4o-mini")]
    pub chat_model: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    pub openai_base_url: String,

    #[arg(long)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum EmbeddingBackend {
    Local,
    Openai,
}
