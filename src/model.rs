use std::fmt;

use serde::{Deserialize, Serialize};

pub const UNLABELED: &str = "Unlabeled";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: usize,
    pub text: String,
    pub section_heading: Option<String>,
    pub start_char: usize,
    pub end_char: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_id: usize,
    pub label: String,
    pub start_char: usize,
    pub end_char: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedEvidence {
    pub chunk_id: usize,
    pub label: String,
    pub score: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlEvidence {
    pub chunk_id: i64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub quote: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlVerdict {
    pub name: String,
    pub covered: bool,
    pub evidence: Vec<ControlEvidence>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplianceStatus {
    #[serde(rename = "Fully Compliant")]
    FullyCompliant,
    #[serde(rename = "Partially Compliant")]
    PartiallyCompliant,
    #[serde(rename = "Non-Compliant")]
    NonCompliant,
}

impl ComplianceStatus {
    pub fn from_coverage(covered_count: usize, total_controls: usize) -> Self {
        if total_controls > 0 && covered_count == total_controls {
            Self::FullyCompliant
        } else if covered_count == 0 {
            Self::NonCompliant
        } else {
            Self::PartiallyCompliant
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullyCompliant => "Fully Compliant",
            Self::PartiallyCompliant => "Partially Compliant",
            Self::NonCompliant => "Non-Compliant",
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementVerdict {
    pub requirement: String,
    pub status: ComplianceStatus,
    pub confidence: u8,
    pub controls: Vec<ControlVerdict>,
    pub rationale: String,
    pub gaps: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,
    pub description: String,
    pub controls: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequirementOutcome {
    Evaluated {
        verdict: RequirementVerdict,
        evidence_chunk_ids: Vec<usize>,
    },
    Failed {
        requirement: String,
        error: String,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSummary {
    pub fully_compliant: usize,
    pub partially_compliant: usize,
    pub non_compliant: usize,
    pub failed: usize,
}

impl StatusSummary {
    pub fn from_outcomes(outcomes: &[RequirementOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome {
                RequirementOutcome::Evaluated { verdict, .. } => match verdict.status {
                    ComplianceStatus::FullyCompliant => summary.fully_compliant += 1,
                    ComplianceStatus::PartiallyCompliant => summary.partially_compliant += 1,
                    ComplianceStatus::NonCompliant => summary.non_compliant += 1,
                },
                RequirementOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub min_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    pub report_version: u32,
    pub generated_at: String,
    pub contract_hash: String,
    pub source_path: String,
    pub extraction_backend: String,
    pub chunk_count: usize,
    pub embedding_model: String,
    pub completion_model: String,
    pub retrieval: RetrievalSettings,
    pub summary: StatusSummary,
    pub outcomes: Vec<RequirementOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_retrieval: Option<Vec<RequirementEvidenceTrace>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequirementEvidenceTrace {
    pub requirement: String,
    pub evidence: Vec<RetrievedEvidence>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestChunkEntry {
    pub chunk_id: usize,
    pub label: String,
    pub section_heading: Option<String>,
    pub start_char: usize,
    pub end_char: usize,
    pub char_count: usize,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_path: String,
    pub contract_hash: String,
    pub extraction_backend: String,
    pub text_char_count: usize,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub max_chars: usize,
    pub min_chars: usize,
    pub overlap_paragraphs: usize,
    pub chunk_count: usize,
    pub discarded_fragments: usize,
    pub chunks: Vec<IngestChunkEntry>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}
