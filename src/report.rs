use std::cmp::Ordering;
use std::io::Write;

use anyhow::{Context, Result};
use regex::Regex;

use crate::model::{ComplianceReport, RequirementOutcome, RequirementVerdict};
use crate::util::short_hash;

pub const EMPTY_CELL: &str = "—";
pub const MAX_QUOTE_GROUPS: usize = 8;
pub const MAX_QUOTES_PER_GROUP: usize = 2;

const FALLBACK_GROUP_LABEL: &str = "Contract";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteGroup {
    pub label: String,
    pub quotes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub requirement: String,
    pub status: String,
    pub confidence: String,
    pub quote_groups: Vec<QuoteGroup>,
    pub rationale: String,
}

pub struct ReportFormatter {
    reference: Regex,
}

impl ReportFormatter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            reference: Regex::new(r"(?i)(Section\s+\d+(?:\.\d+)*|Exhibit\s+[A-Z]\d*)")
                .context("failed to compile quote reference regex")?,
        })
    }

    pub fn row(&self, outcome: &RequirementOutcome) -> ReportRow {
        match outcome {
            RequirementOutcome::Evaluated { verdict, .. } => ReportRow {
                requirement: verdict.requirement.clone(),
                status: verdict.status.to_string(),
                confidence: format!("{}%", verdict.confidence),
                quote_groups: self.group_quotes(verdict),
                rationale: non_empty_or_dash(&verdict.rationale),
            },
            RequirementOutcome::Failed { requirement, error } => ReportRow {
                requirement: requirement.clone(),
                status: "Failed".to_string(),
                confidence: EMPTY_CELL.to_string(),
                quote_groups: Vec::new(),
                rationale: non_empty_or_dash(error),
            },
        }
    }

    /// Groups cited quotes by the Section/Exhibit they mention, deduplicated, sections in
    /// numeric order ahead of exhibits ahead of anything else.
    pub fn group_quotes(&self, verdict: &RequirementVerdict) -> Vec<QuoteGroup> {
        let mut groups = Vec::<QuoteGroup>::new();
        for evidence in verdict.controls.iter().flat_map(|control| &control.evidence) {
            let quote = evidence.quote.trim();
            if quote.is_empty() {
                continue;
            }

            let label = self.group_label(&evidence.label, quote);
            match groups.iter_mut().find(|group| group.label == label) {
                Some(group) => {
                    if !group.quotes.iter().any(|existing| existing == quote) {
                        group.quotes.push(quote.to_string());
                    }
                }
                None => groups.push(QuoteGroup {
                    label,
                    quotes: vec![quote.to_string()],
                }),
            }
        }

        groups.sort_by(|left, right| compare_group_labels(&left.label, &right.label));
        groups.truncate(MAX_QUOTE_GROUPS);
        for group in &mut groups {
            group.quotes.truncate(MAX_QUOTES_PER_GROUP);
        }
        groups
    }

    fn group_label(&self, label: &str, quote: &str) -> String {
        let haystack = format!("{label} {quote}");
        if let Some(found) = self.reference.find(&haystack) {
            let mut parts = found.as_str().split_whitespace();
            let keyword = parts.next().unwrap_or_default().to_ascii_lowercase();
            let number = parts.collect::<Vec<&str>>().join(" ");
            return if keyword == "section" {
                format!("Section {number}")
            } else {
                format!("Exhibit {number}")
            };
        }

        let label = label.trim();
        if label.is_empty() {
            FALLBACK_GROUP_LABEL.to_string()
        } else {
            label.to_string()
        }
    }
}

fn compare_group_labels(left: &str, right: &str) -> Ordering {
    group_rank(left)
        .cmp(&group_rank(right))
        .then_with(|| section_numbers(left).cmp(&section_numbers(right)))
        .then_with(|| left.cmp(right))
}

fn group_rank(label: &str) -> u8 {
    let lowered = label.to_ascii_lowercase();
    if lowered.starts_with("section") {
        0
    } else if lowered.starts_with("exhibit") {
        1
    } else {
        2
    }
}

fn section_numbers(label: &str) -> Vec<u64> {
    if group_rank(label) != 0 {
        return Vec::new();
    }
    label
        .split(|character: char| !character.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse::<u64>().ok())
        .collect()
}

fn non_empty_or_dash(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        EMPTY_CELL.to_string()
    } else {
        value.to_string()
    }
}

pub fn format_quote_groups(groups: &[QuoteGroup]) -> String {
    if groups.is_empty() {
        return EMPTY_CELL.to_string();
    }

    groups
        .iter()
        .map(|group| {
            let quotes = group
                .quotes
                .iter()
                .map(|quote| format!("- {quote}"))
                .collect::<Vec<String>>()
                .join("\n");
            format!("{}:\n{}", group.label, quotes)
        })
        .collect::<Vec<String>>()
        .join("\n\n")
}

pub fn write_text_report<W: Write>(
    output: &mut W,
    report: &ComplianceReport,
    formatter: &ReportFormatter,
) -> Result<()> {
    writeln!(
        output,
        "Contract: {} (sha256 {})",
        report.source_path,
        short_hash(&report.contract_hash)
    )?;
    writeln!(
        output,
        "Index: chunks={} backend={} embedding={} completion={} top_k={} min_score={:.2}",
        report.chunk_count,
        report.extraction_backend,
        report.embedding_model,
        report.completion_model,
        report.retrieval.top_k,
        report.retrieval.min_score,
    )?;
    writeln!(
        output,
        "Summary: fully_compliant={} partially_compliant={} non_compliant={} failed={}",
        report.summary.fully_compliant,
        report.summary.partially_compliant,
        report.summary.non_compliant,
        report.summary.failed,
    )?;

    for (position, outcome) in report.outcomes.iter().enumerate() {
        let row = formatter.row(outcome);
        writeln!(output)?;
        writeln!(output, "{}. {}", position + 1, row.requirement)?;
        writeln!(output, "\tstatus: {}", row.status)?;
        writeln!(output, "\tconfidence: {}", row.confidence)?;
        writeln!(output, "\tquotes:")?;
        for line in format_quote_groups(&row.quote_groups).lines() {
            if line.is_empty() {
                writeln!(output)?;
            } else {
                writeln!(output, "\t\t{line}")?;
            }
        }
        writeln!(output, "\trationale: {}", row.rationale)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ComplianceStatus, ControlEvidence, ControlVerdict, RetrievalSettings, StatusSummary,
    };

    fn evidence(label: &str, quote: &str) -> ControlEvidence {
        ControlEvidence {
            chunk_id: 0,
            label: label.to_string(),
            quote: quote.to_string(),
        }
    }

    fn verdict(evidence: Vec<ControlEvidence>) -> RequirementVerdict {
        RequirementVerdict {
            requirement: "Access Control".to_string(),
            status: ComplianceStatus::PartiallyCompliant,
            confidence: 55,
            controls: vec![ControlVerdict {
                name: "MFA".to_string(),
                covered: true,
                evidence,
            }],
            rationale: "MFA is required for admins.".to_string(),
            gaps: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    #[test]
    fn quotes_are_grouped_deduplicated_and_sorted() {
        let formatter = ReportFormatter::new().expect("formatter should build");
        let groups = formatter.group_quotes(&verdict(vec![
            evidence("Exhibit B", "Annual penetration tests."),
            evidence("Section 10.2", "Logs are kept for a year."),
            evidence("Unlabeled", "MFA applies to all admins."),
            evidence("section  2", "Passwords rotate quarterly."),
            evidence("Section 2", "Passwords rotate quarterly."),
            evidence("Unlabeled", "As stated in Section 3.1, SSO is supported."),
        ]));

        let labels = groups
            .iter()
            .map(|group| group.label.as_str())
            .collect::<Vec<&str>>();
        assert_eq!(
            labels,
            vec!["Section 2", "Section 3.1", "Section 10.2", "Exhibit B", "Unlabeled"]
        );
        assert_eq!(groups[0].quotes, vec!["Passwords rotate quarterly."]);
    }

    #[test]
    fn groups_and_quotes_are_capped() {
        let formatter = ReportFormatter::new().expect("formatter should build");
        let mut items = (1..=10)
            .map(|section| evidence(&format!("Section {section}"), "Clause text."))
            .collect::<Vec<ControlEvidence>>();
        items.extend([
            evidence("Section 1", "Second quote."),
            evidence("Section 1", "Third quote."),
        ]);

        let groups = formatter.group_quotes(&verdict(items));

        assert_eq!(groups.len(), MAX_QUOTE_GROUPS);
        assert_eq!(groups[0].label, "Section 1");
        assert_eq!(groups[0].quotes, vec!["Clause text.", "Second quote."]);
        assert_eq!(groups[7].label, "Section 8");
    }

    #[test]
    fn rows_format_confidence_and_failures() {
        let formatter = ReportFormatter::new().expect("formatter should build");

        let evaluated = formatter.row(&RequirementOutcome::Evaluated {
            verdict: verdict(Vec::new()),
            evidence_chunk_ids: vec![0],
        });
        assert_eq!(evaluated.status, "Partially Compliant");
        assert_eq!(evaluated.confidence, "55%");
        assert_eq!(format_quote_groups(&evaluated.quote_groups), EMPTY_CELL);

        let failed = formatter.row(&RequirementOutcome::Failed {
            requirement: "Audit Logging".to_string(),
            error: "malformed compliance response".to_string(),
        });
        assert_eq!(failed.status, "Failed");
        assert_eq!(failed.confidence, EMPTY_CELL);
        assert_eq!(failed.rationale, "malformed compliance response");
    }

    #[test]
    fn text_report_lists_each_outcome() {
        let formatter = ReportFormatter::new().expect("formatter should build");
        let outcomes = vec![
            RequirementOutcome::Evaluated {
                verdict: verdict(vec![evidence("Section 4", "MFA is mandatory.")]),
                evidence_chunk_ids: vec![3],
            },
            RequirementOutcome::Failed {
                requirement: "Audit Logging".to_string(),
                error: "model unavailable".to_string(),
            },
        ];
        let report = ComplianceReport {
            report_version: 1,
            generated_at: "2026-01-01T00:00:00Z".to_string(),
            contract_hash: "0123456789abcdef".to_string(),
            source_path: "contract.pdf".to_string(),
            extraction_backend: "pdftotext_layout".to_string(),
            chunk_count: 4,
            embedding_model: "local-hash-v1-384d".to_string(),
            completion_model: "gpt-4o-mini".to_string(),
            retrieval: RetrievalSettings {
                top_k: 12,
                min_score: 0.25,
            },
            summary: StatusSummary::from_outcomes(&outcomes),
            outcomes,
            debug_retrieval: None,
        };

        let mut buffer = Vec::new();
        write_text_report(&mut buffer, &report, &formatter).expect("report should render");
        let text = String::from_utf8(buffer).expect("report should be utf-8");

        assert!(text.contains("Contract: contract.pdf (sha256 0123456789ab)"));
        assert!(text.contains("partially_compliant=1 non_compliant=0 failed=1"));
        assert!(text.contains("1. Access Control\n\tstatus: Partially Compliant\n\tconfidence: 55%"));
        assert!(text.contains("\t\tSection 4:\n\t\t- MFA is mandatory."));
        assert!(text.contains("2. Audit Logging\n\tstatus: Failed"));
    }
}
