use tracing::warn;

use crate::model::{
    ComplianceStatus, ControlVerdict, Requirement, RequirementVerdict, RetrievedEvidence,
};

use super::claims::ParsedClaim;

const NO_EVIDENCE_CONFIDENCE: u8 = 20;
const MIN_EVIDENCED_CONFIDENCE: i64 = 30;
const MAX_CONFIDENCE: i64 = 95;
const STRONG_RETRIEVAL_SCORE: f64 = 0.40;
const WEAK_RETRIEVAL_SCORE: f64 = 0.25;

const NO_EVIDENCE_RATIONALE: &str =
    "No sufficiently relevant contract language was retrieved for this requirement.";
const NO_EVIDENCE_GAP: &str = "No evidence found above similarity threshold.";
const NO_EVIDENCE_RECOMMENDATION: &str =
    "Add explicit contract language covering these controls.";

pub fn no_evidence_verdict(requirement: &Requirement) -> RequirementVerdict {
    RequirementVerdict {
        requirement: requirement.name.clone(),
        status: ComplianceStatus::NonCompliant,
        confidence: NO_EVIDENCE_CONFIDENCE,
        controls: uncovered_controls(requirement),
        rationale: NO_EVIDENCE_RATIONALE.to_string(),
        gaps: vec![NO_EVIDENCE_GAP.to_string()],
        recommendations: vec![NO_EVIDENCE_RECOMMENDATION.to_string()],
    }
}

fn uncovered_controls(requirement: &Requirement) -> Vec<ControlVerdict> {
    requirement
        .controls
        .iter()
        .map(|name| ControlVerdict {
            name: name.clone(),
            covered: false,
            evidence: Vec::new(),
        })
        .collect()
}

/// Turns a parsed model claim into a verdict. Status and confidence come only from the
/// repaired control list and the retrieval scores.
pub fn finalize_verdict(
    requirement: &Requirement,
    claim: ParsedClaim,
    evidence: &[RetrievedEvidence],
) -> RequirementVerdict {
    let mut controls = match claim.controls {
        Some(claimed) if !claimed.is_empty() => claimed
            .into_iter()
            .map(|control| ControlVerdict {
                name: control.name,
                covered: control.covered,
                evidence: control.evidence,
            })
            .collect::<Vec<ControlVerdict>>(),
        _ => uncovered_controls(requirement),
    };

    for name in repair_unsupported_coverage(&mut controls) {
        warn!(
            requirement = %requirement.name,
            control = %name,
            "control claimed covered without quotes; marking uncovered"
        );
    }
    flag_unverified_quotes(requirement, &controls, evidence);

    let total_controls = controls.len();
    let covered_count = controls.iter().filter(|control| control.covered).count();
    let quote_count = controls
        .iter()
        .map(|control| control.evidence.len())
        .sum::<usize>();
    let status = ComplianceStatus::from_coverage(covered_count, total_controls);
    let confidence = compute_confidence(
        covered_count,
        total_controls,
        quote_count,
        average_score(evidence),
        status,
    );

    RequirementVerdict {
        requirement: requirement.name.clone(),
        status,
        confidence,
        controls,
        rationale: claim.rationale,
        gaps: claim.gaps,
        recommendations: claim.recommendations,
    }
}

/// Returns the names of controls whose coverage claim was withdrawn.
fn repair_unsupported_coverage(controls: &mut [ControlVerdict]) -> Vec<String> {
    let mut repaired = Vec::new();
    for control in controls.iter_mut() {
        if control.covered && control.evidence.is_empty() {
            control.covered = false;
            repaired.push(control.name.clone());
        }
    }
    repaired
}

fn average_score(evidence: &[RetrievedEvidence]) -> f64 {
    if evidence.is_empty() {
        return 0.0;
    }
    evidence.iter().map(|item| item.score).sum::<f64>() / evidence.len() as f64
}

pub fn compute_confidence(
    covered_count: usize,
    total_controls: usize,
    quote_count: usize,
    average_score: f64,
    status: ComplianceStatus,
) -> u8 {
    if quote_count == 0 {
        return NO_EVIDENCE_CONFIDENCE;
    }

    let ratio = covered_count as f64 / total_controls.max(1) as f64;
    let mut confidence = 20 + (60.0 * ratio).floor() as i64;
    confidence += 5;

    if average_score >= STRONG_RETRIEVAL_SCORE {
        confidence += 5;
    } else if average_score < WEAK_RETRIEVAL_SCORE {
        confidence -= 5;
    }

    match status {
        ComplianceStatus::FullyCompliant => confidence += 5,
        ComplianceStatus::NonCompliant => confidence -= 5,
        ComplianceStatus::PartiallyCompliant => {}
    }

    confidence.clamp(MIN_EVIDENCED_CONFIDENCE, MAX_CONFIDENCE) as u8
}

fn flag_unverified_quotes(
    requirement: &Requirement,
    controls: &[ControlVerdict],
    evidence: &[RetrievedEvidence],
) {
    for control in controls {
        for cited in &control.evidence {
            let source = usize::try_from(cited.chunk_id)
                .ok()
                .and_then(|chunk_id| evidence.iter().find(|item| item.chunk_id == chunk_id));
            match source {
                Some(item)
                    if collapse_whitespace(&item.text)
                        .contains(&collapse_whitespace(&cited.quote)) => {}
                Some(_) => warn!(
                    requirement = %requirement.name,
                    control = %control.name,
                    chunk_id = cited.chunk_id,
                    "quote not found verbatim in cited chunk"
                ),
                None => warn!(
                    requirement = %requirement.name,
                    control = %control.name,
                    chunk_id = cited.chunk_id,
                    "quote cites a chunk outside the retrieved evidence"
                ),
            }
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}
