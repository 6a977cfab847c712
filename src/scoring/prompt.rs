use crate::model::{Requirement, RetrievedEvidence};

pub(super) const SCORING_SYSTEM_PROMPT: &str = "Return strict JSON only.";

pub(super) fn format_evidence(evidence: &[RetrievedEvidence]) -> String {
    evidence
        .iter()
        .map(|item| {
            format!(
                "[chunk_id={} | label={} | score={:.3}]\n{}",
                item.chunk_id, item.label, item.score, item.text
            )
        })
        .collect::<Vec<String>>()
        .join("\n\n")
}

pub(super) fn build_requirement_prompt(
    requirement: &Requirement,
    evidence: &[RetrievedEvidence],
) -> String {
    let controls = requirement
        .controls
        .iter()
        .map(|control| format!("- {control}"))
        .collect::<Vec<String>>()
        .join("\n");

    format!(
        r#"You are a cybersecurity and contract compliance auditor.

Evaluate whether the contract satisfies the requirement below.

STRICT RULES:
1) You may ONLY use the provided contract evidence text.
2) For any control marked covered=true, you MUST provide at least one verbatim quote copied exactly from the evidence.
3) Each evidence item MUST include the chunk_id it came from.
4) If you cannot find an exact quote, mark covered=false.
5) Be strict: general statements like "reasonable security" do NOT count as coverage unless they explicitly match the control.
6) Use the label from the evidence header when writing evidence (e.g., "Section 6.7", "Exhibit G13").
7) IMPORTANT: When you cite evidence, copy chunk_id and label EXACTLY from the evidence header.
   Do NOT invent or change section numbers.

Return ONLY valid JSON with this schema:
{{
  "requirement": string,
  "controls": [
    {{
      "name": string,
      "covered": boolean,
      "evidence": [
        {{ "chunk_id": integer, "label": string, "quote": string }}
      ]
    }}
  ],
  "rationale": string,
  "gaps": [string],
  "recommendations": [string]
}}

Requirement: {name}
Description: {description}

Controls:
{controls}

Contract Evidence:
{evidence}
"#,
        name = requirement.name,
        description = requirement.description,
        controls = controls,
        evidence = format_evidence(evidence),
    )
}
