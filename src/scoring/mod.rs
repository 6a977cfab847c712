mod claims;
mod prompt;
mod verdict;

pub use claims::{ClaimParse, parse_claim_response};
pub use verdict::{compute_confidence, finalize_verdict, no_evidence_verdict};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::model::{Requirement, RequirementVerdict, RetrievedEvidence};
use crate::providers::CompletionProvider;

#[cfg(test)]
mod tests;

pub struct ComplianceScorer<'a> {
    completion: &'a dyn CompletionProvider,
}

impl<'a> ComplianceScorer<'a> {
    pub fn new(completion: &'a dyn CompletionProvider) -> Self {
        Self { completion }
    }

    pub fn completion_model(&self) -> &str {
        self.completion.model_id()
    }

    pub fn score(
        &self,
        requirement: &Requirement,
        evidence: &[RetrievedEvidence],
    ) -> Result<RequirementVerdict> {
        if evidence.is_empty() {
            info!(requirement = %requirement.name, "no evidence retrieved; skipping model call");
            return Ok(no_evidence_verdict(requirement));
        }

        let request = prompt::build_requirement_prompt(requirement, evidence);
        let raw = self
            .completion
            .complete(prompt::SCORING_SYSTEM_PROMPT, &request)
            .with_context(|| {
                format!(
                    "compliance model call failed for requirement '{}'",
                    requirement.name
                )
            })?;
        debug!(
            requirement = %requirement.name,
            response_chars = raw.chars().count(),
            "received claim response"
        );

        let claim = match parse_claim_response(&raw) {
            ClaimParse::Parsed(claim) => claim,
            ClaimParse::MalformedResponse { reason } => bail!(
                "malformed compliance response for requirement '{}': {reason}",
                requirement.name
            ),
        };

        let verdict = finalize_verdict(requirement, claim, evidence);
        info!(
            requirement = %verdict.requirement,
            status = %verdict.status,
            confidence = verdict.confidence,
            "requirement scored"
        );
        Ok(verdict)
    }
}
