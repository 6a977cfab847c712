use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{error, info};

use crate::catalog::load_catalog;
use crate::cli::CheckArgs;
use crate::model::{
    ComplianceReport, Requirement, RequirementEvidenceTrace, RequirementOutcome,
    RetrievalSettings, StatusSummary,
};
use crate::providers::{build_completion_provider, build_embedding_provider};
use crate::report::{ReportFormatter, write_text_report};
use crate::retrieval::{RetrievalConfig, Retriever};
use crate::scoring::ComplianceScorer;
use crate::util::{now_utc_string, short_hash, utc_compact_string, write_json_pretty};
use crate::vector_store::VectorStore;

use super::prepare_contract;

const REPORT_VERSION: u32 = 1;

pub fn run(args: CheckArgs) -> Result<()> {
    let requirements = load_catalog(&args.requirements)?;
    let embedder = build_embedding_provider(&args.providers)?;
    let completion = build_completion_provider(&args.providers)?;
    let formatter = ReportFormatter::new()?;

    let prepared = prepare_contract(
        &args.contract,
        &args.extraction,
        &args.chunking,
        embedder.as_ref(),
    )?;
    let index = prepared.session.require_index()?;

    let retriever = Retriever::new(embedder.as_ref());
    let scorer = ComplianceScorer::new(completion.as_ref());
    let retrieval = args.retrieval();
    let evaluation = evaluate_requirements(
        &index.store,
        &requirements,
        &retriever,
        &scorer,
        retrieval,
        args.fail_fast,
    )?;

    let outcomes = evaluation.outcomes;
    let report = ComplianceReport {
        report_version: REPORT_VERSION,
        generated_at: now_utc_string(),
        contract_hash: index.content_hash.clone(),
        source_path: args.contract.display().to_string(),
        extraction_backend: prepared.extracted.backend.as_str().to_string(),
        chunk_count: index.chunks.len(),
        embedding_model: retriever.embedding_model().to_string(),
        completion_model: scorer.completion_model().to_string(),
        retrieval: RetrievalSettings {
            top_k: retrieval.top_k,
            min_score: retrieval.min_score,
        },
        summary: StatusSummary::from_outcomes(&outcomes),
        outcomes,
        debug_retrieval: args.debug_retrieval.then_some(evaluation.traces),
    };

    let report_path = report_path(&args, &report.contract_hash);
    write_json_pretty(&report_path, &report)?;
    info!(
        path = %report_path.display(),
        fully_compliant = report.summary.fully_compliant,
        partially_compliant = report.summary.partially_compliant,
        non_compliant = report.summary.non_compliant,
        failed = report.summary.failed,
        "wrote compliance report"
    );

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &report)
            .context("failed to serialize compliance report json output")?;
        writeln!(output)?;
    } else {
        write_text_report(&mut output, &report, &formatter)?;
        writeln!(output)?;
        writeln!(output, "Report: {}", report_path.display())?;
    }
    output.flush()?;

    if report.summary.failed > 0 {
        bail!(
            "{} of {} requirements could not be evaluated; see {}",
            report.summary.failed,
            report.outcomes.len(),
            report_path.display()
        );
    }

    Ok(())
}

fn report_path(args: &CheckArgs, contract_hash: &str) -> PathBuf {
    args.output.clone().unwrap_or_else(|| {
        args.cache_root.join("reports").join(format!(
            "compliance_{}_{}.json",
            short_hash(contract_hash),
            utc_compact_string(Utc::now())
        ))
    })
}

#[derive(Debug, Default)]
pub struct Evaluation {
    pub outcomes: Vec<RequirementOutcome>,
    pub traces: Vec<RequirementEvidenceTrace>,
}

/// Evaluates requirements in catalog order. A failing requirement is recorded and skipped
/// unless `fail_fast` is set.
pub fn evaluate_requirements(
    store: &VectorStore,
    requirements: &[Requirement],
    retriever: &Retriever<'_>,
    scorer: &ComplianceScorer<'_>,
    config: RetrievalConfig,
    fail_fast: bool,
) -> Result<Evaluation> {
    let mut evaluation = Evaluation::default();

    for requirement in requirements {
        let result = retriever
            .retrieve(store, requirement, config)
            .and_then(|evidence| {
                let verdict = scorer.score(requirement, &evidence)?;
                Ok((verdict, evidence))
            });

        match result {
            Ok((verdict, evidence)) => {
                evaluation.outcomes.push(RequirementOutcome::Evaluated {
                    verdict,
                    evidence_chunk_ids: evidence.iter().map(|item| item.chunk_id).collect(),
                });
                evaluation.traces.push(RequirementEvidenceTrace {
                    requirement: requirement.name.clone(),
                    evidence,
                });
            }
            Err(err) if fail_fast => {
                return Err(err).with_context(|| {
                    format!("evaluation aborted at requirement '{}'", requirement.name)
                });
            }
            Err(err) => {
                let chain = format!("{err:#}");
                error!(
                    requirement = %requirement.name,
                    error = %chain,
                    "requirement evaluation failed"
                );
                evaluation.outcomes.push(RequirementOutcome::Failed {
                    requirement: requirement.name.clone(),
                    error: chain,
                });
            }
        }
    }

    Ok(evaluation)
}
