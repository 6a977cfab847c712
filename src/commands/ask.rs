use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::warn;

use crate::chat::{ChatAnswer, answer_question};
use crate::cli::AskArgs;
use crate::providers::{build_completion_provider, build_embedding_provider};
use crate::retrieval::Retriever;

use super::prepare_contract;

pub fn run(args: AskArgs) -> Result<()> {
    let embedder = build_embedding_provider(&args.providers)?;
    let completion = build_completion_provider(&args.providers)?;
    let mut prepared = prepare_contract(
        &args.contract,
        &args.extraction,
        &args.chunking,
        embedder.as_ref(),
    )?;
    let retriever = Retriever::new(embedder.as_ref());
    let config = args.retrieval();

    if let Some(question) = &args.question {
        let reply = answer_question(
            &mut prepared.session,
            &retriever,
            completion.as_ref(),
            question,
            config,
        )?;
        let mut output = io::BufWriter::new(io::stdout().lock());
        write_answer(&mut output, &reply, args.show_evidence)?;
        output.flush()?;
        return Ok(());
    }

    let stdin = io::stdin();
    let mut output = io::stdout().lock();
    writeln!(output, "Ask about {} (blank line to quit).", args.contract.display())?;
    for line in stdin.lock().lines() {
        let line = line.context("failed to read question from stdin")?;
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        match answer_question(
            &mut prepared.session,
            &retriever,
            completion.as_ref(),
            question,
            config,
        ) {
            Ok(reply) => write_answer(&mut output, &reply, args.show_evidence)?,
            Err(err) => warn!(error = %format!("{err:#}"), "question failed"),
        }
        output.flush()?;
    }

    Ok(())
}

fn write_answer<W: Write>(output: &mut W, reply: &ChatAnswer, show_evidence: bool) -> Result<()> {
    writeln!(output, "{}", reply.answer)?;
    if show_evidence {
        writeln!(output, "Evidence:")?;
        for item in &reply.evidence {
            writeln!(
                output,
                "\t[Chunk {} | {}] score={:.3}",
                item.chunk_id, item.label, item.score
            )?;
        }
    }
    writeln!(output)?;
    Ok(())
}
