use anyhow::{Context, Result, bail};
use tracing::info;

use crate::model::RetrievedEvidence;
use crate::providers::CompletionProvider;
use crate::retrieval::{RetrievalConfig, Retriever};
use crate::session::ContractSession;

pub const NOT_FOUND_ANSWER: &str = "I can't find that in the provided contract.";

const CHAT_SYSTEM_PROMPT: &str =
    "You answer strictly from provided contract text and cite chunk ids.";

#[derive(Debug, Clone)]
pub struct ChatAnswer {
    pub answer: String,
    pub evidence: Vec<RetrievedEvidence>,
}

pub fn answer_question(
    session: &mut ContractSession,
    retriever: &Retriever<'_>,
    completion: &dyn CompletionProvider,
    question: &str,
    config: RetrievalConfig,
) -> Result<ChatAnswer> {
    let question = question.trim();
    if question.is_empty() {
        bail!("question must not be empty");
    }

    let index = session.require_index()?;
    let evidence = retriever.retrieve_for_question(&index.store, question, config)?;

    let answer = if evidence.is_empty() {
        info!("no chunks retrieved for question; answering not found");
        NOT_FOUND_ANSWER.to_string()
    } else {
        completion
            .complete(CHAT_SYSTEM_PROMPT, &build_chat_prompt(question, &evidence))
            .context("chat model call failed")?
    };
    session.record_exchange(question, &answer);
    info!(
        chunks = evidence.len(),
        answer_chars = answer.chars().count(),
        turns = session.history().len(),
        "question answered"
    );
    Ok(ChatAnswer { answer, evidence })
}

fn build_chat_prompt(question: &str, evidence: &[RetrievedEvidence]) -> String {
    let context = evidence
        .iter()
        .map(|item| format!("[Chunk {} | {}]\n{}", item.chunk_id, item.label, item.text))
        .collect::<Vec<String>>()
        .join("\n\n");

    format!(
        r#"You are a contract assistant. Answer the user's question using ONLY the contract text provided.

Rules:
- If the answer is not in the text, say: "{NOT_FOUND_ANSWER}"
- Quote short relevant phrases where helpful.
- When you use information from the contract, cite chunk ids like (Chunk 3) inline.
- Do not invent facts.

Contract Text:
{context}

User Question:
{question}
"#
    )
}
