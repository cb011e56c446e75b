use prp_core::domain::RetrievalResult;

/// Identifies this prompt pair in run logs.
pub const PROMPT_ID: &str = "rag_v1";

const PASSAGE_TEXT_CHARS: usize = 2000;

pub const SYSTEM_PROMPT: &str = r#"You are a research assistant answering questions from a retrieved corpus.

You will receive:
1. A question
2. Retrieved passages, each labeled with source_id and chunk_id (e.g., RAGAS2023, RAGAS2023_chunk_02)

Your task: Answer the question using ONLY the provided passages. Every major claim must be backed by an inline citation.

Rules:
1. Base every statement strictly on the provided passages. Do NOT use outside knowledge.
2. Cite using (source_id, chunk_id) or (source_id), e.g. (RAGAS2023, RAGAS2023_chunk_02) or (RAGAS2023). Each citation must map to a passage you were given.
3. If the passages discuss the topic, use them to write your answer and cite them. Do not claim missing evidence when the passages contain relevant information.
4. Only write "The corpus does not contain evidence for this." when the passages genuinely do not answer the question.
5. If passages disagree, state both sides with their citations.
6. Do NOT fabricate citations. Only cite passages you were given.
7. Keep the answer concise but complete."#;

/// `[i] source_id=.., chunk_id=..` blocks separated by `---`, text capped per passage.
pub fn format_passages(chunks: &[RetrievalResult]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let text: String = c.text.chars().take(PASSAGE_TEXT_CHARS).collect();
            format!(
                "[{}] source_id={}, chunk_id={}\n{}",
                i + 1,
                c.source_id,
                c.fragment_id,
                text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub fn user_prompt(query: &str, chunks: &[RetrievalResult]) -> String {
    format!(
        r#"## Question
{query}

## Retrieved passages (use these only)

{passages}

## Instructions
Answer the question above using the passages. Cite each claim with (source_id, chunk_id) or (source_id). Only if the passages truly do not contain any information that answers the question, say "The corpus does not contain evidence for this.""#,
        passages = format_passages(chunks)
    )
}
