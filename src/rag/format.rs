use super::types::{RagChunk, RagContext};

const UNKNOWN: &str = "Unknown";

fn relevance_percent(score: f32) -> u32 {
    (score.clamp(0.0, 1.0) * 100.0).round() as u32
}

fn source_header(number: usize, chunk: &RagChunk) -> String {
    let relevance = relevance_percent(chunk.score);
    match &chunk.metadata {
        Some(meta) => match meta.position {
            Some(position) => format!(
                "[Source {}] Document: {}, Position: {}, Relevance: {}%",
                number, meta.document_id, position, relevance
            ),
            None => format!(
                "[Source {}] Document: {}, Relevance: {}%",
                number, meta.document_id, relevance
            ),
        },
        None => format!(
            "[Source {}] Document: {}, Relevance: {}%",
            number, UNKNOWN, relevance
        ),
    }
}

/// Renders `context` as numbered, cited sources followed by `question`.
pub fn format_context(context: &RagContext, question: &str) -> String {
    let mut out = String::new();
    for (i, chunk) in context.chunks.iter().enumerate() {
        out.push_str(&source_header(i + 1, chunk));
        out.push('\n');
        out.push_str(chunk.text.trim());
        out.push_str("\n\n");
    }
    out.push_str("Question: ");
    out.push_str(question.trim());
    out
}
