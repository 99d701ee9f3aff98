//! Token estimation and budget packing.

use super::types::{RagChunk, RagContext};

/// Tokens held back from a model's window for the system prompt and the response.
pub const RESPONSE_RESERVE_TOKENS: usize = 2_700;

/// Fraction of the ceiling handed out as context budget.
pub const CONTEXT_SAFETY_MARGIN: f64 = 0.9;

/// Ceiling used for models missing from the limits table.
pub const DEFAULT_CONTEXT_CEILING: usize = 200_000;

const CHARS_PER_TOKEN: usize = 4;

/// Context window sizes by model-name prefix.
const MODEL_CONTEXT_LIMITS: &[(&str, usize)] = &[
    ("claude", 200_000),
    ("gpt-4o", 128_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo", 16_385),
    ("gemini-1.5", 1_000_000),
];

/// Approximate token count: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Known context window of `model_name`, matched on the longest table prefix.
pub fn model_context_limit(model_name: &str) -> Option<usize> {
    let name = model_name.trim().to_ascii_lowercase();
    MODEL_CONTEXT_LIMITS
        .iter()
        .filter(|(prefix, _)| name.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|&(_, limit)| limit)
}

/// Largest safe context budget for `model_name`, never above `requested`.
pub fn get_optimal_context_window(requested: usize, model_name: &str) -> usize {
    let ceiling = model_context_limit(model_name)
        .map(|limit| limit.saturating_sub(RESPONSE_RESERVE_TOKENS))
        .unwrap_or(DEFAULT_CONTEXT_CEILING);
    let safe = (ceiling as f64 * CONTEXT_SAFETY_MARGIN).floor() as usize;
    requested.min(safe)
}

/// Packs the most relevant chunks into `token_budget`.
///
/// Chunks are taken in descending score order until the next one would overflow; it and
/// everything after it are dropped whole.
pub fn assemble_context_within_budget(chunks: &[RagChunk], token_budget: usize) -> RagContext {
    let mut ranked: Vec<&RagChunk> = chunks.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut used = 0;
    let mut selected = Vec::new();
    for chunk in ranked {
        let cost = estimate_tokens(&chunk.text);
        if used + cost > token_budget {
            break;
        }
        used += cost;
        selected.push(chunk.clone());
    }

    RagContext::from_chunks(selected)
}

/// Estimated tokens of every chunk in `context`.
pub fn context_tokens(context: &RagContext) -> usize {
    context.chunks.iter().map(|c| estimate_tokens(&c.text)).sum()
}
