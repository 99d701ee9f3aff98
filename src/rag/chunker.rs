//! Word-window chunking.

use super::types::RagDocument;

/// Splits `text` into windows of `chunk_size` words, consecutive windows sharing `overlap`
/// words. Whitespace is normalized to single spaces. Returns nothing for blank text.
pub fn chunk_words(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end >= words.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Chunks for `document`: its pre-supplied chunks verbatim, else word windows over its text.
pub fn document_chunks(document: &RagDocument, chunk_size: usize, overlap: usize) -> Vec<String> {
    match &document.chunks {
        Some(chunks) => chunks.clone(),
        None => chunk_words(&document.text, chunk_size, overlap),
    }
}
