//! Stateless similarity math over embeddings.
//!
//! Cosine similarity, ranked matching, pairwise matrices, greedy clustering and summary
//! statistics. Nothing here touches storage.

mod cluster;
mod error;
mod stats;


pub use cluster::{Cluster, cluster_by_similarity};
pub use error::SimilarityError;
pub use stats::{SimilarityStats, get_similarity_stats};

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::embedding::EmbeddingVector;

/// Default `min_score` for [`find_similar_paragraphs`].
pub const DEFAULT_MIN_SCORE: f32 = 0.5;

/// Default `max_results` for [`find_similar_paragraphs`].
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Cosine of the angle between `a` and `b`.
///
/// Returns exactly `0.0` when either vector has zero magnitude. Accumulates in `f64` and
/// clamps to `[-1, 1]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32)
}

/// One scored match; `rank` is 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub paragraph_id: String,
    pub text: String,
    pub score: f32,
    pub rank: usize,
}

/// Sorts by score descending; equal scores keep their current order.
fn rank_in_place(results: &mut [SimilarityResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    for (i, result) in results.iter_mut().enumerate() {
        result.rank = i + 1;
    }
}

/// Scores every `(id, embedding)` target against `query`, best first.
pub fn calculate_similarities<'a, I>(
    query: &EmbeddingVector,
    targets: I,
) -> Result<Vec<SimilarityResult>, SimilarityError>
where
    I: IntoIterator<Item = (&'a str, &'a EmbeddingVector)>,
{
    let mut results = targets
        .into_iter()
        .map(|(id, target)| {
            Ok(SimilarityResult {
                paragraph_id: id.to_string(),
                text: target.text().to_string(),
                score: cosine_similarity(query.vector(), target.vector())?,
                rank: 0,
            })
        })
        .collect::<Result<Vec<_>, SimilarityError>>()?;

    rank_in_place(&mut results);
    Ok(results)
}

/// Options for [`find_similar_paragraphs`].
#[derive(Debug, Clone)]
pub struct FindSimilarOptions {
    pub min_score: f32,
    pub max_results: usize,
    pub exclude_ids: HashSet<String>,
}

impl Default for FindSimilarOptions {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            max_results: DEFAULT_MAX_RESULTS,
            exclude_ids: HashSet::new(),
        }
    }
}

impl FindSimilarOptions {
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn excluding<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_ids.extend(ids.into_iter().map(Into::into));
        self
    }
}

/// Best-matching candidates for `query`.
///
/// Candidates from a different model version than `query` are skipped. Results scoring
/// below `min_score` are dropped; ties are ordered by id.
pub fn find_similar_paragraphs(
    query: &EmbeddingVector,
    candidates: &HashMap<String, EmbeddingVector>,
    options: &FindSimilarOptions,
) -> Result<Vec<SimilarityResult>, SimilarityError> {
    let mut ids: Vec<&String> = candidates.keys().collect();
    ids.sort();

    let mut skipped_versions = 0usize;
    let mut results = Vec::new();
    for id in ids {
        if options.exclude_ids.contains(id.as_str()) {
            continue;
        }
        let candidate = &candidates[id];
        if candidate.model_version() != query.model_version() {
            skipped_versions += 1;
            continue;
        }

        let score = cosine_similarity(query.vector(), candidate.vector())?;
        if score >= options.min_score {
            results.push(SimilarityResult {
                paragraph_id: id.clone(),
                text: candidate.text().to_string(),
                score,
                rank: 0,
            });
        }
    }

    if skipped_versions > 0 {
        debug!(skipped_versions, "Skipped candidates from other model versions");
    }

    rank_in_place(&mut results);
    results.truncate(options.max_results);
    Ok(results)
}

/// Symmetric `N x N` cosine matrix with `1.0` on the diagonal.
pub fn calculate_similarity_matrix(
    embeddings: &[EmbeddingVector],
) -> Result<Vec<Vec<f32>>, SimilarityError> {
    let n = embeddings.len();
    let mut matrix = vec![vec![0.0f32; n]; n];

    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let score = cosine_similarity(embeddings[i].vector(), embeddings[j].vector())?;
            matrix[i][j] = score;
            matrix[j][i] = score;
        }
    }

    Ok(matrix)
}
