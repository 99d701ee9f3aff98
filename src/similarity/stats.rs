use serde::Serialize;

/// Summary of a score distribution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SimilarityStats {
    pub mean: f32,
    pub median: f32,
    pub min: f32,
    pub max: f32,
    /// Population standard deviation.
    pub std_dev: f32,
}

/// Summary statistics of `scores`; all zero for empty input.
pub fn get_similarity_stats(scores: &[f32]) -> SimilarityStats {
    if scores.is_empty() {
        return SimilarityStats::default();
    }

    let mut sorted = scores.to_vec();
    sorted.sort_by(f32::total_cmp);

    let n = sorted.len();
    let mean = sorted.iter().map(|s| *s as f64).sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    } else {
        sorted[n / 2] as f64
    };
    let variance = sorted
        .iter()
        .map(|s| {
            let d = *s as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n as f64;

    SimilarityStats {
        mean: mean as f32,
        median: median as f32,
        min: sorted[0],
        max: sorted[n - 1],
        std_dev: variance.sqrt() as f32,
    }
}
