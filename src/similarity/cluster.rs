use std::collections::HashMap;

use serde::Serialize;

use super::cosine_similarity;
use super::error::SimilarityError;
use crate::embedding::EmbeddingVector;

/// A group of ids whose embeddings are mutually similar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub id: String,
    pub members: Vec<String>,
    /// Element-wise mean of the member vectors.
    pub centroid: Vec<f32>,
    /// Mean pairwise similarity of members in `[0, 1]`; `1.0` for a singleton.
    pub avg_similarity: f32,
}

struct Building<'a> {
    members: Vec<&'a str>,
    vectors: Vec<&'a [f32]>,
    sum: Vec<f64>,
    centroid: Vec<f32>,
}

impl<'a> Building<'a> {
    fn seed(id: &'a str, vector: &'a [f32]) -> Self {
        Self {
            members: vec![id],
            vectors: vec![vector],
            sum: vector.iter().map(|v| *v as f64).collect(),
            centroid: vector.to_vec(),
        }
    }

    fn push(&mut self, id: &'a str, vector: &'a [f32]) {
        self.members.push(id);
        self.vectors.push(vector);
        for (acc, v) in self.sum.iter_mut().zip(vector) {
            *acc += *v as f64;
        }
        let n = self.members.len() as f64;
        self.centroid = self.sum.iter().map(|s| (s / n) as f32).collect();
    }

    fn avg_similarity(&self) -> Result<f32, SimilarityError> {
        if self.vectors.len() < 2 {
            return Ok(1.0);
        }

        let mut total = 0.0f64;
        let mut pairs = 0usize;
        for i in 0..self.vectors.len() {
            for j in (i + 1)..self.vectors.len() {
                total += cosine_similarity(self.vectors[i], self.vectors[j])? as f64;
                pairs += 1;
            }
        }
        Ok(((total / pairs as f64) as f32).clamp(0.0, 1.0))
    }
}

/// Greedy single-link clustering: ids are visited in sorted order and each joins the
/// existing cluster it is most similar to, scoring a cluster by the best of its centroid
/// and its members. An id whose best score is below `threshold` seeds a new cluster.
///
/// Every input id lands in exactly one cluster. Cluster ids are `cluster-0`, `cluster-1`, ...
/// in creation order.
pub fn cluster_by_similarity(
    embeddings: &HashMap<String, EmbeddingVector>,
    threshold: f32,
) -> Result<Vec<Cluster>, SimilarityError> {
    let mut ids: Vec<&String> = embeddings.keys().collect();
    ids.sort();

    let mut clusters: Vec<Building> = Vec::new();
    for id in ids {
        let vector = embeddings[id].vector();

        let mut best: Option<(usize, f32)> = None;
        for (index, cluster) in clusters.iter().enumerate() {
            let mut score = cosine_similarity(vector, &cluster.centroid)?;
            for member in &cluster.vectors {
                score = score.max(cosine_similarity(vector, member)?);
            }
            if score >= threshold && best.is_none_or(|(_, s)| score > s) {
                best = Some((index, score));
            }
        }

        match best {
            Some((index, _)) => clusters[index].push(id, vector),
            None => clusters.push(Building::seed(id, vector)),
        }
    }

    clusters
        .into_iter()
        .enumerate()
        .map(|(n, cluster)| {
            Ok(Cluster {
                id: format!("cluster-{}", n),
                avg_similarity: cluster.avg_similarity()?,
                members: cluster.members.iter().map(|m| m.to_string()).collect(),
                centroid: cluster.centroid,
            })
        })
        .collect()
}
