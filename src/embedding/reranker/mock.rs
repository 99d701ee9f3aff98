use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::error::RerankerError;
use super::{RerankScore, Reranker, validate_scores};

/// What a [`MockReranker`] does when called.
#[derive(Debug, Clone)]
pub enum MockRerankerBehavior {
    /// Scores documents by their position: first gets the lowest score.
    ReverseOrder,
    /// Returns these scores verbatim (validated against the request size).
    Scores(Vec<RerankScore>),
    /// Fails with `RequestFailed`.
    Fail,
    /// Returns an index past the end of the request.
    Malformed,
    /// Sleeps before answering with `ReverseOrder` scores.
    Slow(Duration),
}

/// Scriptable reranker for tests.
#[derive(Debug, Clone)]
pub struct MockReranker {
    behavior: MockRerankerBehavior,
    calls: Arc<AtomicUsize>,
}

impl MockReranker {
    pub fn new(behavior: MockRerankerBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn reverse_order(document_count: usize) -> Vec<RerankScore> {
        (0..document_count)
            .map(|index| RerankScore {
                index,
                score: (index + 1) as f32 / document_count as f32,
            })
            .collect()
    }
}

#[async_trait]
impl Reranker for MockReranker {
    async fn rerank(
        &self,
        _query: &str,
        documents: &[String],
    ) -> Result<Vec<RerankScore>, RerankerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            MockRerankerBehavior::ReverseOrder => Ok(Self::reverse_order(documents.len())),
            MockRerankerBehavior::Scores(scores) => {
                validate_scores(scores, documents.len())?;
                Ok(scores.clone())
            }
            MockRerankerBehavior::Fail => Err(RerankerError::RequestFailed {
                reason: "mock reranker failure".to_string(),
            }),
            MockRerankerBehavior::Malformed => {
                let scores = vec![RerankScore {
                    index: documents.len(),
                    score: 0.5,
                }];
                validate_scores(&scores, documents.len())?;
                Ok(scores)
            }
            MockRerankerBehavior::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Self::reverse_order(documents.len()))
            }
        }
    }
}
