use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
/// Errors returned by similarity computations.
pub enum SimilarityError {
    /// Two vectors of different lengths were compared.
    #[error("vector dimension mismatch: {left} vs {right}")]
    DimensionMismatch {
        /// Length of the first vector.
        left: usize,
        /// Length of the second vector.
        right: usize,
    },
}
