use std::{error::Error, fmt};

/// The knn module's result type.
pub type Result<T> = std::result::Result<T, KnnError>;

/// Failures of the neighbor computations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnnError {
    DimensionMismatch { left: usize, right: usize },
    /// None of the points handed to a vote carried a label.
    EmptyVote,
}

impl fmt::Display for KnnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnnError::DimensionMismatch { left, right } => {
                write!(f, "dimension mismatch: {left} vs {right}")
            }
            KnnError::EmptyVote => write!(f, "no labeled point to vote with"),
        }
    }
}

impl Error for KnnError {}
