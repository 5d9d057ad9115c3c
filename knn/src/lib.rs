//! Neighbor ranking, voting and training set partitioning.

pub mod engine;
mod error;
pub mod partition;

pub use engine::{classify, distance, local_fetch, majority_vote, nearest};
pub use error::{KnnError, Result};
