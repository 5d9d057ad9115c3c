use std::{error::Error, fmt, io};

use comms::{CommsErr, PointId};
use knn::KnnError;

/// The master module's result type.
pub type Result<T> = std::result::Result<T, MasterErr>;

/// All errors that can occur in the master.
#[derive(Debug)]
pub enum MasterErr {
    /// Invalid configuration, caught before any worker connects.
    InvalidConfig(String),
    /// The exchange with one worker failed.
    Worker { worker_id: usize, source: CommsErr },
    /// A worker reported candidates for a query that was never sent.
    UnknownQuery { worker_id: usize, query: PointId },
    /// A worker reported the same query more than once.
    DuplicateQuery { worker_id: usize, query: PointId },
    /// A worker's report left a query out.
    MissingQuery { worker_id: usize, query: PointId },
    Knn(KnnError),
    /// A worker task panicked or was cancelled.
    Join(String),
    Io(io::Error),
}

impl fmt::Display for MasterErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Worker { worker_id, source } => write!(f, "worker {worker_id} error: {source}"),
            Self::UnknownQuery { worker_id, query } => {
                write!(f, "worker {worker_id} reported unknown query {query}")
            }
            Self::DuplicateQuery { worker_id, query } => {
                write!(f, "worker {worker_id} reported query {query} twice")
            }
            Self::MissingQuery { worker_id, query } => {
                write!(f, "worker {worker_id} left query {query} out of its report")
            }
            Self::Knn(e) => write!(f, "knn error: {e}"),
            Self::Join(msg) => write!(f, "worker task failed: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for MasterErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Worker { source, .. } => Some(source),
            Self::Knn(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MasterErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<KnnError> for MasterErr {
    fn from(e: KnnError) -> Self {
        Self::Knn(e)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<MasterErr> for io::Error {
    fn from(value: MasterErr) -> Self {
        match value {
            MasterErr::Io(e) => e,
            MasterErr::InvalidConfig(_) => io::Error::new(io::ErrorKind::InvalidInput, value),
            other => io::Error::other(other),
        }
    }
}
