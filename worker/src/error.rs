use std::{error::Error, fmt, io};

use comms::CommsErr;
use knn::KnnError;

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Worker runtime failures.
#[derive(Debug)]
pub enum WorkerErr {
    Io(io::Error),
    Comms(CommsErr),
    Knn(KnnError),
    /// The neighbor computation task panicked or was cancelled.
    Join(String),
    InvalidConfig(String),
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerErr::Io(e) => write!(f, "io error: {e}"),
            WorkerErr::Comms(e) => write!(f, "comms error: {e}"),
            WorkerErr::Knn(e) => write!(f, "knn error: {e}"),
            WorkerErr::Join(detail) => write!(f, "compute task failed: {detail}"),
            WorkerErr::InvalidConfig(detail) => write!(f, "invalid configuration: {detail}"),
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::Io(e) => Some(e),
            WorkerErr::Comms(e) => Some(e),
            WorkerErr::Knn(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WorkerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<CommsErr> for WorkerErr {
    fn from(value: CommsErr) -> Self {
        Self::Comms(value)
    }
}

impl From<KnnError> for WorkerErr {
    fn from(value: KnnError) -> Self {
        Self::Knn(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<WorkerErr> for io::Error {
    fn from(value: WorkerErr) -> Self {
        match value {
            WorkerErr::Io(e) => e,
            WorkerErr::Comms(e) => e.into(),
            WorkerErr::InvalidConfig(_) => io::Error::new(io::ErrorKind::InvalidInput, value),
            other => io::Error::other(other),
        }
    }
}
