use std::{error::Error, fmt, io};

/// The comms module's result type.
pub type Result<T> = std::result::Result<T, CommsErr>;

/// Failures of the wire protocol and the point text format.
#[derive(Debug)]
pub enum CommsErr {
    Io(io::Error),
    /// The stream was closed or reset, or a read yielded no data mid exchange.
    ConnectionLost,
    /// The received message doesn't match the expected step of the protocol.
    ProtocolViolation {
        expected: &'static str,
        got: String,
    },
    MalformedPoint(String),
    MalformedId(String),
}

impl CommsErr {
    /// Builds a `ProtocolViolation` out of the raw bytes that were received.
    ///
    /// # Arguments
    /// * `expected` - What the protocol expected at this step.
    /// * `got` - The offending payload.
    pub(crate) fn violation(expected: &'static str, got: &[u8]) -> Self {
        const SHOWN: usize = 64;

        let mut shown = String::from_utf8_lossy(&got[..got.len().min(SHOWN)]).into_owned();
        if got.len() > SHOWN {
            shown.push_str("...");
        }

        Self::ProtocolViolation {
            expected,
            got: shown,
        }
    }
}

impl fmt::Display for CommsErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommsErr::Io(e) => write!(f, "io error: {e}"),
            CommsErr::ConnectionLost => write!(f, "connection lost"),
            CommsErr::ProtocolViolation { expected, got } => {
                write!(f, "protocol violation: expected {expected}, got {got:?}")
            }
            CommsErr::MalformedPoint(text) => write!(f, "malformed point: {text}"),
            CommsErr::MalformedId(text) => write!(f, "malformed point id: {text:?}"),
        }
    }
}

impl Error for CommsErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CommsErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CommsErr {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => Self::ConnectionLost,
            _ => Self::Io(value),
        }
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<CommsErr> for io::Error {
    fn from(value: CommsErr) -> Self {
        match value {
            CommsErr::Io(e) => e,
            CommsErr::ConnectionLost => io::Error::new(io::ErrorKind::UnexpectedEof, value),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
