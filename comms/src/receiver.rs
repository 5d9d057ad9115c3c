use futures::StreamExt;
use log::debug;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LengthDelimitedCodec};

use crate::{CommsErr, Deserialize, Result, msg::Token};

/// The receiving end handle of the communication.
pub struct OnoReceiver<R: AsyncRead + Unpin> {
    rx: FramedRead<R, LengthDelimitedCodec>,
}

impl<R: AsyncRead + Unpin> OnoReceiver<R> {
    /// Creates a new `OnoReceiver` instance.
    ///
    /// # Arguments
    /// * `rx` - The underlying reader.
    pub(super) fn new(rx: R) -> Self {
        Self {
            rx: FramedRead::new(rx, crate::codec()),
        }
    }

    /// Waits to receive a new message from the inner receiver.
    ///
    /// Cancel safe, the bytes of a partially received frame are kept buffered
    /// until the next call.
    ///
    /// # Returns
    /// A result object that returns `T` on success or `CommsErr` on failure.
    /// A stream that ends, even halfway through a frame, is `CommsErr::ConnectionLost`.
    pub async fn recv<T: Deserialize>(&mut self) -> Result<T> {
        match self.rx.next().await {
            Some(Ok(frame)) => T::deserialize(&frame),
            Some(Err(e)) if e.kind() == std::io::ErrorKind::InvalidData => Err(CommsErr::Io(e)),
            Some(Err(e)) => {
                debug!("read failed: {e}");
                Err(CommsErr::ConnectionLost)
            }
            None => Err(CommsErr::ConnectionLost),
        }
    }

    /// Receives a message that must be exactly `token`.
    ///
    /// # Errors
    /// `CommsErr::ProtocolViolation` if any other message arrives.
    pub async fn expect(&mut self, token: Token) -> Result<()> {
        match self.recv::<Token>().await {
            Ok(got) if got == token => Ok(()),
            Ok(got) => Err(CommsErr::ProtocolViolation {
                expected: token.name(),
                got: got.name().to_string(),
            }),
            Err(CommsErr::ProtocolViolation { got, .. }) => Err(CommsErr::ProtocolViolation {
                expected: token.name(),
                got,
            }),
            Err(e) => Err(e),
        }
    }
}
