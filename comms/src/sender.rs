//! The implementation of the sending end of the application layer protocol.

use bytes::{Bytes, BytesMut};
use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio_util::codec::{FramedWrite, LengthDelimitedCodec};

use crate::{Result, Serialize};

/// The sending end handle of the communication.
pub struct OnoSender<W>
where
    W: AsyncWrite + Unpin,
{
    tx: FramedWrite<W, LengthDelimitedCodec>,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> OnoSender<W> {
    /// Creates a new `OnoSender` instance.
    ///
    /// # Arguments
    /// * `tx` - The underlying writer.
    pub(super) fn new(tx: W) -> Self {
        Self {
            tx: FramedWrite::new(tx, crate::codec()),
            buf: BytesMut::new(),
        }
    }

    /// Sends `msg` through the inner sender as a single frame and flushes it.
    ///
    /// # Arguments
    /// * `msg` - A serializable object.
    ///
    /// # Returns
    /// A result object that returns `CommsErr` on failure.
    pub async fn send<T: Serialize>(&mut self, msg: &T) -> Result<()> {
        let Self { tx, buf } = self;

        buf.clear();
        msg.serialize(buf);

        tx.send(buf.split().freeze()).await?;
        Ok(())
    }

    /// Flushes and shuts down the writing half of the stream.
    pub async fn close(&mut self) -> Result<()> {
        SinkExt::<Bytes>::close(&mut self.tx).await?;
        Ok(())
    }
}
