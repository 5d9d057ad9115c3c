mod deserialize;
mod error;
pub mod handshake;
pub mod msg;
pub mod point;
mod receiver;
pub mod report;
mod sender;
mod serialize;
pub mod share_batch;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::LengthDelimitedCodec;

pub use deserialize::Deserialize;
pub use error::{CommsErr, Result};
pub use point::{DataPoint, PointId};
pub use receiver::OnoReceiver;
pub use sender::OnoSender;
pub use serialize::Serialize;

/// Width in bytes of the big endian length field written before every frame.
const LEN_FIELD_SIZE: usize = size_of::<u64>();

/// Frames above this size are rejected as invalid data.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Upper bound on what a declared count may preallocate before any item arrives.
const MAX_PREALLOC: usize = 4096;

fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(LEN_FIELD_SIZE)
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}

/// Creates both `OnoReceiver` and `OnoSender` network channel parts.
///
/// Given a writer and reader creates and returns both ends of the communication.
///
/// # Arguments
/// * `rx` - An async readable.
/// * `tx` - An async writable.
///
/// # Returns
/// A communication stream in the form of an ono receiver and sender.
pub fn channel<R, W>(rx: R, tx: W) -> (OnoReceiver<R>, OnoSender<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (OnoReceiver::new(rx), OnoSender::new(tx))
}
