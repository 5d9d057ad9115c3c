//! The declare-count-then-stream discipline used for every batch transfer.
//!
//! 1. receiver sends `SEND_DATA_REQUEST`
//! 2. sender replies with the batch size
//! 3. receiver replies `READY`
//! 4. sender streams exactly that many items, one message each

use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    Deserialize, MAX_PREALLOC, OnoReceiver, OnoSender, Result, Serialize,
    msg::{Count, Token},
};

/// Sends `items` once the peer asks for them.
///
/// # Arguments
/// * `items` - The batch to send, in order.
/// * `rx` - Receiving end of the connection.
/// * `tx` - Sending end of the connection.
pub async fn send_batch<T, R, W>(
    items: &[T],
    rx: &mut OnoReceiver<R>,
    tx: &mut OnoSender<W>,
) -> Result<()>
where
    T: Serialize,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    rx.expect(Token::SendDataRequest).await?;
    tx.send(&Count(items.len())).await?;
    rx.expect(Token::Ready).await?;

    for item in items {
        tx.send(item).await?;
    }

    Ok(())
}

/// Requests a batch from the peer and receives all of it.
///
/// # Returns
/// The received items, in the order they were sent.
///
/// # Errors
/// Fails on the first item that can't be received or parsed, no item is skipped.
pub async fn recv_batch<T, R, W>(rx: &mut OnoReceiver<R>, tx: &mut OnoSender<W>) -> Result<Vec<T>>
where
    T: Deserialize,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tx.send(&Token::SendDataRequest).await?;
    let Count(size) = rx.recv().await?;
    tx.send(&Token::Ready).await?;

    let mut items = Vec::with_capacity(size.min(MAX_PREALLOC));
    for _ in 0..size {
        items.push(rx.recv().await?);
    }

    Ok(items)
}
