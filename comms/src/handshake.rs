//! The token exchange that turns a raw connection into a session.

use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{OnoReceiver, OnoSender, Result, msg::Token};

/// Connecting side: sends `GREET_SERVER` and waits for `GREET_CLIENT`.
///
/// # Errors
/// `CommsErr::ProtocolViolation` on any other reply, `CommsErr::ConnectionLost` if
/// the peer hangs up first.
pub async fn greet<R, W>(rx: &mut OnoReceiver<R>, tx: &mut OnoSender<W>) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tx.send(&Token::GreetServer).await?;
    rx.expect(Token::GreetClient).await?;
    debug!("handshake completed");
    Ok(())
}

/// Accepting side: the very first message must be `GREET_SERVER`, answered with `GREET_CLIENT`.
///
/// Nothing is sent back to a peer that opens with anything else.
pub async fn welcome<R, W>(rx: &mut OnoReceiver<R>, tx: &mut OnoSender<W>) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    rx.expect(Token::GreetServer).await?;
    tx.send(&Token::GreetClient).await
}
