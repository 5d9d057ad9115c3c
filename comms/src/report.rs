//! The stream a worker uses to hand its local neighbors back to the master.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    DataPoint, MAX_PREALLOC, OnoReceiver, OnoSender, PointId, Result,
    msg::{Count, Token},
};

/// The local nearest neighbors a worker found for one query, ascending by distance.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidates {
    pub query: PointId,
    pub neighbors: Vec<DataPoint>,
}

/// Worker side: asks for permission and streams every query's candidates.
///
/// Layout: query count, then per query its neighbor count, its id and the neighbors.
pub async fn send_report<R, W>(
    report: &[Candidates],
    rx: &mut OnoReceiver<R>,
    tx: &mut OnoSender<W>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tx.send(&Token::SendClassificationDataRequest).await?;
    rx.expect(Token::AllowProceed).await?;

    tx.send(&Count(report.len())).await?;
    for candidates in report {
        tx.send(&Count(candidates.neighbors.len())).await?;
        tx.send(&candidates.query).await?;

        for neighbor in &candidates.neighbors {
            tx.send(neighbor).await?;
        }
    }

    Ok(())
}

/// Master side: grants the request and receives the whole report.
///
/// The caller must already have received `SEND_CLASSIFICATION_DATA_REQUEST`.
pub async fn recv_report<R, W>(
    rx: &mut OnoReceiver<R>,
    tx: &mut OnoSender<W>,
) -> Result<Vec<Candidates>>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tx.send(&Token::AllowProceed).await?;

    let Count(queries) = rx.recv().await?;
    let mut report = Vec::with_capacity(queries.min(MAX_PREALLOC));

    for _ in 0..queries {
        let Count(size) = rx.recv().await?;
        let query = rx.recv().await?;

        let mut neighbors = Vec::with_capacity(size.min(MAX_PREALLOC));
        for _ in 0..size {
            neighbors.push(rx.recv().await?);
        }

        report.push(Candidates { query, neighbors });
    }

    Ok(report)
}
