use std::net::SocketAddr;

use comms::{
    CommsErr, DataPoint, OnoReceiver, OnoSender,
    msg::{Count, Token},
    report::{self, Candidates},
    share_batch,
};
use log::{debug, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    time,
};

use crate::{CollectConfig, MasterErr, Phase, Result};

/// A worker's connection, tracked from its handshake until it is closed.
pub struct Connection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    id: usize,
    addr: SocketAddr,
    phase: Phase,
    rx: OnoReceiver<R>,
    tx: OnoSender<W>,
}

/// What every worker is told when it asks for `k`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunParams {
    pub k: usize,
    pub workers: usize,
    pub collect: CollectConfig,
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a new `Connection` out of an already greeted channel.
    ///
    /// # Arguments
    /// * `id` - The worker index, the order in which its handshake completed.
    /// * `addr` - The peer address.
    /// * `rx` - The receiving end of the communication.
    /// * `tx` - The sending end of the communication.
    pub fn new(id: usize, addr: SocketAddr, rx: OnoReceiver<R>, tx: OnoSender<W>) -> Self {
        Self {
            id,
            addr,
            phase: Phase::DistributingTraining,
            rx,
            tx,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The step this worker's exchange has reached.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs the whole exchange with this worker: distribution, then collection.
    ///
    /// # Arguments
    /// * `share` - This worker's partition of the training set.
    /// * `queries` - The full query set.
    /// * `params` - The run parameters handed out on request.
    ///
    /// # Returns
    /// The worker's candidates for every query.
    pub(crate) async fn exchange(
        &mut self,
        share: &[DataPoint],
        queries: &[DataPoint],
        params: RunParams,
    ) -> Result<Vec<Candidates>> {
        let worker_id = self.id;
        self.exchange_inner(share, queries, params)
            .await
            .map_err(|source| MasterErr::Worker { worker_id, source })
    }

    async fn exchange_inner(
        &mut self,
        share: &[DataPoint],
        queries: &[DataPoint],
        params: RunParams,
    ) -> comms::Result<Vec<Candidates>> {
        let Self { id, phase, rx, tx, .. } = self;

        info!(worker_id = *id, phase = phase.as_str(), points = share.len(); "sending training partition");
        share_batch::send_batch(share, rx, tx).await?;

        *phase = Phase::DistributingQueries;
        info!(worker_id = *id, phase = phase.as_str(), queries = queries.len(); "sending queries");
        share_batch::send_batch(queries, rx, tx).await?;

        *phase = Phase::Collecting;
        info!(worker_id = *id, phase = phase.as_str(); "waiting for the report");
        await_token(*id, rx, Token::RequestForK, params.collect).await?;
        tx.send(&Count(params.k)).await?;
        tx.send(&Count(params.workers)).await?;

        await_token(*id, rx, Token::SendClassificationDataRequest, params.collect).await?;
        let report = report::recv_report(rx, tx).await?;
        debug!(worker_id = *id, queries = report.len(); "received candidates");

        Ok(report)
    }

    /// Flushes and shuts down the sending half of the connection.
    pub async fn close(&mut self) -> Result<()> {
        let worker_id = self.id;
        self.phase = Phase::Shutdown;
        self.tx
            .close()
            .await
            .map_err(|source| MasterErr::Worker { worker_id, source })
    }
}

/// Waits for `token`, bounded by the collect timeout when there is one.
///
/// A timed out wait is retried on the same connection, receiving is cancel safe
/// so no partially read frame is lost. Running out of retries is `ConnectionLost`.
async fn await_token<R>(
    worker_id: usize,
    rx: &mut OnoReceiver<R>,
    token: Token,
    collect: CollectConfig,
) -> comms::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(timeout) = collect.timeout() else {
        return rx.expect(token).await;
    };

    for attempt in 0..=collect.retries {
        match time::timeout(timeout, rx.expect(token)).await {
            Ok(ret) => return ret,
            Err(_) => {
                warn!(worker_id = worker_id, attempt = attempt; "timed out waiting for {token}")
            }
        }
    }

    Err(CommsErr::ConnectionLost)
}
