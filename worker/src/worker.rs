use std::{fmt, num::NonZeroUsize};

use comms::{
    CommsErr, DataPoint, OnoReceiver, OnoSender, handshake,
    msg::{Count, Token},
    report::{self, Candidates},
    share_batch,
};
use log::{debug, info, warn};
use rayon::prelude::*;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    task, time,
};

use crate::{Result, WorkerConfig, WorkerErr};

/// The steps a worker goes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    AwaitTraining,
    AwaitQueries,
    Computing,
    Reporting,
    Done,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Connecting => "CONNECTING",
            Phase::AwaitTraining => "AWAIT_TRAINING",
            Phase::AwaitQueries => "AWAIT_QUERIES",
            Phase::Computing => "COMPUTING",
            Phase::Reporting => "REPORTING",
            Phase::Done => "DONE",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A worker session: receives a training partition and the queries, answers
/// with the local nearest neighbors of every query.
#[derive(Debug)]
pub struct Worker {
    phase: Phase,
}

impl Default for Worker {
    fn default() -> Self {
        Self::new()
    }
}

impl Worker {
    pub fn new() -> Self {
        Self {
            phase: Phase::Connecting,
        }
    }

    /// The phase the worker is in, or stopped in if `run` failed.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Opens the TCP connection to the master.
    ///
    /// Retries up to the configured number of attempts with a fixed delay in between.
    ///
    /// # Returns
    /// Both ends of the connection, ready for `run`.
    pub async fn connect(
        config: &WorkerConfig,
    ) -> Result<(OnoReceiver<OwnedReadHalf>, OnoSender<OwnedWriteHalf>)> {
        let attempts = config.connect_attempts().get();
        let mut attempt = 1;

        let stream = loop {
            match TcpStream::connect(config.addr()).await {
                Ok(stream) => break stream,
                Err(e) if attempt < attempts => {
                    warn!(attempt = attempt; "failed to connect to {}: {e}, retrying", config.addr());
                    attempt += 1;
                    time::sleep(config.connect_delay()).await;
                }
                Err(e) => return Err(WorkerErr::Io(e)),
            }
        };

        info!("connected to master at {}", config.addr());
        let (rx, tx) = stream.into_split();
        Ok(comms::channel(rx, tx))
    }

    /// Runs the whole worker protocol over an open connection and closes it.
    ///
    /// # Arguments
    /// * `rx` - Receiving end of the master channel.
    /// * `tx` - Sending end of the master channel.
    ///
    /// # Errors
    /// Returns `WorkerErr` on I/O failures or protocol violations, `phase` tells where.
    pub async fn run<R, W>(&mut self, mut rx: OnoReceiver<R>, mut tx: OnoSender<W>) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send,
    {
        self.enter(Phase::Connecting);
        handshake::greet(&mut rx, &mut tx).await?;

        self.enter(Phase::AwaitTraining);
        let partition: Vec<DataPoint> = share_batch::recv_batch(&mut rx, &mut tx).await?;
        debug!(points = partition.len(); "received training partition");

        self.enter(Phase::AwaitQueries);
        let queries: Vec<DataPoint> = share_batch::recv_batch(&mut rx, &mut tx).await?;
        debug!(queries = queries.len(); "received queries");

        self.enter(Phase::Computing);
        let fetch = request_fetch_size(&mut rx, &mut tx).await?;
        let report = task::spawn_blocking(move || local_neighbors(&partition, &queries, fetch))
            .await
            .map_err(|e| WorkerErr::Join(e.to_string()))??;

        self.enter(Phase::Reporting);
        report::send_report(&report, &mut rx, &mut tx).await?;

        self.enter(Phase::Done);
        tx.close().await?;
        Ok(())
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        info!(phase = phase.as_str(); "entering phase");
    }
}

/// Asks the master for `k` and the worker count and derives how many neighbors to return.
async fn request_fetch_size<R, W>(rx: &mut OnoReceiver<R>, tx: &mut OnoSender<W>) -> Result<usize>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tx.send(&Token::RequestForK).await?;
    let Count(k) = rx.recv().await?;
    let Count(workers) = rx.recv().await?;

    let workers = NonZeroUsize::new(workers).ok_or_else(|| CommsErr::ProtocolViolation {
        expected: "a non-zero worker count",
        got: workers.to_string(),
    })?;

    let fetch = knn::local_fetch(k, workers);
    debug!(k = k, workers = workers.get(), fetch = fetch; "received run parameters");
    Ok(fetch)
}

/// The `fetch` nearest points of `partition` for every query, in query order.
pub fn local_neighbors(
    partition: &[DataPoint],
    queries: &[DataPoint],
    fetch: usize,
) -> Result<Vec<Candidates>> {
    let report = queries
        .par_iter()
        .map(|query| -> knn::Result<Candidates> {
            let neighbors = knn::nearest(partition, query, fetch)?
                .into_iter()
                .cloned()
                .collect();

            Ok(Candidates {
                query: query.id().clone(),
                neighbors,
            })
        })
        .collect::<knn::Result<Vec<_>>>()?;

    Ok(report)
}
