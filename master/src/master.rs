use std::{fmt, io, net::SocketAddr, num::NonZeroUsize, sync::Arc, time::Duration};

use comms::{DataPoint, handshake};
use knn::partition;
use log::{debug, info, warn};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    task::JoinSet,
    time,
};

use crate::{
    CollectConfig, MasterConfig, MasterErr, Result,
    config,
    neighbors::NeighborSets,
    session::{Connection, RunParams},
};

pub type NetConnection = Connection<OwnedReadHalf, OwnedWriteHalf>;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// The steps of a run, in order. Each worker connection tracks its own from `DistributingTraining` on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    DistributingTraining,
    DistributingQueries,
    Collecting,
    Shutdown,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Connecting => "CONNECTING",
            Phase::DistributingTraining => "DISTRIBUTING_TRAINING",
            Phase::DistributingQueries => "DISTRIBUTING_QUERIES",
            Phase::Collecting => "COLLECTING",
            Phase::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The coordinator of one classification run.
///
/// Owns the datasets, hands a training partition and every query to each
/// worker, then merges what they report into one label per query.
#[derive(Debug)]
pub struct Master {
    workers: NonZeroUsize,
    k: NonZeroUsize,
    shuffle: bool,
    seed: Option<u64>,
    collect: CollectConfig,
    training: Vec<DataPoint>,
    queries: Arc<[DataPoint]>,
}

impl Master {
    /// Creates a new `Master`, training set order is kept unless `with_shuffle` says otherwise.
    ///
    /// # Arguments
    /// * `training` - The labeled points.
    /// * `queries` - The points to classify.
    /// * `workers` - How many workers take part in the run.
    /// * `k` - How many neighbors vote for each query.
    ///
    /// # Errors
    /// `MasterErr::InvalidConfig` if the datasets don't validate.
    pub fn new(
        training: Vec<DataPoint>,
        queries: Vec<DataPoint>,
        workers: NonZeroUsize,
        k: NonZeroUsize,
    ) -> Result<Self> {
        config::validate(&training, &queries)?;

        Ok(Self {
            workers,
            k,
            shuffle: false,
            seed: None,
            collect: CollectConfig::default(),
            training,
            queries: queries.into(),
        })
    }

    /// Builds the master described by a config file, loading its datasets.
    pub fn from_config(config: &MasterConfig) -> Result<Self> {
        let (training, queries) = config.load_datasets()?;

        Ok(Self::new(training, queries, config.workers, config.k)?
            .with_shuffle(config.shuffle, config.seed)
            .with_collect(config.collect))
    }

    /// Shuffles the training set before partitioning, with a fixed seed if given.
    pub fn with_shuffle(mut self, shuffle: bool, seed: Option<u64>) -> Self {
        self.shuffle = shuffle;
        self.seed = seed;
        self
    }

    pub fn with_collect(mut self, collect: CollectConfig) -> Self {
        self.collect = collect;
        self
    }

    pub fn workers(&self) -> NonZeroUsize {
        self.workers
    }

    /// Accepts connections on `listener` until exactly `workers` handshakes succeed.
    ///
    /// Handshakes run on their own tasks so a silent peer can't hold up the others.
    /// Peers that fail the handshake are dropped and don't count.
    ///
    /// # Returns
    /// The connections in the order their handshakes completed.
    pub async fn accept_workers(&self, listener: &TcpListener) -> Result<Vec<NetConnection>> {
        self.accept_with(move || listener.accept()).await
    }

    /// Same as `accept_workers`, taking connections from any `accept` source.
    ///
    /// A failed accept is logged and retried after a short pause, only
    /// `workers` completed handshakes end this phase.
    pub async fn accept_with<F, Fut>(&self, mut accept: F) -> Result<Vec<NetConnection>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = io::Result<(TcpStream, SocketAddr)>>,
    {
        let target = self.workers.get();
        let mut connections = Vec::with_capacity(target);
        let mut handshakes = JoinSet::new();

        info!(phase = Phase::Connecting.as_str(), workers = target; "waiting for workers");

        while connections.len() < target {
            tokio::select! {
                accepted = accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("accepted connection from {addr}");

                        handshakes.spawn(async move {
                            let (rx, tx) = stream.into_split();
                            let (mut rx, mut tx) = comms::channel(rx, tx);

                            match handshake::welcome(&mut rx, &mut tx).await {
                                Ok(()) => Ok((addr, rx, tx)),
                                Err(e) => Err((addr, e)),
                            }
                        });
                    }
                    Err(e) => {
                        warn!(phase = Phase::Connecting.as_str(); "failed to accept a connection: {e}");
                        time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(joined) = handshakes.join_next() => match joined {
                    Ok(Ok((addr, rx, tx))) => {
                        let worker_id = connections.len();
                        info!(worker_id = worker_id; "worker connected from {addr}");
                        connections.push(Connection::new(worker_id, addr, rx, tx));
                    }
                    Ok(Err((addr, e))) => warn!("rejected peer {addr}: {e}"),
                    Err(e) => warn!("handshake task failed: {e}"),
                },
            }
        }

        handshakes.abort_all();
        Ok(connections)
    }

    /// Runs the whole classification: accepts the workers, then drives them.
    ///
    /// # Returns
    /// Every query with its computed label, in the original query order.
    pub async fn run(self, listener: &TcpListener) -> Result<Vec<DataPoint>> {
        let connections = self.accept_workers(listener).await?;
        self.run_with(connections).await
    }

    /// Drives already greeted connections through distribution, collection and shutdown.
    ///
    /// # Arguments
    /// * `connections` - Exactly `workers` connections, numbered `0..workers`.
    ///
    /// # Returns
    /// Every query with its computed label, in the original query order.
    pub async fn run_with<R, W>(self, mut connections: Vec<Connection<R, W>>) -> Result<Vec<DataPoint>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        connections.sort_by_key(Connection::id);
        if connections.iter().enumerate().any(|(i, conn)| conn.id() != i)
            || connections.len() != self.workers.get()
        {
            return Err(MasterErr::InvalidConfig(format!(
                "expected connections numbered 0..{}",
                self.workers
            )));
        }

        let Self {
            workers,
            k,
            shuffle,
            seed,
            collect,
            mut training,
            queries,
        } = self;

        info!(phase = Phase::DistributingTraining.as_str(), points = training.len(); "partitioning training set");
        if shuffle {
            match seed {
                Some(seed) => training.shuffle(&mut StdRng::seed_from_u64(seed)),
                None => training.shuffle(&mut rand::rng()),
            }
        }

        let params = RunParams {
            k: k.get(),
            workers: workers.get(),
            collect,
        };

        let mut tasks = JoinSet::new();
        for (mut conn, range) in connections.into_iter().zip(partition::shares(training.len(), workers)) {
            let share = training[range].to_vec();
            let queries = Arc::clone(&queries);

            tasks.spawn(async move {
                let report = conn.exchange(&share, &queries, params).await?;
                Ok::<_, MasterErr>((conn, report))
            });
        }

        debug!(queries = queries.len(); "every worker exchange started");

        let mut finished = Vec::with_capacity(workers.get());
        while let Some(joined) = tasks.join_next().await {
            let (conn, report) = joined.map_err(|e| MasterErr::Join(e.to_string()))??;
            debug!(worker_id = conn.id(); "worker reported");
            finished.push((conn, report));
        }

        finished.sort_by_key(|(conn, _)| conn.id());

        let mut sets = NeighborSets::new(&queries);
        let mut connections = Vec::with_capacity(finished.len());
        for (conn, report) in finished {
            sets.merge(conn.id(), report)?;
            connections.push(conn);
        }

        let classified = sets.finalize(&queries, k.get())?;

        info!(phase = Phase::Shutdown.as_str(); "closing connections");
        for conn in &mut connections {
            if let Err(e) = conn.close().await {
                warn!(worker_id = conn.id(); "failed to close connection to {}: {e}", conn.addr());
            }
        }

        Ok(classified)
    }
}
