use std::io;

use log::info;
use tokio::signal;

use worker::{Worker, WorkerConfig};

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let config = WorkerConfig::from_env()?;
    let (rx, tx) = Worker::connect(&config).await?;
    let mut worker = Worker::new();

    tokio::select! {
        ret = worker.run(rx, tx) => {
            ret?;
            info!("wrapping up, disconnecting...");
        }
        _ = signal::ctrl_c() => {
            info!("received SIGTERM");
        }
    }

    Ok(())
}
