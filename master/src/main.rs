use std::{env, io};

use log::info;
use tokio::{net::TcpListener, signal};

use master::{Master, MasterConfig};

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let path = env::args()
        .nth(1)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "usage: master <config.json>"))?;

    let config = MasterConfig::from_path(&path)?;
    let master = Master::from_config(&config)?;

    let listener = TcpListener::bind(&config.addr).await?;
    info!("listening at {}", config.addr);

    tokio::select! {
        ret = master.run(&listener) => {
            for point in ret? {
                println!("{point}");
            }
            info!("wrapping up, disconnecting...");
        }
        _ = signal::ctrl_c() => {
            info!("received SIGTERM");
        }
    }

    Ok(())
}
