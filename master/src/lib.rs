pub mod config;
pub mod error;
pub mod master;
pub mod neighbors;
pub mod session;

pub use config::{CollectConfig, DatasetConfig, MasterConfig, PointConfig};
pub use error::{MasterErr, Result};
pub use master::{Master, Phase};
pub use session::Connection;
