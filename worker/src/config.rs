use std::{env, num::NonZeroUsize, str::FromStr, time::Duration};

use crate::{Result, WorkerErr};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_CONNECT_ATTEMPTS: NonZeroUsize = NonZeroUsize::new(10).unwrap();
const DEFAULT_CONNECT_DELAY: Duration = Duration::from_millis(500);

/// Where the master lives and how hard to try reaching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    addr: String,
    connect_attempts: NonZeroUsize,
    connect_delay: Duration,
}

impl WorkerConfig {
    /// Creates a new worker configuration with the default connect policy.
    ///
    /// # Arguments
    /// * `addr` - The `host:port` of the master.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            connect_delay: DEFAULT_CONNECT_DELAY,
        }
    }

    /// Overrides how many times the TCP connect is tried and the pause between tries.
    pub fn with_connect_policy(mut self, attempts: NonZeroUsize, delay: Duration) -> Self {
        self.connect_attempts = attempts;
        self.connect_delay = delay;
        self
    }

    /// Reads the configuration from the process environment.
    ///
    /// `MASTER_PORT` is required, `MASTER_HOST`, `CONNECT_ATTEMPTS` and
    /// `CONNECT_DELAY_MS` fall back to their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration out of any key lookup.
    ///
    /// # Arguments
    /// * `lookup` - Returns the value of a variable, if set.
    ///
    /// # Errors
    /// `WorkerErr::InvalidConfig` if the port is missing or a value doesn't parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("MASTER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port: u16 = parse_var(&lookup, "MASTER_PORT")?
            .ok_or_else(|| WorkerErr::InvalidConfig("MASTER_PORT is not set".into()))?;

        let attempts = parse_var::<usize, _>(&lookup, "CONNECT_ATTEMPTS")?
            .map(|n| {
                NonZeroUsize::new(n)
                    .ok_or_else(|| WorkerErr::InvalidConfig("CONNECT_ATTEMPTS must be positive".into()))
            })
            .transpose()?
            .unwrap_or(DEFAULT_CONNECT_ATTEMPTS);

        let delay = parse_var(&lookup, "CONNECT_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_CONNECT_DELAY);

        Ok(Self::new(format!("{host}:{port}")).with_connect_policy(attempts, delay))
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn connect_attempts(&self) -> NonZeroUsize {
        self.connect_attempts
    }

    pub fn connect_delay(&self) -> Duration {
        self.connect_delay
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| WorkerErr::InvalidConfig(format!("{key}={value:?} is not valid")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = WorkerConfig::from_lookup(lookup(&[("MASTER_PORT", "1223")])).unwrap();

        assert_eq!(config.addr(), "127.0.0.1:1223");
        assert_eq!(config.connect_attempts().get(), 10);
        assert_eq!(config.connect_delay(), Duration::from_millis(500));
    }

    #[test]
    fn overrides_apply() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("MASTER_HOST", "10.0.0.7"),
            ("MASTER_PORT", "9000"),
            ("CONNECT_ATTEMPTS", "3"),
            ("CONNECT_DELAY_MS", "25"),
        ]))
        .unwrap();

        assert_eq!(config.addr(), "10.0.0.7:9000");
        assert_eq!(config.connect_attempts().get(), 3);
        assert_eq!(config.connect_delay(), Duration::from_millis(25));
    }

    #[test]
    fn rejects_bad_values() {
        let cases: [&[(&str, &str)]; 4] = [
            &[],
            &[("MASTER_PORT", "http")],
            &[("MASTER_PORT", "1"), ("CONNECT_ATTEMPTS", "0")],
            &[("MASTER_PORT", "1"), ("CONNECT_DELAY_MS", "-5")],
        ];

        for vars in cases {
            assert!(matches!(
                WorkerConfig::from_lookup(lookup(vars)),
                Err(WorkerErr::InvalidConfig(_))
            ));
        }
    }
}
