//! Environment and polling configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{DEFAULT_MAP_SIZE, DEFAULT_MAX_DBS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_POLL_RETRIES};
use crate::error::{Error, Result};

/// Bounded polling used when waiting on a completion handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub retries: u32,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            retries: DEFAULT_POLL_RETRIES,
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the LMDB environment (created if missing)
    pub path: PathBuf,
    pub map_size: usize,
    pub max_dbs: u32,
    pub poll: PollConfig,
}

impl Config {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Config {
            path: path.into(),
            map_size: DEFAULT_MAP_SIZE,
            max_dbs: DEFAULT_MAX_DBS,
            poll: PollConfig::default(),
        }
    }

    /// Build from `VIEWGATE_*` environment variables.
    ///
    /// `VIEWGATE_DB_PATH` falls back to `viewgate.mdb` under the temp dir.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var("VIEWGATE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("viewgate.mdb"));
        let mut config = Config::new(path);
        if let Some(v) = env_parse::<usize>("VIEWGATE_MAP_SIZE")? {
            config.map_size = v;
        }
        if let Some(v) = env_parse::<u32>("VIEWGATE_POLL_RETRIES")? {
            config.poll.retries = v;
        }
        if let Some(v) = env_parse::<u64>("VIEWGATE_POLL_INTERVAL_MS")? {
            config.poll.interval = Duration::from_millis(v);
        }
        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Result<Option<T>> {
    match std::env::var(var) {
        Ok(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Invalid(format!("{} is not a valid number: '{}'", var, s))),
        Err(_) => Ok(None),
    }
}
