use serde::Deserialize;
use tvm_core::{Error, Result};

/// Where a top-level execution runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheduler {
    /// A dedicated thread streams results back over a channel.
    #[default]
    NewThread,
    /// The calling thread runs the whole execution before the first result is returned.
    Immediate,
}

/// Configuration of [`RxProcessorFactory`](crate::RxProcessorFactory).
///
/// ```rs
/// let config = RxConfig::from_json(r#"{"rx.threadPool.size": 4}"#)?;
/// assert_eq!(config.pool_size, 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RxConfig {
    /// Workers per query id. Zero disables pool-backed execution.
    #[serde(rename = "rx.threadPool.size")]
    pub pool_size: usize,
    pub scheduler: Scheduler,
}

impl RxConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }
}
