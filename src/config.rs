//! Runtime configuration (JSON file, every field optional).
//!
//! {
//!   "flow_capacity": 10000,
//!   "preferences_path": "/var/lib/svcmap/prefs.json",
//!   "log_filter": "info,svcmap=debug"
//! }

use crate::Result;

use anyhow::{Context, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_FLOW_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Flows kept per frame; oldest are evicted beyond this.
    pub flow_capacity: usize,

    /// Where visual toggles and the last namespace persist. In-memory if unset.
    pub preferences_path: Option<PathBuf>,

    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins if set.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flow_capacity: DEFAULT_FLOW_CAPACITY,
            preferences_path: None,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.flow_capacity == 0 {
            bail!("flow_capacity must be at least 1");
        }
        Ok(())
    }
}
