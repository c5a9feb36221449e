use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use snafu::{ResultExt, Snafu};
use url::Url;

use crate::service::backend::{Backend, BackendError};
use crate::service::storage::FileStorage;

const PREFIX: &str = "ALADIN_";

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("could not read the configuration from the environment: {source}"))]
    Environment { source: envy::Error },
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "tracking_endpoint")]
    pub endpoint: Url,
    #[serde(default, rename = "api_token")]
    pub token: Option<String>,
    #[serde(default = "defaults::storage_dir")]
    pub storage_dir: PathBuf,
    #[serde(default = "defaults::storage_slot")]
    pub storage_slot: String,
    #[serde(default = "defaults::log_dir")]
    pub log_dir: PathBuf,
    #[serde(flatten)]
    pub tracking: TrackingSettings,
}

impl Config {
    /// Read `ALADIN_*` variables from the process environment.
    pub fn from_env() -> Result<Config, ConfigError> {
        envy::prefixed(PREFIX)
            .from_env::<Config>()
            .context(EnvironmentSnafu)
    }

    pub fn from_vars<I>(vars: I) -> Result<Config, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(PREFIX)
            .from_iter::<_, Config>(vars)
            .context(EnvironmentSnafu)
    }

    pub fn backend(&self) -> Result<Backend, BackendError> {
        Backend::new(self.endpoint.clone(), self.token.as_deref())
    }

    pub fn storage(&self) -> FileStorage {
        FileStorage::new(&self.storage_dir, &self.storage_slot)
    }
}

/// Product-tuning knobs of the tracker.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TrackingSettings {
    /// How often the open session accrues elapsed time.
    #[serde(
        default = "defaults::accrual_interval",
        deserialize_with = "human_duration"
    )]
    pub accrual_interval: Duration,
    /// Elapsed time per session after which queued sessions are flushed without closing it.
    /// Zero disables the automatic flush.
    #[serde(
        default = "defaults::auto_flush_threshold",
        deserialize_with = "human_duration"
    )]
    pub auto_flush_threshold: Duration,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            accrual_interval: defaults::accrual_interval(),
            auto_flush_threshold: defaults::auto_flush_threshold(),
        }
    }
}

fn human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

mod defaults {
    use std::path::PathBuf;
    use std::time::Duration;

    pub fn storage_dir() -> PathBuf {
        PathBuf::from(".aladin")
    }

    pub fn storage_slot() -> String {
        "tracking-queue".to_string()
    }

    pub fn log_dir() -> PathBuf {
        PathBuf::from("logs")
    }

    pub fn accrual_interval() -> Duration {
        Duration::from_secs(10)
    }

    pub fn auto_flush_threshold() -> Duration {
        Duration::from_secs(5 * 60)
    }
}
