use anyhow::Result as AnyResult;
use config::{builder::DefaultState, Config, ConfigBuilder, Environment as ConfigEnv, File as ConfigFile};
use duration_str::{deserialize_duration, deserialize_option_duration};
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fmt::{Display, Formatter},
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

mod parameters;

pub use parameters::*;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEVELOPMENT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GlobalConfig {
    pub workers: Option<usize>,

    #[serde(default)]
    pub mode: RunMode,

    #[serde(default)]
    pub targets: Vec<String>,

    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,

    /// Falls back to the mode's default cadence when unset.
    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub interval: Option<Duration>,

    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub notifier: NotifierConfig,
}

impl GlobalConfig {
    pub fn load_config() -> AnyResult<Self> {
        let builder = Config::builder()
            .add_source(ConfigFile::with_name("/etc/uptime-watchdog/config").required(false))
            .add_source(ConfigFile::with_name("config").required(false));
        Self::from_builder(builder)
    }

    /// Layer the `WATCHDOG_*` environment on top of `builder` and deserialize.
    ///
    /// `WATCHDOG_TARGETS` is split on commas; nested keys use `__`, e.g.
    /// `WATCHDOG_NOTIFIER__WEBHOOK_URL`.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> AnyResult<Self> {
        let cfg = builder
            .add_source(
                ConfigEnv::with_prefix("WATCHDOG")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("targets")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(cfg)
    }

    pub fn effective_interval(&self) -> Duration {
        self.interval.unwrap_or_else(|| self.mode.default_interval())
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            workers: Default::default(),
            mode: Default::default(),
            targets: Default::default(),
            timeout: default_timeout(),
            interval: Default::default(),
            listen: default_listen(),
            storage: Default::default(),
            notifier: Default::default(),
        }
    }
}

const fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

const fn default_notify_timeout() -> Duration {
    DEFAULT_NOTIFY_TIMEOUT
}

fn default_listen() -> SocketAddr {
    (Ipv4Addr::UNSPECIFIED, DEFAULT_PORT).into()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Production,
    Development,
}

impl RunMode {
    pub fn default_interval(&self) -> Duration {
        match self {
            RunMode::Production => DEFAULT_INTERVAL,
            RunMode::Development => DEVELOPMENT_INTERVAL,
        }
    }
}

impl Display for RunMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Production => f.write_str("production"),
            RunMode::Development => f.write_str("development"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_status_file")]
    pub status_file: PathBuf,
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            status_file: default_status_file(),
            history_file: default_history_file(),
        }
    }
}

fn default_status_file() -> PathBuf {
    PathBuf::from("health-status.json")
}

fn default_history_file() -> PathBuf {
    PathBuf::from("health-events.log")
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(
        default = "default_notify_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub timeout: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: Default::default(),
            recipient: Default::default(),
            timeout: default_notify_timeout(),
        }
    }
}
