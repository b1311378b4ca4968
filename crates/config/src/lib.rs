//! Layered configuration for hoard.
//!
//! Values are merged, last one wins, from:
//!
//! 1. built-in defaults ([`Config::default`]),
//! 2. a configuration file, given explicitly or discovered in the platform
//!    configuration directory (`config.toml`, `config.yaml`, `config.yml` or
//!    `config.json`),
//! 3. environment variables prefixed with `HOARD_`, nested keys separated by
//!    a double underscore (`HOARD_STORE__MAX_SAVER=8`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use hoard_storage::{DEFAULT_WORKERS, MAX_WORKERS, MIN_WORKERS, Skip};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

pub const ENV_PREFIX: &str = "HOARD_";
const CONFIG_NAMES: [&str; 4] = ["config.toml", "config.yaml", "config.yml", "config.json"];

/// 10 GiB.
pub const DEFAULT_SIZE_LIMIT: u64 = 10 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub load: LoadConfig,
    pub classify: ClassifyConfig,
    pub index: IndexConfig,
    pub organize: OrganizeConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: PathBuf,
    pub max_saver: usize,
    /// Re-hash an existing blob of the same size before skipping it.
    pub verify_existing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: data_dir().join("store"),
            max_saver: DEFAULT_WORKERS,
            verify_existing: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub max_loader: usize,
    pub skip_hidden: bool,
    /// Base names to skip regardless of case.
    pub skip_names: Vec<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            max_loader: DEFAULT_WORKERS,
            skip_hidden: true,
            skip_names: vec!["Thumbs.db".to_string()],
        }
    }
}

impl LoadConfig {
    /// The walker predicate these settings describe.
    pub fn skip(&self) -> Skip {
        let skip = if self.skip_hidden { Skip::hidden() } else { Skip::none() };
        if self.skip_names.is_empty() {
            skip
        } else {
            skip.or(Skip::names(self.skip_names.iter().cloned()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    pub batch_size: usize,
    pub max_in_flight: usize,
    /// Where listing files are written. The system temporary directory when unset.
    pub work_dir: Option<PathBuf>,
    /// Explicit path to the `file` binary. Looked up on `PATH` when unset.
    pub command: Option<PathBuf>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_in_flight: 8,
            work_dir: None,
            command: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub database: PathBuf,
    pub batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            database: data_dir().join("index.sqlite"),
            batch_size: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizeConfig {
    /// Stop linking once this many bytes have been linked in one run.
    pub size_limit: u64,
}

impl Default for OrganizeConfig {
    fn default() -> Self {
        Self { size_limit: DEFAULT_SIZE_LIMIT }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
        }
    }
}

impl LogConfig {
    pub fn level_filter(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.level).or_raise(|| ErrorKind::Invalid {
            key: "log.level",
            reason: "expected one of off, error, warn, info, debug, trace",
        })
    }
}

impl Config {
    /// Load the configuration from every layer and validate it.
    ///
    /// `explicit` must exist when given. Otherwise the first configuration
    /// file found in the platform configuration directory is used, if any.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let file = match explicit {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => discover(),
        };
        Self::from_figment(Self::figment(file.as_deref())?)
    }

    /// The merged providers, before extraction.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            tracing::debug!(path = %path.display(), "Reading configuration file");
            figment = match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
                Some("toml") => figment.merge(Toml::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                other => exn::bail!(ErrorKind::Format(other.unwrap_or_default().to_string())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Extract)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipelines would refuse at construction.
    pub fn validate(&self) -> Result<()> {
        workers("store.max_saver", self.store.max_saver)?;
        workers("load.max_loader", self.load.max_loader)?;
        nonzero("classify.batch_size", self.classify.batch_size)?;
        nonzero("classify.max_in_flight", self.classify.max_in_flight)?;
        nonzero("index.batch_size", self.index.batch_size)?;
        if self.organize.size_limit == 0 {
            exn::bail!(ErrorKind::Invalid { key: "organize.size_limit", reason: "must be positive" });
        }
        self.log.level_filter()?;
        Ok(())
    }
}

fn workers(key: &'static str, value: usize) -> Result<()> {
    if !(MIN_WORKERS..=MAX_WORKERS).contains(&value) {
        exn::bail!(ErrorKind::Invalid { key, reason: "must be within [1, 20]" });
    }
    Ok(())
}

fn nonzero(key: &'static str, value: usize) -> Result<()> {
    if value == 0 {
        exn::bail!(ErrorKind::Invalid { key, reason: "must be positive" });
    }
    Ok(())
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "hoard")
}

fn data_dir() -> PathBuf {
    project_dirs().map_or_else(|| PathBuf::from(".hoard"), |dirs| dirs.data_dir().to_path_buf())
}

/// First configuration file present in the platform configuration directory.
pub fn discover() -> Option<PathBuf> {
    let dirs = project_dirs()?;
    CONFIG_NAMES.iter().map(|name| dirs.config_dir().join(name)).find(|path| path.is_file())
}
