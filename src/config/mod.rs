use crate::app::LogLevel;
use crate::render::DEFAULT_FONT_PATH;
use crate::telemetry::{http::DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_ENDPOINT};
use crate::tile::settings::DEFAULT_POLL_INTERVAL_MS;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

pub mod loader;

pub const DEFAULT_POLL_INTERVAL: u64 = DEFAULT_POLL_INTERVAL_MS as u64;
pub const MIN_POLL_INTERVAL_MS: u64 = 250;
pub const MAX_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_TIMEOUT_MS: u64 = DEFAULT_REQUEST_TIMEOUT_MS;
pub const MIN_TIMEOUT_MS: u64 = 100;
pub const MAX_TIMEOUT_MS: u64 = 10_000;
pub const TILES_DIR_NAME: &str = "tiles";
const CONFIG_DIR_NAME: &str = ".lhmdeck";
const CONFIG_FILE_NAME: &str = "config.toml";

/// User-supplied settings loaded from the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub endpoint: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub font_path: String,
    pub placeholder_path: Option<String>,
    pub output_dir: Option<String>,
    pub events_file: Option<String>,
    pub log_level: LogLevel,
    pub log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL,
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            font_path: DEFAULT_FONT_PATH.to_string(),
            placeholder_path: None,
            output_dir: None,
            events_file: None,
            log_level: LogLevel::default(),
            log_file: None,
        }
    }
}

impl Config {
    pub fn load_or_default() -> Result<Self> {
        loader::load_or_default()
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        loader::load_from_path(path)
    }

    pub fn save(&self) -> Result<()> {
        loader::save(self)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        loader::save_to_path(self, path)
    }

    /// Where rendered tiles go when `output_dir` is unset.
    pub fn resolved_output_dir(&self) -> Result<PathBuf> {
        match &self.output_dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => Ok(config_dir()?.join(TILES_DIR_NAME)),
        }
    }
}

pub fn validate(cfg: &Config) -> Result<()> {
    if !(cfg.endpoint.starts_with("http://") || cfg.endpoint.starts_with("https://")) {
        return Err(Error::InvalidArgs(format!(
            "endpoint must start with http:// or https://, got {:?}",
            cfg.endpoint
        )));
    }
    if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&cfg.poll_interval_ms) {
        return Err(Error::InvalidArgs(format!(
            "poll_interval_ms must be between {MIN_POLL_INTERVAL_MS} and {MAX_POLL_INTERVAL_MS}"
        )));
    }
    if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&cfg.request_timeout_ms) {
        return Err(Error::InvalidArgs(format!(
            "request_timeout_ms must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS}"
        )));
    }
    if cfg.font_path.trim().is_empty() {
        return Err(Error::InvalidArgs("font_path must not be empty".into()));
    }
    Ok(())
}

/// `$HOME/.lhmdeck`, falling back to the platform home directory when
/// `HOME` is unset.
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .or_else(|| directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()))
        .ok_or_else(|| Error::InvalidArgs("cannot locate a home directory".into()))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        validate(&Config::default()).unwrap();
    }

    #[test]
    fn rejects_out_of_range_interval() {
        let cfg = Config {
            poll_interval_ms: 100,
            ..Config::default()
        };
        let err = validate(&cfg).unwrap_err();
        assert!(format!("{err}").contains("poll_interval_ms"));
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let cfg = Config {
            endpoint: "ftp://host/data.json".into(),
            ..Config::default()
        };
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn explicit_output_dir_wins() {
        let cfg = Config {
            output_dir: Some("/tmp/lhm-tiles".into()),
            ..Config::default()
        };
        assert_eq!(
            cfg.resolved_output_dir().unwrap(),
            PathBuf::from("/tmp/lhm-tiles")
        );
    }
}
