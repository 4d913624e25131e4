use std::fs::{File, OpenOptions};
use std::io::Write;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use crate::{Error, Result};

pub const LOG_LEVEL_ENV: &str = "LHMDECK_LOG_LEVEL";
pub const LOG_PATH_ENV: &str = "LHMDECK_LOG_PATH";

/// Log verbosity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    #[default]
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    fn filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(Error::InvalidArgs(format!(
                "log level must be one of error|warn|info|debug|trace, got {other:?}"
            ))),
        }
    }
}

/// Stderr logger with an optional append-only file sink, installed as the
/// `log` backend.
pub struct Logger {
    level: LogLevel,
    file: Option<Mutex<File>>,
}

impl Logger {
    /// Environment overrides win over the configured level and path.
    pub fn new(level: LogLevel, file_path: Option<String>) -> Self {
        let effective_level = std::env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|s| LogLevel::from_str(&s).ok())
            .unwrap_or(level);

        let path = std::env::var(LOG_PATH_ENV).ok().or(file_path);
        let file = path.and_then(|p| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&p)
                .map_err(|err| eprintln!("cannot open log file {p}: {err}"))
                .ok()
        });
        Self {
            level: effective_level,
            file: file.map(Mutex::new),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Install as the global logger. A second call fails; callers may ignore it.
    pub fn install(self) -> Result<()> {
        let filter = self.level.filter();
        log::set_boxed_logger(Box::new(self))
            .map_err(|err| Error::InvalidArgs(format!("logger already installed: {err}")))?;
        log::set_max_level(filter);
        Ok(())
    }

    fn format_line(record: &log::Record) -> String {
        format!(
            "[{}] [{}] {}: {}",
            humantime::format_rfc3339_millis(SystemTime::now()),
            record.level(),
            record.target(),
            record.args()
        )
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level.filter()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::format_line(record);
        eprintln!("{line}");
        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = writeln!(file, "{line}");
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = file.lock().unwrap_or_else(PoisonError::into_inner).flush();
        }
    }
}
