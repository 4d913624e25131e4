pub mod app;
pub mod cli;
pub mod config;
pub mod plugin;
pub mod render;
pub mod telemetry;
pub mod tile;

pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide failure taxonomy.
///
/// `Clone` so a single upstream refresh result can be handed to every caller
/// that was waiting on it.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    InvalidArgs(String),
    Io(std::io::ErrorKind, String),
    SourceUnavailable(String),
    Decode(String),
    NotReady,
    UnknownSensor(String),
    UnknownReading(i32),
    UnknownLabel(usize),
    UnknownTile(String),
    UnknownThreshold(String),
    InvalidOperator(String),
    InvalidDirection(String),
    Render(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidArgs(msg) => write!(f, "invalid arguments: {msg}"),
            Error::Io(_, msg) => write!(f, "io error: {msg}"),
            Error::SourceUnavailable(msg) => write!(f, "telemetry source unavailable: {msg}"),
            Error::Decode(msg) => write!(f, "decode error: {msg}"),
            Error::NotReady => write!(f, "telemetry data not ready"),
            Error::UnknownSensor(id) => write!(f, "sensor {id} not found"),
            Error::UnknownReading(id) => write!(f, "reading {id} not found"),
            Error::UnknownLabel(key) => write!(f, "label with key ({key}) does not exist"),
            Error::UnknownTile(ctx) => write!(f, "unknown tile context: {ctx}"),
            Error::UnknownThreshold(id) => write!(f, "threshold not found: {id}"),
            Error::InvalidOperator(op) => write!(f, "invalid operator: {op}"),
            Error::InvalidDirection(dir) => write!(f, "invalid direction: {dir}"),
            Error::Render(msg) => write!(f, "render error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value.kind(), value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Decode(value.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::SourceUnavailable(value.to_string())
    }
}
