use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use crate::Result;

/// Outbound side of the display host.
pub trait DeviceControl: Send + Sync {
    fn push_image(&self, context: &str, png: &[u8]) -> Result<()>;
    fn push_title(&self, context: &str, title: &str) -> Result<()>;
    fn persist_settings(&self, context: &str, settings: &Value) -> Result<()>;
    fn notify_inspector(&self, action: &str, context: &str, payload: &Value) -> Result<()>;
    fn persist_global_settings(&self, settings: &Value) -> Result<()>;
}

/// Size at which a tile's inspector log starts over.
pub const INSPECTOR_LOG_LIMIT: u64 = 256 * 1024;

/// Headless device that mirrors every tile into files under one directory.
pub struct DirectoryDevice {
    dir: PathBuf,
    inspector_limit: u64,
}

impl DirectoryDevice {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            inspector_limit: INSPECTOR_LOG_LIMIT,
        })
    }

    pub fn with_inspector_limit(mut self, bytes: u64) -> Self {
        self.inspector_limit = bytes;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tile_path(&self, context: &str, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}.{suffix}", sanitize(context)))
    }

    /// Write through a sibling temp file so readers never see a torn image.
    fn replace(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl DeviceControl for DirectoryDevice {
    fn push_image(&self, context: &str, png: &[u8]) -> Result<()> {
        self.replace(&self.tile_path(context, "png"), png)
    }

    fn push_title(&self, context: &str, title: &str) -> Result<()> {
        self.replace(&self.tile_path(context, "title"), title.as_bytes())
    }

    fn persist_settings(&self, context: &str, settings: &Value) -> Result<()> {
        let body = serde_json::to_vec_pretty(settings)?;
        self.replace(&self.tile_path(context, "settings.json"), &body)
    }

    fn notify_inspector(&self, action: &str, context: &str, payload: &Value) -> Result<()> {
        let line = serde_json::json!({ "action": action, "payload": payload });
        let path = self.tile_path(context, "inspector.jsonl");
        let full = fs::metadata(&path)
            .map(|meta| meta.len() >= self.inspector_limit)
            .unwrap_or(false);
        let mut options = OpenOptions::new();
        options.create(true);
        if full {
            options.write(true).truncate(true);
        } else {
            options.append(true);
        }
        let mut file = options.open(&path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn persist_global_settings(&self, settings: &Value) -> Result<()> {
        let body = serde_json::to_vec_pretty(settings)?;
        self.replace(&self.dir.join("global.json"), &body)
    }
}

fn sanitize(context: &str) -> String {
    let cleaned: String = context
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".into()
    } else {
        cleaned
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Image { context: String, png: Vec<u8> },
    Title { context: String, title: String },
    Settings { context: String, settings: Value },
    Inspector { action: String, context: String, payload: Value },
    GlobalSettings(Value),
}

/// In-memory device that records every call, for tests and dry runs.
#[derive(Default)]
pub struct RecordingDevice {
    calls: Mutex<Vec<DeviceCall>>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: DeviceCall) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        Ok(())
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn images(&self, ctx: &str) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCall::Image { context, png } if context == ctx => Some(png),
                _ => None,
            })
            .collect()
    }

    pub fn last_settings(&self, ctx: &str) -> Option<Value> {
        self.calls().into_iter().rev().find_map(|c| match c {
            DeviceCall::Settings { context, settings } if context == ctx => Some(settings),
            _ => None,
        })
    }

    pub fn inspector(&self, ctx: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCall::Inspector { context, payload, .. } if context == ctx => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn last_global_settings(&self) -> Option<Value> {
        self.calls().into_iter().rev().find_map(|c| match c {
            DeviceCall::GlobalSettings(v) => Some(v),
            _ => None,
        })
    }
}

impl DeviceControl for RecordingDevice {
    fn push_image(&self, context: &str, png: &[u8]) -> Result<()> {
        self.record(DeviceCall::Image {
            context: context.into(),
            png: png.to_vec(),
        })
    }

    fn push_title(&self, context: &str, title: &str) -> Result<()> {
        self.record(DeviceCall::Title {
            context: context.into(),
            title: title.into(),
        })
    }

    fn persist_settings(&self, context: &str, settings: &Value) -> Result<()> {
        self.record(DeviceCall::Settings {
            context: context.into(),
            settings: settings.clone(),
        })
    }

    fn notify_inspector(&self, action: &str, context: &str, payload: &Value) -> Result<()> {
        self.record(DeviceCall::Inspector {
            action: action.into(),
            context: context.into(),
            payload: payload.clone(),
        })
    }

    fn persist_global_settings(&self, settings: &Value) -> Result<()> {
        self.record(DeviceCall::GlobalSettings(settings.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn directory_device_writes_tile_files() {
        let dir = tempfile::tempdir().unwrap();
        let device = DirectoryDevice::new(dir.path().join("tiles")).unwrap();
        device.push_image("ctx/1", b"\x89PNG").unwrap();
        device.push_title("ctx/1", "CPU").unwrap();
        device.persist_settings("ctx/1", &json!({"min": 0})).unwrap();
        device.notify_inspector("a", "ctx/1", &json!({"error": true})).unwrap();
        device.notify_inspector("a", "ctx/1", &json!({"error": false})).unwrap();
        device.persist_global_settings(&json!({"pollInterval": 500})).unwrap();

        let tiles = dir.path().join("tiles");
        assert_eq!(fs::read(tiles.join("ctx_1.png")).unwrap(), b"\x89PNG");
        assert_eq!(fs::read_to_string(tiles.join("ctx_1.title")).unwrap(), "CPU");
        let settings: Value =
            serde_json::from_slice(&fs::read(tiles.join("ctx_1.settings.json")).unwrap()).unwrap();
        assert_eq!(settings["min"], 0);
        let log = fs::read_to_string(tiles.join("ctx_1.inspector.jsonl")).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert!(tiles.join("global.json").exists());
        let leftovers = fs::read_dir(&tiles)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn inspector_log_starts_over_when_full() {
        let dir = tempfile::tempdir().unwrap();
        let device = DirectoryDevice::new(dir.path()).unwrap().with_inspector_limit(64);
        for n in 0..10 {
            device.notify_inspector("a", "t1", &json!({"n": n})).unwrap();
        }
        let path = device.tile_path("t1", "inspector.jsonl");
        let log = fs::read_to_string(&path).unwrap();
        assert!(log.len() < 64 + 40, "log kept growing: {} bytes", log.len());
        let last: Value = serde_json::from_str(log.lines().last().unwrap()).unwrap();
        assert_eq!(last["payload"]["n"], 9);
        assert!(log.lines().count() < 10);
    }

    #[test]
    fn recording_device_filters_by_tile() {
        let device = RecordingDevice::new();
        device.push_image("a", &[1]).unwrap();
        device.push_image("b", &[2]).unwrap();
        device.persist_settings("a", &json!({"v": 1})).unwrap();
        device.persist_settings("a", &json!({"v": 2})).unwrap();
        assert_eq!(device.images("a"), vec![vec![1u8]]);
        assert_eq!(device.last_settings("a").unwrap()["v"], 2);
        assert!(device.last_settings("b").is_none());
    }
}
