use crate::{
    cli::RunOptions,
    config::Config,
    plugin::{read_events, DeviceControl, DirectoryDevice, Plugin},
    render::Resources,
    telemetry::{endpoint_from_env, HttpSource, SnapshotCache},
    tile::ActionManager,
    Error, Result,
};
use serde_json::{json, Value};
use std::{
    fs::{self, File},
    io::BufReader,
    path::PathBuf,
    str::FromStr,
    sync::{atomic::Ordering, Arc},
    thread,
    time::Duration,
};

mod lifecycle;
mod logger;
mod polling;

pub use logger::{LogLevel, Logger, LOG_LEVEL_ENV, LOG_PATH_ENV};
pub use polling::{start_polling, PollingHandle};

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Config for the daemon after merging CLI, environment and file values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub endpoint: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub output_dir: PathBuf,
    pub events_file: Option<String>,
    pub font_path: String,
    pub placeholder_path: Option<String>,
    pub log_level: LogLevel,
    pub log_file: Option<String>,
}

impl AppConfig {
    /// CLI flag > `LHM_ENDPOINT` (endpoint only) > config file > default.
    pub fn from_sources(config: Config, opts: RunOptions) -> Result<Self> {
        let endpoint = match opts.endpoint {
            Some(endpoint) => endpoint,
            None => endpoint_from_env(Some(&config.endpoint)),
        };
        let log_level = match opts.log_level.as_deref() {
            Some(raw) => LogLevel::from_str(raw)?,
            None => config.log_level,
        };
        let output_dir = match opts.output_dir {
            Some(dir) => PathBuf::from(dir),
            None => config.resolved_output_dir()?,
        };
        let merged = Config {
            endpoint,
            poll_interval_ms: opts.interval_ms.unwrap_or(config.poll_interval_ms),
            font_path: opts.font_path.unwrap_or_else(|| config.font_path.clone()),
            placeholder_path: opts.placeholder_path.or(config.placeholder_path.clone()),
            events_file: opts.events_file.or(config.events_file.clone()),
            log_file: opts.log_file.or(config.log_file.clone()),
            log_level,
            ..config
        };
        crate::config::validate(&merged)?;

        Ok(Self {
            endpoint: merged.endpoint,
            poll_interval: Duration::from_millis(merged.poll_interval_ms),
            request_timeout: Duration::from_millis(merged.request_timeout_ms),
            output_dir,
            events_file: merged.events_file,
            font_path: merged.font_path,
            placeholder_path: merged.placeholder_path,
            log_level: merged.log_level,
            log_file: merged.log_file,
        })
    }
}

pub struct App {
    config: AppConfig,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let logger = Logger::new(config.log_level, config.log_file.clone());
        if let Err(err) = logger.install() {
            eprintln!("{err}");
        }
        Self { config }
    }

    pub fn from_options(opts: RunOptions) -> Result<Self> {
        let cfg_file = Config::load_or_default()?;
        let merged = AppConfig::from_sources(cfg_file, opts)?;
        Ok(Self::new(merged))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Entry point for the daemon: wire telemetry, rendering and the tile
    /// scheduler, replay recorded events, then wait for ctrl-c.
    pub fn run(&self) -> Result<()> {
        let config = &self.config;
        let running = lifecycle::create_shutdown_flag()?;

        let source = HttpSource::new(config.endpoint.clone(), config.request_timeout)?;
        let cache = Arc::new(SnapshotCache::new(source));
        let device: Arc<dyn DeviceControl> =
            Arc::new(DirectoryDevice::new(config.output_dir.clone())?);
        let resources = Arc::new(Resources::new(config.font_path.clone()));
        let manager = Arc::new(ActionManager::new(config.poll_interval));

        let mut plugin = Plugin::new(cache.clone(), device, manager.clone(), resources);
        if let Some(path) = &config.placeholder_path {
            match fs::read(path) {
                Ok(png) => plugin = plugin.with_placeholder(png),
                Err(err) => log::warn!("placeholder {path} unreadable: {err}"),
            }
        }
        let plugin = Arc::new(plugin);

        log::info!(
            "lhmdeck start (endpoint={}, interval={}, output={})",
            config.endpoint,
            humantime::format_duration(manager.interval()),
            config.output_dir.display()
        );

        let interval_source = manager.clone();
        let mut poller = start_polling(
            cache,
            move || interval_source.interval(),
            running.clone(),
        )?;
        let tile_plugin = plugin.clone();
        let mut scheduler = manager.run(move |tile| tile_plugin.update_tile(tile))?;

        if let Some(path) = &config.events_file {
            replay_events(&plugin, path)?;
        }

        while running.load(Ordering::SeqCst) {
            thread::sleep(SHUTDOWN_POLL);
        }
        log::info!("shutting down");
        scheduler.stop();
        poller.stop();
        Ok(())
    }
}

/// Feed every event in a JSON-lines file to the plugin. Bad lines and
/// failing handlers are logged and skipped.
pub fn replay_events(plugin: &Plugin, path: &str) -> Result<usize> {
    let file = File::open(path)?;
    let mut handled = 0;
    for (idx, event) in read_events(BufReader::new(file)).enumerate() {
        match event {
            Ok(event) => {
                let name = event.name();
                match plugin.handle_event(event) {
                    Ok(()) => handled += 1,
                    Err(err) => log::warn!("event {} ({name}) failed: {err}", idx + 1),
                }
            }
            Err(err) => log::warn!("event {} skipped: {err}", idx + 1),
        }
    }
    log::info!("replayed {handled} events from {path}");
    Ok(handled)
}

/// One-shot fetch printed as JSON: every sensor with its readings.
pub fn snapshot(endpoint: Option<String>) -> Result<String> {
    let endpoint = endpoint.unwrap_or_else(|| {
        let file_endpoint = Config::load_or_default().ok().map(|cfg| cfg.endpoint);
        endpoint_from_env(file_endpoint.as_deref())
    });
    let cache = SnapshotCache::new(HttpSource::new(
        endpoint,
        Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS),
    )?);
    let value = snapshot_json(&cache)?;
    serde_json::to_string_pretty(&value).map_err(Error::from)
}

pub fn snapshot_json(cache: &SnapshotCache) -> Result<Value> {
    cache.refresh()?;
    let mut sensors = Vec::new();
    for sensor in cache.sensors()? {
        let readings = cache.readings_for_sensor(&sensor.id)?;
        sensors.push(json!({
            "id": sensor.id,
            "name": sensor.name,
            "readings": readings,
        }));
    }
    Ok(json!({ "sensors": sensors }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{FakeSource, Node};

    fn leaf(text: &str, value: &str, id: &str, kind: &str) -> Node {
        Node {
            text: text.into(),
            value: value.into(),
            min: value.into(),
            max: value.into(),
            sensor_id: id.into(),
            kind: kind.into(),
            ..Node::default()
        }
    }

    #[test]
    fn cli_values_win_over_file() {
        let file = Config {
            endpoint: "http://file/data.json".into(),
            poll_interval_ms: 2000,
            output_dir: Some("/from/file".into()),
            ..Config::default()
        };
        let opts = RunOptions {
            endpoint: Some("http://cli/data.json".into()),
            interval_ms: Some(500),
            output_dir: Some("/from/cli".into()),
            log_level: Some("trace".into()),
            ..RunOptions::default()
        };
        let merged = AppConfig::from_sources(file, opts).unwrap();
        assert_eq!(merged.endpoint, "http://cli/data.json");
        assert_eq!(merged.poll_interval, Duration::from_millis(500));
        assert_eq!(merged.output_dir, PathBuf::from("/from/cli"));
        assert_eq!(merged.log_level, LogLevel::Trace);
    }

    #[test]
    fn merged_values_are_validated() {
        let opts = RunOptions {
            interval_ms: Some(50),
            output_dir: Some("/tmp/x".into()),
            ..RunOptions::default()
        };
        assert!(AppConfig::from_sources(Config::default(), opts).is_err());

        let opts = RunOptions {
            log_level: Some("chatty".into()),
            output_dir: Some("/tmp/x".into()),
            ..RunOptions::default()
        };
        assert!(AppConfig::from_sources(Config::default(), opts).is_err());
    }

    #[test]
    fn snapshot_lists_sensors_with_readings() {
        let cpu = Node {
            text: "CPU".into(),
            children: vec![leaf("CPU Total", "12.5 %", "/amdcpu/0/load/0", "Load")],
            ..Node::default()
        };
        let root = Node {
            children: vec![cpu],
            ..Node::default()
        };
        let cache = SnapshotCache::new(FakeSource::repeating(root));
        let value = snapshot_json(&cache).unwrap();
        let sensors = value["sensors"].as_array().unwrap();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0]["id"], "/amdcpu/0");
        assert_eq!(sensors[0]["readings"][0]["label"], "CPU Total");
        assert_eq!(sensors[0]["readings"][0]["value"], 12.5);
    }

    #[test]
    fn snapshot_propagates_fetch_failure() {
        let cache = SnapshotCache::new(FakeSource::new(vec![]));
        assert!(snapshot_json(&cache).is_err());
    }
}
