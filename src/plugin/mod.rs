//! Tile pipeline: turns host events and scheduler ticks into rendered
//! images, persisted settings and inspector replies.

pub mod device;
pub mod events;
mod handlers;
mod settings_tile;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::render::{Graph, Resources, Rgba, TILE_HEIGHT, TILE_WIDTH};
use crate::telemetry::{PollTime, Reading, SnapshotCache};
use crate::tile::format::{self, poll_ttl};
use crate::tile::settings::DEFAULT_POLL_INTERVAL_MS;
use crate::tile::{
    decode_settings, evaluate, sync_settings_with_readings, ActionManager, GlobalSettings,
    SettingsTileAppearance, Threshold, ThresholdState, TileAction, TileSettings, READING_ACTION,
    SETTINGS_ACTION,
};
use crate::{Error, Result};

pub use device::{DeviceCall, DeviceControl, DirectoryDevice, RecordingDevice};
pub use events::{read_events, InboundEvent, SdpiCollection, SettingsPayload, TitlePayload};

pub const TITLE_LABEL: usize = 0;
pub const VALUE_LABEL: usize = 1;
pub const ALERT_LABEL: usize = 2;
const TITLE_Y: f32 = 19.0;
const VALUE_Y: f32 = 44.0;
const ALERT_Y: f32 = 56.0;

/// A snapshot older than this counts as a lost source.
pub const STALE_AFTER: Duration = Duration::from_secs(5);
pub const UNAVAILABLE_MESSAGE: &str = "Libre Hardware Monitor Unavailable";

pub const DEFAULT_FOREGROUND: Rgba = Rgba::rgb(0, 81, 40);
pub const DEFAULT_BACKGROUND: Rgba = Rgba::BLACK;
pub const DEFAULT_HIGHLIGHT: Rgba = Rgba::rgb(0, 158, 0);
pub const DEFAULT_TITLE_COLOR: Rgba = Rgba::rgb(183, 183, 183);
pub const DEFAULT_VALUE_TEXT: Rgba = Rgba::WHITE;

struct PollState {
    cached: Option<(Result<PollTime>, Instant)>,
    ttl: Duration,
    /// Poll timestamp each tile last rendered.
    last: HashMap<String, u64>,
}

pub struct Plugin {
    cache: Arc<SnapshotCache>,
    device: Arc<dyn DeviceControl>,
    manager: Arc<ActionManager>,
    resources: Arc<Resources>,
    graphs: RwLock<HashMap<String, Arc<Mutex<Graph>>>>,
    poll: Mutex<PollState>,
    divisors: Mutex<HashMap<String, (String, f64)>>,
    global: Mutex<GlobalSettings>,
    settings_tiles: Mutex<HashMap<String, SettingsTileAppearance>>,
    placeholder: Option<Vec<u8>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn relabel(graph: &mut Graph, key: usize, text: &str) {
    if let Err(err) = graph.set_label_text(key, text) {
        log::warn!("label {key}: {err}");
    }
}

fn recolor_label(graph: &mut Graph, key: usize, color: Rgba) {
    if let Err(err) = graph.set_label_color(key, color) {
        log::warn!("label {key}: {err}");
    }
}

fn font_size_or_default(size: f64) -> f32 {
    if size == 0.0 {
        crate::render::graph::DEFAULT_FONT_SIZE
    } else {
        size as f32
    }
}

impl Plugin {
    pub fn new(
        cache: Arc<SnapshotCache>,
        device: Arc<dyn DeviceControl>,
        manager: Arc<ActionManager>,
        resources: Arc<Resources>,
    ) -> Self {
        let ttl = poll_ttl(manager.interval());
        Self {
            cache,
            device,
            manager,
            resources,
            graphs: RwLock::new(HashMap::new()),
            poll: Mutex::new(PollState {
                cached: None,
                ttl,
                last: HashMap::new(),
            }),
            divisors: Mutex::new(HashMap::new()),
            global: Mutex::new(GlobalSettings::default()),
            settings_tiles: Mutex::new(HashMap::new()),
            placeholder: None,
        }
    }

    /// Image shown while the source is unavailable, also used as the
    /// refresh-rate tile backdrop.
    pub fn with_placeholder(mut self, png: Vec<u8>) -> Self {
        self.placeholder = Some(png);
        self
    }

    pub fn manager(&self) -> &Arc<ActionManager> {
        &self.manager
    }

    pub fn global_settings(&self) -> GlobalSettings {
        *lock(&self.global)
    }

    pub fn graph(&self, context: &str) -> Option<Arc<Mutex<Graph>>> {
        self.graphs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(context)
            .cloned()
    }

    pub fn handle_event(&self, event: InboundEvent) -> Result<()> {
        log::debug!("event {}", event.name());
        match event {
            InboundEvent::WillAppear {
                action,
                context,
                payload,
            } => self.on_will_appear(&action, &context, &payload),
            InboundEvent::WillDisappear { action, context, .. } => {
                self.on_will_disappear(&action, &context);
                Ok(())
            }
            InboundEvent::DidReceiveSettings {
                action,
                context,
                payload,
            } => self.on_did_receive_settings(&action, &context, &payload),
            InboundEvent::DidReceiveGlobalSettings { payload } => {
                self.on_global_settings(&payload);
                Ok(())
            }
            InboundEvent::TitleParametersDidChange {
                action,
                context,
                payload,
            } => self.on_title_parameters(&action, &context, &payload),
            InboundEvent::PropertyInspectorDidAppear { action, context } => {
                self.on_inspector_connected(&action, &context);
                Ok(())
            }
            InboundEvent::SendToPlugin {
                action,
                context,
                payload,
            } => self.on_send_to_plugin(&action, &context, payload),
        }
    }

    fn on_will_appear(&self, action: &str, context: &str, payload: &SettingsPayload) -> Result<()> {
        if action == SETTINGS_ACTION {
            self.settings_tile_appear(context, payload.settings.as_ref());
            return Ok(());
        }

        let (mut settings, mut migrated) = match decode_payload(payload.settings.as_ref()) {
            Ok(decoded) => decoded,
            Err(err) => {
                log::warn!("willAppear {context}: {err}");
                (TileSettings::default(), false)
            }
        };
        let graph = self.build_graph(&mut settings)?;
        self.graphs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(context.to_string(), Arc::new(Mutex::new(graph)));
        lock(&self.poll).last.remove(context);

        // Colors are re-derived on the first update.
        if !settings.current_threshold.is_unset() {
            settings.current_threshold = ThresholdState::Unset;
            migrated = true;
        }
        if !settings.current_alert_state.is_empty() {
            settings.current_alert_state.clear();
            migrated = true;
        }
        for threshold in &mut settings.thresholds {
            if threshold.enabled && threshold.operator.is_empty() {
                threshold.operator = ">=".into();
                migrated = true;
            }
        }

        self.manager.set_action(action, context, settings.clone());
        if migrated {
            self.persist(context, &settings);
        }
        log::info!("tile {context} appeared (sensor {:?})", settings.sensor_uid);
        Ok(())
    }

    fn build_graph(&self, settings: &mut TileSettings) -> Result<Graph> {
        let colors = &self.resources.colors;
        let title_color = colors.get_or(&settings.title_color, DEFAULT_TITLE_COLOR);
        let value_color = colors.get_or(&settings.value_text_color, DEFAULT_VALUE_TEXT);
        let title_size = font_size_or_default(settings.title_font_size);
        let value_size = font_size_or_default(settings.value_font_size);

        let mut graph = Graph::new(
            Arc::clone(&self.resources),
            TILE_WIDTH,
            TILE_HEIGHT,
            settings.min,
            settings.max,
            colors.get_or(&settings.foreground_color, DEFAULT_FOREGROUND),
            colors.get_or(&settings.background_color, DEFAULT_BACKGROUND),
            colors.get_or(&settings.highlight_color, DEFAULT_HIGHLIGHT),
        );
        graph.set_label(TITLE_LABEL, "", TITLE_Y, title_color)?;
        graph.set_label_font_size(TITLE_LABEL, title_size)?;
        graph.set_label(VALUE_LABEL, "", VALUE_Y, value_color)?;
        graph.set_label_font_size(VALUE_LABEL, value_size)?;
        graph.set_label(ALERT_LABEL, "", ALERT_Y, value_color)?;
        graph.set_label_font_size(ALERT_LABEL, value_size)?;

        if settings.show_title_in_graph.is_none() {
            settings.show_title_in_graph = Some(true);
        }
        if settings.draws_title() {
            graph.set_label_text(TITLE_LABEL, &settings.title)?;
        }
        Ok(graph)
    }

    fn on_will_disappear(&self, action: &str, context: &str) {
        if action == SETTINGS_ACTION {
            lock(&self.settings_tiles).remove(context);
            return;
        }
        self.graphs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(context);
        lock(&self.divisors).remove(context);
        lock(&self.poll).last.remove(context);
        self.manager.remove_action(context);
        log::info!("tile {context} removed");
    }

    fn on_did_receive_settings(
        &self,
        action: &str,
        context: &str,
        payload: &SettingsPayload,
    ) -> Result<()> {
        if self.is_settings_action(action, context) {
            if let Some(raw) = payload.settings.as_ref() {
                self.settings_tile_received(context, raw);
            }
            return Ok(());
        }

        let (mut settings, migrated) = decode_payload(payload.settings.as_ref())?;
        if let Some(graph) = self.graph(context) {
            let mut graph = lock(&graph);
            graph.set_min(settings.min);
            graph.set_max(settings.max);
            self.apply_normal_colors(&mut graph, &settings);
        }
        settings.current_threshold = ThresholdState::ForceReevaluate;
        self.manager.set_action(action, context, settings.clone());
        if migrated {
            self.persist(context, &settings);
        }
        Ok(())
    }

    fn on_title_parameters(&self, action: &str, context: &str, payload: &TitlePayload) -> Result<()> {
        if self.is_settings_action(action, context) {
            self.settings_tile_title(context, payload);
            return Ok(());
        }

        let mut settings = match self.manager.get_settings(context) {
            Ok(settings) => settings,
            Err(_) => decode_payload(payload.settings.as_ref())
                .map(|(settings, _)| settings)
                .unwrap_or_else(|err| {
                    log::warn!("titleParametersDidChange {context}: {err}");
                    TileSettings::default()
                }),
        };
        let graph = self
            .graph(context)
            .ok_or_else(|| Error::UnknownTile(context.to_string()))?;

        let draw_title = !payload.title_parameters.show_title;
        {
            let mut graph = lock(&graph);
            if draw_title {
                graph.set_label_text(TITLE_LABEL, &payload.title)?;
                let color = &payload.title_parameters.title_color;
                if !color.is_empty() {
                    graph.set_label_color(TITLE_LABEL, self.resources.colors.get(color))?;
                }
            } else {
                graph.set_label_text(TITLE_LABEL, "")?;
            }
        }

        settings.title = payload.title.clone();
        settings.title_color = payload.title_parameters.title_color.clone();
        settings.show_title_in_graph = Some(draw_title);
        self.commit(action, context, &settings);
        Ok(())
    }

    fn on_inspector_connected(&self, action: &str, context: &str) {
        if self.is_settings_action(action, context) {
            self.send_settings_status(context);
            return;
        }

        let mut settings = self.manager.get_settings(context).unwrap_or_else(|err| {
            log::warn!("inspector {context}: {err}");
            TileSettings::default()
        });
        let sensors = match self.cache.sensors() {
            Ok(sensors) => sensors,
            Err(err) => {
                log::warn!("inspector {context}: sensors unavailable: {err}");
                self.notify_status(action, context, true, UNAVAILABLE_MESSAGE);
                settings.in_error_state = true;
                self.commit(action, context, &settings);
                return;
            }
        };
        let list: Vec<Value> = sensors
            .iter()
            .map(|s| json!({ "uid": s.id, "name": s.name }))
            .collect();
        log::debug!("sending {} sensors to inspector {context}", list.len());
        self.notify(
            action,
            context,
            &json!({ "sensors": list, "settings": settings.to_json() }),
        );

        if settings.sensor_uid.is_empty() {
            return;
        }
        let sensor = settings.sensor_uid.clone();
        if let Ok(readings) = self.send_readings(action, context, &sensor, &settings) {
            if sync_settings_with_readings(&mut settings, &readings) {
                self.commit(action, context, &settings);
            }
        }
    }

    fn send_readings(
        &self,
        action: &str,
        context: &str,
        sensor: &str,
        settings: &TileSettings,
    ) -> Result<Vec<Reading>> {
        let readings = self.cache.readings_for_sensor(sensor).map_err(|err| {
            log::warn!("readings for {sensor}: {err}");
            err
        })?;
        let list: Vec<Value> = readings
            .iter()
            .map(|r| {
                json!({
                    "id": r.id.to_string(),
                    "label": r.label,
                    "prefix": r.unit,
                    "unit": r.unit,
                })
            })
            .collect();
        self.notify(
            action,
            context,
            &json!({ "readings": list, "settings": settings.to_json() }),
        );
        Ok(readings)
    }

    fn on_send_to_plugin(&self, action: &str, context: &str, payload: Value) -> Result<()> {
        let Value::Object(map) = payload else {
            return Err(Error::Decode(format!("sendToPlugin payload for {context} is not an object")));
        };

        if self.is_settings_action(action, context) || settings_tile::is_settings_command(&map) {
            let target = self.resolve_settings_context(context);
            if self.handle_settings_command(&target, &map) {
                return Ok(());
            }
        }

        let Some(raw) = map.get("sdpi_collection") else {
            log::debug!("sendToPlugin {context}: nothing to do");
            return Ok(());
        };
        let sdpi: SdpiCollection = serde_json::from_value(raw.clone())?;
        if let Err(err) = self.handle_sdpi(action, context, &sdpi) {
            log::warn!("{} on {context}: {err}", sdpi.key);
            if matches!(sdpi.key.as_str(), "sensorSelect" | "readingSelect") {
                self.notify_status(action, context, true, &err.to_string());
            }
            return Err(err);
        }
        Ok(())
    }

    /// Apply a poll interval chosen on the refresh-rate tile.
    pub fn set_poll_interval(&self, interval_ms: i64) {
        let interval_ms = interval_ms.clamp(100, 30_000);
        let interval = Duration::from_millis(interval_ms as u64);
        self.manager.set_interval(interval);
        self.set_poll_ttl(poll_ttl(interval));
        let global = {
            let mut global = lock(&self.global);
            global.poll_interval = interval_ms;
            *global
        };
        self.update_all_settings_tiles();
        let body = serde_json::to_value(global).unwrap_or_default();
        if let Err(err) = self.device.persist_global_settings(&body) {
            log::warn!("persist global settings: {err}");
        }
        log::info!(
            "poll interval changed to {}",
            humantime::format_duration(interval)
        );
    }

    fn on_global_settings(&self, payload: &SettingsPayload) {
        let Some(raw) = payload.settings.as_ref() else {
            return;
        };
        let incoming: GlobalSettings = match serde_json::from_value(raw.clone()) {
            Ok(incoming) => incoming,
            Err(err) => {
                log::warn!("global settings: {err}");
                return;
            }
        };
        if incoming.poll_interval <= 0 {
            lock(&self.global).poll_interval = DEFAULT_POLL_INTERVAL_MS;
            return;
        }

        let interval_ms = incoming.poll_interval.clamp(250, 2_000);
        let changed = {
            let mut global = lock(&self.global);
            let changed = global.poll_interval != interval_ms;
            global.poll_interval = interval_ms;
            changed
        };
        if changed {
            let interval = Duration::from_millis(interval_ms as u64);
            self.manager.set_interval(interval);
            self.set_poll_ttl(poll_ttl(interval));
            log::info!(
                "global poll interval {}",
                humantime::format_duration(interval)
            );
        }
        self.update_all_settings_tiles();
    }

    fn set_poll_ttl(&self, ttl: Duration) {
        let mut poll = lock(&self.poll);
        poll.ttl = ttl;
        poll.cached = None;
    }

    /// Poll timestamp shared across every tile rendered within one TTL.
    fn cached_poll_time(&self) -> Result<PollTime> {
        let mut poll = lock(&self.poll);
        if let Some((result, at)) = &poll.cached {
            if at.elapsed() < poll.ttl {
                return result.clone();
            }
        }
        let result = self.cache.poll_time();
        poll.cached = Some((result.clone(), Instant::now()));
        result
    }

    fn divisor(&self, context: &str, raw: &str) -> Result<f64> {
        if raw.is_empty() {
            return Ok(1.0);
        }
        let mut divisors = lock(&self.divisors);
        if let Some((cached_raw, value)) = divisors.get(context) {
            if cached_raw == raw {
                return Ok(*value);
            }
        }
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|_| Error::InvalidArgs(format!("divisor {raw:?} is not a number")))?;
        divisors.insert(context.to_string(), (raw.to_string(), value));
        Ok(value)
    }

    /// One scheduler-driven render of a reading tile.
    pub fn update_tile(&self, tile: &TileAction) {
        if tile.action != READING_ACTION {
            log::warn!("update for unknown action {}", tile.action);
            return;
        }
        let Some(graph) = self.graph(&tile.context) else {
            log::warn!("no graph for tile {}", tile.context);
            return;
        };
        // Handlers may have written newer settings since the tick was planned.
        let Ok(mut settings) = self.manager.get_settings(&tile.context) else {
            return;
        };
        let context = tile.context.as_str();
        let forced = settings.current_threshold.is_forced();

        let poll = match self.cached_poll_time() {
            Ok(poll) if poll.age() <= STALE_AFTER => poll,
            Ok(poll) => {
                log::debug!(
                    "snapshot is {} old",
                    humantime::format_duration(Duration::from_secs(poll.age().as_secs()))
                );
                self.show_unavailable(context, &mut settings);
                return;
            }
            Err(err) => {
                log::debug!("poll time: {err}");
                self.show_unavailable(context, &mut settings);
                return;
            }
        };

        if !forced && lock(&self.poll).last.get(context) == Some(&poll.nanos) {
            return;
        }

        let readings = match self.cache.readings_for_sensor(&settings.sensor_uid) {
            Ok(readings) => readings,
            Err(err) => {
                log::warn!("tile {context}: {err}");
                self.show_unavailable(context, &mut settings);
                return;
            }
        };
        let reading = match find_reading(&readings, &settings) {
            Some((reading, repaired)) => {
                if repaired {
                    settings.reading_id = reading.id;
                    self.commit(READING_ACTION, context, &settings);
                }
                reading.clone()
            }
            None => {
                log::warn!("tile {context}: {}", Error::UnknownReading(settings.reading_id));
                self.show_unavailable(context, &mut settings);
                return;
            }
        };

        if settings.in_error_state {
            self.notify_status(READING_ACTION, context, false, "show_ui");
            settings.in_error_state = false;
            self.commit(READING_ACTION, context, &settings);
        }

        let mut graph = lock(&graph);
        if settings.draws_title() && settings.title.is_empty() {
            relabel(&mut graph, TITLE_LABEL, &reading.label);
        }

        let divisor = match self.divisor(context, &settings.divisor) {
            Ok(divisor) => divisor,
            Err(err) => {
                log::warn!("tile {context}: {err}");
                return;
            }
        };
        let value = reading.value / divisor;

        let throughput = !settings.graph_unit.is_empty() && format::is_throughput(&reading.unit);
        let graph_value = if throughput {
            format::normalize_for_graph(reading.value, &reading.unit, &settings.graph_unit)
        } else {
            reading.value
        };
        graph.update(graph_value / divisor);

        let active = evaluate(value, &settings.thresholds).cloned();
        let state = ThresholdState::active(active.as_ref());
        if forced || state != settings.current_threshold {
            match &active {
                Some(threshold) => self.apply_threshold_colors(&mut graph, threshold),
                None => self.apply_normal_colors(&mut graph, &settings),
            }
            settings.current_threshold = state;
            self.commit(READING_ACTION, context, &settings);
        }

        let (display_value, display_unit) = if throughput {
            (
                format::normalize_for_graph(value, &reading.unit, &settings.graph_unit),
                format!("{}/s", settings.graph_unit),
            )
        } else {
            (value, reading.unit.clone())
        };
        let (value_text, display_text) = if settings.format.is_empty() {
            let text = format::default_value_text(display_value);
            let with_unit = format::with_unit(&text, &display_unit);
            (text, with_unit)
        } else {
            let text = format::sprintf(&settings.format, display_value);
            (text.clone(), text)
        };
        relabel(&mut graph, VALUE_LABEL, &display_text);
        let alert = match &active {
            Some(threshold) if !threshold.text.is_empty() => {
                format::apply_threshold_text(&threshold.text, &value_text, &display_unit)
            }
            _ => String::new(),
        };
        relabel(&mut graph, ALERT_LABEL, &alert);

        let png = match graph.encode_png() {
            Ok(png) => png,
            Err(err) => {
                log::warn!("tile {context}: encode: {err}");
                return;
            }
        };
        drop(graph);
        if let Err(err) = self.device.push_image(context, &png) {
            log::warn!("tile {context}: push image: {err}");
            return;
        }
        lock(&self.poll).last.insert(context.to_string(), poll.nanos);
    }

    fn show_unavailable(&self, context: &str, settings: &mut TileSettings) {
        if !settings.in_error_state {
            self.notify_status(READING_ACTION, context, true, UNAVAILABLE_MESSAGE);
            settings.in_error_state = true;
            self.commit(READING_ACTION, context, settings);
            if let Some(png) = &self.placeholder {
                if let Err(err) = self.device.push_image(context, png) {
                    log::warn!("tile {context}: push placeholder: {err}");
                }
            }
        }
        // Render again as soon as the source recovers.
        lock(&self.poll).last.remove(context);
    }

    fn apply_threshold_colors(&self, graph: &mut Graph, threshold: &Threshold) {
        let colors = &self.resources.colors;
        if !threshold.background_color.is_empty() {
            graph.set_background(colors.get(&threshold.background_color));
        }
        if !threshold.foreground_color.is_empty() {
            graph.set_foreground(colors.get(&threshold.foreground_color));
        }
        if !threshold.highlight_color.is_empty() {
            graph.set_highlight(colors.get(&threshold.highlight_color));
        }
        if !threshold.value_text_color.is_empty() {
            recolor_label(graph, VALUE_LABEL, colors.get(&threshold.value_text_color));
        }
        if !threshold.text_color.is_empty() {
            recolor_label(graph, ALERT_LABEL, colors.get(&threshold.text_color));
        }
    }

    fn apply_normal_colors(&self, graph: &mut Graph, settings: &TileSettings) {
        let colors = &self.resources.colors;
        graph.set_foreground(colors.get_or(&settings.foreground_color, DEFAULT_FOREGROUND));
        graph.set_background(colors.get_or(&settings.background_color, DEFAULT_BACKGROUND));
        graph.set_highlight(colors.get_or(&settings.highlight_color, DEFAULT_HIGHLIGHT));
        let text = colors.get_or(&settings.value_text_color, DEFAULT_VALUE_TEXT);
        recolor_label(graph, VALUE_LABEL, text);
        recolor_label(graph, ALERT_LABEL, text);
    }

    fn persist(&self, context: &str, settings: &TileSettings) {
        if let Err(err) = self.device.persist_settings(context, &settings.to_json()) {
            log::warn!("persist settings for {context}: {err}");
        }
    }

    /// Persist and hand the new settings back to the manager.
    fn commit(&self, action: &str, context: &str, settings: &TileSettings) {
        self.persist(context, settings);
        self.manager.set_action(action, context, settings.clone());
    }

    fn notify(&self, action: &str, context: &str, payload: &Value) {
        if let Err(err) = self.device.notify_inspector(action, context, payload) {
            log::warn!("inspector {context}: {err}");
        }
    }

    fn notify_status(&self, action: &str, context: &str, error: bool, message: &str) {
        self.notify(action, context, &json!({ "error": error, "message": message }));
    }
}

/// Locate the tile's reading by id, falling back to its remembered label.
/// The flag is set when the label match repaired a stale id.
fn find_reading<'a>(readings: &'a [Reading], settings: &TileSettings) -> Option<(&'a Reading, bool)> {
    if let Some(reading) = readings.iter().find(|r| r.id == settings.reading_id) {
        return Some((reading, false));
    }
    if settings.reading_label.is_empty() {
        return None;
    }
    readings
        .iter()
        .find(|r| r.label == settings.reading_label)
        .map(|r| (r, true))
}

fn decode_payload(raw: Option<&Value>) -> Result<(TileSettings, bool)> {
    let bytes = raw.map(serde_json::to_vec).transpose()?;
    decode_settings(bytes.as_deref())
}
