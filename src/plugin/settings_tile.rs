//! The refresh-rate tile: shows and changes the global poll interval.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::{lock, Plugin, TitlePayload, DEFAULT_TITLE_COLOR, TITLE_LABEL, TITLE_Y, VALUE_LABEL, VALUE_Y};
use crate::render::graph::DEFAULT_FONT_SIZE;
use crate::render::{new_canvas, png, Canvas, Face, Graph, Rgba, TILE_HEIGHT, TILE_WIDTH};
use crate::tile::{SettingsTileAppearance, SETTINGS_ACTION};
use crate::{Error, Result};

const TITLE_FONT_SIZE: f32 = 9.0;
const DEFAULT_TITLE: &str = "Refresh Rate";
const COMMANDS: [&str; 3] = ["settingsConnected", "setPollInterval", "updateTileAppearance"];
const APPEARANCE_KEYS: [&str; 4] = ["showLabel", "title", "titleColor", "showTitleInGraph"];

pub(super) fn is_settings_command(payload: &Map<String, Value>) -> bool {
    COMMANDS.iter().any(|key| payload.contains_key(*key))
}

fn draw_centered(canvas: &mut Canvas, face: &Face, text: &str, baseline: f32, color: Rgba) {
    let width = face.text_width(text).round() as i64;
    let x = ((canvas.width() as i64 - width) / 2).max(0);
    face.draw(canvas, x as f32, baseline, text, color);
}

impl Plugin {
    pub(super) fn is_settings_action(&self, action: &str, context: &str) -> bool {
        action == SETTINGS_ACTION || lock(&self.settings_tiles).contains_key(context)
    }

    /// Inspector messages may arrive under another context; with a single
    /// refresh-rate tile on the deck they belong to it.
    pub(super) fn resolve_settings_context(&self, context: &str) -> String {
        let tiles = lock(&self.settings_tiles);
        if tiles.contains_key(context) || tiles.len() != 1 {
            return context.to_string();
        }
        tiles.keys().next().cloned().unwrap_or_else(|| context.to_string())
    }

    /// Decode a possibly partial appearance payload. Keys the payload leaves
    /// out are taken from the tile's previous state. The flag reports
    /// whether every appearance key was present.
    fn merge_appearance(&self, context: &str, raw: &Value) -> Result<(SettingsTileAppearance, bool)> {
        let mut appearance: SettingsTileAppearance = serde_json::from_value(raw.clone())?;
        let has = |key: &str| raw.get(key).is_some();
        if let Some(existing) = lock(&self.settings_tiles).get(context) {
            if !has("title") {
                appearance.title = existing.title.clone();
            }
            if !has("titleColor") {
                appearance.title_color = existing.title_color.clone();
            }
            if !has("showTitleInGraph") {
                appearance.show_title_in_graph = existing.show_title_in_graph;
            }
        }
        if !has("showLabel") {
            appearance.show_label = true;
        }
        appearance.fill_defaults();
        let complete = APPEARANCE_KEYS.iter().all(|key| has(key));
        Ok((appearance, complete))
    }

    pub(super) fn settings_tile_appear(&self, context: &str, raw: Option<&Value>) {
        let empty = json!({});
        let merged = self
            .merge_appearance(context, raw.unwrap_or(&empty))
            .or_else(|err| {
                log::warn!("settings tile {context}: {err}");
                self.merge_appearance(context, &empty)
            });
        let appearance = merged
            .map(|(appearance, _)| appearance)
            .unwrap_or_else(|_| SettingsTileAppearance::initial());
        log::info!(
            "settings tile {context} appeared (background {}, label {})",
            appearance.tile_background,
            appearance.show_label
        );
        lock(&self.settings_tiles).insert(context.to_string(), appearance);
        self.update_settings_tile(context);
    }

    pub(super) fn settings_tile_received(&self, context: &str, raw: &Value) {
        let (appearance, complete) = match self.merge_appearance(context, raw) {
            Ok(merged) => merged,
            Err(err) => {
                log::warn!("settings tile {context}: {err}");
                return;
            }
        };
        lock(&self.settings_tiles).insert(context.to_string(), appearance.clone());
        if !complete {
            self.persist_appearance(context, &appearance);
        }
        self.update_settings_tile(context);
        self.send_settings_status(context);
    }

    pub(super) fn settings_tile_title(&self, context: &str, payload: &TitlePayload) {
        let target = self.resolve_settings_context(context);
        let appearance = {
            let mut tiles = lock(&self.settings_tiles);
            let entry = tiles
                .entry(target.clone())
                .or_insert_with(SettingsTileAppearance::initial);
            entry.title = payload.title.clone();
            if !payload.title_parameters.title_color.is_empty() {
                entry.title_color = payload.title_parameters.title_color.clone();
            }
            entry.fill_defaults();
            entry.show_title_in_graph = Some(!payload.title_parameters.show_title);
            entry.clone()
        };
        self.persist_appearance(&target, &appearance);
        self.update_settings_tile(&target);
    }

    /// Returns false when the payload carries none of the tile's commands.
    pub(super) fn handle_settings_command(&self, target: &str, payload: &Map<String, Value>) -> bool {
        if payload.contains_key("settingsConnected") {
            self.send_settings_status(target);
            return true;
        }
        if let Some(raw) = payload.get("setPollInterval") {
            match raw.as_i64() {
                Some(ms) if ms > 0 => self.set_poll_interval(ms),
                _ => log::warn!("setPollInterval: ignoring {raw}"),
            }
            return true;
        }
        if let Some(raw) = payload.get("updateTileAppearance") {
            match serde_json::from_value::<SettingsTileAppearance>(raw.clone()) {
                Ok(appearance) => self.update_tile_appearance(target, appearance),
                Err(err) => log::warn!("updateTileAppearance: {err}"),
            }
            return true;
        }
        false
    }

    fn update_tile_appearance(&self, target: &str, mut appearance: SettingsTileAppearance) {
        if let Some(existing) = lock(&self.settings_tiles).get(target) {
            if appearance.title.is_empty() {
                appearance.title = existing.title.clone();
            }
            if appearance.title_color.is_empty() {
                appearance.title_color = existing.title_color.clone();
            }
            if appearance.show_title_in_graph.is_none() {
                appearance.show_title_in_graph = existing.show_title_in_graph;
            }
        }
        appearance.fill_defaults();
        lock(&self.settings_tiles).insert(target.to_string(), appearance.clone());
        self.persist_appearance(target, &appearance);
        self.update_settings_tile(target);
        self.send_settings_status(target);
    }

    fn persist_appearance(&self, context: &str, appearance: &SettingsTileAppearance) {
        if let Err(err) = self.device.persist_settings(context, &appearance.to_json()) {
            log::warn!("persist settings tile {context}: {err}");
        }
    }

    fn current_rate_ms(&self) -> i64 {
        match self.global_settings().poll_interval {
            ms if ms > 0 => ms,
            _ => self.manager.interval().as_millis() as i64,
        }
    }

    pub(super) fn send_settings_status(&self, context: &str) {
        let status = if self.cache.poll_time().is_ok() {
            "Connected"
        } else {
            "Disconnected"
        };
        let payload = json!({
            "connectionStatus": status,
            "currentRate": self.current_rate_ms(),
        });
        self.notify(SETTINGS_ACTION, context, &payload);
    }

    pub(super) fn update_all_settings_tiles(&self) {
        let contexts: Vec<String> = lock(&self.settings_tiles).keys().cloned().collect();
        for context in contexts {
            self.update_settings_tile(&context);
        }
    }

    pub(super) fn update_settings_tile(&self, context: &str) {
        let rate = self.current_rate_ms();
        let appearance = lock(&self.settings_tiles)
            .get(context)
            .cloned()
            .unwrap_or_else(SettingsTileAppearance::initial);
        let colors = &self.resources.colors;
        let style = TileStyle {
            background: colors.get_or(&appearance.tile_background, Rgba::BLACK),
            text: colors.get_or(&appearance.tile_text_color, Rgba::WHITE),
            title_color: colors.get_or(&appearance.title_color, DEFAULT_TITLE_COLOR),
            draw_title: appearance.show_title_in_graph.unwrap_or(true),
            title: match appearance.title.trim() {
                "" => DEFAULT_TITLE.to_string(),
                title => title.to_string(),
            },
            rate: format!("{rate}ms"),
        };
        log::debug!("settings tile {context}: {}", style.rate);

        // The value and title live in the image; the host title stays blank.
        if let Err(err) = self.device.push_title(context, "") {
            log::warn!("settings tile {context}: {err}");
        }

        if appearance.show_label {
            match self.render_over_placeholder(&style) {
                Ok(png) => {
                    self.push_settings_image(context, &png);
                    return;
                }
                Err(err) => log::debug!("settings tile {context}: {err}, using solid background"),
            }
        }
        match self.render_solid(&style) {
            Ok(png) => self.push_settings_image(context, &png),
            Err(err) => log::warn!("settings tile {context}: {err}"),
        }
    }

    fn push_settings_image(&self, context: &str, png: &[u8]) {
        if let Err(err) = self.device.push_image(context, png) {
            log::warn!("settings tile {context}: {err}");
        }
    }

    fn render_over_placeholder(&self, style: &TileStyle) -> Result<Vec<u8>> {
        let bytes = self
            .placeholder
            .as_deref()
            .ok_or_else(|| Error::Render("no placeholder image".into()))?;
        let base = png::decode(bytes)?;
        let mut canvas = new_canvas(TILE_WIDTH, TILE_HEIGHT);
        image::imageops::replace(&mut canvas, &base, 0, 0);

        let fonts = &self.resources.fonts;
        if style.draw_title {
            let face = fonts.face(TITLE_FONT_SIZE)?;
            draw_centered(&mut canvas, &face, &style.title, TITLE_Y, style.title_color);
        }
        let face = fonts.face(DEFAULT_FONT_SIZE)?;
        draw_centered(&mut canvas, &face, &style.rate, VALUE_Y, style.text);
        self.resources.png.encode(&canvas)
    }

    fn render_solid(&self, style: &TileStyle) -> Result<Vec<u8>> {
        let bg = style.background;
        let mut graph = Graph::new(
            Arc::clone(&self.resources),
            TILE_WIDTH,
            TILE_HEIGHT,
            0,
            100,
            bg,
            bg,
            bg,
        );
        let title = if style.draw_title { style.title.as_str() } else { "" };
        graph.set_label(TITLE_LABEL, title, TITLE_Y, style.title_color)?;
        graph.set_label_font_size(TITLE_LABEL, TITLE_FONT_SIZE)?;
        graph.set_label(VALUE_LABEL, &style.rate, VALUE_Y, style.text)?;
        graph.update(0.0);
        graph.encode_png()
    }
}

struct TileStyle {
    background: Rgba,
    text: Rgba,
    title_color: Rgba,
    draw_title: bool,
    title: String,
    rate: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::tests::{cpu_tree, rig, Rig};
    use super::super::{DeviceCall, InboundEvent, SettingsPayload};
    use crate::render::png;
    use crate::tile::{READING_ACTION, SETTINGS_ACTION};

    fn appear(rig: &Rig, settings: serde_json::Value) {
        rig.plugin
            .handle_event(InboundEvent::WillAppear {
                action: SETTINGS_ACTION.into(),
                context: "s1".into(),
                payload: SettingsPayload {
                    settings: Some(settings),
                },
            })
            .unwrap();
    }

    #[test]
    fn appear_blanks_host_title_and_renders_solid_fallback() {
        let rig = rig(cpu_tree("40 %"));
        appear(&rig, json!({"tileBackground": "#102030"}));
        let calls = rig.device.calls();
        assert!(calls.contains(&DeviceCall::Title {
            context: "s1".into(),
            title: String::new(),
        }));
        let images = rig.device.images("s1");
        assert_eq!(images.len(), 1);
        let canvas = png::decode(&images[0]).unwrap();
        assert_eq!(
            crate::render::Rgba::from(*canvas.get_pixel(0, 71)),
            crate::render::Rgba::rgb(0x10, 0x20, 0x30)
        );
    }

    #[test]
    fn partial_settings_are_repaired_from_previous_state() {
        let rig = rig(cpu_tree("40 %"));
        appear(&rig, json!({"title": "Rate", "titleColor": "#abcdef", "showTitleInGraph": false}));
        rig.plugin
            .handle_event(InboundEvent::DidReceiveSettings {
                action: SETTINGS_ACTION.into(),
                context: "s1".into(),
                payload: SettingsPayload {
                    settings: Some(json!({"tileBackground": "#ff0000"})),
                },
            })
            .unwrap();
        let saved = rig.device.last_settings("s1").unwrap();
        assert_eq!(saved["title"], "Rate");
        assert_eq!(saved["titleColor"], "#abcdef");
        assert_eq!(saved["showTitleInGraph"], false);
        assert_eq!(saved["showLabel"], true);
        assert_eq!(saved["tileBackground"], "#ff0000");
        let status = rig.device.inspector("s1").pop().unwrap();
        assert_eq!(status["connectionStatus"], "Connected");
    }

    #[test]
    fn commands_from_any_context_reach_the_single_tile() {
        let rig = rig(cpu_tree("40 %"));
        appear(&rig, json!({}));
        rig.plugin
            .handle_event(InboundEvent::SendToPlugin {
                action: READING_ACTION.into(),
                context: "other".into(),
                payload: json!({"setPollInterval": 500}),
            })
            .unwrap();
        assert_eq!(rig.plugin.global_settings().poll_interval, 500);
        assert_eq!(rig.device.images("s1").len(), 2);

        rig.plugin
            .handle_event(InboundEvent::SendToPlugin {
                action: SETTINGS_ACTION.into(),
                context: "s1".into(),
                payload: json!({"settingsConnected": true}),
            })
            .unwrap();
        let status = rig.device.inspector("s1").pop().unwrap();
        assert_eq!(status["currentRate"], 500);
    }

    #[test]
    fn update_tile_appearance_keeps_previous_title() {
        let rig = rig(cpu_tree("40 %"));
        appear(&rig, json!({"title": "Poll"}));
        rig.plugin
            .handle_event(InboundEvent::SendToPlugin {
                action: SETTINGS_ACTION.into(),
                context: "s1".into(),
                payload: json!({"updateTileAppearance": {"tileBackground": "#000080", "showLabel": false}}),
            })
            .unwrap();
        let saved = rig.device.last_settings("s1").unwrap();
        assert_eq!(saved["title"], "Poll");
        assert_eq!(saved["showLabel"], false);
        assert_eq!(saved["tileTextColor"], "#ffffff");
    }
}
