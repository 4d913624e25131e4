//! Inspector field changes for reading tiles.

use serde_json::json;

use super::{lock, Plugin, TITLE_LABEL, VALUE_LABEL};
use crate::tile::format::default_min_max;
use crate::tile::{new_threshold_id, Operator, Threshold, ThresholdState, TileSettings};
use crate::{Error, Result};

fn or_default(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn parse_i32(key: &str, raw: &str) -> Result<i32> {
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidArgs(format!("{key}: {raw:?} is not an integer")))
}

impl Plugin {
    pub(super) fn handle_sdpi(
        &self,
        action: &str,
        context: &str,
        sdpi: &super::SdpiCollection,
    ) -> Result<()> {
        let key = sdpi.key.as_str();
        match key {
            "sensorSelect" => self.select_sensor(action, context, &sdpi.value),
            "readingSelect" => self.select_reading(action, context, &sdpi.value),
            "min" | "max" => self.set_range(action, context, key, &sdpi.value),
            "format" | "divisor" | "graphUnit" => {
                let mut settings = self.manager.get_settings(context)?;
                let value = sdpi.value.clone();
                match key {
                    "format" => settings.format = value,
                    "divisor" => settings.divisor = value,
                    _ => settings.graph_unit = value,
                }
                self.commit(action, context, &settings);
                Ok(())
            }
            "foreground" | "background" | "highlight" | "valuetext" => {
                self.set_color(action, context, key, &sdpi.value)
            }
            "titleFontSize" | "valueFontSize" => {
                self.set_font_size(action, context, key, &sdpi.value)
            }
            "addThreshold" => self.add_threshold(action, context, &sdpi.value),
            "removeThreshold" => self.remove_threshold(action, context, &sdpi.threshold_id),
            "reorderThreshold" => {
                self.reorder_threshold(action, context, &sdpi.threshold_id, &sdpi.value)
            }
            "thresholdEnabled" | "thresholdName" | "thresholdOperator" | "thresholdValue"
            | "thresholdText" | "thresholdTextColor" | "thresholdBackgroundColor"
            | "thresholdForegroundColor" | "thresholdHighlightColor"
            | "thresholdValueTextColor" => self.update_threshold(action, context, sdpi),
            other => {
                log::debug!("ignoring inspector key {other:?}");
                Ok(())
            }
        }
    }

    fn select_sensor(&self, action: &str, context: &str, sensor: &str) -> Result<()> {
        let mut settings = self.manager.get_settings(context)?;
        // The inspector re-sends the current sensor whenever the tile is selected.
        if settings.sensor_uid != sensor {
            settings.sensor_uid = sensor.to_string();
            settings.reading_id = 0;
            settings.reading_label.clear();
            settings.is_valid = false;
        }
        self.send_readings(action, context, sensor, &settings)?;
        self.commit(action, context, &settings);
        Ok(())
    }

    fn select_reading(&self, action: &str, context: &str, raw: &str) -> Result<()> {
        let id = parse_i32("readingSelect", raw)?;
        let mut settings = self.manager.get_settings(context)?;
        if settings.reading_id == id {
            return Ok(());
        }
        let reading = self
            .cache
            .readings_for_sensor(&settings.sensor_uid)?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(Error::UnknownReading(id))?;
        let graph = self
            .graph(context)
            .ok_or_else(|| Error::UnknownTile(context.to_string()))?;

        let (min, max) = default_min_max(&reading);
        settings.reading_id = id;
        settings.reading_label = reading.label;
        settings.min = min;
        settings.max = max;
        settings.is_valid = true;
        {
            let mut graph = lock(&graph);
            graph.set_min(min);
            graph.set_max(max);
        }
        self.commit(action, context, &settings);
        Ok(())
    }

    fn set_range(&self, action: &str, context: &str, key: &str, raw: &str) -> Result<()> {
        let value = parse_i32(key, raw)?;
        let graph = self
            .graph(context)
            .ok_or_else(|| Error::UnknownTile(context.to_string()))?;
        let mut settings = self.manager.get_settings(context)?;
        if key == "min" {
            lock(&graph).set_min(value);
            settings.min = value;
        } else {
            lock(&graph).set_max(value);
            settings.max = value;
        }
        self.commit(action, context, &settings);
        Ok(())
    }

    fn set_color(&self, action: &str, context: &str, key: &str, hex: &str) -> Result<()> {
        let mut settings = self.manager.get_settings(context)?;
        let graph = self
            .graph(context)
            .ok_or_else(|| Error::UnknownTile(context.to_string()))?;
        let color = self.resources.colors.get(hex);
        {
            let mut graph = lock(&graph);
            match key {
                "foreground" => {
                    settings.foreground_color = hex.to_string();
                    graph.set_foreground(color);
                }
                "background" => {
                    settings.background_color = hex.to_string();
                    graph.set_background(color);
                }
                "highlight" => {
                    settings.highlight_color = hex.to_string();
                    graph.set_highlight(color);
                }
                _ => {
                    settings.value_text_color = hex.to_string();
                    graph.set_label_color(VALUE_LABEL, color)?;
                }
            }
        }
        self.commit(action, context, &settings);
        Ok(())
    }

    fn set_font_size(&self, action: &str, context: &str, key: &str, raw: &str) -> Result<()> {
        let size: f64 = raw
            .trim()
            .parse()
            .map_err(|_| Error::InvalidArgs(format!("{key}: {raw:?} is not a number")))?;
        let mut settings = self.manager.get_settings(context)?;
        let graph = self
            .graph(context)
            .ok_or_else(|| Error::UnknownTile(context.to_string()))?;
        if key == "titleFontSize" {
            settings.title_font_size = size;
            lock(&graph).set_label_font_size(TITLE_LABEL, size as f32)?;
        } else {
            settings.value_font_size = size;
            lock(&graph).set_label_font_size(VALUE_LABEL, size as f32)?;
        }
        self.commit(action, context, &settings);
        Ok(())
    }

    fn send_thresholds(&self, action: &str, context: &str, settings: &TileSettings) {
        let payload = json!({
            "thresholds": settings.thresholds,
            "settings": settings.to_json(),
        });
        self.notify(action, context, &payload);
    }

    fn add_threshold(&self, action: &str, context: &str, name: &str) -> Result<()> {
        let mut settings = self.manager.get_settings(context)?;
        let value_text = or_default(&settings.value_text_color, "#ffffff");
        let threshold = Threshold {
            id: new_threshold_id(),
            name: or_default(name, "New"),
            text: String::new(),
            text_color: value_text.clone(),
            enabled: true,
            operator: Operator::Ge.as_str().to_string(),
            value: 0.0,
            background_color: or_default(&settings.background_color, "#000000"),
            foreground_color: or_default(&settings.foreground_color, "#005128"),
            highlight_color: or_default(&settings.highlight_color, "#009e00"),
            value_text_color: value_text,
        };
        log::info!("tile {context}: added threshold {}", threshold.id);
        settings.thresholds.push(threshold);
        self.commit(action, context, &settings);
        self.send_thresholds(action, context, &settings);
        Ok(())
    }

    fn remove_threshold(&self, action: &str, context: &str, id: &str) -> Result<()> {
        let mut settings = self.manager.get_settings(context)?;
        let pos = settings
            .thresholds
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::UnknownThreshold(id.to_string()))?;
        settings.thresholds.remove(pos);

        if settings.current_threshold.id() == Some(id) {
            settings.current_threshold = ThresholdState::Unset;
            if let Some(graph) = self.graph(context) {
                self.apply_normal_colors(&mut lock(&graph), &settings);
            }
        }
        self.commit(action, context, &settings);
        self.send_thresholds(action, context, &settings);
        Ok(())
    }

    fn reorder_threshold(&self, action: &str, context: &str, id: &str, direction: &str) -> Result<()> {
        let mut settings = self.manager.get_settings(context)?;
        if settings.thresholds.len() < 2 {
            return Ok(());
        }
        if direction != "up" && direction != "down" {
            return Err(Error::InvalidDirection(direction.to_string()));
        }
        let pos = settings
            .thresholds
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::UnknownThreshold(id.to_string()))?;
        let last = settings.thresholds.len() - 1;
        match direction {
            "up" if pos > 0 => settings.thresholds.swap(pos - 1, pos),
            "down" if pos < last => settings.thresholds.swap(pos, pos + 1),
            _ => return Ok(()),
        }

        settings.current_threshold = ThresholdState::ForceReevaluate;
        self.commit(action, context, &settings);
        self.send_thresholds(action, context, &settings);
        Ok(())
    }

    fn update_threshold(
        &self,
        action: &str,
        context: &str,
        sdpi: &super::SdpiCollection,
    ) -> Result<()> {
        let mut settings = self.manager.get_settings(context)?;
        let is_active = settings.current_threshold.id() == Some(sdpi.threshold_id.as_str());
        let threshold = settings
            .threshold_mut(&sdpi.threshold_id)
            .ok_or_else(|| Error::UnknownThreshold(sdpi.threshold_id.clone()))?;

        let value = sdpi.value.clone();
        let mut reevaluate = false;
        let mut recolor = false;
        match sdpi.key.as_str() {
            "thresholdEnabled" => {
                threshold.enabled = sdpi.checked;
                reevaluate = true;
            }
            "thresholdName" => threshold.name = value,
            "thresholdOperator" => {
                let op: Operator = value.parse()?;
                threshold.operator = op.as_str().to_string();
                reevaluate = true;
            }
            "thresholdValue" => {
                // A cleared field counts as zero.
                threshold.value = value.trim().parse().unwrap_or(0.0);
                reevaluate = true;
            }
            "thresholdText" => threshold.text = value,
            "thresholdTextColor" => {
                threshold.text_color = value;
                recolor = is_active;
            }
            "thresholdBackgroundColor" => {
                threshold.background_color = value;
                recolor = is_active;
            }
            "thresholdForegroundColor" => {
                threshold.foreground_color = value;
                recolor = is_active;
            }
            "thresholdHighlightColor" => {
                threshold.highlight_color = value;
                recolor = is_active;
            }
            "thresholdValueTextColor" => {
                threshold.value_text_color = value;
                recolor = is_active;
            }
            other => return Err(Error::InvalidArgs(format!("unknown threshold field {other}"))),
        }

        if recolor {
            let threshold = threshold.clone();
            if let Some(graph) = self.graph(context) {
                self.apply_threshold_colors(&mut lock(&graph), &threshold);
            }
        }
        if reevaluate {
            settings.current_threshold = ThresholdState::ForceReevaluate;
        }
        self.commit(action, context, &settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::super::tests::{appear, cpu_tree, load_reading, rig, Rig};
    use super::super::{InboundEvent, SdpiCollection};
    use crate::render::Rgba;
    use crate::tile::{ThresholdState, READING_ACTION};
    use crate::Error;

    fn send(rig: &Rig, sdpi: Value) -> crate::Result<()> {
        rig.plugin.handle_event(InboundEvent::SendToPlugin {
            action: READING_ACTION.into(),
            context: "t1".into(),
            payload: json!({ "sdpi_collection": sdpi }),
        })
    }

    fn ready() -> Rig {
        let rig = rig(cpu_tree("40 %"));
        appear(&rig, "t1", json!({}));
        rig
    }

    fn threshold_ids(rig: &Rig) -> Vec<String> {
        rig.plugin
            .manager()
            .get_settings("t1")
            .unwrap()
            .thresholds
            .into_iter()
            .map(|t| t.id)
            .collect()
    }

    #[test]
    fn sensor_then_reading_select_marks_tile_valid() {
        let rig = ready();
        send(&rig, json!({"key": "sensorSelect", "value": "/amdcpu/0"})).unwrap();
        let settings = rig.plugin.manager().get_settings("t1").unwrap();
        assert_eq!(settings.sensor_uid, "/amdcpu/0");
        assert!(!settings.is_valid);
        assert_eq!(rig.device.inspector("t1")[0]["readings"].as_array().unwrap().len(), 2);

        let reading = load_reading(&rig);
        send(&rig, json!({"key": "readingSelect", "value": reading.id.to_string()})).unwrap();
        let settings = rig.plugin.manager().get_settings("t1").unwrap();
        assert!(settings.is_valid);
        assert_eq!(settings.reading_label, "CPU Total");
        assert_eq!((settings.min, settings.max), (0, 100));
        let graph = rig.plugin.graph("t1").unwrap();
        assert_eq!(graph.lock().unwrap().range(), (0, 100));
    }

    #[test]
    fn unknown_reading_is_reported_to_inspector() {
        let rig = ready();
        send(&rig, json!({"key": "sensorSelect", "value": "/amdcpu/0"})).unwrap();
        let err = send(&rig, json!({"key": "readingSelect", "value": "12345"})).unwrap_err();
        assert_eq!(err, Error::UnknownReading(12345));
        let last = rig.device.inspector("t1").pop().unwrap();
        assert_eq!(last["error"], true);
    }

    #[test]
    fn range_and_color_updates() {
        let rig = ready();
        send(&rig, json!({"key": "min", "value": "10"})).unwrap();
        send(&rig, json!({"key": "max", "value": "90"})).unwrap();
        assert!(matches!(
            send(&rig, json!({"key": "max", "value": "high"})),
            Err(Error::InvalidArgs(_))
        ));
        send(&rig, json!({"key": "background", "value": "#112233"})).unwrap();
        send(&rig, json!({"key": "valueFontSize", "value": "12"})).unwrap();

        let settings = rig.plugin.manager().get_settings("t1").unwrap();
        assert_eq!((settings.min, settings.max), (10, 90));
        assert_eq!(settings.background_color, "#112233");
        assert_eq!(settings.value_font_size, 12.0);
        let graph = rig.plugin.graph("t1").unwrap();
        let graph = graph.lock().unwrap();
        assert_eq!(graph.colors().1, Rgba::rgb(0x11, 0x22, 0x33));
        assert_eq!(graph.label(super::VALUE_LABEL).unwrap().font_size, 12.0);
    }

    #[test]
    fn add_reorder_and_remove_thresholds() {
        let rig = ready();
        send(&rig, json!({"key": "addThreshold", "value": ""})).unwrap();
        send(&rig, json!({"key": "addThreshold", "value": "Hot"})).unwrap();
        let ids = threshold_ids(&rig);
        assert_eq!(ids.len(), 2);
        let settings = rig.plugin.manager().get_settings("t1").unwrap();
        assert_eq!(settings.thresholds[0].name, "New");
        assert_eq!(settings.thresholds[0].operator, ">=");
        assert_eq!(settings.thresholds[0].foreground_color, "#005128");
        assert!(rig.device.inspector("t1").last().unwrap()["thresholds"].is_array());

        send(&rig, json!({"key": "reorderThreshold", "value": "up", "thresholdId": ids[0]})).unwrap();
        assert_eq!(threshold_ids(&rig), ids);
        send(&rig, json!({"key": "reorderThreshold", "value": "down", "thresholdId": ids[0]})).unwrap();
        assert_eq!(threshold_ids(&rig), vec![ids[1].clone(), ids[0].clone()]);
        assert!(rig
            .plugin
            .manager()
            .get_settings("t1")
            .unwrap()
            .current_threshold
            .is_forced());
        assert_eq!(
            send(&rig, json!({"key": "reorderThreshold", "value": "left", "thresholdId": ids[0]})),
            Err(Error::InvalidDirection("left".into()))
        );

        send(&rig, json!({"key": "removeThreshold", "thresholdId": ids[1]})).unwrap();
        assert_eq!(threshold_ids(&rig), vec![ids[0].clone()]);
        assert_eq!(
            send(&rig, json!({"key": "removeThreshold", "thresholdId": "nope"})),
            Err(Error::UnknownThreshold("nope".into()))
        );
    }

    #[test]
    fn threshold_field_updates() {
        let rig = ready();
        send(&rig, json!({"key": "addThreshold", "value": "Hot"})).unwrap();
        let id = threshold_ids(&rig).remove(0);

        let mut settings = rig.plugin.manager().get_settings("t1").unwrap();
        settings.current_threshold = ThresholdState::Active(id.clone());
        rig.plugin.manager().set_action(READING_ACTION, "t1", settings);

        send(&rig, json!({"key": "thresholdBackgroundColor", "value": "#ff0000", "thresholdId": id}))
            .unwrap();
        let graph = rig.plugin.graph("t1").unwrap();
        assert_eq!(graph.lock().unwrap().colors().1, Rgba::rgb(255, 0, 0));

        assert_eq!(
            send(&rig, json!({"key": "thresholdOperator", "value": "=>", "thresholdId": id})),
            Err(Error::InvalidOperator("=>".into()))
        );
        send(&rig, json!({"key": "thresholdValue", "value": "80.5", "thresholdId": id})).unwrap();
        let settings = rig.plugin.manager().get_settings("t1").unwrap();
        assert_eq!(settings.thresholds[0].value, 80.5);
        assert_eq!(settings.thresholds[0].operator, ">=");
        assert!(settings.current_threshold.is_forced());
    }

    #[test]
    fn sdpi_collection_defaults_decode() {
        let sdpi: SdpiCollection = serde_json::from_value(json!({"key": "min"})).unwrap();
        assert_eq!(sdpi.key, "min");
    }
}
