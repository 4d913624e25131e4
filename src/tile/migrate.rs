//! Decoding persisted tile settings, upgrading older shapes on the way in.

use serde_json::{Map, Value};

use super::settings::{Threshold, ThresholdState, TileSettings};
use super::threshold::new_threshold_id;
use crate::telemetry::{make_reading_id, sensor_id_from_reading, Reading};
use crate::{Error, Result};

const DEFAULT_OPERATOR: &str = ">=";

/// Decode a persisted settings blob.
///
/// Returns the settings plus whether anything was rewritten (the caller then
/// persists the result so the next load takes the direct path). An absent or
/// `null` payload yields default settings.
pub fn decode_settings(raw: Option<&[u8]>) -> Result<(TileSettings, bool)> {
    let Some(raw) = raw else {
        return Ok((TileSettings::default(), false));
    };
    let trimmed = raw.trim_ascii();
    if trimmed.is_empty() || trimmed == b"null" {
        return Ok((TileSettings::default(), false));
    }

    if let Ok(mut settings) = serde_json::from_slice::<TileSettings>(trimmed) {
        let migrated = migrate_to_thresholds(&mut settings);
        return Ok((settings, migrated));
    }

    let mut map: Map<String, Value> = serde_json::from_slice(trimmed)?;
    migrate_legacy_reading(&mut map);
    let mut settings: TileSettings = serde_json::from_value(Value::Object(map))
        .map_err(|e| Error::Decode(format!("tile settings: {e}")))?;
    migrate_to_thresholds(&mut settings);
    log::debug!(
        "migrated legacy tile settings (sensor {}, reading {})",
        settings.sensor_uid,
        settings.reading_id
    );
    Ok((settings, true))
}

/// Rewrite a path-style `readingId` or a `sensor:path` composite `sensorUid`
/// into the hashed id scheme.
fn migrate_legacy_reading(map: &mut Map<String, Value>) -> bool {
    let legacy_reading = match map.get("readingId") {
        Some(Value::String(s)) if s.trim().parse::<i32>().is_err() => s.clone(),
        _ => String::new(),
    };
    let legacy_sensor = match map.get("sensorUid") {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    if legacy_reading.is_empty() && !legacy_sensor.contains(':') {
        return false;
    }
    let Some((sensor_id, reading_path)) = legacy_sensor_reading(&legacy_sensor, &legacy_reading)
    else {
        return false;
    };
    let id = make_reading_id(&sensor_id, &reading_path);
    map.insert("sensorUid".into(), Value::String(sensor_id));
    map.insert("readingId".into(), Value::String(id.to_string()));
    map.insert("isValid".into(), Value::Bool(true));
    true
}

fn legacy_sensor_reading(sensor_uid: &str, reading_id: &str) -> Option<(String, String)> {
    let mut path = reading_id.trim().to_string();
    if path.is_empty() {
        if let Some((_, tail)) = sensor_uid.rsplit_once(':') {
            path = tail.trim().to_string();
        }
    }
    if path.is_empty() {
        return None;
    }
    let sensor_id = sensor_id_from_reading(&path);
    if sensor_id.is_empty() {
        return None;
    }
    Some((sensor_id, path))
}

/// Convert the legacy warning/critical pair into threshold entries.
///
/// Does nothing once `thresholds` is non-empty. On conversion the legacy
/// alert state is mapped onto the matching threshold by name and every
/// legacy field is cleared.
pub fn migrate_to_thresholds(settings: &mut TileSettings) -> bool {
    if !settings.thresholds.is_empty() || !settings.has_legacy_thresholds() {
        return false;
    }

    if settings.warning_enabled || settings.warning_value != 0.0 || !settings.warning_operator.is_empty() {
        settings.thresholds.push(Threshold {
            id: new_threshold_id(),
            name: "Warning".into(),
            enabled: settings.warning_enabled,
            operator: or_default(&settings.warning_operator, DEFAULT_OPERATOR),
            value: settings.warning_value,
            background_color: or_default(&settings.warning_background_color, "#333300"),
            foreground_color: or_default(&settings.warning_foreground_color, "#999900"),
            highlight_color: or_default(&settings.warning_highlight_color, "#ffff00"),
            value_text_color: or_default(&settings.warning_value_text_color, "#ffff00"),
            ..Default::default()
        });
    }
    if settings.critical_enabled || settings.critical_value != 0.0 || !settings.critical_operator.is_empty() {
        settings.thresholds.push(Threshold {
            id: new_threshold_id(),
            name: "Critical".into(),
            enabled: settings.critical_enabled,
            operator: or_default(&settings.critical_operator, DEFAULT_OPERATOR),
            value: settings.critical_value,
            background_color: or_default(&settings.critical_background_color, "#660000"),
            foreground_color: or_default(&settings.critical_foreground_color, "#990000"),
            highlight_color: or_default(&settings.critical_highlight_color, "#ff3333"),
            value_text_color: or_default(&settings.critical_value_text_color, "#ff0000"),
            ..Default::default()
        });
    }

    let alert = settings.current_alert_state.as_str();
    if !alert.is_empty() && alert != "none" {
        if let Some(t) = settings
            .thresholds
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(alert))
        {
            settings.current_threshold = ThresholdState::Active(t.id.clone());
        }
    }
    clear_legacy(settings);
    true
}

fn clear_legacy(s: &mut TileSettings) {
    s.warning_enabled = false;
    s.warning_operator.clear();
    s.warning_value = 0.0;
    s.warning_background_color.clear();
    s.warning_foreground_color.clear();
    s.warning_highlight_color.clear();
    s.warning_value_text_color.clear();
    s.critical_enabled = false;
    s.critical_operator.clear();
    s.critical_value = 0.0;
    s.critical_background_color.clear();
    s.critical_foreground_color.clear();
    s.critical_highlight_color.clear();
    s.critical_value_text_color.clear();
    s.current_alert_state.clear();
}

fn or_default(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Repair the reading selection against the live readings of its sensor:
/// match by id first, then by label. Returns whether anything changed.
pub fn sync_settings_with_readings(settings: &mut TileSettings, readings: &[Reading]) -> bool {
    let mut changed = false;
    if settings.reading_id != 0 {
        if let Some(r) = readings.iter().find(|r| r.id == settings.reading_id) {
            if settings.reading_label.is_empty() {
                settings.reading_label = r.label.clone();
                changed = true;
            }
            if !settings.is_valid {
                settings.is_valid = true;
                changed = true;
            }
            return changed;
        }
    }
    if !settings.reading_label.is_empty() {
        if let Some(r) = readings.iter().find(|r| r.label == settings.reading_label) {
            if settings.reading_id != r.id {
                settings.reading_id = r.id;
                changed = true;
            }
            if !settings.is_valid {
                settings.is_valid = true;
                changed = true;
            }
        }
    }
    changed
}
