use serde::{Deserialize, Deserializer, Serialize};

pub const FORCE_REEVALUATE: &str = "_FORCE_REEVALUATE_";
pub const DEFAULT_POLL_INTERVAL_MS: i64 = 1_000;

/// Which threshold, if any, the tile is currently colored for.
///
/// Persisted as a plain string: empty for `Unset`, the threshold id for
/// `Active`, and a reserved marker for `ForceReevaluate`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ThresholdState {
    #[default]
    Unset,
    Active(String),
    ForceReevaluate,
}

impl ThresholdState {
    pub fn active(threshold: Option<&Threshold>) -> Self {
        match threshold {
            Some(t) => ThresholdState::Active(t.id.clone()),
            None => ThresholdState::Unset,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            ThresholdState::Active(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_forced(&self) -> bool {
        matches!(self, ThresholdState::ForceReevaluate)
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, ThresholdState::Unset)
    }
}

impl From<String> for ThresholdState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" => ThresholdState::Unset,
            FORCE_REEVALUATE => ThresholdState::ForceReevaluate,
            _ => ThresholdState::Active(value),
        }
    }
}

impl From<ThresholdState> for String {
    fn from(value: ThresholdState) -> Self {
        match value {
            ThresholdState::Unset => String::new(),
            ThresholdState::Active(id) => id,
            ThresholdState::ForceReevaluate => FORCE_REEVALUATE.to_string(),
        }
    }
}

/// One user-configured alert rule.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Threshold {
    pub id: String,
    pub name: String,
    /// Alert template; `{value}` and `{unit}` are substituted.
    pub text: String,
    pub text_color: String,
    pub enabled: bool,
    /// Kept as the raw string so an unset operator survives a round trip.
    pub operator: String,
    pub value: f64,
    pub background_color: String,
    pub foreground_color: String,
    pub highlight_color: String,
    pub value_text_color: String,
}

/// Persisted per-tile configuration of a reading tile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TileSettings {
    pub sensor_uid: String,
    #[serde(with = "string_int")]
    pub reading_id: i32,
    pub reading_label: String,
    pub title: String,
    pub title_font_size: f64,
    pub value_font_size: f64,
    pub show_title_in_graph: Option<bool>,
    pub min: i32,
    pub max: i32,
    pub format: String,
    pub divisor: String,
    /// Target data-size unit (`B`, `KB`, `MB`, `GB`, `TB`) for throughput readings.
    pub graph_unit: String,
    pub is_valid: bool,
    pub title_color: String,
    pub foreground_color: String,
    pub background_color: String,
    pub highlight_color: String,
    pub value_text_color: String,
    pub in_error_state: bool,

    #[serde(deserialize_with = "null_as_default")]
    pub thresholds: Vec<Threshold>,
    #[serde(rename = "currentThresholdId")]
    pub current_threshold: ThresholdState,

    // Legacy single warning/critical pair, read only for migration.
    #[serde(skip_serializing_if = "is_false")]
    pub warning_enabled: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub warning_operator: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub warning_value: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub warning_background_color: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub warning_foreground_color: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub warning_highlight_color: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub warning_value_text_color: String,
    #[serde(skip_serializing_if = "is_false")]
    pub critical_enabled: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub critical_operator: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub critical_value: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub critical_background_color: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub critical_foreground_color: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub critical_highlight_color: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub critical_value_text_color: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub current_alert_state: String,
}

impl TileSettings {
    /// Titles are drawn inside the image unless explicitly turned off.
    pub fn draws_title(&self) -> bool {
        self.show_title_in_graph.unwrap_or(true)
    }

    pub fn threshold(&self, id: &str) -> Option<&Threshold> {
        self.thresholds.iter().find(|t| t.id == id)
    }

    pub fn threshold_mut(&mut self, id: &str) -> Option<&mut Threshold> {
        self.thresholds.iter_mut().find(|t| t.id == id)
    }

    pub fn has_legacy_thresholds(&self) -> bool {
        self.warning_enabled
            || self.warning_value != 0.0
            || !self.warning_operator.is_empty()
            || self.critical_enabled
            || self.critical_value != 0.0
            || !self.critical_operator.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Plugin-wide settings shared by every tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalSettings {
    pub poll_interval: i64,
}

/// Appearance of the refresh-rate tile.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsTileAppearance {
    pub tile_background: String,
    pub tile_text_color: String,
    /// Draw over the placeholder art instead of a solid background.
    pub show_label: bool,
    pub title: String,
    pub title_color: String,
    pub show_title_in_graph: Option<bool>,
}

impl SettingsTileAppearance {
    pub fn initial() -> Self {
        let mut appearance = Self {
            show_label: true,
            ..Default::default()
        };
        appearance.fill_defaults();
        appearance
    }

    /// Fill blank colors and an unset title toggle.
    pub fn fill_defaults(&mut self) {
        if self.tile_background.is_empty() {
            self.tile_background = "#000000".into();
        }
        if self.tile_text_color.is_empty() {
            self.tile_text_color = "#ffffff".into();
        }
        if self.title_color.is_empty() {
            self.title_color = "#b7b7b7".into();
        }
        if self.show_title_in_graph.is_none() {
            self.show_title_in_graph = Some(true);
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `readingId` is persisted as a quoted decimal string.
mod string_int {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i32),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) if s.trim().is_empty() => Ok(0),
            Raw::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("readingId {s:?} is not a 32-bit integer"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_id_is_a_quoted_integer() {
        let s = TileSettings {
            reading_id: 1_234_567,
            ..Default::default()
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["readingId"], "1234567");

        let back: TileSettings = serde_json::from_str(r#"{"readingId":"42"}"#).unwrap();
        assert_eq!(back.reading_id, 42);
        assert!(serde_json::from_str::<TileSettings>(r#"{"readingId":"/cpu/0/load/1"}"#).is_err());
    }

    #[test]
    fn legacy_fields_are_omitted_when_empty() {
        let json = serde_json::to_value(TileSettings::default()).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("warningEnabled"));
        assert!(!obj.contains_key("criticalValue"));
        assert!(!obj.contains_key("currentAlertState"));
        assert_eq!(obj["thresholds"], serde_json::json!([]));
        assert_eq!(obj["currentThresholdId"], "");
    }

    #[test]
    fn threshold_state_round_trips_through_string() {
        for state in [
            ThresholdState::Unset,
            ThresholdState::ForceReevaluate,
            ThresholdState::Active("threshold_17".into()),
        ] {
            let raw: String = state.clone().into();
            assert_eq!(ThresholdState::from(raw), state);
        }
        let s: TileSettings =
            serde_json::from_str(r#"{"currentThresholdId":"_FORCE_REEVALUATE_"}"#).unwrap();
        assert!(s.current_threshold.is_forced());
    }

    #[test]
    fn null_thresholds_decode_as_empty() {
        let s: TileSettings = serde_json::from_str(r#"{"thresholds":null}"#).unwrap();
        assert!(s.thresholds.is_empty());
    }

    #[test]
    fn settings_tile_defaults_fill_blanks_only() {
        let initial = SettingsTileAppearance::initial();
        assert_eq!(initial.tile_background, "#000000");
        assert!(initial.show_label);
        assert_eq!(initial.show_title_in_graph, Some(true));

        let mut custom: SettingsTileAppearance =
            serde_json::from_str(r##"{"tileBackground":"#112233","titleColor":""}"##).unwrap();
        assert!(!custom.show_label);
        custom.fill_defaults();
        assert_eq!(custom.tile_background, "#112233");
        assert_eq!(custom.title_color, "#b7b7b7");
    }

    #[test]
    fn title_drawn_by_default() {
        let mut s = TileSettings::default();
        assert!(s.draws_title());
        s.show_title_in_graph = Some(false);
        assert!(!s.draws_title());
    }
}
