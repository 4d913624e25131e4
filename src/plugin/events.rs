use std::io::BufRead;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Settings blob attached to tile lifecycle events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPayload {
    #[serde(default)]
    pub settings: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TitleParameters {
    pub title_color: String,
    /// The host draws the title itself; the tile then leaves it out.
    pub show_title: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TitlePayload {
    pub title: String,
    pub title_parameters: TitleParameters,
    pub settings: Option<Value>,
}

/// Inbound message from the display host, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum InboundEvent {
    WillAppear {
        action: String,
        context: String,
        #[serde(default)]
        payload: SettingsPayload,
    },
    WillDisappear {
        action: String,
        context: String,
        #[serde(default)]
        payload: SettingsPayload,
    },
    DidReceiveSettings {
        action: String,
        context: String,
        #[serde(default)]
        payload: SettingsPayload,
    },
    DidReceiveGlobalSettings {
        #[serde(default)]
        payload: SettingsPayload,
    },
    TitleParametersDidChange {
        action: String,
        context: String,
        #[serde(default)]
        payload: TitlePayload,
    },
    PropertyInspectorDidAppear {
        action: String,
        context: String,
    },
    SendToPlugin {
        action: String,
        context: String,
        #[serde(default)]
        payload: Value,
    },
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::WillAppear { .. } => "willAppear",
            InboundEvent::WillDisappear { .. } => "willDisappear",
            InboundEvent::DidReceiveSettings { .. } => "didReceiveSettings",
            InboundEvent::DidReceiveGlobalSettings { .. } => "didReceiveGlobalSettings",
            InboundEvent::TitleParametersDidChange { .. } => "titleParametersDidChange",
            InboundEvent::PropertyInspectorDidAppear { .. } => "propertyInspectorDidAppear",
            InboundEvent::SendToPlugin { .. } => "sendToPlugin",
        }
    }
}

/// One inspector field change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SdpiCollection {
    pub group: bool,
    pub index: i64,
    pub key: String,
    pub selection: Vec<String>,
    pub value: String,
    pub checked: bool,
    pub threshold_id: String,
}

/// Parse a JSON-lines event stream. Blank lines and `#` comments are skipped;
/// a malformed line yields an error item and parsing continues.
pub fn read_events<R: BufRead>(reader: R) -> impl Iterator<Item = Result<InboundEvent>> {
    reader.lines().filter_map(|line| {
        let line = match line {
            Ok(line) => line,
            Err(err) => return Some(Err(err.into())),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        Some(serde_json::from_str(trimmed).map_err(Into::into))
    })
}
