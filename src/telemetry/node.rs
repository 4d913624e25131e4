use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{
    make_reading_id, sensor_id_from_reading, Reading, ReadingType, Sensor, UNKNOWN_SENSOR_NAME,
};

/// One node of the `data.json` tree served by Libre Hardware Monitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Node {
    #[serde(rename = "Text")]
    pub text: String,
    #[serde(rename = "Min")]
    pub min: String,
    #[serde(rename = "Value")]
    pub value: String,
    #[serde(rename = "Max")]
    pub max: String,
    #[serde(rename = "SensorId")]
    pub sensor_id: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "ImageURL")]
    pub image_url: String,
    #[serde(rename = "Children")]
    pub children: Vec<Node>,
}

impl Node {
    /// A node counts as a device when at least one child has children of its own.
    fn is_device(&self) -> bool {
        self.children.iter().any(|child| !child.children.is_empty())
    }
}

/// Flattened view of a node tree: sensors in discovery order plus their readings.
#[derive(Debug, Default)]
pub struct Flattened {
    pub sensors: Vec<Sensor>,
    pub readings: HashMap<String, Vec<Reading>>,
}

/// Walk the tree depth-first. Nodes carrying a sensor id are leaves; their
/// ancestor chain decides which sensor they belong to.
pub fn build_snapshot(root: &Node) -> Flattened {
    let mut out = Flattened::default();
    let mut ancestors: Vec<&Node> = Vec::new();
    walk(root, &mut ancestors, &mut out);
    out
}

fn walk<'a>(node: &'a Node, ancestors: &mut Vec<&'a Node>, out: &mut Flattened) {
    if !node.sensor_id.is_empty() {
        let mut sid = sensor_id_from_reading(&node.sensor_id);
        if sid.is_empty() {
            sid = node.sensor_id.clone();
        }
        if !out.readings.contains_key(&sid) {
            out.sensors.push(Sensor {
                id: sid.clone(),
                name: determine_sensor_name(ancestors),
            });
        }
        let reading = new_reading(&sid, node);
        out.readings.entry(sid).or_default().push(reading);
        return;
    }
    ancestors.push(node);
    for child in &node.children {
        walk(child, ancestors, out);
    }
    ancestors.pop();
}

fn determine_sensor_name(ancestors: &[&Node]) -> String {
    ancestors
        .iter()
        .rev()
        .find(|n| n.is_device() && !n.text.is_empty())
        .or_else(|| ancestors.iter().rev().find(|n| !n.text.is_empty()))
        .map(|n| n.text.clone())
        .unwrap_or_else(|| UNKNOWN_SENSOR_NAME.to_string())
}

fn new_reading(sensor_id: &str, node: &Node) -> Reading {
    let (value, unit) = parse_value(&node.value);
    let (min, _) = parse_value(&node.min);
    let (max, _) = parse_value(&node.max);
    Reading {
        id: make_reading_id(sensor_id, &node.sensor_id),
        label: node.text.clone(),
        unit,
        kind: node.kind.clone(),
        reading_type: map_reading_type(&node.kind),
        value,
        min,
        max,
        average: value,
    }
}

/// Split `"45,5 °C"` into `(45.5, "°C")`. Empty or `-` yields `(0, "")`; an
/// unparsable number keeps the unit but reports zero.
pub fn parse_value(raw: &str) -> (f64, String) {
    let raw = raw.trim();
    if raw.is_empty() || raw == "-" {
        return (0.0, String::new());
    }
    let Some(first) = raw.split_whitespace().next() else {
        return (0.0, String::new());
    };
    let unit = raw[first.len()..].trim().to_string();
    match first.replace(',', ".").parse::<f64>() {
        Ok(value) => (value, unit),
        Err(_) => (0.0, unit),
    }
}

pub fn map_reading_type(kind: &str) -> ReadingType {
    match kind.to_ascii_lowercase().as_str() {
        "temperature" => ReadingType::Temp,
        "voltage" => ReadingType::Volt,
        "fan" => ReadingType::Fan,
        "power" => ReadingType::Power,
        "clock" => ReadingType::Clock,
        "current" => ReadingType::Current,
        "load" | "control" | "level" => ReadingType::Usage,
        _ => ReadingType::Other,
    }
}
