use lhmdeck::{
    app::replay_events,
    plugin::{DeviceControl, DirectoryDevice, InboundEvent, Plugin, RecordingDevice, SettingsPayload},
    render::{png, Resources, TILE_HEIGHT, TILE_WIDTH},
    telemetry::{FakeSource, Node, SnapshotCache},
    tile::{ActionManager, READING_ACTION},
    Error,
};
use serde_json::{json, Value};
use std::{fs, sync::Arc, thread, time::Duration};

fn leaf(text: &str, id: &str, kind: &str, value: &str) -> Node {
    Node {
        text: text.into(),
        sensor_id: id.into(),
        kind: kind.into(),
        value: value.into(),
        min: value.into(),
        max: value.into(),
        ..Node::default()
    }
}

fn gpu_tree(temp: &str) -> Node {
    Node {
        text: "Sensor".into(),
        children: vec![Node {
            text: "NVIDIA GeForce".into(),
            children: vec![
                leaf("GPU Core", "/gpu-nvidia/0/temperature/0", "Temperature", temp),
                leaf("GPU Fan", "/gpu-nvidia/0/fan/0", "Fan", "1200 RPM"),
            ],
            ..Node::default()
        }],
        ..Node::default()
    }
}

struct Pipeline {
    plugin: Plugin,
    source: Arc<FakeSource>,
    cache: Arc<SnapshotCache>,
}

fn pipeline(device: Arc<dyn DeviceControl>, first: Node) -> Pipeline {
    let source = Arc::new(FakeSource::repeating(first));
    let cache = Arc::new(SnapshotCache::new(source.clone()));
    cache.refresh().unwrap();
    let manager = Arc::new(ActionManager::new(Duration::from_secs(1)));
    let resources = Arc::new(Resources::new("missing-font.ttf"));
    let plugin = Plugin::new(cache.clone(), device, manager, resources);
    Pipeline {
        plugin,
        source,
        cache,
    }
}

fn core_reading_id(cache: &SnapshotCache) -> i32 {
    cache
        .readings_for_sensor("/gpu-nvidia/0")
        .unwrap()
        .iter()
        .find(|r| r.label == "GPU Core")
        .unwrap()
        .id
}

fn appear(plugin: &Plugin, context: &str, settings: Value) {
    plugin
        .handle_event(InboundEvent::WillAppear {
            action: READING_ACTION.into(),
            context: context.into(),
            payload: SettingsPayload {
                settings: Some(settings),
            },
        })
        .unwrap();
}

fn tick_all(plugin: &Plugin) {
    let manager = plugin.manager().clone();
    for context in manager.contexts() {
        let action = manager.get_action(&context).unwrap();
        plugin.update_tile(&action);
    }
}

#[test]
fn directory_device_receives_decodable_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let device = Arc::new(DirectoryDevice::new(dir.path()).unwrap());
    let p = pipeline(device.clone(), gpu_tree("61 °C"));
    let id = core_reading_id(&p.cache);
    appear(
        &p.plugin,
        "gpu:core",
        json!({"sensorUid": "/gpu-nvidia/0", "readingId": id.to_string(), "isValid": true,
               "min": 0, "max": 100, "currentThresholdId": "stale"}),
    );
    tick_all(&p.plugin);

    let bytes = fs::read(device.tile_path("gpu:core", "png")).unwrap();
    let canvas = png::decode(&bytes).unwrap();
    assert_eq!(canvas.width() as usize, TILE_WIDTH);
    assert_eq!(canvas.height() as usize, TILE_HEIGHT);

    let saved: Value =
        serde_json::from_slice(&fs::read(device.tile_path("gpu:core", "settings.json")).unwrap())
            .unwrap();
    assert_eq!(saved["sensorUid"], "/gpu-nvidia/0");
}

#[test]
fn new_polls_render_new_frames() {
    let device = Arc::new(RecordingDevice::new());
    let p = pipeline(device.clone(), gpu_tree("40 °C"));
    p.plugin.set_poll_interval(100);
    let id = core_reading_id(&p.cache);
    appear(
        &p.plugin,
        "t1",
        json!({"sensorUid": "/gpu-nvidia/0", "readingId": id.to_string(), "isValid": true,
               "min": 0, "max": 100}),
    );
    tick_all(&p.plugin);

    for temp in ["50 °C", "60 °C"] {
        p.source.push(Ok(gpu_tree(temp)));
        p.cache.refresh().unwrap();
        thread::sleep(Duration::from_millis(120));
        tick_all(&p.plugin);
    }
    assert_eq!(device.images("t1").len(), 3);
    let graph = p.plugin.graph("t1").unwrap();
    let graph = graph.lock().unwrap();
    assert_eq!(graph.label(1).unwrap().text, "60 °C");
}

#[test]
fn missing_snapshot_marks_tile_unavailable() {
    let device = Arc::new(RecordingDevice::new());
    let source = Arc::new(FakeSource::new(vec![Err(Error::SourceUnavailable(
        "connection refused".into(),
    ))]));
    let cache = Arc::new(SnapshotCache::new(source));
    assert!(cache.refresh().is_err());
    let manager = Arc::new(ActionManager::new(Duration::from_secs(1)));
    let plugin = Plugin::new(
        cache,
        device.clone(),
        manager,
        Arc::new(Resources::new("missing-font.ttf")),
    );
    appear(&plugin, "t1", json!({"sensorUid": "/gpu-nvidia/0", "readingId": "1"}));
    tick_all(&plugin);
    tick_all(&plugin);

    assert!(device.images("t1").is_empty());
    let notes = device.inspector("t1");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["error"], true);
    assert!(plugin.manager().get_settings("t1").unwrap().in_error_state);
}

#[test]
fn replayed_event_file_drives_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let device = Arc::new(RecordingDevice::new());
    let p = pipeline(device.clone(), gpu_tree("70 °C"));
    let id = core_reading_id(&p.cache);

    let appear_line = json!({
        "event": "willAppear",
        "action": READING_ACTION,
        "context": "t1",
        "payload": {"settings": {"sensorUid": "/gpu-nvidia/0", "readingId": id.to_string(),
                                 "isValid": true}}
    });
    let lines = format!(
        "# recorded session\n{appear_line}\nnot json\n\n{}\n",
        json!({"event": "didReceiveGlobalSettings", "payload": {"settings": {"pollInterval": 500}}})
    );
    let path = dir.path().join("events.jsonl");
    fs::write(&path, lines).unwrap();

    let handled = replay_events(&p.plugin, path.to_str().unwrap()).unwrap();
    assert_eq!(handled, 2);
    assert_eq!(p.plugin.global_settings().poll_interval, 500);
    tick_all(&p.plugin);
    assert_eq!(device.images("t1").len(), 1);
}
