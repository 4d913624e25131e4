//! Per-tile configuration: the persisted settings shape, its decoder and
//! legacy migration, threshold evaluation, value formatting and the
//! scheduler that decides which tiles to re-render.

pub mod format;
pub mod manager;
pub mod migrate;
pub mod settings;
pub mod threshold;

pub use manager::{ActionManager, SchedulerHandle, TileAction};
pub use migrate::{decode_settings, migrate_to_thresholds, sync_settings_with_readings};
pub use settings::{GlobalSettings, SettingsTileAppearance, Threshold, ThresholdState, TileSettings};
pub use threshold::{evaluate, new_threshold_id, Operator};

pub const READING_ACTION: &str = "com.moeilijk.lhm.reading";
pub const SETTINGS_ACTION: &str = "com.moeilijk.lhm.settings";
