use std::{fs, path::Path};

use crate::{Error, Result};

use super::Config;

pub fn load_or_default() -> Result<Config> {
    let path = super::config_path()?;
    if !path.exists() {
        let cfg = Config::default();
        cfg.save_to_path(&path)?;
        super::validate(&cfg)?;
        return Ok(cfg);
    }
    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        super::validate(&cfg)?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(path)?;
    parse(&raw)
}

pub fn save(config: &Config) -> Result<()> {
    let path = super::config_path()?;
    save_to_path(config, &path)
}

pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = format!(
        "# lhmdeck config\n\
endpoint = \"{}\"\n\
poll_interval_ms = {}\n\
request_timeout_ms = {}\n\
font_path = \"{}\"\n\
placeholder_path = {}\n\
output_dir = {}\n\
events_file = {}\n\
log_level = \"{}\"\n\
log_file = {}\n",
        config.endpoint,
        config.poll_interval_ms,
        config.request_timeout_ms,
        config.font_path,
        format_optional(&config.placeholder_path),
        format_optional(&config.output_dir),
        format_optional(&config.events_file),
        config.log_level.as_str(),
        format_optional(&config.log_file),
    );
    fs::write(path, contents)?;
    Ok(())
}

pub fn parse(raw: &str) -> Result<Config> {
    let mut cfg = Config::default();

    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (key, value) = trimmed.split_once('=').ok_or_else(|| {
            Error::InvalidArgs(format!("invalid config line {}: '{}'", idx + 1, line))
        })?;

        let key = key.trim();
        let value = value.trim();
        match key {
            "endpoint" => cfg.endpoint = unquote(value).to_string(),
            "poll_interval_ms" => {
                cfg.poll_interval_ms = unquote(value).parse().map_err(|_| {
                    Error::InvalidArgs(format!("invalid poll_interval_ms on line {}", idx + 1))
                })?;
            }
            "request_timeout_ms" => {
                cfg.request_timeout_ms = unquote(value).parse().map_err(|_| {
                    Error::InvalidArgs(format!("invalid request_timeout_ms on line {}", idx + 1))
                })?;
            }
            "font_path" => cfg.font_path = unquote(value).to_string(),
            "placeholder_path" => cfg.placeholder_path = parse_optional(value),
            "output_dir" => cfg.output_dir = parse_optional(value),
            "events_file" => cfg.events_file = parse_optional(value),
            "log_level" => {
                cfg.log_level = unquote(value).parse().map_err(|e| {
                    Error::InvalidArgs(format!("invalid log_level on line {}: {e}", idx + 1))
                })?;
            }
            "log_file" => cfg.log_file = parse_optional(value),
            other => {
                return Err(Error::InvalidArgs(format!(
                    "unknown config key '{}' on line {}",
                    other,
                    idx + 1
                )));
            }
        }
    }

    super::validate(&cfg)?;
    Ok(cfg)
}

fn unquote(value: &str) -> &str {
    value.trim_matches('"')
}

/// `null` or an empty string means unset.
fn parse_optional(value: &str) -> Option<String> {
    if value == "null" {
        return None;
    }
    let cleaned = unquote(value).trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

fn format_optional(value: &Option<String>) -> String {
    match value {
        Some(v) => format!("\"{v}\""),
        None => "null".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::LogLevel;

    #[test]
    fn loads_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_from_path(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn parses_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let contents = r#"
            # local bridge
            endpoint = "http://10.0.0.5:8085/data.json"
            poll_interval_ms = 500
            request_timeout_ms = 1500
            font_path = "/usr/share/fonts/DejaVuSans-Bold.ttf"
            placeholder_path = "/opt/lhmdeck/refresh.png"
            output_dir = null
            events_file = "/tmp/events.jsonl"
            log_level = "debug"
            log_file = null
        "#;
        fs::write(&path, contents).unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.endpoint, "http://10.0.0.5:8085/data.json");
        assert_eq!(cfg.poll_interval_ms, 500);
        assert_eq!(cfg.request_timeout_ms, 1500);
        assert_eq!(cfg.font_path, "/usr/share/fonts/DejaVuSans-Bold.ttf");
        assert_eq!(
            cfg.placeholder_path.as_deref(),
            Some("/opt/lhmdeck/refresh.png")
        );
        assert_eq!(cfg.output_dir, None);
        assert_eq!(cfg.events_file.as_deref(), Some("/tmp/events.jsonl"));
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.log_file, None);
    }

    #[test]
    fn rejects_unknown_key_with_line_number() {
        let err = parse("endpoint = \"http://h/data.json\"\nbaud = 9600").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("unknown config key 'baud'"));
        assert!(msg.contains("line 2"));
    }

    #[test]
    fn rejects_malformed_line() {
        let err = parse("poll_interval_ms 500").unwrap_err();
        assert!(format!("{err}").contains("invalid config line 1"));
    }

    #[test]
    fn rejects_out_of_range_timeout() {
        assert!(parse("request_timeout_ms = 50").is_err());
    }

    #[test]
    fn saves_and_loads_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            endpoint: "https://rig.local/data.json".into(),
            poll_interval_ms: 2000,
            request_timeout_ms: 100,
            font_path: "font.ttf".into(),
            placeholder_path: None,
            output_dir: Some("/var/lib/lhmdeck".into()),
            events_file: None,
            log_level: LogLevel::Warn,
            log_file: Some("/var/log/lhmdeck.log".into()),
        };
        cfg.save_to_path(&path).unwrap();
        let loaded = load_from_path(&path).unwrap();
        assert_eq!(cfg, loaded);
    }
}
