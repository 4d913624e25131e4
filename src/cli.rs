use crate::{Error, Result};

/// Options for the `run` command; values are `None` when not provided on CLI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub endpoint: Option<String>,
    pub interval_ms: Option<u64>,
    pub output_dir: Option<String>,
    pub events_file: Option<String>,
    pub font_path: Option<String>,
    pub placeholder_path: Option<String>,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
}

/// Parsed command-line intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunOptions),
    Snapshot { endpoint: Option<String> },
    ShowHelp,
    ShowVersion,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut iter = args.iter();
        match iter.next().map(|s| s.as_str()) {
            None => Ok(Command::Run(RunOptions::default())),
            Some("run") => Ok(Command::Run(parse_run_options(&mut iter)?)),
            Some("snapshot") => parse_snapshot(&mut iter),
            Some("--help") | Some("-h") => Ok(Command::ShowHelp),
            Some("--version") | Some("-V") => Ok(Command::ShowVersion),
            Some(flag) if flag.starts_with('-') => {
                // No subcommand: treat every argument as a `run` flag.
                let mut iter = args.iter();
                Ok(Command::Run(parse_run_options(&mut iter)?))
            }
            Some(cmd) => Err(Error::InvalidArgs(format!(
                "unknown command '{cmd}', try --help"
            ))),
        }
    }

    pub fn help() -> &'static str {
        concat!(
            "lhmdeck - LibreHardwareMonitor tiles for a Stream Deck style device\n",
            "\n",
            "USAGE:\n",
            "  lhmdeck run [--endpoint <url>] [--interval <ms>] [--output <dir>] [--events <path>]\n",
            "              [--font <path>] [--placeholder <path>] [--log-level <lvl>] [--log-file <path>]\n",
            "  lhmdeck snapshot [--endpoint <url>]\n",
            "  lhmdeck --help\n",
            "  lhmdeck --version\n",
            "\n",
            "OPTIONS:\n",
            "  --endpoint <url>       LibreHardwareMonitor data.json URL (env: LHM_ENDPOINT)\n",
            "  --interval <ms>        Poll interval, 250-2000 (default: 1000)\n",
            "  --output <dir>         Directory for rendered tiles (default: ~/.lhmdeck/tiles)\n",
            "  --events <path>        Replay device events from a JSON-lines file\n",
            "  --font <path>          TrueType font for tile text\n",
            "  --placeholder <path>   PNG background for the refresh-rate tile\n",
            "  --log-level <lvl>      error|warn|info|debug|trace (env: LHMDECK_LOG_LEVEL)\n",
            "  --log-file <path>      Append logs to a file (env: LHMDECK_LOG_PATH)\n",
            "  -h, --help             Show this help\n",
            "  -V, --version          Show version\n",
        )
    }

    pub fn print_help() {
        println!("{}", Self::help());
    }
}

fn parse_run_options(iter: &mut std::slice::Iter<String>) -> Result<RunOptions> {
    let mut opts = RunOptions::default();

    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--endpoint" => opts.endpoint = Some(take_value(flag, iter)?),
            "--interval" => {
                let raw = take_value(flag, iter)?;
                opts.interval_ms = Some(raw.parse().map_err(|_| {
                    Error::InvalidArgs("interval must be a positive integer".to_string())
                })?);
            }
            "--output" => opts.output_dir = Some(take_value(flag, iter)?),
            "--events" => opts.events_file = Some(take_value(flag, iter)?),
            "--font" => opts.font_path = Some(take_value(flag, iter)?),
            "--placeholder" => opts.placeholder_path = Some(take_value(flag, iter)?),
            "--log-level" => opts.log_level = Some(take_value(flag, iter)?),
            "--log-file" => opts.log_file = Some(take_value(flag, iter)?),
            other => {
                return Err(Error::InvalidArgs(format!(
                    "unknown flag '{other}', try --help"
                )));
            }
        }
    }

    Ok(opts)
}

fn parse_snapshot(iter: &mut std::slice::Iter<String>) -> Result<Command> {
    let mut endpoint = None;
    while let Some(flag) = iter.next() {
        match flag.as_str() {
            "--endpoint" => endpoint = Some(take_value(flag, iter)?),
            other => {
                return Err(Error::InvalidArgs(format!(
                    "unknown flag '{other}' for snapshot, try --help"
                )));
            }
        }
    }
    Ok(Command::Snapshot { endpoint })
}

fn take_value(flag: &str, iter: &mut std::slice::Iter<String>) -> Result<String> {
    iter.next()
        .cloned()
        .ok_or_else(|| Error::InvalidArgs(format!("expected a value after {flag}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_defaults_with_no_args() {
        let cmd = Command::parse(&[]).unwrap();
        assert_eq!(cmd, Command::Run(RunOptions::default()));
    }

    #[test]
    fn parse_run_with_overrides() {
        let cmd = Command::parse(&args(&[
            "run",
            "--endpoint",
            "http://rig:8085/data.json",
            "--interval",
            "500",
            "--output",
            "/tmp/tiles",
            "--events",
            "/tmp/events.jsonl",
            "--font",
            "font.ttf",
            "--placeholder",
            "bg.png",
            "--log-level",
            "debug",
            "--log-file",
            "/tmp/lhmdeck.log",
        ]))
        .unwrap();
        let expected = RunOptions {
            endpoint: Some("http://rig:8085/data.json".into()),
            interval_ms: Some(500),
            output_dir: Some("/tmp/tiles".into()),
            events_file: Some("/tmp/events.jsonl".into()),
            font_path: Some("font.ttf".into()),
            placeholder_path: Some("bg.png".into()),
            log_level: Some("debug".into()),
            log_file: Some("/tmp/lhmdeck.log".into()),
        };
        assert_eq!(cmd, Command::Run(expected));
    }

    #[test]
    fn parse_run_allows_implicit_subcommand() {
        let cmd = Command::parse(&args(&["--interval", "250", "--output", "out"])).unwrap();
        let expected = RunOptions {
            interval_ms: Some(250),
            output_dir: Some("out".into()),
            ..RunOptions::default()
        };
        assert_eq!(cmd, Command::Run(expected));
    }

    #[test]
    fn parse_snapshot_endpoint() {
        let cmd = Command::parse(&args(&["snapshot", "--endpoint", "http://h/data.json"])).unwrap();
        assert_eq!(
            cmd,
            Command::Snapshot {
                endpoint: Some("http://h/data.json".into())
            }
        );
        assert!(Command::parse(&args(&["snapshot", "--interval", "5"])).is_err());
    }

    #[test]
    fn parse_help_and_version() {
        assert_eq!(Command::parse(&args(&["--help"])).unwrap(), Command::ShowHelp);
        assert_eq!(Command::parse(&args(&["-V"])).unwrap(), Command::ShowVersion);
    }

    #[test]
    fn parse_rejects_unknown_flag_and_missing_value() {
        let err = Command::parse(&args(&["--nope"])).unwrap_err();
        assert!(format!("{err}").contains("unknown flag"));
        let err = Command::parse(&args(&["run", "--interval"])).unwrap_err();
        assert!(format!("{err}").contains("expected a value after --interval"));
        let err = Command::parse(&args(&["run", "--interval", "fast"])).unwrap_err();
        assert!(format!("{err}").contains("interval"));
    }

    #[test]
    fn parse_rejects_unknown_command() {
        let err = Command::parse(&args(&["serve"])).unwrap_err();
        assert!(format!("{err}").contains("unknown command 'serve'"));
    }
}
