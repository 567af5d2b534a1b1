use regex::Regex;

use crate::cli::Cli;
use crate::duration::parse_duration;
use crate::errors::AppError;
use crate::filter;

#[derive(Debug, Clone)]
pub struct DevOpts {
    pub lines: u64,
    pub rate_ms: u64,
}

/// Validated run configuration, immutable for the duration of a run.
/// Namespace tokens stay raw here; they resolve against the cluster during
/// discovery.
#[derive(Debug, Clone)]
pub struct Config {
    pub namespaces: Vec<String>,
    pub label_selector: Option<String>,
    pub include: Vec<Regex>,
    pub exclude: Vec<Regex>,
    pub exclude_init: bool,
    pub exclude_ephemeral: bool,
    pub since_seconds: i64,
    pub tail_lines: i64,
    pub follow: bool,
    pub max_containers: usize,
    pub color_logs: bool,
    pub buffer: usize,
    pub dev_mode: bool,
    pub dev: DevOpts,
}

impl TryFrom<Cli> for Config {
    type Error = AppError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let since_seconds = parse_duration(&cli.since)?;
        let include = filter::compile_patterns(cli.include.as_deref().unwrap_or_default())?;
        let exclude = filter::compile_patterns(cli.exclude.as_deref().unwrap_or_default())?;

        if cli.tail < 0 {
            return Err(AppError::Other(format!(
                "--tail must be non-negative, got {}",
                cli.tail
            )));
        }
        if cli.buffer == 0 {
            return Err(AppError::Other("--buffer must be at least 1".into()));
        }

        let namespaces = cli
            .namespace
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string)
            .collect();

        let label_selector = cli
            .label_selector
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Config {
            namespaces,
            label_selector,
            include,
            exclude,
            exclude_init: cli.exclude_init,
            exclude_ephemeral: cli.exclude_ephemeral,
            since_seconds,
            tail_lines: cli.tail,
            // Dev mode exercises the snapshot path end to end.
            follow: cli.follow && !cli.dev,
            max_containers: cli.max_containers,
            color_logs: !cli.no_color_logs,
            buffer: cli.buffer,
            dev_mode: cli.dev,
            dev: DevOpts {
                lines: cli.dev_lines,
                rate_ms: cli.dev_rate_ms,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn config(args: &[&str]) -> Result<Config, AppError> {
        Config::try_from(Cli::parse_from(args))
    }

    #[test]
    fn default_window_is_ten_minutes() {
        let cfg = config(&["kulo"]).unwrap();
        assert_eq!(cfg.since_seconds, 600);
        assert_eq!(cfg.tail_lines, 25);
        assert!(cfg.namespaces.is_empty());
        assert!(cfg.color_logs);
    }

    #[test]
    fn namespace_list_splits_on_commas() {
        let cfg = config(&["kulo", "-n", "frontend, backend ,,dev-.*"]).unwrap();
        assert_eq!(cfg.namespaces, vec!["frontend", "backend", "dev-.*"]);
    }

    #[test]
    fn bad_duration_is_a_usage_error() {
        let err = config(&["kulo", "-s", "10x"]).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn bad_pattern_is_a_usage_error() {
        let err = config(&["kulo", "-e", "("]).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn dev_mode_forces_snapshot() {
        let cfg = config(&["kulo", "--dev", "--follow"]).unwrap();
        assert!(!cfg.follow);
        assert!(cfg.dev_mode);
    }
}
