// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `bootdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bootdag",
    version,
    about = "Run a startup task graph described by a TOML manifest.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the manifest (TOML).
    #[arg(long, value_name = "PATH", default_value = "Bootdag.toml")]
    pub config: String,

    /// Validate and print the dispatch order without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BOOTDAG_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Run as a secondary process: `primary_only` tasks are skipped.
    #[arg(long)]
    pub secondary: bool,

    /// Override `[config].worker_threads`.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = CliArgs::try_parse_from([
            "bootdag",
            "--config",
            "boot.toml",
            "--secondary",
            "--workers",
            "3",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.config, "boot.toml");
        assert!(args.secondary);
        assert_eq!(args.workers, Some(3));
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert!(!args.dry_run);
    }

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["bootdag"]).unwrap();
        assert_eq!(args.config, "Bootdag.toml");
        assert!(args.workers.is_none());
    }
}
