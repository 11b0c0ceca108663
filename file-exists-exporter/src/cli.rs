//! Command-line arguments.
//!
//! Flags are accepted with a single dash (`-file /tmp/a`, `-listen-address=:9100`)
//! as well as the usual double dash.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{
    ConfigError, DEFAULT_CONFIG_PATH, ExporterConfig, LogFormat, LoggingConfig, MonitoredPath,
    PathSource,
};

/// Long flags that consume the following token as their value.
const VALUE_FLAGS: &[&str] = &[
    "config",
    "listen-address",
    "file",
    "source",
    "metrics-path",
    "log-level",
    "log-format",
];

/// Which configuration source supplies the monitored paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// JSON config file.
    File,
    /// Repeated --file flags.
    Flags,
}

/// Prometheus exporter reporting whether files exist.
#[derive(Parser, Debug)]
#[command(name = "file-exists-exporter")]
#[command(about = "Export file and directory existence as Prometheus metrics")]
#[command(version)]
pub struct Args {
    /// Path to the JSON config file [default: /etc/exporter/config.json].
    #[arg(long, conflicts_with = "files")]
    pub config: Option<PathBuf>,

    /// The address to listen on for HTTP requests.
    #[arg(long = "listen-address", default_value = ":8080")]
    pub listen_address: String,

    /// File to monitor (repeatable).
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<String>,

    /// Where monitored paths come from (inferred from --file when omitted).
    #[arg(long, value_enum)]
    pub source: Option<SourceKind>,

    /// Path for the metrics endpoint.
    #[arg(long = "metrics-path", default_value = "/metrics")]
    pub metrics_path: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Args {
    /// Parse process arguments, accepting single-dash long flags.
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }

    /// Build the exporter configuration, picking exactly one path source.
    pub fn into_config(self) -> Result<ExporterConfig, ConfigError> {
        let source = match (self.source, self.files.is_empty()) {
            (Some(SourceKind::Flags), _) if self.config.is_some() => {
                return Err(ConfigError::Validation(
                    "--config cannot be combined with --source flags".to_string(),
                ));
            }
            (Some(SourceKind::Flags), _) | (None, false) => {
                PathSource::Flags(self.files.into_iter().map(MonitoredPath::from).collect())
            }
            (Some(SourceKind::File), false) => {
                return Err(ConfigError::Validation(
                    "--file cannot be combined with --source file".to_string(),
                ));
            }
            (Some(SourceKind::File), true) | (None, true) => PathSource::ConfigFile(
                self.config
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            ),
        };

        let config = ExporterConfig {
            source,
            listen: self.listen_address,
            metrics_path: self.metrics_path,
            logging: LoggingConfig {
                level: self.log_level,
                format: self.log_format,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

/// Rewrite `-flag` into `--flag` so clap accepts Go-style long flags.
///
/// Values of value-taking flags and everything after `--` pass through untouched.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut iter = args.into_iter().map(Into::into);
    let mut out: Vec<OsString> = iter.next().into_iter().collect();
    let mut expect_value = false;
    let mut passthrough = false;

    for arg in iter {
        if passthrough || expect_value {
            expect_value = false;
            out.push(arg);
            continue;
        }

        let Some(text) = arg.to_str() else {
            out.push(arg);
            continue;
        };

        if text == "--" {
            passthrough = true;
            out.push(arg);
            continue;
        }

        let long = if let Some(rest) = text.strip_prefix("--") {
            Some(rest.to_string())
        } else if let Some(rest) = text.strip_prefix('-')
            && rest.len() > 1
        {
            Some(rest.to_string())
        } else {
            None
        };

        match long {
            Some(flag) => {
                let name = flag.split_once('=').map_or(flag.as_str(), |(n, _)| n);
                expect_value = !flag.contains('=') && VALUE_FLAGS.contains(&name);
                out.push(OsString::from(format!("--{}", flag)));
            }
            None => out.push(arg),
        }
    }

    out
}
