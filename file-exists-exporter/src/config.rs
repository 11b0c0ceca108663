//! Configuration for the file existence exporter.

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default location of the JSON config file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/exporter/config.json";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("No files provided, at least one --file is required")]
    NoPaths,
    #[error("Validation error: {0}")]
    Validation(String),
}

/// A filesystem path whose existence is reported.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct MonitoredPath(String);

impl MonitoredPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The path exactly as configured, used as the `file` label value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for MonitoredPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MonitoredPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for MonitoredPath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

/// Contents of the JSON config file: `{"Files": [...]}`.
///
/// The `Files` key matches case-insensitively and a `null` list reads as
/// empty. When several keys match, the last one wins.
#[derive(Debug, Clone, Default)]
pub struct FilesConfig {
    /// Paths to monitor, in output order.
    pub files: Vec<MonitoredPath>,
}

impl<'de> Deserialize<'de> for FilesConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FilesConfigVisitor;

        impl<'de> Visitor<'de> for FilesConfigVisitor {
            type Value = FilesConfig;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object with a \"Files\" list")
            }

            fn visit_unit<E: de::Error>(self) -> Result<FilesConfig, E> {
                Ok(FilesConfig::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<FilesConfig, A::Error> {
                let mut config = FilesConfig::default();
                while let Some(key) = map.next_key::<String>()? {
                    if key.eq_ignore_ascii_case("files") {
                        config.files = map
                            .next_value::<Option<Vec<MonitoredPath>>>()?
                            .unwrap_or_default();
                    } else {
                        map.next_value::<IgnoredAny>()?;
                    }
                }
                Ok(config)
            }
        }

        deserializer.deserialize_any(FilesConfigVisitor)
    }
}

impl FilesConfig {
    /// Load the file list from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse the file list from a JSON string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }
}

/// Where the monitored paths come from. The two sources are never merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSource {
    /// Read `{"Files": [...]}` from a JSON file.
    ConfigFile(PathBuf),
    /// One path per `--file` occurrence.
    Flags(Vec<MonitoredPath>),
}

impl PathSource {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PathSource::ConfigFile(_) => "file",
            PathSource::Flags(_) => "flags",
        }
    }
}

impl Default for PathSource {
    fn default() -> Self {
        PathSource::ConfigFile(PathBuf::from(DEFAULT_CONFIG_PATH))
    }
}

/// Complete exporter configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Source of the monitored paths.
    pub source: PathSource,

    /// Address to listen on (default: ":8080").
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    pub metrics_path: String,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

pub(crate) fn default_listen() -> String {
    ":8080".to_string()
}

pub(crate) fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            source: PathSource::default(),
            listen: default_listen(),
            metrics_path: default_metrics_path(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,

    /// Log output format: "text" or "json".
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        socket_address(&self.listen)?;

        // Validate path starts with /
        if !self.metrics_path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        Ok(())
    }

    /// Listen address in a form the socket layer accepts.
    ///
    /// A bare `:port` binds the IPv6 wildcard, which also accepts IPv4
    /// connections unless the host sets `bindv6only`.
    pub fn listen_address(&self) -> Result<String, ConfigError> {
        socket_address(&self.listen)
    }

    /// Load the monitored paths from the configured source.
    pub fn load_paths(&self) -> Result<Vec<MonitoredPath>, ConfigError> {
        match &self.source {
            PathSource::ConfigFile(path) => Ok(FilesConfig::load_from_file(path)?.files),
            PathSource::Flags(files) if files.is_empty() => Err(ConfigError::NoPaths),
            PathSource::Flags(files) => Ok(files.clone()),
        }
    }
}

fn socket_address(listen: &str) -> Result<String, ConfigError> {
    let invalid = || ConfigError::Validation(format!("Invalid listen address: {}", listen));

    let (host, port) = listen.rsplit_once(':').ok_or_else(invalid)?;
    port.parse::<u16>().map_err(|_| invalid())?;

    if host.is_empty() {
        Ok(format!("[::]:{}", port))
    } else {
        Ok(listen.to_string())
    }
}
