//! Collector that reports whether each monitored path exists.

use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;

use tracing::trace;

use crate::config::MonitoredPath;

/// Metric name for every sample.
pub const METRIC_NAME: &str = "file_exists";

/// Help text for the metric.
pub const METRIC_HELP: &str = "File or directory exists";

/// Label carrying the monitored path.
pub const FILE_LABEL: &str = "file";

/// Descriptor for a single monitored path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetric {
    /// The path being checked.
    pub path: MonitoredPath,
    /// Label set, escaped once when the descriptor is built.
    labels: String,
}

impl FileMetric {
    /// Create the descriptor for a path.
    pub fn new(path: MonitoredPath) -> Self {
        let labels = format!(
            "{{{}=\"{}\"}}",
            FILE_LABEL,
            escape_label_value(path.as_str())
        );
        Self { path, labels }
    }

    /// Labels in Prometheus exposition format.
    pub fn format_labels(&self) -> &str {
        &self.labels
    }
}

/// A point-in-time existence reading. Never cached between scrapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSample<'a> {
    pub metric: &'a FileMetric,
    pub exists: bool,
}

impl MetricSample<'_> {
    /// Gauge value: 1 when the path exists, 0 otherwise.
    pub fn value(&self) -> f64 {
        if self.exists { 1.0 } else { 0.0 }
    }
}

/// Read-only collector over a fixed list of paths.
#[derive(Debug, Clone, Default)]
pub struct FileCollector {
    metrics: Vec<FileMetric>,
}

impl FileCollector {
    /// Create a collector for the given paths. Duplicates are kept.
    pub fn new(paths: impl IntoIterator<Item = MonitoredPath>) -> Self {
        Self {
            metrics: paths.into_iter().map(FileMetric::new).collect(),
        }
    }

    /// Descriptors in configuration order.
    pub fn describe(&self) -> &[FileMetric] {
        &self.metrics
    }

    /// Stat every path once and return a sample for each.
    pub fn collect(&self) -> Vec<MetricSample<'_>> {
        self.metrics
            .iter()
            .map(|metric| MetricSample {
                metric,
                exists: path_exists(metric.path.as_path()),
            })
            .collect()
    }

    /// Collect and render metrics in Prometheus exposition format.
    pub fn render(&self) -> String {
        let samples = self.collect();
        let mut output = String::with_capacity(samples.len() * 64 + 96);

        if samples.is_empty() {
            return output;
        }

        writeln!(output, "# HELP {} {}", METRIC_NAME, METRIC_HELP).ok();
        writeln!(output, "# TYPE {} gauge", METRIC_NAME).ok();

        for sample in &samples {
            writeln!(
                output,
                "{}{} {}",
                METRIC_NAME,
                sample.metric.format_labels(),
                sample.value()
            )
            .ok();
        }

        trace!(samples = samples.len(), "Rendered file metrics");

        output
    }
}

/// Create a shareable collector handle.
pub type SharedCollector = Arc<FileCollector>;

/// Whether `stat` on the path succeeds. Symlinks are followed.
///
/// Every stat failure, permission errors included, reads as "does not exist".
pub fn path_exists(path: &Path) -> bool {
    std::fs::metadata(path).is_ok()
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn collector_for(paths: &[&Path]) -> FileCollector {
        FileCollector::new(
            paths
                .iter()
                .map(|p| MonitoredPath::new(p.to_string_lossy().into_owned())),
        )
    }

    fn sample_line(path: &Path, value: u8) -> String {
        format!("file_exists{{file=\"{}\"}} {}", path.display(), value)
    }

    #[test]
    fn test_file_metric_labels() {
        let metric = FileMetric::new("/tmp/a".into());
        assert_eq!(metric.format_labels(), "{file=\"/tmp/a\"}");
    }

    #[test]
    fn test_render_existing_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present");
        let missing = dir.path().join("missing");
        fs::write(&present, b"x").unwrap();

        let collector = collector_for(&[&present, &missing]);
        let output = collector.render();

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "# HELP file_exists File or directory exists");
        assert_eq!(lines[1], "# TYPE file_exists gauge");
        assert_eq!(lines[2], sample_line(&present, 1));
        assert_eq!(lines[3], sample_line(&missing, 0));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_directory_counts_as_existing() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector_for(&[dir.path()]);

        let samples = collector.collect();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value(), 1.0);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_follows_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let collector = collector_for(&[&link]);
        assert!(!collector.collect()[0].exists);

        fs::write(&target, b"x").unwrap();
        assert!(collector.collect()[0].exists);
    }

    #[test]
    fn test_duplicates_yield_duplicate_samples() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector_for(&[dir.path(), dir.path(), dir.path()]);

        let output = collector.render();
        let sample_lines = output.lines().filter(|l| !l.starts_with('#')).count();
        assert_eq!(sample_lines, 3);
        assert_eq!(output.matches("# TYPE").count(), 1);
    }

    #[test]
    fn test_toggle_is_seen_on_next_scrape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toggle");
        let collector = collector_for(&[&path]);

        assert!(collector.render().contains(&sample_line(&path, 0)));

        fs::write(&path, b"x").unwrap();
        assert!(collector.render().contains(&sample_line(&path, 1)));

        fs::remove_file(&path).unwrap();
        assert!(collector.render().contains(&sample_line(&path, 0)));
    }

    #[test]
    fn test_empty_collector_renders_nothing() {
        let collector = FileCollector::default();
        assert!(collector.describe().is_empty());
        assert_eq!(collector.render(), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_not_found_stat_errors_read_as_missing() {
        let dir = tempfile::tempdir().unwrap();

        // ENOTDIR: a regular file used as a directory
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        let under_file = file.join("child");

        // ELOOP: a symlink pointing at itself
        let looped = dir.path().join("loop");
        std::os::unix::fs::symlink(&looped, &looped).unwrap();

        for path in [&under_file, &looped] {
            let err = fs::metadata(path).unwrap_err();
            assert_ne!(err.kind(), std::io::ErrorKind::NotFound, "{}", path.display());
            assert!(!path_exists(path), "{} should read as missing", path.display());
        }

        let collector = collector_for(&[&under_file, &looped]);
        let output = collector.render();
        assert!(output.contains(&sample_line(&under_file, 0)));
        assert!(output.contains(&sample_line(&looped, 0)));
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_denied_reads_as_missing() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        let inner = locked.join("inner");
        fs::write(&inner, b"x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users bypass directory permissions, so the denial is
        // only observable for regular users.
        let denied = fs::metadata(&inner)
            .err()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::PermissionDenied);
        let exists = path_exists(&inner);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        if denied {
            assert!(!exists);
        } else {
            // No denial means stat succeeded and the file must report present.
            assert!(exists);
            eprintln!("running privileged, permission denial not exercised");
        }
    }

    #[test]
    fn test_escape_label_value() {
        assert_eq!(escape_label_value("simple"), "simple");
        assert_eq!(escape_label_value("with\"quote"), "with\\\"quote");
        assert_eq!(escape_label_value("with\\backslash"), "with\\\\backslash");
        assert_eq!(escape_label_value("with\nnewline"), "with\\nnewline");
    }

    #[test]
    fn test_render_escapes_path_label() {
        let collector = FileCollector::new(["/tmp/odd\"name".into()]);
        assert!(
            collector
                .render()
                .contains("file_exists{file=\"/tmp/odd\\\"name\"} 0")
        );
    }
}
