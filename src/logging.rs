//! Structured logging: console plus a daily rolling file.

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::DashboardConfig;

pub const DEFAULT_FILTER: &str = "info,admin_dashboard=debug";
pub const LOG_FILE_PREFIX: &str = "admin-dashboard";
pub const MAX_LOG_FILES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub dir: PathBuf,
    pub file_prefix: String,
    pub max_files: usize,
    /// Write the file layer as JSON lines instead of plain text.
    pub json: bool,
    /// Used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl LogConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file_prefix: LOG_FILE_PREFIX.to_string(),
            max_files: MAX_LOG_FILES,
            json: false,
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl From<&DashboardConfig> for LogConfig {
    fn from(config: &DashboardConfig) -> Self {
        Self::new(config.log_dir.clone())
    }
}

/// Install the global subscriber. The returned guard flushes the file
/// writer when dropped, so the caller keeps it alive until exit.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    fs::create_dir_all(&config.dir)
        .with_context(|| format!("creating log directory {}", config.dir.display()))?;
    prune_old_logs(&config.dir, &config.file_prefix, config.max_files);

    let file_appender = tracing_appender::rolling::daily(&config.dir, &config.file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let text_file = (!config.json).then(|| {
        fmt::layer()
            .with_writer(non_blocking.clone())
            .with_ansi(false)
            .with_target(true)
    });
    let json_file = config.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(non_blocking.clone())
            .with_target(true)
    });
    let console_layer = fmt::layer().with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(text_file)
        .with(json_file)
        .try_init()
        .context("installing tracing subscriber")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        dir = %config.dir.display(),
        "logging initialised"
    );
    Ok(guard)
}

/// Keep only the newest `max_files` logs whose names start with `prefix`.
/// Returns how many files were removed.
pub fn prune_old_logs(dir: &Path, prefix: &str, max_files: usize) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = entries
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(prefix))
        })
        .filter(|entry| entry.path().is_file())
        .map(|entry| {
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(std::time::UNIX_EPOCH);
            (entry.path(), modified)
        })
        .collect();

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(max_files) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "failed to prune log file"),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn touch(dir: &Path, name: &str, age_secs: u64) {
        let path = dir.join(name);
        fs::write(&path, b"line\n").expect("write log");
        let file = fs::File::options().write(true).open(&path).expect("open");
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .expect("set mtime");
    }

    #[test]
    fn prune_keeps_newest_matching_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        for day in 0..5 {
            touch(dir.path(), &format!("admin-dashboard.2026-03-0{}", day + 1), 86_400 * (5 - day));
        }
        touch(dir.path(), "unrelated.txt", 999_999);

        let removed = prune_old_logs(dir.path(), LOG_FILE_PREFIX, 3);
        assert_eq!(removed, 2);

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .expect("read dir")
            .flatten()
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                "admin-dashboard.2026-03-03",
                "admin-dashboard.2026-03-04",
                "admin-dashboard.2026-03-05",
                "unrelated.txt",
            ]
        );
    }

    #[test]
    fn prune_of_missing_dir_is_a_no_op() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(prune_old_logs(&dir.path().join("nope"), LOG_FILE_PREFIX, 1), 0);
    }

    #[test]
    fn log_config_follows_dashboard_config() {
        let dashboard = DashboardConfig {
            log_dir: PathBuf::from("/var/log/admin"),
            ..DashboardConfig::default()
        };
        let config = LogConfig::from(&dashboard);
        assert_eq!(config.dir, PathBuf::from("/var/log/admin"));
        assert_eq!(config.max_files, MAX_LOG_FILES);
        assert!(!config.json);
    }
}
