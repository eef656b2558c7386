//! Runtime configuration resolved from the environment.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const APP_DIR_NAME: &str = "corner-pos";
const DEFAULT_ORIGIN: &str = "app://corner-pos";
pub const DEFAULT_LOG_FILTER: &str = "info,corner_pos_lib=debug";

/// Keep only this many rolled log files.
const MAX_LOG_FILES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub origin: String,
}

impl AppConfig {
    /// `CORNER_POS_DATA_DIR` wins; otherwise the platform data directory
    /// (`LOCALAPPDATA`, `XDG_DATA_HOME`, then `~/.local/share`).
    pub fn from_env() -> Self {
        let data_dir = non_empty_env("CORNER_POS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let origin = non_empty_env("CORNER_POS_ORIGIN").unwrap_or_else(|| DEFAULT_ORIGIN.into());
        Self { data_dir, origin }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_data_dir() -> PathBuf {
    let base = non_empty_env("LOCALAPPDATA")
        .or_else(|| non_empty_env("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            #[cfg(target_os = "windows")]
            {
                PathBuf::from(std::env::var("USERPROFILE").unwrap_or_else(|_| ".".into()))
                    .join("AppData")
                    .join("Local")
            }
            #[cfg(not(target_os = "windows"))]
            {
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                    .join(".local")
                    .join("share")
            }
        });
    base.join(APP_DIR_NAME)
}

/// Prune old log files in `log_dir`, keeping only the most recent
/// `MAX_LOG_FILES`.
pub fn prune_old_logs(log_dir: &Path) {
    if !log_dir.exists() {
        return;
    }

    let mut log_files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    if let Ok(entries) = fs::read_dir(log_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_log = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with("pos."));
            if is_log {
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(std::time::UNIX_EPOCH);
                log_files.push((path, modified));
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove old log file {}: {e}", path.display());
        } else {
            info!("Pruned old log file: {}", path.display());
        }
    }
}
