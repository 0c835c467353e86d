//! Runtime configuration: where the store lives and how lists page.

use std::path::{Path, PathBuf};

pub const DEFAULT_DIR: &str = ".worktrack";
pub const DB_FILE: &str = "state.db";
pub const SESSION_FILE: &str = "session.json";
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const REMINDER_WINDOW_DAYS: i64 = 7;

/// Resolved settings for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    data_dir: PathBuf,
    pub page_size: usize,
    pub reminder_days: i64,
}

impl Config {
    /// Builds the config from an optional data directory (flag or env).
    #[must_use]
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DIR)),
            page_size: DEFAULT_PAGE_SIZE,
            reminder_days: REMINDER_WINDOW_DAYS,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: Option<usize>) -> Self {
        if let Some(size) = page_size.filter(|s| *s > 0) {
            self.page_size = size;
        }
        self
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.db_path(), PathBuf::from(".worktrack/state.db"));
        assert_eq!(config.page_size, 10);
        assert_eq!(config.reminder_days, 7);
    }

    #[test]
    fn test_page_size_override_ignores_zero() {
        let config = Config::new(Some(PathBuf::from("/tmp/wt"))).with_page_size(Some(0));
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        let config = config.with_page_size(Some(25));
        assert_eq!(config.page_size, 25);
        assert_eq!(config.session_path(), PathBuf::from("/tmp/wt/session.json"));
    }
}
