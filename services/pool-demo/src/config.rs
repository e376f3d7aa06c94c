//! Config file resolution for the demo binary
//!
//! Path precedence: `--config` CLI arg > `CONFIG_PATH` env var > default file.
//! A missing default file is not an error; the pool defaults apply.

use std::path::{Path, PathBuf};

use subchannel_pool::PoolConfig;
use tracing::info;

const DEFAULT_CONFIG_FILE: &str = "subchannel-pool.toml";

/// Resolve config file path from CLI arg or CONFIG_PATH env var.
pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
    if let Some(p) = cli_path {
        return PathBuf::from(p);
    }
    if let Ok(p) = std::env::var("CONFIG_PATH") {
        return PathBuf::from(p);
    }
    PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Load the pool config, falling back to defaults when `path` does not exist.
pub fn load_or_default(path: &Path) -> common::Result<PoolConfig> {
    if !path.exists() {
        info!(path = %path.display(), "config file not found, using defaults");
        return Ok(PoolConfig::default());
    }
    PoolConfig::load(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Serializes tests that mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    #[test]
    fn resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = resolve_path(Some("/cli/wins.toml"));
        assert_eq!(path, PathBuf::from("/cli/wins.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(resolve_path(None), PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.sweep_interval(), Duration::from_secs(10));
    }

    #[test]
    fn existing_file_is_loaded_and_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.toml");

        std::fs::write(&path, "[pool]\nsweep_interval_secs = 2\n").unwrap();
        let config = load_or_default(&path).unwrap();
        assert_eq!(config.sweep_interval(), Duration::from_secs(2));

        std::fs::write(&path, "[pool]\nsweep_interval_secs = 0\n").unwrap();
        assert!(load_or_default(&path).is_err());
    }
}
