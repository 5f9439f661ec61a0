use std::path::{Path, PathBuf};
use crate::common::config::Config;

// Root installs use the system locations, everyone else gets XDG paths under $HOME.

pub fn system_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/facegate")
}

pub fn system_config_file() -> PathBuf {
    PathBuf::from("/etc/facegate/facegate.toml")
}

pub fn user_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("facegate"))
}

pub fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("facegate/facegate.toml"))
}

/// User config if present, otherwise the system config.
pub fn default_config_file() -> PathBuf {
    match user_config_file() {
        Some(path) if path.exists() => path,
        _ => system_config_file(),
    }
}

pub fn data_dir(config: &Config) -> PathBuf {
    if let Some(dir) = &config.storage.data_dir {
        return dir.clone();
    }
    if is_root() {
        return system_data_dir();
    }
    user_data_dir().unwrap_or_else(system_data_dir)
}

pub fn templates_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("templates")
}

pub fn lockout_file(data_dir: &Path) -> PathBuf {
    data_dir.join("lockout.json")
}

pub fn key_file(config: &Config, data_dir: &Path) -> PathBuf {
    config
        .storage
        .key_file
        .clone()
        .unwrap_or_else(|| data_dir.join("master.key"))
}

fn is_root() -> bool {
    std::env::var("USER").map(|user| user == "root").unwrap_or(false)
}
