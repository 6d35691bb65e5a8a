//! Well-known locations of configuration files

use std::path::PathBuf;

use etcetera::{BaseStrategy, choose_base_strategy};
use log::debug;

/// Name of the configuration file, both per project and per user
pub const CONFIG_FILE_NAME: &str = "enpaki.toml";

/// Directory holding the user's configuration (`~/.config/enpaki` on Linux)
pub fn user_config_dir() -> Option<PathBuf> {
    match choose_base_strategy() {
        Ok(strategy) => Some(strategy.config_dir().join("enpaki")),
        Err(err) => {
            debug!("No home directory available for user configuration: {err}");
            None
        }
    }
}

/// The user configuration file, whether or not it exists
pub fn user_config_file() -> Option<PathBuf> {
    user_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// The project configuration file in the current directory, whether or not it exists
pub fn project_config_file() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
}
