//! Platform config locations

use directories::ProjectDirs;
use std::path::PathBuf;

/// File name of the service config
pub const CONFIG_FILE_NAME: &str = "config.json";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "drone-riot-conv")
}

/// Directory holding the config file (e.g. `~/.config/drone-riot-conv`)
pub fn get_config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default config file path
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}
