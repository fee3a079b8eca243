//! Optional config file loading. Search order: ./coursebook.toml, then
//! $XDG_CONFIG_HOME/coursebook/config.toml (or ~/.config/coursebook/config.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};

const LOCAL_FILE: &str = "coursebook.toml";
const APP_DIR: &str = "coursebook";

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Directory the EPUBs are written to (default `ebooks`). Relative to CWD.
    pub output_dir: Option<PathBuf>,
    /// Site root that relative subchapter and image URLs resolve against.
    pub base_url: Option<String>,
    /// Page whose side menu lists the course.
    pub start_url: Option<String>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Delay in seconds between requests.
    pub request_delay_secs: Option<u64>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Language tag for the packages.
    pub language: Option<String>,
    pub author: Option<String>,
}

/// Search order: (1) ./coursebook.toml, (2) $XDG_CONFIG_HOME/coursebook/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join(LOCAL_FILE)];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join(APP_DIR).join("config.toml"));
    }
    load_first(&paths)
}

fn load_first(paths: &[PathBuf]) -> Result<Option<Config>, String> {
    for path in paths {
        if path.exists() {
            return read_config(path).map(Some);
        }
    }
    Ok(None)
}

fn read_config(path: &Path) -> Result<Config, String> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
    toml::from_str(&s).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}
