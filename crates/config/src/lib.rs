//! User configuration, read from an optional TOML file.
//!
//! Command line flags take precedence over anything loaded here; this crate
//! only supplies the file layer and the built-in defaults.

use std::path::{Path, PathBuf};

use eyre::Context;
use serde::Deserialize;

pub const DEFAULT_DAP_HOST: &str = "127.0.0.1";
pub const DEFAULT_DAP_PORT: u16 = 54321;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// One of `debug`, `info`, `warn` or `error`.
    pub log_level: Option<String>,
    /// Library search directories appended after those given with `-J`.
    pub search_paths: Vec<String>,
    pub dap: DapConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DapConfig {
    pub host: String,
    pub port: u16,
}

impl Default for DapConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DAP_HOST.to_string(),
            port: DEFAULT_DAP_PORT,
        }
    }
}

/// `<config dir>/jsonnice/config.toml`, if the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("jsonnice").join("config.toml"))
}

impl Config {
    /// Load `explicit` if given, else the default file if it exists.
    ///
    /// A missing default file gives the defaults; a missing explicit file
    /// is an error.
    pub fn load(explicit: Option<&Path>) -> eyre::Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                Some(path) => {
                    tracing::debug!(path = %path.display(), "no config file, using defaults");
                    Ok(Self::default())
                }
                None => {
                    tracing::debug!("no config directory on this platform, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> eyre::Result<Self> {
        tracing::debug!(path = %path.display(), "loading config");
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config file {}", path.display()))?;
        Self::parse(&contents).wrap_err_with(|| format!("parsing config file {}", path.display()))
    }

    pub fn parse(contents: &str) -> eyre::Result<Self> {
        let config = toml::from_str(contents)?;
        Ok(config)
    }
}
