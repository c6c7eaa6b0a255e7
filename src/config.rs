//! Configuration loaded from `~/.focus/rc`
//!
//! The rc file is a list of `key=value` lines. Blank lines and lines starting
//! with `#` are ignored. Unknown keys are kept so they can be reported.

use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use crate::utils::MAX_SPAN_DAYS;

pub const DEFAULT_ICS_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com";

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the rc file; relative paths resolve against it
    pub dir: PathBuf,
    pub data_location: Option<PathBuf>,
    pub rollover_auto: bool,
    pub ics_window_days: i64,
    pub drive_token: Option<String>,
    pub drive_folder: Option<String>,
    pub drive_api_base: String,
    pub unknown_keys: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir: Self::config_dir(),
            data_location: None,
            rollover_auto: true,
            ics_window_days: DEFAULT_ICS_WINDOW_DAYS,
            drive_token: None,
            drive_folder: None,
            drive_api_base: DEFAULT_DRIVE_API_BASE.to_string(),
            unknown_keys: Vec::new(),
        }
    }
}

impl Config {
    /// Directory for the rc file and the default ledger
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".focus")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("rc")
    }

    /// Load configuration from the rc file, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&text, path.parent().unwrap_or(Path::new(".")))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse rc text
    pub fn parse(text: &str, dir: &Path) -> Result<Self> {
        let mut config = Config {
            dir: dir.to_path_buf(),
            ..Config::default()
        };
        let mut values = BTreeMap::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid config line {}: '{}' (expected key=value)", lineno + 1, line))?;
            values.insert(key.trim().to_string(), value.trim().to_string());
        }

        for (key, value) in values {
            match key.as_str() {
                "data.location" => {
                    let path = PathBuf::from(&value);
                    config.data_location = Some(if path.is_relative() { dir.join(path) } else { path });
                }
                "rollover.auto" => {
                    config.rollover_auto = match value.to_lowercase().as_str() {
                        "on" | "true" | "yes" | "1" => true,
                        "off" | "false" | "no" | "0" => false,
                        _ => return Err(anyhow!("Invalid value for rollover.auto: '{}' (expected on or off)", value)),
                    };
                }
                "ics.window_days" => {
                    let days: i64 = value
                        .parse()
                        .map_err(|_| anyhow!("Invalid value for ics.window_days: '{}'", value))?;
                    if days <= 0 {
                        return Err(anyhow!("ics.window_days must be positive, got {}", days));
                    }
                    if days > MAX_SPAN_DAYS {
                        return Err(anyhow!("ics.window_days cannot exceed {}, got {}", MAX_SPAN_DAYS, days));
                    }
                    config.ics_window_days = days;
                }
                "drive.token" => config.drive_token = non_empty(value),
                "drive.folder" => config.drive_folder = non_empty(value),
                "drive.api_base" => {
                    config.drive_api_base = value.trim_end_matches('/').to_string();
                }
                _ => {
                    log::warn!("Unknown config key: {}", key);
                    config.unknown_keys.push(key);
                }
            }
        }
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("FOCUS_DRIVE_TOKEN") {
            if !token.trim().is_empty() {
                self.drive_token = Some(token.trim().to_string());
            }
        }
    }

    /// Resolved ledger path
    pub fn db_path(&self) -> PathBuf {
        self.data_location
            .clone()
            .unwrap_or_else(|| self.dir.join("matrix.db"))
    }
}

/// Passphrase supplied through the environment, if any
pub fn env_passphrase() -> Option<String> {
    std::env::var("FOCUS_VAULT_PASSPHRASE")
        .ok()
        .filter(|p| !p.is_empty())
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
