//! Configuration loading.
//!
//! A single JSON file, every field optional. A missing file means
//! defaults, a malformed one is an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use keylight::Hsv;
use serde::{Deserialize, Serialize};

/// Where hook invocations append their records
pub const DEFAULT_EVENT_LOG: &str = "/tmp/claude-kbd-events.jsonl";

/// USB identity of the raw HID interface
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct UsbIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub usage_page: u16,
    pub usage: u16,
}

impl Default for UsbIdentity {
    fn default() -> Self {
        Self {
            vendor_id: 0x574C,
            product_id: 0xE6E3,
            usage_page: 0xFF60,
            usage: 0x61,
        }
    }
}

/// What the board shows
#[derive(Serialize, Deserialize, clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Whole board orange while the agent waits, dark otherwise
    #[default]
    Ambient,
    /// One LED per agent session
    Sessions,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct SessionTimeouts {
    pub dim_after_secs: u64,
    pub release_after_secs: u64,
    pub cleanup_every_secs: u64,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            dim_after_secs: 300,
            release_after_secs: 600,
            cleanup_every_secs: 30,
        }
    }
}

impl SessionTimeouts {
    pub fn dim_after(&self) -> Duration {
        Duration::from_secs(self.dim_after_secs)
    }

    pub fn release_after(&self) -> Duration {
        Duration::from_secs(self.release_after_secs)
    }

    pub fn cleanup_every(&self) -> Duration {
        Duration::from_secs(self.cleanup_every_secs)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Append-only record log written by the hooks
    pub event_log: PathBuf,
    /// Delay between event log polls
    pub poll_interval_ms: u64,
    /// How long a command may wait for its response
    pub response_timeout_ms: u64,
    pub device: UsbIdentity,
    pub mode: DisplayMode,
    /// Agent needs input
    pub attention_color: Hsv,
    /// Session LED while the agent works or the session is idle
    pub dim_color: Hsv,
    pub sessions: SessionTimeouts,
    /// Agent settings file the hooks are registered in
    pub settings_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let settings_path = dirs::home_dir()
            .map(|home| home.join(".claude").join("settings.json"))
            .unwrap_or_else(|| PathBuf::from(".claude/settings.json"));

        Self {
            event_log: PathBuf::from(DEFAULT_EVENT_LOG),
            poll_interval_ms: 50,
            response_timeout_ms: 500,
            device: UsbIdentity::default(),
            mode: DisplayMode::default(),
            attention_color: Hsv::new(9, 255, 200),
            dim_color: Hsv::new(9, 255, 80),
            sessions: SessionTimeouts::default(),
            settings_path,
        }
    }
}

impl Config {
    /// `~/.config/keylight/config.json` on every platform
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("keylight").join("config.json"))
    }

    /// Loads `path`, or the default location when `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Ok(Self::default());
        };
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}
