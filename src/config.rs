//! Capture configuration.
//!
//! Stored in the platform-appropriate config directory:
//!   macOS:   ~/Library/Application Support/chatshot/capture.json
//!   Linux:   ~/.config/chatshot/capture.json
//!   Windows: %APPDATA%/chatshot/capture.json
//!
//! Every field is optional in the file. Environment variables override the
//! file: `CHATSHOT_COMPAT_MODE`, `CHATSHOT_PRIMARY_MIN_BYTES`,
//! `CHATSHOT_FALLBACK_MIN_BYTES`.

use crate::capture::compat::CompatibilityMode;
use crate::capture::encode::FallbackChain;
use crate::capture::model::FrameSize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// PNG output smaller than this is suspect and the JPEG tiers are tried.
    pub primary_min_bytes: usize,
    /// Floor for the JPEG tiers; nothing smaller is ever returned.
    pub fallback_min_bytes: usize,
    pub high_jpeg_quality: u8,
    pub low_jpeg_quality: u8,
    pub high_res_probe: FrameSize,
    pub low_res_probe: FrameSize,
    /// Minimum frame size requested for an actual capture.
    pub capture_floor: FrameSize,
    /// Skips HDR detection when set.
    pub force_mode: Option<CompatibilityMode>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            primary_min_bytes: 1000,
            fallback_min_bytes: 500,
            high_jpeg_quality: 90,
            low_jpeg_quality: 50,
            high_res_probe: FrameSize::new(3840, 2160),
            low_res_probe: FrameSize::new(150, 150),
            capture_floor: FrameSize::new(3840, 2160),
            force_mode: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    Env { key: &'static str, value: String },
}

/// Default location of the config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatshot")
        .join("capture.json")
}

impl CaptureConfig {
    /// Loads the default config file (if present) and applies env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(&config_path())?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Reads `path`. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("[CONFIG] No config at {} — using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!("[CONFIG] Loaded {}", path.display());
        Ok(config)
    }

    /// Applies overrides looked up through `lookup` (normally the process env).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("CHATSHOT_COMPAT_MODE").filter(|v| !v.trim().is_empty()) {
            self.force_mode = Some(value.parse().map_err(|_| ConfigError::Env {
                key: "CHATSHOT_COMPAT_MODE",
                value: value.clone(),
            })?);
        }
        if let Some(value) = lookup("CHATSHOT_PRIMARY_MIN_BYTES") {
            self.primary_min_bytes = parse_bytes("CHATSHOT_PRIMARY_MIN_BYTES", &value)?;
        }
        if let Some(value) = lookup("CHATSHOT_FALLBACK_MIN_BYTES") {
            self.fallback_min_bytes = parse_bytes("CHATSHOT_FALLBACK_MIN_BYTES", &value)?;
        }
        Ok(())
    }

    /// The PNG → JPEG high → JPEG low chain with this config's floors.
    pub fn fallback_chain(&self) -> FallbackChain {
        FallbackChain::standard(
            self.primary_min_bytes,
            self.fallback_min_bytes,
            self.high_jpeg_quality,
            self.low_jpeg_quality,
        )
    }
}

fn parse_bytes(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        key,
        value: value.to_string(),
    })
}
