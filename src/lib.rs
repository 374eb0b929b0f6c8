//! chatshot: screenshot core for the AI game-chat generator.
//!
//! This crate wires together:
//! - Screen capture domain (capture/): enumeration, selection, HDR-safe encoding
//! - Capture configuration (config.rs)
//!
//! The UI and the AI call sit outside; they consume
//! [`capture::ScreenshotOrchestrator`] and the data URL it returns.

pub mod capture;
pub mod config;

use capture::compat::{ColorCompatibilityAdvisor, CompatibilityProfile};
use capture::host::DisplayProvider;
use capture::topology::DisplayTopology;
use config::CaptureConfig;
use std::sync::Arc;

/// Compatibility profile for renderer construction.
///
/// Call once at startup, before any renderer exists, and pass the returned
/// launch flags to whatever builds it. A topology failure yields the safe
/// profile.
pub async fn launch_profile(
    displays: Arc<dyn DisplayProvider>,
    config: &CaptureConfig,
) -> CompatibilityProfile {
    let topology = DisplayTopology::new(displays);
    let displays = match topology.list_displays().await {
        Ok(displays) => displays,
        Err(e) => {
            log::warn!("[COMPAT] {} — launching with safe profile", e);
            Vec::new()
        }
    };

    ColorCompatibilityAdvisor::initialize(&displays, config.force_mode, config.fallback_chain())
        .profile()
        .clone()
}
