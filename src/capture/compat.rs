//! Colour compatibility: HDR / wide-gamut detection and what it implies.
//!
//! A single [`CompatibilityMode`] is derived from display metadata once per
//! initialization. It controls three things: the frame size requested for
//! source probing, the renderer launch switches, and how aggressively frames
//! are normalized before going through the encoder chain.

use super::encode::{ChainOutput, FallbackChain};
use super::error::CaptureResult;
use super::model::{CaptureFrame, DisplayDescriptor, FrameSize};
use image::{imageops::FilterType, DynamicImage};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompatibilityMode {
    Standard,
    HdrSafe,
    Safe,
}

impl CompatibilityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompatibilityMode::Standard => "standard",
            CompatibilityMode::HdrSafe => "hdr-safe",
            CompatibilityMode::Safe => "safe",
        }
    }
}

impl std::fmt::Display for CompatibilityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CompatibilityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(CompatibilityMode::Standard),
            "hdr-safe" | "hdr_safe" | "hdrsafe" => Ok(CompatibilityMode::HdrSafe),
            "safe" => Ok(CompatibilityMode::Safe),
            other => Err(format!("unknown compatibility mode '{}'", other)),
        }
    }
}

/// Colour-space names that indicate HDR or a wide gamut.
static WIDE_GAMUT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)rec2020|bt2020|p3|dci-p3|display-p3|hlg|pq|hdr10|dolby|wide|extended")
        .unwrap()
});

/// Colour-space names that advertise a bit depth ("10-bit", "bt709 10").
static BIT_DEPTH_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)10|bit").unwrap());

/// Why a display tripped HDR detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum HdrSignal {
    ColorDepth { bits: u32 },
    WideGamutColorSpace { color_space: String },
    BitDepthColorSpace { color_space: String },
    HighDpiHighResolution { scale_factor: f64, width: u32, height: u32 },
    HighResolution { width: u32, height: u32 },
}

impl HdrSignal {
    /// Metadata signals are definite; resolution heuristics are only suspicion.
    pub fn is_suspected(&self) -> bool {
        matches!(
            self,
            HdrSignal::HighDpiHighResolution { .. } | HdrSignal::HighResolution { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplaySignals {
    pub display_id: u64,
    pub signals: Vec<HdrSignal>,
}

/// Outcome of mode derivation, kept for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityReport {
    pub mode: CompatibilityMode,
    pub hdr_detected: bool,
    pub hdr_suspected: bool,
    pub forced: bool,
    pub displays: Vec<DisplaySignals>,
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DerivationError {
    #[error("no displays to inspect")]
    NoDisplays,

    #[error("display {0} has zero-sized bounds")]
    ZeroBounds(u64),

    #[error("display {id} has invalid scale factor {scale}")]
    InvalidScale { id: u64, scale: f64 },
}

/// HDR signals for one display.
///
/// Resolution thresholds apply to physical pixels (bounds × scale factor).
pub fn display_signals(display: &DisplayDescriptor) -> Result<Vec<HdrSignal>, DerivationError> {
    if display.bounds.width == 0 || display.bounds.height == 0 {
        return Err(DerivationError::ZeroBounds(display.id));
    }
    if !display.scale_factor.is_finite() || display.scale_factor < 1.0 {
        return Err(DerivationError::InvalidScale {
            id: display.id,
            scale: display.scale_factor,
        });
    }

    let mut signals = Vec::new();

    if display.color_depth >= 30 {
        signals.push(HdrSignal::ColorDepth {
            bits: display.color_depth,
        });
    }
    if WIDE_GAMUT_PATTERN.is_match(&display.color_space) {
        signals.push(HdrSignal::WideGamutColorSpace {
            color_space: display.color_space.clone(),
        });
    }
    if BIT_DEPTH_PATTERN.is_match(&display.color_space) {
        signals.push(HdrSignal::BitDepthColorSpace {
            color_space: display.color_space.clone(),
        });
    }

    let FrameSize { width, height } = display.physical_size();
    let above_qhd = width > 2560 && height > 1440;

    if display.scale_factor > 1.5 && above_qhd {
        signals.push(HdrSignal::HighDpiHighResolution {
            scale_factor: display.scale_factor,
            width,
            height,
        });
    }
    if (width >= 3840 && height >= 2160) || above_qhd {
        signals.push(HdrSignal::HighResolution { width, height });
    }

    Ok(signals)
}

/// Derives the mode from every display. Any display with a signal makes the
/// whole session `hdr-safe`; a derivation error makes it `safe`.
pub fn derive_mode(displays: &[DisplayDescriptor]) -> CompatibilityReport {
    let per_display: Result<Vec<DisplaySignals>, DerivationError> = if displays.is_empty() {
        Err(DerivationError::NoDisplays)
    } else {
        displays
            .iter()
            .map(|d| {
                display_signals(d).map(|signals| DisplaySignals {
                    display_id: d.id,
                    signals,
                })
            })
            .collect()
    };

    match per_display {
        Ok(per_display) => {
            let all = || per_display.iter().flat_map(|d| d.signals.iter());
            let hdr_detected = all().any(|s| !s.is_suspected());
            let hdr_suspected = all().any(|s| s.is_suspected());
            let mode = if hdr_detected || hdr_suspected {
                CompatibilityMode::HdrSafe
            } else {
                CompatibilityMode::Standard
            };
            CompatibilityReport {
                mode,
                hdr_detected,
                hdr_suspected,
                forced: false,
                displays: per_display,
                error: None,
            }
        }
        Err(e) => {
            log::warn!("[COMPAT] Mode derivation failed ({}) — using safe mode", e);
            CompatibilityReport {
                mode: CompatibilityMode::Safe,
                hdr_detected: false,
                hdr_suspected: false,
                forced: false,
                displays: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Chromium-style renderer switches for a mode.
///
/// Computed once at startup and handed to whatever builds the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchFlags {
    pub switches: Vec<String>,
    pub disabled_features: Vec<String>,
}

impl LaunchFlags {
    pub fn for_mode(mode: CompatibilityMode) -> Self {
        let mut switches = vec!["force-color-profile=srgb".to_string()];
        let mut disabled_features = vec!["UseHDRTransferFunction".to_string()];

        if matches!(mode, CompatibilityMode::HdrSafe | CompatibilityMode::Safe) {
            switches.extend(
                [
                    "disable-gpu-compositing",
                    "disable-gpu-rasterization",
                    "disable-zero-copy",
                    "disable-accelerated-video-decode",
                ]
                .map(String::from),
            );
            disabled_features.extend(
                ["DirectComposition", "DirectCompositionVideoOverlays", "HDRVideo"]
                    .map(String::from),
            );
        }
        if mode == CompatibilityMode::Safe {
            switches.push("disable-gpu".to_string());
        }

        Self {
            switches,
            disabled_features,
        }
    }

    /// `--switch` arguments, with the disabled features folded into one
    /// `--disable-features=` switch.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.switches.iter().map(|s| format!("--{}", s)).collect();
        if !self.disabled_features.is_empty() {
            args.push(format!(
                "--disable-features={}",
                self.disabled_features.join(",")
            ));
        }
        args
    }
}

/// Session-wide compatibility configuration returned by initialization.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityProfile {
    pub report: CompatibilityReport,
    pub launch_flags: LaunchFlags,
}

impl CompatibilityProfile {
    pub fn mode(&self) -> CompatibilityMode {
        self.report.mode
    }
}

/// Largest frame the safe mode hands to the encoder chain.
const SAFE_ENCODE_BOUNDS: FrameSize = FrameSize::new(1920, 1080);

/// Applies the session's compatibility mode to frame sizing and encoding.
#[derive(Clone)]
pub struct ColorCompatibilityAdvisor {
    profile: CompatibilityProfile,
    chain: FallbackChain,
}

impl ColorCompatibilityAdvisor {
    /// Derives the mode for `displays`, unless `forced` overrides it.
    pub fn initialize(
        displays: &[DisplayDescriptor],
        forced: Option<CompatibilityMode>,
        chain: FallbackChain,
    ) -> Self {
        let mut report = derive_mode(displays);
        if let Some(mode) = forced {
            log::info!("[COMPAT] Mode forced to {} (derived {})", mode, report.mode);
            report.mode = mode;
            report.forced = true;
        } else {
            log::info!(
                "[COMPAT] Mode {} (hdr detected: {}, suspected: {})",
                report.mode,
                report.hdr_detected,
                report.hdr_suspected
            );
        }

        let launch_flags = LaunchFlags::for_mode(report.mode);
        Self {
            profile: CompatibilityProfile {
                report,
                launch_flags,
            },
            chain,
        }
    }

    pub fn mode(&self) -> CompatibilityMode {
        self.profile.mode()
    }

    pub fn profile(&self) -> &CompatibilityProfile {
        &self.profile
    }

    /// Frame size to request when probing sources for `display`.
    pub fn optimal_frame_size(&self, display: &DisplayDescriptor) -> FrameSize {
        optimal_frame_size(self.mode(), display)
    }

    /// Normalizes the frame for the current mode, then runs the encoder chain.
    pub fn encode_with_fallback(&self, frame: &CaptureFrame) -> CaptureResult<ChainOutput> {
        let prepared = prepare_frame(self.mode(), frame);
        self.chain.run(&prepared)
    }
}

pub fn optimal_frame_size(mode: CompatibilityMode, display: &DisplayDescriptor) -> FrameSize {
    let (cap_w, cap_h) = match mode {
        CompatibilityMode::Safe => return FrameSize::new(640, 480),
        CompatibilityMode::HdrSafe => {
            let scale = if display.scale_factor.is_finite() && display.scale_factor >= 1.0 {
                display.scale_factor
            } else {
                1.0
            };
            (
                (800.0 / scale).floor() as u32,
                (600.0 / scale).floor() as u32,
            )
        }
        CompatibilityMode::Standard => (1280, 720),
    };

    FrameSize::new(
        display.bounds.width.min(cap_w).max(1),
        display.bounds.height.min(cap_h).max(1),
    )
}

/// hdr-safe: force opaque alpha. safe: also shrink to fit 1920×1080.
fn prepare_frame(mode: CompatibilityMode, frame: &CaptureFrame) -> CaptureFrame {
    if mode == CompatibilityMode::Standard || frame.is_empty() {
        return frame.clone();
    }

    let mut pixels = frame.pixels().clone();
    for px in pixels.pixels_mut() {
        px.0[3] = 255;
    }

    if mode == CompatibilityMode::Safe
        && (pixels.width() > SAFE_ENCODE_BOUNDS.width || pixels.height() > SAFE_ENCODE_BOUNDS.height)
    {
        pixels = DynamicImage::ImageRgba8(pixels)
            .resize(
                SAFE_ENCODE_BOUNDS.width,
                SAFE_ENCODE_BOUNDS.height,
                FilterType::Triangle,
            )
            .to_rgba8();
    }

    CaptureFrame::new(pixels)
}
