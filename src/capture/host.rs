//! Host capture API boundary.
//!
//! The pipeline never talks to the OS directly. A backend implements these
//! two traits: one for the physical display list and one for capture-source
//! enumeration. `xcap_host` is the desktop backend; tests plug in fakes.

use super::model::{CaptureFrame, FrameSize, Rect, SourceKind};
use async_trait::async_trait;

/// Display as the host reports it, before primary detection.
#[derive(Debug, Clone, PartialEq)]
pub struct HostDisplay {
    pub id: u64,
    pub bounds: Rect,
    pub scale_factor: f64,
    pub color_depth: u32,
    pub color_space: String,
}

/// Parameters for one enumeration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    pub kinds: Vec<SourceKind>,
    /// Frames are scaled to fit inside this box.
    pub frame_size: FrameSize,
}

impl SourceRequest {
    pub fn screens(frame_size: FrameSize) -> Self {
        Self {
            kinds: vec![SourceKind::Screen],
            frame_size,
        }
    }

    pub fn screens_and_windows(frame_size: FrameSize) -> Self {
        Self {
            kinds: vec![SourceKind::Screen, SourceKind::Window],
            frame_size,
        }
    }
}

/// Source as the host reports it. `display_id` is the raw metadata string
/// and may be empty or garbage.
#[derive(Debug, Clone)]
pub struct RawSource {
    pub id: String,
    pub name: String,
    pub display_id: Option<String>,
    pub kind: SourceKind,
    pub frame: CaptureFrame,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    #[error("Screen capture permission denied: {0}")]
    PermissionDenied(String),

    #[error("Host capture API failed: {0}")]
    Backend(String),
}

/// Physical display list of the host.
#[async_trait]
pub trait DisplayProvider: Send + Sync {
    async fn displays(&self) -> Result<Vec<HostDisplay>, HostError>;

    /// Id of the display the host designates as primary.
    async fn primary_display_id(&self) -> Result<u64, HostError>;
}

/// Capture-source enumeration. Every call returns fresh frames; frames from
/// an earlier call show stale content.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn get_sources(&self, request: &SourceRequest) -> Result<Vec<RawSource>, HostError>;
}
