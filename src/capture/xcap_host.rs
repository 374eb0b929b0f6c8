//! Desktop host backend using the `xcap` crate.
//!
//! This is the infrastructure layer; it talks to the OS. Each monitor is
//! exposed as one screen source (`screen:<monitor id>:0`) associated with its
//! display; windows appear as `window:<id>:0` when requested.
//!
//! xcap reports no colour metadata, so displays are described as 24-bit sRGB
//! and HDR detection falls back to the resolution heuristics.

use super::host::{DisplayProvider, HostDisplay, HostError, RawSource, SourceProvider, SourceRequest};
use super::model::{CaptureFrame, FrameSize, Rect, SourceKind};
use async_trait::async_trait;
use image::{imageops::FilterType, DynamicImage, RgbaImage};
use xcap::{Monitor, Window};

const DEFAULT_COLOR_DEPTH: u32 = 24;
const DEFAULT_COLOR_SPACE: &str = "srgb";

#[derive(Debug, Default, Clone, Copy)]
pub struct XcapHost;

impl XcapHost {
    pub fn new() -> Self {
        Self
    }
}

fn backend(e: xcap::XCapError) -> HostError {
    HostError::Backend(e.to_string())
}

async fn blocking<T, F>(f: F) -> Result<T, HostError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, HostError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| HostError::Backend(format!("capture task failed: {}", e)))?
}

/// Shrinks `image` to fit inside `size`, keeping aspect ratio. Never upscales.
fn fit_to(image: RgbaImage, size: FrameSize) -> RgbaImage {
    if size.width == 0 || size.height == 0 {
        return RgbaImage::new(0, 0);
    }
    if image.width() <= size.width && image.height() <= size.height {
        return image;
    }
    DynamicImage::ImageRgba8(image)
        .resize(size.width, size.height, FilterType::Triangle)
        .to_rgba8()
}

fn list_monitors() -> Result<Vec<HostDisplay>, HostError> {
    let monitors = Monitor::all().map_err(backend)?;
    monitors
        .iter()
        .map(|m| {
            let scale = m.scale_factor().map_err(backend)? as f64;
            let scale = if scale >= 1.0 { scale } else { 1.0 };
            // xcap reports physical pixels; bounds are logical.
            let (width, height) = (m.width().map_err(backend)?, m.height().map_err(backend)?);
            Ok(HostDisplay {
                id: m.id().map_err(backend)? as u64,
                bounds: Rect::new(
                    m.x().map_err(backend)?,
                    m.y().map_err(backend)?,
                    (width as f64 / scale).round() as u32,
                    (height as f64 / scale).round() as u32,
                ),
                scale_factor: scale,
                color_depth: DEFAULT_COLOR_DEPTH,
                color_space: DEFAULT_COLOR_SPACE.to_string(),
            })
        })
        .collect()
}

fn primary_monitor_id() -> Result<u64, HostError> {
    let monitors = Monitor::all().map_err(backend)?;
    let primary = monitors
        .iter()
        .find(|m| m.is_primary().unwrap_or(false))
        .or_else(|| monitors.first())
        .ok_or_else(|| HostError::Backend("no monitors found".into()))?;
    Ok(primary.id().map_err(backend)? as u64)
}

fn enumerate(request: SourceRequest) -> Result<Vec<RawSource>, HostError> {
    let mut sources = Vec::new();

    if request.kinds.contains(&SourceKind::Screen) {
        let monitors = Monitor::all().map_err(backend)?;
        for (index, monitor) in monitors.iter().enumerate() {
            let id = monitor.id().map_err(backend)?;
            let name = monitor
                .name()
                .ok()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| format!("Screen {}", index + 1));

            let frame = match monitor.capture_image() {
                Ok(image) => CaptureFrame::new(fit_to(image, request.frame_size)),
                Err(e) => {
                    // Keep the source; an empty frame is rejected at capture time.
                    log::warn!("[XCAP] Monitor {} capture failed: {}", id, e);
                    CaptureFrame::empty()
                }
            };

            sources.push(RawSource {
                id: format!("screen:{}:0", id),
                name,
                display_id: Some(id.to_string()),
                kind: SourceKind::Screen,
                frame,
            });
        }
    }

    if request.kinds.contains(&SourceKind::Window) {
        // Window frames are never encoded, so no thumbnails are taken.
        for window in Window::all().map_err(backend)? {
            if window.is_minimized().unwrap_or(true) {
                continue;
            }
            let Ok(id) = window.id() else { continue };
            sources.push(RawSource {
                id: format!("window:{}:0", id),
                name: window.title().unwrap_or_default(),
                display_id: None,
                kind: SourceKind::Window,
                frame: CaptureFrame::empty(),
            });
        }
    }

    Ok(sources)
}

#[async_trait]
impl DisplayProvider for XcapHost {
    async fn displays(&self) -> Result<Vec<HostDisplay>, HostError> {
        blocking(list_monitors).await
    }

    async fn primary_display_id(&self) -> Result<u64, HostError> {
        blocking(primary_monitor_id).await
    }
}

#[async_trait]
impl SourceProvider for XcapHost {
    async fn get_sources(&self, request: &SourceRequest) -> Result<Vec<RawSource>, HostError> {
        let request = request.clone();
        let start = std::time::Instant::now();
        let sources = blocking(move || enumerate(request)).await?;
        log::debug!(
            "[XCAP] Enumerated {} sources in {}ms",
            sources.len(),
            start.elapsed().as_millis()
        );
        Ok(sources)
    }
}
