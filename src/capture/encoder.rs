//! High-resolution capture of a chosen source.
//!
//! Enumeration frames are thumbnails and go stale, so every capture
//! re-enumerates at full size, finds the source again and encodes that
//! fresh frame.

use super::catalog::screens_only;
use super::compat::ColorCompatibilityAdvisor;
use super::error::{CaptureError, CaptureResult};
use super::host::{SourceProvider, SourceRequest};
use super::model::{CaptureFrame, CaptureSource, CapturedImage, FrameSize, VirtualSource};
use std::sync::Arc;

#[derive(Clone)]
pub struct CaptureEncoder {
    provider: Arc<dyn SourceProvider>,
    advisor: ColorCompatibilityAdvisor,
    /// Smallest frame size ever requested for a capture.
    floor: FrameSize,
}

impl CaptureEncoder {
    pub fn new(
        provider: Arc<dyn SourceProvider>,
        advisor: ColorCompatibilityAdvisor,
        floor: FrameSize,
    ) -> Self {
        Self {
            provider,
            advisor,
            floor,
        }
    }

    /// `max(floor, 2 × primary)` in each dimension.
    pub fn capture_size(&self, primary: FrameSize) -> FrameSize {
        FrameSize::new(
            self.floor.width.max(primary.width.saturating_mul(2)),
            self.floor.height.max(primary.height.saturating_mul(2)),
        )
    }

    pub async fn capture_physical(
        &self,
        source: &CaptureSource,
        primary: FrameSize,
    ) -> CaptureResult<CapturedImage> {
        self.capture_by_key(&source.id, &source.name, primary).await
    }

    /// Captures the combined source behind `virtual_source`. The full frame is
    /// returned with the crop rect attached.
    pub async fn capture_virtual(
        &self,
        virtual_source: &VirtualSource,
        primary: FrameSize,
    ) -> CaptureResult<CapturedImage> {
        let mut image = self
            .capture_by_key(
                &virtual_source.original_source_id,
                &virtual_source.original_source_name,
                primary,
            )
            .await?;
        image.crop = Some(virtual_source.crop_rect);
        image.target_display_id = Some(virtual_source.target_display_id);
        Ok(image)
    }

    async fn capture_by_key(
        &self,
        id: &str,
        name: &str,
        primary: FrameSize,
    ) -> CaptureResult<CapturedImage> {
        let start = std::time::Instant::now();
        let size = self.capture_size(primary);
        let fresh = screens_only(
            self.provider
                .get_sources(&SourceRequest::screens(size))
                .await?,
        );

        let source = fresh
            .iter()
            .find(|s| s.id == id)
            .or_else(|| fresh.iter().find(|s| s.name == name))
            .ok_or_else(|| CaptureError::SourceVanished {
                id: id.to_string(),
                name: name.to_string(),
            })?;

        if source.frame.is_empty() {
            return Err(CaptureError::EmptyFrame(source.id.clone()));
        }

        log::info!(
            "[CAPTURE] Fetched {} at {}x{} in {}ms",
            source.id,
            source.frame.width(),
            source.frame.height(),
            start.elapsed().as_millis()
        );

        let image = self.encode(source.id.clone(), source.frame.clone()).await?;
        log::info!(
            "[CAPTURE] {} captured in {}ms total ({}, {} bytes)",
            image.source_id,
            start.elapsed().as_millis(),
            image.encoding,
            image.byte_len
        );
        Ok(image)
    }

    /// Runs the advisor's encoder chain on a blocking thread.
    pub async fn encode(&self, source_id: String, frame: CaptureFrame) -> CaptureResult<CapturedImage> {
        let advisor = self.advisor.clone();
        let output = tokio::task::spawn_blocking(move || advisor.encode_with_fallback(&frame))
            .await
            .map_err(|e| CaptureError::Task(e.to_string()))??;

        Ok(CapturedImage {
            data_url: output.frame.to_data_url(),
            byte_len: output.frame.bytes.len(),
            encoding: output.label,
            source_id,
            crop: None,
            target_display_id: None,
        })
    }
}
