//! Frame encoders and the cascading fallback chain.
//!
//! Encoders are pure: pixels in, bytes out. The chain tries each tier in
//! order and accepts the first output that clears that tier's byte floor.
//! Undersized output is the usual symptom of a broken high-bit-depth
//! composition path (blank or transparent frames compress to almost nothing).

use super::error::{CaptureError, CaptureResult};
use super::model::CaptureFrame;
use base64::{engine::general_purpose::STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::sync::Arc;

/// Encoded bytes plus their MIME type.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl EncodedFrame {
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Frame is empty")]
    EmptyFrame,

    #[error("{format} encoding failed: {message}")]
    Codec {
        format: &'static str,
        message: String,
    },
}

/// One tier of the fallback chain.
pub trait FrameEncoder: Send + Sync {
    fn label(&self) -> String;

    fn encode(&self, frame: &CaptureFrame) -> Result<EncodedFrame, EncodeError>;
}

/// Lossless PNG: the primary tier.
pub struct PngEncoder;

impl FrameEncoder for PngEncoder {
    fn label(&self) -> String {
        "png".into()
    }

    fn encode(&self, frame: &CaptureFrame) -> Result<EncodedFrame, EncodeError> {
        if frame.is_empty() {
            return Err(EncodeError::EmptyFrame);
        }

        let mut bytes: Vec<u8> = Vec::new();
        frame
            .pixels()
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| EncodeError::Codec {
                format: "PNG",
                message: e.to_string(),
            })?;

        Ok(EncodedFrame {
            mime: "image/png",
            bytes,
        })
    }
}

/// JPEG at a fixed quality (1-100). Alpha is dropped.
pub struct JpegQualityEncoder {
    pub quality: u8,
}

impl FrameEncoder for JpegQualityEncoder {
    fn label(&self) -> String {
        format!("jpeg-q{}", self.quality)
    }

    fn encode(&self, frame: &CaptureFrame) -> Result<EncodedFrame, EncodeError> {
        if frame.is_empty() {
            return Err(EncodeError::EmptyFrame);
        }

        let rgb = DynamicImage::ImageRgba8(frame.pixels().clone()).to_rgb8();
        let mut bytes: Vec<u8> = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.quality.clamp(1, 100))
            .encode_image(&rgb)
            .map_err(|e| EncodeError::Codec {
                format: "JPEG",
                message: e.to_string(),
            })?;

        Ok(EncodedFrame {
            mime: "image/jpeg",
            bytes,
        })
    }
}

/// A chain tier: the encoder and the minimum output size it must reach to be
/// accepted without trying the next tier.
pub struct Tier {
    pub encoder: Arc<dyn FrameEncoder>,
    pub min_bytes: usize,
}

/// Result of a successful chain run.
#[derive(Debug, Clone)]
pub struct ChainOutput {
    pub label: String,
    pub frame: EncodedFrame,
}

/// Ordered encoder tiers with a uniform acceptance rule.
#[derive(Clone)]
pub struct FallbackChain {
    tiers: Arc<Vec<Tier>>,
    /// Output below this is never returned.
    accept_floor: usize,
}

impl FallbackChain {
    pub fn new(tiers: Vec<Tier>, accept_floor: usize) -> Self {
        Self {
            tiers: Arc::new(tiers),
            accept_floor,
        }
    }

    /// PNG (floor `primary_min`) → JPEG q`high` → JPEG q`low` (floor `fallback_min`).
    pub fn standard(primary_min: usize, fallback_min: usize, high: u8, low: u8) -> Self {
        Self::new(
            vec![
                Tier {
                    encoder: Arc::new(PngEncoder),
                    min_bytes: primary_min,
                },
                Tier {
                    encoder: Arc::new(JpegQualityEncoder { quality: high }),
                    min_bytes: fallback_min,
                },
                Tier {
                    encoder: Arc::new(JpegQualityEncoder { quality: low }),
                    min_bytes: fallback_min,
                },
            ],
            fallback_min,
        )
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Runs the tiers in order.
    ///
    /// The first output meeting its tier's floor wins. Otherwise the earliest
    /// output at or above the accept floor is returned with a warning. If no
    /// tier gets that far the chain is exhausted.
    pub fn run(&self, frame: &CaptureFrame) -> CaptureResult<ChainOutput> {
        let mut candidate: Option<ChainOutput> = None;

        for tier in self.tiers.iter() {
            let label = tier.encoder.label();
            let start = std::time::Instant::now();

            match tier.encoder.encode(frame) {
                Ok(encoded) if encoded.bytes.len() >= tier.min_bytes => {
                    log::info!(
                        "[ENCODE] {} accepted: {} bytes in {}ms",
                        label,
                        encoded.bytes.len(),
                        start.elapsed().as_millis()
                    );
                    return Ok(ChainOutput {
                        label,
                        frame: encoded,
                    });
                }
                Ok(encoded) => {
                    let len = encoded.bytes.len();
                    if len >= self.accept_floor && candidate.is_none() {
                        log::warn!(
                            "[ENCODE] {} produced {} bytes (< {}) — kept as candidate, trying next tier",
                            label,
                            len,
                            tier.min_bytes
                        );
                        candidate = Some(ChainOutput {
                            label,
                            frame: encoded,
                        });
                    } else {
                        log::warn!(
                            "[ENCODE] {} produced {} bytes (< {}) — discarded",
                            label,
                            len,
                            tier.min_bytes
                        );
                    }
                }
                Err(e) => {
                    log::warn!("[ENCODE] {} failed: {}", label, e);
                }
            }
        }

        match candidate {
            Some(output) => {
                log::warn!(
                    "[ENCODE] Accepting undersized {} output ({} bytes)",
                    output.label,
                    output.frame.bytes.len()
                );
                Ok(output)
            }
            None => Err(CaptureError::EncodingExhausted {
                tiers: self.tiers.len(),
            }),
        }
    }
}
