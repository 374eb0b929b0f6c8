//! Core data types shared by every stage of the capture pipeline.
//!
//! Nothing in here talks to the OS. Display and source values are created
//! fresh by each topology read or enumeration and never mutated afterwards.

use image::RgbaImage;
use serde::Serialize;
use std::sync::Arc;

/// Rectangle in virtual-desktop coordinates (logical pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Smallest rectangle containing every input rectangle.
    ///
    /// Returns `None` for an empty iterator.
    pub fn bounding_box<'a>(rects: impl IntoIterator<Item = &'a Rect>) -> Option<Rect> {
        let mut iter = rects.into_iter();
        let first = iter.next()?;
        let (mut left, mut top) = (first.x as i64, first.y as i64);
        let (mut right, mut bottom) = (first.right(), first.bottom());

        for r in iter {
            left = left.min(r.x as i64);
            top = top.min(r.y as i64);
            right = right.max(r.right());
            bottom = bottom.max(r.bottom());
        }

        Some(Rect {
            x: left as i32,
            y: top as i32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}

/// Requested or computed frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One physical or logical display as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayDescriptor {
    pub id: u64,
    pub bounds: Rect,
    pub scale_factor: f64,
    /// Bits per pixel (24 for 8-bit RGB, 30 for 10-bit).
    pub color_depth: u32,
    pub color_space: String,
    pub is_primary: bool,
}

impl DisplayDescriptor {
    /// Resolution in physical pixels (bounds × scale factor).
    pub fn physical_size(&self) -> FrameSize {
        FrameSize {
            width: (self.bounds.width as f64 * self.scale_factor).round() as u32,
            height: (self.bounds.height as f64 * self.scale_factor).round() as u32,
        }
    }
}

/// Crop rectangle normalized to `[0, 1]` against a combined frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub const FULL: CropRect = CropRect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    /// Normalizes `inner` against `outer`. `outer` must have non-zero size.
    pub fn normalized(inner: &Rect, outer: &Rect) -> CropRect {
        let (ow, oh) = (outer.width as f64, outer.height as f64);
        CropRect {
            x: (inner.x as i64 - outer.x as i64) as f64 / ow,
            y: (inner.y as i64 - outer.y as i64) as f64 / oh,
            width: inner.width as f64 / ow,
            height: inner.height as f64 / oh,
        }
    }

    /// Maps the normalized rectangle back into the coordinate space of `outer`.
    pub fn to_absolute(&self, outer: &Rect) -> Rect {
        let (ow, oh) = (outer.width as f64, outer.height as f64);
        Rect {
            x: outer.x + (self.x * ow).round() as i32,
            y: outer.y + (self.y * oh).round() as i32,
            width: (self.width * ow).round() as u32,
            height: (self.height * oh).round() as u32,
        }
    }

    /// Maps the rectangle onto a frame of the given pixel size.
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
        let (fw, fh) = (frame_width as f64, frame_height as f64);
        let x = (self.x * fw).round().clamp(0.0, fw) as u32;
        let y = (self.y * fh).round().clamp(0.0, fh) as u32;
        let w = ((self.width * fw).round() as u32).min(frame_width - x);
        let h = ((self.height * fh).round() as u32).min(frame_height - y);
        (x, y, w, h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Screen,
    Window,
}

/// Frame pixels returned with a source. Clones share the same buffer.
#[derive(Clone)]
pub struct CaptureFrame {
    pixels: Arc<RgbaImage>,
}

impl CaptureFrame {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    pub fn empty() -> Self {
        Self::new(RgbaImage::new(0, 0))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.width() == 0 || self.pixels.height() == 0
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

impl std::fmt::Debug for CaptureFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CaptureFrame({}x{})", self.width(), self.height())
    }
}

/// One capturable unit from an enumeration pass.
#[derive(Debug, Clone)]
pub struct CaptureSource {
    pub id: String,
    pub name: String,
    pub display_id: Option<u64>,
    pub kind: SourceKind,
    pub frame: CaptureFrame,
}

/// Per-display view carved out of a combined "entire desktop" source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualSource {
    pub id: String,
    pub name: String,
    pub original_source_id: String,
    pub original_source_name: String,
    pub crop_rect: CropRect,
    pub target_display_id: u64,
    pub display_bounds: Rect,
}

/// A capture target: either a source the host exposes or a synthesized view.
#[derive(Debug, Clone)]
pub enum Source {
    Physical(CaptureSource),
    Virtual(VirtualSource),
}

impl Source {
    pub fn id(&self) -> &str {
        match self {
            Source::Physical(s) => &s.id,
            Source::Virtual(v) => &v.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Source::Physical(s) => &s.name,
            Source::Virtual(v) => &v.name,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Source::Physical(_) => "physical",
            Source::Virtual(_) => "virtual",
        }
    }
}

/// Final output handed to the caller.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// `data:<mime>;base64,<payload>`
    pub data_url: String,
    /// Length of the encoded image bytes (before base64).
    pub byte_len: usize,
    /// Label of the encoder tier that produced the bytes, e.g. `jpeg-q90`.
    pub encoding: String,
    pub source_id: String,
    /// Set for virtual sources; the consumer crops the combined frame.
    pub crop: Option<CropRect>,
    pub target_display_id: Option<u64>,
}
