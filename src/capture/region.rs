//! Consumer-side cropping of combined captures: functional core.
//!
//! Virtual sources come back as the full combined frame plus a normalized
//! crop rect. This module turns that pair into the per-display image.
//! It takes pixel data in, returns pixel data out.

use super::model::{CapturedImage, CropRect};
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Decodes a `data:<mime>;base64,<payload>` URL into an image.
pub fn decode_data_url(data_url: &str) -> Result<DynamicImage, CropError> {
    let payload = data_url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, payload)| payload)
        .ok_or(CropError::NotDataUrl)?;

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| CropError::DecodingFailed(e.to_string()))?;

    image::load_from_memory(&bytes).map_err(|e| CropError::DecodingFailed(e.to_string()))
}

/// Crops `image` to the normalized rectangle.
pub fn apply_crop(image: &DynamicImage, crop: &CropRect) -> Result<DynamicImage, CropError> {
    let in_range = |v: f64| (0.0..=1.0).contains(&v);
    if !(in_range(crop.x)
        && in_range(crop.y)
        && crop.x + crop.width <= 1.0 + 1e-9
        && crop.y + crop.height <= 1.0 + 1e-9)
    {
        return Err(CropError::OutOfBounds { requested: *crop });
    }

    let (x, y, width, height) = crop.to_pixels(image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(CropError::ZeroDimension);
    }

    Ok(image.crop_imm(x, y, width, height))
}

/// Decodes the capture, applies its crop (if any) and re-encodes as PNG.
pub fn captured_to_png_bytes(captured: &CapturedImage) -> Result<Vec<u8>, CropError> {
    let image = decode_data_url(&captured.data_url)?;
    let image = match &captured.crop {
        Some(crop) => apply_crop(&image, crop)?,
        None => image,
    };

    let mut png_bytes: Vec<u8> = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .map_err(|e| CropError::EncodingFailed(e.to_string()))?;

    Ok(png_bytes)
}

#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("Not a base64 data URL")]
    NotDataUrl,

    #[error("Image decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Crop rectangle has zero width or height")]
    ZeroDimension,

    #[error(
        "Crop rectangle ({:.4},{:.4},{:.4},{:.4}) exceeds the unit square",
        .requested.x, .requested.y, .requested.width, .requested.height
    )]
    OutOfBounds { requested: CropRect },

    #[error("PNG encoding failed: {0}")]
    EncodingFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

    fn png_data_url(img: &DynamicImage) -> String {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(&bytes))
    }

    #[test]
    fn crop_right_half() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(100, 50, |x, _| {
            if x < 50 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        }));
        let crop = CropRect {
            x: 0.5,
            y: 0.0,
            width: 0.5,
            height: 1.0,
        };
        let cropped = apply_crop(&img, &crop).unwrap();
        assert_eq!(cropped.dimensions(), (50, 50));
        assert_eq!(cropped.get_pixel(0, 0), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn crop_zero_dimension_fails() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(100, 100));
        let crop = CropRect {
            x: 0.2,
            y: 0.2,
            width: 0.0,
            height: 0.5,
        };
        assert!(matches!(apply_crop(&img, &crop), Err(CropError::ZeroDimension)));
    }

    #[test]
    fn crop_out_of_bounds_fails() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(100, 100));
        let crop = CropRect {
            x: 0.8,
            y: 0.8,
            width: 0.3,
            height: 0.3,
        };
        assert!(matches!(
            apply_crop(&img, &crop),
            Err(CropError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn decodes_png_data_url() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(12, 7));
        let decoded = decode_data_url(&png_data_url(&img)).unwrap();
        assert_eq!(decoded.dimensions(), (12, 7));
    }

    #[test]
    fn rejects_non_data_url() {
        assert!(matches!(
            decode_data_url("https://example.com/a.png"),
            Err(CropError::NotDataUrl)
        ));
    }

    #[test]
    fn captured_virtual_image_is_cropped() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(448, 144));
        let captured = CapturedImage {
            data_url: png_data_url(&img),
            byte_len: 0,
            encoding: "png".into(),
            source_id: "screen:0:0".into(),
            crop: Some(CropRect {
                x: 192.0 / 448.0,
                y: 0.0,
                width: 256.0 / 448.0,
                height: 1.0,
            }),
            target_display_id: Some(2),
        };
        let png = captured_to_png_bytes(&captured).unwrap();
        assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.dimensions(), (256, 144));
    }
}
