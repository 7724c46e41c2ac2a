//! Raster image encoding for PDF embedding.
//!
//! Every accepted image (PNG, JPEG, GIF) is decoded once, flattened onto a
//! white background and re-encoded as a quality 95 baseline JPEG, so the
//! embedded result does not depend on the source format. The JPEG bytes are
//! carried in an image XObject with the `DCTDecode` filter.

use crate::error::{Error, Result};
use crate::object::{dict, name, Dictionary, Object};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageFormat, RgbImage};

/// JPEG quality used for every embedded image.
pub const JPEG_QUALITY: u8 = 95;

/// Source formats accepted for embedding.
pub const SUPPORTED_FORMATS: [ImageFormat; 3] = [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::Gif];

/// A decoded image re-encoded as JPEG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Baseline JPEG bytes (DeviceRGB, 8 bits per component)
    pub data: Vec<u8>,
}

impl JpegImage {
    /// Decode `bytes` (PNG, JPEG or GIF, sniffed from the content) and
    /// re-encode them.
    pub fn encode(bytes: &[u8]) -> Result<Self> {
        let format = image::guess_format(bytes)
            .map_err(|_| Error::Image("unrecognized image format".to_string()))?;
        if !SUPPORTED_FORMATS.contains(&format) {
            return Err(Error::Image(format!("unsupported image format {:?}", format)));
        }

        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| Error::Image(format!("failed to decode image: {}", e)))?;
        let rgb = flatten_onto_white(decoded);
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::Image("image has no pixels".to_string()));
        }

        let mut data = Vec::new();
        JpegEncoder::new_with_quality(&mut data, JPEG_QUALITY)
            .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
            .map_err(|e| Error::Image(format!("failed to encode JPEG: {}", e)))?;

        log::debug!(
            "Encoded {:?} image {}x{} as {} bytes of JPEG",
            format,
            width,
            height,
            data.len()
        );
        Ok(Self { width, height, data })
    }

    /// Image XObject dictionary for this image.
    pub fn xobject_dict(&self) -> Dictionary {
        dict([
            ("Type", name("XObject")),
            ("Subtype", name("Image")),
            ("Width", Object::Integer(i64::from(self.width))),
            ("Height", Object::Integer(i64::from(self.height))),
            ("ColorSpace", name("DeviceRGB")),
            ("BitsPerComponent", Object::Integer(8)),
            ("Filter", name("DCTDecode")),
            ("Length", Object::Integer(self.data.len() as i64)),
        ])
    }

    /// Image XObject stream.
    pub fn into_xobject(self) -> Object {
        let dict = self.xobject_dict();
        Object::stream(dict, self.data)
    }
}

/// Composite any alpha channel over white.
fn flatten_onto_white(image: DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.into_rgb8();
    }
    let rgba = image.into_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (out, pixel) in rgb.pixels_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = pixel.0;
        let a = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        out.0 = [blend(r), blend(g), blend(b)];
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32, pixel: Rgba<u8>) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, pixel);
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_encode_png() {
        let jpeg = JpegImage::encode(&png(4, 3, Rgba([255, 0, 0, 255]))).unwrap();
        assert_eq!((jpeg.width, jpeg.height), (4, 3));
        assert_eq!(&jpeg.data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let rgb = flatten_onto_white(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            1,
            1,
            Rgba([0, 0, 0, 0]),
        )));
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);

        let half = flatten_onto_white(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            1,
            1,
            Rgba([0, 0, 0, 128]),
        )));
        assert_eq!(half.get_pixel(0, 0).0, [127, 127, 127]);
    }

    #[test]
    fn test_rejects_unknown_bytes() {
        assert!(matches!(JpegImage::encode(b"plain text"), Err(Error::Image(_))));
    }

    #[test]
    fn test_xobject_dict() {
        let jpeg = JpegImage {
            width: 10,
            height: 20,
            data: vec![0xFF, 0xD8, 0xFF, 0xD9],
        };
        let dict = jpeg.xobject_dict();
        assert_eq!(dict.get("Filter"), Some(&name("DCTDecode")));
        assert_eq!(dict.get("ColorSpace"), Some(&name("DeviceRGB")));
        assert_eq!(dict.get("Length"), Some(&Object::Integer(4)));
        assert_eq!(dict.get("Height"), Some(&Object::Integer(20)));
    }
}
