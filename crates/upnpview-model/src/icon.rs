use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bytes::Bytes;
use image::ImageFormat;

use crate::error::IconError;

/// A decoded device icon, ready to render.
///
/// Holds both the RGBA8 raster and the original PNG bytes, so a display layer
/// can either blit the pixels or hand the PNG to its own loader.
#[derive(Clone, PartialEq, Eq)]
pub struct Icon {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    encoded: Bytes,
}

impl Icon {
    /// Decode an icon from a base64-encoded PNG payload line.
    ///
    /// Pure and synchronous: no I/O happens here.
    pub fn decode(payload: &str) -> Result<Self, IconError> {
        let encoded = BASE64_STANDARD
            .decode(payload)
            .map_err(IconError::MalformedBase64)?;
        Self::from_png(encoded)
    }

    /// Decode an icon from raw PNG bytes.
    pub fn from_png(encoded: impl Into<Bytes>) -> Result<Self, IconError> {
        let encoded = encoded.into();
        let image = image::load_from_memory_with_format(&encoded, ImageFormat::Png)
            .map_err(IconError::MalformedImage)?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
            encoded,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGBA8 pixels, row-major, `width * height * 4` bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The PNG bytes this icon was decoded from.
    pub fn encoded(&self) -> &Bytes {
        &self.encoded
    }

    /// Base64 form of the PNG bytes, as carried on the wire.
    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.encoded)
    }
}

impl std::fmt::Debug for Icon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Icon")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("encoded_len", &self.encoded.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, Rgba, RgbaImage};

    use super::*;

    /// PNG bytes for a `width` x `height` image with a distinct first pixel.
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    pub(crate) fn png_base64(width: u32, height: u32) -> String {
        BASE64_STANDARD.encode(png_bytes(width, height))
    }

    #[test]
    fn decodes_valid_png_payload() {
        let icon = Icon::decode(&png_base64(4, 3)).unwrap();

        assert_eq!(icon.width(), 4);
        assert_eq!(icon.height(), 3);
        assert_eq!(icon.pixels().len(), 4 * 3 * 4);
        assert_eq!(&icon.pixels()[..4], &[255, 0, 0, 255]);
        assert_eq!(&icon.pixels()[4..8], &[10, 20, 30, 255]);
    }

    #[test]
    fn keeps_original_png_bytes() {
        let png = png_bytes(2, 2);
        let icon = Icon::from_png(png.clone()).unwrap();
        assert_eq!(icon.encoded().as_ref(), png.as_slice());
        assert_eq!(icon.to_base64(), BASE64_STANDARD.encode(&png));
    }

    #[test]
    fn rejects_invalid_base64() {
        let err = Icon::decode("not base64!").unwrap_err();
        assert!(matches!(err, IconError::MalformedBase64(_)));
    }

    #[test]
    fn rejects_bad_padding() {
        let err = Icon::decode("iVBORw0KGgo").unwrap_err();
        assert!(matches!(err, IconError::MalformedBase64(_)));
    }

    #[test]
    fn rejects_non_png_bytes() {
        let payload = BASE64_STANDARD.encode(b"GIF89a definitely not a png");
        let err = Icon::decode(&payload).unwrap_err();
        assert!(matches!(err, IconError::MalformedImage(_)));
    }

    #[test]
    fn rejects_truncated_png() {
        let png = png_bytes(8, 8);
        let payload = BASE64_STANDARD.encode(&png[..png.len() / 2]);
        let err = Icon::decode(&payload).unwrap_err();
        assert!(matches!(err, IconError::MalformedImage(_)));
    }

    #[test]
    fn empty_payload_is_not_an_image() {
        let err = Icon::decode("").unwrap_err();
        assert!(matches!(err, IconError::MalformedImage(_)));
    }

    #[test]
    fn debug_omits_pixel_data() {
        let icon = Icon::decode(&png_base64(1, 1)).unwrap();
        let rendered = format!("{icon:?}");
        assert!(rendered.contains("width: 1"));
        assert!(!rendered.contains("pixels"));
    }
}
