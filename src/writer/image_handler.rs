//! Image XObjects for signature appearances.
//!
//! Images are re-encoded as baseline JPEG at quality 100 and embedded with
//! the DCTDecode filter, so any format the `image` crate can decode works
//! as an appearance source. Alpha is dropped; the XObject is DeviceRGB.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage};

/// JPEG quality used for appearance images.
pub const JPEG_QUALITY: u8 = 100;

/// A JPEG-encoded RGB image ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Encoded JPEG bytes
    pub data: Vec<u8>,
}

impl JpegImage {
    /// Encode `image` as an RGB JPEG.
    ///
    /// # Errors
    ///
    /// `Error::Image` for an empty image or an encoder failure.
    pub fn encode(image: &DynamicImage) -> Result<Self> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::Image(format!("cannot embed a {}x{} image", width, height)));
        }

        let mut data = Vec::new();
        JpegEncoder::new_with_quality(&mut data, JPEG_QUALITY).encode(rgb.as_raw(), width, height, ColorType::Rgb8)?;

        log::debug!("Encoded {}x{} appearance image as {} JPEG bytes", width, height, data.len());
        Ok(Self { width, height, data })
    }

    /// Build the image XObject stream.
    pub fn to_xobject(&self) -> Object {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::Name("XObject".to_string()));
        dict.insert("Subtype".to_string(), Object::Name("Image".to_string()));
        dict.insert("Width".to_string(), Object::Integer(self.width as i64));
        dict.insert("Height".to_string(), Object::Integer(self.height as i64));
        dict.insert("ColorSpace".to_string(), Object::Name("DeviceRGB".to_string()));
        dict.insert("BitsPerComponent".to_string(), Object::Integer(8));
        dict.insert("Filter".to_string(), Object::Name("DCTDecode".to_string()));
        dict.insert("Length".to_string(), Object::Integer(self.data.len() as i64));

        Object::Stream {
            dict,
            data: bytes::Bytes::from(self.data.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn sample_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 128])))
    }

    #[test]
    fn test_encode_produces_jpeg() {
        let jpeg = JpegImage::encode(&sample_image(12, 8)).unwrap();
        assert_eq!((jpeg.width, jpeg.height), (12, 8));
        assert_eq!(&jpeg.data[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg.data[jpeg.data.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_xobject_dictionary() {
        let jpeg = JpegImage::encode(&sample_image(4, 3)).unwrap();
        let xobject = jpeg.to_xobject();
        let dict = xobject.as_dict().unwrap();

        let keys: Vec<&str> = dict.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["Type", "Subtype", "Width", "Height", "ColorSpace", "BitsPerComponent", "Filter", "Length"]
        );
        assert_eq!(dict["Filter"].as_name(), Some("DCTDecode"));
        assert_eq!(dict["Length"].as_integer(), Some(jpeg.data.len() as i64));
    }

    #[test]
    fn test_empty_image_is_rejected() {
        let result = JpegImage::encode(&sample_image(0, 5));
        assert!(matches!(result, Err(Error::Image(_))));
    }
}
