use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageBuffer, Luma, Rgb, Rgba};
use thiserror::Error;

/// Errors produced while building, encoding or decoding frames
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("empty frame payload")]
    EmptyPayload,
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(u8),
    #[error("buffer holds {actual} bytes, expected {expected} for {width}x{height}x{channels}")]
    SizeMismatch {
        width: u32,
        height: u32,
        channels: u8,
        expected: usize,
        actual: usize,
    },
    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),
}

/// A decoded, tightly packed 8-bit image.
///
/// Frames are never shared between producer and consumer: `Clone` is a deep
/// copy, which is what the cache hands out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a packed pixel buffer (1 = gray, 3 = RGB, 4 = RGBA).
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self, FrameError> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(FrameError::UnsupportedChannels(channels));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(FrameError::SizeMismatch {
                width,
                height,
                channels,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> u8 {
        self.channels
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Decode an encoded image (JPEG or PNG) into an RGB frame.
    pub fn decode(payload: &[u8]) -> Result<Self, FrameError> {
        if payload.is_empty() {
            return Err(FrameError::EmptyPayload);
        }
        let rgb = image::load_from_memory(payload)?.into_rgb8();
        Ok(Self::from_rgb_image(rgb))
    }

    /// Encode as JPEG. Alpha is dropped; quality is clamped to 1..=100.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, FrameError> {
        let mut buffer = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
            match self.channels {
                1 => encoder.encode_image(&self.view::<Luma<u8>>()?)?,
                3 => encoder.encode_image(&self.view::<Rgb<u8>>()?)?,
                _ => {
                    let rgba: image::RgbaImage = self.view::<Rgba<u8>>()?.convert();
                    encoder.encode_image(&DynamicImage::ImageRgba8(rgba).into_rgb8())?
                }
            }
        }
        Ok(buffer)
    }

    /// Convert into an RGB image for consumers that need one (e.g. the model).
    pub fn to_rgb_image(&self) -> Result<image::RgbImage, FrameError> {
        let image = match self.channels {
            1 => {
                let gray: image::GrayImage = self.view::<Luma<u8>>()?.convert();
                DynamicImage::ImageLuma8(gray)
            }
            3 => {
                let rgb: image::RgbImage = self.view::<Rgb<u8>>()?.convert();
                return Ok(rgb);
            }
            _ => {
                let rgba: image::RgbaImage = self.view::<Rgba<u8>>()?.convert();
                DynamicImage::ImageRgba8(rgba)
            }
        };
        Ok(image.into_rgb8())
    }

    pub(crate) fn from_rgb_image(rgb: image::RgbImage) -> Self {
        let (width, height) = rgb.dimensions();
        Self {
            width,
            height,
            channels: 3,
            data: rgb.into_raw(),
        }
    }

    fn view<P: image::Pixel<Subpixel = u8>>(&self) -> Result<ImageBuffer<P, &[u8]>, FrameError> {
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice()).ok_or(
            FrameError::SizeMismatch {
                width: self.width,
                height: self.height,
                channels: self.channels,
                expected: self.width as usize * self.height as usize * self.channels as usize,
                actual: self.data.len(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let data = (0..width * height)
            .flat_map(|i| {
                let v = (i % 256) as u8;
                [v, 255 - v, 128]
            })
            .collect();
        Frame::new(width, height, 3, data).unwrap()
    }

    #[test]
    fn test_new_rejects_wrong_size() {
        let err = Frame::new(4, 4, 3, vec![0; 10]).unwrap_err();
        assert!(matches!(err, FrameError::SizeMismatch { expected: 48, actual: 10, .. }));
    }

    #[test]
    fn test_new_rejects_two_channels() {
        assert!(matches!(
            Frame::new(2, 2, 2, vec![0; 8]),
            Err(FrameError::UnsupportedChannels(2))
        ));
    }

    #[test]
    fn test_jpeg_keeps_dimensions() {
        let frame = gradient(32, 16);
        let jpeg = frame.encode_jpeg(90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = Frame::decode(&jpeg).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 16);
        assert_eq!(decoded.channels(), 3);
    }

    #[test]
    fn test_rgba_and_gray_encode() {
        let rgba = Frame::new(8, 8, 4, vec![200; 8 * 8 * 4]).unwrap();
        assert!(Frame::decode(&rgba.encode_jpeg(80).unwrap()).is_ok());

        let gray = Frame::new(8, 8, 1, vec![50; 64]).unwrap();
        let decoded = Frame::decode(&gray.encode_jpeg(80).unwrap()).unwrap();
        assert_eq!(decoded.channels(), 3);
    }

    #[test]
    fn test_decode_empty_and_corrupt() {
        assert!(matches!(Frame::decode(&[]), Err(FrameError::EmptyPayload)));
        assert!(matches!(
            Frame::decode(b"definitely not a jpeg"),
            Err(FrameError::Codec(_))
        ));
    }

    #[test]
    fn test_to_rgb_image_from_gray() {
        let gray = Frame::new(2, 1, 1, vec![10, 20]).unwrap();
        let rgb = gray.to_rgb_image().unwrap();
        assert_eq!(rgb.get_pixel(1, 0).0, [20, 20, 20]);
    }
}
