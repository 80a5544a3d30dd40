use std::time::Duration;

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};

use crate::error::Result;
use crate::types::Size;

/// A decoded live preview frame.
///
/// Keeps the original JPEG alongside the decoded pixels so callers can
/// forward or store the image without re-encoding it.
#[derive(Debug, Clone)]
pub struct Frame {
    sequence: u64,
    timestamp: Duration,
    jpeg: Bytes,
    image: DynamicImage,
}

impl Frame {
    /// Decode a complete JPEG received at `timestamp` into session time.
    pub(crate) fn decode(sequence: u64, timestamp: Duration, jpeg: Bytes) -> Result<Self> {
        let image = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)?;
        Ok(Frame {
            sequence,
            timestamp,
            jpeg,
            image,
        })
    }

    /// Position of this frame in its session, starting at zero.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Time elapsed between the start of the session and this frame's arrival.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.image.width(),
            height: self.image.height(),
        }
    }

    /// The JPEG exactly as the camera sent it.
    pub fn jpeg(&self) -> &Bytes {
        &self.jpeg
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    pub(crate) fn jpeg(width: u32, height: u32) -> Bytes {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 90]));
        let mut out = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Jpeg)
            .unwrap();
        Bytes::from(out.into_inner())
    }

    #[test]
    fn decodes_dimensions() {
        let frame = Frame::decode(3, Duration::from_millis(40), jpeg(32, 16)).unwrap();
        assert_eq!(frame.sequence(), 3);
        assert_eq!(frame.timestamp(), Duration::from_millis(40));
        assert_eq!(
            frame.size(),
            Size {
                width: 32,
                height: 16
            }
        );
        assert_eq!(frame.jpeg()[..2], [0xFF, 0xD8]);
    }

    #[test]
    fn garbage_between_markers_fails_to_decode() {
        let garbage = Bytes::from_static(&[0xFF, 0xD8, 0x00, 0x01, 0x02, 0xFF, 0xD9]);
        assert!(matches!(
            Frame::decode(0, Duration::ZERO, garbage),
            Err(crate::Error::Decode(_))
        ));
    }
}
