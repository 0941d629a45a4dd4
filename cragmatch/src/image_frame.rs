use crate::error::{MatchError, MatchResult};
use image::imageops::FilterType;
use image::GenericImageView;
use std::path::Path;

/// A decoded image, resized to the working resolution fed to the correspondence oracle.
///
/// The frame remembers the resolution of the source image so that coordinates stored
/// at original resolution can be brought into working space (and back). Frames are
/// immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFrame {
    /// Working-resolution pixel data in RGBA format (4 bytes per pixel, row-major).
    pixels: Vec<u8>,
    working_width: u32,
    working_height: u32,
    original_width: u32,
    original_height: u32,
}

impl ImageFrame {
    /// Decodes `bytes` and resizes the image so that its longer side equals `working_size`.
    ///
    /// # Errors
    /// `MatchError::Decode` when the bytes are not a readable image.
    pub fn from_encoded(bytes: &[u8], working_size: u32) -> MatchResult<Self> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_dynamic(&img, working_size))
    }

    /// Reads and decodes an image file.
    pub fn open(path: &Path, working_size: u32) -> MatchResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_encoded(&bytes, working_size)
    }

    fn from_dynamic(img: &image::DynamicImage, working_size: u32) -> Self {
        let (original_width, original_height) = img.dimensions();
        let (working_width, working_height) =
            working_dimensions(original_width, original_height, working_size);
        log::debug!(
            "resizing {}x{} to {}x{}",
            original_width,
            original_height,
            working_width,
            working_height
        );
        let resized = img.resize_exact(working_width, working_height, FilterType::Triangle);
        Self {
            pixels: resized.to_rgba8().into_raw(),
            working_width,
            working_height,
            original_width,
            original_height,
        }
    }

    /// Builds a frame from an already resized RGBA buffer.
    ///
    /// # Errors
    /// - `InvalidDimensions` when a side is zero, or when the working size is not the
    ///   uniform resize of the original size (one pixel of rounding is tolerated).
    /// - `InvalidFrame` when `pixels` does not hold `working_width * working_height * 4` bytes.
    pub fn from_rgba(
        original_width: u32,
        original_height: u32,
        working_width: u32,
        working_height: u32,
        pixels: Vec<u8>,
    ) -> MatchResult<Self> {
        check_uniform_resize((original_width, original_height), (working_width, working_height))?;
        let expected = working_width as usize * working_height as usize * 4;
        if pixels.len() != expected {
            return Err(MatchError::InvalidFrame {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            pixels,
            working_width,
            working_height,
            original_width,
            original_height,
        })
    }

    /// Width of the pixel buffer.
    pub fn working_width(&self) -> u32 {
        self.working_width
    }

    /// Height of the pixel buffer.
    pub fn working_height(&self) -> u32 {
        self.working_height
    }

    /// Width of the source image before resizing.
    pub fn original_width(&self) -> u32 {
        self.original_width
    }

    /// Height of the source image before resizing.
    pub fn original_height(&self) -> u32 {
        self.original_height
    }

    /// RGBA bytes, row-major, four per pixel.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// The uniform resize factor: working longer side over original longer side.
    pub fn scale(&self) -> f64 {
        let working = self.working_width.max(self.working_height) as f64;
        let original = self.original_width.max(self.original_height) as f64;
        working / original
    }
}

/// Working resolution for an image of `width` x `height`: the longer side becomes
/// `target`, the shorter one is scaled by the same factor and truncated.
///
/// ```
/// # use cragmatch::image_frame::working_dimensions;
/// assert_eq!(working_dimensions(4000, 3000, 840), (840, 630));
/// assert_eq!(working_dimensions(1000, 2000, 840), (420, 840));
/// ```
pub fn working_dimensions(width: u32, height: u32, target: u32) -> (u32, u32) {
    let longer = width.max(height).max(1) as u64;
    let scaled = |side: u32| ((side as u64 * target as u64) / longer).max(1) as u32;
    (scaled(width), scaled(height))
}

fn check_uniform_resize(original: (u32, u32), working: (u32, u32)) -> MatchResult<()> {
    let invalid = MatchError::InvalidDimensions { original, working };
    if original.0 == 0 || original.1 == 0 || working.0 == 0 || working.1 == 0 {
        return Err(invalid);
    }
    let (width, height) = working_dimensions(original.0, original.1, working.0.max(working.1));
    if width.abs_diff(working.0) > 1 || height.abs_diff(working.1) > 1 {
        return Err(invalid);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encoded_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        });
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn decode_downscales_longer_side() {
        let frame = ImageFrame::from_encoded(&encoded_png(400, 300), 84).unwrap();
        assert_eq!(frame.original_width(), 400);
        assert_eq!(frame.original_height(), 300);
        assert_eq!(frame.working_width(), 84);
        assert_eq!(frame.working_height(), 63);
        assert_eq!(frame.pixels().len(), 84 * 63 * 4);
        assert!((frame.scale() - 0.21).abs() < 1e-12);
    }

    #[test]
    fn decode_upscales_small_images() {
        let frame = ImageFrame::from_encoded(&encoded_png(20, 40), 80).unwrap();
        assert_eq!((frame.working_width(), frame.working_height()), (40, 80));
    }

    #[test]
    fn malformed_bytes_are_a_decode_error() {
        let err = ImageFrame::from_encoded(b"definitely not an image", 840).unwrap_err();
        assert!(matches!(err, MatchError::Decode(_)));
    }

    #[test]
    fn from_rgba_checks_buffer_length() {
        let err = ImageFrame::from_rgba(10, 10, 2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(err, MatchError::InvalidFrame { expected: 16, actual: 15 }));
        assert!(ImageFrame::from_rgba(10, 10, 2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn zero_sized_frames_are_rejected() {
        let cases: [((u32, u32), (u32, u32)); 3] =
            [((0, 0), (2, 2)), ((10, 10), (0, 2)), ((10, 0), (2, 2))];
        for (original, working) in cases {
            let pixels = vec![0; working.0 as usize * working.1 as usize * 4];
            let err = ImageFrame::from_rgba(original.0, original.1, working.0, working.1, pixels)
                .unwrap_err();
            assert!(
                matches!(err, MatchError::InvalidDimensions { .. }),
                "{original:?} {working:?}"
            );
        }
    }

    #[test]
    fn working_size_must_follow_one_scale_factor() {
        let err = ImageFrame::from_rgba(4000, 3000, 840, 100, vec![0; 840 * 100 * 4]).unwrap_err();
        assert!(matches!(
            err,
            MatchError::InvalidDimensions { original: (4000, 3000), working: (840, 100) }
        ));
        assert!(ImageFrame::from_rgba(4000, 3000, 840, 630, vec![0; 840 * 630 * 4]).is_ok());
        // one pixel of rounding either way is accepted
        assert!(ImageFrame::from_rgba(4000, 3000, 840, 631, vec![0; 840 * 631 * 4]).is_ok());
        assert!(ImageFrame::from_rgba(1000, 2000, 419, 840, vec![0; 419 * 840 * 4]).is_ok());
    }

    #[test]
    fn working_dimensions_never_collapse_to_zero() {
        assert_eq!(working_dimensions(10_000, 1, 840), (840, 1));
    }
}
