//! Decoded RGBA frame handle shared between the decode cache and the compositor.
//!
//! **Why**: The decode cache owns decoded pixels, while draw calls, thumbnails and the
//! presented output only need cheap shared access. A `Frame` is an `Arc` around an
//! 8-bit RGBA image, so cloning never copies pixels and two handles can be compared
//! for identity with [`Frame::ptr_eq`].
//!
//! **Used by**: `core::decode_cache` (image frames, clip samples, thumbnails),
//! `core::compositor` (offscreen surface and presented output), `entities::track` (draw).

use std::fmt;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Immutable RGBA8 frame, cheap to clone.
#[derive(Clone)]
pub struct Frame {
    image: Arc<RgbaImage>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

impl Frame {
    /// Fully transparent frame
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_image(RgbaImage::new(width, height))
    }

    /// Frame filled with a single RGBA color
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::from_image(RgbaImage::from_pixel(width, height, Rgba(rgba)))
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image: Arc::new(image) }
    }

    /// Wrap a raw RGBA8 buffer. Returns None if the buffer length does not match.
    pub fn from_rgba(buffer: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        RgbaImage::from_raw(width, height, buffer).map(Self::from_image)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Memory held by the pixel buffer in bytes
    pub fn mem(&self) -> usize {
        self.image.as_raw().len()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// RGBA value at (x, y), None outside the frame
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x < self.width() && y < self.height() {
            Some(self.image.get_pixel(x, y).0)
        } else {
            None
        }
    }

    /// True when both handles point at the same pixel buffer
    pub fn ptr_eq(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }

    /// Downscaled copy no wider than `max_width`, aspect preserved.
    pub fn thumbnail(&self, max_width: u32) -> Frame {
        let (w, h) = self.resolution();
        if w <= max_width || w == 0 {
            return self.clone();
        }
        let th = ((h as u64 * max_width as u64) / w as u64).max(1) as u32;
        Frame::from_image(imageops::thumbnail(self.image.as_ref(), max_width, th))
    }

    /// Scale into a `width` x `height` box (contain) and blend centred onto `surface`.
    pub fn draw_fitted(&self, surface: &mut RgbaImage, width: u32, height: u32) {
        let (w, h) = self.resolution();
        if w == 0 || h == 0 || width == 0 || height == 0 {
            return;
        }
        let scale = (width as f64 / w as f64).min(height as f64 / h as f64);
        let fw = ((w as f64 * scale).round() as u32).max(1);
        let fh = ((h as f64 * scale).round() as u32).max(1);
        let x = (width as i64 - fw as i64) / 2;
        let y = (height as i64 - fh as i64) / 2;

        if (fw, fh) == (w, h) {
            imageops::overlay(surface, self.image.as_ref(), x, y);
        } else {
            let scaled = imageops::resize(self.image.as_ref(), fw, fh, FilterType::Triangle);
            imageops::overlay(surface, &scaled, x, y);
        }
    }
}

impl From<RgbaImage> for Frame {
    fn from(image: RgbaImage) -> Self {
        Frame::from_image(image)
    }
}
