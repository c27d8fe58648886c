//! Image loader for in-memory media bytes
//!
//! Decodes still and animated images into RGBA frames:
//! - GIF, animated PNG (APNG) and animated WebP yield one frame per animation frame
//! - every other format supported by the `image` crate yields a single frame
//!
//! The MIME type picks the decoder; content sniffing is only a fallback when the
//! MIME type is unknown to `image`.

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, ImageFormat};
use log::debug;

use super::frame::Frame;
use crate::error::DecodeError;

/// Decoded still or animated image
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub frames: Vec<Frame>,
    /// Sum of animation frame delays, 0 for stills
    pub duration_ms: u64,
    pub width: u32,
    pub height: u32,
}

/// Image loader (stateless)
pub struct Loader;

impl Loader {
    /// Decode image bytes of the given MIME type
    pub fn load(bytes: &[u8], mime: &str) -> Result<DecodedImage, DecodeError> {
        let format = match ImageFormat::from_mime_type(mime) {
            Some(format) => format,
            None => image::guess_format(bytes).map_err(|_| DecodeError::Unsupported { mime: mime.to_string() })?,
        };
        debug!("Decoding {} bytes as {:?}", bytes.len(), format);

        let animated = match format {
            ImageFormat::Gif => Some(Self::gif_frames(bytes)?),
            ImageFormat::Png => Self::apng_frames(bytes)?,
            ImageFormat::WebP => Self::webp_frames(bytes)?,
            _ => None,
        };

        let (frames, duration_ms) = match animated {
            Some(result) => result,
            None => {
                let img = image::load_from_memory_with_format(bytes, format)?;
                (vec![Frame::from_image(img.to_rgba8())], 0)
            }
        };

        let (width, height) = frames.first().map(Frame::resolution).unwrap_or((0, 0));
        debug!("Decoded {} frame(s) {}x{}, {} ms", frames.len(), width, height, duration_ms);

        Ok(DecodedImage { frames, duration_ms, width, height })
    }

    fn collect(frames: Vec<image::Frame>) -> (Vec<Frame>, u64) {
        let mut duration_ms = 0u64;
        let frames = frames
            .into_iter()
            .map(|f| {
                let (num, den) = f.delay().numer_denom_ms();
                if den != 0 {
                    duration_ms += (num / den) as u64;
                }
                Frame::from_image(f.into_buffer())
            })
            .collect();
        (frames, duration_ms)
    }

    fn gif_frames(bytes: &[u8]) -> Result<(Vec<Frame>, u64), DecodeError> {
        let decoder = GifDecoder::new(Cursor::new(bytes))?;
        let frames = decoder.into_frames().collect_frames()?;
        Ok(Self::collect(frames))
    }

    /// None for plain (non-animated) PNG
    fn apng_frames(bytes: &[u8]) -> Result<Option<(Vec<Frame>, u64)>, DecodeError> {
        let decoder = PngDecoder::new(Cursor::new(bytes))?;
        if !decoder.is_apng()? {
            return Ok(None);
        }
        let frames = decoder.apng()?.into_frames().collect_frames()?;
        Ok(Some(Self::collect(frames)))
    }

    /// None for still WebP
    fn webp_frames(bytes: &[u8]) -> Result<Option<(Vec<Frame>, u64)>, DecodeError> {
        let decoder = WebPDecoder::new(Cursor::new(bytes))?;
        if !decoder.has_animation() {
            return Ok(None);
        }
        let frames = decoder.into_frames().collect_frames()?;
        Ok(Some(Self::collect(frames)))
    }
}
