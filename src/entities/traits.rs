//! Abstract traits for dependency inversion.
//!
//! Tracks need pixels to draw themselves, but the decode cache lives in `core/`.
//! `FrameSource` is the interface `entities` needs; the implementation is
//! `core::decode_cache::MediaDecodeCache`.
//!
//! `VideoClip`/`ClipDecoder` abstract the video backend the decode cache is built
//! with (FFmpeg behind the `ffmpeg` feature, fakes in tests).

use super::frame::Frame;
use super::media::MediaSource;
use crate::error::DecodeError;

/// Pixel provider for draw calls.
pub trait FrameSource {
    /// Frame `frame_index` of `source`, in the source's own frame numbering.
    ///
    /// Images loop (`index mod len`), video maps the index to a timestamp.
    fn frame(&self, source: &MediaSource, frame_index: i32) -> Result<Frame, DecodeError>;
}

impl<T: FrameSource + ?Sized> FrameSource for std::sync::Arc<T> {
    fn frame(&self, source: &MediaSource, frame_index: i32) -> Result<Frame, DecodeError> {
        (**self).frame(source, frame_index)
    }
}

/// Stream-level facts about an opened video clip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipInfo {
    pub width: u32,
    pub height: u32,
    pub duration: std::time::Duration,
    /// Native frame rate of the clip (not the timeline base rate)
    pub fps: f64,
}

/// Opaque handle of a decoded video clip.
pub trait VideoClip: Send + Sync + std::fmt::Debug {
    fn info(&self) -> ClipInfo;

    /// First frame whose timestamp is at or after `timestamp`, None past the end.
    fn frame_at(&self, timestamp: std::time::Duration) -> Result<Option<Frame>, DecodeError>;
}

/// Backend turning stored video bytes into a `VideoClip`.
pub trait ClipDecoder: Send + Sync {
    /// `id` is the content hash, usable as a stable scratch name by file-based backends
    fn open(&self, id: &str, bytes: Vec<u8>, mime: &str) -> Result<std::sync::Arc<dyn VideoClip>, DecodeError>;
}
