//! Video clip backends
//!
//! - `NoClipDecoder` - default when built without FFmpeg, rejects every video
//! - `FfmpegClipDecoder` (feature `ffmpeg`) - spools the stored bytes to a scratch
//!   file and seeks/decodes single frames from it

use std::sync::Arc;

use super::traits::{ClipDecoder, VideoClip};
use crate::error::DecodeError;

/// Backend for builds without a video decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct NoClipDecoder;

impl ClipDecoder for NoClipDecoder {
    fn open(&self, _id: &str, _bytes: Vec<u8>, mime: &str) -> Result<Arc<dyn VideoClip>, DecodeError> {
        Err(DecodeError::Unsupported { mime: mime.to_string() })
    }
}

/// Best backend this build offers
pub fn default_clip_decoder() -> Arc<dyn ClipDecoder> {
    #[cfg(feature = "ffmpeg")]
    {
        Arc::new(ffmpeg_backend::FfmpegClipDecoder::new(std::env::temp_dir().join("framecut-clips")))
    }
    #[cfg(not(feature = "ffmpeg"))]
    {
        Arc::new(NoClipDecoder)
    }
}

#[cfg(feature = "ffmpeg")]
pub use ffmpeg_backend::FfmpegClipDecoder;

/// Picks the decoded frame that answers a seek to pts `target`.
///
/// Frames are offered in output order, including the ones flushed after EOF. The first
/// frame at or after `target` wins; a target past the last pts falls back to the last
/// frame offered.
#[cfg_attr(not(feature = "ffmpeg"), allow(dead_code))]
#[derive(Debug, Clone, Copy)]
struct SeekTarget {
    target: i64,
    seen: bool,
    reached: bool,
}

#[cfg_attr(not(feature = "ffmpeg"), allow(dead_code))]
impl SeekTarget {
    fn new(target: i64) -> Self {
        Self { target, seen: false, reached: false }
    }

    /// True when this frame answers the seek. Frames without pts are accepted.
    fn offer(&mut self, pts: Option<i64>) -> bool {
        self.seen = true;
        self.reached = pts.map(|pts| pts >= self.target).unwrap_or(true);
        self.reached
    }

    /// After EOF: whether the last offered frame is usable
    fn settled(&self) -> bool {
        self.reached || self.seen
    }
}

#[cfg(feature = "ffmpeg")]
mod ffmpeg_backend {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Once};
    use std::time::Duration;

    use log::{debug, trace, warn};
    use playa_ffmpeg as ffmpeg;
    use ffmpeg::util::frame::video::Video;

    use super::SeekTarget;
    use crate::entities::frame::Frame;
    use crate::entities::traits::{ClipDecoder, ClipInfo, VideoClip};
    use crate::error::DecodeError;

    static FFMPEG_INIT: Once = Once::new();

    fn init_ffmpeg() {
        FFMPEG_INIT.call_once(|| {
            if let Err(e) = ffmpeg::init() {
                warn!("FFmpeg init failed: {}", e);
            }
            unsafe {
                // Silence FFmpeg's own stderr logging
                ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_QUIET);
            }
        });
    }

    fn clip_err(context: &str, e: impl std::fmt::Display) -> DecodeError {
        DecodeError::Clip(format!("{}: {}", context, e))
    }

    /// FFmpeg needs a seekable file, so clips are spooled to `scratch_dir/<id>`
    #[derive(Debug, Clone)]
    pub struct FfmpegClipDecoder {
        scratch_dir: PathBuf,
    }

    impl FfmpegClipDecoder {
        pub fn new(scratch_dir: PathBuf) -> Self {
            Self { scratch_dir }
        }
    }

    impl ClipDecoder for FfmpegClipDecoder {
        fn open(&self, id: &str, bytes: Vec<u8>, _mime: &str) -> Result<Arc<dyn VideoClip>, DecodeError> {
            init_ffmpeg();
            std::fs::create_dir_all(&self.scratch_dir).map_err(|e| DecodeError::store(id, e))?;
            let path = self.scratch_dir.join(id);
            if !path.is_file() {
                std::fs::write(&path, &bytes).map_err(|e| DecodeError::store(id, e))?;
            }
            let info = probe(&path)?;
            debug!("Opened clip {} {}x{} {:?} @ {:.3} fps", id, info.width, info.height, info.duration, info.fps);
            Ok(Arc::new(FfmpegClip { path, info }))
        }
    }

    #[derive(Debug)]
    struct FfmpegClip {
        path: PathBuf,
        info: ClipInfo,
    }

    impl VideoClip for FfmpegClip {
        fn info(&self) -> ClipInfo {
            self.info
        }

        fn frame_at(&self, timestamp: Duration) -> Result<Option<Frame>, DecodeError> {
            if timestamp > self.info.duration {
                return Ok(None);
            }
            decode_at(&self.path, timestamp)
        }
    }

    fn probe(path: &Path) -> Result<ClipInfo, DecodeError> {
        let ictx = ffmpeg::format::input(path).map_err(|e| clip_err("Failed to open video", e))?;
        let stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| DecodeError::Clip("No video stream found".to_string()))?;

        let time_base = stream.time_base();
        let fps_rational = stream.avg_frame_rate();
        let duration_secs = if stream.duration() > 0 {
            stream.duration() as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
        } else {
            // Container duration is in AV_TIME_BASE units (microseconds)
            ictx.duration().max(0) as f64 / 1_000_000.0
        };
        let fps = if fps_rational.denominator() != 0 {
            fps_rational.numerator() as f64 / fps_rational.denominator() as f64
        } else {
            0.0
        };

        let decoder_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| clip_err("Failed to create decoder context", e))?;
        let decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| clip_err("Failed to create video decoder", e))?;

        Ok(ClipInfo {
            width: decoder.width(),
            height: decoder.height(),
            duration: Duration::from_secs_f64(duration_secs.max(0.0)),
            fps,
        })
    }

    fn decode_at(path: &Path, timestamp: Duration) -> Result<Option<Frame>, DecodeError> {
        let mut ictx = ffmpeg::format::input(path).map_err(|e| clip_err("Failed to open video", e))?;
        let stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| DecodeError::Clip("No video stream found".to_string()))?;
        let stream_idx = stream.index();
        let time_base = stream.time_base();
        // AV_NOPTS_VALUE (i64::MIN) maps to 0
        let start_pts = stream.start_time().max(0);

        let decoder_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| clip_err("Failed to create decoder context", e))?;
        let mut decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| clip_err("Failed to create video decoder", e))?;

        let width = decoder.width();
        let height = decoder.height();
        let mut scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg::format::Pixel::RGBA,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| clip_err("Failed to create scaler", e))?;

        // Target pts in stream time base, relative to the stream's first pts
        let target_ts = if time_base.numerator() > 0 {
            start_pts
                + (timestamp.as_secs_f64() * time_base.denominator() as f64 / time_base.numerator() as f64) as i64
        } else {
            0
        };

        let seek_ret = unsafe {
            ffmpeg::ffi::av_seek_frame(
                ictx.as_mut_ptr(),
                stream_idx as i32,
                target_ts,
                ffmpeg::ffi::AVSEEK_FLAG_BACKWARD,
            )
        };
        if seek_ret < 0 {
            warn!("Video seek failed (ret={}), decoding from start", seek_ret);
        }

        let mut seek = FrameSeek::new(target_ts);
        for (stream, packet) in ictx.packets() {
            if stream.index() != stream_idx {
                continue;
            }
            decoder
                .send_packet(&packet)
                .map_err(|e| clip_err("Failed to send packet", e))?;
            if seek.drain(&mut decoder) {
                return to_rgba(&mut scaler, seek.found(), width, height);
            }
        }

        // Flush frames still held in the codec's reorder buffer
        decoder.send_eof().map_err(|e| clip_err("Failed to flush decoder", e))?;
        if !seek.drain(&mut decoder) {
            if !seek.target.settled() {
                return Ok(None);
            }
            trace!("pts {} past end of stream, using last frame", target_ts);
        }
        to_rgba(&mut scaler, seek.found(), width, height)
    }

    /// Receive loop buffers around `SeekTarget`
    struct FrameSeek {
        target: SeekTarget,
        current: Video,
        last: Video,
    }

    impl FrameSeek {
        fn new(target: i64) -> Self {
            Self { target: SeekTarget::new(target), current: Video::empty(), last: Video::empty() }
        }

        /// Pull every ready frame. True once the target frame is in hand.
        fn drain(&mut self, decoder: &mut ffmpeg::decoder::Video) -> bool {
            while decoder.receive_frame(&mut self.current).is_ok() {
                std::mem::swap(&mut self.current, &mut self.last);
                if self.target.offer(self.last.pts()) {
                    return true;
                }
            }
            false
        }

        fn found(&self) -> &Video {
            &self.last
        }
    }

    fn to_rgba(
        scaler: &mut ffmpeg::software::scaling::Context,
        decoded: &Video,
        width: u32,
        height: u32,
    ) -> Result<Option<Frame>, DecodeError> {
        let mut rgba_frame = Video::empty();
        scaler
            .run(decoded, &mut rgba_frame)
            .map_err(|e| clip_err("Failed to scale frame", e))?;

        let rgba_data = rgba_frame.data(0);
        let stride = rgba_frame.stride(0);
        let row_bytes = (width * 4) as usize;
        let mut output = vec![0u8; row_bytes * height as usize];
        for y in 0..height as usize {
            let src = y * stride;
            let dst = y * row_bytes;
            output[dst..dst + row_bytes].copy_from_slice(&rgba_data[src..src + row_bytes]);
        }
        Ok(Frame::from_rgba(output, width, height))
    }
}
