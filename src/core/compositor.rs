//! Frame compositor - turns the timeline state at one frame into pixels.
//!
//! **Why**: Intermediate paint states must never be visible. Every pass draws into a
//! private offscreen surface and swaps it into the shared presented handle only after
//! the last draw succeeded.
//!
//! **Used by**: `Editor` (after ticks, scrubs and track edits), headless `--render`
//!
//! # Pass
//!
//! 1. per TrackLine, the first non-audio item whose `[start, end]` contains the frame
//! 2. draw list = those items in reverse TrackList order (bottom line first)
//! 3. draws run one after another on one RGBA surface; later draws paint over earlier
//! 4. swap into the presented handle
//!
//! A failed draw aborts the pass; the previously presented frame stays.
//!
//! # Scheduling
//!
//! `request()` only records the latest wanted frame. `flush()` composites it, unless an
//! import is in flight (`LoadingGuard` counter > 0): then the request stays pending.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::RgbaImage;
use log::{debug, trace, warn};

use super::timeline::TrackModel;
use crate::entities::frame::Frame;
use crate::entities::track::{DrawOutcome, Track};
use crate::entities::traits::FrameSource;
use crate::error::DecodeError;

/// Shared handle to the last presented frame, readable from any thread
pub type PresentedFrame = Arc<Mutex<Option<Frame>>>;

/// Summary of a finished pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositeReport {
    pub frame: i32,
    pub drawn: usize,
    pub skipped: usize,
}

/// Holds the loading counter up while alive
#[derive(Debug)]
pub struct LoadingGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug)]
pub struct Compositor {
    width: u32,
    height: u32,
    pending: Option<i32>,
    loading: Arc<AtomicUsize>,
    presented: PresentedFrame,
    presented_frame: Option<i32>,
}

impl Compositor {
    pub fn new(width: u32, height: u32) -> Self {
        debug!("Compositor created: {}x{}", width, height);
        Self {
            width,
            height,
            pending: None,
            loading: Arc::new(AtomicUsize::new(0)),
            presented: Arc::new(Mutex::new(None)),
            presented_frame: None,
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Change the output size; takes effect on the next pass
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Ask for `frame` to be composited. Replaces any older pending request.
    pub fn request(&mut self, frame: i32) {
        if let Some(old) = self.pending.replace(frame) {
            trace!("composite request {} coalesced into {}", old, frame);
        }
    }

    pub fn pending(&self) -> Option<i32> {
        self.pending
    }

    /// Mark an import in flight until the guard drops
    pub fn loading_guard(&self) -> LoadingGuard {
        self.loading.fetch_add(1, Ordering::AcqRel);
        LoadingGuard { counter: self.loading.clone() }
    }

    pub fn loading(&self) -> usize {
        self.loading.load(Ordering::Acquire)
    }

    /// Composite the pending request, if any and nothing is loading.
    pub fn flush(
        &mut self,
        model: &TrackModel,
        frames: &dyn FrameSource,
    ) -> Option<Result<CompositeReport, DecodeError>> {
        if self.loading() > 0 {
            if self.pending.is_some() {
                trace!("composite deferred: {} import(s) loading", self.loading());
            }
            return None;
        }
        let frame = self.pending.take()?;
        Some(self.composite(model, frames, frame))
    }

    /// Items to draw at `frame`, bottom-most first
    pub fn draw_list(model: &TrackModel, frame: i32) -> Vec<(usize, usize)> {
        let mut list = model.active_items(frame, Track::is_drawable);
        list.reverse();
        list
    }

    /// Run one pass for `frame` and present it.
    pub fn composite(
        &mut self,
        model: &TrackModel,
        frames: &dyn FrameSource,
        frame: i32,
    ) -> Result<CompositeReport, DecodeError> {
        let mut surface = RgbaImage::new(self.width, self.height);
        let output = (self.width, self.height);
        let mut report = CompositeReport { frame, drawn: 0, skipped: 0 };

        for (line, index) in Self::draw_list(model, frame) {
            let Some(track) = model.track(line, index) else {
                continue;
            };
            match track.draw(&mut surface, output, frame, frames) {
                Ok(DrawOutcome::Drawn) => report.drawn += 1,
                Ok(DrawOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!("Composite of frame {} aborted at '{}': {}", frame, track.name, e);
                    return Err(e);
                }
            }
        }

        *self.presented.lock().unwrap_or_else(|e| e.into_inner()) = Some(Frame::from_image(surface));
        self.presented_frame = Some(frame);
        trace!("presented frame {} ({} drawn, {} skipped)", frame, report.drawn, report.skipped);
        Ok(report)
    }

    /// Last presented frame
    pub fn presented(&self) -> Option<Frame> {
        self.presented.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Timeline frame of the last presented image
    pub fn presented_frame(&self) -> Option<i32> {
        self.presented_frame
    }

    pub fn presented_handle(&self) -> PresentedFrame {
        self.presented.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::media::MediaSource;
    use crate::entities::track::TrackContent;

    /// Solid frames per source id: "red", "green", "half" (semi-transparent blue); anything else fails
    struct SolidFrames;

    impl FrameSource for SolidFrames {
        fn frame(&self, source: &MediaSource, frame_index: i32) -> Result<Frame, DecodeError> {
            let rgba = match source.id.as_str() {
                "red" => [255, 0, 0, 255],
                "green" => [0, 255, 0, 255],
                "half" => [0, 0, 255, 128],
                _ => return Err(DecodeError::FrameUnavailable { id: source.id.clone(), frame: frame_index }),
            };
            Ok(Frame::filled(source.width, source.height, rgba))
        }
    }

    fn source(id: &str, width: u32, height: u32) -> MediaSource {
        MediaSource {
            id: id.to_string(),
            url: format!("memory://{}", id),
            name: id.to_string(),
            format: "png".to_string(),
            mime: "image/png".to_string(),
            width,
            height,
            duration_ms: 0,
            frame_count: 90,
        }
    }

    fn image_track(id: &str, start: i32) -> Track {
        Track::from_source(source(id, 4, 4), start, TrackContent::Image)
    }

    #[test]
    fn test_top_line_paints_last() {
        let mut model = TrackModel::new();
        model.add_track(image_track("red", 0));
        // Overlaps, so it opens a new line in front (on top)
        model.add_track(image_track("green", 0));

        let mut comp = Compositor::new(4, 4);
        let report = comp.composite(&model, &SolidFrames, 10).unwrap();
        assert_eq!(report, CompositeReport { frame: 10, drawn: 2, skipped: 0 });
        assert_eq!(comp.presented().unwrap().pixel(1, 1), Some([0, 255, 0, 255]));
    }

    #[test]
    fn test_alpha_blends_over_lower_line() {
        let mut model = TrackModel::new();
        model.add_track(image_track("red", 0));
        model.add_track(image_track("half", 0));

        let mut comp = Compositor::new(4, 4);
        comp.composite(&model, &SolidFrames, 0).unwrap();
        let px = comp.presented().unwrap().pixel(0, 0).unwrap();
        assert!(px[0] > 100 && px[0] < 160, "red partly visible: {:?}", px);
        assert!(px[2] > 100, "blue on top: {:?}", px);
    }

    #[test]
    fn test_audio_left_out_of_draw_list() {
        let mut model = TrackModel::new();
        model.add_track(Track::new("music", 0, 100, TrackContent::audio()));

        assert_eq!(Compositor::draw_list(&model, 5), Vec::new());
        let mut comp = Compositor::new(2, 2);
        let report = comp.composite(&model, &SolidFrames, 5).unwrap();
        assert_eq!(report, CompositeReport { frame: 5, drawn: 0, skipped: 0 });
        assert_eq!(comp.presented().unwrap().pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_text_and_effect_lines_report_skipped() {
        let mut model = TrackModel::new();
        model.add_track(Track::new("title", 0, 100, TrackContent::Text { text: "hi".into() }));
        model.add_track(Track::new("blur", 0, 100, TrackContent::Effect { name: "blur".into() }));
        model.add_track(Track::new("music", 0, 100, TrackContent::audio()));

        assert_eq!(Compositor::draw_list(&model, 5).len(), 2);
        let mut comp = Compositor::new(2, 2);
        let report = comp.composite(&model, &SolidFrames, 5).unwrap();
        assert_eq!(report, CompositeReport { frame: 5, drawn: 0, skipped: 2 });
        assert_eq!(comp.presented().unwrap().pixel(0, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn test_failed_draw_keeps_previous_frame() {
        let mut model = TrackModel::new();
        model.add_track(image_track("red", 0));
        model.add_track(image_track("broken", 100));

        let mut comp = Compositor::new(4, 4);
        comp.composite(&model, &SolidFrames, 5).unwrap();
        let before = comp.presented().unwrap();

        assert!(comp.composite(&model, &SolidFrames, 150).is_err());
        assert!(comp.presented().unwrap().ptr_eq(&before));
        assert_eq!(comp.presented_frame(), Some(5));
    }

    #[test]
    fn test_requests_coalesce() {
        let mut model = TrackModel::new();
        model.add_track(image_track("red", 0));

        let mut comp = Compositor::new(4, 4);
        comp.request(3);
        comp.request(7);
        let report = comp.flush(&model, &SolidFrames).unwrap().unwrap();
        assert_eq!(report.frame, 7);
        assert!(comp.flush(&model, &SolidFrames).is_none());
    }

    #[test]
    fn test_loading_defers_flush() {
        let model = TrackModel::new();
        let mut comp = Compositor::new(4, 4);
        comp.request(1);

        let guard = comp.loading_guard();
        assert_eq!(comp.loading(), 1);
        assert!(comp.flush(&model, &SolidFrames).is_none());
        assert_eq!(comp.pending(), Some(1));

        drop(guard);
        assert_eq!(comp.loading(), 0);
        assert!(comp.flush(&model, &SolidFrames).unwrap().is_ok());
        assert!(comp.presented().is_some());
    }
}
