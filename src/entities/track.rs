//! Track (clip placement) and TrackLine structures.
//!
//! # Architecture
//!
//! - `Track` - one clip placed on the timeline: interval, trims and media reference
//! - `TrackContent` - closed set of track kinds; capabilities are matched, not probed
//! - `TrackLine` - lane of same-kind tracks, sorted by start and non-overlapping
//!
//! # Coordinate Systems
//!
//! All positions are integer frames at the base rate (30 fps).
//!
//! - `start`/`end` - visible interval on the timeline, `start < end`
//! - `frame_count` - native source length in frames
//! - `offset_l`/`offset_r` - frames trimmed off the source's natural start/end
//!
//! Computed values:
//! - `len()` = `end - start`
//! - `local_frame(f)` = `f - start + offset_l` (frame index inside the source)
//!
//! # Capabilities
//!
//! | kind        | drawable | playable |
//! |-------------|----------|----------|
//! | video       | yes      | yes      |
//! | image       | yes      | no       |
//! | audio       | no       | yes      |
//! | text, effect, transition, filter | dispatched, draws nothing yet | no |

use image::RgbaImage;
use log::trace;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::media::MediaSource;
use super::traits::FrameSource;
use crate::error::DecodeError;

/// Kind tag of a track, used to segregate lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Text,
    Image,
    Effect,
    Transition,
    Filter,
}

impl TrackKind {
    /// New lines of this kind go to the end of the list (bottom), all others to the front.
    pub fn appends_line(self) -> bool {
        matches!(self, TrackKind::Audio)
    }
}

/// Playback cursor of a playable track.
///
/// Runtime-only: the player drives it through `Track::play`/`Track::pause`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlayHead {
    pub playing: bool,
    /// Last source-local frame requested by `play`
    pub frame: Option<i32>,
}

/// Kind-specific payload. Only the drawable and playable variants expose those
/// capabilities; everything else falls through the same match arms.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TrackContent {
    Video {
        #[serde(skip)]
        playhead: PlayHead,
    },
    Audio {
        #[serde(skip)]
        playhead: PlayHead,
    },
    Image,
    Text {
        text: String,
    },
    Effect {
        name: String,
    },
    Transition {
        name: String,
    },
    Filter {
        name: String,
    },
}

impl TrackContent {
    pub fn video() -> Self {
        TrackContent::Video { playhead: PlayHead::default() }
    }

    pub fn audio() -> Self {
        TrackContent::Audio { playhead: PlayHead::default() }
    }

    pub fn kind(&self) -> TrackKind {
        match self {
            TrackContent::Video { .. } => TrackKind::Video,
            TrackContent::Audio { .. } => TrackKind::Audio,
            TrackContent::Image => TrackKind::Image,
            TrackContent::Text { .. } => TrackKind::Text,
            TrackContent::Effect { .. } => TrackKind::Effect,
            TrackContent::Transition { .. } => TrackKind::Transition,
            TrackContent::Filter { .. } => TrackKind::Filter,
        }
    }
}

/// Result of a single draw call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawOutcome {
    Drawn,
    /// Kind has no pixel pipeline yet, or no source attached
    Skipped,
}

/// One clip on the timeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    pub id: Uuid,
    pub name: String,
    pub start: i32,
    pub end: i32,
    pub frame_count: i32,
    pub offset_l: i32,
    pub offset_r: i32,
    /// Media metadata; decoded pixels are looked up by `source.id`
    pub source: Option<MediaSource>,
    pub content: TrackContent,
}

impl Track {
    /// Track without media (text, effect, ...), `frame_count` equals the interval length.
    pub fn new(name: &str, start: i32, end: i32, content: TrackContent) -> Self {
        debug_assert!(start < end, "track interval must be non-empty");
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            start,
            end,
            frame_count: end - start,
            offset_l: 0,
            offset_r: 0,
            source: None,
            content,
        }
    }

    /// Track spanning the whole source, placed at `start`.
    pub fn from_source(source: MediaSource, start: i32, content: TrackContent) -> Self {
        let frame_count = source.frame_count.max(1);
        Self {
            id: Uuid::new_v4(),
            name: source.name.clone(),
            start,
            end: start + frame_count,
            frame_count,
            offset_l: 0,
            offset_r: 0,
            source: Some(source),
            content,
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.content.kind()
    }

    /// Visible length in frames
    pub fn len(&self) -> i32 {
        self.end - self.start
    }

    /// Inclusive hit test used by the compositor and the player: `start <= frame <= end`.
    pub fn contains_frame(&self, frame: i32) -> bool {
        self.start <= frame && frame <= self.end
    }

    /// Timeline frame -> source-local frame
    pub fn local_frame(&self, frame: i32) -> i32 {
        frame - self.start + self.offset_l
    }

    /// Takes part in the compositor's draw list. `draw()` decides whether pixels land.
    pub fn is_drawable(&self) -> bool {
        match self.content {
            TrackContent::Video { .. }
            | TrackContent::Image
            | TrackContent::Text { .. }
            | TrackContent::Effect { .. }
            | TrackContent::Transition { .. }
            | TrackContent::Filter { .. } => true,
            TrackContent::Audio { .. } => false,
        }
    }

    pub fn is_playable(&self) -> bool {
        self.playhead().is_some()
    }

    pub fn playhead(&self) -> Option<&PlayHead> {
        match &self.content {
            TrackContent::Video { playhead } | TrackContent::Audio { playhead } => Some(playhead),
            _ => None,
        }
    }

    /// Start or continue playback at timeline `frame`. No-op for non-playable kinds.
    pub fn play(&mut self, frame: i32) {
        let local = self.local_frame(frame);
        match &mut self.content {
            TrackContent::Video { playhead } | TrackContent::Audio { playhead } => {
                playhead.playing = true;
                playhead.frame = Some(local);
                trace!("play {} at local frame {}", self.name, local);
            }
            _ => {}
        }
    }

    /// Stop playback. Idempotent, no-op for non-playable kinds.
    pub fn pause(&mut self) {
        match &mut self.content {
            TrackContent::Video { playhead } | TrackContent::Audio { playhead } => {
                playhead.playing = false;
            }
            _ => {}
        }
    }

    /// Draw this track's pixels for timeline `frame` onto `surface`.
    ///
    /// `output` is the composited resolution; the source is fitted inside it.
    pub fn draw(
        &self,
        surface: &mut RgbaImage,
        output: (u32, u32),
        frame: i32,
        frames: &dyn FrameSource,
    ) -> Result<DrawOutcome, DecodeError> {
        match &self.content {
            TrackContent::Video { .. } | TrackContent::Image => {
                let Some(source) = &self.source else {
                    return Ok(DrawOutcome::Skipped);
                };
                let pixels = frames.frame(source, self.local_frame(frame))?;
                pixels.draw_fitted(surface, output.0, output.1);
                trace!("drew {} ({}) at frame {}", self.name, source.id, frame);
                Ok(DrawOutcome::Drawn)
            }
            // TODO: text rendering needs a font rasterizer; effect/transition/filter need the
            // pixels below them, which the sequential draw list already provides.
            TrackContent::Text { .. }
            | TrackContent::Effect { .. }
            | TrackContent::Transition { .. }
            | TrackContent::Filter { .. } => Ok(DrawOutcome::Skipped),
            TrackContent::Audio { .. } => Ok(DrawOutcome::Skipped),
        }
    }
}

/// Overlap predicate between an existing interval and one being inserted.
///
/// True when one contains the other or their boundaries cross. Touching intervals
/// (`existing.end == insert.start`) do not overlap.
pub fn overlaps(existing: (i32, i32), insert: (i32, i32)) -> bool {
    let (es, ee) = existing;
    let (is, ie) = insert;
    (es <= is && ee >= ie) || (es >= is && es < ie) || (ee > is && ee <= ie)
}

/// Result of scanning a line for a candidate interval
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineScan {
    pub has_overlap: bool,
    /// Number of items ending at or before the candidate start
    pub insert_index: usize,
}

/// Lane of same-kind tracks, sorted ascending by start, never overlapping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackLine {
    pub kind: TrackKind,
    /// Main lines survive being emptied
    #[serde(default)]
    pub main: bool,
    pub list: Vec<Track>,
}

impl TrackLine {
    pub fn new(kind: TrackKind) -> Self {
        Self { kind, main: false, list: Vec::new() }
    }

    /// Reserved lane that stays when its last item is removed
    pub fn main(kind: TrackKind) -> Self {
        Self { kind, main: true, list: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Scan for overlap against `[start, end)`, skipping `exclude`.
    ///
    /// `insert_index` is only meaningful when `has_overlap` is false. The excluded item is
    /// not counted, so the index addresses the list with that item removed.
    pub fn scan(&self, start: i32, end: i32, exclude: Option<usize>) -> LineScan {
        let mut insert_index = 0;
        for (idx, item) in self.list.iter().enumerate() {
            if Some(idx) == exclude {
                continue;
            }
            if overlaps((item.start, item.end), (start, end)) {
                return LineScan { has_overlap: true, insert_index };
            }
            if item.end <= start {
                insert_index += 1;
            }
        }
        LineScan { has_overlap: false, insert_index }
    }

    /// First item whose inclusive interval contains `frame` and passes `filter`
    pub fn active_at(&self, frame: i32, filter: impl Fn(&Track) -> bool) -> Option<usize> {
        self.list
            .iter()
            .position(|item| item.contains_frame(frame) && filter(item))
    }

    /// Largest `end` in the line, 0 when empty
    pub fn max_end(&self) -> i32 {
        self.list.iter().map(|t| t.end).max().unwrap_or(0)
    }
}
