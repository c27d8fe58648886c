//! Playback state machine with frame-accurate timing
//!
//! **Architecture**: Player does NOT own the TrackModel. It receives the timeline's
//! `frame_count` when it needs the bound, so the TrackModel stays the single source
//! of truth for timeline length.
//!
//! **Used by**: `Editor` (play/pause actions, refresh loop), headless `--play`
//!
//! # State Machine
//!
//! ```text
//! Paused --start_play()--> Playing     (frame reset to 0 when at/after the end)
//! Playing --pause()------> Paused      (interval cancelled)
//! Playing --reach end----> Paused      (tick pauses before returning)
//! ```
//!
//! Initial state: Paused at frame 0.
//!
//! # Timing Model
//!
//! One `PreciseInterval` per play session at the base rate. `on_refresh()` is called
//! by the host at its refresh rate; each fire advances exactly one frame.

use std::time::Instant;

use log::{info, trace};
use serde::{Deserialize, Serialize};

use super::interval::{Poll, PreciseInterval};

/// Current frame and play/pause flag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub play_start_frame: i32,
    pub is_pause: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self { play_start_frame: 0, is_pause: true }
    }
}

/// Result of one fired tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    /// Frame after the advance
    pub frame: i32,
    /// The tick hit the timeline end and paused playback
    pub reached_end: bool,
}

/// Playback state manager (does NOT own the TrackModel)
#[derive(Debug)]
pub struct Player {
    state: PlaybackState,
    fps: u32,
    /// Active interval while playing (runtime-only)
    interval: Option<PreciseInterval>,
}

impl Player {
    pub fn new(fps: u32) -> Self {
        info!("Player initialized at {} fps", fps);
        Self { state: PlaybackState::default(), fps: fps.max(1), interval: None }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn current_frame(&self) -> i32 {
        self.state.play_start_frame
    }

    pub fn is_playing(&self) -> bool {
        !self.state.is_pause
    }

    /// Time until the next tick is due, None when not playing
    pub fn next_delay(&self, now: Instant) -> Option<std::time::Duration> {
        self.interval.as_ref().map(|iv| iv.next_delay(now))
    }

    /// Move the playhead (scrubbing). Playback, if running, continues from there.
    pub fn set_play_start_frame(&mut self, frame: i32) {
        self.state.play_start_frame = frame.max(0);
        trace!("play_start_frame = {}", self.state.play_start_frame);
    }

    /// Start playback at the current frame.
    ///
    /// Restarts from 0 when the playhead is at/after the end. Any previous interval is
    /// cancelled first. An empty timeline does not start; returns whether playing.
    pub fn start_play(&mut self, frame_count: i32, now: Instant) -> bool {
        if let Some(old) = self.interval.take() {
            old.cancel();
        }
        if frame_count <= 0 {
            info!("Nothing to play");
            self.state.is_pause = true;
            return false;
        }
        if self.state.play_start_frame >= frame_count {
            self.state.play_start_frame = 0;
        }
        self.interval = Some(PreciseInterval::from_fps(self.fps, now));
        self.state.is_pause = false;
        info!("Playback started at frame {}/{}", self.state.play_start_frame, frame_count);
        true
    }

    /// Stop playback. Idempotent; returns whether the state changed.
    pub fn pause(&mut self) -> bool {
        if let Some(interval) = self.interval.take() {
            interval.cancel();
        }
        let was_playing = !self.state.is_pause;
        self.state.is_pause = true;
        if was_playing {
            info!("Playback paused at frame {}", self.state.play_start_frame);
        }
        was_playing
    }

    /// Poll the interval from the host's refresh signal.
    ///
    /// Returns the tick when one fired, None otherwise.
    pub fn on_refresh(&mut self, frame_count: i32, now: Instant) -> Option<Tick> {
        let interval = self.interval.as_mut()?;
        match interval.poll(now) {
            Poll::Fire => Some(self.tick(frame_count)),
            Poll::Idle => None,
            Poll::Cancelled => {
                self.interval = None;
                None
            }
        }
    }

    /// Advance one frame; pauses when the next frame would be the end.
    fn tick(&mut self, frame_count: i32) -> Tick {
        self.state.play_start_frame += 1;
        let frame = self.state.play_start_frame;
        trace!("tick -> frame {}", frame);

        // `>=` also stops a timeline that shrank below the playhead mid-play
        let reached_end = frame + 1 >= frame_count;
        if reached_end {
            self.pause();
        }
        Tick { frame, reached_end }
    }
}
