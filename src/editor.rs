//! Editor - application context owning one instance of every core component.
//!
//! **Why**: The timeline model, player, compositor and decode cache have to agree on
//! one current frame and one track list. The editor is the only place that mutates
//! them together and it reports every change on the event bus.
//!
//! **Used by**: hosts (the headless binary, GUIs embedding the library)
//!
//! # Action surface
//!
//! - tracks: `import`, `add_track`, `remove_track`, `select_track_by_id`, `move_track`, `trim_track`
//! - playback: `set_play_start_frame`, `set_is_pause`, `on_refresh`
//! - pixels: `flush_composite`, `render_frame`, `timeline_thumbnails`
//! - views: `frame_count`, `line_views`, `player_time`
//!
//! Every mutating action records a composite request for the current frame; hosts call
//! `flush_composite()` once per refresh (`on_refresh` does it for them).

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use indexmap::IndexMap;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::config::EditorConfig;
use crate::core::compositor::{CompositeReport, Compositor};
use crate::core::decode_cache::{MediaDecodeCache, Thumbnail};
use crate::core::event_bus::{EditorEvent, EventBus};
use crate::core::player::{PlaybackState, Player, Tick};
use crate::core::store::{ByteStream, FsStore, MediaStore};
use crate::core::timeline::{Selection, TrackModel};
use crate::entities::frame::Frame;
use crate::entities::loader_video::default_clip_decoder;
use crate::entities::media::{MediaKind, MediaSource};
use crate::entities::track::{Track, TrackContent, TrackKind};
use crate::entities::traits::ClipDecoder;
use crate::error::DecodeError;
use crate::paths::AppPaths;
use crate::utils;

/// One clip as laid out on the track area
#[derive(Clone, Debug, PartialEq)]
pub struct ItemView {
    pub id: Uuid,
    pub name: String,
    pub left_px: f64,
    pub width_px: f64,
    /// Source duration label, video only
    pub time: Option<String>,
    pub selected: bool,
}

/// One track line as laid out on the track area
#[derive(Clone, Debug, PartialEq)]
pub struct LineView {
    pub kind: TrackKind,
    pub main: bool,
    pub items: Vec<ItemView>,
}

pub struct Editor {
    config: EditorConfig,
    cache: Arc<MediaDecodeCache>,
    model: TrackModel,
    player: Player,
    compositor: Compositor,
    events: EventBus,
    /// Imported sources by content id, in import order
    sources: IndexMap<String, MediaSource>,
}

impl Editor {
    pub fn new(config: EditorConfig, store: Arc<dyn MediaStore>, clips: Arc<dyn ClipDecoder>) -> Self {
        let cache = Arc::new(MediaDecodeCache::new(store, clips, config.cache_settings()));
        let player = Player::new(config.base_fps);
        let compositor = Compositor::new(config.output_width, config.output_height);
        info!(
            "Editor ready: {}x{} @ {} fps",
            config.output_width, config.output_height, config.base_fps
        );
        Self {
            config,
            cache,
            model: TrackModel::new(),
            player,
            compositor,
            events: EventBus::new(),
            sources: IndexMap::new(),
        }
    }

    /// Editor over the directory store in `paths` and the best available video backend
    pub fn open(config: EditorConfig, paths: &AppPaths) -> Result<Self> {
        let store = FsStore::open(paths.media_dir())?;
        Ok(Self::new(config, Arc::new(store), default_clip_decoder()))
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn model(&self) -> &TrackModel {
        &self.model
    }

    pub fn cache(&self) -> &Arc<MediaDecodeCache> {
        &self.cache
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn playback(&self) -> PlaybackState {
        self.player.state()
    }

    pub fn current_frame(&self) -> i32 {
        self.player.current_frame()
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    /// Imported sources in import order
    pub fn sources(&self) -> impl Iterator<Item = &MediaSource> {
        self.sources.values()
    }

    pub fn frame_count(&self) -> i32 {
        self.model.frame_count()
    }

    // ========== Tracks ==========

    /// Decode an uploaded file and place it on the timeline at frame 0.
    ///
    /// `id` is the content hash of the bytes. The loading counter stays up across
    /// decoding, metadata and the thumbnail strip, so the composite requested by the
    /// placement runs once the import is done. On failure nothing is placed.
    pub fn import(
        &mut self,
        id: &str,
        stream: ByteStream,
        mime: &str,
        file_name: &str,
    ) -> Result<(MediaSource, Selection), DecodeError> {
        let guard = self.compositor.loading_guard();
        self.events.emit(EditorEvent::LoadingChanged { loading: self.compositor.loading() });

        let placed = self.import_loading(id, stream, mime, file_name);
        drop(guard);
        self.events.emit(EditorEvent::LoadingChanged { loading: self.compositor.loading() });

        let placed = placed.inspect_err(|e| warn!("Import of {} failed: {}", file_name, e))?;
        self.flush_composite();
        Ok(placed)
    }

    fn import_loading(
        &mut self,
        id: &str,
        stream: ByteStream,
        mime: &str,
        file_name: &str,
    ) -> Result<(MediaSource, Selection), DecodeError> {
        let content = match MediaKind::from_mime(mime) {
            Some(MediaKind::Video) => TrackContent::video(),
            Some(MediaKind::Image) => TrackContent::Image,
            Some(MediaKind::Audio) | None => return Err(DecodeError::Unsupported { mime: mime.to_string() }),
        };
        let media = self.cache.decode(id, Some(stream), Some(mime))?;

        let source = self.cache.describe(id, file_name, mime, &media);
        if let Err(e) = self.cache.thumbnails(&source) {
            warn!("Thumbnails for {} unavailable: {}", file_name, e);
        }
        info!(
            "Imported {} ({}x{}, {} frames) as {}",
            file_name, source.width, source.height, source.frame_count, id
        );
        self.sources.insert(id.to_string(), source.clone());

        let selection = self.add_track(Track::from_source(source.clone(), 0, content));
        Ok((source, selection))
    }

    pub fn add_track(&mut self, track: Track) -> Selection {
        let id = track.id;
        let selection = self.model.add_track(track);
        self.tracks_changed();
        self.events.emit(EditorEvent::SelectionChanged { track: Some(id) });
        selection
    }

    pub fn remove_track(&mut self, line: usize, index: usize) -> Option<Track> {
        let removed = self.model.remove_track(line, index)?;
        debug!("Removed track {} ({})", removed.name, removed.id);
        self.tracks_changed();
        self.events.emit(EditorEvent::SelectionChanged { track: self.model.selected().map(|t| t.id) });
        Some(removed)
    }

    pub fn select_track_by_id(&mut self, id: Uuid) -> Selection {
        let selection = self.model.select_track_by_id(id);
        let track = (!selection.is_none()).then_some(id);
        self.events.emit(EditorEvent::SelectionChanged { track });
        selection
    }

    pub fn move_track(&mut self, line: usize, index: usize, new_start: i32) -> Option<Selection> {
        let selection = self.model.move_track(line, index, new_start)?;
        self.tracks_changed();
        Some(selection)
    }

    pub fn trim_track(&mut self, line: usize, index: usize, new_start: i32, new_end: i32) -> bool {
        let trimmed = self.model.trim_track(line, index, new_start, new_end);
        if trimmed {
            self.tracks_changed();
        }
        trimmed
    }

    fn tracks_changed(&mut self) {
        self.events.emit(EditorEvent::TrackListChanged { frame_count: self.model.frame_count() });
        self.compositor.request(self.player.current_frame());
    }

    // ========== Playback ==========

    /// Scrub to `frame`
    pub fn set_play_start_frame(&mut self, frame: i32) {
        self.player.set_play_start_frame(frame);
        self.frame_changed();
    }

    /// Pause (`true`) or start playback (`false`) now
    pub fn set_is_pause(&mut self, pause: bool) {
        self.set_is_pause_at(pause, Instant::now());
    }

    pub fn set_is_pause_at(&mut self, pause: bool, now: Instant) {
        if pause {
            if self.player.pause() {
                self.pause_active_items();
            }
        } else if self.player.start_play(self.model.frame_count(), now) {
            self.play_active_items();
            self.compositor.request(self.player.current_frame());
        }
        self.events.emit(EditorEvent::PlaybackChanged(self.player.state()));
    }

    /// Host refresh callback: advance playback when due, then composite.
    pub fn on_refresh(&mut self, now: Instant) -> Option<Tick> {
        let tick = self.player.on_refresh(self.model.frame_count(), now);
        if let Some(tick) = tick {
            self.frame_changed();
            if tick.reached_end {
                info!("Reached end of timeline at frame {}", tick.frame);
                self.pause_active_items();
                self.events.emit(EditorEvent::PlaybackChanged(self.player.state()));
            }
        }
        self.flush_composite();
        tick
    }

    fn frame_changed(&mut self) {
        let frame = self.player.current_frame();
        self.events.emit(EditorEvent::FrameChanged { frame });
        if self.player.is_playing() {
            self.play_active_items();
        }
        self.compositor.request(frame);
    }

    fn play_active_items(&mut self) {
        let frame = self.player.current_frame();
        self.model.for_each_active_playable(frame, |track| track.play(frame));
    }

    fn pause_active_items(&mut self) {
        let frame = self.player.current_frame();
        self.model.for_each_active_playable(frame, Track::pause);
    }

    // ========== Pixels ==========

    /// Composite the pending frame request, if any and nothing is loading
    pub fn flush_composite(&mut self) -> Option<Result<CompositeReport, DecodeError>> {
        let result = self.compositor.flush(&self.model, self.cache.as_ref())?;
        if let Ok(report) = &result {
            self.events.emit(EditorEvent::FramePresented { frame: report.frame });
        }
        Some(result)
    }

    /// Composite `frame` right away and return the presented image
    pub fn render_frame(&mut self, frame: i32) -> Result<Frame, DecodeError> {
        let report = self.compositor.composite(&self.model, self.cache.as_ref(), frame)?;
        self.events.emit(EditorEvent::FramePresented { frame: report.frame });
        self.compositor
            .presented()
            .ok_or(DecodeError::FrameUnavailable { id: "composite".to_string(), frame })
    }

    /// Thumbnails to show across the widget of the track at (`line`, `index`)
    pub fn timeline_thumbnails(
        &self,
        line: usize,
        index: usize,
        container_width: f64,
    ) -> Result<Vec<Thumbnail>, DecodeError> {
        let Some(track) = self.model.track(line, index) else {
            return Ok(Vec::new());
        };
        let Some(source) = &track.source else {
            return Ok(Vec::new());
        };
        let strip = {
            let _loading = self.compositor.loading_guard();
            self.cache.thumbnails(source)?
        };
        let count = utils::thumbnail_display_count(container_width, track.frame_count, track.len());
        Ok(utils::uniform_subarray(&strip, count))
    }

    // ========== Views ==========

    /// `current / total` timecodes for the player bar
    pub fn player_time(&self) -> (String, String) {
        (
            utils::format_player_time(self.player.current_frame()),
            utils::format_player_time(self.model.frame_count()),
        )
    }

    /// Pixel layout of every line at zoom `scale`
    pub fn line_views(&self, scale: u32) -> Vec<LineView> {
        let selection = self.model.selection().get();
        self.model
            .lines()
            .iter()
            .enumerate()
            .map(|(line_idx, line)| LineView {
                kind: line.kind,
                main: line.main,
                items: line
                    .list
                    .iter()
                    .enumerate()
                    .map(|(idx, track)| ItemView {
                        id: track.id,
                        name: track.name.clone(),
                        left_px: utils::grid_pixel(scale, track.start),
                        width_px: utils::grid_pixel(scale, track.len()),
                        time: match (&track.content, &track.source) {
                            (TrackContent::Video { .. }, Some(source)) => Some(utils::format_time(source.duration_ms)),
                            _ => None,
                        },
                        selected: selection == Some((line_idx, idx)),
                    })
                    .collect(),
            })
            .collect()
    }

    /// Line views at the configured zoom
    pub fn default_line_views(&self) -> Vec<LineView> {
        self.line_views(self.config.track_scale)
    }

    /// Stop playback and release decoded media. The store keeps its bytes.
    pub fn shutdown(&mut self) {
        self.set_is_pause(true);
        self.cache.clear();
        self.events.clear();
        info!("Editor shut down");
    }
}
