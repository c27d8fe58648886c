//! Media decode cache - content-keyed decoded pixels and thumbnails.
//!
//! **Why**: Decoding is the expensive step of the pipeline. Every decoded media is kept
//! under its content hash so tracks, the compositor and thumbnail strips share one copy.
//!
//! **Used by**: `Editor` (imports, thumbnails), `Compositor` (as the `FrameSource` of draw calls)
//!
//! # Flow of `decode()`
//!
//! ```text
//! hit  -> cached Arc (stream and mime ignored)
//! miss -> stream supplied and id not stored -> write to store
//!      -> always read the bytes back from the store
//!      -> image: Loader (1..N frames)   video: ClipDecoder (clip handle)
//!      -> insert, return
//! ```
//!
//! # Concurrency
//!
//! The cache is shared as `Arc<MediaDecodeCache>`. Maps are locked only for lookups and
//! inserts, never across store I/O or decoding. Two threads missing on the same id both
//! decode it; the first insert wins and the other result is dropped.

use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, trace, warn};

use super::store::{ByteStream, MediaStore};
use crate::entities::frame::Frame;
use crate::entities::loader::Loader;
use crate::entities::media::{split_name, MediaKind, MediaSource};
use crate::entities::traits::{ClipDecoder, FrameSource, VideoClip};
use crate::error::DecodeError;

/// Cache statistics for monitoring
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Timing and sizing knobs of the cache (see `EditorConfig`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheSettings {
    /// Timeline frame rate
    pub base_fps: u32,
    /// Earliest video timestamp ever requested, in base frames
    pub min_timestamp_frames: u32,
    pub thumbnail_count: usize,
    pub thumbnail_width: u32,
    /// Timeline length of a still image
    pub still_image_frames: i32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            base_fps: 30,
            min_timestamp_frames: 5,
            thumbnail_count: 50,
            thumbnail_width: 100,
            still_image_frames: 90,
        }
    }
}

/// Decoded payload: frames for image kinds, a clip handle for video
#[derive(Clone, Debug)]
pub enum Decoded {
    Frames(Arc<[Frame]>),
    Clip(Arc<dyn VideoClip>),
}

impl Decoded {
    /// True when both values share the same decoded data
    pub fn ptr_eq(&self, other: &Decoded) -> bool {
        match (self, other) {
            (Decoded::Frames(a), Decoded::Frames(b)) => Arc::ptr_eq(a, b),
            (Decoded::Clip(a), Decoded::Clip(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Cache entry: decoded data plus the facts needed to build a `MediaSource`
#[derive(Clone, Debug)]
pub struct DecodedMedia {
    pub data: Decoded,
    pub width: u32,
    pub height: u32,
    pub duration_ms: u64,
    /// Native length in timeline frames
    pub frame_count: i32,
}

impl DecodedMedia {
    /// Bytes held by decoded image frames (clip handles are not accounted)
    pub fn mem(&self) -> usize {
        match &self.data {
            Decoded::Frames(frames) => frames.iter().map(Frame::mem).sum(),
            Decoded::Clip(_) => 0,
        }
    }
}

/// Thumbnail sample of a source
#[derive(Clone, Debug)]
pub struct Thumbnail {
    pub frame: Frame,
    pub timestamp: Duration,
}

/// Content-keyed decode cache over a persistent store
pub struct MediaDecodeCache {
    store: Arc<dyn MediaStore>,
    clips: Arc<dyn ClipDecoder>,
    entries: Mutex<IndexMap<String, Arc<DecodedMedia>>>,
    thumbnails: Mutex<IndexMap<String, Arc<[Thumbnail]>>>,
    stats: CacheStats,
    settings: CacheSettings,
}

impl MediaDecodeCache {
    pub fn new(store: Arc<dyn MediaStore>, clips: Arc<dyn ClipDecoder>, settings: CacheSettings) -> Self {
        debug!("MediaDecodeCache created: {:?}", settings);
        Self {
            store,
            clips,
            entries: Mutex::new(IndexMap::new()),
            thumbnails: Mutex::new(IndexMap::new()),
            stats: CacheStats::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn MediaStore> {
        &self.store
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Cached entry without decoding
    pub fn get(&self, id: &str) -> Option<Arc<DecodedMedia>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes of decoded image frames
    pub fn mem(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.values().map(|m| m.mem()).sum()
    }

    /// Decode `id`, or return the cached result.
    ///
    /// On a miss the bytes come from `stream` (persisted first when the store lacks `id`)
    /// or from the store alone. `mime` is required on a miss.
    pub fn decode(
        &self,
        id: &str,
        stream: Option<ByteStream>,
        mime: Option<&str>,
    ) -> Result<Arc<DecodedMedia>, DecodeError> {
        if let Some(hit) = self.get(id) {
            self.stats.record_hit();
            trace!("decode hit: {}", id);
            return Ok(hit);
        }
        self.stats.record_miss();

        let mime = mime.ok_or_else(|| DecodeError::MissingType { id: id.to_string() })?;
        let bytes = self.fetch(id, stream)?;
        debug!("decode miss: {} ({}, {} bytes)", id, mime, bytes.len());

        let media = Arc::new(self.decode_bytes(id, bytes, mime)?);

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.entry(id.to_string()).or_insert(media).clone())
    }

    /// Persist the supplied stream if needed, then read the stored bytes back.
    fn fetch(&self, id: &str, stream: Option<ByteStream>) -> Result<Vec<u8>, DecodeError> {
        let stored = self.store.exists(id).map_err(|e| DecodeError::store(id, e))?;
        match stream {
            Some(mut stream) if !stored => {
                let written = self.store.write(id, stream.as_mut()).map_err(|e| DecodeError::store(id, e))?;
                debug!("stored {} ({} bytes)", id, written);
            }
            Some(_) => trace!("{} already stored, supplied stream unused", id),
            None if !stored => return Err(DecodeError::NotStored { id: id.to_string() }),
            None => {}
        }

        let mut reader = self
            .store
            .stream(id)
            .map_err(|e| DecodeError::store(id, e))?
            .ok_or_else(|| DecodeError::NotStored { id: id.to_string() })?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(|e| DecodeError::store(id, e))?;
        Ok(bytes)
    }

    fn decode_bytes(&self, id: &str, bytes: Vec<u8>, mime: &str) -> Result<DecodedMedia, DecodeError> {
        let fps = self.settings.base_fps.max(1);
        match MediaKind::from_mime(mime) {
            Some(MediaKind::Image) => {
                let image = Loader::load(&bytes, mime)?;
                if image.frames.is_empty() {
                    return Err(DecodeError::Empty { id: id.to_string() });
                }
                let (frame_count, duration_ms) = if image.frames.len() > 1 {
                    (image.frames.len() as i32, image.duration_ms)
                } else {
                    let n = self.settings.still_image_frames.max(1);
                    (n, n as u64 * 1000 / fps as u64)
                };
                Ok(DecodedMedia {
                    data: Decoded::Frames(image.frames.into()),
                    width: image.width,
                    height: image.height,
                    duration_ms,
                    frame_count,
                })
            }
            Some(MediaKind::Video) => {
                let clip = self.clips.open(id, bytes, mime)?;
                let info = clip.info();
                let frame_count = (info.duration.as_secs_f64() * fps as f64).ceil().max(1.0) as i32;
                Ok(DecodedMedia {
                    data: Decoded::Clip(clip),
                    width: info.width,
                    height: info.height,
                    duration_ms: info.duration.as_millis() as u64,
                    frame_count,
                })
            }
            Some(MediaKind::Audio) | None => Err(DecodeError::Unsupported { mime: mime.to_string() }),
        }
    }

    /// Build the `MediaSource` record of a decoded entry.
    pub fn describe(&self, id: &str, file_name: &str, mime: &str, media: &DecodedMedia) -> MediaSource {
        let (name, format) = split_name(file_name);
        MediaSource {
            id: id.to_string(),
            url: self.store.locate(id),
            name,
            format,
            mime: mime.to_string(),
            width: media.width,
            height: media.height,
            duration_ms: media.duration_ms,
            frame_count: media.frame_count,
        }
    }

    /// Timestamp requested for video frame `index`: `max((index - 1) / fps, min)`
    pub fn video_timestamp(&self, index: i32) -> Duration {
        let fps = self.settings.base_fps.max(1) as f64;
        let min = self.settings.min_timestamp_frames as f64 / fps;
        Duration::from_secs_f64(((index - 1) as f64 / fps).max(min))
    }

    /// Thumbnail strip of `source`, generated once per id.
    ///
    /// Video: `thumbnail_count` samples evenly spaced over the duration.
    /// Images: one thumbnail of the first frame.
    pub fn thumbnails(&self, source: &MediaSource) -> Result<Arc<[Thumbnail]>, DecodeError> {
        if let Some(hit) = self.thumbnails.lock().unwrap_or_else(|e| e.into_inner()).get(&source.id) {
            return Ok(hit.clone());
        }

        let media = self.decode(&source.id, None, Some(&source.mime))?;
        let width = self.settings.thumbnail_width;
        let strip: Vec<Thumbnail> = match &media.data {
            Decoded::Frames(frames) => frames
                .first()
                .map(|f| Thumbnail { frame: f.thumbnail(width), timestamp: Duration::ZERO })
                .into_iter()
                .collect(),
            Decoded::Clip(clip) => {
                let count = self.settings.thumbnail_count.max(1) as u32;
                let duration = clip.info().duration;
                let mut strip = Vec::with_capacity(count as usize);
                for i in 0..count {
                    let timestamp = duration * i / count;
                    match clip.frame_at(timestamp)? {
                        Some(frame) => strip.push(Thumbnail { frame: frame.thumbnail(width), timestamp }),
                        None => warn!("no frame at {:?} in {}", timestamp, source.id),
                    }
                }
                strip
            }
        };
        debug!("generated {} thumbnail(s) for {}", strip.len(), source.id);

        let mut thumbnails = self.thumbnails.lock().unwrap_or_else(|e| e.into_inner());
        Ok(thumbnails.entry(source.id.clone()).or_insert_with(|| strip.into()).clone())
    }

    /// Drop the decoded data and thumbnails of `id`. The store keeps its bytes.
    pub fn forget(&self, id: &str) -> bool {
        self.thumbnails.lock().unwrap_or_else(|e| e.into_inner()).shift_remove(id);
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).shift_remove(id).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.thumbnails.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.stats.reset();
        debug!("MediaDecodeCache cleared");
    }
}

impl FrameSource for MediaDecodeCache {
    fn frame(&self, source: &MediaSource, frame_index: i32) -> Result<Frame, DecodeError> {
        let media = self.decode(&source.id, None, Some(&source.mime))?;
        match &media.data {
            Decoded::Frames(frames) => {
                if frames.is_empty() {
                    return Err(DecodeError::Empty { id: source.id.clone() });
                }
                let i = frame_index.rem_euclid(frames.len() as i32) as usize;
                Ok(frames[i].clone())
            }
            Decoded::Clip(clip) => clip
                .frame_at(self.video_timestamp(frame_index))?
                .ok_or_else(|| DecodeError::FrameUnavailable { id: source.id.clone(), frame: frame_index }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::store::MemoryStore;
    use crate::entities::loader::tests::{gif_bytes, png_bytes};
    use crate::entities::traits::ClipInfo;
    use std::io::Cursor;

    /// Clip whose frames are solid gray, brightness = timestamp in tenths of a second
    #[derive(Debug)]
    pub(crate) struct FakeClip {
        pub(crate) info: ClipInfo,
        pub(crate) requests: Mutex<Vec<Duration>>,
    }

    impl VideoClip for FakeClip {
        fn info(&self) -> ClipInfo {
            self.info
        }

        fn frame_at(&self, timestamp: Duration) -> Result<Option<Frame>, DecodeError> {
            self.requests.lock().unwrap().push(timestamp);
            if timestamp > self.info.duration {
                return Ok(None);
            }
            let v = (timestamp.as_millis() / 100).min(255) as u8;
            Ok(Some(Frame::filled(self.info.width, self.info.height, [v, v, v, 255])))
        }
    }

    /// Opens every video as a `FakeClip` of fixed size and duration
    pub(crate) struct FakeClipDecoder {
        pub(crate) duration: Duration,
        pub(crate) opened: Mutex<Vec<Arc<FakeClip>>>,
    }

    impl FakeClipDecoder {
        pub(crate) fn new(duration: Duration) -> Self {
            Self { duration, opened: Mutex::new(Vec::new()) }
        }
    }

    impl ClipDecoder for FakeClipDecoder {
        fn open(&self, _id: &str, bytes: Vec<u8>, _mime: &str) -> Result<Arc<dyn VideoClip>, DecodeError> {
            if bytes.is_empty() {
                return Err(DecodeError::Clip("empty clip".to_string()));
            }
            let clip = Arc::new(FakeClip {
                info: ClipInfo { width: 16, height: 9, duration: self.duration, fps: 25.0 },
                requests: Mutex::new(Vec::new()),
            });
            self.opened.lock().unwrap().push(clip.clone());
            Ok(clip)
        }
    }

    pub(crate) fn cache_with(store: Arc<MemoryStore>, clips: Arc<FakeClipDecoder>) -> MediaDecodeCache {
        MediaDecodeCache::new(store, clips, CacheSettings::default())
    }

    fn stream(bytes: Vec<u8>) -> Option<ByteStream> {
        Some(Box::new(Cursor::new(bytes)))
    }

    #[test]
    fn test_decode_roundtrip_uses_cache() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone(), Arc::new(FakeClipDecoder::new(Duration::from_secs(1))));

        let first = cache.decode("h1", stream(png_bytes(4, 4, [1, 2, 3, 255])), Some("image/png")).unwrap();
        assert_eq!(store.writes(), 1);
        let reads = store.reads();

        let second = cache.decode("h1", None, None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.data.ptr_eq(&second.data));
        assert_eq!(store.reads(), reads);
        assert_eq!((cache.stats().hits(), cache.stats().misses()), (1, 1));
    }

    #[test]
    fn test_decode_reads_back_from_store() {
        let store = Arc::new(MemoryStore::new());
        store.write("h2", &mut Cursor::new(png_bytes(2, 2, [9, 9, 9, 255]))).unwrap();
        let cache = cache_with(store.clone(), Arc::new(FakeClipDecoder::new(Duration::from_secs(1))));

        let media = cache.decode("h2", None, Some("image/png")).unwrap();
        assert_eq!((media.width, media.height), (2, 2));
        assert_eq!(store.reads(), 1);
        // Already stored: supplied stream is not written again
        cache.forget("h2");
        cache.decode("h2", stream(vec![0u8; 3]), Some("image/png")).unwrap();
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_decode_errors() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store, Arc::new(FakeClipDecoder::new(Duration::from_secs(1))));

        let err = cache.decode("none", None, Some("image/png")).unwrap_err();
        assert!(matches!(err, DecodeError::NotStored { .. }));

        let err = cache.decode("untyped", stream(png_bytes(1, 1, [0; 4])), None).unwrap_err();
        assert!(matches!(err, DecodeError::MissingType { .. }));

        let err = cache.decode("broken", stream(b"garbage".to_vec()), Some("image/png")).unwrap_err();
        assert!(matches!(err, DecodeError::Image(_)));
        assert!(!cache.contains("broken"));

        let err = cache.decode("sound", stream(vec![1, 2]), Some("audio/mpeg")).unwrap_err();
        assert!(matches!(err, DecodeError::Unsupported { .. }));
    }

    #[test]
    fn test_image_frames_loop() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store, Arc::new(FakeClipDecoder::new(Duration::from_secs(1))));
        let colors = [[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]];
        let media = cache.decode("gif", stream(gif_bytes(2, 2, &colors)), Some("image/gif")).unwrap();
        assert_eq!(media.frame_count, 3);
        assert_eq!(media.duration_ms, 300);

        let source = cache.describe("gif", "anim.GIF", "image/gif", &media);
        assert_eq!((source.name.as_str(), source.format.as_str()), ("anim", "gif"));
        assert_eq!(source.url, "memory://gif");

        assert_eq!(cache.frame(&source, 0).unwrap().pixel(0, 0), Some(colors[0]));
        assert_eq!(cache.frame(&source, 4).unwrap().pixel(0, 0), Some(colors[1]));
        assert_eq!(cache.frame(&source, -1).unwrap().pixel(0, 0), Some(colors[2]));
    }

    #[test]
    fn test_still_image_length() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store, Arc::new(FakeClipDecoder::new(Duration::from_secs(1))));
        let media = cache.decode("png", stream(png_bytes(3, 3, [0; 4])), Some("image/png")).unwrap();
        assert_eq!(media.frame_count, 90);
        assert_eq!(media.duration_ms, 3000);
        assert_eq!(media.mem(), 3 * 3 * 4);
    }

    #[test]
    fn test_video_timestamps() {
        let store = Arc::new(MemoryStore::new());
        let clips = Arc::new(FakeClipDecoder::new(Duration::from_secs(10)));
        let cache = cache_with(store, clips.clone());
        let media = cache.decode("vid", stream(vec![1, 2, 3]), Some("video/mp4")).unwrap();
        assert_eq!(media.frame_count, 300);
        assert_eq!((media.width, media.height), (16, 9));

        // Early frames clamp to 5/30 s
        assert_eq!(cache.video_timestamp(0), cache.video_timestamp(6));
        assert!((cache.video_timestamp(0).as_secs_f64() - 5.0 / 30.0).abs() < 1e-9);
        assert!((cache.video_timestamp(31).as_secs_f64() - 1.0).abs() < 1e-9);

        let source = cache.describe("vid", "clip.mp4", "video/mp4", &media);
        let frame = cache.frame(&source, 61).unwrap();
        assert_eq!(frame.pixel(0, 0), Some([20, 20, 20, 255]));

        let err = cache.frame(&source, 30 * 11).unwrap_err();
        assert!(matches!(err, DecodeError::FrameUnavailable { frame: 330, .. }));
    }

    #[test]
    fn test_thumbnails_generated_once() {
        let store = Arc::new(MemoryStore::new());
        let clips = Arc::new(FakeClipDecoder::new(Duration::from_secs(10)));
        let cache = cache_with(store, clips.clone());
        let media = cache.decode("vid", stream(vec![1]), Some("video/mp4")).unwrap();
        let source = cache.describe("vid", "clip.mp4", "video/mp4", &media);

        let strip = cache.thumbnails(&source).unwrap();
        assert_eq!(strip.len(), 50);
        assert_eq!(strip[1].timestamp, Duration::from_millis(200));
        assert_eq!(strip[49].timestamp, Duration::from_millis(9800));

        let again = cache.thumbnails(&source).unwrap();
        assert!(Arc::ptr_eq(&strip, &again));
        let clip = clips.opened.lock().unwrap()[0].clone();
        assert_eq!(clip.requests.lock().unwrap().len(), 50);
    }

    #[test]
    fn test_image_thumbnail_downscaled() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store, Arc::new(FakeClipDecoder::new(Duration::from_secs(1))));
        let media = cache.decode("big", stream(png_bytes(400, 200, [5; 4])), Some("image/png")).unwrap();
        let source = cache.describe("big", "big.png", "image/png", &media);

        let strip = cache.thumbnails(&source).unwrap();
        assert_eq!(strip.len(), 1);
        assert_eq!(strip[0].frame.resolution(), (100, 50));
    }

    #[test]
    fn test_forget_and_clear() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone(), Arc::new(FakeClipDecoder::new(Duration::from_secs(1))));
        cache.decode("a", stream(png_bytes(1, 1, [0; 4])), Some("image/png")).unwrap();
        cache.decode("b", stream(png_bytes(1, 1, [0; 4])), Some("image/png")).unwrap();
        assert_eq!(cache.len(), 2);

        assert!(cache.forget("a"));
        assert!(!cache.forget("a"));
        assert!(!cache.contains("a"));
        // Bytes survive in the store, so a re-decode needs no stream
        cache.decode("a", None, Some("image/png")).unwrap();

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(store.len(), 2);
    }
}
