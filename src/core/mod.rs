//! Core engine modules - timeline model, decode cache, playback, compositing
//!
//! These modules form the editor engine, independent of any UI.

pub mod compositor;
pub mod decode_cache;
pub mod event_bus;
pub mod interval;
pub mod player;
pub mod store;
pub mod timeline;

// Re-exports for convenience
pub use compositor::{CompositeReport, Compositor, LoadingGuard};
pub use decode_cache::{CacheSettings, CacheStats, Decoded, DecodedMedia, MediaDecodeCache, Thumbnail};
pub use event_bus::{EditorEvent, EventBus};
pub use interval::{CancelHandle, Poll, PreciseInterval};
pub use player::{PlaybackState, Player, Tick};
pub use store::{ByteStream, FsStore, MediaStore, MemoryStore};
pub use timeline::{Selection, TrackModel};
