//! Entities module - timeline data types and media decoding
//!
//! - `track` - tracks and track lines
//! - `media` - media source records
//! - `frame` - RGBA frames
//! - `loader`, `loader_video` - image decoding and video clip backends
//! - `traits` - interfaces implemented in `core`

pub mod frame;
pub mod loader;
pub mod loader_video;
pub mod media;
pub mod track;
pub mod traits;

pub use frame::Frame;
pub use loader::Loader;
pub use media::{MediaKind, MediaSource};
pub use track::{Track, TrackContent, TrackKind, TrackLine};
pub use traits::{ClipDecoder, ClipInfo, FrameSource, VideoClip};
