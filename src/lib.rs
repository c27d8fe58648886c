//! framecut - frame-accurate timeline editor core
//!
//! Track model with overlap-free placement, drift-corrected playback clock,
//! content-keyed media decode cache and a per-frame compositor.

// Core engine (timeline, cache, player, compositor)
pub mod core;

pub mod cli;
pub mod config;
pub mod editor;
pub mod entities;
pub mod error;
pub mod paths;
pub mod utils;

// Re-export commonly used types
pub use config::EditorConfig;
pub use core::decode_cache::MediaDecodeCache;
pub use core::timeline::{Selection, TrackModel};
pub use editor::Editor;
pub use entities::{Frame, MediaSource, Track, TrackContent, TrackKind};
pub use error::DecodeError;
