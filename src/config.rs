//! Editor configuration (`framecut.json`).
//!
//! Every field has a default, so partial files and a missing file are both valid.

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::decode_cache::CacheSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Timeline frame rate
    pub base_fps: u32,
    /// Composited output size (portrait 1080x1920 / 6)
    pub output_width: u32,
    pub output_height: u32,
    /// Thumbnails sampled per video
    pub thumbnail_count: usize,
    /// Max thumbnail width in pixels
    pub thumbnail_width: u32,
    /// Earliest video frame ever decoded, in base frames
    pub min_video_timestamp_frames: u32,
    /// Timeline length of a still image in frames
    pub still_image_frames: i32,
    /// Track zoom level (0..=100 in steps of 10)
    pub track_scale: u32,
    /// Host refresh rate driving the playback interval
    pub refresh_hz: u32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            base_fps: 30,
            output_width: 1080 / 6,
            output_height: 1920 / 6,
            thumbnail_count: 50,
            thumbnail_width: 100,
            min_video_timestamp_frames: 5,
            still_image_frames: 90,
            track_scale: 60,
            refresh_hz: 60,
        }
    }
}

impl EditorConfig {
    /// Load from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write config: {}", path.display()))?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            base_fps: self.base_fps,
            min_timestamp_frames: self.min_video_timestamp_frames,
            thumbnail_count: self.thumbnail_count,
            thumbnail_width: self.thumbnail_width,
            still_image_frames: self.still_image_frames,
        }
    }
}
