//! Media source record and media type classification.

use serde::{Deserialize, Serialize};

/// Broad media class derived from a MIME type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still or animated image (png, jpeg, gif, webp, ...)
    Image,
    Video,
    Audio,
}

impl MediaKind {
    /// Classify a MIME type like `image/gif` or `video/mp4`.
    ///
    /// Parameters after `;` are ignored, matching is case-insensitive.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        let (top, _) = essence.split_once('/')?;
        match top {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            "audio" => Some(MediaKind::Audio),
            _ => None,
        }
    }
}

/// Metadata of an imported media file.
///
/// Owned by the decode cache registry; tracks keep a copy and refer to the decoded
/// pixels only through `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaSource {
    /// Content hash, also the persistent store key
    pub id: String,
    /// Locator of the stored bytes (see `MediaStore::locate`)
    pub url: String,
    /// Display name without extension
    pub name: String,
    /// File extension / container short name, e.g. "gif", "mp4"
    pub format: String,
    /// Full MIME type used for decoding on a cache miss
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub duration_ms: u64,
    /// Native length in timeline frames
    pub frame_count: i32,
}

impl MediaSource {
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_mime(&self.mime)
    }
}

/// Split a file name into (stem, extension). Extension is lowercased.
pub fn split_name(file_name: &str) -> (String, String) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), ext.to_ascii_lowercase()),
        _ => (file_name.to_string(), String::new()),
    }
}

/// Best-effort MIME type from a file extension (used by the headless host).
pub fn mime_from_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "png" | "apng" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        _ => return None,
    };
    Some(mime)
}
