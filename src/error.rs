//! Error types of the media pipeline.

use std::io;

use thiserror::Error;

/// Decoding failed or the requested pixels are not available.
///
/// Never fatal: callers get it as a value, abort the track construction or the
/// composite pass, and move on. Nothing in the core retries.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("store I/O error for {id}: {source}")]
    Store {
        id: String,
        #[source]
        source: io::Error,
    },

    #[error("no stream supplied and nothing stored for {id}")]
    NotStored { id: String },

    #[error("media type missing for uncached {id}")]
    MissingType { id: String },

    #[error("unsupported media type: {mime}")]
    Unsupported { mime: String },

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("clip backend error: {0}")]
    Clip(String),

    #[error("decoder produced no frames for {id}")]
    Empty { id: String },

    #[error("frame {frame} unavailable for {id}")]
    FrameUnavailable { id: String, frame: i32 },
}

impl DecodeError {
    pub(crate) fn store(id: &str, source: io::Error) -> Self {
        DecodeError::Store { id: id.to_string(), source }
    }
}
