use clap::Parser;
use std::path::PathBuf;

#[cfg(feature = "ffmpeg")]
const VIDEO_BACKEND: &str = "playa-ffmpeg 8.0 (static)";
#[cfg(not(feature = "ffmpeg"))]
const VIDEO_BACKEND: &str = "none (build with --features ffmpeg)";

// Build version with backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Video:  ", VIDEO_BACKEND, "\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Headless timeline editor: import media, lay it out, render or play a frame
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Media files to import, in order (images, animated GIF/PNG/WebP, video)
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Move the playhead to this frame before rendering or playing
    #[arg(long = "frame", value_name = "N")]
    pub frame: Option<i32>,

    /// Composite the current frame and write it as PNG
    #[arg(short = 'r', long = "render", value_name = "PNG")]
    pub render: Option<PathBuf>,

    /// Play from the current frame to the end of the timeline
    #[arg(short = 'p', long = "play")]
    pub play: bool,

    /// Track zoom used for the printed layout (0..=100, steps of 10)
    #[arg(short = 's', long = "scale", value_name = "N")]
    pub scale: Option<u32>,

    /// Output size override
    #[arg(long = "size", value_names = ["WIDTH", "HEIGHT"], num_args = 2)]
    pub size: Option<Vec<u32>>,

    /// Enable logging to file (default: framecut.log in the data directory)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
