//! Utility functions for timeline display
//!
//! **Why**: Pure conversions shared by the editor views and the headless host:
//! time labels, grid scale mapping and thumbnail sampling
//!
//! **Used by**: editor (line views, thumbnail strips), cli output

/// Frames per second of the timeline clock used by time labels
pub const BASE_FPS: i32 = 30;

/// Timecode `HH:MM:SS:FF` of a frame count at 30 fps
pub fn format_player_time(frames: i32) -> String {
    let frames = frames.max(0);
    let ff = frames % BASE_FPS;
    let total_secs = frames / BASE_FPS;
    let ss = total_secs % 60;
    let mm = (total_secs / 60) % 60;
    let hh = total_secs / 3600;
    format!("{:02}:{:02}:{:02}:{:02}", hh, mm, ss, ff)
}

/// Duration label `mm:ss`, or `hh:mm:ss` from one hour. Seconds round up.
pub fn format_time(ms: u64) -> String {
    let secs = ms.div_ceil(1000);
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// Pixel width of one grid cell at track zoom `scale` (0..=100, steps of 10).
///
/// At scale >= 70 a cell is one frame, at 30..70 one second, below 30 six seconds.
pub fn grid_size(scale: u32) -> u32 {
    match scale {
        100 => 100,
        90 => 50,
        80 => 20,
        70 => 10,
        60 => 80,
        50 => 40,
        40 => 20,
        30 => 10,
        20 => 40,
        10 => 25,
        0 => 10,
        _ => 100,
    }
}

/// Pixels covered by `frames` at zoom `scale`
pub fn grid_pixel(scale: u32, frames: i32) -> f64 {
    let mut px = grid_size(scale) as f64 * frames as f64;
    if scale < 70 {
        px /= BASE_FPS as f64;
    }
    if scale < 30 {
        px /= 6.0;
    }
    px
}

/// Pixels per frame at zoom `scale`
pub fn pixels_per_frame(scale: u32) -> f64 {
    grid_pixel(scale, 1)
}

/// Frame under horizontal pixel offset `offset_x` of the ruler.
///
/// `step` is the number of frames per grid cell at coarse zoom (normally 30).
pub fn frame_at_pixel(offset_x: f64, scale: u32, step: i32) -> i32 {
    let mut x = offset_x;
    if scale < 70 {
        x *= step as f64;
    }
    if scale < 30 {
        x *= 6.0;
    }
    let frame = (x / grid_size(scale) as f64).floor() as i32;
    if scale < 70 { frame + 1 } else { frame }
}

/// Up to `m` items picked at even spacing over `items`, first item included.
pub fn uniform_subarray<T: Clone>(items: &[T], m: usize) -> Vec<T> {
    let len = items.len();
    if len == 0 || m == 0 {
        return Vec::new();
    }
    let interval = len as f64 / m as f64;
    let mut out = Vec::with_capacity(m.min(len));
    let mut i = 0.0f64;
    while i < len as f64 && out.len() < m {
        let idx = (i.round() as usize).min(len - 1);
        out.push(items[idx].clone());
        i += interval;
    }
    out
}

/// Thumbnails shown across a clip widget `container_width` pixels wide.
///
/// One thumbnail per 50 px of the untrimmed clip width (`frame_count` frames,
/// `shown_frames` of them visible).
pub fn thumbnail_display_count(container_width: f64, frame_count: i32, shown_frames: i32) -> usize {
    if shown_frames <= 0 || container_width <= 0.0 {
        return 0;
    }
    (container_width * frame_count as f64 / shown_frames as f64 / 50.0).ceil().max(0.0) as usize
}
