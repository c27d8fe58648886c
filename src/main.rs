use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use uuid::Uuid;

use framecut::cli::Args;
use framecut::config::EditorConfig;
use framecut::editor::Editor;
use framecut::entities::media::{mime_from_extension, split_name};
use framecut::paths::AppPaths;
use framecut::utils;

fn init_logging(args: &Args, paths: &AppPaths) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt.clone().unwrap_or_else(|| paths.log_file());
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;
        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging, RUST_LOG wins when set
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level.as_str()))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Content id of a file: name-based UUID over its bytes
fn content_id(bytes: &[u8]) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, bytes).simple().to_string()
}

fn import_file(editor: &mut Editor, path: &Path) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let (_, ext) = split_name(&file_name);
    let mime = mime_from_extension(&ext).with_context(|| format!("Unknown media type: {}", file_name))?;

    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let id = content_id(&bytes);
    debug!("{} -> {} ({}, {} bytes)", file_name, id, mime, bytes.len());

    let (source, selection) = editor
        .import(&id, Box::new(std::io::Cursor::new(bytes)), mime, &file_name)
        .with_context(|| format!("Failed to import {}", file_name))?;
    println!(
        "{:<24} {:>5}x{:<5} {:>6} frames  line {} item {}",
        file_name, source.width, source.height, source.frame_count, selection.line, selection.index
    );
    Ok(())
}

fn print_layout(editor: &Editor, scale: u32) {
    for (i, line) in editor.line_views(scale).iter().enumerate() {
        let main = if line.main { " (main)" } else { "" };
        println!("line {} [{:?}]{}", i, line.kind, main);
        for item in &line.items {
            let mark = if item.selected { '*' } else { ' ' };
            println!(
                "  {} {:<24} @{:>8.1}px  {:>8.1}px  {}",
                mark,
                item.name,
                item.left_px,
                item.width_px,
                item.time.as_deref().unwrap_or("")
            );
        }
    }
}

fn play_headless(editor: &mut Editor) {
    let refresh = Duration::from_secs_f64(1.0 / editor.config().refresh_hz.max(1) as f64);
    editor.set_is_pause(false);
    let started = Instant::now();
    while editor.is_playing() {
        if let Some(Err(e)) = editor.flush_composite() {
            warn!("Composite failed: {}", e);
        }
        if let Some(tick) = editor.on_refresh(Instant::now()) {
            if tick.frame % editor.config().base_fps.max(1) as i32 == 0 {
                info!("{}", utils::format_player_time(tick.frame));
            }
        }
        thread::sleep(refresh);
    }
    println!(
        "played to {} in {:.2}s",
        editor.player_time().0,
        started.elapsed().as_secs_f64()
    );
}

fn main() -> Result<()> {
    let args = Args::parse();

    let paths = AppPaths::resolve(args.config_dir.clone());
    if let Err(e) = paths.ensure_dirs() {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }
    init_logging(&args, &paths)?;
    debug!("Command-line args: {:?}", args);
    info!("Config path: {}", paths.config_file().display());
    info!("Media store: {}", paths.media_dir().display());

    let mut config = EditorConfig::load(&paths.config_file())?;
    if let Some(size) = &args.size {
        if let [w, h] = size.as_slice() {
            config.output_width = *w;
            config.output_height = *h;
        }
    }
    let scale = args.scale.unwrap_or(config.track_scale);

    let mut editor = Editor::open(config, &paths)?;
    for path in &args.files {
        if let Err(e) = import_file(&mut editor, path) {
            eprintln!("{:#}", e);
        }
    }

    print_layout(&editor, scale);
    println!("duration {}", utils::format_player_time(editor.frame_count()));

    if let Some(frame) = args.frame {
        editor.set_play_start_frame(frame);
    }

    if let Some(out) = &args.render {
        let frame = editor.current_frame();
        let image = editor
            .render_frame(frame)
            .with_context(|| format!("Failed to composite frame {}", frame))?;
        image
            .image()
            .save(out)
            .with_context(|| format!("Failed to write {}", out.display()))?;
        println!("frame {} -> {}", utils::format_player_time(frame), out.display());
    }

    if args.play {
        play_headless(&mut editor);
    }

    editor.shutdown();
    Ok(())
}
