//! Check encoder and font availability.

use std::path::Path;

use reelcast_common::config::{config_file_path, AppConfig};
use reelcast_render_engine::encoder::{preference_order, EncoderBackend, FfmpegBackend};
use reelcast_render_engine::text::load_text_painter;

pub async fn run(config: &AppConfig, config_override: Option<&Path>) -> anyhow::Result<()> {
    println!("Reelcast System Check");
    println!("{}", "=".repeat(50));

    let config_path = config_override
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[--] Config: {} (using defaults)", config_path.display());
    }

    match config.render.validate() {
        Ok(()) => println!(
            "[OK] Surface: {}x{} @ {}fps",
            config.render.width, config.render.height, config.render.fps
        ),
        Err(e) => println!("[ERR] Surface: {e}"),
    }

    let painter = load_text_painter(&config.render);
    if painter.name() == "estimated" {
        println!("[WARN] Fonts: none found; text will not be drawn (set render.title_font / render.body_font)");
    } else {
        println!("[OK] Fonts: {}", painter.name());
    }

    let backend = FfmpegBackend::new(config.export.ffmpeg.clone());
    match backend.version().await {
        Some(version) => println!("[OK] Encoder: {version}"),
        None => println!(
            "[ERR] Encoder: {} not found or not runnable",
            backend.binary().display()
        ),
    }

    println!();
    println!("Codec profiles (in preference order):");
    let mut usable = 0;
    for profile in preference_order(&config.export.codecs) {
        let ok = backend.supports(&profile).await;
        if ok {
            usable += 1;
        }
        println!(
            "  [{}] {:<10} {:<11} {}",
            if ok { "OK" } else { "--" },
            profile.id,
            profile.encoder,
            profile.mime
        );
    }

    println!();
    if usable > 0 {
        println!("Video export is available. Reelcast is ready.");
    } else {
        println!("Video export is not supported on this system. Install ffmpeg with libvpx or libx264.");
    }

    Ok(())
}
