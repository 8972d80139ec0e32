//! Show timeline information.

use std::path::PathBuf;

use reelcast_common::config::AppConfig;
use reelcast_scene_model::{frames_for_duration, Background};

pub fn run(config: &AppConfig, path: PathBuf, json: bool) -> anyhow::Result<()> {
    let timeline = super::load_timeline(&path)?;
    let fps = config.render.fps;

    if json {
        let scenes: Vec<serde_json::Value> = timeline
            .scenes
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id,
                    "title": s.title,
                    "duration": s.duration_secs,
                    "frames": frames_for_duration(s.duration_secs, fps),
                    "background": s.background,
                })
            })
            .collect();
        let summary = serde_json::json!({
            "path": path,
            "fps": fps,
            "width": config.render.width,
            "height": config.render.height,
            "duration_ms": timeline.total_duration_ms(),
            "frames": timeline.total_frames(fps),
            "scenes": scenes,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Timeline: {}", path.display());
    println!(
        "  Duration: {:.2}s ({} frames @ {fps}fps)",
        timeline.total_duration_ms() / 1000.0,
        timeline.total_frames(fps)
    );
    println!(
        "  Surface: {}x{}",
        config.render.width, config.render.height
    );
    println!();

    println!("Scenes:");
    for (index, scene) in timeline.scenes.iter().enumerate() {
        let background = match &scene.background {
            Background::Solid { color } if color.is_empty() => "default".to_string(),
            Background::Solid { color } => color.clone(),
            Background::Image { reference } if reference.starts_with("data:") => {
                "image (embedded)".to_string()
            }
            Background::Image { reference } => format!("image {reference}"),
        };
        let id = if scene.id.is_empty() { "-" } else { scene.id.as_str() };
        println!(
            "  {:>3}. [{id}] {:.2}s, {} frames, {background}",
            index + 1,
            scene.duration_secs,
            scene.frame_count(fps)
        );
        println!("       {}", scene.title);
        if !scene.subtitle.is_empty() {
            println!("       {}", scene.subtitle);
        }
    }

    Ok(())
}
