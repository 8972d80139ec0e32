//! Write a sample timeline to get started with.

use std::path::PathBuf;

use reelcast_scene_model::{Background, Scene, Timeline};

pub fn run(path: PathBuf, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let timeline = sample_timeline();
    timeline
        .save(&path)
        .map_err(|e| anyhow::anyhow!("Failed to write timeline: {e}"))?;

    println!("Sample timeline written to {}", path.display());
    println!("  Scenes: {}", timeline.len());
    println!("  Duration: {:.1}s", timeline.total_duration_ms() / 1000.0);
    println!();
    println!("Next steps:");
    println!("  reelcast preview {}", path.display());
    println!("  reelcast export {} -o intro.webm", path.display());

    Ok(())
}

fn sample_timeline() -> Timeline {
    Timeline::new(vec![
        Scene::new("Welcome to Reelcast", 3.0)
            .with_id("intro")
            .with_subtitle("Title cards, rendered to video")
            .with_background(Background::solid("#1e3a5f")),
        Scene::new("Every scene is a title, a subtitle and a background", 4.0)
            .with_id("anatomy")
            .with_subtitle("Backgrounds can be colors or images: data: URLs, http(s) links or local files")
            .with_background(Background::solid("rgb(64, 32, 96)")),
        Scene::new("Export when ready", 3.0)
            .with_id("outro")
            .with_subtitle("reelcast export timeline.json")
            .with_background(Background::solid("#202020")),
    ])
}
