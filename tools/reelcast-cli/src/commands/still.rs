//! Render one scene to a PNG.

use std::path::PathBuf;

use reelcast_common::config::AppConfig;
use reelcast_render_engine::compositor::BackgroundOutcome;
use reelcast_render_engine::export::render_still;

pub async fn run(config: AppConfig, path: PathBuf, scene: usize, output: PathBuf) -> anyhow::Result<()> {
    if scene == 0 {
        anyhow::bail!("Scene numbers start at 1");
    }
    let timeline = super::load_timeline(&path)?;

    let report = render_still(&timeline, scene - 1, &config, &output).await?;

    println!("Rendered scene {scene} to {}", output.display());
    match report.background {
        BackgroundOutcome::Solid(color) => {
            println!("  Background: #{:02x}{:02x}{:02x}", color.r, color.g, color.b)
        }
        BackgroundOutcome::Image => println!("  Background: image"),
        BackgroundOutcome::Fallback(reason) => println!("  Background: default ({reason})"),
    }
    println!(
        "  Text: {} title line(s), {} subtitle line(s)",
        report.title_lines, report.subtitle_lines
    );

    Ok(())
}
