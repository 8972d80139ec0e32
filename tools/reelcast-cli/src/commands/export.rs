//! Export a timeline to video.

use std::io::Write;
use std::path::PathBuf;

use reelcast_common::config::{AppConfig, Pacing};
use reelcast_render_engine::export::{export_timeline, ExportJob, ExportProgress, ExportStage};

/// Command-line overrides applied on top of the loaded config.
pub struct Overrides {
    pub fps: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub unthrottled: bool,
    pub codecs: Vec<String>,
}

pub async fn run(
    mut config: AppConfig,
    path: PathBuf,
    output: Option<PathBuf>,
    overrides: Overrides,
) -> anyhow::Result<()> {
    println!("Exporting timeline: {}", path.display());

    let timeline = super::load_timeline(&path)?;

    if let Some(fps) = overrides.fps {
        config.render.fps = fps;
    }
    if let Some(width) = overrides.width {
        config.render.width = width;
    }
    if let Some(height) = overrides.height {
        config.render.height = height;
    }
    if overrides.unthrottled {
        config.render.pacing = Pacing::Unthrottled;
    }
    if !overrides.codecs.is_empty() {
        config.export.codecs = overrides.codecs;
    }
    config.render.validate()?;

    let output_path = output.unwrap_or_else(|| {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "timeline".to_string());
        config.output_dir.join(format!("{stem}.webm"))
    });

    println!("  Output: {}", output_path.display());
    println!(
        "  Resolution: {}x{} @ {}fps",
        config.render.width, config.render.height, config.render.fps
    );
    println!(
        "  Scenes: {} ({:.1}s, {} frames)",
        timeline.len(),
        timeline.total_duration_ms() / 1000.0,
        timeline.total_frames(config.render.fps)
    );
    println!("  Pacing: {:?}", config.render.pacing);

    let job = ExportJob {
        timeline,
        output_path,
        config,
    };

    let progress_cb: Box<dyn Fn(ExportProgress) + Send + Sync> = Box::new(|p| {
        let label = match p.stage {
            ExportStage::Preparing => "Preparing",
            ExportStage::Rendering => "Rendering",
            ExportStage::Finalizing => "Finalizing",
            ExportStage::Complete => "Complete",
            ExportStage::Failed => "Failed",
        };
        print!(
            "\r  {label}: {:.1}% ({}/{} frames)  ",
            p.percent, p.frames_rendered, p.total_frames,
        );
        let _ = std::io::stdout().flush();
    });

    match export_timeline(job, Some(progress_cb)).await {
        Ok(written) => {
            println!("\nExport complete: {}", written.display());
            Ok(())
        }
        Err(e) => {
            println!("\nExport failed: {e}");
            Err(e.into())
        }
    }
}
