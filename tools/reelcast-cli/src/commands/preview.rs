//! Real-time preview in the terminal.

use std::io::Write;
use std::path::PathBuf;

use reelcast_common::config::AppConfig;
use reelcast_common::error::ReelResult;
use reelcast_render_engine::player::{FrameSink, FrameStamp, Player, RunOutcome};
use reelcast_render_engine::surface::Surface;

/// Prints the playhead and optionally snapshots each scene's first frame.
struct TerminalSink {
    scenes: usize,
    snapshots: Option<PathBuf>,
}

#[async_trait::async_trait]
impl FrameSink for TerminalSink {
    async fn present(&mut self, surface: &Surface, stamp: FrameStamp) -> ReelResult<()> {
        if stamp.frame_in_scene == 0 {
            if let Some(dir) = &self.snapshots {
                let path = dir.join(format!("scene-{:03}.png", stamp.scene_index + 1));
                surface.save_png(&path)?;
            }
        }
        print!(
            "\r  Scene {}/{}  frame {}  ",
            stamp.scene_index + 1,
            self.scenes,
            stamp.frame_index + 1
        );
        let _ = std::io::stdout().flush();
        Ok(())
    }
}

pub async fn run(config: AppConfig, path: PathBuf, snapshots: Option<PathBuf>) -> anyhow::Result<()> {
    let timeline = super::load_timeline(&path)?;
    let player = Player::from_config(&config)?;

    println!("Previewing {} (Ctrl-C to stop)", path.display());
    if let Some(dir) = &snapshots {
        std::fs::create_dir_all(dir)?;
        println!("  Snapshots: {}", dir.display());
    }

    let mut sink = TerminalSink {
        scenes: timeline.len(),
        snapshots,
    };

    let playback = player.preview(&timeline, &mut sink);
    tokio::pin!(playback);

    let outcome = tokio::select! {
        outcome = &mut playback => outcome,
        _ = tokio::signal::ctrl_c() => {
            player.cancel();
            playback.await
        }
    }?;

    match outcome {
        RunOutcome::Completed { frames } => println!("\nPreview finished ({frames} frames)"),
        RunOutcome::Cancelled { frames } => println!("\nPreview stopped after {frames} frames"),
        RunOutcome::Ignored => println!("\nAnother run is active; preview ignored"),
    }

    Ok(())
}
