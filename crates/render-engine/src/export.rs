//! Export configuration and job management.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reelcast_common::config::AppConfig;
use reelcast_common::error::{ReelError, ReelResult};
use reelcast_scene_model::{IssueSeverity, Timeline};

use crate::assets::ImageResolver;
use crate::compositor::{Compositor, FrameReport};
use crate::encoder::Artifact;
use crate::player::{ExportOutcome, Player};
use crate::surface::Surface;
use crate::text::load_text_painter;

/// An export job ready to be rendered.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Timeline snapshot to render.
    pub timeline: Timeline,

    /// Output file path. The extension is replaced when it does not match
    /// the container that was actually produced.
    pub output_path: PathBuf,

    /// Render, export and asset settings.
    pub config: AppConfig,
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Export progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    /// Percent complete, `[0, 100]`.
    pub percent: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Current stage.
    pub stage: ExportStage,
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
    Failed,
}

/// Export the timeline to a video file.
///
/// This is the main entry point for rendering. Returns the path actually
/// written.
pub async fn export_timeline(
    job: ExportJob,
    progress: Option<ProgressCallback>,
) -> ReelResult<PathBuf> {
    let player = Player::from_config(&job.config)?;
    export_with_player(&player, job, progress).await
}

/// [`export_timeline`] on a caller-supplied player.
pub async fn export_with_player(
    player: &Player,
    job: ExportJob,
    progress: Option<ProgressCallback>,
) -> ReelResult<PathBuf> {
    let fps = player.settings().fps;
    let total_frames = job.timeline.total_frames(fps);

    tracing::info!(
        output = %job.output_path.display(),
        scenes = job.timeline.len(),
        total_frames,
        fps,
        "Starting export"
    );

    for issue in job.timeline.validate() {
        match issue.severity {
            IssueSeverity::Error => tracing::warn!(%issue, "Timeline problem"),
            IssueSeverity::Warning => tracing::debug!(%issue, "Timeline note"),
        }
    }

    let report = |percent: f64, stage: ExportStage| {
        if let Some(cb) = &progress {
            let frames_rendered = ((percent / 100.0) * total_frames as f64).round() as u64;
            cb(ExportProgress {
                percent,
                frames_rendered: frames_rendered.min(total_frames),
                total_frames,
                stage,
            });
        }
    };

    report(0.0, ExportStage::Preparing);

    let mut rx = player.progress();
    let export = player.export(&job.timeline);
    tokio::pin!(export);

    let mut watching = true;
    let outcome = loop {
        tokio::select! {
            outcome = &mut export => break outcome,
            changed = rx.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                let percent = *rx.borrow_and_update();
                let stage = if percent >= 100.0 {
                    ExportStage::Finalizing
                } else {
                    ExportStage::Rendering
                };
                report(percent, stage);
            }
        }
    };

    let artifact = match outcome {
        Ok(ExportOutcome::Finished(artifact)) => artifact,
        Ok(ExportOutcome::Ignored) => {
            report(0.0, ExportStage::Failed);
            return Err(ReelError::playback("an export is already running"));
        }
        Err(e) => {
            report(0.0, ExportStage::Failed);
            return Err(e);
        }
    };

    let path = output_path_for(&job.output_path, &artifact);
    if let Err(e) = artifact.write_to(&path).await {
        report(0.0, ExportStage::Failed);
        return Err(e);
    }

    tracing::info!(
        path = %path.display(),
        profile = artifact.profile.id,
        mime = %artifact.mime,
        frames = artifact.frames,
        bytes = artifact.len(),
        "Export written"
    );
    report(100.0, ExportStage::Complete);

    Ok(path)
}

/// `requested` with its extension swapped for the artifact's container.
fn output_path_for(requested: &Path, artifact: &Artifact) -> PathBuf {
    let expected = artifact.profile.extension;
    let matches = requested
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(expected));
    if matches {
        return requested.to_path_buf();
    }

    let corrected = requested.with_extension(expected);
    tracing::warn!(
        requested = %requested.display(),
        written = %corrected.display(),
        profile = artifact.profile.id,
        "Output extension adjusted to match container"
    );
    corrected
}

/// Composite a single scene and save it as a PNG.
pub async fn render_still(
    timeline: &Timeline,
    scene_index: usize,
    config: &AppConfig,
    path: &Path,
) -> ReelResult<FrameReport> {
    config.render.validate()?;
    let scene = timeline.scenes.get(scene_index).ok_or_else(|| {
        ReelError::timeline(format!(
            "scene {} does not exist (timeline has {})",
            scene_index + 1,
            timeline.len()
        ))
    })?;

    let resolver = Arc::new(ImageResolver::new(config.assets.clone()));
    let mut compositor = Compositor::new(resolver, load_text_painter(&config.render));
    let mut surface = Surface::new(config.render.width, config.render.height);

    let report = compositor.composite(&mut surface, scene).await;
    surface.save_png(path)?;

    tracing::info!(
        path = %path.display(),
        scene = scene_index,
        background = ?report.background,
        "Still written"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::CODEC_PROFILES;
    use reelcast_scene_model::{Background, Scene};

    #[test]
    fn test_output_extension_is_corrected() {
        let webm = Artifact::new(Vec::new(), CODEC_PROFILES[0], 0);
        assert_eq!(
            output_path_for(Path::new("/tmp/out/video.mp4"), &webm),
            PathBuf::from("/tmp/out/video.webm")
        );
        assert_eq!(
            output_path_for(Path::new("clip.WEBM"), &webm),
            PathBuf::from("clip.WEBM")
        );
        assert_eq!(
            output_path_for(Path::new("clip"), &webm),
            PathBuf::from("clip.webm")
        );
    }

    #[tokio::test]
    async fn test_render_still_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stills").join("frame.png");
        let mut config = AppConfig::default();
        config.render.width = 128;
        config.render.height = 72;
        config.assets.allow_remote = false;

        let timeline = Timeline::new(vec![
            Scene::new("First", 1.0),
            Scene::new("Second", 1.0).with_background(Background::solid("#204060")),
        ]);

        render_still(&timeline, 1, &config, &path).await.unwrap();

        let image = image::open(&path).unwrap().to_rgba8();
        assert_eq!(image.dimensions(), (128, 72));
        assert_eq!(image.get_pixel(0, 0).0, [0x20, 0x40, 0x60, 255]);
    }

    #[tokio::test]
    async fn test_render_still_rejects_missing_scene() {
        let dir = tempfile::tempdir().unwrap();
        let err = render_still(
            &Timeline::default(),
            0,
            &AppConfig::default(),
            &dir.path().join("x.png"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReelError::Timeline { .. }));
    }
}
