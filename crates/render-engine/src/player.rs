//! Timeline player: drives the compositor frame by frame for live preview
//! or for export into an encoder session.
//!
//! A `Player` runs at most one timeline at a time. The shared surface is
//! held for the whole run, so a second run can only draw once the first has
//! torn down.
//!
//! Lifecycle:
//! ```text
//! Idle -> Running(mode) -> Idle     (completed or cancelled)
//!                       -> Failed   (encoder or sink error)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use reelcast_common::clock::{DriftMeasurement, FramePacer, RunClock};
use reelcast_common::config::{AppConfig, Pacing};
use reelcast_common::error::{ReelError, ReelResult};
use reelcast_scene_model::Timeline;
use tokio::sync::{broadcast, watch, Mutex};

use crate::assets::ImageResolver;
use crate::compositor::{BackgroundOutcome, Compositor};
use crate::encoder::{
    preference_order, start_session, Artifact, CodecProfile, EncodeParams, EncoderBackend,
    FfmpegBackend, LiveSession,
};
use crate::surface::Surface;
use crate::text::load_text_painter;

/// Drift beyond this is logged as a warning at run end.
const DRIFT_WARN_MS: f64 = 250.0;

/// What a run produces frames for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunMode {
    Preview,
    Export,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Preview => "preview",
            RunMode::Export => "export",
        }
    }
}

/// Player lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running(RunMode),
    Failed,
}

/// Lifecycle notifications, one `Started` and exactly one terminal event
/// per admitted run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Started { run_id: u64, mode: RunMode },
    Cancelled { run_id: u64, mode: RunMode, frames: u64 },
    Completed { run_id: u64, mode: RunMode, frames: u64 },
    Failed { run_id: u64, mode: RunMode, reason: String },
}

/// Result of a preview request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { frames: u64 },
    Cancelled { frames: u64 },
    /// Another run already owned the player.
    Ignored,
}

/// Result of an export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Finished(Artifact),
    /// An export was already running.
    Ignored,
}

/// Position of a delivered frame within the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStamp {
    /// Index across the whole run.
    pub frame_index: u64,
    pub scene_index: usize,
    pub frame_in_scene: u64,
}

/// Receives preview frames.
#[async_trait::async_trait]
pub trait FrameSink: Send {
    /// Called once per frame with the freshly composited surface.
    async fn present(&mut self, surface: &Surface, stamp: FrameStamp) -> ReelResult<()>;
}

/// Sink that drops every frame.
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait::async_trait]
impl FrameSink for NullSink {
    async fn present(&mut self, _surface: &Surface, _stamp: FrameStamp) -> ReelResult<()> {
        Ok(())
    }
}

/// Surface geometry, timing and encoding choices for a player.
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub pacing: Pacing,
    pub video_bitrate_kbps: u32,
    /// Codec profiles in preference order.
    pub codecs: Vec<CodecProfile>,
}

impl PlayerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            width: config.render.width,
            height: config.render.height,
            fps: config.render.fps,
            pacing: config.render.pacing,
            video_bitrate_kbps: config.export.video_bitrate_kbps,
            codecs: preference_order(&config.export.codecs),
        }
    }

    pub fn encode_params(&self) -> EncodeParams {
        EncodeParams {
            width: self.width,
            height: self.height,
            fps: self.fps,
            video_bitrate_kbps: self.video_bitrate_kbps,
        }
    }
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Everything a run draws with. Held exclusively by the active run.
struct Stage {
    surface: Surface,
    compositor: Compositor,
}

struct ActiveRun {
    id: u64,
    mode: RunMode,
    cancel: Arc<AtomicBool>,
}

struct Registry {
    active: Option<ActiveRun>,
    state: RunState,
    next_id: u64,
}

/// Admission to run. Releases the registry entry when dropped, unless a
/// newer run has already replaced it.
struct RunTicket<'a> {
    registry: &'a StdMutex<Registry>,
    id: u64,
    mode: RunMode,
    cancel: Arc<AtomicBool>,
    final_state: RunState,
}

impl RunTicket<'_> {
    fn finish(mut self, state: RunState) {
        self.final_state = state;
    }
}

impl Drop for RunTicket<'_> {
    fn drop(&mut self) {
        let mut registry = lock(self.registry);
        if registry.active.as_ref().is_some_and(|a| a.id == self.id) {
            registry.active = None;
            registry.state = self.final_state;
        }
    }
}

fn lock(registry: &StdMutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum Output<'a> {
    Sink(&'a mut dyn FrameSink),
    Encoder(&'a mut LiveSession),
}

enum Played {
    Completed { frames: u64 },
    Cancelled { frames: u64 },
}

/// Plays timelines onto a fixed-size surface.
pub struct Player {
    settings: PlayerSettings,
    stage: Mutex<Stage>,
    registry: StdMutex<Registry>,
    progress: watch::Sender<f64>,
    events: broadcast::Sender<RunEvent>,
    backend: Arc<dyn EncoderBackend>,
}

impl Player {
    pub fn new(
        settings: PlayerSettings,
        compositor: Compositor,
        backend: Arc<dyn EncoderBackend>,
    ) -> Self {
        let surface = Surface::new(settings.width, settings.height);
        let (progress, _) = watch::channel(0.0);
        let (events, _) = broadcast::channel(64);

        Self {
            settings,
            stage: Mutex::new(Stage {
                surface,
                compositor,
            }),
            registry: StdMutex::new(Registry {
                active: None,
                state: RunState::Idle,
                next_id: 1,
            }),
            progress,
            events,
            backend,
        }
    }

    /// Build a player with the ffmpeg backend, system fonts and the image
    /// resolver configured in `config`.
    pub fn from_config(config: &AppConfig) -> ReelResult<Self> {
        config.render.validate()?;

        let resolver = Arc::new(ImageResolver::new(config.assets.clone()));
        let compositor = Compositor::new(resolver, load_text_painter(&config.render));
        let backend = Arc::new(FfmpegBackend::new(config.export.ffmpeg.clone()));

        Ok(Self::new(
            PlayerSettings::from_config(config),
            compositor,
            backend,
        ))
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    /// Percent complete of the current or last run, in `[0, 100]`.
    pub fn progress(&self) -> watch::Receiver<f64> {
        self.progress.subscribe()
    }

    /// Lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> RunState {
        lock(&self.registry).state
    }

    /// Ask a running preview to stop before its next frame.
    ///
    /// Returns `false` when no preview is running. Exports cannot be
    /// cancelled once started.
    pub fn cancel(&self) -> bool {
        let registry = lock(&self.registry);
        match &registry.active {
            Some(active) if active.mode == RunMode::Preview => {
                active.cancel.store(true, Ordering::SeqCst);
                tracing::info!(run_id = active.id, "Preview cancellation requested");
                true
            }
            Some(active) => {
                tracing::debug!(run_id = active.id, "Ignoring cancel during export");
                false
            }
            None => false,
        }
    }

    /// Play `timeline` in real time, handing every frame to `sink`.
    ///
    /// Ignored while another run is active.
    pub async fn preview(
        &self,
        timeline: &Timeline,
        sink: &mut dyn FrameSink,
    ) -> ReelResult<RunOutcome> {
        let Some(ticket) = self.admit(RunMode::Preview) else {
            return Ok(RunOutcome::Ignored);
        };

        let mut guard = self.stage.lock().await;
        self.begin(&ticket, timeline);

        let stage: &mut Stage = &mut guard;
        let played = self
            .play(
                stage,
                timeline,
                Some(ticket.cancel.as_ref()),
                Output::Sink(sink),
            )
            .await;

        // A preempting export must not start before this run's terminal event.
        match played {
            Ok(Played::Completed { frames }) => {
                self.complete(ticket, frames);
                Ok(RunOutcome::Completed { frames })
            }
            Ok(Played::Cancelled { frames }) => {
                self.cancelled(ticket, frames);
                Ok(RunOutcome::Cancelled { frames })
            }
            Err(e) => {
                drop(guard);
                Err(self.fail(ticket, e))
            }
        }
    }

    /// Render `timeline` into an encoded artifact.
    ///
    /// A running preview is cancelled and awaited first; a running export
    /// makes this a no-op.
    pub async fn export(&self, timeline: &Timeline) -> ReelResult<ExportOutcome> {
        let Some(ticket) = self.admit(RunMode::Export) else {
            return Ok(ExportOutcome::Ignored);
        };

        let mut guard = self.stage.lock().await;
        self.begin(&ticket, timeline);

        let params = self.settings.encode_params();
        let mut session =
            match start_session(self.backend.as_ref(), &params, &self.settings.codecs).await {
                Ok(session) => session,
                Err(e) => {
                    drop(guard);
                    return Err(self.fail(ticket, e));
                }
            };

        if timeline.is_empty() {
            let profile = session.profile();
            session.abort().await;
            drop(guard);
            self.complete(ticket, 0);
            return Ok(ExportOutcome::Finished(Artifact::new(Vec::new(), profile, 0)));
        }

        let stage: &mut Stage = &mut guard;
        let played = self
            .play(stage, timeline, None, Output::Encoder(&mut session))
            .await;

        let frames = match played {
            Ok(Played::Completed { frames }) | Ok(Played::Cancelled { frames }) => frames,
            Err(e) => {
                session.abort().await;
                drop(guard);
                return Err(self.fail(ticket, e));
            }
        };

        let finalized = session.finalize().await;
        drop(guard);

        match finalized {
            Ok(artifact) => {
                self.complete(ticket, frames);
                Ok(ExportOutcome::Finished(artifact))
            }
            Err(e) => Err(self.fail(ticket, e)),
        }
    }

    fn admit(&self, mode: RunMode) -> Option<RunTicket<'_>> {
        let mut registry = lock(&self.registry);

        if let Some(active) = &registry.active {
            match (active.mode, mode) {
                (RunMode::Export, _) | (RunMode::Preview, RunMode::Preview) => {
                    tracing::debug!(
                        active = active.mode.as_str(),
                        requested = mode.as_str(),
                        "Run already active; ignoring request"
                    );
                    return None;
                }
                (RunMode::Preview, RunMode::Export) => {
                    tracing::info!(run_id = active.id, "Cancelling preview to start export");
                    active.cancel.store(true, Ordering::SeqCst);
                }
            }
        }

        let id = registry.next_id;
        registry.next_id += 1;
        let cancel = Arc::new(AtomicBool::new(false));
        registry.active = Some(ActiveRun {
            id,
            mode,
            cancel: Arc::clone(&cancel),
        });
        registry.state = RunState::Running(mode);

        Some(RunTicket {
            registry: &self.registry,
            id,
            mode,
            cancel,
            final_state: RunState::Idle,
        })
    }

    fn begin(&self, ticket: &RunTicket<'_>, timeline: &Timeline) {
        self.progress.send_replace(0.0);
        tracing::info!(
            run_id = ticket.id,
            mode = ticket.mode.as_str(),
            scenes = timeline.len(),
            frames = timeline.total_frames(self.settings.fps),
            duration_ms = timeline.total_duration_ms(),
            "Run started"
        );
        let _ = self.events.send(RunEvent::Started {
            run_id: ticket.id,
            mode: ticket.mode,
        });
    }

    fn complete(&self, ticket: RunTicket<'_>, frames: u64) {
        let (run_id, mode) = (ticket.id, ticket.mode);
        self.progress.send_replace(100.0);
        ticket.finish(RunState::Idle);
        tracing::info!(run_id, mode = mode.as_str(), frames, "Run completed");
        let _ = self.events.send(RunEvent::Completed {
            run_id,
            mode,
            frames,
        });
    }

    fn cancelled(&self, ticket: RunTicket<'_>, frames: u64) {
        let (run_id, mode) = (ticket.id, ticket.mode);
        self.progress.send_replace(0.0);
        ticket.finish(RunState::Idle);
        tracing::info!(run_id, mode = mode.as_str(), frames, "Run cancelled");
        let _ = self.events.send(RunEvent::Cancelled {
            run_id,
            mode,
            frames,
        });
    }

    fn fail(&self, ticket: RunTicket<'_>, error: ReelError) -> ReelError {
        let (run_id, mode) = (ticket.id, ticket.mode);
        self.progress.send_replace(0.0);
        ticket.finish(RunState::Failed);
        tracing::error!(run_id, mode = mode.as_str(), error = %error, "Run failed");
        let _ = self.events.send(RunEvent::Failed {
            run_id,
            mode,
            reason: error.reason(),
        });
        error
    }

    fn publish_progress(&self, percent: f64) {
        self.progress.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
    }

    async fn play(
        &self,
        stage: &mut Stage,
        timeline: &Timeline,
        cancel: Option<&AtomicBool>,
        mut output: Output<'_>,
    ) -> ReelResult<Played> {
        let fps = self.settings.fps;
        let pacer = FramePacer::new(fps);
        let frame_ms = pacer.interval_ms();
        let total_ms = timeline.total_duration_ms();
        let clock = RunClock::start();
        let started = tokio::time::Instant::now();

        stage.compositor.resolver().clear().await;
        stage.compositor.reset_cache();

        let mut elapsed_ms = 0.0;
        let mut frame_index = 0u64;

        for (scene_index, scene) in timeline.scenes.iter().enumerate() {
            let frames = scene.frame_count(fps);
            tracing::debug!(scene = scene_index, id = %scene.id, frames, "Scene started");

            for frame_in_scene in 0..frames {
                if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
                    return Ok(Played::Cancelled {
                        frames: frame_index,
                    });
                }

                let report = stage.compositor.composite(&mut stage.surface, scene).await;
                if frame_in_scene == 0 {
                    if let BackgroundOutcome::Fallback(reason) = &report.background {
                        tracing::warn!(scene = scene_index, %reason, "Using default background");
                    }
                }

                let stamp = FrameStamp {
                    frame_index,
                    scene_index,
                    frame_in_scene,
                };
                match &mut output {
                    Output::Sink(sink) => sink.present(&stage.surface, stamp).await?,
                    Output::Encoder(session) => session.push_frame(stage.surface.as_raw()).await?,
                }

                if self.settings.pacing == Pacing::Realtime {
                    let delay = pacer.delay_after(frame_index, started.elapsed());
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }

                frame_index += 1;
                elapsed_ms += frame_ms;
                let percent = if total_ms > 0.0 {
                    (elapsed_ms / total_ms * 100.0).min(100.0)
                } else {
                    100.0
                };
                self.publish_progress(percent);
            }
        }

        let drift = DriftMeasurement {
            nominal_ms: pacer.nominal_elapsed_ms(frame_index),
            actual_ms: started.elapsed().as_secs_f64() * 1000.0,
        };
        if self.settings.pacing == Pacing::Realtime && drift.exceeds_threshold_ms(DRIFT_WARN_MS) {
            tracing::warn!(
                nominal_ms = drift.nominal_ms,
                actual_ms = drift.actual_ms,
                drift_ms = drift.drift_ms(),
                "Playback drifted from real time"
            );
        } else {
            tracing::debug!(
                nominal_ms = drift.nominal_ms,
                actual_ms = drift.actual_ms,
                drift_ms = drift.drift_ms(),
                wall_ms = clock.elapsed_ms(),
                started_at = clock.epoch_wall(),
                "Playback timing"
            );
        }

        Ok(Played::Completed {
            frames: frame_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::EstimatedText;
    use reelcast_common::config::AssetDefaults;
    use reelcast_scene_model::Scene;

    struct NoCodecs;

    #[async_trait::async_trait]
    impl EncoderBackend for NoCodecs {
        fn name(&self) -> &str {
            "none"
        }

        async fn supports(&self, _profile: &CodecProfile) -> bool {
            false
        }

        async fn open(
            &self,
            _profile: CodecProfile,
            _params: &EncodeParams,
        ) -> ReelResult<Box<dyn crate::encoder::EncoderSession>> {
            Err(ReelError::encode("unreachable"))
        }
    }

    fn player(pacing: Pacing) -> Player {
        let resolver = Arc::new(ImageResolver::new(AssetDefaults {
            allow_remote: false,
            ..AssetDefaults::default()
        }));
        let settings = PlayerSettings {
            width: 64,
            height: 36,
            fps: 10,
            pacing,
            ..PlayerSettings::default()
        };
        Player::new(
            settings,
            Compositor::new(resolver, Box::new(EstimatedText::default())),
            Arc::new(NoCodecs),
        )
    }

    #[test]
    fn test_ticket_release_only_touches_own_run() {
        let player = player(Pacing::Unthrottled);
        let first = player.admit(RunMode::Preview).unwrap();
        assert_eq!(player.state(), RunState::Running(RunMode::Preview));

        // Export preempts the preview and takes over the registry.
        let second = player.admit(RunMode::Export).unwrap();
        assert!(first.cancel.load(Ordering::SeqCst));

        drop(first);
        assert_eq!(player.state(), RunState::Running(RunMode::Export));

        second.finish(RunState::Failed);
        assert_eq!(player.state(), RunState::Failed);
    }

    #[test]
    fn test_admission_rules() {
        let player = player(Pacing::Unthrottled);
        let preview = player.admit(RunMode::Preview).unwrap();
        assert!(player.admit(RunMode::Preview).is_none());
        drop(preview);

        let export = player.admit(RunMode::Export).unwrap();
        assert!(player.admit(RunMode::Preview).is_none());
        assert!(player.admit(RunMode::Export).is_none());
        assert!(!player.cancel());
        drop(export);
        assert_eq!(player.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_unthrottled_preview_counts_frames() {
        let player = player(Pacing::Unthrottled);
        let timeline = Timeline::new(vec![Scene::new("A", 0.5), Scene::new("B", 0.0)]);

        let outcome = player.preview(&timeline, &mut NullSink).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed { frames: 6 });
        assert_eq!(*player.progress().borrow(), 100.0);
        assert_eq!(player.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_empty_preview_completes_immediately() {
        let player = player(Pacing::Realtime);
        let outcome = player
            .preview(&Timeline::default(), &mut NullSink)
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Completed { frames: 0 });
        assert_eq!(*player.progress().borrow(), 100.0);
    }

    #[tokio::test]
    async fn test_unsupported_export_fails_before_drawing() {
        let player = player(Pacing::Unthrottled);
        let mut events = player.subscribe();

        let err = player
            .export(&Timeline::new(vec![Scene::new("A", 1.0)]))
            .await
            .unwrap_err();

        assert!(err.is_unsupported());
        assert_eq!(player.state(), RunState::Failed);
        assert_eq!(*player.progress().borrow(), 0.0);
        assert!(matches!(events.recv().await, Ok(RunEvent::Started { .. })));
        assert!(matches!(events.recv().await, Ok(RunEvent::Failed { .. })));
    }
}
