//! Reelcast Render Engine
//!
//! Plays a scene timeline frame by frame onto a fixed-size RGBA surface,
//! either for live preview or into an encoded video file.
//!
//! # Pipeline Architecture
//!
//! ```text
//! timeline.json ──┐
//!                 ├── Player (pacing, progress, cancellation)
//! image refs ─────┘         │
//!   (data:, http, file)     ├── Compositor
//!                           │     background → gradient → title → subtitle
//!                           ▼
//!                        Surface (RGBA)
//!                     ┌─────┴─────┐
//!                     ▼           ▼
//!                FrameSink    Encoder session (ffmpeg)
//!                (preview)        │
//!                                 ▼
//!                       Artifact (webm / mp4 / mkv)
//! ```

pub mod assets;
pub mod compositor;
pub mod encoder;
pub mod export;
pub mod player;
pub mod surface;
pub mod text;
pub mod wrap;

pub use assets::{AssetError, DecodedImage, ImageLocator, ImageResolver};
pub use compositor::{
    aspect_fill, cover_crop, BackgroundOutcome, Compositor, FrameReport, Placement,
};
pub use encoder::{
    start_session, Artifact, CodecProfile, EncodeParams, EncoderBackend, EncoderSession,
    FfmpegBackend, LiveSession, CODEC_PROFILES,
};
pub use export::*;
pub use player::{
    ExportOutcome, FrameSink, FrameStamp, NullSink, Player, PlayerSettings, RunEvent, RunMode,
    RunOutcome, RunState,
};
pub use surface::Surface;
pub use text::{load_text_painter, EstimatedText, FontdueText, TextPainter, TextStyle, Weight};
pub use wrap::{layout_lines, wrap_text, PositionedLine};
