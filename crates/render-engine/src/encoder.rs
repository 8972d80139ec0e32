//! Video encoder adapter.
//!
//! Raw RGBA frames go in, an encoded container comes out. The runtime that
//! does the encoding sits behind [`EncoderBackend`]; the shipped backend
//! drives an `ffmpeg` subprocess over pipes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use reelcast_common::error::{ReelError, ReelResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

/// One codec/container combination the exporter can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodecProfile {
    /// Stable id used in configuration.
    pub id: &'static str,
    /// ffmpeg encoder name.
    pub encoder: &'static str,
    /// ffmpeg muxer name.
    pub muxer: &'static str,
    /// File extension for the container.
    pub extension: &'static str,
    /// MIME type of the finished artifact.
    pub mime: &'static str,
}

/// Built-in profiles in default preference order.
pub const CODEC_PROFILES: [CodecProfile; 4] = [
    CodecProfile {
        id: "vp9-webm",
        encoder: "libvpx-vp9",
        muxer: "webm",
        extension: "webm",
        mime: "video/webm;codecs=vp9",
    },
    CodecProfile {
        id: "vp8-webm",
        encoder: "libvpx",
        muxer: "webm",
        extension: "webm",
        mime: "video/webm;codecs=vp8",
    },
    CodecProfile {
        id: "h264-mp4",
        encoder: "libx264",
        muxer: "mp4",
        extension: "mp4",
        mime: "video/mp4;codecs=avc1",
    },
    CodecProfile {
        id: "mpeg4-mkv",
        encoder: "mpeg4",
        muxer: "matroska",
        extension: "mkv",
        mime: "video/x-matroska",
    },
];

impl CodecProfile {
    pub fn by_id(id: &str) -> Option<CodecProfile> {
        CODEC_PROFILES
            .iter()
            .copied()
            .find(|p| p.id.eq_ignore_ascii_case(id.trim()))
    }

    /// Encoder and muxer arguments for this profile.
    pub fn codec_args(&self, video_bitrate_kbps: u32) -> Vec<String> {
        let bitrate = format!("{}k", video_bitrate_kbps.max(500));
        let mut args: Vec<String> = vec!["-c:v".into(), self.encoder.into()];

        match self.encoder {
            "libvpx-vp9" | "libvpx" => args.extend(
                ["-deadline", "realtime", "-cpu-used", "8", "-b:v", bitrate.as_str()].map(String::from),
            ),
            "libx264" => args.extend(
                ["-preset", "veryfast", "-tune", "stillimage", "-b:v", bitrate.as_str()].map(String::from),
            ),
            _ => args.extend(["-b:v", bitrate.as_str()].map(String::from)),
        }
        args.extend(["-pix_fmt", "yuv420p"].map(String::from));

        // Output goes to a pipe, so MP4 must be fragmented.
        if self.muxer == "mp4" {
            args.extend(
                ["-movflags", "frag_keyframe+empty_moov+default_base_moof"].map(String::from),
            );
        }
        args.extend(["-f", self.muxer].map(String::from));
        args
    }
}

/// Resolve configured profile ids into a preference list.
///
/// An empty list means the built-in order. Unknown ids are skipped with a
/// warning.
pub fn preference_order(ids: &[String]) -> Vec<CodecProfile> {
    if ids.is_empty() {
        return CODEC_PROFILES.to_vec();
    }

    let mut profiles = Vec::new();
    for id in ids {
        match CodecProfile::by_id(id) {
            Some(profile) if !profiles.contains(&profile) => profiles.push(profile),
            Some(_) => {}
            None => tracing::warn!(codec = %id, "Ignoring unknown codec profile"),
        }
    }
    profiles
}

/// Frame geometry and rate control for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_bitrate_kbps: u32,
}

impl EncodeParams {
    /// Bytes in one raw RGBA frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// A finished, immutable encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Vec<u8>,
    pub mime: String,
    pub profile: CodecProfile,
    pub frames: u64,
}

impl Artifact {
    pub fn new(bytes: Vec<u8>, profile: CodecProfile, frames: u64) -> Self {
        Self {
            bytes,
            mime: profile.mime.to_string(),
            profile,
            frames,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Write the artifact to `path`, creating parent directories.
    pub async fn write_to(&self, path: &Path) -> ReelResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, &self.bytes).await?;
        Ok(())
    }
}

/// An encoding runtime.
#[async_trait::async_trait]
pub trait EncoderBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Whether `profile` can be encoded on this system.
    async fn supports(&self, profile: &CodecProfile) -> bool;

    /// Open a session that accepts raw RGBA frames.
    async fn open(
        &self,
        profile: CodecProfile,
        params: &EncodeParams,
    ) -> ReelResult<Box<dyn EncoderSession>>;
}

/// A single in-progress encoding.
#[async_trait::async_trait]
pub trait EncoderSession: Send {
    /// Append one frame. Frames are encoded in call order.
    async fn push_frame(&mut self, rgba: &[u8]) -> ReelResult<()>;

    /// Signal end of stream, flush, and return the container bytes.
    async fn finalize(self: Box<Self>) -> ReelResult<Vec<u8>>;

    /// Stop encoding and discard output.
    async fn abort(self: Box<Self>);
}

/// An open session plus the bookkeeping the player needs.
pub struct LiveSession {
    inner: Box<dyn EncoderSession>,
    profile: CodecProfile,
    params: EncodeParams,
    frames: u64,
}

impl std::fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSession")
            .field("profile", &self.profile.id)
            .field("params", &self.params)
            .field("frames", &self.frames)
            .finish()
    }
}

impl LiveSession {
    pub fn profile(&self) -> CodecProfile {
        self.profile
    }

    pub async fn push_frame(&mut self, rgba: &[u8]) -> ReelResult<()> {
        let expected = self.params.frame_len();
        if rgba.len() != expected {
            return Err(ReelError::encode(format!(
                "frame is {} bytes, expected {expected} for {}x{}",
                rgba.len(),
                self.params.width,
                self.params.height
            )));
        }
        self.inner.push_frame(rgba).await?;
        self.frames += 1;
        Ok(())
    }

    pub async fn finalize(self) -> ReelResult<Artifact> {
        let bytes = self.inner.finalize().await?;
        tracing::info!(
            profile = self.profile.id,
            frames = self.frames,
            bytes = bytes.len(),
            "Encoder finalized"
        );
        Ok(Artifact::new(bytes, self.profile, self.frames))
    }

    pub async fn abort(self) {
        tracing::debug!(profile = self.profile.id, frames = self.frames, "Aborting encoder session");
        self.inner.abort().await;
    }
}

/// Open a session with the first profile the backend supports.
///
/// Fails with [`ReelError::Unsupported`] when none of `preferences` can be
/// encoded.
pub async fn start_session(
    backend: &dyn EncoderBackend,
    params: &EncodeParams,
    preferences: &[CodecProfile],
) -> ReelResult<LiveSession> {
    for profile in preferences {
        if !backend.supports(profile).await {
            tracing::debug!(backend = backend.name(), profile = profile.id, "Codec unavailable");
            continue;
        }

        tracing::info!(
            backend = backend.name(),
            profile = profile.id,
            width = params.width,
            height = params.height,
            fps = params.fps,
            "Starting encoder session"
        );
        let inner = backend.open(*profile, params).await?;
        return Ok(LiveSession {
            inner,
            profile: *profile,
            params: *params,
            frames: 0,
        });
    }

    let tried: Vec<&str> = preferences.iter().map(|p| p.id).collect();
    Err(ReelError::unsupported(format!(
        "video export is not supported: {} cannot encode any of [{}]",
        backend.name(),
        tried.join(", ")
    )))
}

/// Encoder backend driving an `ffmpeg` executable.
pub struct FfmpegBackend {
    binary: PathBuf,
    encoders: OnceCell<HashSet<String>>,
}

impl FfmpegBackend {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            encoders: OnceCell::new(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Video encoders ffmpeg reports. Probed once; empty when ffmpeg is
    /// missing.
    pub async fn encoders(&self) -> &HashSet<String> {
        self.encoders
            .get_or_init(|| async {
                match probe_encoders(&self.binary).await {
                    Ok(found) => {
                        tracing::debug!(count = found.len(), "Probed ffmpeg encoders");
                        found
                    }
                    Err(e) => {
                        tracing::warn!(
                            binary = %self.binary.display(),
                            error = %e,
                            "ffmpeg is not available"
                        );
                        HashSet::new()
                    }
                }
            })
            .await
    }

    /// First line of `ffmpeg -version`, if the binary runs.
    pub async fn version(&self) -> Option<String> {
        let output = Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
    }

    fn args(&self, profile: &CodecProfile, params: &EncodeParams) -> Vec<String> {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
        ]
        .map(String::from)
        .to_vec();
        args.extend([
            "-s".to_string(),
            format!("{}x{}", params.width, params.height),
            "-r".to_string(),
            params.fps.to_string(),
            "-i".to_string(),
            "-".to_string(),
            "-an".to_string(),
        ]);
        args.extend(profile.codec_args(params.video_bitrate_kbps));
        args.push("-".to_string());
        args
    }
}

async fn probe_encoders(binary: &Path) -> std::io::Result<HashSet<String>> {
    let output = Command::new(binary)
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .output()
        .await?;
    if !output.status.success() {
        return Err(std::io::Error::other(format!(
            "ffmpeg -encoders exited with {}",
            output.status
        )));
    }
    Ok(parse_encoder_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Extract video encoder names from `ffmpeg -encoders` output.
fn parse_encoder_list(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("------"))
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            let name = fields.next()?;
            flags.starts_with('V').then(|| name.to_string())
        })
        .collect()
}

#[async_trait::async_trait]
impl EncoderBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn supports(&self, profile: &CodecProfile) -> bool {
        self.encoders().await.contains(profile.encoder)
    }

    async fn open(
        &self,
        profile: CodecProfile,
        params: &EncodeParams,
    ) -> ReelResult<Box<dyn EncoderSession>> {
        let args = self.args(&profile, params);
        tracing::debug!(args = ?args, "Spawning ffmpeg");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ReelError::encode(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::encode("Failed to capture ffmpeg stdin"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelError::encode("Failed to capture ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelError::encode("Failed to capture ffmpeg stderr"))?;

        // Container bytes, in arrival order.
        let output_task = tokio::spawn(async move {
            let mut chunks = Vec::new();
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                let n = stdout.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                chunks.push(buf[..n].to_vec());
            }
            Ok::<_, std::io::Error>(chunks)
        });

        // Drain stderr so ffmpeg never blocks on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut output = String::new();
            match stderr.read_to_string(&mut output).await {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        tracing::info!(pid = ?child.id(), profile = profile.id, "ffmpeg process started");

        Ok(Box::new(FfmpegSession {
            child,
            stdin: Some(stdin),
            output_task: Some(output_task),
            stderr_task: Some(stderr_task),
        }))
    }
}

struct FfmpegSession {
    child: Child,
    stdin: Option<ChildStdin>,
    output_task: Option<JoinHandle<std::io::Result<Vec<Vec<u8>>>>>,
    stderr_task: Option<JoinHandle<String>>,
}

impl FfmpegSession {
    async fn stderr_output(&mut self) -> String {
        match self.stderr_task.take() {
            Some(task) => task
                .await
                .unwrap_or_else(|_| "<failed to join stderr reader>".to_string()),
            None => String::new(),
        }
    }

    /// Kill ffmpeg and turn whatever it printed into an error.
    async fn fail(&mut self, context: String) -> ReelError {
        self.stdin.take();
        let _ = self.child.kill().await;
        if let Some(task) = self.output_task.take() {
            task.abort();
        }
        let stderr = self.stderr_output().await;
        let stderr = stderr.trim();
        if stderr.is_empty() {
            ReelError::encode(context)
        } else {
            ReelError::encode(stderr)
        }
    }
}

#[async_trait::async_trait]
impl EncoderSession for FfmpegSession {
    async fn push_frame(&mut self, rgba: &[u8]) -> ReelResult<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ReelError::encode("ffmpeg input is already closed"));
        };
        let written = stdin.write_all(rgba).await;
        if let Err(e) = written {
            return Err(self.fail(format!("Failed to write frame to ffmpeg: {e}")).await);
        }
        Ok(())
    }

    async fn finalize(self: Box<Self>) -> ReelResult<Vec<u8>> {
        let mut this = self;
        if let Some(mut stdin) = this.stdin.take() {
            if let Err(e) = stdin.shutdown().await {
                return Err(this.fail(format!("Failed to close ffmpeg input: {e}")).await);
            }
        }

        let chunks = match this.output_task.take() {
            Some(task) => match task.await {
                Ok(Ok(chunks)) => chunks,
                Ok(Err(e)) => {
                    return Err(this.fail(format!("Failed reading ffmpeg output: {e}")).await)
                }
                Err(e) => return Err(this.fail(format!("ffmpeg output reader failed: {e}")).await),
            },
            None => Vec::new(),
        };

        let status = this
            .child
            .wait()
            .await
            .map_err(|e| ReelError::encode(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr = this.stderr_output().await;

        if !status.success() {
            let stderr = stderr.trim();
            return Err(if stderr.is_empty() {
                ReelError::encode(format!("ffmpeg exited with {status}"))
            } else {
                ReelError::encode(stderr)
            });
        }

        Ok(chunks.concat())
    }

    async fn abort(self: Box<Self>) {
        let mut this = self;
        this.stdin.take();
        if let Err(e) = this.child.kill().await {
            tracing::debug!(error = %e, "ffmpeg already exited");
        }
        if let Some(task) = this.output_task.take() {
            task.abort();
        }
        if let Some(task) = this.stderr_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct ListBackend {
        supported: Vec<&'static str>,
        opened: Arc<AtomicU64>,
    }

    struct NullSession;

    #[async_trait::async_trait]
    impl EncoderSession for NullSession {
        async fn push_frame(&mut self, _rgba: &[u8]) -> ReelResult<()> {
            Ok(())
        }

        async fn finalize(self: Box<Self>) -> ReelResult<Vec<u8>> {
            Ok(b"container".to_vec())
        }

        async fn abort(self: Box<Self>) {}
    }

    #[async_trait::async_trait]
    impl EncoderBackend for ListBackend {
        fn name(&self) -> &str {
            "list"
        }

        async fn supports(&self, profile: &CodecProfile) -> bool {
            self.supported.contains(&profile.id)
        }

        async fn open(
            &self,
            _profile: CodecProfile,
            _params: &EncodeParams,
        ) -> ReelResult<Box<dyn EncoderSession>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NullSession))
        }
    }

    fn params() -> EncodeParams {
        EncodeParams {
            width: 4,
            height: 2,
            fps: 30,
            video_bitrate_kbps: 8000,
        }
    }

    #[test]
    fn test_default_preference_order() {
        let ids: Vec<&str> = preference_order(&[]).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["vp9-webm", "vp8-webm", "h264-mp4", "mpeg4-mkv"]);
    }

    #[test]
    fn test_configured_order_skips_unknown_and_duplicates() {
        let ids: Vec<String> = ["h264-mp4", "av1-ivf", "VP9-WEBM", "h264-mp4"]
            .map(String::from)
            .to_vec();
        let order: Vec<&str> = preference_order(&ids).iter().map(|p| p.id).collect();
        assert_eq!(order, vec!["h264-mp4", "vp9-webm"]);
    }

    #[test]
    fn test_mp4_is_fragmented_for_pipes() {
        let args = CodecProfile::by_id("h264-mp4").unwrap().codec_args(8000);
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("empty_moov"));
        assert!(joined.ends_with("-f mp4"));

        let webm = CodecProfile::by_id("vp9-webm").unwrap().codec_args(100);
        assert!(webm.join(" ").contains("-b:v 500k"));
    }

    #[test]
    fn test_ffmpeg_args_read_rgba_from_stdin() {
        let backend = FfmpegBackend::new("ffmpeg");
        let args = backend.args(&CODEC_PROFILES[0], &params());
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgba -s 4x2 -r 30 -i -"));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn test_parse_encoder_list() {
        let listing = "Encoders:\n V..... = Video\n A..... = Audio\n ------\n \
                       V....D libx264              libx264 H.264\n \
                       V....D libvpx-vp9           libvpx VP9\n \
                       A....D aac                  AAC\n";
        let encoders = parse_encoder_list(listing);
        assert!(encoders.contains("libx264"));
        assert!(encoders.contains("libvpx-vp9"));
        assert!(!encoders.contains("aac"));
        assert!(!encoders.contains("="));
    }

    #[tokio::test]
    async fn test_start_session_picks_first_supported() {
        let backend = ListBackend {
            supported: vec!["h264-mp4", "mpeg4-mkv"],
            opened: Arc::new(AtomicU64::new(0)),
        };
        let session = start_session(&backend, &params(), &preference_order(&[]))
            .await
            .unwrap();
        assert_eq!(session.profile().id, "h264-mp4");
    }

    #[tokio::test]
    async fn test_start_session_unsupported_opens_nothing() {
        let opened = Arc::new(AtomicU64::new(0));
        let backend = ListBackend {
            supported: vec![],
            opened: Arc::clone(&opened),
        };
        let err = start_session(&backend, &params(), &preference_order(&[]))
            .await
            .unwrap_err();
        assert!(err.is_unsupported());
        assert!(err.to_string().contains("video export is not supported"));
        assert_eq!(opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_live_session_counts_frames_and_checks_size() {
        let backend = ListBackend {
            supported: vec!["vp8-webm"],
            opened: Arc::new(AtomicU64::new(0)),
        };
        let mut session = start_session(&backend, &params(), &preference_order(&[]))
            .await
            .unwrap();

        assert!(session.push_frame(&[0u8; 3]).await.is_err());
        session.push_frame(&[0u8; 32]).await.unwrap();
        session.push_frame(&[0u8; 32]).await.unwrap();

        let artifact = session.finalize().await.unwrap();
        assert_eq!(artifact.frames, 2);
        assert_eq!(artifact.mime, "video/webm;codecs=vp8");
        assert_eq!(artifact.bytes(), b"container");
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_supports_nothing() {
        let backend = FfmpegBackend::new("/nonexistent/ffmpeg-reelcast");
        assert!(!backend.supports(&CODEC_PROFILES[0]).await);
        assert!(backend.version().await.is_none());
        let err = start_session(&backend, &params(), &CODEC_PROFILES)
            .await
            .unwrap_err();
        assert!(err.is_unsupported());
    }
}
