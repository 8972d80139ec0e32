//! Background image resolution.
//!
//! Turns an opaque image reference into a decoded RGBA image. Supported
//! references:
//! - `data:<mime>[;base64],<payload>` embedded data
//! - `http://` and `https://` remote locators
//! - `file://` URLs and plain filesystem paths
//!
//! Resolution never fails a render: callers get an [`AssetError`] value and
//! substitute a default fill.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use image::RgbaImage;
use reelcast_common::config::AssetDefaults;
use reelcast_common::error::ReelError;
use tokio::sync::Mutex;

/// A decoded image ready for drawing.
#[derive(Debug)]
pub struct DecodedImage {
    pixels: RgbaImage,
}

impl DecodedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Intrinsic width in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Intrinsic height in pixels.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Why an image reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    #[error("malformed image reference: {0}")]
    Malformed(String),

    #[error("remote images are disabled: {0}")]
    RemoteDisabled(String),

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("image is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("failed to decode image: {0}")]
    Decode(String),
}

impl From<AssetError> for ReelError {
    fn from(err: AssetError) -> Self {
        ReelError::asset(err.to_string())
    }
}

/// Parsed form of an image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageLocator {
    /// Embedded bytes from a `data:` URL.
    Embedded { mime: String, bytes: Vec<u8> },
    /// `http(s)://` URL.
    Remote(String),
    /// Local file.
    File(PathBuf),
}

impl ImageLocator {
    /// Classify and, for `data:` URLs, decode a reference.
    pub fn parse(reference: &str) -> Result<Self, AssetError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(AssetError::Malformed("empty reference".to_string()));
        }

        if let Some(rest) = strip_prefix_ignore_case(reference, "data:") {
            return parse_data_url(rest);
        }
        if strip_prefix_ignore_case(reference, "http://").is_some()
            || strip_prefix_ignore_case(reference, "https://").is_some()
        {
            return Ok(Self::Remote(reference.to_string()));
        }
        if let Some(path) = strip_prefix_ignore_case(reference, "file://") {
            return Ok(Self::File(PathBuf::from(percent_decode(path))));
        }
        Ok(Self::File(PathBuf::from(reference)))
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

fn parse_data_url(rest: &str) -> Result<ImageLocator, AssetError> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| AssetError::Malformed("data URL has no ',' separator".to_string()))?;

    let mut params = meta.split(';');
    let mime = params.next().unwrap_or_default().trim().to_ascii_lowercase();
    let is_base64 = params.any(|p| p.trim().eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| AssetError::Malformed(format!("invalid base64 payload: {e}")))?
    } else {
        percent_decode(payload).into_bytes()
    };

    if bytes.is_empty() {
        return Err(AssetError::Malformed("data URL payload is empty".to_string()));
    }

    Ok(ImageLocator::Embedded { mime, bytes })
}

/// Minimal `%XX` decoding. Invalid escapes are kept literally.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(b) = hex {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

type CachedResolution = Result<Arc<DecodedImage>, AssetError>;

/// Resolves image references, caching outcomes per reference.
pub struct ImageResolver {
    config: AssetDefaults,
    client: Option<reqwest::Client>,
    cache: Mutex<HashMap<String, CachedResolution>>,
}

impl ImageResolver {
    pub fn new(config: AssetDefaults) -> Self {
        let client = if config.allow_remote {
            match reqwest::Client::builder()
                .timeout(Duration::from_secs(config.fetch_timeout_secs.max(1)))
                .build()
            {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::warn!(error = %e, "HTTP client unavailable; remote images disabled");
                    None
                }
            }
        } else {
            None
        };

        Self {
            config,
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `reference` into a decoded image.
    ///
    /// Suspends while fetching and decoding. Repeated calls for the same
    /// reference return the cached outcome.
    pub async fn resolve(&self, reference: &str) -> Result<Arc<DecodedImage>, AssetError> {
        if let Some(cached) = self.cache.lock().await.get(reference) {
            return cached.clone();
        }

        let outcome = self.load(reference).await.map(Arc::new);
        match &outcome {
            Ok(image) => tracing::debug!(
                reference = %abbreviate(reference),
                width = image.width(),
                height = image.height(),
                "Resolved background image"
            ),
            Err(e) => tracing::warn!(
                reference = %abbreviate(reference),
                error = %e,
                "Background image unavailable"
            ),
        }

        self.cache
            .lock()
            .await
            .insert(reference.to_string(), outcome.clone());
        outcome
    }

    /// Drop every cached outcome. Called at run start so each run reads
    /// its images afresh.
    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }

    async fn load(&self, reference: &str) -> Result<DecodedImage, AssetError> {
        let bytes = match ImageLocator::parse(reference)? {
            ImageLocator::Embedded { bytes, .. } => bytes,
            ImageLocator::Remote(url) => self.fetch(&url).await?,
            ImageLocator::File(path) => {
                let meta = tokio::fs::metadata(&path).await.map_err(|e| AssetError::Read {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                self.check_size(meta.len())?;
                tokio::fs::read(&path).await.map_err(|e| AssetError::Read {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?
            }
        };

        self.check_size(bytes.len() as u64)?;
        decode(bytes).await
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| AssetError::RemoteDisabled(url.to_string()))?;

        let fetch_err = |message: String| AssetError::Fetch {
            url: url.to_string(),
            message,
        };

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_err(format!("HTTP {}", response.status())));
        }
        if let Some(len) = response.content_length() {
            self.check_size(len)?;
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        Ok(body.to_vec())
    }

    fn check_size(&self, size: u64) -> Result<(), AssetError> {
        if size > self.config.max_image_bytes {
            return Err(AssetError::TooLarge {
                size,
                limit: self.config.max_image_bytes,
            });
        }
        Ok(())
    }
}

/// Largest accepted width or height of a decoded image.
const MAX_DIMENSION: u32 = 16_384;

/// Decode on the blocking pool; large images take a while.
async fn decode(bytes: Vec<u8>) -> Result<DecodedImage, AssetError> {
    tokio::task::spawn_blocking(move || {
        let mut reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| AssetError::Decode(e.to_string()))?;

        let mut limits = image::Limits::default();
        limits.max_image_width = Some(MAX_DIMENSION);
        limits.max_image_height = Some(MAX_DIMENSION);
        reader.limits(limits);

        reader
            .decode()
            .map(|img| DecodedImage::new(img.to_rgba8()))
            .map_err(|e| AssetError::Decode(e.to_string()))
    })
    .await
    .map_err(|e| AssetError::Decode(format!("decoder task failed: {e}")))?
}

/// Keep `data:` URLs out of logs.
fn abbreviate(reference: &str) -> String {
    const MAX: usize = 64;
    if reference.chars().count() <= MAX {
        return reference.to_string();
    }
    let head: String = reference.chars().take(MAX).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba(color));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn data_url(bytes: &[u8]) -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    }

    fn offline() -> ImageResolver {
        ImageResolver::new(AssetDefaults {
            allow_remote: false,
            ..AssetDefaults::default()
        })
    }

    #[test]
    fn test_parse_locators() {
        assert!(matches!(
            ImageLocator::parse("https://example.com/a.png"),
            Ok(ImageLocator::Remote(_))
        ));
        assert_eq!(
            ImageLocator::parse("file:///tmp/My%20Image.png").unwrap(),
            ImageLocator::File(PathBuf::from("/tmp/My Image.png"))
        );
        assert_eq!(
            ImageLocator::parse("assets/bg.jpg").unwrap(),
            ImageLocator::File(PathBuf::from("assets/bg.jpg"))
        );
        assert!(ImageLocator::parse("  ").is_err());
    }

    #[test]
    fn test_parse_data_urls() {
        let parsed = ImageLocator::parse("DATA:image/png;base64,aGVs bG8=").unwrap();
        assert_eq!(
            parsed,
            ImageLocator::Embedded {
                mime: "image/png".to_string(),
                bytes: b"hello".to_vec()
            }
        );

        let plain = ImageLocator::parse("data:text/plain,a%2Cb").unwrap();
        assert!(matches!(plain, ImageLocator::Embedded { bytes, .. } if bytes == b"a,b"));

        assert!(ImageLocator::parse("data:image/png;base64").is_err());
        assert!(ImageLocator::parse("data:image/png;base64,***").is_err());
        assert!(ImageLocator::parse("data:image/png;base64,").is_err());
    }

    #[test]
    fn test_percent_decode_keeps_invalid_escapes() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz%41"), "%zzA");
    }

    #[tokio::test]
    async fn test_resolve_embedded_png() {
        let resolver = offline();
        let image = resolver
            .resolve(&data_url(&png_bytes(16, 9, [200, 10, 10, 255])))
            .await
            .unwrap();
        assert_eq!((image.width(), image.height()), (16, 9));
        assert_eq!(image.pixels().get_pixel(0, 0).0, [200, 10, 10, 255]);
    }

    #[tokio::test]
    async fn test_resolve_file_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.png");
        std::fs::write(&path, png_bytes(4, 4, [0, 0, 255, 255])).unwrap();

        let resolver = offline();
        let image = resolver.resolve(path.to_str().unwrap()).await.unwrap();
        assert_eq!(image.width(), 4);
    }

    #[tokio::test]
    async fn test_failures_are_values_and_cached() {
        let resolver = offline();
        let garbage = data_url(b"definitely not an image");

        let first = resolver.resolve(&garbage).await.unwrap_err();
        assert!(matches!(first, AssetError::Decode(_)));
        assert_eq!(resolver.resolve(&garbage).await.unwrap_err(), first);

        resolver.clear().await;
        assert!(resolver.cache.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_rereads_changed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.png");
        let reference = path.to_str().unwrap().to_string();
        std::fs::write(&path, png_bytes(2, 2, [255, 0, 0, 255])).unwrap();

        let resolver = offline();
        let first = resolver.resolve(&reference).await.unwrap();
        assert_eq!(first.pixels().get_pixel(0, 0).0, [255, 0, 0, 255]);

        std::fs::write(&path, png_bytes(2, 2, [0, 0, 255, 255])).unwrap();
        let cached = resolver.resolve(&reference).await.unwrap();
        assert_eq!(cached.pixels().get_pixel(0, 0).0, [255, 0, 0, 255]);

        resolver.clear().await;
        let fresh = resolver.resolve(&reference).await.unwrap();
        assert_eq!(fresh.pixels().get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[tokio::test]
    async fn test_remote_disabled() {
        let err = offline()
            .resolve("https://example.invalid/bg.png")
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::RemoteDisabled(_)));
    }

    #[tokio::test]
    async fn test_size_limit() {
        let resolver = ImageResolver::new(AssetDefaults {
            allow_remote: false,
            max_image_bytes: 16,
            ..AssetDefaults::default()
        });
        let err = resolver
            .resolve(&data_url(&png_bytes(8, 8, [0, 0, 0, 255])))
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::TooLarge { limit: 16, .. }));
    }

    #[tokio::test]
    async fn test_oversized_dimensions_are_rejected() {
        let wide = png_bytes(MAX_DIMENSION + 1, 1, [0, 0, 0, 255]);
        let err = offline().resolve(&data_url(&wide)).await.unwrap_err();
        assert!(matches!(err, AssetError::Decode(_)));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = offline()
            .resolve("/nonexistent/background.png")
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::Read { .. }));
    }
}
