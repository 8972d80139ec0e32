//! Frame compositor: paints one scene onto the shared surface.
//!
//! Layer order per frame:
//! 1. Background (solid fill or aspect-filled image)
//! 2. Bottom gradient so text stays legible
//! 3. Title block, then subtitle block, anchored to the bottom inset
//!
//! Image resolution is the only suspension point and happens before the
//! surface is touched, so a frame is never painted halfway.

use std::collections::HashMap;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use reelcast_scene_model::{Background, Rgba, Scene};

use crate::assets::{DecodedImage, ImageResolver};
use crate::surface::Surface;
use crate::text::{TextPainter, TextStyle, Weight};
use crate::wrap::{layout_lines, wrap_text, PositionedLine};

/// Fill used when a background is missing, unparseable, or fails to load.
pub const DEFAULT_BACKGROUND: Rgba = Rgba::opaque(0x1a, 0x1a, 0x1a);

/// Width the layout constants are expressed against.
const REFERENCE_WIDTH: f32 = 1280.0;

const INSET: f32 = 80.0;
const TITLE_SIZE: f32 = 64.0;
const TITLE_LINE_HEIGHT: f32 = 1.2;
const TITLE_COLOR: Rgba = Rgba::opaque(0xf5, 0xf5, 0xf5);
const SUBTITLE_GAP: f32 = 16.0;
const SUBTITLE_SIZE: f32 = 32.0;
const SUBTITLE_LINE_HEIGHT: f32 = 1.4;
const SUBTITLE_COLOR: Rgba = Rgba::new(255, 255, 255, 204);

/// Gradient opacity at the bottom edge.
const GRADIENT_MAX_ALPHA: f32 = 0.7;
/// Fraction of the height, measured from the bottom, the gradient covers.
const GRADIENT_COVERAGE: f32 = 0.4;

/// Where a scaled image lands on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Scale `src` to cover `dst` completely, preserving aspect ratio, centred.
/// One axis may overflow the destination and is clipped when drawn.
pub fn aspect_fill(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Placement {
    if src_w == 0 || src_h == 0 {
        return Placement {
            x: 0,
            y: 0,
            width: dst_w,
            height: dst_h,
        };
    }

    let scale = f64::max(
        dst_w as f64 / src_w as f64,
        dst_h as f64 / src_h as f64,
    );
    // Rounding must never leave an uncovered edge.
    let width = ((src_w as f64 * scale).round() as u32).max(dst_w);
    let height = ((src_h as f64 * scale).round() as u32).max(dst_h);

    Placement {
        x: (dst_w as i64 - width as i64) / 2,
        y: (dst_h as i64 - height as i64) / 2,
        width,
        height,
    }
}

/// Which background path a frame took.
#[derive(Debug, Clone, PartialEq)]
pub enum BackgroundOutcome {
    Solid(Rgba),
    Image,
    /// Default fill, with the reason the requested background was not used.
    Fallback(String),
}

/// What was drawn for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub background: BackgroundOutcome,
    pub title_lines: usize,
    pub subtitle_lines: usize,
}

/// The visible part of a background image, scaled to the surface size.
struct FittedBackground {
    image: RgbaImage,
}

enum PreparedBackground {
    Solid(Rgba),
    Image(Arc<FittedBackground>),
    Fallback(String),
}

/// Paints scenes onto a surface.
pub struct Compositor {
    resolver: Arc<ImageResolver>,
    text: Box<dyn TextPainter>,
    fitted: HashMap<(String, u32, u32), Arc<FittedBackground>>,
}

impl Compositor {
    pub fn new(resolver: Arc<ImageResolver>, text: Box<dyn TextPainter>) -> Self {
        Self {
            resolver,
            text,
            fitted: HashMap::new(),
        }
    }

    pub fn resolver(&self) -> &Arc<ImageResolver> {
        &self.resolver
    }

    /// Drop scaled backgrounds.
    pub fn reset_cache(&mut self) {
        self.fitted.clear();
    }

    /// Overwrite `surface` with `scene`.
    pub async fn composite(&mut self, surface: &mut Surface, scene: &Scene) -> FrameReport {
        let (width, height) = (surface.width(), surface.height());
        let background = self.prepare_background(&scene.background, width, height).await;

        surface.clear();
        let background = match background {
            PreparedBackground::Solid(color) => {
                // Frames are always opaque; translucent colors sit on the default fill.
                surface.fill(DEFAULT_BACKGROUND);
                surface.blend_fill(color);
                BackgroundOutcome::Solid(color)
            }
            PreparedBackground::Image(fitted) => {
                surface.fill(DEFAULT_BACKGROUND);
                surface.draw_image(&fitted.image, 0, 0);
                BackgroundOutcome::Image
            }
            PreparedBackground::Fallback(reason) => {
                surface.fill(DEFAULT_BACKGROUND);
                BackgroundOutcome::Fallback(reason)
            }
        };

        let gradient_rows = (height as f32 * GRADIENT_COVERAGE).round() as u32;
        surface.darken_rows(height.saturating_sub(gradient_rows), GRADIENT_MAX_ALPHA);

        let (title_lines, subtitle_lines) = self.draw_text(surface, scene);

        FrameReport {
            background,
            title_lines,
            subtitle_lines,
        }
    }

    async fn prepare_background(
        &mut self,
        background: &Background,
        width: u32,
        height: u32,
    ) -> PreparedBackground {
        match background {
            Background::Solid { color } => match background.solid_color() {
                Some(parsed) => PreparedBackground::Solid(parsed),
                None if color.trim().is_empty() => PreparedBackground::Solid(DEFAULT_BACKGROUND),
                None => PreparedBackground::Fallback(format!("unrecognized color {color:?}")),
            },
            Background::Image { reference } => {
                let key = (reference.clone(), width, height);
                if let Some(fitted) = self.fitted.get(&key) {
                    return PreparedBackground::Image(Arc::clone(fitted));
                }

                let decoded = match self.resolver.resolve(reference).await {
                    Ok(decoded) => decoded,
                    Err(e) => return PreparedBackground::Fallback(e.to_string()),
                };

                match fit(decoded, width, height).await {
                    Ok(fitted) => {
                        let fitted = Arc::new(fitted);
                        self.fitted.insert(key, Arc::clone(&fitted));
                        PreparedBackground::Image(fitted)
                    }
                    Err(reason) => PreparedBackground::Fallback(reason),
                }
            }
        }
    }

    fn draw_text(&mut self, surface: &mut Surface, scene: &Scene) -> (usize, usize) {
        let width = surface.width() as f32;
        let scale = width / REFERENCE_WIDTH;
        let inset = INSET * scale;
        let max_width = (width - 2.0 * inset).max(1.0);

        let title_style = TextStyle {
            size: TITLE_SIZE * scale,
            weight: Weight::Bold,
            color: TITLE_COLOR,
        };
        let subtitle_style = TextStyle {
            size: SUBTITLE_SIZE * scale,
            weight: Weight::Regular,
            color: SUBTITLE_COLOR,
        };
        let title_lh = title_style.size * TITLE_LINE_HEIGHT;
        let subtitle_lh = subtitle_style.size * SUBTITLE_LINE_HEIGHT;

        let text = &self.text;
        let title = wrap_text(&scene.title, max_width, |s| text.measure(s, &title_style));
        let subtitle = wrap_text(&scene.subtitle, max_width, |s| {
            text.measure(s, &subtitle_style)
        });

        let gap = if title.is_empty() || subtitle.is_empty() {
            0.0
        } else {
            SUBTITLE_GAP * scale
        };
        let title_height = title.len() as f32 * title_lh;
        let block_height = title_height + gap + subtitle.len() as f32 * subtitle_lh;
        let top = surface.height() as f32 - inset - block_height;

        let (title_count, subtitle_count) = (title.len(), subtitle.len());
        let title = layout_lines(title, inset, top, title_lh);
        let subtitle = layout_lines(subtitle, inset, top + title_height + gap, subtitle_lh);

        self.paint_lines(surface, &title, &title_style);
        self.paint_lines(surface, &subtitle, &subtitle_style);

        (title_count, subtitle_count)
    }

    fn paint_lines(&mut self, surface: &mut Surface, lines: &[PositionedLine], style: &TextStyle) {
        for line in lines {
            self.text.draw_line(surface, &line.text, line.x, line.y, style);
        }
    }
}

/// Region of a `src_w`x`src_h` image that stays visible once it is
/// aspect-filled into `dst_w`x`dst_h`, as `(x, y, width, height)` in source
/// pixels. Always non-empty and within the source bounds.
pub fn cover_crop(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> (u32, u32, u32, u32) {
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return (0, 0, src_w, src_h);
    }

    let placement = aspect_fill(src_w, src_h, dst_w, dst_h);
    let per_x = src_w as f64 / placement.width as f64;
    let per_y = src_h as f64 / placement.height as f64;

    let width = ((dst_w as f64 * per_x).round() as u32).clamp(1, src_w);
    let height = ((dst_h as f64 * per_y).round() as u32).clamp(1, src_h);
    let x = ((-placement.x) as f64 * per_x).round() as u32;
    let y = ((-placement.y) as f64 * per_y).round() as u32;

    (x.min(src_w - width), y.min(src_h - height), width, height)
}

/// Crop the visible part of a decoded image and scale it to exactly the
/// surface size, on the blocking pool.
async fn fit(decoded: Arc<DecodedImage>, width: u32, height: u32) -> Result<FittedBackground, String> {
    tokio::task::spawn_blocking(move || {
        let (x, y, crop_w, crop_h) = cover_crop(decoded.width(), decoded.height(), width, height);
        let visible = imageops::crop_imm(decoded.pixels(), x, y, crop_w, crop_h);
        let image = if (crop_w, crop_h) == (width, height) {
            visible.to_image()
        } else {
            imageops::resize(&*visible, width, height, FilterType::Triangle)
        };
        FittedBackground { image }
    })
    .await
    .map_err(|e| format!("background scaling failed: {e}"))
}
