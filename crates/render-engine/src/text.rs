//! Text measurement and rasterization.
//! Uses fontdue for CPU glyph rasterization.
//!
//! No font ships with the crate. Faces come from the render config or from
//! well-known system locations; when none can be loaded the compositor falls
//! back to [`EstimatedText`], which keeps layout deterministic but draws no
//! glyphs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fontdue::{Font, FontSettings, Metrics};
use reelcast_common::config::RenderDefaults;
use reelcast_common::error::{ReelError, ReelResult};
use reelcast_scene_model::Rgba;

use crate::surface::Surface;

/// Font weight selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weight {
    Regular,
    Bold,
}

/// How a run of text is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Font size in pixels.
    pub size: f32,
    pub weight: Weight,
    pub color: Rgba,
}

/// Measures and draws single lines of text onto a surface.
pub trait TextPainter: Send {
    /// Advance width of `text` in pixels.
    fn measure(&self, text: &str, style: &TextStyle) -> f32;

    /// Draw one line with its line box's top-left corner at `(x, top)`.
    fn draw_line(&mut self, surface: &mut Surface, text: &str, x: f32, top: f32, style: &TextStyle);

    /// Name for logs.
    fn name(&self) -> &str;
}

/// Bold faces tried when no title font is configured.
const BOLD_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// Regular faces tried when no body font is configured.
const REGULAR_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Pick the best available painter for the given render settings.
pub fn load_text_painter(config: &RenderDefaults) -> Box<dyn TextPainter> {
    let bold = resolve_font_path(config.title_font.as_deref(), BOLD_FONT_CANDIDATES);
    let regular = resolve_font_path(config.body_font.as_deref(), REGULAR_FONT_CANDIDATES);

    match (bold, regular) {
        (Some(bold), Some(regular)) => match FontdueText::load(&bold, &regular) {
            Ok(painter) => {
                tracing::info!(
                    bold = %bold.display(),
                    regular = %regular.display(),
                    "Loaded text fonts"
                );
                return Box::new(painter);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to load text fonts"),
        },
        // A single face serves both weights.
        (Some(path), None) | (None, Some(path)) => match FontdueText::load(&path, &path) {
            Ok(painter) => {
                tracing::info!(font = %path.display(), "Loaded text font for both weights");
                return Box::new(painter);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to load text font"),
        },
        (None, None) => {}
    }

    tracing::warn!("No usable font found; scene text will be laid out but not drawn");
    Box::new(EstimatedText::default())
}

fn resolve_font_path(configured: Option<&Path>, candidates: &[&str]) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "Configured font does not exist");
    }
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
}

/// Key for the glyph cache: character, size bits, weight.
type GlyphKey = (char, u32, Weight);

/// fontdue-backed painter with a per-glyph raster cache.
pub struct FontdueText {
    bold: Font,
    regular: Font,
    glyphs: HashMap<GlyphKey, (Metrics, Vec<u8>)>,
}

impl FontdueText {
    /// Load bold and regular faces from disk.
    pub fn load(bold: &Path, regular: &Path) -> ReelResult<Self> {
        Ok(Self::from_fonts(read_font(bold)?, read_font(regular)?))
    }

    pub fn from_fonts(bold: Font, regular: Font) -> Self {
        Self {
            bold,
            regular,
            glyphs: HashMap::new(),
        }
    }

    fn font(&self, weight: Weight) -> &Font {
        match weight {
            Weight::Bold => &self.bold,
            Weight::Regular => &self.regular,
        }
    }
}

fn read_font(path: &Path) -> ReelResult<Font> {
    let data = std::fs::read(path).map_err(|e| {
        ReelError::render(format!("Failed to read font file {}: {e}", path.display()))
    })?;
    Font::from_bytes(data, FontSettings::default())
        .map_err(|e| ReelError::render(format!("Failed to parse font {}: {e}", path.display())))
}

impl TextPainter for FontdueText {
    fn measure(&self, text: &str, style: &TextStyle) -> f32 {
        let font = self.font(style.weight);
        text.chars()
            .map(|ch| font.metrics(ch, style.size).advance_width)
            .sum()
    }

    fn draw_line(&mut self, surface: &mut Surface, text: &str, x: f32, top: f32, style: &TextStyle) {
        let ascent = self
            .font(style.weight)
            .horizontal_line_metrics(style.size)
            .map(|m| m.ascent)
            .unwrap_or(style.size * 0.8);
        let baseline = (top + ascent).round() as i32;
        let mut pen_x = x;

        for ch in text.chars() {
            let key = (ch, style.size.to_bits(), style.weight);
            if !self.glyphs.contains_key(&key) {
                let raster = self.font(style.weight).rasterize(ch, style.size);
                self.glyphs.insert(key, raster);
            }
            let Some((metrics, bitmap)) = self.glyphs.get(&key) else {
                continue;
            };

            let gx = pen_x.round() as i32 + metrics.xmin;
            let gy = baseline - (metrics.height as i32 + metrics.ymin);
            for row in 0..metrics.height {
                for col in 0..metrics.width {
                    let coverage = bitmap[row * metrics.width + col];
                    if coverage == 0 {
                        continue;
                    }
                    let alpha = (u16::from(coverage) * u16::from(style.color.a) / 255) as u8;
                    surface.blend_pixel(
                        gx + col as i32,
                        gy + row as i32,
                        style.color.with_alpha(alpha),
                    );
                }
            }
            pen_x += metrics.advance_width;
        }
    }

    fn name(&self) -> &str {
        "fontdue"
    }
}

/// Font-less fallback: fixed-advance measurement, no drawing.
#[derive(Debug, Clone)]
pub struct EstimatedText {
    /// Advance per character, as a fraction of the font size.
    pub em_advance: f32,
}

impl Default for EstimatedText {
    fn default() -> Self {
        Self { em_advance: 0.55 }
    }
}

impl TextPainter for EstimatedText {
    fn measure(&self, text: &str, style: &TextStyle) -> f32 {
        text.chars().count() as f32 * style.size * self.em_advance
    }

    fn draw_line(
        &mut self,
        _surface: &mut Surface,
        _text: &str,
        _x: f32,
        _top: f32,
        _style: &TextStyle,
    ) {
    }

    fn name(&self) -> &str {
        "estimated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(size: f32) -> TextStyle {
        TextStyle {
            size,
            weight: Weight::Regular,
            color: Rgba::WHITE,
        }
    }

    #[test]
    fn test_estimated_measure_scales_with_size() {
        let painter = EstimatedText::default();
        assert!((painter.measure("abcd", &style(10.0)) - 22.0).abs() < 1e-4);
        assert!((painter.measure("abcd", &style(20.0)) - 44.0).abs() < 1e-4);
        assert_eq!(painter.measure("", &style(20.0)), 0.0);
    }

    #[test]
    fn test_estimated_draw_leaves_surface_untouched() {
        let mut painter = EstimatedText::default();
        let mut surface = Surface::new(8, 8);
        surface.fill(Rgba::BLACK);
        painter.draw_line(&mut surface, "hello", 0.0, 0.0, &style(8.0));
        assert!(surface.as_raw().chunks(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn test_missing_configured_font_falls_back() {
        let config = RenderDefaults {
            title_font: Some(PathBuf::from("/nonexistent/bold.ttf")),
            body_font: Some(PathBuf::from("/nonexistent/regular.ttf")),
            ..RenderDefaults::default()
        };
        // Either a system font or the estimator; never a panic.
        let painter = load_text_painter(&config);
        assert!(painter.measure("abc", &style(16.0)) > 0.0);
    }

    #[test]
    fn test_unreadable_font_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.ttf");
        std::fs::write(&bogus, b"not a font").unwrap();
        assert!(FontdueText::load(&bogus, &bogus).is_err());
    }
}
