//! Fixed-size RGBA raster surface that frames are composited into.

use std::path::Path;

use image::{imageops, Rgba as Pixel, RgbaImage};
use reelcast_common::error::{ReelError, ReelResult};
use reelcast_scene_model::Rgba;

/// The live compositing target. Its size never changes after creation.
#[derive(Debug, Clone)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    /// Create a transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Reset every pixel to transparent black.
    pub fn clear(&mut self) {
        self.fill(Rgba::TRANSPARENT);
    }

    /// Overwrite every pixel with `color`.
    pub fn fill(&mut self, color: Rgba) {
        let px = Pixel(color.to_array());
        for p in self.pixels.pixels_mut() {
            *p = px;
        }
    }

    /// Source-over blend of `color` onto every pixel.
    pub fn blend_fill(&mut self, color: Rgba) {
        match color.a {
            0 => {}
            255 => self.fill(color),
            _ => {
                for y in 0..self.height() as i32 {
                    for x in 0..self.width() as i32 {
                        self.blend_pixel(x, y, color);
                    }
                }
            }
        }
    }

    /// Source-over blend of `color` onto the pixel at `(x, y)`.
    /// Out-of-bounds coordinates are ignored.
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        if x < 0 || y < 0 || x >= self.width() as i32 || y >= self.height() as i32 {
            return;
        }
        let alpha = u16::from(color.a);
        if alpha == 0 {
            return;
        }
        let inv_alpha = 255 - alpha;
        let dst = self.pixels.get_pixel_mut(x as u32, y as u32);
        let src = [color.r, color.g, color.b];
        for (channel, src_c) in src.iter().enumerate() {
            let d = u16::from(dst.0[channel]);
            dst.0[channel] = ((u16::from(*src_c) * alpha + d * inv_alpha + 127) / 255) as u8;
        }
        let da = u16::from(dst.0[3]);
        dst.0[3] = (alpha + (da * inv_alpha + 127) / 255).min(255) as u8;
    }

    /// Darken rows in `[from_row, height)` towards black, with opacity rising
    /// linearly from 0 at `from_row` to `max_alpha` at the bottom edge.
    pub fn darken_rows(&mut self, from_row: u32, max_alpha: f32) {
        let height = self.height();
        if from_row >= height {
            return;
        }
        let span = (height - from_row) as f32;
        for y in from_row..height {
            let t = ((y - from_row) as f32 + 0.5) / span;
            let alpha = (max_alpha * t).clamp(0.0, 1.0);
            let keep = 1.0 - alpha;
            for x in 0..self.width() {
                let p = self.pixels.get_pixel_mut(x, y);
                for c in 0..3 {
                    p.0[c] = (p.0[c] as f32 * keep).round() as u8;
                }
                p.0[3] = (p.0[3] as f32 + (255.0 - p.0[3] as f32) * alpha).round() as u8;
            }
        }
    }

    /// Draw `image` with its top-left corner at `(x, y)`, clipping whatever
    /// falls outside the surface.
    pub fn draw_image(&mut self, image: &RgbaImage, x: i64, y: i64) {
        imageops::overlay(&mut self.pixels, image, x, y);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let p = self.pixels.get_pixel(x, y).0;
        Rgba::new(p[0], p[1], p[2], p[3])
    }

    /// Raw RGBA bytes, row-major, as fed to the encoder.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// Size of one raw frame in bytes.
    pub fn frame_len(&self) -> usize {
        self.as_raw().len()
    }

    /// Save the current contents as a PNG snapshot.
    pub fn save_png(&self, path: &Path) -> ReelResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.pixels
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| ReelError::render(format!("Failed to write {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_and_clear() {
        let mut surface = Surface::new(4, 2);
        surface.fill(Rgba::opaque(10, 20, 30));
        assert_eq!(surface.pixel(3, 1), Rgba::opaque(10, 20, 30));
        surface.clear();
        assert_eq!(surface.pixel(0, 0), Rgba::TRANSPARENT);
        assert_eq!(surface.frame_len(), 4 * 2 * 4);
    }

    #[test]
    fn test_blend_half_white_over_black() {
        let mut surface = Surface::new(1, 1);
        surface.fill(Rgba::BLACK);
        surface.blend_pixel(0, 0, Rgba::new(255, 255, 255, 128));
        let p = surface.pixel(0, 0);
        assert_eq!(p.r, 128);
        assert_eq!(p.a, 255);
        // Outside the surface: no panic, no effect.
        surface.blend_pixel(-1, 5, Rgba::WHITE);
    }

    #[test]
    fn test_blend_fill_keeps_surface_opaque() {
        let mut surface = Surface::new(3, 2);
        surface.fill(Rgba::BLACK);
        surface.blend_fill(Rgba::new(255, 0, 0, 128));
        assert_eq!(surface.pixel(2, 1), Rgba::opaque(128, 0, 0));

        surface.blend_fill(Rgba::TRANSPARENT);
        assert_eq!(surface.pixel(0, 0), Rgba::opaque(128, 0, 0));

        surface.blend_fill(Rgba::opaque(1, 2, 3));
        assert_eq!(surface.pixel(1, 0), Rgba::opaque(1, 2, 3));
    }

    #[test]
    fn test_darken_rows_ramps_towards_bottom() {
        let mut surface = Surface::new(2, 10);
        surface.fill(Rgba::WHITE);
        surface.darken_rows(6, 0.7);

        assert_eq!(surface.pixel(0, 5), Rgba::WHITE);
        let upper = surface.pixel(0, 6).r;
        let lower = surface.pixel(0, 9).r;
        assert!(upper > lower);
        // Bottom row centre sits at 87.5% of the ramp.
        assert!((95..=103).contains(&lower));
    }

    #[test]
    fn test_draw_image_clips() {
        let mut surface = Surface::new(4, 4);
        let red = RgbaImage::from_pixel(4, 4, Pixel([255, 0, 0, 255]));
        surface.draw_image(&red, -2, 2);
        assert_eq!(surface.pixel(0, 3), Rgba::opaque(255, 0, 0));
        assert_eq!(surface.pixel(3, 3), Rgba::TRANSPARENT);
        assert_eq!(surface.pixel(0, 0), Rgba::TRANSPARENT);
    }
}
