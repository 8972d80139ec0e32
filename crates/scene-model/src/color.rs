//! Color values for solid backgrounds and text.

use serde::{Deserialize, Serialize};

/// An 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Same color with a different alpha.
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Parse a CSS-style color string.
    ///
    /// Accepts `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)`,
    /// `rgba(r, g, b, a)` with `a` in `0..=1`, and a handful of named
    /// colors. Returns `None` for empty or unrecognized input.
    pub fn parse(input: &str) -> Option<Rgba> {
        let value = input.trim();
        if value.is_empty() {
            return None;
        }

        if let Some(hex) = value.strip_prefix('#') {
            return parse_hex(hex);
        }

        let lower = value.to_ascii_lowercase();
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return parse_functional(args);
        }

        named(&lower)
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => Some(Rgba::opaque(nibble(0)?, nibble(1)?, nibble(2)?)),
        4 => Some(Rgba::new(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Some(Rgba::opaque(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Rgba::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

fn parse_functional(args: &str) -> Option<Rgba> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }

    let channel = |s: &str| -> Option<u8> {
        let v: f64 = s.parse().ok()?;
        v.is_finite().then(|| v.round().clamp(0.0, 255.0) as u8)
    };

    let r = channel(parts[0])?;
    let g = channel(parts[1])?;
    let b = channel(parts[2])?;
    let a = match parts.get(3) {
        Some(alpha) => {
            let v: f64 = alpha.parse().ok()?;
            if !v.is_finite() {
                return None;
            }
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        None => 255,
    };

    Some(Rgba::new(r, g, b, a))
}

fn named(name: &str) -> Option<Rgba> {
    let color = match name {
        "black" => Rgba::BLACK,
        "white" => Rgba::WHITE,
        "red" => Rgba::opaque(255, 0, 0),
        "green" => Rgba::opaque(0, 128, 0),
        "blue" => Rgba::opaque(0, 0, 255),
        "gray" | "grey" => Rgba::opaque(128, 128, 128),
        "navy" => Rgba::opaque(0, 0, 128),
        "teal" => Rgba::opaque(0, 128, 128),
        "purple" => Rgba::opaque(128, 0, 128),
        "orange" => Rgba::opaque(255, 165, 0),
        "transparent" => Rgba::TRANSPARENT,
        _ => return None,
    };
    Some(color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(Rgba::parse("#fff"), Some(Rgba::WHITE));
        assert_eq!(Rgba::parse("#1a2b3c"), Some(Rgba::opaque(0x1a, 0x2b, 0x3c)));
        assert_eq!(Rgba::parse("#00000080"), Some(Rgba::new(0, 0, 0, 0x80)));
        assert_eq!(Rgba::parse("#f008"), Some(Rgba::new(255, 0, 0, 0x88)));
    }

    #[test]
    fn test_parse_functional_forms() {
        assert_eq!(Rgba::parse("rgb(10, 20, 30)"), Some(Rgba::opaque(10, 20, 30)));
        assert_eq!(
            Rgba::parse("RGBA(255,255,255,0.5)"),
            Some(Rgba::new(255, 255, 255, 128))
        );
        assert_eq!(Rgba::parse("rgb(300, -4, 0)"), Some(Rgba::opaque(255, 0, 0)));
    }

    #[test]
    fn test_parse_named() {
        assert_eq!(Rgba::parse(" Navy "), Some(Rgba::opaque(0, 0, 128)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Rgba::parse(""), None);
        assert_eq!(Rgba::parse("   "), None);
        assert_eq!(Rgba::parse("#12"), None);
        assert_eq!(Rgba::parse("#zzzzzz"), None);
        assert_eq!(Rgba::parse("rgb(1,2)"), None);
        assert_eq!(Rgba::parse("chartreuse-ish"), None);
    }
}
