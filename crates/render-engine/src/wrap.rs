//! Greedy word wrapping.
//!
//! Wrapping is independent of any font: callers supply a closure that
//! measures the rendered width of a string, which keeps the algorithm pure
//! and lets tests measure in "characters" instead of pixels.

/// A wrapped line positioned on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedLine {
    pub text: String,
    /// Left edge.
    pub x: f32,
    /// Top edge of the line box.
    pub y: f32,
}

/// Break `text` into lines no wider than `max_width`.
///
/// Words are whitespace-separated and rejoined with single spaces, in order.
/// A word wider than `max_width` is never split; it becomes its own
/// (overflowing) line.
pub fn wrap_text<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };

        if measure(&candidate) > max_width && !current.is_empty() {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

/// Stack lines downwards from an origin, one fixed line height apart.
pub fn layout_lines(
    lines: Vec<String>,
    origin_x: f32,
    origin_y: f32,
    line_height: f32,
) -> Vec<PositionedLine> {
    lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| PositionedLine {
            text,
            x: origin_x,
            y: origin_y + i as f32 * line_height,
        })
        .collect()
}
