//! Scene definitions.

use serde::{Deserialize, Serialize};

use crate::color::Rgba;

/// One timed unit of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Opaque identifier assigned by the editor. Not interpreted here.
    #[serde(default)]
    pub id: String,

    /// Headline text. May be empty.
    #[serde(default)]
    pub title: String,

    /// Secondary text drawn under the title. May be empty.
    #[serde(default)]
    pub subtitle: String,

    /// Playback duration in seconds.
    #[serde(rename = "duration")]
    pub duration_secs: f64,

    /// What fills the frame behind the text.
    #[serde(default)]
    pub background: Background,
}

/// Scene background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Background {
    /// A CSS-style color string. Unparseable values render as the default fill.
    Solid { color: String },

    /// An image locator: `data:` URL, `http(s)://` URL, `file://` URL, or path.
    Image {
        #[serde(rename = "src", alias = "reference")]
        reference: String,
    },
}

impl Default for Background {
    fn default() -> Self {
        Self::Solid {
            color: String::new(),
        }
    }
}

impl Background {
    pub fn solid(color: impl Into<String>) -> Self {
        Self::Solid {
            color: color.into(),
        }
    }

    pub fn image(reference: impl Into<String>) -> Self {
        Self::Image {
            reference: reference.into(),
        }
    }

    /// Parsed fill color for solid backgrounds, `None` when unparseable or
    /// when the background is an image.
    pub fn solid_color(&self) -> Option<Rgba> {
        match self {
            Self::Solid { color } => Rgba::parse(color),
            Self::Image { .. } => None,
        }
    }

    /// Image reference, if any.
    pub fn image_reference(&self) -> Option<&str> {
        match self {
            Self::Image { reference } => Some(reference),
            Self::Solid { .. } => None,
        }
    }
}

impl Scene {
    /// Create a scene with a title and duration on the default background.
    pub fn new(title: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            subtitle: String::new(),
            duration_secs,
            background: Background::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    /// Number of frames this scene occupies at `fps`.
    pub fn frame_count(&self, fps: u32) -> u64 {
        frames_for_duration(self.duration_secs, fps)
    }
}

/// Frames needed to show `duration_secs` at `fps`: `max(1, round(d * fps))`.
///
/// Non-positive and non-finite durations still produce a single frame.
pub fn frames_for_duration(duration_secs: f64, fps: u32) -> u64 {
    let frames = duration_secs * fps as f64;
    if !frames.is_finite() || frames <= 0.0 {
        return 1;
    }
    (frames.round() as u64).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_frames_for_duration_rounds() {
        assert_eq!(frames_for_duration(1.0, 30), 30);
        assert_eq!(frames_for_duration(2.0, 30), 60);
        assert_eq!(frames_for_duration(0.51, 30), 15);
        assert_eq!(frames_for_duration(0.01, 30), 1);
    }

    #[test]
    fn test_degenerate_durations_yield_one_frame() {
        assert_eq!(frames_for_duration(0.0, 30), 1);
        assert_eq!(frames_for_duration(-3.0, 30), 1);
        assert_eq!(frames_for_duration(f64::NAN, 30), 1);
        assert_eq!(frames_for_duration(f64::INFINITY, 30), 1);
    }

    #[test]
    fn test_background_json_shape() {
        let scene: Scene = serde_json::from_str(
            r#"{"id":"a","title":"Hi","duration":1.5,"background":{"type":"image","src":"data:,"}}"#,
        )
        .unwrap();
        assert_eq!(scene.background.image_reference(), Some("data:,"));
        assert_eq!(scene.subtitle, "");

        let aliased: Background =
            serde_json::from_str(r#"{"type":"image","reference":"a.png"}"#).unwrap();
        assert_eq!(aliased, Background::image("a.png"));

        let solid: Background = serde_json::from_str(r##"{"type":"solid","color":"#fff"}"##).unwrap();
        assert_eq!(solid.solid_color(), Some(Rgba::WHITE));
    }

    proptest! {
        #[test]
        fn frame_count_matches_rounded_product(d in 0.0f64..120.0, fps in 1u32..=120) {
            let expected = ((d * fps as f64).round() as u64).max(1);
            prop_assert_eq!(frames_for_duration(d, fps), expected);
        }
    }
}
