//! Timeline: the ordered scene list handed to the renderer.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::scene::{Background, Scene};

/// Errors from loading or saving a timeline snapshot.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Failed to read timeline {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write timeline {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid timeline JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Ordered scenes. Order is playback order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

/// How serious a validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Renders, but probably not as the author intended.
    Warning,
    /// Violates a model invariant; the renderer applies a fallback.
    Error,
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineIssue {
    pub scene_index: usize,
    pub severity: IssueSeverity,
    pub message: String,
}

impl std::fmt::Display for TimelineIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            IssueSeverity::Warning => "warning",
            IssueSeverity::Error => "error",
        };
        write!(f, "scene {}: {level}: {}", self.scene_index + 1, self.message)
    }
}

impl Timeline {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Sum of scene durations in milliseconds. Negative and non-finite
    /// durations contribute nothing.
    pub fn total_duration_ms(&self) -> f64 {
        self.scenes
            .iter()
            .map(|s| s.duration_secs)
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d * 1000.0)
            .sum()
    }

    /// Total frames across all scenes at `fps`.
    pub fn total_frames(&self, fps: u32) -> u64 {
        self.scenes.iter().map(|s| s.frame_count(fps)).sum()
    }

    /// Check the timeline for problems. Never blocks rendering.
    pub fn validate(&self) -> Vec<TimelineIssue> {
        let mut issues = Vec::new();
        let mut seen_ids = HashSet::new();

        for (index, scene) in self.scenes.iter().enumerate() {
            let mut push = |severity, message: String| {
                issues.push(TimelineIssue {
                    scene_index: index,
                    severity,
                    message,
                });
            };

            if !scene.duration_secs.is_finite() || scene.duration_secs <= 0.0 {
                push(
                    IssueSeverity::Error,
                    format!(
                        "duration must be positive (got {}); scene will show for one frame",
                        scene.duration_secs
                    ),
                );
            }

            match &scene.background {
                Background::Solid { color } => {
                    if scene.background.solid_color().is_none() {
                        push(
                            IssueSeverity::Warning,
                            format!("color {color:?} is not recognized; default fill will be used"),
                        );
                    }
                }
                Background::Image { reference } => {
                    if reference.trim().is_empty() {
                        push(
                            IssueSeverity::Error,
                            "image background has an empty reference".to_string(),
                        );
                    }
                }
            }

            if scene.title.trim().is_empty() && scene.subtitle.trim().is_empty() {
                push(IssueSeverity::Warning, "scene has no text".to_string());
            }

            if !scene.id.is_empty() && !seen_ids.insert(scene.id.as_str()) {
                push(
                    IssueSeverity::Warning,
                    format!("duplicate scene id {:?}", scene.id),
                );
            }
        }

        issues
    }

    /// Parse a timeline from JSON. Accepts either `{"scenes": [...]}` or a
    /// bare scene array.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if value.is_array() {
            let scenes: Vec<Scene> = serde_json::from_value(value)?;
            return Ok(Self { scenes });
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Load a timeline snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Resolve relative image paths against `base`, usually the directory
    /// the timeline file was loaded from. URLs and absolute paths are kept.
    pub fn rebase_image_paths(&mut self, base: &Path) {
        for scene in &mut self.scenes {
            if let Background::Image { reference } = &mut scene.background {
                let trimmed = reference.trim();
                if trimmed.is_empty() || has_url_scheme(trimmed) || Path::new(trimmed).is_absolute() {
                    continue;
                }
                *reference = base.join(trimmed).to_string_lossy().into_owned();
            }
        }
    }

    /// Write the timeline as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ModelError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

fn has_url_scheme(reference: &str) -> bool {
    ["data:", "http://", "https://", "file://"].iter().any(|scheme| {
        reference
            .get(..scheme.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_scenes() -> Timeline {
        Timeline::new(vec![Scene::new("A", 1.0), Scene::new("B", 2.0)])
    }

    #[test]
    fn test_total_duration_and_frames() {
        let timeline = two_scenes();
        assert!((timeline.total_duration_ms() - 3000.0).abs() < 1e-9);
        assert_eq!(timeline.total_frames(30), 90);
    }

    #[test]
    fn test_empty_timeline() {
        let timeline = Timeline::default();
        assert!(timeline.is_empty());
        assert_eq!(timeline.total_duration_ms(), 0.0);
        assert_eq!(timeline.total_frames(30), 0);
    }

    #[test]
    fn test_degenerate_durations_excluded_from_total() {
        let timeline = Timeline::new(vec![
            Scene::new("ok", 1.0),
            Scene::new("zero", 0.0),
            Scene::new("neg", -2.0),
        ]);
        assert!((timeline.total_duration_ms() - 1000.0).abs() < 1e-9);
        assert_eq!(timeline.total_frames(30), 32);
    }

    #[test]
    fn test_validate_reports_problems() {
        let timeline = Timeline::new(vec![
            Scene::new("A", 0.0).with_id("x"),
            Scene::new("B", 1.0)
                .with_id("x")
                .with_background(Background::solid("not-a-color")),
            Scene::new("", 1.0).with_background(Background::image("  ")),
        ]);

        let issues = timeline.validate();
        let errors = issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .count();
        assert_eq!(errors, 2);
        assert!(issues.iter().any(|i| i.message.contains("duplicate")));
        assert!(issues.iter().any(|i| i.message.contains("no text")));
        assert!(issues
            .iter()
            .any(|i| i.scene_index == 1 && i.message.contains("not recognized")));
    }

    #[test]
    fn test_default_background_is_flagged_but_renders() {
        // An empty color is legal and maps to the default fill.
        let issues = Timeline::new(vec![Scene::new("A", 1.0)]).validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Warning);
    }

    #[test]
    fn test_from_json_accepts_bare_array() {
        let timeline =
            Timeline::from_json(r#"[{"title":"A","duration":1},{"title":"B","duration":2}]"#)
                .unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.scenes[1].title, "B");
    }

    #[test]
    fn test_rebase_image_paths_only_touches_relative_paths() {
        let mut timeline = Timeline::new(vec![
            Scene::new("rel", 1.0).with_background(Background::image("images/bg.jpg")),
            Scene::new("abs", 1.0).with_background(Background::image("/srv/bg.jpg")),
            Scene::new("url", 1.0).with_background(Background::image("HTTPS://cdn.test/a.png")),
            Scene::new("data", 1.0).with_background(Background::image("data:image/png;base64,AA==")),
            Scene::new("file", 1.0).with_background(Background::image("file:///tmp/a.png")),
            Scene::new("solid", 1.0).with_background(Background::solid("#fff")),
        ]);
        let before = timeline.clone();

        timeline.rebase_image_paths(Path::new("/projects/launch"));

        assert_eq!(
            timeline.scenes[0].background.image_reference(),
            Some("/projects/launch/images/bg.jpg")
        );
        assert_eq!(timeline.scenes[1..], before.scenes[1..]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeline.json");
        let timeline = two_scenes();
        timeline.save(&path).unwrap();
        assert_eq!(Timeline::load(&path).unwrap(), timeline);
    }
}
