use std::path::PathBuf;
use std::sync::Arc;

use reelcast_common::config::AssetDefaults;
use reelcast_render_engine::compositor::{BackgroundOutcome, Compositor, DEFAULT_BACKGROUND};
use reelcast_render_engine::{EstimatedText, ImageResolver, Surface};
use reelcast_scene_model::{IssueSeverity, Rgba, Timeline};

fn load_fixture_timeline() -> Timeline {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join("timelines")
        .join("product-update.json");

    Timeline::load(&path).expect("fixture timeline should load")
}

#[test]
fn fixture_frame_budget_is_stable() {
    let timeline = load_fixture_timeline();

    assert_eq!(timeline.len(), 4);
    assert!((timeline.total_duration_ms() - 8000.0).abs() < 1e-9);
    assert_eq!(timeline.total_frames(30), 240);
    assert_eq!(timeline.total_frames(24), 192);

    let errors = timeline
        .validate()
        .into_iter()
        .filter(|i| i.severity == IssueSeverity::Error)
        .count();
    assert_eq!(errors, 0);
}

#[tokio::test]
async fn fixture_backgrounds_resolve_per_scene() {
    let timeline = load_fixture_timeline();
    let resolver = Arc::new(ImageResolver::new(AssetDefaults {
        allow_remote: false,
        ..AssetDefaults::default()
    }));
    let mut compositor = Compositor::new(resolver, Box::new(EstimatedText::default()));
    let mut surface = Surface::new(160, 90);

    let mut corners = Vec::new();
    let mut outcomes = Vec::new();
    for scene in &timeline.scenes {
        let report = compositor.composite(&mut surface, scene).await;
        corners.push(surface.pixel(0, 0));
        outcomes.push(report.background);
    }

    assert_eq!(
        outcomes[0],
        BackgroundOutcome::Solid(Rgba::opaque(0x0b, 0x1d, 0x3a))
    );
    assert_eq!(outcomes[1], BackgroundOutcome::Image);
    assert_eq!(corners[1], Rgba::opaque(40, 120, 200));
    assert_eq!(corners[2], Rgba::opaque(20, 20, 20));
    assert!(matches!(outcomes[3], BackgroundOutcome::Fallback(_)));
    assert_eq!(corners[3], DEFAULT_BACKGROUND);
}
