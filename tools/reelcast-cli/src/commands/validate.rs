//! Validate a scene timeline.

use std::path::PathBuf;

use reelcast_scene_model::IssueSeverity;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    println!("Validating timeline at: {}", path.display());

    let timeline = super::load_timeline(&path)?;
    println!("  Scenes: {}", timeline.len());
    println!("  Duration: {:.2}s", timeline.total_duration_ms() / 1000.0);

    let issues = timeline.validate();
    if issues.is_empty() {
        println!("\nTimeline is valid.");
        return Ok(());
    }

    println!("\nValidation issues:");
    for issue in &issues {
        println!("  - {issue}");
    }

    let errors = issues
        .iter()
        .filter(|i| i.severity == IssueSeverity::Error)
        .count();
    println!(
        "\n{} issue(s) found, {errors} error(s). Affected scenes render with fallbacks.",
        issues.len()
    );

    Ok(())
}
