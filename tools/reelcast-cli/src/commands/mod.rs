pub mod check;
pub mod export;
pub mod info;
pub mod init;
pub mod preview;
pub mod still;
pub mod validate;

use std::path::Path;

use reelcast_scene_model::Timeline;

/// Load a timeline file with a readable error. Relative image paths are
/// taken relative to the file, not the working directory.
pub fn load_timeline(path: &Path) -> anyhow::Result<Timeline> {
    let mut timeline =
        Timeline::load(path).map_err(|e| anyhow::anyhow!("Failed to load timeline: {e}"))?;
    if let Some(dir) = path.parent() {
        timeline.rebase_image_paths(dir);
    }
    Ok(timeline)
}
