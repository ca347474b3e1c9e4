//! Where Skinsight stores its own data (config, default artifacts).
//!
//! Input files and index artifacts live wherever the user points the CLI. We only store app state here.

use std::path::PathBuf;

/// Returns the directory where Skinsight stores its config.
/// On Linux: `~/.local/share/skinsight/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("app", "Skinsight", "Skinsight")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}
