//! Recursive discovery of track files.

use std::path::{Path, PathBuf};

use crate::errors::PipelineError;
use crate::track_files::TrackFormat;

/// Every supported track file below `root`, sorted by path so that runs
/// over the same folder always see files in the same order.
pub fn discover_track_files(root: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();
    visit(root, &mut files)?;
    files.sort();
    tracing::debug!("Found {} track files under {}", files.len(), root.display());
    Ok(files)
}

fn visit(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), PipelineError> {
    let discovery_error = |source| PipelineError::Discovery {
        path: dir.to_path_buf(),
        source,
    };

    for entry in std::fs::read_dir(dir).map_err(discovery_error)? {
        let entry = entry.map_err(discovery_error)?;
        // Symlinked directories are not followed
        let file_type = entry.file_type().map_err(discovery_error)?;
        let path = entry.path();
        if file_type.is_dir() {
            visit(&path, files)?;
        } else if TrackFormat::from_path(&path).is_supported() {
            files.push(path);
        }
    }
    Ok(())
}

/// Name of the directory holding `path`, when that directory lies strictly
/// below `root`.
pub fn category_dir(root: &Path, path: &Path) -> Option<String> {
    let parent = path.parent()?;
    let relative = parent.strip_prefix(root).ok()?;
    if relative.as_os_str().is_empty() {
        return None;
    }
    parent.file_name()?.to_str().map(str::to_string)
}
