//! Locating the file the engine actually wrote.
//!
//! The engine may append or swap container extensions depending on the
//! formats it merged, so the requested name is only a starting point.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::lifecycle::remove_quietly;

/// Container extensions probed after the requested name and its `.webm` twin.
const FALLBACK_EXTENSIONS: [&str; 4] = ["mkv", "mp4", "webm", "mp4.webm"];

/// Builds the ordered list of candidate output paths for a requested name.
#[must_use]
pub fn output_candidates(requested: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(2 + FALLBACK_EXTENSIONS.len());
    candidates.push(requested.to_path_buf());
    candidates.push(append_extension(requested, "webm"));

    let stem = requested.with_extension("");
    for ext in FALLBACK_EXTENSIONS {
        candidates.push(append_extension(&stem, ext));
    }
    candidates
}

/// Finds the first existing candidate under `work_dir`.
///
/// Returns the path and whether it exists. When nothing exists the requested
/// path is returned as a best effort.
pub async fn locate_output(work_dir: &Path, requested: &Path) -> (PathBuf, bool) {
    for candidate in output_candidates(requested) {
        let full = work_dir.join(&candidate);
        if tokio::fs::try_exists(&full).await.unwrap_or(false) {
            debug!(path = %full.display(), "located fetch output");
            return (full, true);
        }
    }
    (work_dir.join(requested), false)
}

/// Removes every candidate output for `requested` under `work_dir`, along
/// with the engine's `.part` leftovers.
pub async fn remove_outputs(work_dir: &Path, requested: &Path) {
    for candidate in output_candidates(requested) {
        let full = work_dir.join(&candidate);
        remove_quietly(&full).await;
        remove_quietly(&append_extension(&full, "part")).await;
    }
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}
