// src/enumerate.rs

use crate::error::{Result, VmafCmpError};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions libvmaf writes its logs with. Directory walks skip them so a
/// second run over the same folder does not treat old logs as candidates.
const LOG_EXTENSIONS: &[&str] = &["json", "xml", "csv", "sub"];

/// Expands the candidate arguments into a flat list of files.
///
/// Files are taken as-is. Directories are walked depth-first, entries in the
/// order the file system lists them; unreadable entries and libvmaf logs are
/// left out.
pub fn expand_candidates(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let before = files.len();
            files.extend(walk_dir(path));
            debug!("{}: {} file(s)", path.display(), files.len() - before);
        } else if path.exists() {
            files.push(path.clone());
        } else {
            return Err(VmafCmpError::Input(format!(
                "Candidate path not found: {}",
                path.display()
            )));
        }
    }
    if files.is_empty() {
        warn!("No candidate files found");
    }
    Ok(files)
}

fn walk_dir(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if is_log_file(entry.path()) {
            debug!("Skipping log file {}", entry.path().display());
            continue;
        }
        files.push(entry.into_path());
    }
    files
}

fn is_log_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| LOG_EXTENSIONS.iter().any(|log| e.eq_ignore_ascii_case(log)))
}
