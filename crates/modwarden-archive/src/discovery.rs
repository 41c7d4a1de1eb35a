//! Archive discovery
//!
//! Walks each configured mod directory below the install root and collects
//! files with the archive extension. Results are sorted by their
//! case-insensitive relative path so every run enumerates archives in the
//! same order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use modwarden_core::domain::RelativePath;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// An archive found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredArchive {
    pub absolute: PathBuf,
    pub relative: RelativePath,
}

impl DiscoveredArchive {
    pub fn file_name(&self) -> &str {
        self.relative.file_name()
    }
}

/// Collects `*.{extension}` files under `install_root/<mod_path>` for every
/// mod path. Missing directories are skipped; overlapping mod paths do not
/// produce duplicates.
pub fn discover_archives(
    install_root: &Path,
    mod_paths: &[String],
    extension: &str,
) -> Vec<DiscoveredArchive> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for mod_path in mod_paths {
        let root = install_root.join(mod_path);
        if !root.is_dir() {
            debug!(dir = %root.display(), "Mod directory does not exist, skipping");
            continue;
        }

        for entry in WalkDir::new(&root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %root.display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let matches_ext = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(extension))
                .unwrap_or(false);
            if !matches_ext {
                continue;
            }

            let Ok(rel) = entry.path().strip_prefix(install_root) else {
                continue;
            };
            let relative = match RelativePath::new(&rel.to_string_lossy()) {
                Ok(relative) => relative,
                Err(e) => {
                    debug!(path = %entry.path().display(), error = %e, "Ignoring archive path");
                    continue;
                }
            };
            if seen.insert(relative.lookup_key()) {
                found.push(DiscoveredArchive {
                    absolute: entry.path().to_path_buf(),
                    relative,
                });
            }
        }
    }

    found.sort_by(|a, b| {
        a.relative
            .lookup_key()
            .cmp(&b.relative.lookup_key())
            .then_with(|| a.relative.cmp(&b.relative))
    });
    found
}
