//! Installed-mod snapshot
//!
//! The installed-mod registry is an external collaborator. These types are
//! the read-only view the core works with: one row per installed mod plus the
//! relative paths it placed under the game's install root.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ModId, RelativePath};

/// An installed mod together with the files it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledMod {
    id: ModId,
    name: String,
    disabled: bool,
    installed_at: DateTime<Utc>,
    files: Vec<RelativePath>,
}

impl InstalledMod {
    pub fn new(id: ModId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            disabled: false,
            installed_at: Utc::now(),
            files: Vec::new(),
        }
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_installed_at(mut self, installed_at: DateTime<Utc>) -> Self {
        self.installed_at = installed_at;
        self
    }

    pub fn with_files(mut self, files: Vec<RelativePath>) -> Self {
        self.files = files;
        self
    }

    pub fn id(&self) -> ModId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    pub fn installed_at(&self) -> DateTime<Utc> {
        self.installed_at
    }

    pub fn files(&self) -> &[RelativePath] {
        &self.files
    }

    /// Owned files with the given extension (no dot, case-insensitive)
    pub fn files_with_extension<'a>(
        &'a self,
        ext: &'a str,
    ) -> impl Iterator<Item = &'a RelativePath> + 'a {
        self.files.iter().filter(move |f| f.has_extension(ext))
    }
}
