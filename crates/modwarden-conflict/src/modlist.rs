//! Ordering artifact (`modlist.txt`)
//!
//! The game reads one archive filename per line and loads them top to
//! bottom. Archives are grouped per owning mod; each unmanaged archive is a
//! group of its own.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use modwarden_core::config::GameConfig;
use modwarden_core::domain::{InstalledMod, LoadOrderPreference, ModId};
use serde::Serialize;
use tracing::debug;

pub const MODLIST_FILE_NAME: &str = "modlist.txt";

/// Archives loaded together, in the order they appear in the artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderGroup {
    /// `None` for an archive no installed mod claims
    pub owner: Option<ModId>,
    /// Sorted case-insensitively
    pub archives: Vec<String>,
}

impl OrderGroup {
    fn sort_name(&self) -> String {
        self.archives
            .first()
            .map(|a| a.to_lowercase())
            .unwrap_or_default()
    }
}

/// Archive filenames directly inside `dir` with the given extension,
/// sorted case-insensitively. A missing directory yields nothing.
pub fn scan_archive_names(dir: &Path, extension: &str) -> io::Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let matches = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if matches {
            names.push(name);
        }
    }
    names.sort_by_key(|n| n.to_lowercase());
    Ok(names)
}

/// Lines of an existing artifact, or `None` when there is none
pub fn read_modlist(path: &Path) -> io::Result<Option<Vec<String>>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string)
                .collect(),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Lowercased archive filename → enabled owning mod.
/// Only archives sitting directly in the modlist directory count.
pub fn archive_owners(game: &GameConfig, mods: &[InstalledMod]) -> HashMap<String, ModId> {
    let dir = game.modlist_dir.trim_matches('/').to_lowercase();
    let mut owners = HashMap::new();
    for m in mods.iter().filter(|m| m.is_enabled()) {
        for file in m.files_with_extension(&game.archive_extension) {
            let key = file.lookup_key();
            let parent = key.rsplit_once('/').map_or("", |(p, _)| p);
            if parent == dir {
                owners.insert(file.file_name().to_lowercase(), m.id());
            }
        }
    }
    owners
}

/// Base grouping before preferences
///
/// With an `existing` artifact, groups keep the order of their first listed
/// archive and unlisted groups follow. Otherwise groups sort by their
/// lowest archive filename. Archives of disabled mods are left out.
pub fn build_groups(
    on_disk: &[String],
    owners: &HashMap<String, ModId>,
    disabled_archives: &[String],
    existing: Option<&[String]>,
) -> Vec<OrderGroup> {
    let mut owned: HashMap<ModId, Vec<String>> = HashMap::new();
    let mut groups = Vec::new();
    for name in on_disk {
        let key = name.to_lowercase();
        match owners.get(&key) {
            Some(id) => owned.entry(*id).or_default().push(name.clone()),
            None if disabled_archives.contains(&key) => {
                debug!(archive = %name, "Archive belongs to a disabled mod, leaving it out");
            }
            None => groups.push(OrderGroup {
                owner: None,
                archives: vec![name.clone()],
            }),
        }
    }
    for (id, mut archives) in owned {
        archives.sort_by_key(|a| a.to_lowercase());
        groups.push(OrderGroup {
            owner: Some(id),
            archives,
        });
    }

    let listed: HashMap<String, usize> = existing
        .unwrap_or_default()
        .iter()
        .enumerate()
        .rev()
        .map(|(i, line)| (line.to_lowercase(), i))
        .collect();
    groups.sort_by_cached_key(|g| {
        let first_listed = g
            .archives
            .iter()
            .filter_map(|a| listed.get(&a.to_lowercase()).copied())
            .min();
        (first_listed.unwrap_or(usize::MAX), g.sort_name(), g.owner)
    });
    groups
}

/// Applies edges oldest first: a winner loading before its loser moves to
/// just after it. Later edges therefore override earlier contradicting ones.
pub fn apply_preferences(mut groups: Vec<OrderGroup>, preferences: &[LoadOrderPreference]) -> Vec<OrderGroup> {
    let mut ordered: Vec<&LoadOrderPreference> = preferences.iter().collect();
    ordered.sort_by_key(|p| p.seq);
    for pref in ordered {
        let find = |id: ModId, gs: &[OrderGroup]| gs.iter().position(|g| g.owner == Some(id));
        let (Some(w), Some(l)) = (
            find(pref.winner_mod_id, &groups),
            find(pref.loser_mod_id, &groups),
        ) else {
            continue;
        };
        if w < l {
            let group = groups.remove(w);
            groups.insert(l, group);
        }
    }
    groups
}

/// Artifact lines, one archive filename per line
pub fn render(groups: &[OrderGroup]) -> Vec<String> {
    groups
        .iter()
        .flat_map(|g| g.archives.iter().cloned())
        .collect()
}

/// Writes the artifact through a temporary file and a rename, or removes
/// it when there is nothing to list. Returns the number of lines written.
pub fn write_atomic(path: &Path, lines: &[String]) -> io::Result<usize> {
    if lines.is_empty() {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "Removed empty modlist"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        return Ok(0);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path: PathBuf = {
        let mut p = path.as_os_str().to_owned();
        p.push(".tmp");
        PathBuf::from(p)
    };
    let mut body = lines.join("\n");
    body.push('\n');
    std::fs::write(&tmp_path, body)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(lines.len())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use modwarden_core::domain::{GameId, RelativePath};

    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn pref(seq: i64, winner: i64, loser: i64) -> LoadOrderPreference {
        LoadOrderPreference {
            seq,
            game_id: GameId::new("g").unwrap(),
            winner_mod_id: ModId::new(winner),
            loser_mod_id: ModId::new(loser),
            created_at: Utc::now(),
        }
    }

    fn owners(pairs: &[(&str, i64)]) -> HashMap<String, ModId> {
        pairs
            .iter()
            .map(|(n, id)| (n.to_lowercase(), ModId::new(*id)))
            .collect()
    }

    #[test]
    fn test_groups_sorted_by_lowest_filename() {
        let disk = names(&["b_one.archive", "C_two.archive", "a_loose.archive", "z_one.archive"]);
        let own = owners(&[("b_one.archive", 1), ("z_one.archive", 1), ("c_two.archive", 2)]);
        let groups = build_groups(&disk, &own, &[], None);

        assert_eq!(
            render(&groups),
            names(&["a_loose.archive", "b_one.archive", "z_one.archive", "C_two.archive"])
        );
        assert_eq!(groups[0].owner, None);
        assert_eq!(groups[1].owner, Some(ModId::new(1)));
    }

    #[test]
    fn test_existing_artifact_is_authoritative() {
        let disk = names(&["a.archive", "b.archive", "new.archive"]);
        let own = owners(&[("a.archive", 1), ("b.archive", 2)]);
        let existing = names(&["b.archive", "a.archive"]);
        let groups = build_groups(&disk, &own, &[], Some(&existing));

        assert_eq!(
            render(&groups),
            names(&["b.archive", "a.archive", "new.archive"])
        );
    }

    #[test]
    fn test_disabled_archives_left_out() {
        let disk = names(&["a.archive", "off.archive"]);
        let groups = build_groups(&disk, &HashMap::new(), &names(&["off.archive"]), None);
        assert_eq!(render(&groups), names(&["a.archive"]));
    }

    #[test]
    fn test_preference_moves_winner_after_loser() {
        let disk = names(&["a.archive", "b.archive", "c.archive"]);
        let own = owners(&[("a.archive", 1), ("b.archive", 2), ("c.archive", 3)]);
        let groups = build_groups(&disk, &own, &[], None);

        let moved = apply_preferences(groups.clone(), &[pref(1, 1, 3)]);
        assert_eq!(render(&moved), names(&["b.archive", "c.archive", "a.archive"]));

        // Already satisfied: no change
        let same = apply_preferences(groups, &[pref(1, 3, 1)]);
        assert_eq!(render(&same), names(&["a.archive", "b.archive", "c.archive"]));
    }

    #[test]
    fn test_most_recent_contradicting_edge_wins() {
        let disk = names(&["a.archive", "b.archive"]);
        let own = owners(&[("a.archive", 1), ("b.archive", 2)]);
        let groups = build_groups(&disk, &own, &[], None);

        let ordered = apply_preferences(groups, &[pref(2, 2, 1), pref(1, 1, 2)]);
        assert_eq!(render(&ordered), names(&["a.archive", "b.archive"]));
    }

    #[test]
    fn test_archive_owners_only_direct_children_of_enabled_mods() {
        let game = GameConfig::new(GameId::new("g").unwrap(), "/tmp/none");
        let file = |p: &str| RelativePath::new(p).unwrap();
        let mods = vec![
            InstalledMod::new(ModId::new(1), "A").with_files(vec![
                file("archive/pc/mod/A.archive"),
                file("archive/pc/mod/sub/nested.archive"),
            ]),
            InstalledMod::new(ModId::new(2), "B")
                .with_disabled(true)
                .with_files(vec![file("archive/pc/mod/b.archive")]),
        ];
        let map = archive_owners(&game, &mods);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("a.archive"), Some(&ModId::new(1)));
    }

    #[test]
    fn test_scan_and_write_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("B.archive"), b"").unwrap();
        std::fs::write(dir.path().join("a.archive"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("sub.archive")).unwrap();

        let found = scan_archive_names(dir.path(), "archive").unwrap();
        assert_eq!(found, names(&["a.archive", "B.archive"]));

        let path = dir.path().join(MODLIST_FILE_NAME);
        assert_eq!(write_atomic(&path, &found).unwrap(), 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a.archive\nB.archive\n");
        assert_eq!(read_modlist(&path).unwrap(), Some(found));

        assert_eq!(write_atomic(&path, &[]).unwrap(), 0);
        assert!(!path.exists());
        assert_eq!(read_modlist(&path).unwrap(), None);
    }

    #[test]
    fn test_scan_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_archive_names(&dir.path().join("nope"), "archive")
            .unwrap()
            .is_empty());
    }
}
