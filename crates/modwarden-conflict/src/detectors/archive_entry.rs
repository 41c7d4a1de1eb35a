//! Archive-entry conflicts
//!
//! Two sources of collision:
//! - the same resource hash shipped by archives of two or more mods
//!   (from the persisted archive index)
//! - the same relative file path owned by two or more mods
//!   (from the registry's file lists)

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use modwarden_core::domain::{
    ArchiveIndexRecord, ConflictEvidence, ConflictKind, ModId, RelativePath, Severity,
};
use serde_json::json;
use tracing::debug;

use crate::detector::{ConflictDetector, ScanContext};
use crate::error::ConflictError;

const HIGH_RISK_DIRS: [&str; 2] = ["archive/pc/mod", "bin/x64/plugins"];
const MEDIUM_RISK_DIRS: [&str; 3] = ["r6/scripts", "r6/tweaks", "mods"];

/// Severity of a path collision by where the file lives
pub fn path_severity(path: &RelativePath) -> Severity {
    if HIGH_RISK_DIRS.iter().any(|d| path.is_under(d)) {
        Severity::High
    } else if MEDIUM_RISK_DIRS.iter().any(|d| path.is_under(d)) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Severity of a resource hash collision
///
/// Byte-identical content is harmless. Otherwise it grows with the number
/// of enabled owners actually competing at runtime.
pub fn hash_severity(identical_digests: bool, enabled_owners: usize) -> Severity {
    if identical_digests {
        return Severity::Low;
    }
    match enabled_owners {
        0 | 1 => Severity::Low,
        2 => Severity::Medium,
        _ => Severity::High,
    }
}

#[derive(Debug, Default)]
pub struct ArchiveEntryDetector;

impl ArchiveEntryDetector {
    pub fn new() -> Self {
        Self
    }

    fn hash_collisions(&self, ctx: &ScanContext) -> Result<Vec<ConflictEvidence>, ConflictError> {
        let mut groups: BTreeMap<u64, Vec<&ArchiveIndexRecord>> = BTreeMap::new();
        // Rows left behind by mods no longer in the registry do not compete
        let live = ctx
            .index_records
            .iter()
            .filter(|r| r.installed_mod_id.is_some_and(|id| ctx.installed_mod(id).is_some()));
        for record in live {
            groups
                .entry(record.resource_hash.as_u64())
                .or_default()
                .push(record);
        }

        let mut evidence = Vec::new();
        for (hash, records) in groups {
            let mut owners: Vec<ModId> = Vec::new();
            for owner in records.iter().filter_map(|r| r.installed_mod_id) {
                if !owners.contains(&owner) {
                    owners.push(owner);
                }
            }
            if owners.len() < 2 {
                continue;
            }
            ctx.sort_participants(&mut owners);

            let identical = records.windows(2).all(|w| w[0].digest == w[1].digest);
            let enabled = owners.iter().filter(|id| ctx.is_enabled(**id)).count();
            let severity = hash_severity(identical, enabled);
            let archives: Vec<_> = records
                .iter()
                .map(|r| {
                    json!({
                        "archive": r.archive_filename,
                        "path": r.archive_relative_path,
                        "mod_id": r.installed_mod_id,
                        "digest": r.digest,
                    })
                })
                .collect();

            let key = records[0].resource_hash.to_string();
            let winner = ctx.winner_among(&owners);
            evidence.push(
                ConflictEvidence::new(
                    ctx.game_id().clone(),
                    ConflictKind::ArchiveEntry,
                    severity,
                    key,
                    owners,
                )?
                .with_winner(winner)?
                .with_detail(json!({
                    "source": "resource_hash",
                    "hash": format!("{hash:#018x}"),
                    "identical_digests": identical,
                    "enabled_owners": enabled,
                    "archives": archives,
                }))
                .with_created_at(ctx.started_at),
            );
        }
        Ok(evidence)
    }

    fn path_collisions(&self, ctx: &ScanContext) -> Result<Vec<ConflictEvidence>, ConflictError> {
        let mut owners_by_path: BTreeMap<String, (&RelativePath, Vec<ModId>)> = BTreeMap::new();
        for m in &ctx.mods {
            for file in m.files() {
                let entry = owners_by_path
                    .entry(file.lookup_key())
                    .or_insert_with(|| (file, Vec::new()));
                if !entry.1.contains(&m.id()) {
                    entry.1.push(m.id());
                }
            }
        }

        let mut evidence = Vec::new();
        for (key, (path, mut owners)) in owners_by_path {
            if owners.len() < 2 {
                continue;
            }
            ctx.sort_participants(&mut owners);
            let enabled = owners.iter().filter(|id| ctx.is_enabled(**id)).count();
            let severity = if enabled >= 2 {
                path_severity(path)
            } else {
                Severity::Low
            };
            let winner = ctx.winner_among(&owners);
            let count = owners.len();
            evidence.push(
                ConflictEvidence::new(
                    ctx.game_id().clone(),
                    ConflictKind::ArchiveEntry,
                    severity,
                    key,
                    owners,
                )?
                .with_winner(winner)?
                .with_detail(json!({
                    "source": "file_path",
                    "path": path,
                    "count": count,
                    "enabled_owners": enabled,
                }))
                .with_created_at(ctx.started_at),
            );
        }
        Ok(evidence)
    }
}

#[async_trait::async_trait]
impl ConflictDetector for ArchiveEntryDetector {
    fn kind(&self) -> ConflictKind {
        ConflictKind::ArchiveEntry
    }

    async fn detect(&self, ctx: Arc<ScanContext>) -> Result<Vec<ConflictEvidence>, ConflictError> {
        let mut evidence = self.path_collisions(&ctx)?;
        let by_path = evidence.len();
        evidence.extend(self.hash_collisions(&ctx)?);
        debug!(
            game = %ctx.game_id(),
            path_collisions = by_path,
            hash_collisions = evidence.len() - by_path,
            "Archive entry detection done"
        );
        Ok(evidence)
    }
}
