//! Per-archive view of resource-hash collisions
//!
//! For every archive that shares at least one resource hash with another
//! archive, counts the hashes it wins and loses and rates how much of the
//! archive still reaches the game.
//!
//! The winning archive of a hash belongs to the mod the effective order
//! picks among the enabled owners. Archives without an enabled owner
//! (unclaimed, disabled or no longer registered) lose to any that have one.
//! Ties inside one mod, or among archives without an enabled owner, go to the
//! archive whose path sorts last.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use modwarden_core::domain::{ArchiveIndexRecord, EffectiveOrder, InstalledMod, ModId, RelativePath};
use serde::Serialize;

/// How badly an archive is overridden
///
/// Variants are declared worst first so sorting puts critical archives on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveImpact {
    /// Every entry loses; the archive has no effect
    Critical,
    /// More than half of the entries lose
    High,
    Moderate,
    /// Wins every collision it takes part in
    Info,
}

impl ArchiveImpact {
    pub fn classify(total_entries: u64, losing_entries: u64) -> Self {
        if losing_entries == 0 {
            Self::Info
        } else if total_entries > 0 && losing_entries >= total_entries {
            Self::Critical
        } else if total_entries > 0 && losing_entries * 2 > total_entries {
            Self::High
        } else {
            Self::Moderate
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for ArchiveImpact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveConflictSummary {
    pub archive_filename: String,
    pub archive_relative_path: RelativePath,
    pub installed_mod_id: Option<ModId>,
    /// Indexed entries of the archive, colliding or not
    pub total_entries: u64,
    pub winning_entries: u64,
    pub losing_entries: u64,
    /// Filenames of the archives it won against or lost to
    pub conflicting_archives: Vec<String>,
    pub impact: ArchiveImpact,
}

#[derive(Default)]
struct Tally<'a> {
    record: Option<&'a ArchiveIndexRecord>,
    total: u64,
    wins: u64,
    losses: u64,
    against: BTreeSet<String>,
}

/// Builds the summaries, worst impact first, then by filename
pub fn summarize_archives(
    records: &[ArchiveIndexRecord],
    mods: &[InstalledMod],
    order: &EffectiveOrder,
) -> Vec<ArchiveConflictSummary> {
    let enabled: HashMap<ModId, bool> = mods.iter().map(|m| (m.id(), m.is_enabled())).collect();
    let enabled_owner = |r: &ArchiveIndexRecord| {
        r.installed_mod_id
            .filter(|id| enabled.get(id).copied().unwrap_or(false))
    };

    let mut tallies: BTreeMap<String, Tally<'_>> = BTreeMap::new();
    let mut by_hash: BTreeMap<u64, Vec<&ArchiveIndexRecord>> = BTreeMap::new();
    for record in records {
        let key = record.archive_relative_path.lookup_key();
        let tally = tallies.entry(key.clone()).or_default();
        tally.record.get_or_insert(record);
        tally.total += 1;

        let group = by_hash.entry(record.resource_hash.as_u64()).or_default();
        if !group
            .iter()
            .any(|r| r.archive_relative_path.lookup_key() == key)
        {
            group.push(record);
        }
    }

    for group in by_hash.values().filter(|g| g.len() >= 2) {
        let mut owners: Vec<ModId> = Vec::new();
        for id in group.iter().filter_map(|r| enabled_owner(*r)) {
            if !owners.contains(&id) {
                owners.push(id);
            }
        }
        let winning_mod = order.winner_among(&owners);
        let Some(winner) = group
            .iter()
            .filter(|r| enabled_owner(**r) == winning_mod)
            .max_by_key(|r| r.archive_relative_path.lookup_key())
        else {
            continue;
        };

        let winner_key = winner.archive_relative_path.lookup_key();
        for loser in group.iter().filter(|r| !std::ptr::eq(**r, *winner)) {
            let loser_key = loser.archive_relative_path.lookup_key();
            if let Some(t) = tallies.get_mut(&loser_key) {
                t.losses += 1;
                t.against.insert(winner.archive_filename.clone());
            }
            if let Some(t) = tallies.get_mut(&winner_key) {
                t.against.insert(loser.archive_filename.clone());
            }
        }
        if let Some(t) = tallies.get_mut(&winner_key) {
            t.wins += 1;
        }
    }

    let mut summaries: Vec<ArchiveConflictSummary> = tallies
        .into_values()
        .filter(|t| t.wins + t.losses > 0)
        .filter_map(|t| {
            let record = t.record?;
            Some(ArchiveConflictSummary {
                archive_filename: record.archive_filename.clone(),
                archive_relative_path: record.archive_relative_path.clone(),
                installed_mod_id: record.installed_mod_id,
                total_entries: t.total,
                winning_entries: t.wins,
                losing_entries: t.losses,
                conflicting_archives: t.against.into_iter().collect(),
                impact: ArchiveImpact::classify(t.total, t.losses),
            })
        })
        .collect();
    summaries.sort_by(|a, b| {
        (a.impact, a.archive_filename.to_lowercase(), a.archive_relative_path.lookup_key()).cmp(&(
            b.impact,
            b.archive_filename.to_lowercase(),
            b.archive_relative_path.lookup_key(),
        ))
    });
    summaries
}
