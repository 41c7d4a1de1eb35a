//! Tweak key conflicts
//!
//! Operations from different mods on the same dotted key (compared
//! case-insensitively) are checked pairwise:
//!
//! | pair                         | severity |
//! |------------------------------|----------|
//! | set / set, different values  | high     |
//! | set / append or remove       | medium   |
//! | append / remove, same value  | medium   |
//! | set / set, same value        | low      |
//!
//! Append/append and remove/remove pairs never conflict.

use std::collections::BTreeMap;
use std::sync::Arc;

use modwarden_core::domain::{ConflictEvidence, ConflictKind, ModId, RelativePath, Severity};
use serde_json::json;
use tracing::{debug, warn};

use crate::detector::{ConflictDetector, ScanContext};
use crate::error::ConflictError;
use crate::parsers::{parse_tweak_source, TweakOp, TweakOperation};

const TWEAK_EXTENSIONS: [&str; 4] = ["yaml", "yml", "xl", "tweak"];

/// Severity of two operations from different mods on the same key
pub fn pair_severity(a: &TweakOperation, b: &TweakOperation) -> Option<Severity> {
    match (a.op, b.op) {
        (TweakOp::Set, TweakOp::Set) if a.value == b.value => Some(Severity::Low),
        (TweakOp::Set, TweakOp::Set) => Some(Severity::High),
        (TweakOp::Set, _) | (_, TweakOp::Set) => Some(Severity::Medium),
        (TweakOp::Append, TweakOp::Remove) | (TweakOp::Remove, TweakOp::Append)
            if a.value == b.value =>
        {
            Some(Severity::Medium)
        }
        _ => None,
    }
}

struct Found<'a> {
    mod_id: ModId,
    file: &'a RelativePath,
    op: TweakOperation,
}

#[derive(Debug, Default)]
pub struct TweakKeyDetector;

impl TweakKeyDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(ctx: &ScanContext) -> Result<Vec<ConflictEvidence>, ConflictError> {
        let mut by_key: BTreeMap<String, Vec<Found<'_>>> = BTreeMap::new();
        for (mod_id, file) in ctx.files_under(&ctx.game.tweak_roots, &TWEAK_EXTENSIONS) {
            let Some(source) = ctx.read_text(file) else {
                continue;
            };
            match parse_tweak_source(file.file_name(), &source) {
                Ok(ops) => {
                    for op in ops {
                        by_key.entry(op.key.to_lowercase()).or_default().push(Found {
                            mod_id,
                            file,
                            op,
                        });
                    }
                }
                Err(e) => {
                    warn!(mod_id = mod_id.as_i64(), file = %file, error = %e, "Skipping unparsable tweak file");
                }
            }
        }
        debug!(game = %ctx.game_id(), keys = by_key.len(), "Parsed tweaks");

        let mut evidence = Vec::new();
        for (key, found) in by_key {
            let mut severity: Option<Severity> = None;
            let mut participants: Vec<ModId> = Vec::new();
            for (i, a) in found.iter().enumerate() {
                for b in &found[i + 1..] {
                    if a.mod_id == b.mod_id {
                        continue;
                    }
                    if let Some(s) = pair_severity(&a.op, &b.op) {
                        severity = severity.max(Some(s));
                        for id in [a.mod_id, b.mod_id] {
                            if !participants.contains(&id) {
                                participants.push(id);
                            }
                        }
                    }
                }
            }
            let Some(severity) = severity else {
                continue;
            };
            ctx.sort_participants(&mut participants);
            let winner = ctx.winner_among(&participants);
            let operations: Vec<_> = found
                .iter()
                .filter(|f| participants.contains(&f.mod_id))
                .map(|f| {
                    json!({
                        "mod_id": f.mod_id,
                        "file": f.file,
                        "key": f.op.key,
                        "op": f.op.op,
                        "value": f.op.value,
                    })
                })
                .collect();

            evidence.push(
                ConflictEvidence::new(
                    ctx.game_id().clone(),
                    ConflictKind::TweakKey,
                    severity,
                    key,
                    participants,
                )?
                .with_winner(winner)?
                .with_detail(json!({ "operations": operations }))
                .with_created_at(ctx.started_at),
            );
        }
        Ok(evidence)
    }
}

#[async_trait::async_trait]
impl ConflictDetector for TweakKeyDetector {
    fn kind(&self) -> ConflictKind {
        ConflictKind::TweakKey
    }

    async fn detect(&self, ctx: Arc<ScanContext>) -> Result<Vec<ConflictEvidence>, ConflictError> {
        tokio::task::spawn_blocking(move || Self::analyze(&ctx))
            .await
            .map_err(|e| ConflictError::Detector {
                detector: ConflictKind::TweakKey.to_string(),
                reason: e.to_string(),
            })?
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use modwarden_core::config::GameConfig;
    use modwarden_core::domain::{EffectiveOrder, GameId, InstalledMod};

    use super::*;

    fn op(op: TweakOp, value: &str) -> TweakOperation {
        TweakOperation {
            key: "k".into(),
            op,
            value: value.into(),
        }
    }

    fn install(root: &Path, id: i64, rel: &str, body: &str) -> InstalledMod {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
        InstalledMod::new(ModId::new(id), format!("mod{id}"))
            .with_files(vec![RelativePath::new(rel).unwrap()])
    }

    fn analyze(root: &Path, mods: Vec<InstalledMod>) -> Vec<ConflictEvidence> {
        let game = GameConfig::new(GameId::new("g").unwrap(), root.to_path_buf());
        let ctx = ScanContext::new(game, mods, vec![], EffectiveOrder::default());
        TweakKeyDetector::analyze(&ctx).unwrap()
    }

    #[test]
    fn test_pair_rules() {
        use TweakOp::*;
        assert_eq!(pair_severity(&op(Set, "1"), &op(Set, "2")), Some(Severity::High));
        assert_eq!(pair_severity(&op(Set, "1"), &op(Set, "1")), Some(Severity::Low));
        assert_eq!(pair_severity(&op(Set, "1"), &op(Append, "x")), Some(Severity::Medium));
        assert_eq!(pair_severity(&op(Remove, "x"), &op(Set, "1")), Some(Severity::Medium));
        assert_eq!(pair_severity(&op(Append, "x"), &op(Remove, "x")), Some(Severity::Medium));
        assert_eq!(pair_severity(&op(Append, "x"), &op(Remove, "y")), None);
        assert_eq!(pair_severity(&op(Append, "x"), &op(Append, "x")), None);
        assert_eq!(pair_severity(&op(Remove, "x"), &op(Remove, "y")), None);
    }

    #[test]
    fn test_differing_sets_across_formats_are_high() {
        let dir = tempfile::tempdir().unwrap();
        let mods = vec![
            install(dir.path(), 1, "r6/tweaks/a.yaml", "Items.Pistol:\n  price: 100\n"),
            install(dir.path(), 2, "r6/tweaks/b.tweak", "items.pistol.price = 250\n"),
        ];
        let evidence = analyze(dir.path(), mods);

        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].key(), "items.pistol.price");
        assert_eq!(evidence[0].severity(), Severity::High);
        assert_eq!(evidence[0].winner_mod_id(), Some(ModId::new(2)));
        assert_eq!(evidence[0].detail()["operations"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_identical_sets_are_low() {
        let dir = tempfile::tempdir().unwrap();
        let mods = vec![
            install(dir.path(), 1, "r6/tweaks/a.yml", "A.b: 5\n"),
            install(dir.path(), 2, "r6/tweaks/b.yml", "A.b: 5\n"),
        ];
        let evidence = analyze(dir.path(), mods);
        assert_eq!(evidence[0].severity(), Severity::Low);
    }

    #[test]
    fn test_appends_from_different_mods_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let mods = vec![
            install(dir.path(), 1, "r6/tweaks/a.yaml", "Vendor.items:\n  - Items.A\n"),
            install(dir.path(), 2, "r6/tweaks/b.yaml", "Vendor.items:\n  - Items.B\n"),
        ];
        assert!(analyze(dir.path(), mods).is_empty());
    }

    #[test]
    fn test_append_against_remove_of_same_value() {
        let dir = tempfile::tempdir().unwrap();
        let mods = vec![
            install(dir.path(), 1, "r6/tweaks/a.yaml", "Vendor.items:\n  - Items.A\n"),
            install(dir.path(), 2, "r6/tweaks/b.yaml", "Vendor.items:\n  - !remove Items.A\n"),
        ];
        let evidence = analyze(dir.path(), mods);
        assert_eq!(evidence[0].severity(), Severity::Medium);
    }

    #[test]
    fn test_broken_file_skipped_others_still_checked() {
        let dir = tempfile::tempdir().unwrap();
        let mods = vec![
            install(dir.path(), 1, "r6/tweaks/a.yaml", "A.b: [broken\n"),
            install(dir.path(), 2, "r6/tweaks/b.tweak", "A.b = 1\n"),
            install(dir.path(), 3, "r6/tweaks/c.tweak", "A.b = 2\n"),
        ];
        let evidence = analyze(dir.path(), mods);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].mod_ids(), &[ModId::new(2), ModId::new(3)]);
    }

    #[test]
    fn test_same_mod_ops_do_not_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let mods = vec![install(dir.path(), 1, "r6/tweaks/a.tweak", "A.b = 1\nA.b = 2\n")];
        assert!(analyze(dir.path(), mods).is_empty());
    }
}
