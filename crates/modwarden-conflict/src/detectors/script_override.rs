//! Script override conflicts
//!
//! Reads enabled mods' `.reds` sources under the game's script roots and
//! groups override annotations by `Class::func(params)`.

use std::collections::BTreeMap;
use std::sync::Arc;

use modwarden_core::domain::{ConflictEvidence, ConflictKind, ModId, RelativePath, Severity};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::detector::{ConflictDetector, ScanContext};
use crate::error::ConflictError;
use crate::parsers::{parse_redscript, ScriptOverride};

const SCRIPT_EXTENSIONS: [&str; 1] = ["reds"];

/// Several mods wrapping the same function; they chain and do not conflict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompatibleWrap {
    pub key: String,
    pub mod_ids: Vec<ModId>,
}

#[derive(Debug, Default)]
pub struct ScriptAnalysis {
    pub evidence: Vec<ConflictEvidence>,
    pub compatible_wraps: Vec<CompatibleWrap>,
}

struct Site<'a> {
    mod_id: ModId,
    file: &'a RelativePath,
    found: ScriptOverride,
}

fn push_unique(ids: &mut Vec<ModId>, id: ModId) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

#[derive(Debug, Default)]
pub struct ScriptOverrideDetector;

impl ScriptOverrideDetector {
    pub fn new() -> Self {
        Self
    }

    /// Full analysis including wrap-only groups. Reads files synchronously.
    pub fn analyze(ctx: &ScanContext) -> Result<ScriptAnalysis, ConflictError> {
        let mut by_key: BTreeMap<String, Vec<Site<'_>>> = BTreeMap::new();
        let mut files_read = 0usize;
        for (mod_id, file) in ctx.files_under(&ctx.game.script_roots, &SCRIPT_EXTENSIONS) {
            let Some(source) = ctx.read_text(file) else {
                continue;
            };
            files_read += 1;
            for found in parse_redscript(&source) {
                by_key.entry(found.key()).or_default().push(Site {
                    mod_id,
                    file,
                    found,
                });
            }
        }
        debug!(game = %ctx.game_id(), files = files_read, targets = by_key.len(), "Parsed scripts");

        let mut analysis = ScriptAnalysis::default();
        for (key, sites) in by_key {
            let mut replacers = Vec::new();
            let mut wrappers = Vec::new();
            let mut everyone = Vec::new();
            for site in &sites {
                if site.found.annotation.is_replace() {
                    push_unique(&mut replacers, site.mod_id);
                } else {
                    push_unique(&mut wrappers, site.mod_id);
                }
                push_unique(&mut everyone, site.mod_id);
            }
            if everyone.len() < 2 {
                continue;
            }
            ctx.sort_participants(&mut everyone);
            ctx.sort_participants(&mut replacers);
            ctx.sort_participants(&mut wrappers);

            let (severity, winner) = match replacers.len() {
                0 => {
                    analysis.compatible_wraps.push(CompatibleWrap {
                        key,
                        mod_ids: everyone,
                    });
                    continue;
                }
                1 => (Severity::Medium, None),
                _ => (Severity::High, ctx.winner_among(&replacers)),
            };

            let mut return_types: Vec<&str> =
                sites.iter().map(|s| s.found.return_type.as_str()).collect();
            return_types.sort_unstable();
            return_types.dedup();
            let site_detail: Vec<_> = sites
                .iter()
                .map(|s| {
                    json!({
                        "mod_id": s.mod_id,
                        "file": s.file,
                        "line": s.found.line,
                        "annotation": s.found.annotation,
                    })
                })
                .collect();

            analysis.evidence.push(
                ConflictEvidence::new(
                    ctx.game_id().clone(),
                    ConflictKind::ScriptOverride,
                    severity,
                    key,
                    everyone,
                )?
                .with_winner(winner)?
                .with_detail(json!({
                    "replaced_by": replacers,
                    "wrapped_by": wrappers,
                    "return_types": return_types,
                    "sites": site_detail,
                }))
                .with_created_at(ctx.started_at),
            );
        }

        Ok(analysis)
    }
}

#[async_trait::async_trait]
impl ConflictDetector for ScriptOverrideDetector {
    fn kind(&self) -> ConflictKind {
        ConflictKind::ScriptOverride
    }

    async fn detect(&self, ctx: Arc<ScanContext>) -> Result<Vec<ConflictEvidence>, ConflictError> {
        let analysis = tokio::task::spawn_blocking(move || Self::analyze(&ctx))
            .await
            .map_err(|e| ConflictError::Detector {
                detector: ConflictKind::ScriptOverride.to_string(),
                reason: e.to_string(),
            })??;
        if !analysis.compatible_wraps.is_empty() {
            debug!(wraps = analysis.compatible_wraps.len(), "Compatible wrap chains");
        }
        Ok(analysis.evidence)
    }
}
