//! Integration tests for the conflict engine and the reindex use case

use std::fs;
use std::path::Path;
use std::sync::Arc;

use modwarden_archive::format::{HASH_ENTRY_SIZE, HEADER_SIZE, MAGIC, PREAMBLE_SIZE};
use modwarden_archive::ArchiveIndexer;
use modwarden_cache::{DatabasePool, SqliteCacheRepository, SqliteModRegistry};
use modwarden_conflict::{
    builtin_set, ArchiveImpact, ConflictDetector, ConflictEngine, ConflictError, EngineState,
    EvidenceQuery, LoadOrderResolver, ReindexUseCase, ScanContext,
};
use modwarden_core::config::GameConfig;
use modwarden_core::domain::{ConflictEvidence, ConflictKind, GameId, ModId, Severity};
use modwarden_core::ports::{EvidenceFilter, IEvidenceRepository, ProgressSink};
use modwarden_core::scan_lock::GameScanLocks;

struct Fixture {
    _db: DatabasePool,
    _dir: tempfile::TempDir,
    repo: Arc<SqliteCacheRepository>,
    registry: Arc<SqliteModRegistry>,
    resolver: Arc<LoadOrderResolver>,
    locks: GameScanLocks,
    game: GameConfig,
}

impl Fixture {
    fn engine(&self, detectors: Vec<Arc<dyn ConflictDetector>>) -> ConflictEngine {
        ConflictEngine::new(
            self.registry.clone(),
            self.repo.clone(),
            self.repo.clone(),
            self.resolver.clone(),
            detectors,
            self.locks.clone(),
        )
    }

    fn default_engine(&self) -> ConflictEngine {
        self.engine(builtin_set(&ConflictKind::ALL))
    }

    fn indexer(&self) -> ArchiveIndexer {
        ArchiveIndexer::new(self.repo.clone(), self.registry.clone(), self.locks.clone())
    }

    fn query(&self) -> EvidenceQuery {
        EvidenceQuery::new(
            self.repo.clone(),
            self.registry.clone(),
            self.repo.clone(),
            self.resolver.clone(),
        )
    }

    fn root(&self) -> &Path {
        &self.game.install_path
    }

    async fn install(&self, name: &str, files: &[(&str, Vec<u8>)]) -> ModId {
        for (rel, body) in files {
            let path = self.root().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        let rels: Vec<&str> = files.iter().map(|(rel, _)| *rel).collect();
        self.registry
            .register_mod(&self.game.id, name, &rels, false)
            .await
            .unwrap()
    }
}

async fn setup() -> Fixture {
    let db = DatabasePool::in_memory().await.expect("database");
    let repo = Arc::new(SqliteCacheRepository::new(db.pool().clone()));
    let registry = Arc::new(SqliteModRegistry::new(db.pool().clone()));
    let resolver = Arc::new(LoadOrderResolver::new(registry.clone(), repo.clone()));
    let dir = tempfile::tempdir().expect("tempdir");
    let game = GameConfig::new(GameId::new("cp2077").unwrap(), dir.path().to_path_buf());
    Fixture {
        _db: db,
        _dir: dir,
        repo,
        registry,
        resolver,
        locks: GameScanLocks::new(),
        game,
    }
}

fn archive(entries: &[(u64, u8)]) -> Vec<u8> {
    let total = HEADER_SIZE + PREAMBLE_SIZE + entries.len() * HASH_ENTRY_SIZE;
    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&12u32.to_le_bytes());
    buf.extend_from_slice(&(HEADER_SIZE as u64).to_le_bytes());
    buf.extend_from_slice(&7u64.to_le_bytes());
    buf.extend_from_slice(&0u64.to_le_bytes());
    buf.extend_from_slice(&(total as u64).to_le_bytes());
    for field in [0u32, 0, entries.len() as u32, 0, 0] {
        buf.extend_from_slice(&field.to_le_bytes());
    }
    buf.extend_from_slice(&0u64.to_le_bytes());
    for (hash, digest) in entries {
        buf.extend_from_slice(&hash.to_le_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&[0u8; 16]);
        buf.extend_from_slice(&[*digest; 20]);
    }
    buf
}

const REPLACE_ON_DEATH: &str =
    "@replaceMethod(PlayerPuppet)\npublic func OnDeath(evt: ref<gameDeathEvent>) -> Bool {\n  return true;\n}\n";

/// Two mods that collide in every way the detectors look for
async fn colliding_pair(f: &Fixture) -> (ModId, ModId) {
    let a = f
        .install(
            "Alpha",
            &[
                ("archive/pc/mod/alpha.archive", archive(&[(0xDEADBEEF, 1), (0x10, 1)])),
                ("r6/scripts/alpha/main.reds", REPLACE_ON_DEATH.as_bytes().to_vec()),
                ("r6/tweaks/alpha.yaml", b"Items.Pistol:\n  price: 100\n".to_vec()),
                ("bin/x64/plugins/shared.dll", b"a".to_vec()),
            ],
        )
        .await;
    let b = f
        .install(
            "Beta",
            &[
                ("archive/pc/mod/beta.archive", archive(&[(0xDEADBEEF, 2), (0x20, 1)])),
                ("r6/scripts/beta/main.reds", REPLACE_ON_DEATH.as_bytes().to_vec()),
                ("r6/tweaks/beta.tweak", b"Items.Pistol.price = 250\n".to_vec()),
                ("bin/x64/plugins/shared.dll", b"b".to_vec()),
            ],
        )
        .await;
    (a, b)
}

struct FailingDetector;

#[async_trait::async_trait]
impl ConflictDetector for FailingDetector {
    fn kind(&self) -> ConflictKind {
        ConflictKind::TweakKey
    }

    async fn detect(&self, _ctx: Arc<ScanContext>) -> Result<Vec<ConflictEvidence>, ConflictError> {
        Err(ConflictError::Validation("boom".into()))
    }
}

struct PanickingDetector;

#[async_trait::async_trait]
impl ConflictDetector for PanickingDetector {
    fn kind(&self) -> ConflictKind {
        ConflictKind::ScriptOverride
    }

    async fn detect(&self, _ctx: Arc<ScanContext>) -> Result<Vec<ConflictEvidence>, ConflictError> {
        panic!("detector bug")
    }
}

#[tokio::test]
async fn test_repeated_runs_do_not_accumulate() {
    let f = setup().await;
    colliding_pair(&f).await;
    f.indexer().index(&f.game, false, &ProgressSink::none()).await.unwrap();
    let engine = f.default_engine();

    let mut counts = Vec::new();
    for _ in 0..3 {
        let report = engine.run(&f.game, &ProgressSink::none()).await.unwrap();
        let stored = f
            .repo
            .query_evidence(&f.game.id, &EvidenceFilter::new())
            .await
            .unwrap();
        assert_eq!(stored.len(), report.evidence.len());
        counts.push(stored.len());
    }
    assert!(counts[0] > 0);
    assert_eq!(counts[0], counts[1]);
    assert_eq!(counts[1], counts[2]);
}

#[tokio::test]
async fn test_every_detector_reports_its_collision() {
    let f = setup().await;
    let (a, b) = colliding_pair(&f).await;
    f.indexer().index(&f.game, false, &ProgressSink::none()).await.unwrap();

    let report = f.default_engine().run(&f.game, &ProgressSink::none()).await.unwrap();
    assert_eq!(report.state, EngineState::Complete);
    assert_eq!(report.coverage(), 1.0);

    let find = |kind: ConflictKind, key: &str| {
        report
            .evidence
            .iter()
            .find(|e| e.kind() == kind && e.key() == key)
            .unwrap_or_else(|| panic!("missing {kind} evidence for {key}"))
    };

    let hash = find(ConflictKind::ArchiveEntry, "0x00000000deadbeef");
    assert_eq!(hash.severity(), Severity::Medium);
    assert_eq!(hash.mod_ids(), &[a, b]);

    let path = find(ConflictKind::ArchiveEntry, "bin/x64/plugins/shared.dll");
    assert_eq!(path.severity(), Severity::High);
    assert!(path.involves(a) && path.involves(b));

    let script = find(
        ConflictKind::ScriptOverride,
        "PlayerPuppet::OnDeath(ref<gameDeathEvent>)",
    );
    assert_eq!(script.severity(), Severity::High);

    let tweak = find(ConflictKind::TweakKey, "items.pistol.price");
    assert_eq!(tweak.severity(), Severity::High);

    let counts = report.count_by_kind();
    assert_eq!(counts.get(&ConflictKind::ScriptOverride), Some(&1));
    assert_eq!(counts.get(&ConflictKind::TweakKey), Some(&1));
}

#[tokio::test]
async fn test_two_mods_owning_same_path() {
    let f = setup().await;
    let a = f
        .install("A", &[("archive/pc/mod/shared.archive", archive(&[(1, 1)]))])
        .await;
    let b = f
        .registry
        .register_mod(&f.game.id, "B", &["archive/pc/mod/shared.archive"], false)
        .await
        .unwrap();

    let report = f
        .engine(builtin_set(&[ConflictKind::ArchiveEntry]))
        .run(&f.game, &ProgressSink::none())
        .await
        .unwrap();
    let hit = report
        .evidence
        .iter()
        .find(|e| e.kind() == ConflictKind::ArchiveEntry && e.involves(a) && e.involves(b));
    assert!(hit.is_some());
}

#[tokio::test]
async fn test_failed_detectors_degrade_coverage_only() {
    let f = setup().await;
    colliding_pair(&f).await;
    f.indexer().index(&f.game, false, &ProgressSink::none()).await.unwrap();

    let detectors: Vec<Arc<dyn ConflictDetector>> = vec![
        Arc::new(FailingDetector),
        builtin_set(&[ConflictKind::ArchiveEntry]).remove(0),
        Arc::new(PanickingDetector),
    ];
    let engine = f.engine(detectors);
    let report = engine.run(&f.game, &ProgressSink::none()).await.unwrap();

    assert_eq!(report.state, EngineState::Complete);
    assert_eq!(engine.state(&f.game.id), EngineState::Complete);
    assert_eq!(report.outcomes.len(), 3);
    assert!(report.outcomes[0].is_failed());
    assert!(!report.outcomes[1].is_failed());
    assert!(report.outcomes[2].is_failed());
    assert!((report.coverage() - 1.0 / 3.0).abs() < 1e-9);
    assert!(!report.evidence.is_empty());
    assert!(report
        .evidence
        .iter()
        .all(|e| e.kind() == ConflictKind::ArchiveEntry));
}

#[tokio::test]
async fn test_sequential_and_parallel_agree() {
    let f = setup().await;
    colliding_pair(&f).await;
    f.indexer().index(&f.game, false, &ProgressSink::none()).await.unwrap();

    let keys = |evidence: &[ConflictEvidence]| {
        evidence
            .iter()
            .map(|e| (e.kind(), e.key().to_string(), e.severity(), e.winner_mod_id()))
            .collect::<Vec<_>>()
    };
    let parallel = f.default_engine().run(&f.game, &ProgressSink::none()).await.unwrap();
    let sequential = f
        .default_engine()
        .with_parallel(false)
        .run(&f.game, &ProgressSink::none())
        .await
        .unwrap();
    assert_eq!(keys(&parallel.evidence), keys(&sequential.evidence));
}

#[tokio::test]
async fn test_preference_decides_winner() {
    let f = setup().await;
    let (a, b) = colliding_pair(&f).await;
    f.indexer().index(&f.game, false, &ProgressSink::none()).await.unwrap();
    let engine = f.default_engine();

    // beta.archive sorts after alpha.archive, so B loads last by default
    let before = engine.run(&f.game, &ProgressSink::none()).await.unwrap();
    let hash_winner = |evidence: &[ConflictEvidence]| {
        evidence
            .iter()
            .find(|e| e.key() == "0x00000000deadbeef")
            .and_then(|e| e.winner_mod_id())
    };
    assert_eq!(hash_winner(&before.evidence), Some(b));

    f.resolver.add_preferences(&f.game, a, &[b]).await.unwrap();
    let after = engine.run(&f.game, &ProgressSink::none()).await.unwrap();
    assert_eq!(hash_winner(&after.evidence), Some(a));
    for ev in after.evidence.iter().filter(|e| e.winner_mod_id().is_some()) {
        assert_eq!(ev.winner_mod_id(), Some(a), "conflict {}", ev.key());
    }
}

#[tokio::test]
async fn test_engine_progress_phase() {
    let f = setup().await;
    let (sink, mut rx) = ProgressSink::channel(8);
    f.default_engine().run(&f.game, &sink).await.unwrap();
    drop(sink);

    let mut messages = Vec::new();
    while let Some(event) = rx.recv().await {
        assert_eq!(event.phase, "conflicts");
        messages.push(event.message);
    }
    assert_eq!(
        messages,
        vec![
            "archive_entry complete",
            "script_override complete",
            "tweak_key complete"
        ]
    );
}

#[tokio::test]
async fn test_reindex_use_case_summary() {
    let f = setup().await;
    colliding_pair(&f).await;
    let indexer = Arc::new(f.indexer());
    let engine = Arc::new(f.default_engine());

    let summary = ReindexUseCase::new(indexer, engine)
        .run(&f.game, &ProgressSink::none())
        .await
        .unwrap();
    assert_eq!(summary.index.new_entries, 4);
    assert!(summary.conflicts_found >= 4);
    assert_eq!(
        summary.by_kind.values().sum::<u64>() as usize,
        summary.conflicts_found
    );
    assert_eq!(summary.coverage, 1.0);
}

#[tokio::test]
async fn test_evidence_query_resolves_names() {
    let f = setup().await;
    let (a, _) = colliding_pair(&f).await;
    f.indexer().index(&f.game, false, &ProgressSink::none()).await.unwrap();
    f.default_engine().run(&f.game, &ProgressSink::none()).await.unwrap();

    let query = f.query();
    let scripts = query
        .list(&f.game.id, Some(ConflictKind::ScriptOverride), None)
        .await
        .unwrap();
    assert_eq!(scripts.len(), 1);
    let names: Vec<_> = scripts[0].mods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta"]);
    assert_eq!(scripts[0].winner.as_ref().map(|w| w.name.as_str()), Some("Beta"));

    let high = query
        .list(&f.game.id, None, Some(Severity::High))
        .await
        .unwrap();
    assert!(high.iter().all(|e| e.severity == Severity::High));

    // Evidence outliving its mods falls back to a placeholder name
    let orphan = ConflictEvidence::new(
        f.game.id.clone(),
        ConflictKind::TweakKey,
        Severity::Low,
        "a.b",
        vec![a, ModId::new(4242)],
    )
    .unwrap();
    f.repo.replace_evidence(&f.game.id, &[orphan]).await.unwrap();
    let views = query.list(&f.game.id, None, None).await.unwrap();
    assert_eq!(views[0].mods[1].name, "Unknown (ID 4242)");
}

#[tokio::test]
async fn test_disabled_mod_is_participant_not_winner() {
    let f = setup().await;
    let (a, b) = colliding_pair(&f).await;
    f.indexer().index(&f.game, false, &ProgressSink::none()).await.unwrap();
    f.registry.set_disabled(b, true).await.unwrap();

    let report = f
        .engine(builtin_set(&[ConflictKind::ArchiveEntry]))
        .run(&f.game, &ProgressSink::none())
        .await
        .unwrap();
    let hash = report
        .evidence
        .iter()
        .find(|e| e.key() == "0x00000000deadbeef")
        .unwrap();
    assert!(hash.involves(b));
    assert_eq!(hash.winner_mod_id(), Some(a));
    assert_eq!(hash.severity(), Severity::Low);
}

#[tokio::test]
async fn test_archive_summary_follows_preferences() {
    let f = setup().await;
    let (a, b) = colliding_pair(&f).await;
    f.indexer().index(&f.game, false, &ProgressSink::none()).await.unwrap();

    // Beta loads last: alpha.archive loses 0xDEADBEEF and keeps 0x10
    let summary = f.query().archive_summary(&f.game).await.unwrap();
    let names: Vec<_> = summary.iter().map(|s| s.archive_filename.as_str()).collect();
    assert_eq!(names, vec!["alpha.archive", "beta.archive"]);
    assert_eq!(summary[0].installed_mod_id, Some(a));
    assert_eq!(
        (summary[0].total_entries, summary[0].winning_entries, summary[0].losing_entries),
        (2, 0, 1)
    );
    assert_eq!(summary[0].impact, ArchiveImpact::Moderate);
    assert_eq!(summary[0].conflicting_archives, vec!["beta.archive"]);
    assert_eq!(summary[1].impact, ArchiveImpact::Info);

    f.resolver.add_preferences(&f.game, a, &[b]).await.unwrap();
    let summary = f.query().archive_summary(&f.game).await.unwrap();
    let beta = summary.iter().find(|s| s.archive_filename == "beta.archive").unwrap();
    assert_eq!(beta.losing_entries, 1);
    assert_eq!(beta.impact, ArchiveImpact::Moderate);
    let alpha = summary.iter().find(|s| s.archive_filename == "alpha.archive").unwrap();
    assert_eq!(alpha.impact, ArchiveImpact::Info);
}
