//! Integration tests for load-order preferences and the modlist artifact

use std::fs;
use std::sync::Arc;

use modwarden_cache::{DatabasePool, SqliteCacheRepository, SqliteModRegistry};
use modwarden_conflict::{ConflictError, LoadOrderResolver};
use modwarden_core::config::GameConfig;
use modwarden_core::domain::{GameId, ModId};

struct Fixture {
    _db: DatabasePool,
    _dir: tempfile::TempDir,
    registry: Arc<SqliteModRegistry>,
    resolver: LoadOrderResolver,
    game: GameConfig,
}

impl Fixture {
    /// Registers a mod owning one archive per name and drops empty files for them
    async fn install(&self, name: &str, archives: &[&str], disabled: bool) -> ModId {
        let dir = self.game.install_path.join(&self.game.modlist_dir);
        fs::create_dir_all(&dir).unwrap();
        let mut rels = Vec::new();
        for archive in archives {
            fs::write(dir.join(archive), b"").unwrap();
            rels.push(format!("{}/{archive}", self.game.modlist_dir));
        }
        let rels: Vec<&str> = rels.iter().map(String::as_str).collect();
        self.registry
            .register_mod(&self.game.id, name, &rels, disabled)
            .await
            .unwrap()
    }

    fn modlist(&self) -> Option<Vec<String>> {
        fs::read_to_string(self.game.modlist_path())
            .ok()
            .map(|body| body.lines().map(str::to_string).collect())
    }
}

async fn setup() -> Fixture {
    let db = DatabasePool::in_memory().await.expect("database");
    let repo = Arc::new(SqliteCacheRepository::new(db.pool().clone()));
    let registry = Arc::new(SqliteModRegistry::new(db.pool().clone()));
    let resolver = LoadOrderResolver::new(registry.clone(), repo);
    let dir = tempfile::tempdir().expect("tempdir");
    let game = GameConfig::new(GameId::new("cp2077").unwrap(), dir.path().to_path_buf());
    Fixture {
        _db: db,
        _dir: dir,
        registry,
        resolver,
        game,
    }
}

#[tokio::test]
async fn test_default_order_is_by_filename() {
    let f = setup().await;
    let b = f.install("B", &["b_first.archive", "z_last.archive"], false).await;
    let a = f.install("A", &["a.archive"], false).await;
    let loose = f.game.install_path.join(&f.game.modlist_dir).join("m_loose.archive");
    fs::write(loose, b"").unwrap();

    let lines = f.resolver.generate_modlist(&f.game).await.unwrap();
    assert_eq!(
        lines,
        vec!["a.archive", "b_first.archive", "z_last.archive", "m_loose.archive"]
    );

    let order = f.resolver.effective_order(&f.game).await.unwrap();
    assert_eq!(order.sequence(), &[a, b]);
    assert!(f.modlist().is_none(), "generating must not touch disk");
}

#[tokio::test]
async fn test_add_preference_moves_winner_after_loser() {
    let f = setup().await;
    let a = f.install("A", &["a.archive"], false).await;
    let b = f.install("B", &["b.archive"], false).await;

    assert_eq!(f.resolver.add_preferences(&f.game, a, &[b]).await.unwrap(), 1);
    assert_eq!(
        f.modlist(),
        Some(vec!["b.archive".to_string(), "a.archive".to_string()])
    );

    let order = f.resolver.effective_order(&f.game).await.unwrap();
    assert_eq!(order.pick_winner(a, b), a);
    assert_eq!(order.pick_winner(b, a), a);

    // Same edge again changes nothing
    assert_eq!(f.resolver.add_preferences(&f.game, a, &[b]).await.unwrap(), 0);
    assert_eq!(f.resolver.list_preferences(&f.game.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_reverse_preference_replaces_edge() {
    let f = setup().await;
    let a = f.install("A", &["a.archive"], false).await;
    let b = f.install("B", &["b.archive"], false).await;

    f.resolver.add_preferences(&f.game, a, &[b]).await.unwrap();
    f.resolver.add_preferences(&f.game, b, &[a]).await.unwrap();

    let prefs = f.resolver.list_preferences(&f.game.id).await.unwrap();
    assert_eq!(prefs.len(), 1);
    assert_eq!((prefs[0].winner_mod_id, prefs[0].loser_mod_id), (b, a));
    assert_eq!(
        f.modlist(),
        Some(vec!["a.archive".to_string(), "b.archive".to_string()])
    );
}

#[tokio::test]
async fn test_add_preference_validation() {
    let f = setup().await;
    let a = f.install("A", &["a.archive"], false).await;
    let b = f.install("B", &["b.archive"], false).await;
    let off = f.install("Off", &["off.archive"], true).await;

    let err = f.resolver.add_preferences(&f.game, a, &[a]).await.unwrap_err();
    assert!(matches!(err, ConflictError::Validation(_)));

    let err = f.resolver.add_preferences(&f.game, a, &[]).await.unwrap_err();
    assert!(matches!(err, ConflictError::Validation(_)));

    let err = f
        .resolver
        .add_preferences(&f.game, a, &[ModId::new(999)])
        .await
        .unwrap_err();
    assert!(matches!(err, ConflictError::NotFound(_)));

    let err = f.resolver.add_preferences(&f.game, a, &[off]).await.unwrap_err();
    assert!(matches!(err, ConflictError::Validation(_)));

    // A bad loser anywhere in the list means nothing is stored
    let err = f
        .resolver
        .add_preferences(&f.game, a, &[b, off])
        .await
        .unwrap_err();
    assert!(matches!(err, ConflictError::Validation(_)));
    assert!(f.resolver.list_preferences(&f.game.id).await.unwrap().is_empty());
    assert!(f.modlist().is_none());
}

#[tokio::test]
async fn test_remove_preference_regenerates_modlist() {
    let f = setup().await;
    let a = f.install("A", &["a.archive"], false).await;
    let b = f.install("B", &["b.archive"], false).await;
    f.resolver.add_preferences(&f.game, a, &[b]).await.unwrap();
    fs::remove_file(f.game.modlist_path()).unwrap();

    assert!(f.resolver.remove_preference(&f.game, a, b).await.unwrap());
    assert_eq!(
        f.modlist(),
        Some(vec!["a.archive".to_string(), "b.archive".to_string()])
    );
    assert!(!f.resolver.remove_preference(&f.game, a, b).await.unwrap());
}

#[tokio::test]
async fn test_existing_modlist_is_authoritative() {
    let f = setup().await;
    let a = f.install("A", &["a.archive"], false).await;
    let b = f.install("B", &["b.archive"], false).await;
    let c = f.install("C", &["c.archive"], false).await;
    fs::write(
        f.game.modlist_path(),
        "# hand edited\nc.archive\n\na.archive\ngone.archive\n",
    )
    .unwrap();

    let lines = f.resolver.generate_modlist(&f.game).await.unwrap();
    assert_eq!(lines, vec!["c.archive", "a.archive", "b.archive"]);

    let order = f.resolver.effective_order(&f.game).await.unwrap();
    assert_eq!(order.sequence(), &[c, a, b]);
}

#[tokio::test]
async fn test_disabled_mod_archives_are_left_out() {
    let f = setup().await;
    f.install("A", &["a.archive"], false).await;
    f.install("Off", &["off.archive"], true).await;

    let written = f.resolver.write_modlist(&f.game).await.unwrap();
    assert_eq!(written.entries, 1);
    assert_eq!(written.path, f.game.modlist_path());
    assert_eq!(f.modlist(), Some(vec!["a.archive".to_string()]));
}

#[tokio::test]
async fn test_empty_modlist_removes_artifact() {
    let f = setup().await;
    let dir = f.game.install_path.join(&f.game.modlist_dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(f.game.modlist_path(), "stale.archive\n").unwrap();

    let written = f.resolver.write_modlist(&f.game).await.unwrap();
    assert_eq!(written.entries, 0);
    assert!(!f.game.modlist_path().exists());
    assert!(!dir.join("modlist.txt.tmp").exists());
}

#[tokio::test]
async fn test_mods_without_archives_follow_in_registry_order() {
    let f = setup().await;
    let scripts = f
        .registry
        .register_mod(&f.game.id, "Scripts", &["r6/scripts/s/main.reds"], false)
        .await
        .unwrap();
    let a = f.install("A", &["a.archive"], false).await;

    let order = f.resolver.effective_order(&f.game).await.unwrap();
    assert_eq!(order.sequence(), &[a, scripts]);
}
