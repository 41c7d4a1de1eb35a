//! SQLite implementation of the storage ports
//!
//! One repository type implements the index, evidence and preference ports
//! over a shared pool. Every delete-then-rebuild path runs inside a single
//! transaction so concurrent readers never see an emptied table.
//!
//! ## Type Mapping
//!
//! | Domain Type       | SQL Type | Strategy                                         |
//! |-------------------|----------|--------------------------------------------------|
//! | GameId            | TEXT     | slug via `.as_str()` / `GameId::new()`           |
//! | ModId             | INTEGER  | `.as_i64()` / `ModId::new()`                     |
//! | EvidenceId        | TEXT     | UUID string via `.to_string()` / `FromStr`       |
//! | ResourceHash      | INTEGER  | u64 bit pattern via `to_storage()` / `from_storage()` |
//! | RelativePath      | TEXT     | `.as_str()` / `RelativePath::new()`              |
//! | ConflictKind      | TEXT     | `.as_str()` / `FromStr`                          |
//! | Severity          | TEXT     | `.as_str()` / `FromStr`                          |
//! | Vec<ModId>        | TEXT     | serde_json array of integers                     |
//! | detail            | TEXT     | serde_json                                       |
//! | DateTime<Utc>     | TEXT     | ISO 8601 via `to_rfc3339()`                      |

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use modwarden_core::domain::{
    ArchiveIndexRecord, ConflictEvidence, ConflictKind, EvidenceId, GameId, IndexStats,
    LoadOrderPreference, ModId, RelativePath, ResourceHash, Severity,
};
use modwarden_core::ports::{
    EvidenceFilter, IArchiveIndexRepository, IEvidenceRepository, IPreferenceRepository,
};

use crate::CacheError;

/// SQLite-based implementation of the storage ports
#[derive(Clone)]
pub struct SqliteCacheRepository {
    pool: SqlitePool,
}

impl SqliteCacheRepository {
    /// Creates a new repository instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Parse a DateTime<Utc> from an ISO 8601 string
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite's datetime('now') format
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

pub(crate) fn parse_game_id(s: &str) -> Result<GameId, CacheError> {
    Ok(GameId::new(s)?)
}

pub(crate) fn parse_relative_path(s: &str) -> Result<RelativePath, CacheError> {
    Ok(RelativePath::new(s)?)
}

fn severity_rank_sql() -> &'static str {
    "CASE severity WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END"
}

// ============================================================================
// Row mapping functions
// ============================================================================

fn index_record_from_row(row: &SqliteRow) -> Result<ArchiveIndexRecord, CacheError> {
    let game_id: String = row.get("game_id");
    let mod_id: Option<i64> = row.get("installed_mod_id");
    let rel: String = row.get("archive_relative_path");
    let hash: i64 = row.get("resource_hash");
    let indexed_at: String = row.get("indexed_at");

    Ok(ArchiveIndexRecord {
        game_id: parse_game_id(&game_id)?,
        installed_mod_id: mod_id.map(ModId::new),
        archive_filename: row.get("archive_filename"),
        archive_relative_path: parse_relative_path(&rel)?,
        resource_hash: ResourceHash::from_storage(hash),
        digest: row.get("digest"),
        indexed_at: parse_datetime(&indexed_at)?,
    })
}

fn evidence_from_row(row: &SqliteRow) -> Result<ConflictEvidence, CacheError> {
    let id: String = row.get("id");
    let game_id: String = row.get("game_id");
    let kind: String = row.get("kind");
    let severity: String = row.get("severity");
    let mod_ids: String = row.get("mod_ids");
    let winner: Option<i64> = row.get("winner_mod_id");
    let detail: String = row.get("detail");
    let created_at: String = row.get("created_at");

    let id: EvidenceId = id.parse()?;
    let kind: ConflictKind = kind.parse()?;
    let severity: Severity = severity.parse()?;
    let mod_ids: Vec<i64> = serde_json::from_str(&mod_ids)
        .map_err(|e| CacheError::SerializationError(format!("Invalid mod_ids JSON: {}", e)))?;
    let detail: serde_json::Value = serde_json::from_str(&detail)
        .map_err(|e| CacheError::SerializationError(format!("Invalid detail JSON: {}", e)))?;

    Ok(ConflictEvidence::from_parts(
        id,
        parse_game_id(&game_id)?,
        kind,
        severity,
        row.get("conflict_key"),
        mod_ids.into_iter().map(ModId::new).collect(),
        winner.map(ModId::new),
        detail,
        parse_datetime(&created_at)?,
    ))
}

fn preference_from_row(row: &SqliteRow) -> Result<LoadOrderPreference, CacheError> {
    let game_id: String = row.get("game_id");
    let created_at: String = row.get("created_at");
    Ok(LoadOrderPreference {
        seq: row.get("id"),
        game_id: parse_game_id(&game_id)?,
        winner_mod_id: ModId::new(row.get("winner_mod_id")),
        loser_mod_id: ModId::new(row.get("loser_mod_id")),
        created_at: parse_datetime(&created_at)?,
    })
}

// ============================================================================
// Shared insert helpers (run on a transaction)
// ============================================================================

async fn insert_index_rows(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    records: &[ArchiveIndexRecord],
) -> Result<u64, CacheError> {
    let mut inserted = 0;
    for record in records {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO archive_entry_index \
             (game_id, installed_mod_id, archive_filename, archive_relative_path, \
              resource_hash, digest, indexed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.game_id.as_str())
        .bind(record.installed_mod_id.map(|m| m.as_i64()))
        .bind(&record.archive_filename)
        .bind(record.archive_relative_path.as_str())
        .bind(record.resource_hash.to_storage())
        .bind(&record.digest)
        .bind(record.indexed_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

// ============================================================================
// IArchiveIndexRepository
// ============================================================================

#[async_trait::async_trait]
impl IArchiveIndexRepository for SqliteCacheRepository {
    async fn indexed_archive_paths(&self, game: &GameId) -> anyhow::Result<HashSet<RelativePath>> {
        let rows = sqlx::query(
            "SELECT DISTINCT archive_relative_path FROM archive_entry_index WHERE game_id = ?",
        )
        .bind(game.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut paths = HashSet::with_capacity(rows.len());
        for row in &rows {
            let rel: String = row.get("archive_relative_path");
            paths.insert(parse_relative_path(&rel)?);
        }
        Ok(paths)
    }

    async fn insert_records(&self, records: &[ArchiveIndexRecord]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;
        let inserted = insert_index_rows(&mut tx, records).await?;
        tx.commit().await?;

        tracing::debug!(inserted, offered = records.len(), "Inserted archive index rows");
        Ok(inserted)
    }

    async fn replace_records(
        &self,
        game: &GameId,
        records: &[ArchiveIndexRecord],
    ) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM archive_entry_index WHERE game_id = ?")
            .bind(game.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let inserted = insert_index_rows(&mut tx, records).await?;
        tx.commit().await?;

        tracing::debug!(game = %game, deleted, inserted, "Replaced archive index");
        Ok(inserted)
    }

    async fn records_for_game(&self, game: &GameId) -> anyhow::Result<Vec<ArchiveIndexRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM archive_entry_index WHERE game_id = ? \
             ORDER BY resource_hash, archive_relative_path",
        )
        .bind(game.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(index_record_from_row(row)?);
        }
        Ok(records)
    }

    async fn delete_for_mod(&self, game: &GameId, mod_id: ModId) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "DELETE FROM archive_entry_index WHERE game_id = ? AND installed_mod_id = ?",
        )
        .bind(game.as_str())
        .bind(mod_id.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn stats(&self, game: &GameId) -> anyhow::Result<IndexStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, \
                    COUNT(DISTINCT archive_relative_path) AS archives, \
                    COUNT(DISTINCT CASE WHEN installed_mod_id IS NULL \
                          THEN archive_relative_path END) AS unattributed \
             FROM archive_entry_index WHERE game_id = ?",
        )
        .bind(game.as_str())
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.get("total");
        let archives: i64 = row.get("archives");
        let unattributed: i64 = row.get("unattributed");
        Ok(IndexStats {
            total_entries: total as u64,
            archives: archives as u64,
            unattributed_archives: unattributed as u64,
        })
    }
}

// ============================================================================
// IEvidenceRepository
// ============================================================================

#[async_trait::async_trait]
impl IEvidenceRepository for SqliteCacheRepository {
    async fn replace_evidence(
        &self,
        game: &GameId,
        evidence: &[ConflictEvidence],
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM conflict_evidence WHERE game_id = ?")
            .bind(game.as_str())
            .execute(&mut *tx)
            .await?;

        for ev in evidence {
            let mod_ids: Vec<i64> = ev.mod_ids().iter().map(|m| m.as_i64()).collect();
            let mod_ids = serde_json::to_string(&mod_ids)
                .map_err(|e| CacheError::SerializationError(e.to_string()))?;
            let detail = serde_json::to_string(ev.detail())
                .map_err(|e| CacheError::SerializationError(e.to_string()))?;

            sqlx::query(
                "INSERT INTO conflict_evidence \
                 (id, game_id, kind, severity, conflict_key, mod_ids, winner_mod_id, detail, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(ev.id().to_string())
            .bind(game.as_str())
            .bind(ev.kind().as_str())
            .bind(ev.severity().as_str())
            .bind(ev.key())
            .bind(mod_ids)
            .bind(ev.winner_mod_id().map(|m| m.as_i64()))
            .bind(detail)
            .bind(ev.created_at().to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(game = %game, count = evidence.len(), "Replaced conflict evidence");
        Ok(())
    }

    async fn query_evidence(
        &self,
        game: &GameId,
        filter: &EvidenceFilter,
    ) -> anyhow::Result<Vec<ConflictEvidence>> {
        let mut sql = String::from("SELECT * FROM conflict_evidence WHERE game_id = ?");
        let mut binds: Vec<String> = vec![game.as_str().to_string()];

        if let Some(kind) = filter.kind {
            sql.push_str(" AND kind = ?");
            binds.push(kind.as_str().to_string());
        }

        if let Some(severity) = filter.severity {
            sql.push_str(" AND severity = ?");
            binds.push(severity.as_str().to_string());
        }

        if let Some(mod_id) = filter.mod_id {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM json_each(conflict_evidence.mod_ids) \
                 WHERE json_each.value = CAST(? AS INTEGER))",
            );
            binds.push(mod_id.to_string());
        }

        sql.push_str(&format!(
            " ORDER BY {}, kind, conflict_key",
            severity_rank_sql()
        ));

        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let mut evidence = Vec::with_capacity(rows.len());
        for row in &rows {
            evidence.push(evidence_from_row(row)?);
        }
        Ok(evidence)
    }

    async fn count_by_kind(&self, game: &GameId) -> anyhow::Result<BTreeMap<ConflictKind, u64>> {
        let rows = sqlx::query(
            "SELECT kind, COUNT(*) AS n FROM conflict_evidence WHERE game_id = ? GROUP BY kind",
        )
        .bind(game.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut counts = BTreeMap::new();
        for row in &rows {
            let kind: String = row.get("kind");
            let n: i64 = row.get("n");
            let kind: ConflictKind = kind.parse()?;
            counts.insert(kind, n as u64);
        }
        Ok(counts)
    }
}

// ============================================================================
// IPreferenceRepository
// ============================================================================

#[async_trait::async_trait]
impl IPreferenceRepository for SqliteCacheRepository {
    async fn add_preference(
        &self,
        game: &GameId,
        winner: ModId,
        loser: ModId,
    ) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "DELETE FROM load_order_preferences \
             WHERE game_id = ? AND winner_mod_id = ? AND loser_mod_id = ?",
        )
        .bind(game.as_str())
        .bind(loser.as_i64())
        .bind(winner.as_i64())
        .execute(&mut *tx)
        .await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO load_order_preferences \
             (game_id, winner_mod_id, loser_mod_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(game.as_str())
        .bind(winner.as_i64())
        .bind(loser.as_i64())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?
        .rows_affected();
        tx.commit().await?;

        tracing::trace!(game = %game, winner = winner.as_i64(), loser = loser.as_i64(), inserted, "Stored preference");
        Ok(inserted > 0)
    }

    async fn remove_preference(
        &self,
        game: &GameId,
        winner: ModId,
        loser: ModId,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "DELETE FROM load_order_preferences \
             WHERE game_id = ? AND winner_mod_id = ? AND loser_mod_id = ?",
        )
        .bind(game.as_str())
        .bind(winner.as_i64())
        .bind(loser.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_preferences(&self, game: &GameId) -> anyhow::Result<Vec<LoadOrderPreference>> {
        let rows = sqlx::query("SELECT * FROM load_order_preferences WHERE game_id = ? ORDER BY id")
            .bind(game.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut prefs = Vec::with_capacity(rows.len());
        for row in &rows {
            prefs.push(preference_from_row(row)?);
        }
        Ok(prefs)
    }
}
