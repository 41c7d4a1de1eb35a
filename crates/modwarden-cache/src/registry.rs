//! SQLite-backed installed-mod registry
//!
//! The registry tables belong to the hosting application; the conflict core
//! only reads them through [`IModRegistry`]. The small write surface here
//! (`register_mod`, `set_disabled`) is what a host uses to mirror its own
//! install records into the shared database.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use modwarden_core::domain::{GameId, InstalledMod, ModId, RelativePath};
use modwarden_core::ports::IModRegistry;

use crate::repository::parse_datetime;
use crate::CacheError;

/// Reads installed mods and their files from SQLite
#[derive(Clone)]
pub struct SqliteModRegistry {
    pool: SqlitePool,
}

impl SqliteModRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Records an installed mod and the files it placed under the install root
    pub async fn register_mod(
        &self,
        game: &GameId,
        name: &str,
        files: &[&str],
        disabled: bool,
    ) -> Result<ModId, CacheError> {
        let mut tx = self.pool.begin().await?;
        let id = sqlx::query(
            "INSERT INTO installed_mods (game_id, name, disabled, installed_at) VALUES (?, ?, ?, ?)",
        )
        .bind(game.as_str())
        .bind(name)
        .bind(disabled)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for file in files {
            let path = RelativePath::new(file)?;
            sqlx::query(
                "INSERT INTO installed_mod_files (installed_mod_id, relative_path) VALUES (?, ?)",
            )
            .bind(id)
            .bind(path.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::debug!(game = %game, mod_id = id, name, files = files.len(), "Registered mod");
        Ok(ModId::new(id))
    }

    pub async fn set_disabled(&self, id: ModId, disabled: bool) -> Result<bool, CacheError> {
        let result = sqlx::query("UPDATE installed_mods SET disabled = ? WHERE id = ?")
            .bind(disabled)
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Files for the given game's mods, grouped by mod id in insertion order
    async fn files_by_mod(
        &self,
        game: &GameId,
        only: Option<ModId>,
    ) -> Result<HashMap<i64, Vec<RelativePath>>, CacheError> {
        let mut sql = String::from(
            "SELECT f.installed_mod_id, f.relative_path FROM installed_mod_files f \
             JOIN installed_mods m ON m.id = f.installed_mod_id WHERE m.game_id = ?",
        );
        if only.is_some() {
            sql.push_str(" AND m.id = ?");
        }
        sql.push_str(" ORDER BY f.id");

        let mut query = sqlx::query(&sql).bind(game.as_str());
        if let Some(id) = only {
            query = query.bind(id.as_i64());
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut files: HashMap<i64, Vec<RelativePath>> = HashMap::new();
        for row in &rows {
            let mod_id: i64 = row.get("installed_mod_id");
            let raw: String = row.get("relative_path");
            match RelativePath::new(&raw) {
                Ok(path) => files.entry(mod_id).or_default().push(path),
                Err(e) => {
                    tracing::warn!(mod_id, path = %raw, error = %e, "Ignoring invalid registry path");
                }
            }
        }
        Ok(files)
    }
}

fn installed_mod_from_row(
    row: &SqliteRow,
    files: &mut HashMap<i64, Vec<RelativePath>>,
) -> Result<InstalledMod, CacheError> {
    let id: i64 = row.get("id");
    let name: String = row.get("name");
    let disabled: bool = row.get("disabled");
    let installed_at: String = row.get("installed_at");

    Ok(InstalledMod::new(ModId::new(id), name)
        .with_disabled(disabled)
        .with_installed_at(parse_datetime(&installed_at)?)
        .with_files(files.remove(&id).unwrap_or_default()))
}

#[async_trait::async_trait]
impl IModRegistry for SqliteModRegistry {
    async fn list_installed_mods(&self, game: &GameId) -> anyhow::Result<Vec<InstalledMod>> {
        let rows = sqlx::query(
            "SELECT * FROM installed_mods WHERE game_id = ? ORDER BY installed_at, id",
        )
        .bind(game.as_str())
        .fetch_all(&self.pool)
        .await?;
        let mut files = self.files_by_mod(game, None).await?;

        let mut mods = Vec::with_capacity(rows.len());
        for row in &rows {
            mods.push(installed_mod_from_row(row, &mut files)?);
        }
        Ok(mods)
    }

    async fn get_installed_mod(
        &self,
        game: &GameId,
        id: ModId,
    ) -> anyhow::Result<Option<InstalledMod>> {
        let row = sqlx::query("SELECT * FROM installed_mods WHERE game_id = ? AND id = ?")
            .bind(game.as_str())
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => {
                let mut files = self.files_by_mod(game, Some(id)).await?;
                Ok(Some(installed_mod_from_row(r, &mut files)?))
            }
            None => Ok(None),
        }
    }
}
