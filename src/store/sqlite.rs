use super::PlayerStore;
use crate::app::time::now_millis;
use crate::game::types::{SavedPosition, Vec3};
use anyhow::Context;
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SqlitePlayerStore {
    db: SqlitePool,
}

impl SqlitePlayerStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        ensure_db_dir(database_url)?;
        // Every connection to an in-memory database opens its own empty database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let db = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .with_context(|| format!("failed to open {database_url}"))?;
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("failed to run migrations")?;
        Ok(Self { db })
    }
}

impl PlayerStore for SqlitePlayerStore {
    async fn load_player(&self, player_id: &str) -> anyhow::Result<Option<SavedPosition>> {
        let row = sqlx::query(
            "SELECT pos_x, pos_y, pos_z, rot_x, rot_y, rot_z FROM player_positions WHERE player_id = ?",
        )
        .bind(player_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(SavedPosition {
            position: Vec3::new(
                row.try_get("pos_x")?,
                row.try_get("pos_y")?,
                row.try_get("pos_z")?,
            ),
            rotation: Vec3::new(
                row.try_get("rot_x")?,
                row.try_get("rot_y")?,
                row.try_get("rot_z")?,
            ),
        }))
    }

    async fn save_player(&self, player_id: &str, saved: SavedPosition) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO player_positions (player_id, pos_x, pos_y, pos_z, rot_x, rot_y, rot_z, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(player_id) DO UPDATE SET \
               pos_x = excluded.pos_x, pos_y = excluded.pos_y, pos_z = excluded.pos_z, \
               rot_x = excluded.rot_x, rot_y = excluded.rot_y, rot_z = excluded.rot_z, \
               updated_at = excluded.updated_at",
        )
        .bind(player_id)
        .bind(saved.position.x)
        .bind(saved.position.y)
        .bind(saved.position.z)
        .bind(saved.rotation.x)
        .bind(saved.rotation.y)
        .bind(saved.rotation.z)
        .bind(now_millis())
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

fn ensure_db_dir(database_url: &str) -> anyhow::Result<()> {
    if database_url.starts_with("sqlite::memory:") {
        return Ok(());
    }
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"));
    let Some(path) = path else { return Ok(()) };
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }
    let db_path = PathBuf::from(path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !db_path.exists() {
        let _ = std::fs::File::create(&db_path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_round_trips_and_upserts() {
        let store = SqlitePlayerStore::connect("sqlite::memory:")
            .await
            .expect("in-memory store");
        assert!(store.load_player("p1").await.expect("load").is_none());

        let first = SavedPosition {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::new(0.0, 0.5, 0.0),
        };
        store.save_player("p1", first).await.expect("save");
        assert_eq!(store.load_player("p1").await.expect("load"), Some(first));

        let second = SavedPosition {
            position: Vec3::new(-7.0, 0.0, 9.5),
            rotation: Vec3::ZERO,
        };
        store.save_player("p1", second).await.expect("upsert");
        assert_eq!(store.load_player("p1").await.expect("load"), Some(second));
    }

    #[test]
    fn memory_urls_need_no_directory() {
        assert!(ensure_db_dir("sqlite::memory:").is_ok());
        assert!(ensure_db_dir("postgres://elsewhere").is_ok());
    }
}
