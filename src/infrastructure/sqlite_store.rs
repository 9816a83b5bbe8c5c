//! SQLite-backed record and label store
//!
//! Each save replaces the table content inside one transaction, so a reader
//! never sees half of a snapshot. `position` keeps the in-memory order.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::domain::entity::Entity;
use crate::domain::repositories::{LabelStore, RecordStore};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and run migrations
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create database directory {:?}", parent))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {:?}", db_path))?;

        let store = Self { pool };
        store.migrate().await?;
        info!("Opened record database: {:?}", db_path);
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_entities_sql = r#"
            CREATE TABLE IF NOT EXISTS entities (
                id INTEGER PRIMARY KEY,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                category TEXT,
                favorite BOOLEAN NOT NULL DEFAULT 0,
                bookmarked BOOLEAN NOT NULL DEFAULT 0
            )
        "#;

        let create_labels_sql = r#"
            CREATE TABLE IF NOT EXISTS labels (
                position INTEGER NOT NULL,
                name TEXT NOT NULL UNIQUE
            )
        "#;

        sqlx::query(create_entities_sql)
            .execute(&self.pool)
            .await
            .context("Failed to create entities table")?;
        sqlx::query(create_labels_sql)
            .execute(&self.pool)
            .await
            .context("Failed to create labels table")?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn load_records(&self) -> Result<Vec<Entity>> {
        let rows = sqlx::query(
            "SELECT id, name, category, favorite, bookmarked FROM entities ORDER BY position",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load records")?;

        rows.iter()
            .map(|row| {
                Ok(Entity {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    category: row.try_get("category")?,
                    favorite: row.try_get("favorite")?,
                    bookmarked: row.try_get("bookmarked")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .context("Failed to decode record row")
    }

    async fn save_records(&self, records: &[Entity]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM entities").execute(&mut *tx).await?;
        for (position, entity) in records.iter().enumerate() {
            sqlx::query(
                "INSERT INTO entities (id, position, name, category, favorite, bookmarked)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(entity.id)
            .bind(position as i64)
            .bind(&entity.name)
            .bind(&entity.category)
            .bind(entity.favorite)
            .bind(entity.bookmarked)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to write record {}", entity.id))?;
        }
        tx.commit().await.context("Failed to commit record set")?;
        debug!("Saved {} records", records.len());
        Ok(())
    }
}

#[async_trait]
impl LabelStore for SqliteStore {
    async fn load_labels(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM labels ORDER BY position")
            .fetch_all(&self.pool)
            .await
            .context("Failed to load labels")?;
        rows.iter()
            .map(|row| row.try_get("name"))
            .collect::<Result<Vec<String>, sqlx::Error>>()
            .context("Failed to decode label row")
    }

    async fn save_labels(&self, labels: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM labels").execute(&mut *tx).await?;
        for (position, name) in labels.iter().enumerate() {
            sqlx::query("INSERT INTO labels (position, name) VALUES (?, ?)")
                .bind(position as i64)
                .bind(name)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to write label '{}'", name))?;
        }
        tx.commit().await.context("Failed to commit label set")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entity(id: i64, name: &str) -> Entity {
        Entity {
            id,
            name: name.to_string(),
            category: None,
            favorite: false,
            bookmarked: false,
        }
    }

    #[tokio::test]
    async fn test_database_migration() -> Result<()> {
        let temp_dir = tempdir()?;
        let store = SqliteStore::open(&temp_dir.path().join("nested").join("records.db")).await?;

        store.migrate().await?;
        let result =
            sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='entities'")
                .fetch_optional(&store.pool)
                .await?;
        assert!(result.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn records_round_trip_in_order() -> Result<()> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("records.db");
        let store = SqliteStore::open(&db_path).await?;

        let mut lamp = entity(30, "Lamp");
        lamp.category = Some("Lighting".into());
        lamp.favorite = true;
        let records = vec![lamp, entity(2, "Kettle"), entity(11, "Chair")];
        store.save_records(&records).await?;
        drop(store);

        let reopened = SqliteStore::open(&db_path).await?;
        assert_eq!(reopened.load_records().await?, records);
        Ok(())
    }

    #[tokio::test]
    async fn save_replaces_previous_snapshot() -> Result<()> {
        let temp_dir = tempdir()?;
        let store = SqliteStore::open(&temp_dir.path().join("records.db")).await?;

        store
            .save_records(&[entity(1, "A"), entity(2, "B")])
            .await?;
        store.save_records(&[entity(2, "B2")]).await?;

        assert_eq!(store.load_records().await?, vec![entity(2, "B2")]);
        Ok(())
    }

    #[tokio::test]
    async fn labels_round_trip_in_order() -> Result<()> {
        let temp_dir = tempdir()?;
        let store = SqliteStore::open(&temp_dir.path().join("records.db")).await?;

        let labels = vec!["wishlist".to_string(), "gifts".to_string()];
        store.save_labels(&labels).await?;
        assert_eq!(store.load_labels().await?, labels);

        store.save_labels(&[]).await?;
        assert!(store.load_labels().await?.is_empty());
        Ok(())
    }
}
