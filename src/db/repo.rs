//! Repository layer for the instrument metadata cache.

use crate::domain::{InstrumentDirectory, InstrumentId, InstrumentMetadata};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::collections::HashSet;

/// Repository for cached instrument metadata.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Store metadata idempotently. The first stored entry for a code wins.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_metadata(&self, metadata: &InstrumentMetadata) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO instrument_metadata (code, name, isin, sector, fetched_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(code) DO NOTHING
            "#,
        )
        .bind(metadata.instrument.as_str())
        .bind(&metadata.name)
        .bind(&metadata.isin)
        .bind(metadata.sector.as_deref())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_metadata(
        &self,
        instrument: &InstrumentId,
    ) -> Result<Option<InstrumentMetadata>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT code, name, isin, sector FROM instrument_metadata WHERE code = ?",
        )
        .bind(instrument.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row_to_metadata(&row)))
    }

    /// Codes already present in the cache.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn cached_codes(&self) -> Result<HashSet<String>, sqlx::Error> {
        let rows = sqlx::query("SELECT code FROM instrument_metadata")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get::<String, _>("code")).collect())
    }

    /// Every cached entry, as a directory ready for report enrichment.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn load_directory(&self) -> Result<InstrumentDirectory, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT code, name, isin, sector FROM instrument_metadata ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_metadata).collect())
    }
}

fn row_to_metadata(row: &sqlx::sqlite::SqliteRow) -> InstrumentMetadata {
    let metadata = InstrumentMetadata::new(
        InstrumentId::new(row.get::<String, _>("code")),
        row.get("name"),
        row.get("isin"),
    );
    match row.get::<Option<String>, _>("sector") {
        Some(sector) => metadata.with_sector(sector),
        None => metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    async fn setup_repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn infy() -> InstrumentMetadata {
        InstrumentMetadata::new(
            InstrumentId::new("500209"),
            "INFY".to_string(),
            "INE009A01021".to_string(),
        )
        .with_sector("Computers - Software".to_string())
    }

    #[tokio::test]
    async fn test_insert_and_get_metadata() {
        let (repo, _temp) = setup_repo().await;
        assert!(repo.insert_metadata(&infy()).await.unwrap());

        let stored = repo
            .get_metadata(&InstrumentId::new("500209"))
            .await
            .unwrap();
        assert_eq!(stored, Some(infy()));

        let missing = repo.get_metadata(&InstrumentId::new("1")).await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let (repo, _temp) = setup_repo().await;
        assert!(repo.insert_metadata(&infy()).await.unwrap());

        let mut renamed = infy();
        renamed.name = "OTHER".to_string();
        assert!(!repo.insert_metadata(&renamed).await.unwrap());

        let stored = repo
            .get_metadata(&InstrumentId::new("500209"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "INFY");
    }

    #[tokio::test]
    async fn test_cached_codes() {
        let (repo, _temp) = setup_repo().await;
        assert!(repo.cached_codes().await.unwrap().is_empty());

        repo.insert_metadata(&infy()).await.unwrap();
        let codes = repo.cached_codes().await.unwrap();
        assert_eq!(codes.len(), 1);
        assert!(codes.contains("500209"));
    }

    #[tokio::test]
    async fn test_load_directory() {
        let (repo, _temp) = setup_repo().await;
        repo.insert_metadata(&infy()).await.unwrap();

        let directory = repo.load_directory().await.unwrap();
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.isin_for(&InstrumentId::new("500209")), "INE009A01021");
    }
}
