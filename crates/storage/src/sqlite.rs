use crate::backend::{DocumentStore, Precondition, PutOutcome, StoreError, StoredDocument};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::{fs, path::Path};

#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new(db_url: &str) -> Result<Self, StoreError> {
        let in_memory = db_url.contains(":memory:");
        if db_url.starts_with("sqlite://") && !in_memory {
            let path_str = db_url.trim_start_matches("sqlite://");
            let path = Path::new(path_str);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    fs::create_dir_all(parent)?;
                }
            }
        }
        if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            Sqlite::create_database(db_url).await?;
        }
        // 内存库每个连接都是独立的数据库，只能保留一个连接
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await?;
        if !in_memory {
            sqlx::query("PRAGMA journal_mode = WAL;")
                .execute(&pool)
                .await?;
        }
        sqlx::query("PRAGMA synchronous = NORMAL;")
            .execute(&pool)
            .await?;
        sqlx::migrate!("../../migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        let row = sqlx::query("SELECT body, version FROM documents WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| StoredDocument {
            body: r.get::<String, _>(0),
            version: r.get::<i64, _>(1) as u64,
        }))
    }

    async fn put(
        &self,
        key: &str,
        body: String,
        precondition: Precondition,
    ) -> Result<PutOutcome, StoreError> {
        let now = Utc::now().naive_utc();
        match precondition {
            Precondition::Absent => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO documents (key, body, version, updated_at)
                    VALUES (?, ?, 1, ?)
                    ON CONFLICT(key) DO NOTHING
                    "#,
                )
                .bind(key)
                .bind(&body)
                .bind(now)
                .execute(&self.pool)
                .await?;

                if result.rows_affected() == 0 {
                    Ok(PutOutcome::Conflict)
                } else {
                    Ok(PutOutcome::Written { version: 1 })
                }
            }
            Precondition::Version(expected) => {
                let result = sqlx::query(
                    r#"
                    UPDATE documents
                    SET body = ?, version = version + 1, updated_at = ?
                    WHERE key = ? AND version = ?
                    "#,
                )
                .bind(&body)
                .bind(now)
                .bind(key)
                .bind(expected as i64)
                .execute(&self.pool)
                .await?;

                if result.rows_affected() == 0 {
                    Ok(PutOutcome::Conflict)
                } else {
                    Ok(PutOutcome::Written {
                        version: expected + 1,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn conditional_writes_detect_stale_versions() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("docs.db").display());
        let store = SqliteStore::new(&url).await.unwrap();

        assert_eq!(store.get("comments/S/home.json").await.unwrap(), None);

        let first = store
            .put("comments/S/home.json", "[]".into(), Precondition::Absent)
            .await
            .unwrap();
        assert_eq!(first, PutOutcome::Written { version: 1 });

        let again = store
            .put("comments/S/home.json", "[1]".into(), Precondition::Absent)
            .await
            .unwrap();
        assert_eq!(again, PutOutcome::Conflict);

        let second = store
            .put("comments/S/home.json", "[2]".into(), Precondition::Version(1))
            .await
            .unwrap();
        assert_eq!(second, PutOutcome::Written { version: 2 });

        let stale = store
            .put("comments/S/home.json", "[3]".into(), Precondition::Version(1))
            .await
            .unwrap();
        assert_eq!(stale, PutOutcome::Conflict);

        let doc = store.get("comments/S/home.json").await.unwrap().unwrap();
        assert_eq!(doc.body, "[2]");
        assert_eq!(doc.version, 2);
    }
}
