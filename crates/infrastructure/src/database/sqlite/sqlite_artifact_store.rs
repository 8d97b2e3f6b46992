use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument, warn};
use tuner_domain::{repositories::ArtifactStore, value_objects::ArtifactHandle};
use tuner_errors::{TunerError, TunerResult};
use uuid::Uuid;

/// 基于SQLite BLOB的制品存储
pub struct SqliteArtifactStore {
    pool: SqlitePool,
}

impl SqliteArtifactStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn store_error(action: &str, e: sqlx::Error) -> TunerError {
    TunerError::artifact_store(format!("{action}: {e}"))
}

#[async_trait]
impl ArtifactStore for SqliteArtifactStore {
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn put(&self, filename: &str, bytes: Vec<u8>) -> TunerResult<ArtifactHandle> {
        let handle = ArtifactHandle::new(Uuid::new_v4().to_string());

        sqlx::query(
            r#"
            INSERT INTO model_artifacts (handle, filename, length, content, created_at_us)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(handle.as_str())
        .bind(filename)
        .bind(bytes.len() as i64)
        .bind(bytes)
        .bind(Utc::now().timestamp_micros())
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("写入制品失败", e))?;

        debug!("写入制品 {} ({})", handle, filename);
        Ok(handle)
    }

    #[instrument(skip(self))]
    async fn get(&self, handle: &ArtifactHandle) -> TunerResult<Vec<u8>> {
        let row = sqlx::query("SELECT content FROM model_artifacts WHERE handle = $1")
            .bind(handle.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("读取制品失败", e))?;

        match row {
            Some(row) => Ok(row.try_get::<Vec<u8>, _>("content")?),
            None => Err(TunerError::artifact_store(format!("制品不存在: {handle}"))),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, handle: &ArtifactHandle) -> TunerResult<()> {
        let result = sqlx::query("DELETE FROM model_artifacts WHERE handle = $1")
            .bind(handle.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("删除制品失败", e))?;

        if result.rows_affected() == 0 {
            warn!("要删除的制品不存在: {}", handle);
        }
        Ok(())
    }
}
