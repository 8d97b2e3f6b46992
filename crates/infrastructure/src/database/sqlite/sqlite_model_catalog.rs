use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};
use tuner_domain::{
    entities::{ModelRecord, NewModelRecord},
    repositories::ModelCatalog,
    value_objects::{ArtifactHandle, Hyperparameters, RecordId},
};
use tuner_errors::{TunerError, TunerResult};

const SELECT_COLUMNS: &str = "record_id, base_model_name, artifact_handle, hyperparameters, quality_score, created_at_us";

/// 基于SQLite的模型目录
///
/// 时间戳以微秒整数保存，排序依据为 `created_at_us DESC, seq DESC`。
pub struct SqliteModelCatalog {
    pool: SqlitePool,
}

impl SqliteModelCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> TunerResult<ModelRecord> {
        let record_id: String = row.try_get("record_id")?;
        let record_id = RecordId::parse(&record_id).ok_or_else(|| {
            TunerError::Serialization(format!("目录中存在非法记录标识: {record_id}"))
        })?;

        let hyperparameters: String = row.try_get("hyperparameters")?;
        let hyperparameters: Hyperparameters = serde_json::from_str(&hyperparameters)
            .map_err(|e| TunerError::Serialization(format!("反序列化超参数失败: {e}")))?;

        let created_at_us: i64 = row.try_get("created_at_us")?;
        let created_at = DateTime::<Utc>::from_timestamp_micros(created_at_us).ok_or_else(|| {
            TunerError::Serialization(format!("非法的创建时间: {created_at_us}"))
        })?;

        Ok(ModelRecord {
            record_id,
            base_model_name: row.try_get("base_model_name")?,
            artifact_handle: ArtifactHandle::new(row.try_get::<String, _>("artifact_handle")?),
            hyperparameters,
            quality_score: row.try_get("quality_score")?,
            created_at,
        })
    }
}

#[async_trait]
impl ModelCatalog for SqliteModelCatalog {
    #[instrument(skip(self, record), fields(base_model_name = %record.base_model_name))]
    async fn insert(&self, record: NewModelRecord) -> TunerResult<RecordId> {
        let record_id = RecordId::new();
        let hyperparameters = serde_json::to_string(&record.hyperparameters)
            .map_err(|e| TunerError::Serialization(format!("序列化超参数失败: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO model_records (record_id, base_model_name, artifact_handle, hyperparameters, quality_score, created_at_us)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record_id.to_string())
        .bind(&record.base_model_name)
        .bind(record.artifact_handle.as_str())
        .bind(hyperparameters)
        .bind(record.quality_score)
        .bind(record.created_at.timestamp_micros())
        .execute(&self.pool)
        .await
        .map_err(TunerError::Database)?;

        debug!("写入模型记录: {} ({})", record_id, record.base_model_name);
        Ok(record_id)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, record_id: &RecordId) -> TunerResult<Option<ModelRecord>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM model_records WHERE record_id = $1");
        let row = sqlx::query(&sql)
            .bind(record_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(TunerError::Database)?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> TunerResult<Vec<ModelRecord>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM model_records ORDER BY created_at_us DESC, seq DESC"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(TunerError::Database)?;

        rows.iter().map(Self::row_to_record).collect()
    }

    #[instrument(skip(self))]
    async fn list_by_base_name(&self, base_model_name: &str) -> TunerResult<Vec<ModelRecord>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM model_records WHERE base_model_name = $1 ORDER BY created_at_us DESC, seq DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(base_model_name)
            .fetch_all(&self.pool)
            .await
            .map_err(TunerError::Database)?;

        rows.iter().map(Self::row_to_record).collect()
    }

    #[instrument(skip(self))]
    async fn find_latest_by_base_name(
        &self,
        base_model_name: &str,
    ) -> TunerResult<Option<ModelRecord>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM model_records WHERE base_model_name = $1 ORDER BY created_at_us DESC, seq DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(base_model_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(TunerError::Database)?;

        row.as_ref().map(Self::row_to_record).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;
    use chrono::Duration;
    use serde_json::json;

    async fn catalog() -> (DatabaseManager, SqliteModelCatalog) {
        let db = DatabaseManager::in_memory().await.unwrap();
        let catalog = SqliteModelCatalog::new(db.pool().clone());
        (db, catalog)
    }

    fn new_record(name: &str, created_at: DateTime<Utc>, score: f64) -> NewModelRecord {
        let mut hyperparameters = Hyperparameters::new();
        hyperparameters.insert("n_estimators".to_string(), json!(100));
        NewModelRecord {
            base_model_name: name.to_string(),
            artifact_handle: ArtifactHandle::new(format!("artifact-{score}")),
            hyperparameters,
            quality_score: score,
            created_at,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_by_id() {
        let (_db, catalog) = catalog().await;
        let now = Utc::now();
        let id = catalog.insert(new_record("alpha", now, 0.91)).await.unwrap();

        let found = catalog.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.record_id, id);
        assert_eq!(found.base_model_name, "alpha");
        assert_eq!(found.quality_score, 0.91);
        assert_eq!(found.hyperparameters["n_estimators"], json!(100));
        assert_eq!(found.created_at.timestamp_micros(), now.timestamp_micros());

        assert!(catalog.find_by_id(&RecordId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let (_db, catalog) = catalog().await;
        let now = Utc::now();
        catalog
            .insert(new_record("alpha", now - Duration::seconds(10), 0.1))
            .await
            .unwrap();
        catalog.insert(new_record("beta", now, 0.2)).await.unwrap();
        catalog
            .insert(new_record("alpha", now - Duration::seconds(5), 0.3))
            .await
            .unwrap();

        let all = catalog.list_all().await.unwrap();
        let scores: Vec<f64> = all.iter().map(|r| r.quality_score).collect();
        assert_eq!(scores, vec![0.2, 0.3, 0.1]);

        let alpha = catalog.list_by_base_name("alpha").await.unwrap();
        assert_eq!(alpha.len(), 2);
        assert_eq!(alpha[0].quality_score, 0.3);
    }

    #[tokio::test]
    async fn test_latest_breaks_timestamp_ties_by_insertion_order() {
        let (_db, catalog) = catalog().await;
        let now = Utc::now();
        catalog.insert(new_record("alpha", now, 0.5)).await.unwrap();
        let second = catalog.insert(new_record("alpha", now, 0.6)).await.unwrap();

        let latest = catalog
            .find_latest_by_base_name("alpha")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.record_id, second);

        assert!(catalog
            .find_latest_by_base_name("missing")
            .await
            .unwrap()
            .is_none());
    }
}
