use sqlx::SqlitePool;
use tracing::info;
use tuner_errors::TunerResult;

/// 运行SQLite数据库迁移
pub async fn run_migrations(pool: &SqlitePool) -> TunerResult<()> {
    info!("运行SQLite数据库迁移");

    // 制品表：序列化后的模型字节
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS model_artifacts (
            handle TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            length INTEGER NOT NULL,
            content BLOB NOT NULL,
            created_at_us INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // 模型目录：seq 为单调递增的插入顺序，用于同一时间戳下的排序
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS model_records (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id TEXT NOT NULL UNIQUE,
            base_model_name TEXT NOT NULL,
            artifact_handle TEXT NOT NULL,
            hyperparameters TEXT NOT NULL DEFAULT '{}',
            quality_score REAL NOT NULL,
            created_at_us INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_model_records_base_name ON model_records(base_model_name, created_at_us)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_model_records_created_at ON model_records(created_at_us)",
    )
    .execute(pool)
    .await?;

    info!("✅ 数据库迁移完成");
    Ok(())
}
