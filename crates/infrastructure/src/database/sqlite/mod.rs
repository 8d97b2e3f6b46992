pub mod migrations;
pub mod sqlite_artifact_store;
pub mod sqlite_model_catalog;

pub use sqlite_artifact_store::SqliteArtifactStore;
pub use sqlite_model_catalog::SqliteModelCatalog;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;
use tuner_errors::TunerResult;

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// 创建SQLite连接池并运行迁移
    pub async fn new(url: &str, max_connections: u32) -> TunerResult<Self> {
        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // 内存数据库每个连接各自独立，只能使用单连接且不能被回收
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = pool_options.connect_with(options).await?;
        migrations::run_migrations(&pool).await?;

        info!("SQLite数据库就绪: {}", url);
        Ok(Self { pool })
    }

    /// 测试与嵌入式场景使用的内存数据库
    pub async fn in_memory() -> TunerResult<Self> {
        Self::new("sqlite::memory:", 1).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn health_check(&self) -> TunerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
