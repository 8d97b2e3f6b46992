use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{info, warn};
use tuner_api::{create_app, AppState};
use tuner_application::{InferenceService, ModelQueryService};
use tuner_config::AppConfig;
use tuner_infrastructure::{DatabaseManager, FsModelStore, SqliteArtifactStore, SqliteModelCatalog};
use tuner_worker::{
    GridSearchTrainer, JobStatusRegistry, OrchestratorConfig, TuningDependencies,
    TuningOrchestrator,
};

/// 主应用程序
pub struct Application {
    config: AppConfig,
    db: DatabaseManager,
    orchestrator: Arc<TuningOrchestrator>,
    state: AppState,
}

impl Application {
    /// 创建数据库连接、存储与worker池
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        let db = DatabaseManager::new(&config.database.url, config.database.max_connections)
            .await
            .with_context(|| format!("连接数据库失败: {}", config.database.url))?;

        let artifacts = Arc::new(SqliteArtifactStore::new(db.pool().clone()));
        let catalog = Arc::new(SqliteModelCatalog::new(db.pool().clone()));
        let files = Arc::new(FsModelStore::new(&config.storage.model_dir));
        info!("模型目录: {}", files.root().display());

        let orchestrator = Arc::new(TuningOrchestrator::new(
            OrchestratorConfig {
                worker_count: config.tuning.worker_count,
                queue_capacity: config.tuning.queue_capacity,
                max_grid_points: config.tuning.max_grid_points,
            },
            JobStatusRegistry::new(),
            TuningDependencies {
                data_source: files.clone(),
                trainer: Arc::new(GridSearchTrainer::new(
                    config.tuning.cv_folds,
                    config.tuning.seed,
                )),
                artifact_store: artifacts.clone(),
                catalog: catalog.clone(),
            },
        ));

        let metrics = if config.observability.metrics_enabled {
            Some(install_metrics_recorder()?)
        } else {
            None
        };

        let state = AppState {
            orchestrator: Arc::clone(&orchestrator),
            inference: Arc::new(InferenceService::new(
                catalog.clone(),
                artifacts,
                files.clone(),
                files,
            )),
            models: Arc::new(ModelQueryService::new(catalog)),
            metrics,
        };

        Ok(Self {
            config,
            db,
            orchestrator,
            state,
        })
    }

    /// 运行HTTP服务直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let bind_address = &self.config.server.bind_address;
        let listener = TcpListener::bind(bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {bind_address}"))?;
        info!("API服务器监听: {}", bind_address);

        let app = create_app(
            self.state.clone(),
            Duration::from_secs(self.config.server.request_timeout_seconds),
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API服务器收到关闭信号");
            })
            .await
            .context("API服务器运行失败")?;

        // 队列中尚未执行的任务会被执行完
        info!("等待调优任务完成...");
        self.orchestrator.shutdown().await;

        if let Err(e) = self.db.health_check().await {
            warn!("关闭前数据库检查失败: {}", e);
        }
        self.db.close().await;

        info!("应用程序已停止");
        Ok(())
    }
}

/// 安装全局Prometheus记录器，并定期清理直方图
fn install_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("安装Prometheus指标记录器失败")?;

    let upkeep = handle.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            upkeep.run_upkeep();
        }
    });

    Ok(handle)
}
