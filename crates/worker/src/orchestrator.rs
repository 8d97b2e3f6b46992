use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};
use tracing::{error, info, instrument, warn};
use tuner_domain::{
    entities::{JobResult, NewModelRecord, TuningJob},
    ports::{Trainer, TrainingDataSource},
    repositories::{ArtifactStore, ModelCatalog},
    value_objects::{validate_base_model_name, HyperparameterSpace, JobId, MAX_GRID_POINTS},
};
use tuner_errors::{TunerError, TunerResult};

use crate::pool::TuningWorkerPool;
use crate::registry::JobStatusRegistry;

/// 后台执行调优任务所需的外部能力
#[derive(Clone)]
pub struct TuningDependencies {
    pub data_source: Arc<dyn TrainingDataSource>,
    pub trainer: Arc<dyn Trainer>,
    pub artifact_store: Arc<dyn ArtifactStore>,
    pub catalog: Arc<dyn ModelCatalog>,
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub worker_count: usize,
    pub queue_capacity: usize,
    /// 单个任务允许的网格点上限，不超过 `MAX_GRID_POINTS`
    pub max_grid_points: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            queue_capacity: 16,
            max_grid_points: 256,
        }
    }
}

struct TuningTask {
    job_id: JobId,
    base_model_name: String,
    space: HyperparameterSpace,
}

/// 在worker上执行单个调优任务
struct JobExecutor {
    registry: JobStatusRegistry,
    deps: TuningDependencies,
}

impl JobExecutor {
    /// 任何失败都在这里转成 FAILURE，不会让任务停留在 PENDING
    ///
    /// 任务体在独立的tokio任务中运行，外部依赖panic时worker本身不受影响。
    async fn run(self: Arc<Self>, task: TuningTask) {
        let job_id = task.job_id;
        if let Err(e) = self.registry.mark_started(&job_id).await {
            error!("调优任务 {} 无法开始: {}", job_id, e);
            return;
        }

        let started = Instant::now();
        let executor = Arc::clone(&self);
        let outcome = tokio::spawn(async move { executor.execute(&task).await })
            .await
            .unwrap_or_else(|e| {
                if e.is_panic() {
                    Err(TunerError::internal("调优任务异常终止 (panic)"))
                } else {
                    Err(TunerError::internal(format!("调优任务被取消: {e}")))
                }
            });
        histogram!("tuning_job_duration_seconds").record(started.elapsed().as_secs_f64());

        let transition = match outcome {
            Ok(result) => {
                info!(
                    "调优任务 {} 成功: record_id={}, quality_score={:.4}",
                    job_id, result.record_id, result.quality_score
                );
                counter!("tuning_jobs_succeeded_total").increment(1);
                self.registry.complete(&job_id, result).await
            }
            Err(e) => {
                error!("调优任务 {} 失败: {}", job_id, e);
                counter!("tuning_jobs_failed_total").increment(1);
                self.registry.fail(&job_id, e.to_string()).await
            }
        };
        if let Err(e) = transition {
            error!("调优任务 {} 状态写入失败: {}", job_id, e);
        }
    }

    #[instrument(skip(self, task), fields(job_id = %task.job_id, base_model_name = %task.base_model_name))]
    async fn execute(&self, task: &TuningTask) -> TunerResult<JobResult> {
        let name = &task.base_model_name;
        let data = self.deps.data_source.load_training_data(name).await?;

        let trainer = Arc::clone(&self.deps.trainer);
        let space = task.space.clone();
        let outcome = tokio::task::spawn_blocking(move || trainer.fit(&data, &space))
            .await
            .map_err(|e| {
                if e.is_panic() {
                    TunerError::training("训练过程异常终止 (panic)")
                } else {
                    TunerError::internal(format!("训练任务被取消: {e}"))
                }
            })??;

        // 制品必须先于目录记录写入
        let bytes = outcome.estimator.to_bytes()?;
        let handle = self
            .deps
            .artifact_store
            .put(&format!("tuned_{name}_model.json"), bytes)
            .await?;

        let record = NewModelRecord {
            base_model_name: name.clone(),
            artifact_handle: handle.clone(),
            hyperparameters: outcome.best_params.clone(),
            quality_score: outcome.quality_score,
            created_at: Utc::now(),
        };
        let record_id = match self.deps.catalog.insert(record).await {
            Ok(record_id) => record_id,
            Err(e) => {
                if let Err(cleanup) = self.deps.artifact_store.delete(&handle).await {
                    warn!("清理制品 {} 失败: {}", handle, cleanup);
                }
                return Err(e);
            }
        };

        Ok(JobResult {
            record_id,
            best_params: outcome.best_params,
            quality_score: outcome.quality_score,
        })
    }
}

/// 调优任务编排器
///
/// `submit` 只做校验、登记和入队，训练在worker池上异步执行。
pub struct TuningOrchestrator {
    registry: JobStatusRegistry,
    pool: TuningWorkerPool<TuningTask>,
    trainer: Arc<dyn Trainer>,
    max_grid_points: usize,
}

impl TuningOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: JobStatusRegistry,
        deps: TuningDependencies,
    ) -> Self {
        let trainer = Arc::clone(&deps.trainer);
        let executor = Arc::new(JobExecutor {
            registry: registry.clone(),
            deps,
        });
        let pool = TuningWorkerPool::spawn(
            config.worker_count,
            config.queue_capacity,
            move |task: TuningTask| {
                let executor = Arc::clone(&executor);
                executor.run(task)
            },
        );

        Self {
            registry,
            pool,
            trainer,
            max_grid_points: config.max_grid_points.clamp(1, MAX_GRID_POINTS),
        }
    }

    #[instrument(skip(self, space), fields(grid_size = space.grid_size()))]
    pub async fn submit(
        &self,
        base_model_name: &str,
        space: HyperparameterSpace,
    ) -> TunerResult<JobId> {
        validate_base_model_name(base_model_name)?;
        space.ensure_grid_within(self.max_grid_points)?;
        self.trainer.validate_space(&space)?;

        // 先占队列位置再登记，队列满时不会留下孤立的 PENDING 任务
        let slot = match self.pool.reserve().await {
            Ok(slot) => slot,
            Err(e) => {
                counter!("tuning_jobs_rejected_total").increment(1);
                warn!("拒绝调优请求 {}: {}", base_model_name, e);
                return Err(e);
            }
        };

        let job = TuningJob::pending(JobId::new(), base_model_name);
        let job_id = job.job_id;
        self.registry.register(job).await?;

        slot.send(TuningTask {
            job_id,
            base_model_name: base_model_name.to_string(),
            space,
        });

        counter!("tuning_jobs_submitted_total").increment(1);
        info!("已提交调优任务 {} ({})", job_id, base_model_name);
        Ok(job_id)
    }

    pub fn registry(&self) -> &JobStatusRegistry {
        &self.registry
    }

    pub fn queue_capacity(&self) -> usize {
        self.pool.queue_capacity()
    }

    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    pub fn max_grid_points(&self) -> usize {
        self.max_grid_points
    }

    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}
