use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error};
use tuner_domain::{
    entities::{JobResult, JobState, TuningJob},
    value_objects::JobId,
};
use tuner_errors::{TunerError, TunerResult};

/// 各状态下的任务数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub pending: usize,
    pub success: usize,
    pub failure: usize,
}

/// 进程内的调优任务状态表
///
/// 写接口只由编排器调用；其余组件只读。任务不会被移除。
#[derive(Debug, Clone, Default)]
pub struct JobStatusRegistry {
    jobs: Arc<RwLock<HashMap<JobId, TuningJob>>>,
}

impl JobStatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn register(&self, job: TuningJob) -> TunerResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.job_id) {
            return Err(TunerError::internal(format!(
                "调优任务 {} 已存在",
                job.job_id
            )));
        }
        debug!("注册调优任务 {} ({})", job.job_id, job.base_model_name);
        jobs.insert(job.job_id, job);
        Ok(())
    }

    pub(crate) async fn mark_started(&self, job_id: &JobId) -> TunerResult<()> {
        self.update(job_id, |job| job.mark_started()).await
    }

    pub(crate) async fn complete(&self, job_id: &JobId, result: JobResult) -> TunerResult<()> {
        self.update(job_id, |job| job.succeed(result)).await
    }

    pub(crate) async fn fail(&self, job_id: &JobId, message: String) -> TunerResult<()> {
        self.update(job_id, |job| job.fail(message)).await
    }

    async fn update<F>(&self, job_id: &JobId, apply: F) -> TunerResult<()>
    where
        F: FnOnce(&mut TuningJob) -> TunerResult<()>,
    {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| TunerError::job_not_found(job_id.to_string()))?;
        apply(job).inspect_err(|e| error!("更新调优任务 {} 状态失败: {}", job_id, e))
    }

    /// 纯读操作，未知任务返回 `JobNotFound`
    pub async fn get_status(&self, job_id: &JobId) -> TunerResult<TuningJob> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| TunerError::job_not_found(job_id.to_string()))
    }

    pub async fn counts(&self) -> JobCounts {
        let jobs = self.jobs.read().await;
        let mut counts = JobCounts::default();
        for job in jobs.values() {
            match job.state {
                JobState::Pending => counts.pending += 1,
                JobState::Success => counts.success += 1,
                JobState::Failure => counts.failure += 1,
            }
        }
        counts
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuner_domain::value_objects::{Hyperparameters, RecordId};

    fn result() -> JobResult {
        JobResult {
            record_id: RecordId::new(),
            best_params: Hyperparameters::new(),
            quality_score: 0.8,
        }
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let registry = JobStatusRegistry::new();
        let err = registry.get_status(&JobId::new()).await.unwrap_err();
        assert!(matches!(err, TunerError::JobNotFound { .. }));
    }

    #[tokio::test]
    async fn test_register_then_complete() {
        let registry = JobStatusRegistry::new();
        let job = TuningJob::pending(JobId::new(), "alpha");
        let id = job.job_id;
        registry.register(job).await.unwrap();
        assert_eq!(registry.get_status(&id).await.unwrap().state, JobState::Pending);

        registry.mark_started(&id).await.unwrap();
        assert_eq!(registry.get_status(&id).await.unwrap().state, JobState::Pending);

        registry.complete(&id, result()).await.unwrap();
        let first = registry.get_status(&id).await.unwrap();
        assert_eq!(first.state, JobState::Success);

        // 终态之后的变更被拒绝，读取结果保持一致
        assert!(registry.fail(&id, "late".to_string()).await.is_err());
        assert_eq!(registry.get_status(&id).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_rejected() {
        let registry = JobStatusRegistry::new();
        let job = TuningJob::pending(JobId::new(), "alpha");
        registry.register(job.clone()).await.unwrap();
        assert!(registry.register(job).await.is_err());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_counts_by_state() {
        let registry = JobStatusRegistry::new();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let job = TuningJob::pending(JobId::new(), "alpha");
            ids.push(job.job_id);
            registry.register(job).await.unwrap();
        }
        registry.complete(&ids[0], result()).await.unwrap();
        registry.fail(&ids[1], "boom".to_string()).await.unwrap();

        assert_eq!(
            registry.counts().await,
            JobCounts {
                pending: 1,
                success: 1,
                failure: 1
            }
        );
    }
}
