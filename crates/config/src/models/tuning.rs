use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    /// 并发执行的调优任务上限，每个任务都很吃CPU和内存
    pub worker_count: usize,
    /// 排队等待的任务上限，超出后提交被拒绝
    pub queue_capacity: usize,
    /// 单个任务的超参数组合上限，超出时提交被拒绝
    pub max_grid_points: usize,
    pub cv_folds: usize,
    pub seed: u64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            queue_capacity: 16,
            max_grid_points: 256,
            cv_folds: 2,
            seed: 42,
        }
    }
}

impl ConfigValidator for TuningConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_count(self.worker_count, "tuning.worker_count", 64)?;
        ValidationUtils::validate_count(self.queue_capacity, "tuning.queue_capacity", 10000)?;
        ValidationUtils::validate_count(self.max_grid_points, "tuning.max_grid_points", 10000)?;
        if self.cv_folds < 2 {
            return Err(crate::ConfigError::Validation(
                "tuning.cv_folds must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}
