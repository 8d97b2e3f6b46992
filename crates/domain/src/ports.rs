//! 外部能力的接口边界
//!
//! 预处理文件加载、训练数据加载、基线模型加载与训练算法本身都通过这里的trait注入。

use async_trait::async_trait;
use tuner_errors::TunerResult;

use crate::entities::TrainingSet;
use crate::estimator::Estimator;
use crate::preprocessing::PreprocessingPair;
use crate::value_objects::{HyperparameterSpace, Hyperparameters};

/// 按基础模型名称查找缩放器与标签编码器
#[async_trait]
pub trait PreprocessingResolver: Send + Sync {
    async fn resolve(&self, base_model_name: &str) -> TunerResult<PreprocessingPair>;
}

/// 加载训练数据，不存在时返回 `DataNotFound`
#[async_trait]
pub trait TrainingDataSource: Send + Sync {
    async fn load_training_data(&self, base_model_name: &str) -> TunerResult<TrainingSet>;
}

/// 目录之外的未调优基线模型
#[async_trait]
pub trait BaselineModelSource: Send + Sync {
    async fn load_baseline(&self, base_model_name: &str) -> TunerResult<Estimator>;
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub estimator: Estimator,
    pub best_params: Hyperparameters,
    pub quality_score: f64,
}

/// 超参数搜索 + 拟合，CPU密集，调用方负责放到阻塞线程上执行
pub trait Trainer: Send + Sync {
    /// 提交时同步检查候选值，非法时返回 `Validation`
    fn validate_space(&self, _space: &HyperparameterSpace) -> TunerResult<()> {
        Ok(())
    }

    fn fit(&self, data: &TrainingSet, space: &HyperparameterSpace) -> TunerResult<TrainingOutcome>;
}
