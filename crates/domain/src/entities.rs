use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tuner_errors::{TunerError, TunerResult};

use crate::value_objects::{ArtifactHandle, Hyperparameters, JobId, RecordId};

/// 模型目录中的一条记录，对应一次成功完成的调优
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub record_id: RecordId,
    pub base_model_name: String,
    pub artifact_handle: ArtifactHandle,
    pub hyperparameters: Hyperparameters,
    pub quality_score: f64,
    pub created_at: DateTime<Utc>,
}

/// 尚未分配标识的模型记录，插入目录时使用
#[derive(Debug, Clone, PartialEq)]
pub struct NewModelRecord {
    pub base_model_name: String,
    pub artifact_handle: ArtifactHandle,
    pub hyperparameters: Hyperparameters,
    pub quality_score: f64,
    pub created_at: DateTime<Utc>,
}

impl NewModelRecord {
    pub fn into_record(self, record_id: RecordId) -> ModelRecord {
        ModelRecord {
            record_id,
            base_model_name: self.base_model_name,
            artifact_handle: self.artifact_handle,
            hyperparameters: self.hyperparameters,
            quality_score: self.quality_score,
            created_at: self.created_at,
        }
    }
}

/// 调优任务状态
///
/// RUNNING 与 PENDING 合并：任务被worker取走后仍为 PENDING，只记录 `started_at`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobState {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILURE")]
    Failure,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Success | JobState::Failure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::Success => "SUCCESS",
            JobState::Failure => "FAILURE",
        }
    }
}

/// 成功任务的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub record_id: RecordId,
    pub best_params: Hyperparameters,
    pub quality_score: f64,
}

/// 调优任务（仅存活于进程内）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningJob {
    pub job_id: JobId,
    pub base_model_name: String,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TuningJob {
    pub fn pending(job_id: JobId, base_model_name: impl Into<String>) -> Self {
        Self {
            job_id,
            base_model_name: base_model_name.into(),
            state: JobState::Pending,
            result: None,
            error: None,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_started(&mut self) -> TunerResult<()> {
        self.ensure_pending()?;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn succeed(&mut self, result: JobResult) -> TunerResult<()> {
        self.ensure_pending()?;
        self.state = JobState::Success;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> TunerResult<()> {
        self.ensure_pending()?;
        self.state = JobState::Failure;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn ensure_pending(&self) -> TunerResult<()> {
        if self.state.is_terminal() {
            return Err(TunerError::internal(format!(
                "调优任务 {} 已处于终态 {}，拒绝再次变更",
                self.job_id,
                self.state.as_str()
            )));
        }
        Ok(())
    }
}

/// 一组带标签的样本，标签为编码后的类别下标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingData {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
}

impl TrainingData {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.first().map(Vec::len).unwrap_or(0)
    }

    /// 按下标取子集
    pub fn subset(&self, indices: &[usize]) -> TrainingData {
        TrainingData {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    pub fn validate(&self) -> TunerResult<()> {
        if self.is_empty() {
            return Err(TunerError::training("训练数据为空"));
        }
        if self.features.len() != self.labels.len() {
            return Err(TunerError::training(format!(
                "特征行数 {} 与标签数 {} 不一致",
                self.features.len(),
                self.labels.len()
            )));
        }
        let width = self.n_features();
        if width == 0 {
            return Err(TunerError::training("训练数据特征维度为0"));
        }
        if let Some(row) = self.features.iter().position(|row| row.len() != width) {
            return Err(TunerError::training(format!(
                "第 {row} 行特征维度与首行 ({width}) 不一致"
            )));
        }
        Ok(())
    }
}

/// 某个基础模型的训练集与可选的留出测试集
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub train: TrainingData,
    pub test: Option<TrainingData>,
}

/// 推理结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// 基础模型名称
    pub model: String,
    /// 使用调优模型时对应的目录记录
    pub record_id: Option<RecordId>,
    pub prediction: String,
    pub confidence: f64,
    pub probabilities: BTreeMap<String, f64>,
    /// 标准化之后的特征
    pub features: Vec<f64>,
}
