use thiserror::Error;

#[derive(Debug, Error)]
pub enum TunerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("请求验证失败: {0}")]
    Validation(String),
    #[error("数据不存在: 模型 {name} 缺少 {what}")]
    DataNotFound { name: String, what: String },
    #[error("模型制品存储错误: {0}")]
    ArtifactStore(String),
    #[error("调优任务未找到: {id}")]
    JobNotFound { id: String },
    #[error("调优模型记录未找到: {id}")]
    RecordNotFound { id: String },
    #[error("基础模型未找到: {name}")]
    ModelNotFound { name: String },
    #[error("特征维度不匹配: 期望 {expected}, 实际 {actual}")]
    FeatureShape { expected: usize, actual: usize },
    #[error("模型训练失败: {0}")]
    Training(String),
    #[error("调优队列已满 (容量 {capacity})")]
    QueueFull { capacity: usize },
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type TunerResult<T> = Result<T, TunerError>;

impl TunerError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn data_not_found<N: Into<String>, W: Into<String>>(name: N, what: W) -> Self {
        Self::DataNotFound {
            name: name.into(),
            what: what.into(),
        }
    }
    pub fn artifact_store<S: Into<String>>(msg: S) -> Self {
        Self::ArtifactStore(msg.into())
    }
    pub fn job_not_found<S: Into<String>>(id: S) -> Self {
        Self::JobNotFound { id: id.into() }
    }
    pub fn record_not_found<S: Into<String>>(id: S) -> Self {
        Self::RecordNotFound { id: id.into() }
    }
    pub fn model_not_found<S: Into<String>>(name: S) -> Self {
        Self::ModelNotFound { name: name.into() }
    }
    pub fn training<S: Into<String>>(msg: S) -> Self {
        Self::Training(msg.into())
    }
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TunerError::DataNotFound { .. }
                | TunerError::JobNotFound { .. }
                | TunerError::RecordNotFound { .. }
                | TunerError::ModelNotFound { .. }
        )
    }
    /// 调用方可修正的错误（请求本身有问题）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TunerError::Validation(_) | TunerError::FeatureShape { .. }
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            TunerError::Validation(_) => "请求参数有误",
            TunerError::DataNotFound { .. } => "所需的训练数据或预处理文件不存在",
            TunerError::JobNotFound { .. } => "请求的调优任务不存在",
            TunerError::RecordNotFound { .. } => "请求的调优模型不存在",
            TunerError::ModelNotFound { .. } => "请求的基础模型不存在",
            TunerError::FeatureShape { .. } => "特征向量长度与模型不一致",
            TunerError::QueueFull { .. } => "调优队列已满，请稍后重试",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for TunerError {
    fn from(err: serde_json::Error) -> Self {
        TunerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for TunerError {
    fn from(err: anyhow::Error) -> Self {
        TunerError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests;
