//! 领域仓储抽象
//!
//! 模型目录与制品存储是仅有的持久化状态。

use async_trait::async_trait;
use tuner_errors::TunerResult;

use crate::entities::{ModelRecord, NewModelRecord};
use crate::value_objects::{ArtifactHandle, RecordId};

/// 制品存储（GridFS式的二进制对象存储）
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, filename: &str, bytes: Vec<u8>) -> TunerResult<ArtifactHandle>;
    async fn get(&self, handle: &ArtifactHandle) -> TunerResult<Vec<u8>>;
    /// 仅用于清理目录插入失败后遗留的制品
    async fn delete(&self, handle: &ArtifactHandle) -> TunerResult<()>;
}

/// 模型目录，只追加不修改
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    async fn insert(&self, record: NewModelRecord) -> TunerResult<RecordId>;
    async fn find_by_id(&self, record_id: &RecordId) -> TunerResult<Option<ModelRecord>>;
    /// 按创建时间倒序，相同时间按插入顺序倒序
    async fn list_all(&self) -> TunerResult<Vec<ModelRecord>>;
    async fn list_by_base_name(&self, base_model_name: &str) -> TunerResult<Vec<ModelRecord>>;
    async fn find_latest_by_base_name(
        &self,
        base_model_name: &str,
    ) -> TunerResult<Option<ModelRecord>>;
}
