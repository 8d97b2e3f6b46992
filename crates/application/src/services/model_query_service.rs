use std::sync::Arc;

use tracing::instrument;
use tuner_domain::{
    entities::ModelRecord,
    repositories::ModelCatalog,
    value_objects::{validate_base_model_name, RecordId},
};
use tuner_errors::{TunerError, TunerResult};

/// 模型目录的只读查询
pub struct ModelQueryService {
    catalog: Arc<dyn ModelCatalog>,
}

impl ModelQueryService {
    pub fn new(catalog: Arc<dyn ModelCatalog>) -> Self {
        Self { catalog }
    }

    /// 按创建时间倒序列出，可按基础模型名称过滤
    #[instrument(skip(self))]
    pub async fn list_models(&self, base_model_name: Option<&str>) -> TunerResult<Vec<ModelRecord>> {
        match base_model_name {
            Some(name) => {
                validate_base_model_name(name)?;
                self.catalog.list_by_base_name(name).await
            }
            None => self.catalog.list_all().await,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_model(&self, record_id: &str) -> TunerResult<ModelRecord> {
        let id: RecordId = record_id.parse()?;
        self.catalog
            .find_by_id(&id)
            .await?
            .ok_or_else(|| TunerError::record_not_found(record_id))
    }

    pub async fn latest_for(&self, base_model_name: &str) -> TunerResult<ModelRecord> {
        validate_base_model_name(base_model_name)?;
        self.catalog
            .find_latest_by_base_name(base_model_name)
            .await?
            .ok_or_else(|| TunerError::model_not_found(base_model_name))
    }
}
