use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// 预处理文件、基线模型与训练数据所在目录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub model_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            model_dir: "models".to_string(),
        }
    }
}

impl ConfigValidator for StorageConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.model_dir, "storage.model_dir")
    }
}
