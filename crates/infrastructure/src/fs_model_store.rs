//! 模型目录下的预处理文件、训练数据与基线模型
//!
//! 文件布局（`storage.model_dir`）：
//! `{name}_model.json`、`{name}_scaler.json`、`{name}_label_encoder.json`、
//! `{name}_train.json`、`{name}_test.json`（可选）。

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use tuner_domain::{
    entities::{TrainingData, TrainingSet},
    estimator::Estimator,
    ports::{BaselineModelSource, PreprocessingResolver, TrainingDataSource},
    preprocessing::{LabelEncoder, PreprocessingPair, StandardScaler},
    value_objects::validate_base_model_name,
};
use tuner_errors::{TunerError, TunerResult};

#[derive(Debug, Clone)]
pub struct FsModelStore {
    root: PathBuf,
}

impl FsModelStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 名称先校验再拼路径，保证不会逃出模型目录
    fn path_for(&self, name: &str, suffix: &str) -> TunerResult<PathBuf> {
        validate_base_model_name(name)?;
        Ok(self.root.join(format!("{name}_{suffix}.json")))
    }

    /// 文件不存在时返回 `None`
    async fn read_json<T: DeserializeOwned>(
        &self,
        name: &str,
        suffix: &str,
    ) -> TunerResult<Option<T>> {
        let path = self.path_for(name, suffix)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(TunerError::internal(format!(
                    "读取文件 {} 失败: {e}",
                    path.display()
                )))
            }
        };

        let value = serde_json::from_slice(&bytes).map_err(|e| {
            TunerError::Serialization(format!("解析文件 {} 失败: {e}", path.display()))
        })?;
        debug!("已加载 {}", path.display());
        Ok(Some(value))
    }

    async fn require_json<T: DeserializeOwned>(
        &self,
        name: &str,
        suffix: &str,
        what: &str,
    ) -> TunerResult<T> {
        self.read_json(name, suffix)
            .await?
            .ok_or_else(|| TunerError::data_not_found(name, what))
    }
}

#[async_trait]
impl PreprocessingResolver for FsModelStore {
    #[instrument(skip(self))]
    async fn resolve(&self, base_model_name: &str) -> TunerResult<PreprocessingPair> {
        let scaler: StandardScaler = self
            .require_json(base_model_name, "scaler", "缩放器")
            .await?;
        scaler.validate()?;

        let encoder: LabelEncoder = self
            .require_json(base_model_name, "label_encoder", "标签编码器")
            .await?;
        if encoder.is_empty() {
            return Err(TunerError::Serialization(format!(
                "模型 {base_model_name} 的标签编码器为空"
            )));
        }

        Ok(PreprocessingPair { scaler, encoder })
    }
}

#[async_trait]
impl TrainingDataSource for FsModelStore {
    #[instrument(skip(self))]
    async fn load_training_data(&self, base_model_name: &str) -> TunerResult<TrainingSet> {
        let train: TrainingData = self
            .require_json(base_model_name, "train", "训练数据")
            .await?;
        let test: Option<TrainingData> = self.read_json(base_model_name, "test").await?;

        Ok(TrainingSet { train, test })
    }
}

#[async_trait]
impl BaselineModelSource for FsModelStore {
    #[instrument(skip(self))]
    async fn load_baseline(&self, base_model_name: &str) -> TunerResult<Estimator> {
        let estimator: Estimator = self
            .read_json(base_model_name, "model")
            .await?
            .ok_or_else(|| TunerError::model_not_found(base_model_name))?;
        estimator.validate()?;
        Ok(estimator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, file: &str, value: serde_json::Value) {
        std::fs::write(dir.path().join(file), serde_json::to_vec(&value).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_resolve_preprocessing_pair() {
        let dir = TempDir::new().unwrap();
        write(&dir, "iris_scaler.json", json!({"mean": [1.0, 2.0], "scale": [0.5, 1.0]}));
        write(
            &dir,
            "iris_label_encoder.json",
            json!({"classes": ["setosa", "versicolor"]}),
        );

        let store = FsModelStore::new(dir.path());
        let pair = store.resolve("iris").await.unwrap();
        assert_eq!(pair.scaler.mean, vec![1.0, 2.0]);
        assert_eq!(pair.encoder.classes, vec!["setosa", "versicolor"]);
    }

    #[tokio::test]
    async fn test_missing_files_are_reported_as_data_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FsModelStore::new(dir.path());

        let err = store.load_training_data("alpha").await.unwrap_err();
        assert!(matches!(err, TunerError::DataNotFound { ref name, .. } if name == "alpha"));

        let err = store.resolve("alpha").await.unwrap_err();
        assert!(matches!(err, TunerError::DataNotFound { .. }));

        let err = store.load_baseline("alpha").await.unwrap_err();
        assert!(matches!(err, TunerError::ModelNotFound { .. }));
    }

    #[tokio::test]
    async fn test_test_split_is_optional() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "alpha_train.json",
            json!({"features": [[0.0], [1.0]], "labels": [0, 1]}),
        );
        let store = FsModelStore::new(dir.path());

        let set = store.load_training_data("alpha").await.unwrap();
        assert_eq!(set.train.len(), 2);
        assert!(set.test.is_none());

        write(&dir, "alpha_test.json", json!({"features": [[0.5]], "labels": [1]}));
        let set = store.load_training_data("alpha").await.unwrap();
        assert_eq!(set.test.unwrap().labels, vec![1]);
    }

    #[tokio::test]
    async fn test_names_cannot_escape_model_dir() {
        let dir = TempDir::new().unwrap();
        let store = FsModelStore::new(dir.path());
        let err = store.resolve("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, TunerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_malformed_baseline_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "beta_model.json", json!({"kind": "softmax", "classes": []}));
        let store = FsModelStore::new(dir.path());
        assert!(matches!(
            store.load_baseline("beta").await,
            Err(TunerError::Serialization(_))
        ));
    }
}
