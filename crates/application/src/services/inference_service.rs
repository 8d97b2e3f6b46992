use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, instrument};
use tuner_domain::{
    entities::PredictionResult,
    estimator::{argmax, Classifier, Estimator},
    ports::{BaselineModelSource, PreprocessingResolver},
    preprocessing::LabelEncoder,
    repositories::{ArtifactStore, ModelCatalog},
    value_objects::{ModelSelector, RecordId},
};
use tuner_errors::{TunerError, TunerResult};

/// 推理解析器
///
/// 选择器为记录标识时使用调优模型，为名称时使用目录之外的基线模型。
/// 预处理器始终按基础模型名称查找。
pub struct InferenceService {
    catalog: Arc<dyn ModelCatalog>,
    artifacts: Arc<dyn ArtifactStore>,
    baselines: Arc<dyn BaselineModelSource>,
    preprocessing: Arc<dyn PreprocessingResolver>,
}

struct ResolvedModel {
    estimator: Estimator,
    base_model_name: String,
    record_id: Option<RecordId>,
}

impl InferenceService {
    pub fn new(
        catalog: Arc<dyn ModelCatalog>,
        artifacts: Arc<dyn ArtifactStore>,
        baselines: Arc<dyn BaselineModelSource>,
        preprocessing: Arc<dyn PreprocessingResolver>,
    ) -> Self {
        Self {
            catalog,
            artifacts,
            baselines,
            preprocessing,
        }
    }

    #[instrument(skip(self, features), fields(selector = %selector, n_features = features.len()))]
    pub async fn predict(
        &self,
        selector: &ModelSelector,
        features: &[f64],
    ) -> TunerResult<PredictionResult> {
        validate_features(features)?;

        let resolved = self.resolve(selector).await?;
        let pair = self.preprocessing.resolve(&resolved.base_model_name).await?;

        let scaled = pair.scaler.transform(features)?;
        let probs = resolved.estimator.predict_proba(&scaled)?;
        let aligned = align_to_encoder(resolved.estimator.classes(), &probs, &pair.encoder)?;

        let best = argmax(&aligned);
        let prediction = pair.encoder.inverse_transform(best)?.to_string();
        let probabilities: BTreeMap<String, f64> = pair
            .encoder
            .classes
            .iter()
            .cloned()
            .zip(aligned.iter().copied())
            .collect();

        let source = if resolved.record_id.is_some() {
            "tuned"
        } else {
            "baseline"
        };
        counter!("predictions_total", "source" => source).increment(1);
        debug!("{} 预测结果: {} ({:.4})", resolved.base_model_name, prediction, aligned[best]);

        Ok(PredictionResult {
            model: resolved.base_model_name,
            record_id: resolved.record_id,
            prediction,
            confidence: aligned[best],
            probabilities,
            features: scaled,
        })
    }

    async fn resolve(&self, selector: &ModelSelector) -> TunerResult<ResolvedModel> {
        match selector {
            ModelSelector::ByRecordId(record_id) => {
                // 形如记录标识但找不到时直接报错，不退回按名称解析
                let record = self
                    .catalog
                    .find_by_id(record_id)
                    .await?
                    .ok_or_else(|| TunerError::record_not_found(record_id.to_string()))?;
                let bytes = self.artifacts.get(&record.artifact_handle).await?;
                Ok(ResolvedModel {
                    estimator: Estimator::from_bytes(&bytes)?,
                    base_model_name: record.base_model_name,
                    record_id: Some(record.record_id),
                })
            }
            ModelSelector::ByBaseName(name) => Ok(ResolvedModel {
                estimator: self.baselines.load_baseline(name).await?,
                base_model_name: name.clone(),
                record_id: None,
            }),
        }
    }
}

fn validate_features(features: &[f64]) -> TunerResult<()> {
    if features.is_empty() {
        return Err(TunerError::validation("features 不能为空"));
    }
    if let Some(i) = features.iter().position(|x| !x.is_finite()) {
        return Err(TunerError::validation(format!("features[{i}] 不是有限数值")));
    }
    Ok(())
}

/// 把模型内部类别顺序的概率重排为标签编码器的下标顺序
fn align_to_encoder(
    classes: &[usize],
    probs: &[f64],
    encoder: &LabelEncoder,
) -> TunerResult<Vec<f64>> {
    let mut aligned = vec![0.0; encoder.len()];
    for (class, p) in classes.iter().zip(probs) {
        let slot = aligned.get_mut(*class).ok_or_else(|| {
            TunerError::internal(format!(
                "模型类别 {class} 超出标签编码器范围 ({})",
                encoder.len()
            ))
        })?;
        *slot = *p;
    }
    Ok(aligned)
}
