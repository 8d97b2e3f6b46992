//! 已拟合的分类器
//!
//! 制品存储中的字节即 [`Estimator`] 的JSON序列化结果。
//! 分类器内部的类别顺序 (`classes`) 与标签编码器的顺序不一定相同，
//! 推理时需要按类别下标重新对齐。

use serde::{Deserialize, Serialize};
use tuner_errors::{TunerError, TunerResult};

pub trait Classifier {
    fn n_features(&self) -> usize;

    /// 内部类别顺序，元素为编码后的类别下标
    fn classes(&self) -> &[usize];

    /// 与 `classes()` 顺序对齐的概率分布
    fn predict_proba(&self, features: &[f64]) -> TunerResult<Vec<f64>>;
}

/// 多项逻辑回归
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxModel {
    pub classes: Vec<usize>,
    pub n_features: usize,
    /// 每个类别一行，长度为 n_features
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl SoftmaxModel {
    pub fn zeros(classes: Vec<usize>, n_features: usize) -> Self {
        let k = classes.len();
        Self {
            classes,
            n_features,
            weights: vec![vec![0.0; n_features]; k],
            bias: vec![0.0; k],
        }
    }

    pub fn validate(&self) -> TunerResult<()> {
        if self.classes.is_empty() {
            return Err(TunerError::Serialization("分类器没有任何类别".to_string()));
        }
        if self.weights.len() != self.classes.len() || self.bias.len() != self.classes.len() {
            return Err(TunerError::Serialization(format!(
                "分类器参数形状错误: classes={}, weights={}, bias={}",
                self.classes.len(),
                self.weights.len(),
                self.bias.len()
            )));
        }
        if self.weights.iter().any(|row| row.len() != self.n_features) {
            return Err(TunerError::Serialization(format!(
                "分类器权重维度与 n_features={} 不一致",
                self.n_features
            )));
        }
        let finite = self
            .weights
            .iter()
            .flatten()
            .chain(&self.bias)
            .all(|v| v.is_finite());
        if !finite {
            return Err(TunerError::Serialization(
                "分类器参数包含 NaN 或无穷大".to_string(),
            ));
        }
        let mut seen = self.classes.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.classes.len() {
            return Err(TunerError::Serialization("分类器类别重复".to_string()));
        }
        Ok(())
    }

    pub fn logits(&self, features: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect()
    }
}

/// 数值稳定的softmax
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

fn check_shape(expected: usize, features: &[f64]) -> TunerResult<()> {
    if features.len() != expected {
        return Err(TunerError::FeatureShape {
            expected,
            actual: features.len(),
        });
    }
    Ok(())
}

impl Classifier for SoftmaxModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn classes(&self) -> &[usize] {
        &self.classes
    }

    fn predict_proba(&self, features: &[f64]) -> TunerResult<Vec<f64>> {
        check_shape(self.n_features, features)?;
        Ok(softmax(&self.logits(features)))
    }
}

/// 软投票集成：成员各自可能只见过部分类别，概率按类别下标对齐后取平均
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleModel {
    pub classes: Vec<usize>,
    pub n_features: usize,
    pub members: Vec<SoftmaxModel>,
}

impl EnsembleModel {
    pub fn validate(&self) -> TunerResult<()> {
        if self.members.is_empty() {
            return Err(TunerError::Serialization("集成模型没有成员".to_string()));
        }
        for member in &self.members {
            member.validate()?;
            if member.n_features != self.n_features {
                return Err(TunerError::Serialization(
                    "集成成员特征维度不一致".to_string(),
                ));
            }
            if let Some(c) = member.classes.iter().find(|c| !self.classes.contains(c)) {
                return Err(TunerError::Serialization(format!(
                    "集成成员包含未知类别 {c}"
                )));
            }
        }
        Ok(())
    }
}

impl Classifier for EnsembleModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn classes(&self) -> &[usize] {
        &self.classes
    }

    fn predict_proba(&self, features: &[f64]) -> TunerResult<Vec<f64>> {
        check_shape(self.n_features, features)?;
        let mut averaged = vec![0.0; self.classes.len()];
        for member in &self.members {
            let probs = member.predict_proba(features)?;
            for (class, p) in member.classes.iter().zip(probs) {
                if let Some(slot) = self.classes.iter().position(|c| c == class) {
                    averaged[slot] += p;
                }
            }
        }
        let n = self.members.len() as f64;
        Ok(averaged.into_iter().map(|p| p / n).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    Softmax(SoftmaxModel),
    Ensemble(EnsembleModel),
}

impl Estimator {
    /// 序列化前先校验，非有限值写成JSON会变成 `null`，之后无法加载
    pub fn to_bytes(&self) -> TunerResult<Vec<u8>> {
        self.validate()?;
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> TunerResult<Self> {
        let estimator: Estimator = serde_json::from_slice(bytes)?;
        estimator.validate()?;
        Ok(estimator)
    }

    pub fn validate(&self) -> TunerResult<()> {
        match self {
            Estimator::Softmax(model) => model.validate(),
            Estimator::Ensemble(model) => model.validate(),
        }
    }

    /// 预测类别下标
    pub fn predict(&self, features: &[f64]) -> TunerResult<usize> {
        let probs = self.predict_proba(features)?;
        let best = argmax(&probs);
        Ok(self.classes()[best])
    }
}

impl Classifier for Estimator {
    fn n_features(&self) -> usize {
        match self {
            Estimator::Softmax(model) => model.n_features(),
            Estimator::Ensemble(model) => model.n_features(),
        }
    }

    fn classes(&self) -> &[usize] {
        match self {
            Estimator::Softmax(model) => model.classes(),
            Estimator::Ensemble(model) => model.classes(),
        }
    }

    fn predict_proba(&self, features: &[f64]) -> TunerResult<Vec<f64>> {
        match self {
            Estimator::Softmax(model) => model.predict_proba(features),
            Estimator::Ensemble(model) => model.predict_proba(features),
        }
    }
}

/// 最大值下标，相同取最靠前的
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
