//! 网格搜索训练器
//!
//! 每个网格点用k折交叉验证打分，最优点在完整训练集上重新拟合。
//! 训练文件中的特征已经过标准化，与推理时缩放后的输入处于同一空间。

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tracing::{debug, info};
use tuner_domain::{
    entities::{TrainingData, TrainingSet},
    estimator::{softmax, EnsembleModel, Estimator, SoftmaxModel},
    ports::{Trainer, TrainingOutcome},
    value_objects::{HyperparameterSpace, Hyperparameters},
};
use tuner_errors::{TunerError, TunerResult};

pub const DEFAULT_CV_FOLDS: usize = 2;
pub const DEFAULT_SEED: u64 = 42;
pub const MAX_EPOCHS: u64 = 10_000;
pub const MAX_N_ESTIMATORS: u64 = 100;

const PARAM_NAMES: [&str; 5] = ["n_estimators", "learning_rate", "epochs", "l2", "sample_ratio"];

#[derive(Debug, Clone, PartialEq)]
struct TrainingParams {
    n_estimators: usize,
    learning_rate: f64,
    epochs: usize,
    l2: f64,
    sample_ratio: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            n_estimators: 1,
            learning_rate: 0.1,
            epochs: 200,
            l2: 0.0,
            sample_ratio: 1.0,
        }
    }
}

impl TrainingParams {
    fn from_point(point: &Hyperparameters) -> TunerResult<Self> {
        let mut params = Self::default();
        for (name, value) in point {
            params.apply(name, value)?;
        }
        Ok(params)
    }

    fn apply(&mut self, name: &str, value: &Value) -> TunerResult<()> {
        match name {
            "n_estimators" => self.n_estimators = bounded_int(name, value, MAX_N_ESTIMATORS)?,
            "epochs" => self.epochs = bounded_int(name, value, MAX_EPOCHS)?,
            "learning_rate" => {
                self.learning_rate = float_in(name, value, |v| v > 0.0, "必须大于0")?
            }
            "l2" => self.l2 = float_in(name, value, |v| v >= 0.0, "不能为负数")?,
            "sample_ratio" => {
                self.sample_ratio =
                    float_in(name, value, |v| v > 0.0 && v <= 1.0, "必须在 (0, 1] 区间内")?
            }
            other => {
                return Err(TunerError::validation(format!(
                    "不支持的超参数: {other}，可选: {}",
                    PARAM_NAMES.join(", ")
                )))
            }
        }
        Ok(())
    }
}

fn bounded_int(name: &str, value: &Value, max: u64) -> TunerResult<usize> {
    value
        .as_u64()
        .filter(|v| (1..=max).contains(v))
        .map(|v| v as usize)
        .ok_or_else(|| {
            TunerError::validation(format!(
                "超参数 {name} 必须是 1 到 {max} 之间的整数，实际为 {value}"
            ))
        })
}

fn float_in(name: &str, value: &Value, accept: fn(f64) -> bool, rule: &str) -> TunerResult<f64> {
    value
        .as_f64()
        .filter(|v| v.is_finite() && accept(*v))
        .ok_or_else(|| TunerError::validation(format!("超参数 {name} {rule}，实际为 {value}")))
}

#[derive(Debug, Clone)]
pub struct GridSearchTrainer {
    cv_folds: usize,
    seed: u64,
}

impl Default for GridSearchTrainer {
    fn default() -> Self {
        Self::new(DEFAULT_CV_FOLDS, DEFAULT_SEED)
    }
}

impl GridSearchTrainer {
    pub fn new(cv_folds: usize, seed: u64) -> Self {
        Self {
            cv_folds: cv_folds.max(2),
            seed,
        }
    }

    fn fit_estimator(&self, data: &TrainingData, params: &TrainingParams) -> Estimator {
        if params.n_estimators == 1 && params.sample_ratio >= 1.0 {
            return Estimator::Softmax(fit_softmax(data, params));
        }

        let classes = distinct_labels(&data.labels);
        let n_features = data.n_features();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let sample_size = ((data.len() as f64 * params.sample_ratio).ceil() as usize).max(1);
        let members = (0..params.n_estimators)
            .map(|_| {
                let indices: Vec<usize> = (0..sample_size)
                    .map(|_| rng.random_range(0..data.len()))
                    .collect();
                fit_softmax(&data.subset(&indices), params)
            })
            .collect();

        Estimator::Ensemble(EnsembleModel {
            classes,
            n_features,
            members,
        })
    }

    /// 打乱后按下标取模分折
    fn folds(&self, len: usize) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..len).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(self.seed));

        let mut folds = vec![Vec::new(); self.cv_folds];
        for (position, index) in indices.into_iter().enumerate() {
            folds[position % self.cv_folds].push(index);
        }
        folds
    }

    fn cross_validate(
        &self,
        data: &TrainingData,
        folds: &[Vec<usize>],
        params: &TrainingParams,
    ) -> TunerResult<f64> {
        let mut total = 0.0;
        for (k, held_out) in folds.iter().enumerate() {
            let train_indices: Vec<usize> = folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != k)
                .flat_map(|(_, fold)| fold.iter().copied())
                .collect();
            let estimator = self.fit_estimator(&data.subset(&train_indices), params);
            total += accuracy(&estimator, &data.subset(held_out))?;
        }
        Ok(total / folds.len() as f64)
    }
}

impl Trainer for GridSearchTrainer {
    /// 逐个检查已知参数的候选值，不展开网格
    ///
    /// 未知参数名留到任务执行时报错，与训练数据缺失等错误一起体现在任务状态中。
    fn validate_space(&self, space: &HyperparameterSpace) -> TunerResult<()> {
        for (name, values) in space.candidates() {
            if !PARAM_NAMES.contains(&name.as_str()) {
                continue;
            }
            for value in values {
                TrainingParams::default().apply(name, value)?;
            }
        }
        Ok(())
    }

    fn fit(&self, data: &TrainingSet, space: &HyperparameterSpace) -> TunerResult<TrainingOutcome> {
        let train = &data.train;
        train.validate()?;
        if train.len() < self.cv_folds {
            return Err(TunerError::training(format!(
                "训练样本数 {} 少于交叉验证折数 {}",
                train.len(),
                self.cv_folds
            )));
        }

        // 先校验全部网格点，避免训练到一半才发现参数非法
        let grid = space.grid();
        let candidates = grid
            .iter()
            .map(TrainingParams::from_point)
            .collect::<TunerResult<Vec<_>>>()?;

        info!(
            "开始网格搜索: {} 个候选, {} 折, {} 个样本",
            candidates.len(),
            self.cv_folds,
            train.len()
        );

        let folds = self.folds(train.len());
        let mut best: Option<(usize, f64)> = None;
        for (i, params) in candidates.iter().enumerate() {
            let score = self.cross_validate(train, &folds, params)?;
            debug!("候选 {:?} 交叉验证得分 {:.4}", grid[i], score);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        let (best_index, cv_score) =
            best.ok_or_else(|| TunerError::training("超参数网格为空"))?;

        let estimator = self.fit_estimator(train, &candidates[best_index]);
        // 发散的拟合会产生 NaN/inf 权重，这样的模型不能写入制品存储
        estimator.validate().map_err(|e| {
            TunerError::training(format!(
                "参数 {:?} 的拟合结果无效，训练可能发散: {e}",
                grid[best_index]
            ))
        })?;

        let quality_score = match &data.test {
            Some(test) => {
                test.validate()?;
                if test.n_features() != train.n_features() {
                    return Err(TunerError::training(format!(
                        "测试集特征维度 {} 与训练集 {} 不一致",
                        test.n_features(),
                        train.n_features()
                    )));
                }
                accuracy(&estimator, test)?
            }
            None => cv_score,
        };

        info!(
            "网格搜索完成: 最优参数 {:?}, 交叉验证得分 {:.4}, 质量得分 {:.4}",
            grid[best_index], cv_score, quality_score
        );

        Ok(TrainingOutcome {
            estimator,
            best_params: grid[best_index].clone(),
            quality_score,
        })
    }
}

fn distinct_labels(labels: &[usize]) -> Vec<usize> {
    let mut classes = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();
    classes
}

/// 全批量梯度下降训练多项逻辑回归
fn fit_softmax(data: &TrainingData, params: &TrainingParams) -> SoftmaxModel {
    let classes = distinct_labels(&data.labels);
    let mut model = SoftmaxModel::zeros(classes.clone(), data.n_features());
    let targets: Vec<usize> = data
        .labels
        .iter()
        .map(|label| classes.binary_search(label).unwrap_or(0))
        .collect();
    let n = data.len() as f64;
    let k = classes.len();

    for _ in 0..params.epochs {
        let mut grad_w = vec![vec![0.0; model.n_features]; k];
        let mut grad_b = vec![0.0; k];

        for (row, &target) in data.features.iter().zip(&targets) {
            let probs = softmax(&model.logits(row));
            for (c, p) in probs.iter().enumerate() {
                let delta = p - if c == target { 1.0 } else { 0.0 };
                grad_b[c] += delta / n;
                for (g, x) in grad_w[c].iter_mut().zip(row) {
                    *g += delta * x / n;
                }
            }
        }

        for c in 0..k {
            for (w, g) in model.weights[c].iter_mut().zip(&grad_w[c]) {
                *w -= params.learning_rate * (g + params.l2 * *w);
            }
            model.bias[c] -= params.learning_rate * grad_b[c];
        }
    }

    model
}

fn accuracy(estimator: &Estimator, data: &TrainingData) -> TunerResult<f64> {
    if data.is_empty() {
        return Ok(0.0);
    }
    let mut correct = 0usize;
    for (row, label) in data.features.iter().zip(&data.labels) {
        if estimator.predict(row)? == *label {
            correct += 1;
        }
    }
    Ok(correct as f64 / data.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tuner_domain::estimator::Classifier;

    /// 两个线性可分的簇
    fn separable(n: usize) -> TrainingData {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n {
            let offset = (i % 5) as f64 * 0.1;
            features.push(vec![-2.0 - offset, 1.0 + offset]);
            labels.push(0);
            features.push(vec![2.0 + offset, -1.0 - offset]);
            labels.push(1);
        }
        TrainingData { features, labels }
    }

    fn space(entries: &[(&str, Vec<Value>)]) -> HyperparameterSpace {
        let map: BTreeMap<String, Vec<Value>> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        HyperparameterSpace::try_new(map).unwrap()
    }

    #[test]
    fn test_fits_separable_data() {
        let trainer = GridSearchTrainer::default();
        let set = TrainingSet {
            train: separable(10),
            test: Some(separable(3)),
        };
        let outcome = trainer
            .fit(&set, &space(&[("learning_rate", vec![json!(0.5)])]))
            .unwrap();

        assert_eq!(outcome.quality_score, 1.0);
        assert!(matches!(outcome.estimator, Estimator::Softmax(_)));
        assert_eq!(outcome.estimator.predict(&[3.0, -1.0]).unwrap(), 1);
    }

    #[test]
    fn test_ensemble_when_bagging_requested() {
        let trainer = GridSearchTrainer::new(3, 7);
        let set = TrainingSet {
            train: separable(6),
            test: None,
        };
        let outcome = trainer
            .fit(
                &set,
                &space(&[
                    ("n_estimators", vec![json!(3)]),
                    ("sample_ratio", vec![json!(0.8)]),
                ]),
            )
            .unwrap();

        match &outcome.estimator {
            Estimator::Ensemble(model) => assert_eq!(model.members.len(), 3),
            other => panic!("expected ensemble, got {other:?}"),
        }
        let probs = outcome.estimator.predict_proba(&[0.0, 0.0]).unwrap();
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_best_params_come_from_grid() {
        let trainer = GridSearchTrainer::default();
        let set = TrainingSet {
            train: separable(8),
            test: None,
        };
        let outcome = trainer
            .fit(
                &set,
                &space(&[
                    ("epochs", vec![json!(1), json!(100)]),
                    ("learning_rate", vec![json!(0.5)]),
                ]),
            )
            .unwrap();

        assert_eq!(outcome.best_params["learning_rate"], json!(0.5));
        assert!(outcome.best_params.contains_key("epochs"));
        assert!(outcome.quality_score > 0.9);
    }

    #[test]
    fn test_deterministic_for_same_seed() {
        let set = TrainingSet {
            train: separable(6),
            test: None,
        };
        let grid = space(&[
            ("n_estimators", vec![json!(2)]),
            ("sample_ratio", vec![json!(0.5)]),
        ]);
        let a = GridSearchTrainer::new(2, 11).fit(&set, &grid).unwrap();
        let b = GridSearchTrainer::new(2, 11).fit(&set, &grid).unwrap();
        assert_eq!(a.estimator, b.estimator);
    }

    #[test]
    fn test_unknown_hyperparameter_fails() {
        let trainer = GridSearchTrainer::default();
        let set = TrainingSet {
            train: separable(4),
            test: None,
        };
        let err = trainer
            .fit(&set, &space(&[("max_depth", vec![json!(3)])]))
            .unwrap_err();
        assert!(matches!(err, TunerError::Validation(_)));
    }

    #[test]
    fn test_ill_typed_value_fails() {
        let trainer = GridSearchTrainer::default();
        let set = TrainingSet {
            train: separable(4),
            test: None,
        };
        let err = trainer
            .fit(&set, &space(&[("n_estimators", vec![json!("many")])]))
            .unwrap_err();
        assert!(matches!(err, TunerError::Validation(_)));
    }

    #[test]
    fn test_too_few_samples_for_folds() {
        let trainer = GridSearchTrainer::new(5, 42);
        let set = TrainingSet {
            train: TrainingData {
                features: vec![vec![0.0], vec![1.0]],
                labels: vec![0, 1],
            },
            test: None,
        };
        assert!(trainer
            .fit(&set, &space(&[("epochs", vec![json!(1)])]))
            .is_err());
    }

    #[test]
    fn test_validate_space_caps_expensive_values() {
        let trainer = GridSearchTrainer::default();
        for (name, value) in [
            ("epochs", json!(1e15)),
            ("epochs", json!(MAX_EPOCHS + 1)),
            ("n_estimators", json!(MAX_N_ESTIMATORS + 1)),
            ("n_estimators", json!(0)),
            ("learning_rate", json!(-1.0)),
        ] {
            let err = trainer
                .validate_space(&space(&[(name, vec![json!(1), value.clone()])]))
                .unwrap_err();
            assert!(
                matches!(err, TunerError::Validation(_)),
                "{name}={value} should be rejected"
            );
        }

        trainer
            .validate_space(&space(&[
                ("epochs", vec![json!(1), json!(MAX_EPOCHS)]),
                ("n_estimators", vec![json!(MAX_N_ESTIMATORS)]),
                ("learning_rate", vec![json!(0.1)]),
            ]))
            .unwrap();
        trainer
            .validate_space(&space(&[("max_depth", vec![json!(3)])]))
            .unwrap();
    }

    #[test]
    fn test_diverging_fit_is_a_training_error() {
        let trainer = GridSearchTrainer::default();
        let set = TrainingSet {
            train: separable(6),
            test: None,
        };
        let err = trainer
            .fit(
                &set,
                &space(&[
                    ("learning_rate", vec![json!(10.0)]),
                    ("l2", vec![json!(1.0)]),
                    ("epochs", vec![json!(400)]),
                ]),
            )
            .unwrap_err();
        assert!(matches!(err, TunerError::Training(_)), "got {err:?}");
    }
}
