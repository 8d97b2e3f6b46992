use serde::{Deserialize, Serialize};
use tuner_errors::{TunerError, TunerResult};

/// 标准化缩放器：`(x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// 按列计算均值与总体标准差
    pub fn fit(rows: &[Vec<f64>]) -> TunerResult<Self> {
        let width = rows
            .first()
            .map(Vec::len)
            .ok_or_else(|| TunerError::training("无法在空数据上拟合缩放器"))?;
        let n = rows.len() as f64;

        let mut mean = vec![0.0; width];
        for row in rows {
            if row.len() != width {
                return Err(TunerError::FeatureShape {
                    expected: width,
                    actual: row.len(),
                });
            }
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x / n;
            }
        }

        let mut scale = vec![0.0; width];
        for row in rows {
            for ((s, x), m) in scale.iter_mut().zip(row).zip(&mean) {
                *s += (x - m).powi(2) / n;
            }
        }
        for s in scale.iter_mut() {
            *s = s.sqrt();
        }

        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, features: &[f64]) -> TunerResult<Vec<f64>> {
        if features.len() != self.n_features() {
            return Err(TunerError::FeatureShape {
                expected: self.n_features(),
                actual: features.len(),
            });
        }
        Ok(features
            .iter()
            .zip(&self.mean)
            .zip(&self.scale)
            .map(|((x, m), s)| {
                // 常数列
                let s = if *s == 0.0 { 1.0 } else { *s };
                (x - m) / s
            })
            .collect())
    }

    pub fn validate(&self) -> TunerResult<()> {
        if self.mean.is_empty() || self.mean.len() != self.scale.len() {
            return Err(TunerError::Serialization(format!(
                "缩放器形状错误: mean={}, scale={}",
                self.mean.len(),
                self.scale.len()
            )));
        }
        Ok(())
    }
}

/// 标签编码器，下标即编码值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    pub classes: Vec<String>,
}

impl LabelEncoder {
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn inverse_transform(&self, index: usize) -> TunerResult<&str> {
        self.classes.get(index).map(String::as_str).ok_or_else(|| {
            TunerError::internal(format!(
                "类别下标 {index} 超出标签编码器范围 ({})",
                self.classes.len()
            ))
        })
    }
}

/// 同一基础模型共享的缩放器与标签编码器
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingPair {
    pub scaler: StandardScaler,
    pub encoder: LabelEncoder,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_then_transform_centers_columns() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 10.0]];
        let scaler = StandardScaler::fit(&rows).unwrap();
        assert_eq!(scaler.mean, vec![2.0, 10.0]);
        assert_eq!(scaler.scale, vec![1.0, 0.0]);

        let scaled = scaler.transform(&[3.0, 12.0]).unwrap();
        assert_eq!(scaled, vec![1.0, 2.0]);
    }

    #[test]
    fn test_transform_rejects_wrong_dimension() {
        let scaler = StandardScaler {
            mean: vec![0.0; 3],
            scale: vec![1.0; 3],
        };
        assert!(matches!(
            scaler.transform(&[1.0, 2.0]),
            Err(TunerError::FeatureShape {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_inverse_transform() {
        let encoder = LabelEncoder {
            classes: vec!["absent".to_string(), "present".to_string()],
        };
        assert_eq!(encoder.inverse_transform(1).unwrap(), "present");
        assert!(encoder.inverse_transform(2).is_err());
    }
}
