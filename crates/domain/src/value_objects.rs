use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tuner_errors::{TunerError, TunerResult};
use uuid::Uuid;

/// 基础模型名称的最大长度
pub const MAX_BASE_MODEL_NAME_LEN: usize = 128;

/// 单次调优允许的网格点上限，配置中的 `tuning.max_grid_points` 只能更小
pub const MAX_GRID_POINTS: usize = 10_000;

/// 超参数名称到取值的映射（搜索胜出的那一组配置）
pub type Hyperparameters = BTreeMap<String, Value>;

/// 调优任务标识，提交时生成，对调用方不透明
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = TunerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| TunerError::job_not_found(s))
    }
}

/// 模型目录记录标识，由目录在插入时分配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RecordId {
    type Err = TunerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| TunerError::record_not_found(s))
    }
}

/// 制品存储中的不透明句柄
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactHandle(String);

impl ArtifactHandle {
    pub fn new<S: Into<String>>(raw: S) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 校验基础模型名称
///
/// 名称会被用来定位文件系统上的预处理文件，因此只允许字母、数字、`_` 和 `-`。
pub fn validate_base_model_name(name: &str) -> TunerResult<()> {
    if name.is_empty() {
        return Err(TunerError::validation("模型名称不能为空"));
    }
    if name.len() > MAX_BASE_MODEL_NAME_LEN {
        return Err(TunerError::validation(format!(
            "模型名称长度不能超过 {MAX_BASE_MODEL_NAME_LEN} 个字符"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(TunerError::validation(format!(
            "模型名称 '{name}' 只能包含字母、数字、'_' 和 '-'"
        )));
    }
    Ok(())
}

/// 推理请求中的模型选择器
///
/// 在边界处一次性解析：能解析为记录标识的一律按记录标识处理，
/// 找不到对应记录时直接返回 NotFound，不会退回到按名称解析。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSelector {
    ByRecordId(RecordId),
    ByBaseName(String),
}

impl ModelSelector {
    pub fn parse(raw: &str) -> TunerResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TunerError::validation("model 不能为空"));
        }
        if let Some(record_id) = RecordId::parse(raw) {
            return Ok(Self::ByRecordId(record_id));
        }
        validate_base_model_name(raw)?;
        Ok(Self::ByBaseName(raw.to_string()))
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSelector::ByRecordId(id) => write!(f, "record:{id}"),
            ModelSelector::ByBaseName(name) => write!(f, "base:{name}"),
        }
    }
}

/// 超参数搜索空间：参数名 -> 非空候选值列表
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HyperparameterSpace(BTreeMap<String, Vec<Value>>);

impl HyperparameterSpace {
    pub fn try_new(candidates: BTreeMap<String, Vec<Value>>) -> TunerResult<Self> {
        if candidates.is_empty() {
            return Err(TunerError::validation("hyperparameters 不能为空"));
        }
        for (name, values) in &candidates {
            if name.trim().is_empty() {
                return Err(TunerError::validation("超参数名称不能为空"));
            }
            if values.is_empty() {
                return Err(TunerError::validation(format!(
                    "超参数 '{name}' 的候选值列表不能为空"
                )));
            }
        }
        let space = Self(candidates);
        space.ensure_grid_within(MAX_GRID_POINTS)?;
        Ok(space)
    }

    /// 网格点数超过 `max` 时返回 `Validation`，否则返回点数
    pub fn ensure_grid_within(&self, max: usize) -> TunerResult<usize> {
        match self.checked_grid_size() {
            Some(size) if size <= max => Ok(size),
            _ => Err(TunerError::validation(format!(
                "超参数网格过大: 最多允许 {max} 个组合"
            ))),
        }
    }

    /// 从请求体中的JSON对象构造，每个参数的候选值必须是非空数组
    pub fn from_json(value: &Value) -> TunerResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| TunerError::validation("hyperparameters 必须是对象"))?;

        let mut candidates = BTreeMap::new();
        for (name, values) in object {
            let values = values.as_array().ok_or_else(|| {
                TunerError::validation(format!("超参数 '{name}' 的候选值必须是数组"))
            })?;
            candidates.insert(name.clone(), values.clone());
        }
        Self::try_new(candidates)
    }

    pub fn candidates(&self) -> &BTreeMap<String, Vec<Value>> {
        &self.0
    }

    fn checked_grid_size(&self) -> Option<usize> {
        self.0
            .values()
            .try_fold(1usize, |acc, values| acc.checked_mul(values.len()))
    }

    pub fn grid_size(&self) -> usize {
        self.checked_grid_size().unwrap_or(usize::MAX)
    }

    /// 展开为参数网格（笛卡尔积），顺序确定：键按字典序，候选值按给定顺序
    pub fn grid(&self) -> Vec<Hyperparameters> {
        let mut points = vec![Hyperparameters::new()];
        for (name, values) in &self.0 {
            let mut next = Vec::with_capacity(points.len() * values.len());
            for point in &points {
                for value in values {
                    let mut extended = point.clone();
                    extended.insert(name.clone(), value.clone());
                    next.push(extended);
                }
            }
            points = next;
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_selector_parses_uuid_as_record_id() {
        let id = RecordId::new();
        let selector = ModelSelector::parse(&id.to_string()).unwrap();
        assert_eq!(selector, ModelSelector::ByRecordId(id));
    }

    #[test]
    fn test_selector_parses_plain_name_as_base_name() {
        let selector = ModelSelector::parse("heart_disease").unwrap();
        assert_eq!(selector, ModelSelector::ByBaseName("heart_disease".to_string()));
    }

    #[test]
    fn test_selector_rejects_empty_and_path_like_names() {
        assert!(matches!(
            ModelSelector::parse("   "),
            Err(TunerError::Validation(_))
        ));
        assert!(matches!(
            ModelSelector::parse("../etc/passwd"),
            Err(TunerError::Validation(_))
        ));
    }

    #[test]
    fn test_space_requires_non_empty_candidates() {
        assert!(HyperparameterSpace::from_json(&json!({})).is_err());
        assert!(HyperparameterSpace::from_json(&json!({"epochs": []})).is_err());
        assert!(HyperparameterSpace::from_json(&json!({"epochs": 10})).is_err());
        assert!(HyperparameterSpace::from_json(&json!([1, 2])).is_err());
        assert!(HyperparameterSpace::from_json(&json!({"epochs": [10]})).is_ok());
    }

    #[test]
    fn test_grid_is_cartesian_product_in_key_order() {
        let space = HyperparameterSpace::from_json(&json!({
            "learning_rate": [0.1, 0.5],
            "epochs": [10, 20, 30]
        }))
        .unwrap();

        assert_eq!(space.grid_size(), 6);
        let grid = space.grid();
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[0]["epochs"], json!(10));
        assert_eq!(grid[0]["learning_rate"], json!(0.1));
        assert_eq!(grid[1]["epochs"], json!(10));
        assert_eq!(grid[1]["learning_rate"], json!(0.5));
        assert_eq!(grid[5]["epochs"], json!(30));
        assert_eq!(grid[5]["learning_rate"], json!(0.5));
    }

    fn wide_space(keys: usize, values_per_key: usize) -> Value {
        let object: serde_json::Map<String, Value> = (0..keys)
            .map(|k| {
                let values: Vec<Value> = (0..values_per_key).map(|v| json!(v)).collect();
                (format!("p{k}"), Value::Array(values))
            })
            .collect();
        Value::Object(object)
    }

    #[test]
    fn test_overflowing_grid_is_rejected() {
        let err = HyperparameterSpace::from_json(&wide_space(10, 100)).unwrap_err();
        assert!(matches!(err, TunerError::Validation(_)));
    }

    #[test]
    fn test_grid_above_ceiling_is_rejected() {
        let err = HyperparameterSpace::from_json(&wide_space(3, 100)).unwrap_err();
        assert!(matches!(err, TunerError::Validation(_)));

        let space = HyperparameterSpace::from_json(&wide_space(2, 100)).unwrap();
        assert_eq!(space.grid_size(), MAX_GRID_POINTS);
    }

    #[test]
    fn test_ensure_grid_within_smaller_limit() {
        let space = HyperparameterSpace::from_json(&json!({
            "epochs": [1, 2, 3],
            "l2": [0.0, 0.1]
        }))
        .unwrap();
        assert_eq!(space.ensure_grid_within(6).unwrap(), 6);
        assert!(matches!(
            space.ensure_grid_within(5),
            Err(TunerError::Validation(_))
        ));
    }

    #[test]
    fn test_job_id_round_trips_through_string() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!(matches!(
            "not-a-job".parse::<JobId>(),
            Err(TunerError::JobNotFound { .. })
        ));
    }
}
