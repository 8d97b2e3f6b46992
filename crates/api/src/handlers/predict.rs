use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tuner_domain::value_objects::ModelSelector;

use crate::{
    error::{ApiError, ApiResult},
    response::success,
    routes::AppState,
};

/// 推理请求，`model` 可以是基础模型名称或调优模型的记录标识
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub model: Option<String>,
    pub features: Option<Vec<f64>>,
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;

    let model = request
        .model
        .ok_or_else(|| ApiError::bad_request("缺少模型 (model)"))?;
    let features = request
        .features
        .ok_or_else(|| ApiError::bad_request("缺少特征 (features)"))?;

    let selector = ModelSelector::parse(&model)?;
    let result = state.inference.predict(&selector, &features).await?;
    Ok(success(result))
}
