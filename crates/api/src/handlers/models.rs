use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{error::ApiResult, response::success, routes::AppState};

#[derive(Debug, Deserialize)]
pub struct ModelQueryParams {
    pub base_model_name: Option<String>,
}

/// 调优模型列表，最新的在前
pub async fn list_models(
    State(state): State<AppState>,
    Query(params): Query<ModelQueryParams>,
) -> ApiResult<impl IntoResponse> {
    let records = state
        .models
        .list_models(params.base_model_name.as_deref())
        .await?;
    Ok(success(records))
}

pub async fn get_model(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(success(state.models.get_model(&record_id).await?))
}

/// 某个基础模型最近一次调优的结果
pub async fn get_latest_model(
    State(state): State<AppState>,
    Path(base_model_name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(success(state.models.latest_for(&base_model_name).await?))
}
