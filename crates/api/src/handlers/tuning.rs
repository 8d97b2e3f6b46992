use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tuner_domain::{
    entities::JobState,
    value_objects::{HyperparameterSpace, JobId},
};

use crate::{
    error::{ApiError, ApiResult},
    response::{accepted, success},
    routes::AppState,
};

/// 调优请求
#[derive(Debug, Deserialize)]
pub struct TuneRequest {
    pub model: Option<String>,
    pub hyperparameters: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct TuneAccepted {
    pub job_id: JobId,
    pub status: JobState,
}

/// 提交调优任务，立即返回 202
pub async fn submit_tuning(
    State(state): State<AppState>,
    payload: Result<Json<TuneRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;

    let model = request
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::bad_request("缺少调优的模型名称 (model)"))?;
    let hyperparameters = request
        .hyperparameters
        .as_ref()
        .ok_or_else(|| ApiError::bad_request("缺少调优的超参数 (hyperparameters)"))?;
    let space = HyperparameterSpace::from_json(hyperparameters)?;

    let job_id = state.orchestrator.submit(model, space).await?;

    Ok(accepted(TuneAccepted {
        job_id,
        status: JobState::Pending,
    }))
}

/// 查询调优任务状态
pub async fn get_tuning_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let job_id: JobId = job_id.parse()?;
    let job = state.orchestrator.registry().get_status(&job_id).await?;
    Ok(success(job))
}
