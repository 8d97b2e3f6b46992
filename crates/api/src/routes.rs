use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tuner_application::{InferenceService, ModelQueryService};
use tuner_worker::TuningOrchestrator;

use crate::handlers::{
    health::health_check,
    metrics::render_metrics,
    models::{get_latest_model, get_model, list_models},
    predict::predict,
    tuning::{get_tuning_status, submit_tuning},
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TuningOrchestrator>,
    pub inference: Arc<InferenceService>,
    pub models: Arc<ModelQueryService>,
    pub metrics: Option<PrometheusHandle>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        // 调优
        .route("/tune", post(submit_tuning))
        .route("/tune/status/{job_id}", get(get_tuning_status))
        // 推理
        .route("/predict", post(predict))
        // 模型目录
        .route("/models", get(list_models))
        .route("/models/{record_id}", get(get_model))
        .route("/models/latest/{base_model_name}", get(get_latest_model))
        .with_state(state)
}
