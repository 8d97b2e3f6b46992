use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::routes::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let orchestrator = &state.orchestrator;
    let jobs = orchestrator.registry().counts().await;
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "tuner",
        "version": env!("CARGO_PKG_VERSION"),
        "jobs": jobs,
        "pool": {
            "workers": orchestrator.worker_count(),
            "queue_capacity": orchestrator.queue_capacity(),
            "max_grid_points": orchestrator.max_grid_points()
        }
    }))
}
