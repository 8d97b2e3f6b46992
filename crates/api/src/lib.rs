//! # Tuner API
//!
//! 模型调优与推理服务的HTTP接口。
//!
//! ## API 端点
//!
//! - `POST /tune` - 提交调优任务，返回 202 与 `job_id`
//! - `GET /tune/status/{job_id}` - 查询调优任务状态
//! - `POST /predict` - 使用基础模型或调优模型推理
//! - `GET /models` - 调优模型列表（可用 `base_model_name` 过滤）
//! - `GET /models/{record_id}` - 单个调优模型
//! - `GET /models/latest/{base_model_name}` - 某个基础模型最近的调优结果
//! - `GET /health` - 健康检查与任务统计
//! - `GET /metrics` - Prometheus指标
//!
//! ## 错误响应
//!
//! ```json
//! {
//!   "error": {
//!     "message": "调优任务 ... 不存在",
//!     "type": "JOB_NOT_FOUND",
//!     "code": 404,
//!     "suggestions": ["请检查 POST /tune 返回的 job_id"],
//!     "timestamp": "2024-01-01T00:00:00Z"
//!   }
//! }
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use std::time::Duration;

use axum::Router;
use tower::ServiceBuilder;

use middleware::{cors_layer, request_logging, timeout_layer, trace_layer};
pub use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(state: AppState, request_timeout: Duration) -> Router {
    create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(cors_layer())
            .layer(timeout_layer(request_timeout))
            .layer(axum::middleware::from_fn(request_logging)),
    )
}
