use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use tuner_errors::TunerError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("服务错误: {0}")]
    Tuner(#[from] TunerError),

    #[error("请求体格式错误: {0}")]
    Json(#[from] JsonRejection),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未找到资源")]
    NotFound,
}

impl ApiError {
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Tuner(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Tuner(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Tuner(TunerError::QueueFull { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Tuner(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Json(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, error_type, suggestions) = match &self {
            ApiError::Tuner(TunerError::Validation(msg)) => (
                msg.clone(),
                "VALIDATION_ERROR",
                vec!["请检查请求参数是否符合要求".to_string()],
            ),
            ApiError::Tuner(TunerError::FeatureShape { expected, actual }) => (
                format!("特征向量长度应为 {expected}，实际为 {actual}"),
                "FEATURE_SHAPE_ERROR",
                vec!["特征顺序与数量必须与训练时一致".to_string()],
            ),
            ApiError::Tuner(e @ TunerError::DataNotFound { .. }) => (
                e.to_string(),
                "DATA_NOT_FOUND",
                vec!["请确认模型目录下存在对应的预处理文件".to_string()],
            ),
            ApiError::Tuner(TunerError::JobNotFound { id }) => (
                format!("调优任务 {id} 不存在"),
                "JOB_NOT_FOUND",
                vec!["请检查 POST /tune 返回的 job_id".to_string()],
            ),
            ApiError::Tuner(TunerError::RecordNotFound { id }) => (
                format!("调优模型 {id} 不存在"),
                "MODEL_NOT_FOUND",
                vec!["使用 GET /models 查看所有调优模型".to_string()],
            ),
            ApiError::Tuner(TunerError::ModelNotFound { name }) => (
                format!("模型 {name} 不存在"),
                "MODEL_NOT_FOUND",
                vec!["请检查模型名称是否正确".to_string()],
            ),
            ApiError::Tuner(e @ TunerError::QueueFull { .. }) => (
                e.to_string(),
                "QUEUE_FULL",
                vec!["请稍后重试".to_string()],
            ),
            ApiError::Tuner(e) => {
                error!("请求处理失败: {}", e);
                (
                    e.user_message().to_string(),
                    "INTERNAL_ERROR",
                    vec!["查看 GET /health 检查系统状态".to_string()],
                )
            }
            ApiError::Json(rejection) => (
                rejection.body_text(),
                "BAD_REQUEST",
                vec![
                    "请检查JSON格式是否正确".to_string(),
                    "确保Content-Type为application/json".to_string(),
                ],
            ),
            ApiError::BadRequest(msg) => (
                msg.clone(),
                "BAD_REQUEST",
                vec!["请检查请求格式和参数".to_string()],
            ),
            ApiError::NotFound => (
                "请求的资源不存在".to_string(),
                "NOT_FOUND",
                vec!["请检查请求URL是否正确".to_string()],
            ),
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16(),
                "suggestions": suggestions,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (TunerError::validation("x"), StatusCode::BAD_REQUEST),
            (
                TunerError::FeatureShape {
                    expected: 4,
                    actual: 3,
                },
                StatusCode::BAD_REQUEST,
            ),
            (TunerError::data_not_found("alpha", "缩放器"), StatusCode::NOT_FOUND),
            (TunerError::job_not_found("j"), StatusCode::NOT_FOUND),
            (TunerError::record_not_found("r"), StatusCode::NOT_FOUND),
            (TunerError::model_not_found("m"), StatusCode::NOT_FOUND),
            (TunerError::QueueFull { capacity: 2 }, StatusCode::SERVICE_UNAVAILABLE),
            (TunerError::artifact_store("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (TunerError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_internal_errors_do_not_leak_details() {
        let response = ApiError::from(TunerError::internal("secret path /var/db")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
