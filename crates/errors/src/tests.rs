use crate::*;

#[test]
fn test_tuner_error_display() {
    let err = TunerError::validation("model 不能为空");
    assert_eq!(err.to_string(), "请求验证失败: model 不能为空");

    let err = TunerError::data_not_found("alpha", "训练数据");
    assert_eq!(err.to_string(), "数据不存在: 模型 alpha 缺少 训练数据");

    let err = TunerError::FeatureShape {
        expected: 4,
        actual: 3,
    };
    assert_eq!(err.to_string(), "特征维度不匹配: 期望 4, 实际 3");

    let err = TunerError::QueueFull { capacity: 8 };
    assert_eq!(err.to_string(), "调优队列已满 (容量 8)");

    let err = TunerError::job_not_found("abc");
    assert_eq!(err.to_string(), "调优任务未找到: abc");
}

#[test]
fn test_not_found_classification() {
    assert!(TunerError::job_not_found("j").is_not_found());
    assert!(TunerError::record_not_found("r").is_not_found());
    assert!(TunerError::model_not_found("m").is_not_found());
    assert!(TunerError::data_not_found("m", "scaler").is_not_found());

    assert!(!TunerError::validation("x").is_not_found());
    assert!(!TunerError::artifact_store("x").is_not_found());
    assert!(!TunerError::Training("x".to_string()).is_not_found());
}

#[test]
fn test_client_error_classification() {
    assert!(TunerError::validation("x").is_client_error());
    assert!(TunerError::FeatureShape {
        expected: 1,
        actual: 2
    }
    .is_client_error());
    assert!(!TunerError::internal("x").is_client_error());
    assert!(!TunerError::QueueFull { capacity: 1 }.is_client_error());
}

#[test]
fn test_user_message() {
    assert_eq!(
        TunerError::job_not_found("x").user_message(),
        "请求的调优任务不存在"
    );
    assert_eq!(
        TunerError::internal("boom").user_message(),
        "系统繁忙，请稍后重试"
    );
}

#[test]
fn test_from_serde_json_error() {
    let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
    let err: TunerError = json_err.into();
    assert!(matches!(err, TunerError::Serialization(_)));
}

#[test]
fn test_from_anyhow_error() {
    let err: TunerError = anyhow::anyhow!("something broke").into();
    match err {
        TunerError::Internal(msg) => assert_eq!(msg, "something broke"),
        other => panic!("Expected Internal, got {other:?}"),
    }
}
