pub mod inference_service;
pub mod model_query_service;

pub use inference_service::InferenceService;
pub use model_query_service::ModelQueryService;
