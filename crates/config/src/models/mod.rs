pub mod api_observability;
pub mod app_config;
pub mod database;
pub mod storage;
pub mod tuning;

pub use api_observability::*;
pub use app_config::*;
pub use database::*;
pub use storage::*;
pub use tuning::*;
